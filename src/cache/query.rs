//! Query descriptors matched against cached keys.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, DisplayableId, Policy, ResourceOrScope, SubjectType, UniqueId, UserIdentifier},
	authority::Authority,
	cache::TokenCacheKey,
};

/// Partial key describing which cached token a caller wants.
///
/// Absent user identifiers mean "no user" unless the query carries an assertion hash, in which
/// case they act as wildcards and the hash disambiguates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheQuery {
	/// Authority the token must have been issued by.
	pub authority: Authority,
	/// Requested resource or scopes; `None` or an empty target matches any cached target.
	pub target: Option<ResourceOrScope>,
	/// Client id.
	pub client_id: ClientId,
	/// Subject type.
	pub subject_type: SubjectType,
	/// Unique id filter.
	pub unique_id: Option<UniqueId>,
	/// Displayable id filter (case-insensitive).
	pub displayable_id: Option<DisplayableId>,
	/// Policy partition; must match exactly, including absence.
	pub policy: Option<Policy>,
	/// Hash of the on-behalf-of user assertion.
	pub assertion_hash: Option<String>,
}
impl CacheQuery {
	/// Creates a query with no user, policy, or assertion filters.
	pub fn new(authority: Authority, client_id: ClientId, subject_type: SubjectType) -> Self {
		Self {
			authority,
			target: None,
			client_id,
			subject_type,
			unique_id: None,
			displayable_id: None,
			policy: None,
			assertion_hash: None,
		}
	}

	/// Sets the requested target.
	pub fn target(mut self, target: ResourceOrScope) -> Self {
		self.target = Some(target);

		self
	}

	/// Filters on a user identifier.
	pub fn user(mut self, user: UserIdentifier) -> Self {
		let (unique_id, displayable_id) = user.into_parts();

		self.unique_id = unique_id;
		self.displayable_id = displayable_id;

		self
	}

	/// Sets the policy partition.
	pub fn policy(mut self, policy: Option<Policy>) -> Self {
		self.policy = policy;

		self
	}

	/// Sets the on-behalf-of assertion hash.
	pub fn assertion_hash(mut self, hash: impl Into<String>) -> Self {
		self.assertion_hash = Some(hash.into());

		self
	}

	/// Returns true when the query names a user.
	pub fn has_user(&self) -> bool {
		self.unique_id.is_some() || self.displayable_id.is_some()
	}

	/// Stable string naming the query, used to serialize identical acquisitions.
	pub fn canonical(&self) -> String {
		format!(
			"{}|{}|{}|{}|{}|{}|{}|{}",
			self.authority,
			self.target.as_ref().map(ResourceOrScope::canonical).unwrap_or_default(),
			self.client_id,
			self.subject_type,
			self.unique_id.as_deref().unwrap_or_default(),
			self.displayable_id.as_ref().map(DisplayableId::canonical).unwrap_or_default(),
			self.policy.as_deref().unwrap_or_default(),
			self.assertion_hash.as_deref().unwrap_or_default(),
		)
	}

	/// Authority, client, subject and policy all equal.
	pub(crate) fn matches_partition(&self, key: &TokenCacheKey) -> bool {
		key.authority == self.authority
			&& key.client_id == self.client_id
			&& key.subject_type == self.subject_type
			&& key.policy == self.policy
	}

	/// Target filter: wildcard when unset, exact set equality for on-behalf-of entries, and
	/// cached-superset containment otherwise. Merely intersecting targets never match.
	pub(crate) fn matches_target(&self, key: &TokenCacheKey) -> bool {
		match self.target.as_ref().filter(|target| !target.is_empty()) {
			None => true,
			Some(requested) if self.subject_type == SubjectType::UserPlusClient =>
				key.target.same_as(requested),
			Some(requested) => key.target.contains(requested),
		}
	}

	/// User filter; see the type-level documentation for the wildcard rule.
	pub(crate) fn matches_user(&self, key: &TokenCacheKey) -> bool {
		if !self.has_user() {
			return self.assertion_hash.is_some() || !key.has_user();
		}

		let unique = self.unique_id.as_ref().is_none_or(|id| key.unique_id.as_ref() == Some(id));
		let displayable = self.displayable_id.as_ref().is_none_or(|id| {
			key.displayable_id.as_ref().is_some_and(|cached| cached.matches(id))
		});

		unique && displayable
	}

	/// Builds the key an entry saved for this query is stored under.
	pub(crate) fn key_for(
		&self,
		target: ResourceOrScope,
		unique_id: Option<UniqueId>,
		displayable_id: Option<DisplayableId>,
	) -> TokenCacheKey {
		let unique_id = unique_id.or_else(|| self.unique_id.clone());
		let displayable_id = displayable_id.or_else(|| self.displayable_id.clone());
		let key = TokenCacheKey::new(
			self.authority.clone(),
			target,
			self.client_id.clone(),
			self.subject_type,
		);

		key.with_user(unique_id, displayable_id).with_policy(self.policy.clone())
	}
}
