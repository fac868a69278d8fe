//! Access-token and refresh-token cache keys.

// self
use crate::{
	_prelude::*,
	auth::{
		ClientId, DisplayableId, Policy, ResourceOrScope, SubjectType, TenantId, TokenSecret,
		UniqueId, UserIdentity,
	},
	authority::Authority,
};

const SEPARATOR: &str = ":::";

/// Composite key of an access-token entry.
///
/// Equality and hashing go through [`TokenCacheKey::canonical`]: displayable ids and resource
/// URIs compare case-insensitively and scope sets compare as sorted sets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenCacheKey {
	/// Normalized authority.
	pub authority: Authority,
	/// Resource or scope set the token was issued for.
	pub target: ResourceOrScope,
	/// Client the token was issued to.
	pub client_id: ClientId,
	/// Whose token this is.
	pub subject_type: SubjectType,
	/// Immutable user object id.
	pub unique_id: Option<UniqueId>,
	/// Display name (UPN or email) of the user.
	pub displayable_id: Option<DisplayableId>,
	/// B2C policy partition.
	pub policy: Option<Policy>,
}
impl TokenCacheKey {
	/// Creates an application key with no user information.
	pub fn new(
		authority: Authority,
		target: ResourceOrScope,
		client_id: ClientId,
		subject_type: SubjectType,
	) -> Self {
		Self {
			authority,
			target,
			client_id,
			subject_type,
			unique_id: None,
			displayable_id: None,
			policy: None,
		}
	}

	/// Sets the user identifiers.
	pub fn with_user(
		mut self,
		unique_id: Option<UniqueId>,
		displayable_id: Option<DisplayableId>,
	) -> Self {
		self.unique_id = unique_id;
		self.displayable_id = displayable_id;

		self
	}

	/// Sets the B2C policy.
	pub fn with_policy(mut self, policy: Option<Policy>) -> Self {
		self.policy = policy;

		self
	}

	/// Returns true when the key carries any user identifier.
	pub fn has_user(&self) -> bool {
		self.unique_id.is_some() || self.displayable_id.is_some()
	}

	/// Fully normalized string form, used as the store's map key.
	pub fn canonical(&self) -> String {
		[
			self.authority.as_str().to_owned(),
			self.target.canonical(),
			self.client_id.to_string(),
			self.subject_type.as_str().to_owned(),
			self.unique_id.as_deref().unwrap_or_default().to_owned(),
			self.displayable_id.as_ref().map(DisplayableId::canonical).unwrap_or_default(),
			self.policy.as_deref().unwrap_or_default().to_owned(),
		]
		.join(SEPARATOR)
	}

	/// True when both keys address the same logical token slot: same authority, client,
	/// subject, policy and user, with targets that overlap.
	pub(crate) fn same_slot(&self, other: &Self) -> bool {
		self.authority == other.authority
			&& self.client_id == other.client_id
			&& self.subject_type == other.subject_type
			&& self.policy == other.policy
			&& self.same_user(other)
			&& self.target.intersects(&other.target)
	}

	/// True when both keys name the same user, or neither names one.
	pub(crate) fn same_user(&self, other: &Self) -> bool {
		let displayable = match (&self.displayable_id, &other.displayable_id) {
			(Some(lhs), Some(rhs)) => lhs.matches(rhs),
			(None, None) => true,
			_ => false,
		};

		self.unique_id == other.unique_id && displayable
	}
}
impl PartialEq for TokenCacheKey {
	fn eq(&self, other: &Self) -> bool {
		self.canonical() == other.canonical()
	}
}
impl Eq for TokenCacheKey {}
impl Hash for TokenCacheKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.canonical().hash(state);
	}
}
impl Display for TokenCacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.canonical())
	}
}

/// Key of a refresh-token entry.
///
/// Refresh tokens are shared across authorities and resources, so the key only names the
/// client, the home account and the policy partition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshTokenKey {
	/// Client the refresh token was issued to.
	pub client_id: ClientId,
	/// Home account id (`uid.utid`), else the user's unique id.
	pub home_account_id: Option<String>,
	/// B2C policy partition.
	pub policy: Option<Policy>,
}
impl RefreshTokenKey {
	/// Derives the key for a user (or no user) of `client_id`.
	pub fn new(client_id: ClientId, user: Option<&UserIdentity>, policy: Option<Policy>) -> Self {
		Self { client_id, home_account_id: user.and_then(UserIdentity::home_key), policy }
	}

	/// Fully normalized string form.
	pub fn canonical(&self) -> String {
		[
			&*self.client_id,
			self.home_account_id.as_deref().unwrap_or_default(),
			self.policy.as_deref().unwrap_or_default(),
		]
		.join(SEPARATOR)
	}
}

/// Refresh token stored under a [`RefreshTokenKey`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenEntry {
	/// Refresh token secret.
	pub refresh_token: TokenSecret,
	/// Authority the refresh token was last issued by.
	pub authority: Authority,
	/// Whether the token can be redeemed for other resources.
	pub is_multi_resource_refresh_token: bool,
	/// Tenant that issued the token.
	pub tenant_id: Option<TenantId>,
	/// User the token belongs to.
	pub user: Option<UserIdentity>,
}
impl Debug for RefreshTokenEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshTokenEntry")
			.field("refresh_token", &"<redacted>")
			.field("authority", &self.authority)
			.field("is_multi_resource_refresh_token", &self.is_multi_resource_refresh_token)
			.field("tenant_id", &self.tenant_id)
			.finish()
	}
}
