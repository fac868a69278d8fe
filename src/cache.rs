//! In-memory token cache with ambiguity-safe lookups and pluggable persistence hooks.
//!
//! Access tokens are keyed by [`TokenCacheKey`] and refresh tokens by the looser
//! [`RefreshTokenKey`]. Every public operation takes the cache lock once and fires the
//! [`CacheNotifier`] hooks around it, so a lookup-then-write sequence observes a consistent map.

pub mod file;

mod key;
mod notify;
mod query;

pub use file::FileCache;
pub use key::*;
pub use notify::{CacheNotificationArgs, CacheNotifier};
pub use query::CacheQuery;

// self
use crate::{
	_prelude::*,
	auth::{CachedCredential, ResourceOrScope},
	cache::notify::NotifyContext,
};

/// Version written into every serialized snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Error type produced by cache persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Snapshot could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backing storage failed.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

type AccessTokenEntry = (TokenCacheKey, CachedCredential);
type RefreshTokenRecord = (RefreshTokenKey, RefreshTokenEntry);

/// Mutable cache contents, only reachable through the cache lock.
#[derive(Debug, Default)]
pub(crate) struct CacheState {
	access_tokens: BTreeMap<String, AccessTokenEntry>,
	refresh_tokens: BTreeMap<String, RefreshTokenRecord>,
	has_state_changed: bool,
}
impl CacheState {
	fn serialize(&self) -> Result<Vec<u8>, StoreError> {
		let snapshot = SnapshotRef {
			version: SNAPSHOT_VERSION,
			access_tokens: self.access_tokens.values().map(|(key, value)| (key, value)).collect(),
			refresh_tokens: self.refresh_tokens.values().map(|(key, value)| (key, value)).collect(),
		};

		serde_json::to_vec(&snapshot).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize cache snapshot: {e}"),
		})
	}

	fn deserialize(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
		let snapshot = if bytes.is_empty() {
			Snapshot::default()
		} else {
			serde_json::from_slice::<Snapshot>(bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse cache snapshot: {e}"),
			})?
		};

		if bytes.is_empty() || snapshot.version == SNAPSHOT_VERSION {
			self.access_tokens = snapshot
				.access_tokens
				.into_iter()
				.map(|(key, value)| (key.canonical(), (key, value)))
				.collect();
			self.refresh_tokens = snapshot
				.refresh_tokens
				.into_iter()
				.map(|(key, value)| (key.canonical(), (key, value)))
				.collect();
			self.has_state_changed = false;

			Ok(())
		} else {
			Err(StoreError::Serialization {
				message: format!("Unsupported cache snapshot version {}", snapshot.version),
			})
		}
	}
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
	version: u32,
	access_tokens: Vec<(&'a TokenCacheKey, &'a CachedCredential)>,
	refresh_tokens: Vec<(&'a RefreshTokenKey, &'a RefreshTokenEntry)>,
}

#[derive(Default, Deserialize)]
struct Snapshot {
	version: u32,
	#[serde(default)]
	access_tokens: Vec<AccessTokenEntry>,
	#[serde(default)]
	refresh_tokens: Vec<RefreshTokenRecord>,
}

/// Token cache shared by every flow of a client.
#[derive(Default)]
pub struct TokenCache {
	state: Mutex<CacheState>,
	notifier: Option<Arc<dyn CacheNotifier>>,
}
impl TokenCache {
	/// Creates an empty cache without persistence hooks.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an empty cache whose operations are bracketed by `notifier`.
	pub fn with_notifier(notifier: Arc<dyn CacheNotifier>) -> Self {
		Self { state: Mutex::default(), notifier: Some(notifier) }
	}

	/// Inserts an access-token entry; existing keys are rejected.
	pub fn add(&self, key: TokenCacheKey, value: CachedCredential) -> Result<()> {
		self.access(key_context(&key), true, |state| {
			let canonical = key.canonical();

			if state.access_tokens.contains_key(&canonical) {
				return Err(Error::DuplicateKey { key: canonical });
			}

			state.access_tokens.insert(canonical, (key.clone(), value));
			state.has_state_changed = true;

			Ok(())
		})
	}

	/// Removes an access-token entry, returning whether it existed.
	pub fn remove(&self, key: &TokenCacheKey) -> Result<bool> {
		self.access(key_context(key), true, |state| {
			let removed = state.access_tokens.remove(&key.canonical()).is_some();

			state.has_state_changed |= removed;

			Ok(removed)
		})
	}

	/// Fetches the entry stored under exactly `key`.
	pub fn try_get(&self, key: &TokenCacheKey) -> Result<Option<CachedCredential>> {
		self.access(key_context(key), false, |state| {
			Ok(state.access_tokens.get(&key.canonical()).map(|(_, value)| value.clone()))
		})
	}

	/// Lists every access-token entry.
	pub fn enumerate(&self) -> Result<Vec<(TokenCacheKey, CachedCredential)>> {
		self.access(NotifyContext::default(), false, |state| {
			Ok(state.access_tokens.values().cloned().collect())
		})
	}

	/// Lists every refresh-token entry.
	pub fn refresh_tokens(&self) -> Result<Vec<(RefreshTokenKey, RefreshTokenEntry)>> {
		self.access(NotifyContext::default(), false, |state| {
			Ok(state.refresh_tokens.values().cloned().collect())
		})
	}

	/// Removes a refresh-token entry, returning whether it existed.
	pub fn remove_refresh_token(&self, key: &RefreshTokenKey) -> Result<bool> {
		let ctx = NotifyContext { client_id: Some(&key.client_id), ..Default::default() };

		self.access(ctx, true, |state| {
			let removed = state.refresh_tokens.remove(&key.canonical()).is_some();

			state.has_state_changed |= removed;

			Ok(removed)
		})
	}

	/// Drops every entry.
	pub fn clear(&self) -> Result<()> {
		self.access(NotifyContext::default(), true, |state| {
			state.access_tokens.clear();
			state.refresh_tokens.clear();
			state.has_state_changed = true;

			Ok(())
		})
	}

	/// Number of access-token entries.
	pub fn count(&self) -> usize {
		self.state.lock().access_tokens.len()
	}

	/// Number of refresh-token entries.
	pub fn refresh_token_count(&self) -> usize {
		self.state.lock().refresh_tokens.len()
	}

	/// True when the cache was mutated since it was last loaded or flushed.
	pub fn has_state_changed(&self) -> bool {
		self.state.lock().has_state_changed
	}

	/// Serializes the cache into the versioned JSON snapshot format.
	pub fn serialize(&self) -> Result<Vec<u8>, StoreError> {
		self.state.lock().serialize()
	}

	/// Replaces the cache contents with a snapshot. Empty input yields an empty cache.
	pub fn deserialize(&self, bytes: &[u8]) -> Result<(), StoreError> {
		self.state.lock().deserialize(bytes)
	}

	/// Finds the single access-token entry matching `query`.
	///
	/// Entries are filtered by partition (authority, client, subject, policy), then target,
	/// then user. When several remain and the query has an assertion hash but no displayable
	/// id, entries whose stored hash differs are dropped. More than one survivor is an error.
	pub fn resolve_token(
		&self,
		query: &CacheQuery,
	) -> Result<Option<(TokenCacheKey, CachedCredential)>> {
		self.access(query_context(query), false, |state| {
			let mut hits = state
				.access_tokens
				.values()
				.filter(|(key, _)| {
					query.matches_partition(key)
						&& query.matches_target(key)
						&& query.matches_user(key)
				})
				.collect::<Vec<_>>();

			if hits.len() > 1 && query.displayable_id.is_none() {
				if let Some(hash) = query.assertion_hash.as_deref() {
					hits.retain(|(_, value)| value.assertion_hash_matches(hash));
				}
			}

			match hits.as_slice() {
				[] => Ok(None),
				[hit] => Ok(Some((*hit).clone())),
				many => {
					#[cfg(feature = "tracing")]
					tracing::warn!(count = many.len(), "Several cached tokens match the query.");

					Err(Error::MultipleTokensMatched { count: many.len() })
				},
			}
		})
	}

	/// Finds the refresh token usable for `query`, ignoring authority and target.
	///
	/// Without user information the lookup succeeds only when the client has exactly one
	/// refresh token.
	pub fn find_refresh_token(
		&self,
		query: &CacheQuery,
	) -> Result<Option<(RefreshTokenKey, RefreshTokenEntry)>> {
		self.access(query_context(query), false, |state| {
			let hits = state
				.refresh_tokens
				.values()
				.filter(|(key, entry)| {
					key.client_id == query.client_id
						&& key.policy == query.policy
						&& refresh_user_matches(query, entry)
				})
				.collect::<Vec<_>>();

			match hits.as_slice() {
				[] => Ok(None),
				[hit] => Ok(Some((*hit).clone())),
				many => {
					#[cfg(feature = "tracing")]
					tracing::warn!(count = many.len(), "Several refresh tokens match the query.");

					Err(Error::MultipleTokensMatched { count: many.len() })
				},
			}
		})
	}

	/// Stores a freshly acquired credential for `query`.
	///
	/// Entries in the same slot (same authority, client, subject, policy and user, with an
	/// overlapping target) are replaced. The refresh token is stored under its own key, and a
	/// multi-resource refresh token is copied into every multi-resource entry of the same user.
	pub fn save(
		&self,
		query: &CacheQuery,
		target: ResourceOrScope,
		credential: CachedCredential,
	) -> Result<TokenCacheKey> {
		let user = credential.user.clone().unwrap_or_default();
		let key = query.key_for(target, user.unique_id.clone(), user.displayable_id.clone());
		let ctx = key_context(&key);

		self.access(ctx, true, |state| {
			let before = state.access_tokens.len();

			state.access_tokens.retain(|_, (existing, _)| !existing.same_slot(&key));

			let collapsed = before - state.access_tokens.len();

			#[cfg(feature = "tracing")]
			if collapsed > 0 {
				tracing::debug!(collapsed, "Replaced cached tokens in the same slot.");
			}
			#[cfg(not(feature = "tracing"))]
			let _ = collapsed;

			if let Some(refresh_token) = credential.refresh_token.as_ref() {
				let rt_key = RefreshTokenKey::new(
					key.client_id.clone(),
					credential.user.as_ref(),
					key.policy.clone(),
				);
				let entry = RefreshTokenEntry {
					refresh_token: refresh_token.clone(),
					authority: key.authority.clone(),
					is_multi_resource_refresh_token: credential.is_multi_resource_refresh_token,
					tenant_id: credential.tenant_id.clone(),
					user: credential.user.clone(),
				};

				state.refresh_tokens.insert(rt_key.canonical(), (rt_key, entry));

				if credential.is_multi_resource_refresh_token && key.has_user() {
					for (existing, value) in state.access_tokens.values_mut() {
						if existing.client_id == key.client_id
							&& existing.subject_type == key.subject_type
							&& existing.same_user(&key)
							&& value.is_multi_resource_refresh_token
						{
							value.refresh_token = Some(refresh_token.clone());
						}
					}
				}
			}

			state.access_tokens.insert(key.canonical(), (key.clone(), credential));
			state.has_state_changed = true;

			Ok(key.clone())
		})
	}

	fn access<T>(
		&self,
		ctx: NotifyContext<'_>,
		write: bool,
		op: impl FnOnce(&mut CacheState) -> Result<T>,
	) -> Result<T> {
		let mut state = self.state.lock();
		let Some(notifier) = self.notifier.as_deref() else {
			return op(&mut *state);
		};
		let mut hooks = notifier.before_access(&mut ctx.args(&mut *state));

		if hooks.is_ok() && write {
			hooks = notifier.before_write(&mut ctx.args(&mut *state));
		}

		let outcome = match hooks {
			Ok(()) => op(&mut *state),
			Err(e) => Err(e.into()),
		};
		let after = notifier.after_access(&mut ctx.args(&mut *state));
		let value = outcome?;

		after?;

		Ok(value)
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("TokenCache")
			.field("access_tokens", &state.access_tokens.len())
			.field("refresh_tokens", &state.refresh_tokens.len())
			.field("has_state_changed", &state.has_state_changed)
			.field("notifier", &self.notifier.is_some())
			.finish()
	}
}

fn key_context(key: &TokenCacheKey) -> NotifyContext<'_> {
	NotifyContext {
		client_id: Some(&key.client_id),
		unique_id: key.unique_id.as_ref(),
		displayable_id: key.displayable_id.as_ref(),
	}
}

fn query_context(query: &CacheQuery) -> NotifyContext<'_> {
	NotifyContext {
		client_id: Some(&query.client_id),
		unique_id: query.unique_id.as_ref(),
		displayable_id: query.displayable_id.as_ref(),
	}
}

fn refresh_user_matches(query: &CacheQuery, entry: &RefreshTokenEntry) -> bool {
	if !query.has_user() {
		return true;
	}

	let Some(user) = entry.user.as_ref() else {
		return false;
	};
	let unique =
		query.unique_id.as_ref().is_none_or(|id| user.unique_id.as_ref() == Some(id));
	let displayable = query.displayable_id.as_ref().is_none_or(|id| {
		user.displayable_id.as_ref().is_some_and(|cached| cached.matches(id))
	});

	unique && displayable
}
