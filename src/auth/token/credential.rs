//! Cached credential values, expiry helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{TenantId, UserIdentity, token::secret::TokenSecret},
};

/// Errors produced by [`CachedCredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CachedCredentialBuilderError {
	/// Neither an access token nor a refresh token was supplied.
	#[error("A cached credential needs an access token or a refresh token.")]
	MissingTokens,
	/// No expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_on or expires_in.")]
	MissingExpiry,
}

/// Value stored per cache key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
	/// Token type reported by the STS (usually `Bearer`).
	pub token_type: String,
	/// Access token secret.
	pub access_token: Option<TokenSecret>,
	/// Refresh token secret.
	pub refresh_token: Option<TokenSecret>,
	/// Raw id_token.
	pub id_token: Option<TokenSecret>,
	/// Absolute access-token expiry.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_on: OffsetDateTime,
	/// Extended expiry honored during STS outages; never earlier than `expires_on`.
	#[serde(with = "time::serde::rfc3339")]
	pub extended_expires_on: OffsetDateTime,
	/// Whether the refresh token is valid for other resources.
	pub is_multi_resource_refresh_token: bool,
	/// SHA-256 hash of the user assertion that produced this entry (on-behalf-of).
	pub user_assertion_hash: Option<String>,
	/// Tenant that issued the token.
	pub tenant_id: Option<TenantId>,
	/// User information decoded from the id_token.
	pub user: Option<UserIdentity>,
}
impl CachedCredential {
	/// Default margin applied before an access token is considered expired.
	pub const DEFAULT_EXPIRATION_MARGIN: Duration = Duration::minutes(5);

	/// Returns a builder.
	pub fn builder() -> CachedCredentialBuilder {
		CachedCredentialBuilder::default()
	}

	/// True when the access token is missing or expires within `margin` of `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		self.access_token.is_none() || self.expires_on <= now + margin
	}

	/// True when even the extended lifetime has elapsed.
	pub fn is_extended_expired_at(&self, now: OffsetDateTime) -> bool {
		self.extended_expires_on <= now
	}

	/// Returns true when the entry holds a usable refresh token.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.is_some()
	}

	/// Compares the stored assertion hash, case-insensitively. Absent hashes never match.
	pub fn assertion_hash_matches(&self, hash: &str) -> bool {
		self.user_assertion_hash.as_deref().is_some_and(|stored| stored.eq_ignore_ascii_case(hash))
	}
}
impl Debug for CachedCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedCredential")
			.field("token_type", &self.token_type)
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("expires_on", &self.expires_on)
			.field("is_multi_resource_refresh_token", &self.is_multi_resource_refresh_token)
			.field("user_assertion_hash", &self.user_assertion_hash)
			.field("tenant_id", &self.tenant_id)
			.finish()
	}
}

/// Builder for [`CachedCredential`].
#[derive(Clone, Debug, Default)]
pub struct CachedCredentialBuilder {
	token_type: Option<String>,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_on: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	extended_expires_in: Option<Duration>,
	multi_resource: bool,
	user_assertion_hash: Option<String>,
	tenant_id: Option<TenantId>,
	user: Option<UserIdentity>,
}
impl CachedCredentialBuilder {
	/// Sets the token type (defaults to `Bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides an optional refresh token secret.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Provides the raw id_token.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the instant relative expiries are measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_on(mut self, instant: OffsetDateTime) -> Self {
		self.expires_on = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the relative extended expiry.
	pub fn extended_expires_in(mut self, duration: Duration) -> Self {
		self.extended_expires_in = Some(duration);

		self
	}

	/// Flags the refresh token as multi-resource.
	pub fn multi_resource(mut self, value: bool) -> Self {
		self.multi_resource = value;

		self
	}

	/// Stamps the user assertion hash.
	pub fn user_assertion_hash(mut self, hash: impl Into<String>) -> Self {
		self.user_assertion_hash = Some(hash.into());

		self
	}

	/// Sets the issuing tenant.
	pub fn tenant_id(mut self, tenant: Option<TenantId>) -> Self {
		self.tenant_id = tenant;

		self
	}

	/// Attaches decoded user information.
	pub fn user(mut self, user: Option<UserIdentity>) -> Self {
		self.user = user;

		self
	}

	/// Consumes the builder and produces a [`CachedCredential`].
	pub fn build(self) -> Result<CachedCredential, CachedCredentialBuilderError> {
		if self.access_token.is_none() && self.refresh_token.is_none() {
			return Err(CachedCredentialBuilderError::MissingTokens);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_on = match (self.expires_on, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(CachedCredentialBuilderError::MissingExpiry),
		};
		let extended_expires_on = self
			.extended_expires_in
			.map(|delta| issued_at + delta)
			.unwrap_or(expires_on)
			.max(expires_on);

		Ok(CachedCredential {
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			access_token: self.access_token,
			refresh_token: self.refresh_token,
			id_token: self.id_token,
			expires_on,
			extended_expires_on,
			is_multi_resource_refresh_token: self.multi_resource,
			user_assertion_hash: self.user_assertion_hash,
			tenant_id: self.tenant_id,
			user: self.user,
		})
	}
}
