//! Turns token-endpoint responses and cache hits into [`AuthenticationResult`] values.

// crates.io
use serde::{Deserializer, de};
// self
use crate::{
	_prelude::*,
	auth::{CachedCredential, ResourceOrScope, ScopeSet, TenantId, TokenSecret, UserIdentity},
	credential::UserAssertion,
	error::ConfigError,
};

/// Successful token-endpoint payload.
///
/// `expires_in` and `ext_expires_in` accept either JSON numbers or numeric strings, since some
/// STS deployments send the latter.
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
	/// Token type, usually `Bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Issued access token.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Issued refresh token.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Raw id_token.
	#[serde(default)]
	pub id_token: Option<String>,
	/// Access-token lifetime in seconds.
	#[serde(default, deserialize_with = "deserialize_seconds")]
	pub expires_in: Option<i64>,
	/// Extended lifetime in seconds, honored during STS outages.
	#[serde(default, deserialize_with = "deserialize_seconds")]
	pub ext_expires_in: Option<i64>,
	/// Space-delimited scopes granted.
	#[serde(default)]
	pub scope: Option<String>,
	/// Resource the token was issued for (v1 endpoints).
	#[serde(default)]
	pub resource: Option<String>,
	/// Base64url client_info carrying the home account ids.
	#[serde(default)]
	pub client_info: Option<String>,
	/// STS correlation id.
	#[serde(default)]
	pub correlation_id: Option<String>,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("token_type", &self.token_type)
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("ext_expires_in", &self.ext_expires_in)
			.field("scope", &self.scope)
			.field("resource", &self.resource)
			.field("correlation_id", &self.correlation_id)
			.finish()
	}
}

/// Where an [`AuthenticationResult`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
	/// Served from the token cache.
	Cache,
	/// Freshly issued by the STS.
	IdentityProvider,
}
impl TokenSource {
	/// Returns a stable label suitable for span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenSource::Cache => "cache",
			TokenSource::IdentityProvider => "identity_provider",
		}
	}
}

/// Token acquisition outcome handed back to callers.
#[derive(Clone)]
pub struct AuthenticationResult {
	/// Access token to present to the resource.
	pub access_token: TokenSecret,
	/// Token type (usually `Bearer`).
	pub token_type: String,
	/// Access-token expiry.
	pub expires_on: OffsetDateTime,
	/// Extended expiry; never earlier than `expires_on`.
	pub extended_expires_on: OffsetDateTime,
	/// Refresh token, possibly carried over from the redeemed one.
	pub refresh_token: Option<TokenSecret>,
	/// Raw id_token.
	pub id_token: Option<TokenSecret>,
	/// Tenant that issued the token.
	pub tenant_id: Option<TenantId>,
	/// User decoded from the id_token and client_info.
	pub user: Option<UserIdentity>,
	/// Resource or scopes the token covers, when known.
	pub target: Option<ResourceOrScope>,
	/// Whether the refresh token can be redeemed for other resources.
	pub is_multi_resource_refresh_token: bool,
	/// Hash of the on-behalf-of user assertion that produced this token.
	pub user_assertion_hash: Option<String>,
	/// STS correlation id.
	pub correlation_id: Option<String>,
	/// Cache or network.
	pub source: TokenSource,
}
impl AuthenticationResult {
	/// Assembles a result from a token-endpoint response.
	///
	/// A response without a refresh token keeps `existing_refresh_token`. The target falls back
	/// to the response's `resource`, then `scope`, when the request did not name one.
	pub fn from_response(
		response: TokenResponse,
		request_target: Option<&ResourceOrScope>,
		existing_refresh_token: Option<&TokenSecret>,
		issued_at: OffsetDateTime,
	) -> Result<Self> {
		let TokenResponse {
			token_type,
			access_token,
			refresh_token,
			id_token,
			expires_in,
			ext_expires_in,
			scope,
			resource,
			client_info,
			correlation_id,
		} = response;
		let access_token = access_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.ok_or(Error::MissingAccessToken)?;
		let expires_in = expires_in.ok_or(ConfigError::MissingExpiresIn)?;

		if expires_in <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn.into());
		}

		let expires_on = offset(issued_at, expires_in)?;
		let extended_expires_on = match ext_expires_in.filter(|secs| *secs > 0) {
			Some(secs) => offset(issued_at, secs)?.max(expires_on),
			None => expires_on,
		};
		let refresh_token = refresh_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.or_else(|| existing_refresh_token.cloned());
		let is_multi_resource_refresh_token = refresh_token.is_some()
			&& resource.as_deref().is_some_and(|value| !value.trim().is_empty());
		let target = match request_target {
			Some(target) => Some(target.clone()),
			None => response_target(resource.as_deref(), scope.as_deref())?,
		};
		let user = UserIdentity::from_response(id_token.as_deref(), client_info.as_deref());
		let tenant_id = user.as_ref().and_then(|user| user.tenant_id.clone());

		Ok(Self {
			access_token,
			token_type: token_type
				.filter(|kind| !kind.is_empty())
				.unwrap_or_else(|| "Bearer".into()),
			expires_on,
			extended_expires_on,
			refresh_token,
			id_token: id_token.map(TokenSecret::new),
			tenant_id,
			user,
			target,
			is_multi_resource_refresh_token,
			user_assertion_hash: None,
			correlation_id,
			source: TokenSource::IdentityProvider,
		})
	}

	/// Rebuilds a result from a cached entry.
	///
	/// On-behalf-of hits for an assertion without an explicit user name are trusted only when
	/// the stored assertion hash matches; otherwise this returns `None` and the caller goes to
	/// the network. Entries without an access token also yield `None`.
	pub fn from_cache(
		credential: CachedCredential,
		target: ResourceOrScope,
		assertion: Option<&UserAssertion>,
	) -> Option<Self> {
		if let Some(assertion) = assertion {
			let trusted = assertion.user_name().is_some()
				|| credential.assertion_hash_matches(assertion.hash());

			if !trusted {
				return None;
			}
		}

		let CachedCredential {
			token_type,
			access_token,
			refresh_token,
			id_token,
			expires_on,
			extended_expires_on,
			is_multi_resource_refresh_token,
			user_assertion_hash,
			tenant_id,
			user,
		} = credential;

		Some(Self {
			access_token: access_token?,
			token_type,
			expires_on,
			extended_expires_on,
			refresh_token,
			id_token,
			tenant_id,
			user,
			target: Some(target),
			is_multi_resource_refresh_token,
			user_assertion_hash,
			correlation_id: None,
			source: TokenSource::Cache,
		})
	}

	/// Stamps the on-behalf-of assertion hash.
	pub fn with_assertion_hash(mut self, hash: impl Into<String>) -> Self {
		self.user_assertion_hash = Some(hash.into());

		self
	}

	/// Cache value persisted for this result.
	pub fn to_cached_credential(&self) -> CachedCredential {
		CachedCredential {
			token_type: self.token_type.clone(),
			access_token: Some(self.access_token.clone()),
			refresh_token: self.refresh_token.clone(),
			id_token: self.id_token.clone(),
			expires_on: self.expires_on,
			extended_expires_on: self.extended_expires_on,
			is_multi_resource_refresh_token: self.is_multi_resource_refresh_token,
			user_assertion_hash: self.user_assertion_hash.clone(),
			tenant_id: self.tenant_id.clone(),
			user: self.user.clone(),
		}
	}
}
impl Debug for AuthenticationResult {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticationResult")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_on", &self.expires_on)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("tenant_id", &self.tenant_id)
			.field("target", &self.target)
			.field("is_multi_resource_refresh_token", &self.is_multi_resource_refresh_token)
			.field("source", &self.source)
			.finish()
	}
}

fn offset(issued_at: OffsetDateTime, secs: i64) -> Result<OffsetDateTime, ConfigError> {
	issued_at.checked_add(Duration::seconds(secs)).ok_or(ConfigError::ExpiresInOutOfRange)
}

fn response_target(
	resource: Option<&str>,
	scope: Option<&str>,
) -> Result<Option<ResourceOrScope>, ConfigError> {
	if let Some(resource) = resource.filter(|value| !value.trim().is_empty()) {
		return Ok(Some(ResourceOrScope::resource(resource)));
	}

	match scope.filter(|value| !value.trim().is_empty()) {
		Some(scope) => Ok(Some(ResourceOrScope::Scopes(ScopeSet::from_str(scope)?))),
		None => Ok(None),
	}
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Seconds {
		Number(i64),
		Text(String),
	}

	match Option::<Seconds>::deserialize(deserializer)? {
		None => Ok(None),
		Some(Seconds::Number(secs)) => Ok(Some(secs)),
		Some(Seconds::Text(raw)) => raw.trim().parse().map(Some).map_err(de::Error::custom),
	}
}
