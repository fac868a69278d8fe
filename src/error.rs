//! Client-level error types shared across credentials, requests, the cache, and flows.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Cache persistence failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::cache::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Signing or hashing failure.
	#[error(transparent)]
	Crypto(#[from] crate::crypto::CryptoError),

	/// Credential is malformed, undersized, or missing a required component.
	#[error("Client credential is invalid: {reason}.")]
	InvalidCredential {
		/// Validation failure summary.
		reason: String,
	},
	/// Redirect URI carries a fragment component.
	#[error("Redirect URI must not contain a fragment: {uri}.")]
	InvalidRedirectUri {
		/// Offending redirect URI.
		uri: String,
	},
	/// Unsigned client assertion exceeds the length ceiling.
	#[error("Client assertion is {len} characters long, exceeding the {max} character limit.")]
	TokenTooLong {
		/// Observed length.
		len: usize,
		/// Permitted maximum.
		max: usize,
	},
	/// Cache lookup matched more than one entry.
	#[error("The token cache contains {count} entries matching the query; specify a user.")]
	MultipleTokensMatched {
		/// Number of remaining candidates.
		count: usize,
	},
	/// Attempted to add an entry whose key already exists.
	#[error("The token cache already contains an entry for {key}.")]
	DuplicateKey {
		/// Canonical form of the colliding key.
		key: String,
	},
	/// Token endpoint answered without an access token.
	#[error("Token endpoint response does not contain an access token.")]
	MissingAccessToken,

	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// STS- or client-supplied reason string.
		reason: String,
	},
	/// STS rejected the grant (e.g., bad code, refresh token, or user assertion).
	#[error("STS rejected the grant: {reason}.")]
	InvalidGrant {
		/// STS- or client-supplied reason string.
		reason: String,
	},
	/// Client authentication failed at the STS.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// STS- or client-supplied reason string.
		reason: String,
	},
	/// No cached token or refresh token can satisfy a silent acquisition.
	#[error("User interaction is required: {reason}.")]
	InteractionRequired {
		/// Why the silent path could not complete.
		reason: String,
	},
}

/// Configuration and validation failures raised locally.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Authority URL cannot be used.
	#[error("Authority `{authority}` is invalid: {reason}.")]
	InvalidAuthority {
		/// Authority string as supplied.
		authority: String,
		/// Validation failure summary.
		reason: &'static str,
	},
	/// Endpoint must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Grant is missing a required parameter.
	#[error("The {grant} grant requires the `{parameter}` parameter.")]
	MissingParameter {
		/// Grant label.
		grant: &'static str,
		/// Missing parameter name.
		parameter: &'static str,
	},
	/// Caller-supplied extra parameter collides with a reserved name.
	#[error("Extra parameter `{name}` collides with a reserved token request parameter.")]
	ReservedParameter {
		/// Offending parameter name.
		name: String,
	},
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Identifier validation failed.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Cached credential builder validation failed.
	#[error("Unable to build cached credential.")]
	CredentialBuild(#[from] crate::auth::CachedCredentialBuilderError),
	/// Token endpoint omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a zero or negative `expires_in`.
	#[error("Token endpoint returned a non-positive expires_in.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// STS returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// STS- or client-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
