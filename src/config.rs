//! Client configuration and its validating builder.

// self
use crate::{
	_prelude::*,
	auth::{CachedCredential, ClientId, Policy},
	authority::Authority,
	credential::{AssertionBuilder, CredentialKey},
	error::ConfigError,
};

/// Immutable configuration consumed by [`crate::client::ConfidentialClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Normalized authority every request is issued against.
	pub authority: Authority,
	/// Application credential.
	pub credential: CredentialKey,
	/// Explicit token endpoint; derived from the authority when absent.
	pub token_endpoint: Option<Url>,
	/// Access tokens expiring within this window are treated as expired.
	pub expiration_margin: Duration,
	/// Extra form parameters appended to every token request.
	pub extra_parameters: Vec<(String, String)>,
	/// B2C policy partitioning the cache and selecting the endpoint.
	pub policy: Option<Policy>,
}
impl ClientConfig {
	/// Starts a builder for the given authority and credential.
	pub fn builder(authority: impl Into<String>, credential: CredentialKey) -> ClientConfigBuilder {
		ClientConfigBuilder::new(authority, credential)
	}

	/// Client identifier from the credential.
	pub fn client_id(&self) -> &ClientId {
		self.credential.client_id()
	}

	/// Token endpoint for the optional B2C policy.
	pub fn token_endpoint_for(&self, policy: Option<&Policy>) -> Result<Url, ConfigError> {
		match &self.token_endpoint {
			Some(endpoint) => Ok(endpoint.clone()),
			None => self.authority.token_endpoint(policy),
		}
	}

	/// Token endpoint for the configured policy.
	pub fn endpoint(&self) -> Result<Url, ConfigError> {
		self.token_endpoint_for(self.policy.as_ref())
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Authority string as supplied.
	pub authority: String,
	/// Application credential.
	pub credential: CredentialKey,
	/// Optional token endpoint override.
	pub token_endpoint: Option<Url>,
	/// Expiry margin applied to cached access tokens.
	pub expiration_margin: Duration,
	/// Lifetime of signed client assertions.
	pub assertion_lifetime: Duration,
	/// Require HTTPS authorities and endpoints.
	pub validate_authority: bool,
	/// Extra form parameters.
	pub extra_parameters: Vec<(String, String)>,
	/// Optional B2C policy.
	pub policy: Option<Policy>,
}
impl ClientConfigBuilder {
	/// Creates a builder with default margins and validation enabled.
	pub fn new(authority: impl Into<String>, credential: CredentialKey) -> Self {
		Self {
			authority: authority.into(),
			credential,
			token_endpoint: None,
			expiration_margin: CachedCredential::DEFAULT_EXPIRATION_MARGIN,
			assertion_lifetime: AssertionBuilder::DEFAULT_LIFETIME,
			validate_authority: true,
			extra_parameters: Vec::new(),
			policy: None,
		}
	}

	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the expiry margin; negative values clamp to zero.
	pub fn expiration_margin(mut self, margin: Duration) -> Self {
		self.expiration_margin = margin.max(Duration::ZERO);

		self
	}

	/// Sets the lifetime of signed client assertions.
	pub fn assertion_lifetime(mut self, lifetime: Duration) -> Self {
		self.assertion_lifetime = lifetime;

		self
	}

	/// Enables or disables HTTPS validation of the authority and token endpoint.
	pub fn validate_authority(mut self, validate: bool) -> Self {
		self.validate_authority = validate;

		self
	}

	/// Appends an extra form parameter sent with every token request.
	pub fn extra_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_parameters.push((name.into(), value.into()));

		self
	}

	/// Sets the B2C policy.
	pub fn policy(mut self, policy: Policy) -> Self {
		self.policy = Some(policy);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let authority = Authority::new(&self.authority)?;

		if self.validate_authority {
			validate_endpoint("authority", authority.url())?;

			if let Some(endpoint) = self.token_endpoint.as_ref() {
				validate_endpoint("token", endpoint)?;
			}
		}

		Ok(ClientConfig {
			authority,
			credential: self.credential.with_assertion_lifetime(self.assertion_lifetime),
			token_endpoint: self.token_endpoint,
			expiration_margin: self.expiration_margin,
			extra_parameters: self.extra_parameters,
			policy: self.policy,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
