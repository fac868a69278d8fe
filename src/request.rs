//! Token request construction.
//!
//! [`build_request`] maps a [`TokenGrant`] plus a [`CredentialKey`] onto the form parameters
//! posted to the token endpoint. Grant parameters and caller extras are written first; the
//! credential resolves last so client identity parameters are always present.

mod grant;
mod params;

pub use grant::*;
pub use params::RequestParameters;

// self
use crate::{
	_prelude::*,
	auth::ResourceOrScope,
	clock::Clock,
	credential::{CLIENT_PARAMETERS, CredentialKey},
	error::ConfigError,
};

/// Builds the token endpoint parameters for `grant`.
///
/// `audience` is the token endpoint URL and becomes the `aud` claim of signed client
/// assertions. `extra` parameters may not reuse a name the grant or the credential writes.
pub fn build_request(
	grant: &TokenGrant,
	credential: &CredentialKey,
	audience: &str,
	extra: &[(String, String)],
	clock: &dyn Clock,
) -> Result<RequestParameters> {
	let grant_type = grant.grant_type();
	let mut params = RequestParameters::new();

	match grant {
		TokenGrant::AuthorizationCode { code, redirect_uri, target } => {
			if code.expose().is_empty() {
				return Err(missing(grant_type, "code"));
			}
			if redirect_uri.fragment().is_some() {
				return Err(Error::InvalidRedirectUri { uri: redirect_uri.to_string() });
			}

			params.insert("grant_type", grant_type.as_str());
			params.insert("code", code.expose());
			params.insert("redirect_uri", redirect_uri.as_str());
			insert_target(&mut params, target.as_ref());
		},
		TokenGrant::ClientCredentials { target } => {
			if target.is_empty() {
				return Err(missing(grant_type, "resource"));
			}

			params.insert("grant_type", grant_type.as_str());
			insert_target(&mut params, Some(target));
		},
		TokenGrant::RefreshToken { refresh_token, target } => {
			if refresh_token.expose().is_empty() {
				return Err(missing(grant_type, "refresh_token"));
			}

			params.insert("grant_type", grant_type.as_str());
			params.insert("refresh_token", refresh_token.expose());
			insert_target(&mut params, target.as_ref());
		},
		TokenGrant::OnBehalfOf { assertion, target } => {
			params.insert("grant_type", assertion.assertion_type());
			params.insert("assertion", assertion.assertion().expose());
			params.insert("requested_token_use", "on_behalf_of");

			match target {
				Some(ResourceOrScope::Scopes(scopes)) => {
					let scopes = scopes.with("openid").map_err(ConfigError::from)?;

					params.insert("scope", scopes.normalized());
				},
				Some(ResourceOrScope::Resource(resource)) => {
					params.insert("resource", resource.as_str());
					params.insert("scope", "openid");
				},
				None => {
					params.insert("scope", "openid");
				},
			}
		},
	}

	for (name, value) in extra {
		if params.contains(name) || CLIENT_PARAMETERS.contains(&name.as_str()) {
			return Err(ConfigError::ReservedParameter { name: name.clone() }.into());
		}

		params.insert(name.as_str(), value.as_str());
	}

	credential.resolve_into(&mut params, audience, clock)?;

	Ok(params)
}

fn insert_target(params: &mut RequestParameters, target: Option<&ResourceOrScope>) {
	match target {
		Some(ResourceOrScope::Resource(resource)) if !resource.is_empty() => {
			params.insert("resource", resource.as_str());
		},
		Some(ResourceOrScope::Scopes(scopes)) if !scopes.is_empty() => {
			params.insert("scope", scopes.normalized());
		},
		_ => {},
	}
}

fn missing(grant: GrantType, parameter: &'static str) -> Error {
	ConfigError::MissingParameter { grant: grant.label(), parameter }.into()
}
