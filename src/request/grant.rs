// self
use crate::{
	_prelude::*,
	auth::{ResourceOrScope, TokenSecret},
	credential::{JWT_BEARER_GRANT, UserAssertion},
};

/// OAuth 2.0 grant types understood by the request builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code redemption.
	AuthorizationCode,
	/// Refresh Token redemption.
	RefreshToken,
	/// Client Credentials for app-only tokens.
	ClientCredentials,
	/// JWT bearer assertion exchange (on-behalf-of).
	JwtBearer,
}
impl GrantType {
	/// Returns the wire identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::ClientCredentials => "client_credentials",
			GrantType::JwtBearer => JWT_BEARER_GRANT,
		}
	}

	/// Short label for logs and errors.
	pub fn label(self) -> &'static str {
		match self {
			GrantType::JwtBearer => "jwt_bearer",
			other => other.as_str(),
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A grant together with the parameters it carries.
#[derive(Clone, Debug)]
pub enum TokenGrant {
	/// Redeem an authorization code.
	AuthorizationCode {
		/// Code returned to the redirect URI.
		code: TokenSecret,
		/// Redirect URI used during authorization; must not carry a fragment.
		redirect_uri: Url,
		/// Optional resource or scopes.
		target: Option<ResourceOrScope>,
	},
	/// App-only token.
	ClientCredentials {
		/// Resource or scopes (required).
		target: ResourceOrScope,
	},
	/// Redeem a refresh token.
	RefreshToken {
		/// Refresh token to redeem.
		refresh_token: TokenSecret,
		/// Optional resource or scopes.
		target: Option<ResourceOrScope>,
	},
	/// Exchange a user assertion on behalf of the user.
	OnBehalfOf {
		/// Incoming user assertion.
		assertion: UserAssertion,
		/// Optional resource or scopes.
		target: Option<ResourceOrScope>,
	},
}
impl TokenGrant {
	/// Grant type sent as `grant_type`.
	pub fn grant_type(&self) -> GrantType {
		match self {
			Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
			Self::ClientCredentials { .. } => GrantType::ClientCredentials,
			Self::RefreshToken { .. } => GrantType::RefreshToken,
			Self::OnBehalfOf { .. } => GrantType::JwtBearer,
		}
	}

	/// Resource or scopes requested, if any.
	pub fn target(&self) -> Option<&ResourceOrScope> {
		match self {
			Self::ClientCredentials { target } => Some(target),
			Self::AuthorizationCode { target, .. }
			| Self::RefreshToken { target, .. }
			| Self::OnBehalfOf { target, .. } => target.as_ref(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn grant_identifiers_match_the_wire_format() {
		assert_eq!(GrantType::ClientCredentials.as_str(), "client_credentials");
		assert_eq!(GrantType::JwtBearer.as_str(), "urn:ietf:params:oauth:grant-type:jwt-bearer");
		assert_eq!(GrantType::JwtBearer.label(), "jwt_bearer");
		assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
	}
}
