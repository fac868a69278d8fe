//! Normalized STS authority URLs.

// self
use crate::{_prelude::*, auth::Policy, error::ConfigError};

const TENANTLESS: [&str; 2] = ["common", "organizations"];

/// Authority URL in normalized form: lowercase scheme and host, no query or fragment, and a
/// single trailing slash.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Authority(Url);
impl Authority {
	/// Parses and normalizes an authority string.
	pub fn new(authority: impl AsRef<str>) -> Result<Self, ConfigError> {
		let raw = authority.as_ref();
		let url = Url::parse(raw).map_err(|_| ConfigError::InvalidAuthority {
			authority: raw.into(),
			reason: "not an absolute URL",
		})?;

		Self::from_url(url)
	}

	/// Normalizes an already parsed URL.
	pub fn from_url(mut url: Url) -> Result<Self, ConfigError> {
		if url.cannot_be_a_base() || url.host_str().is_none_or(str::is_empty) {
			return Err(ConfigError::InvalidAuthority {
				authority: url.to_string(),
				reason: "authority must have a host",
			});
		}

		url.set_query(None);
		url.set_fragment(None);

		// `Url` already lowercases scheme and host for special schemes.
		let path = url.path().trim_end_matches('/').to_owned();

		url.set_path(&format!("{path}/"));

		Ok(Self(url))
	}

	/// Normalized string form, always ending in `/`.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	/// Underlying URL.
	pub fn url(&self) -> &Url {
		&self.0
	}

	/// Returns true when the authority is served over HTTPS.
	pub fn is_https(&self) -> bool {
		self.0.scheme() == "https"
	}

	/// First path segment, which names the tenant.
	pub fn tenant(&self) -> Option<&str> {
		self.0.path_segments()?.find(|segment| !segment.is_empty())
	}

	/// Returns true for the multi-tenant aliases that do not pin a tenant.
	pub fn is_tenantless(&self) -> bool {
		self.tenant().is_some_and(|tenant| {
			TENANTLESS.iter().any(|alias| tenant.eq_ignore_ascii_case(alias))
		})
	}

	/// Derives the token endpoint, carrying the B2C policy as `p` when present.
	pub fn token_endpoint(&self, policy: Option<&Policy>) -> Result<Url, ConfigError> {
		let mut endpoint = self.0.join("oauth2/v2.0/token").map_err(|_| {
			ConfigError::InvalidAuthority {
				authority: self.to_string(),
				reason: "token endpoint cannot be derived",
			}
		})?;

		if let Some(policy) = policy {
			endpoint.query_pairs_mut().append_pair("p", policy);
		}

		Ok(endpoint)
	}
}
impl Debug for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Authority").field(&self.as_str()).finish()
	}
}
impl Display for Authority {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl AsRef<str> for Authority {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl FromStr for Authority {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl TryFrom<String> for Authority {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<Authority> for String {
	fn from(value: Authority) -> Self {
		value.0.into()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn normalization_lowercases_and_appends_slash() {
		let authority = Authority::new("HTTPS://Login.Example.COM/Contoso?x=1#frag")
			.expect("Authority fixture should parse.");

		assert_eq!(authority.as_str(), "https://login.example.com/Contoso/");
		assert_eq!(
			Authority::new("https://login.example.com/contoso///")
				.expect("Authority with extra slashes should parse.")
				.as_str(),
			"https://login.example.com/contoso/"
		);
		assert_eq!(
			Authority::new("https://login.example.com")
				.expect("Bare host authority should parse.")
				.as_str(),
			"https://login.example.com/"
		);
	}

	#[test]
	fn invalid_authorities_are_rejected() {
		assert!(matches!(
			Authority::new("not a url"),
			Err(ConfigError::InvalidAuthority { .. })
		));
		assert!(matches!(
			Authority::new("mailto:user@example.com"),
			Err(ConfigError::InvalidAuthority { .. })
		));
	}

	#[test]
	fn tenant_and_tenantless_detection() {
		let contoso = Authority::new("https://login.example.com/contoso.onmicrosoft.com")
			.expect("Tenant authority should parse.");
		let common = Authority::new("https://login.example.com/Common/")
			.expect("Common authority should parse.");

		assert_eq!(contoso.tenant(), Some("contoso.onmicrosoft.com"));
		assert!(!contoso.is_tenantless());
		assert!(common.is_tenantless());
		assert_eq!(
			Authority::new("https://login.example.com/").expect("Root should parse.").tenant(),
			None
		);
	}

	#[test]
	fn token_endpoint_carries_policy() {
		let authority = Authority::new("https://login.example.com/tenant")
			.expect("Authority fixture should parse.");
		let policy = Policy::new("B2C_1_signin").expect("Policy fixture should be valid.");

		assert_eq!(
			authority.token_endpoint(None).expect("Endpoint should derive.").as_str(),
			"https://login.example.com/tenant/oauth2/v2.0/token"
		);
		assert_eq!(
			authority.token_endpoint(Some(&policy)).expect("Endpoint should derive.").as_str(),
			"https://login.example.com/tenant/oauth2/v2.0/token?p=B2C_1_signin"
		);
	}

	#[test]
	fn serde_round_trips_through_string() {
		let authority =
			Authority::new("https://login.example.com/tenant").expect("Authority should parse.");
		let json = serde_json::to_string(&authority).expect("Authority should serialize.");

		assert_eq!(json, "\"https://login.example.com/tenant/\"");

		let decoded: Authority = serde_json::from_str(&json).expect("Authority should decode.");

		assert_eq!(decoded, authority);
	}
}
