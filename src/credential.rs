//! How an application authenticates to the STS.
//!
//! [`CredentialKey`] is a tagged union over the supported client credential kinds. It resolves
//! itself into wire parameters through [`CredentialKey::resolve_into`], which always appends
//! `client_id` and then exactly one authentication form.

pub mod assertion;
pub mod secret;

pub use assertion::*;
pub use secret::SecretMaterial;

// self
use crate::{
	_prelude::*,
	auth::ClientId,
	clock::Clock,
	crypto::ClientCertificate,
	request::RequestParameters,
};

/// Parameter names owned by client authentication.
pub const CLIENT_PARAMETERS: &[&str] =
	&["client_id", "client_secret", "client_assertion", "client_assertion_type"];

/// Application credential presented to the token endpoint.
#[derive(Clone, Debug)]
pub enum CredentialKey {
	/// Shared secret (`client_secret`).
	Secret {
		/// Client identifier.
		client_id: ClientId,
		/// Protected secret bytes.
		secret: SecretMaterial,
	},
	/// Certificate; a fresh RS256 assertion is signed on every resolution.
	Certificate {
		/// Client identifier.
		client_id: ClientId,
		/// Certificate handle with private key.
		certificate: ClientCertificate,
		/// Smallest accepted RSA modulus.
		min_key_size_bits: usize,
		/// Lifetime of each signed assertion.
		assertion_lifetime: Duration,
	},
	/// Caller-provided client assertion.
	Assertion {
		/// Client identifier.
		client_id: ClientId,
		/// Assertion and its type.
		assertion: ClientAssertion,
	},
	/// Public client with no authentication secret.
	PublicClient {
		/// Client identifier.
		client_id: ClientId,
	},
}
impl CredentialKey {
	/// Smallest RSA key accepted for certificate credentials.
	pub const MIN_KEY_SIZE_BITS: usize = 2048;

	/// Creates a secret credential; empty secrets are rejected.
	pub fn secret(client_id: ClientId, secret: SecretMaterial) -> Result<Self> {
		if secret.is_empty() {
			return Err(Error::InvalidCredential { reason: "client secret is empty".into() });
		}

		Ok(Self::Secret { client_id, secret })
	}

	/// Creates a certificate credential; keys under 2048 bits are rejected.
	pub fn certificate(client_id: ClientId, certificate: ClientCertificate) -> Result<Self> {
		let bits = certificate.key_size_bits();

		if bits < Self::MIN_KEY_SIZE_BITS {
			return Err(Error::InvalidCredential {
				reason: format!(
					"certificate key is {bits} bits, below the {} bit minimum",
					Self::MIN_KEY_SIZE_BITS
				),
			});
		}

		Ok(Self::Certificate {
			client_id,
			certificate,
			min_key_size_bits: Self::MIN_KEY_SIZE_BITS,
			assertion_lifetime: AssertionBuilder::DEFAULT_LIFETIME,
		})
	}

	/// Creates an assertion credential; the value and type must both be non-empty.
	pub fn assertion(client_id: ClientId, assertion: ClientAssertion) -> Result<Self> {
		if assertion.value.expose().is_empty() {
			return Err(Error::InvalidCredential { reason: "client assertion is empty".into() });
		}
		if assertion.assertion_type.is_empty() {
			return Err(Error::InvalidCredential {
				reason: "client assertion type is empty".into(),
			});
		}

		Ok(Self::Assertion { client_id, assertion })
	}

	/// Creates a public client credential.
	pub fn public_client(client_id: ClientId) -> Self {
		Self::PublicClient { client_id }
	}

	/// Overrides the signed assertion lifetime for certificate credentials.
	pub fn with_assertion_lifetime(mut self, lifetime: Duration) -> Self {
		if let Self::Certificate { assertion_lifetime, .. } = &mut self {
			*assertion_lifetime = lifetime;
		}

		self
	}

	/// Client identifier shared by every variant.
	pub fn client_id(&self) -> &ClientId {
		match self {
			Self::Secret { client_id, .. }
			| Self::Certificate { client_id, .. }
			| Self::Assertion { client_id, .. }
			| Self::PublicClient { client_id } => client_id,
		}
	}

	/// Returns true for credentials that authenticate the client.
	pub fn is_confidential(&self) -> bool {
		!matches!(self, Self::PublicClient { .. })
	}

	/// Signs a fresh client assertion for certificate credentials.
	pub fn sign_assertion(&self, audience: &str, clock: &dyn Clock) -> Result<ClientAssertion> {
		match self {
			Self::Certificate { client_id, certificate, assertion_lifetime, .. } =>
				AssertionBuilder::new(client_id, certificate)
					.lifetime(*assertion_lifetime)
					.sign(audience, clock),
			_ => Err(Error::InvalidCredential {
				reason: "only certificate credentials can sign assertions".into(),
			}),
		}
	}

	/// Appends `client_id` and the credential's authentication parameters.
	///
	/// Certificate credentials sign a new assertion on every call.
	pub fn resolve_into(
		&self,
		params: &mut RequestParameters,
		audience: &str,
		clock: &dyn Clock,
	) -> Result<()> {
		params.insert("client_id", self.client_id().as_ref());

		match self {
			Self::Secret { secret, .. } => {
				params.insert_secret("client_secret", secret.reveal_str()?);
			},
			Self::Certificate { .. } => {
				let assertion = self.sign_assertion(audience, clock)?;

				params.insert("client_assertion_type", assertion.assertion_type);
				params.insert("client_assertion", assertion.value.expose());
			},
			Self::Assertion { assertion, .. } => {
				params.insert("client_assertion_type", assertion.assertion_type.as_str());
				params.insert("client_assertion", assertion.value.expose());
			},
			Self::PublicClient { .. } => {},
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::FixedClock;

	const CERT_2048: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_cert_2048.der"));
	const KEY_2048: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_key_2048.pk8"));

	fn client() -> ClientId {
		ClientId::new("client-a").expect("Client fixture should be valid.")
	}

	fn clock() -> FixedClock {
		FixedClock::new(macros::datetime!(2025-05-01 08:00 UTC))
	}

	#[test]
	fn secret_credentials_resolve_to_client_secret() {
		let credential = CredentialKey::secret(client(), SecretMaterial::new("s3cr3t"))
			.expect("Secret credential should build.");
		let mut params = RequestParameters::new();

		credential
			.resolve_into(&mut params, "https://sts/token", &clock())
			.expect("Secret credential should resolve.");

		assert_eq!(params.get("client_id"), Some("client-a"));
		assert_eq!(params.get("client_secret"), Some("s3cr3t"));
		assert!(!params.contains("client_assertion"));
	}

	#[test]
	fn empty_secret_and_assertion_are_invalid() {
		assert!(matches!(
			CredentialKey::secret(client(), SecretMaterial::new("")),
			Err(Error::InvalidCredential { .. })
		));
		assert!(matches!(
			CredentialKey::assertion(client(), ClientAssertion::jwt("")),
			Err(Error::InvalidCredential { .. })
		));
		assert!(matches!(
			CredentialKey::assertion(client(), ClientAssertion::with_type("value", "")),
			Err(Error::InvalidCredential { .. })
		));
	}

	#[test]
	fn certificate_credentials_sign_on_every_resolution() {
		let certificate = ClientCertificate::from_der(CERT_2048, KEY_2048)
			.expect("Certificate fixture should load.");
		let credential = CredentialKey::certificate(client(), certificate)
			.expect("2048-bit certificate should be accepted.");
		let mut first = RequestParameters::new();
		let mut second = RequestParameters::new();

		credential
			.resolve_into(&mut first, "https://sts/token", &clock())
			.expect("First resolution should succeed.");
		credential
			.resolve_into(&mut second, "https://sts/token", &clock())
			.expect("Second resolution should succeed.");

		assert_eq!(first.get("client_assertion_type"), Some(CLIENT_ASSERTION_TYPE_JWT));
		assert!(!first.contains("client_secret"));
		assert_ne!(first.get("client_assertion"), second.get("client_assertion"));
	}

	#[test]
	fn assertion_and_public_credentials_resolve() {
		let credential =
			CredentialKey::assertion(client(), ClientAssertion::with_type("signed", "custom-type"))
				.expect("Assertion credential should build.");
		let mut params = RequestParameters::new();

		credential
			.resolve_into(&mut params, "aud", &clock())
			.expect("Assertion credential should resolve.");

		assert_eq!(params.get("client_assertion"), Some("signed"));
		assert_eq!(params.get("client_assertion_type"), Some("custom-type"));

		let public = CredentialKey::public_client(client());
		let mut params = RequestParameters::new();

		public.resolve_into(&mut params, "aud", &clock()).expect("Public client should resolve.");

		assert_eq!(params.len(), 1);
		assert!(!public.is_confidential());
		assert!(public.sign_assertion("aud", &clock()).is_err());
	}
}
