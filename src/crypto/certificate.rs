//! X.509 client certificate handle backed by an RSA private key.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::{digest, signature::RsaKeyPair};
// self
use crate::_prelude::*;

/// Certificate plus private key used to sign client assertions.
///
/// The DER-encoded certificate is only hashed (for the `x5t` header); the private key must be
/// supplied separately as PKCS#8 DER because certificates never carry one.
#[derive(Clone)]
pub struct ClientCertificate {
	der: Arc<[u8]>,
	key: Arc<RsaKeyPair>,
	thumbprint: String,
}
impl ClientCertificate {
	/// Loads a certificate and its PKCS#8 RSA private key.
	///
	/// Keys the crypto provider rejects (malformed, non-RSA, or below 2048 bits) fail with
	/// [`Error::InvalidCredential`].
	pub fn from_der(certificate: &[u8], pkcs8_key: &[u8]) -> Result<Self> {
		if certificate.is_empty() {
			return Err(Error::InvalidCredential { reason: "certificate is empty".into() });
		}

		let key = RsaKeyPair::from_pkcs8(pkcs8_key).map_err(|e| Error::InvalidCredential {
			reason: format!("private key was rejected ({e})"),
		})?;
		let thumbprint =
			URL_SAFE_NO_PAD.encode(digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, certificate));

		Ok(Self { der: Arc::from(certificate), key: Arc::new(key), thumbprint })
	}

	/// Base64url SHA-1 thumbprint of the DER certificate (`x5t`).
	pub fn thumbprint(&self) -> &str {
		&self.thumbprint
	}

	/// RSA modulus size in bits.
	pub fn key_size_bits(&self) -> usize {
		self.key.public().modulus_len() * 8
	}

	/// DER-encoded certificate bytes.
	pub fn der(&self) -> &[u8] {
		&self.der
	}

	pub(crate) fn key_pair(&self) -> &RsaKeyPair {
		&self.key
	}
}
impl Debug for ClientCertificate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCertificate")
			.field("thumbprint", &self.thumbprint)
			.field("key_size_bits", &self.key_size_bits())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;
	use crate::crypto;

	const CERT_2048: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_cert_2048.der"));
	const KEY_2048: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_key_2048.pk8"));
	const CERT_1024: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_cert_1024.der"));
	const KEY_1024: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_key_1024.pk8"));

	#[test]
	fn loads_certificate_and_computes_thumbprint() {
		let certificate = ClientCertificate::from_der(CERT_2048, KEY_2048)
			.expect("2048-bit fixture should load.");

		assert_eq!(certificate.key_size_bits(), 2048);
		assert_eq!(certificate.thumbprint(), "qbzyMuMoBl8kV542WHTFhtFuJvg");
		assert!(!format!("{certificate:?}").contains("key_pair"));
	}

	#[test]
	fn signing_is_deterministic_for_fixed_input() {
		let certificate = ClientCertificate::from_der(CERT_2048, KEY_2048)
			.expect("2048-bit fixture should load.");
		let signature = crypto::sign_with_certificate(
			"eyJ0eXAiOiJKV1QifQ.eyJzdWIiOiJjbGllbnQifQ",
			&certificate,
		)
		.expect("Signing with the fixture key should succeed.");

		assert_eq!(
			URL_SAFE_NO_PAD.encode(signature),
			"NW2zeQ56mqK5Zl-mrGLpvWnTIcl65VO3C3jpm7CW-lnxOzBI3J1Gc-rAVJ3GYS81Goia9UIue0LajizuN3as5ZIp9_LtiWaBN2U85mTkvhRzRrhpWZTUrcjBllzmrJz4pbunx7N_-Dqrji3jdj1tvMFiUyHD1lYfL5GNUUVnmL_uH-bIsNKWV8OcBvnQ1_PKj11nI1uAzE7K7PHfudx7J85k4rwWLjz39M3C9Fx-Z3WtJ5jJ2_twZ0ZBW4qlcoIUZGBdmEXYBRDw6SrwEa0EcywQpDF5-7K0paGFEZE2cWzMHSh8OCeycxfRfu4zMe9GdWRjU6YKxbod6hoQ7mBieA"
		);
	}

	#[test]
	fn rejects_undersized_and_malformed_keys() {
		let err = ClientCertificate::from_der(CERT_1024, KEY_1024)
			.expect_err("1024-bit keys must be rejected.");

		assert!(matches!(err, Error::InvalidCredential { .. }));
		assert!(ClientCertificate::from_der(CERT_2048, b"not a key").is_err());
		assert!(ClientCertificate::from_der(&[], KEY_2048).is_err());
	}
}
