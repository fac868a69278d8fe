//! Signing and hashing primitives for client authentication and cache matching.

pub mod certificate;

pub use certificate::ClientCertificate;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use ring::{hmac, rand::SystemRandom, signature::RSA_PKCS1_SHA256};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Errors raised by signing operations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CryptoError {
	/// Symmetric signing was attempted with an empty key.
	#[error("Symmetric signing key cannot be empty.")]
	EmptyKey,
	/// The private key could not produce a signature.
	#[error("Signing failed: {message}.")]
	Signing {
		/// Failure summary reported by the crypto provider.
		message: String,
	},
}

/// Computes an RSA PKCS#1 v1.5 SHA-256 signature over the UTF-8 bytes of `message`.
pub fn sign_with_certificate(
	message: &str,
	certificate: &ClientCertificate,
) -> Result<Vec<u8>, CryptoError> {
	let key = certificate.key_pair();
	let mut signature = vec![0; key.public().modulus_len()];

	key.sign(&RSA_PKCS1_SHA256, &SystemRandom::new(), message.as_bytes(), &mut signature)
		.map_err(|e| CryptoError::Signing { message: e.to_string() })?;

	Ok(signature)
}

/// Computes an HMAC-SHA256 tag over the UTF-8 bytes of `message`.
pub fn sign_with_symmetric_key(message: &str, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
	if key.is_empty() {
		return Err(CryptoError::EmptyKey);
	}

	let key = hmac::Key::new(hmac::HMAC_SHA256, key);

	Ok(hmac::sign(&key, message.as_bytes()).as_ref().to_vec())
}

/// Standard base64 (padded) SHA-256 digest of the UTF-8 bytes of `input`.
pub fn hash_sha256(input: &str) -> String {
	let digest = Sha256::digest(input.as_bytes());

	STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD};
	// self
	use super::*;

	#[test]
	fn sha256_matches_known_vector() {
		assert_eq!(hash_sha256("abc"), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
		assert_eq!(hash_sha256("abc"), hash_sha256("abc"));
		assert_ne!(hash_sha256("abc"), hash_sha256("abd"));
	}

	#[test]
	fn hmac_matches_known_vector() {
		let tag = sign_with_symmetric_key("message", b"key")
			.expect("HMAC signing should succeed with a non-empty key.");

		assert_eq!(STANDARD.encode(tag), "bp7ym3X//Ft6uuUn1Y/a2y/kLnIZARl2kXNDBl9Y7Uo=");
	}

	#[test]
	fn hmac_rejects_empty_key() {
		assert_eq!(sign_with_symmetric_key("message", &[]), Err(CryptoError::EmptyKey));
	}
}
