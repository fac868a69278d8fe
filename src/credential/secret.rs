//! Protected client secret material.

// crates.io
use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroizing;
// self
use crate::_prelude::*;

/// Client secret held in memory that is wiped on drop.
///
/// The bytes are only revealed while a token request is being built, and the revealed copy is
/// itself zeroized when the caller drops it.
#[derive(Clone)]
pub struct SecretMaterial(Arc<SecretBox<[u8]>>);
impl SecretMaterial {
	/// Wraps a UTF-8 secret.
	pub fn new(secret: impl Into<String>) -> Self {
		Self::from_bytes(secret.into().into_bytes())
	}

	/// Wraps raw secret bytes.
	pub fn from_bytes(bytes: Vec<u8>) -> Self {
		Self(Arc::new(SecretBox::new(bytes.into_boxed_slice())))
	}

	/// Returns true if no secret bytes are held.
	pub fn is_empty(&self) -> bool {
		self.0.expose_secret().is_empty()
	}

	/// Reveals a copy of the secret that is wiped when dropped.
	pub fn reveal(&self) -> Zeroizing<Vec<u8>> {
		Zeroizing::new(self.0.expose_secret().to_vec())
	}

	/// Reveals the secret as UTF-8 text for form encoding.
	pub(crate) fn reveal_str(&self) -> Result<Zeroizing<String>> {
		let bytes = self.reveal();

		std::str::from_utf8(&bytes)
			.map(|text| Zeroizing::new(text.to_owned()))
			.map_err(|_| Error::InvalidCredential { reason: "client secret is not UTF-8".into() })
	}
}
impl Debug for SecretMaterial {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SecretMaterial").field(&"<redacted>").finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn reveal_returns_the_original_bytes() {
		let secret = SecretMaterial::new("s3cr3t");

		assert_eq!(secret.reveal().as_slice(), b"s3cr3t");
		assert_eq!(
			secret.reveal_str().expect("UTF-8 secret should reveal as text.").as_str(),
			"s3cr3t"
		);
		assert!(!secret.is_empty());
	}

	#[test]
	fn debug_redacts_and_non_utf8_is_rejected() {
		let secret = SecretMaterial::from_bytes(vec![0xff, 0xfe]);

		assert_eq!(format!("{secret:?}"), "SecretMaterial(\"<redacted>\")");
		assert!(matches!(secret.reveal_str(), Err(Error::InvalidCredential { .. })));
	}
}
