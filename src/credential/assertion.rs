//! Signed JWT client assertions and incoming user assertions.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, DisplayableId, TokenSecret},
	clock::Clock,
	crypto::{self, ClientCertificate},
};

/// `client_assertion_type` value for JWT bearer client assertions.
pub const CLIENT_ASSERTION_TYPE_JWT: &str =
	"urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
/// Grant type (and default assertion type) for on-behalf-of exchanges.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Pre-built or freshly signed client assertion.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientAssertion {
	/// Serialized assertion.
	pub value: TokenSecret,
	/// `client_assertion_type` sent alongside the assertion.
	pub assertion_type: String,
}
impl ClientAssertion {
	/// Wraps a JWT bearer assertion produced elsewhere.
	pub fn jwt(value: impl Into<String>) -> Self {
		Self { value: TokenSecret::new(value), assertion_type: CLIENT_ASSERTION_TYPE_JWT.into() }
	}

	/// Wraps an assertion of a custom type.
	pub fn with_type(value: impl Into<String>, assertion_type: impl Into<String>) -> Self {
		Self { value: TokenSecret::new(value), assertion_type: assertion_type.into() }
	}
}
impl Debug for ClientAssertion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientAssertion")
			.field("value", &"<redacted>")
			.field("assertion_type", &self.assertion_type)
			.finish()
	}
}

#[derive(Serialize)]
struct AssertionHeader<'a> {
	typ: &'static str,
	alg: &'static str,
	x5t: &'a str,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
	aud: &'a str,
	iss: &'a str,
	sub: &'a str,
	nbf: i64,
	exp: i64,
	jti: String,
}

/// Builds RS256 client assertions for certificate credentials.
#[derive(Clone, Copy, Debug)]
pub struct AssertionBuilder<'a> {
	client_id: &'a ClientId,
	certificate: &'a ClientCertificate,
	lifetime: Duration,
}
impl<'a> AssertionBuilder<'a> {
	/// Assertion validity window.
	pub const DEFAULT_LIFETIME: Duration = Duration::seconds(600);
	/// Ceiling applied to the unsigned `header.payload` string.
	pub const MAX_TOKEN_LEN: usize = 65_536;

	/// Creates a builder for the client/certificate pair.
	pub fn new(client_id: &'a ClientId, certificate: &'a ClientCertificate) -> Self {
		Self { client_id, certificate, lifetime: Self::DEFAULT_LIFETIME }
	}

	/// Overrides the validity window.
	pub fn lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}

	/// Encodes `base64url(header).base64url(claims)` for the given audience and instant.
	pub fn unsigned(&self, audience: &str, now: OffsetDateTime) -> Result<String> {
		let header =
			AssertionHeader { typ: "JWT", alg: "RS256", x5t: self.certificate.thumbprint() };
		let nbf = now.unix_timestamp();
		let claims = AssertionClaims {
			aud: audience,
			iss: self.client_id,
			sub: self.client_id,
			nbf,
			exp: nbf + self.lifetime.whole_seconds(),
			jti: random_jti(),
		};
		let token = format!("{}.{}", encode_json(&header)?, encode_json(&claims)?);

		if token.len() > Self::MAX_TOKEN_LEN {
			return Err(Error::TokenTooLong { len: token.len(), max: Self::MAX_TOKEN_LEN });
		}

		Ok(token)
	}

	/// Produces a signed `header.payload.signature` assertion.
	pub fn sign(&self, audience: &str, clock: &dyn Clock) -> Result<ClientAssertion> {
		let unsigned = self.unsigned(audience, clock.now())?;
		let signature = crypto::sign_with_certificate(&unsigned, self.certificate)?;

		Ok(ClientAssertion::jwt(format!("{unsigned}.{}", URL_SAFE_NO_PAD.encode(signature))))
	}
}

/// Assertion a middle-tier service received from its caller, exchanged on-behalf-of the user.
#[derive(Clone, PartialEq, Eq)]
pub struct UserAssertion {
	assertion: TokenSecret,
	assertion_type: String,
	user_name: Option<DisplayableId>,
	hash: String,
}
impl UserAssertion {
	/// Wraps a JWT bearer user assertion.
	pub fn new(assertion: impl Into<String>) -> Result<Self> {
		Self::with_type(assertion, JWT_BEARER_GRANT)
	}

	/// Wraps an assertion of a custom type (for example a SAML bearer assertion).
	pub fn with_type(
		assertion: impl Into<String>,
		assertion_type: impl Into<String>,
	) -> Result<Self> {
		let assertion = assertion.into();
		let assertion_type = assertion_type.into();

		if assertion.is_empty() {
			return Err(Error::InvalidCredential { reason: "user assertion is empty".into() });
		}
		if assertion_type.is_empty() {
			return Err(Error::InvalidCredential { reason: "user assertion type is empty".into() });
		}

		let hash = crypto::hash_sha256(&assertion);

		Ok(Self { assertion: TokenSecret::new(assertion), assertion_type, user_name: None, hash })
	}

	/// Attaches the user name the assertion belongs to.
	pub fn with_user_name(mut self, user_name: DisplayableId) -> Self {
		self.user_name = Some(user_name);

		self
	}

	/// Raw assertion.
	pub fn assertion(&self) -> &TokenSecret {
		&self.assertion
	}

	/// Assertion type sent as the grant type.
	pub fn assertion_type(&self) -> &str {
		&self.assertion_type
	}

	/// Explicit user name, when the caller supplied one.
	pub fn user_name(&self) -> Option<&DisplayableId> {
		self.user_name.as_ref()
	}

	/// Base64 SHA-256 of the assertion, used to match cached on-behalf-of tokens.
	pub fn hash(&self) -> &str {
		&self.hash
	}
}
impl Debug for UserAssertion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserAssertion")
			.field("assertion", &"<redacted>")
			.field("assertion_type", &self.assertion_type)
			.field("user_name", &self.user_name)
			.field("hash", &self.hash)
			.finish()
	}
}

fn encode_json<T>(value: &T) -> Result<String>
where
	T: Serialize,
{
	let json = serde_json::to_vec(value).map_err(|e| crypto::CryptoError::Signing {
		message: format!("JWT encoding failed: {e}"),
	})?;

	Ok(URL_SAFE_NO_PAD.encode(json))
}

fn random_jti() -> String {
	let bytes: [u8; 16] = rand::random();

	bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use time::macros;
	// self
	use super::*;
	use crate::clock::FixedClock;

	const CERT_2048: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_cert_2048.der"));
	const KEY_2048: &[u8] =
		include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_key_2048.pk8"));

	fn fixtures() -> (ClientId, ClientCertificate) {
		let client_id = ClientId::new("client-a").expect("Client fixture should be valid.");
		let certificate = ClientCertificate::from_der(CERT_2048, KEY_2048)
			.expect("Certificate fixture should load.");

		(client_id, certificate)
	}

	fn decode(segment: &str) -> serde_json::Value {
		let bytes = URL_SAFE_NO_PAD.decode(segment).expect("Segment should be base64url.");

		serde_json::from_slice(&bytes).expect("Segment should be JSON.")
	}

	#[test]
	fn assertion_carries_expected_header_and_claims() {
		let (client_id, certificate) = fixtures();
		let clock = FixedClock::new(macros::datetime!(2025-03-01 12:00 UTC));
		let assertion = AssertionBuilder::new(&client_id, &certificate)
			.sign("https://login.example.com/tenant/oauth2/v2.0/token", &clock)
			.expect("Signing should succeed with the fixture certificate.");
		let parts = assertion.value.expose().split('.').collect::<Vec<_>>();

		assert_eq!(parts.len(), 3);
		assert_eq!(assertion.assertion_type, CLIENT_ASSERTION_TYPE_JWT);

		let header = decode(parts[0]);
		let claims = decode(parts[1]);
		let nbf = macros::datetime!(2025-03-01 12:00 UTC).unix_timestamp();

		assert_eq!(header["typ"], "JWT");
		assert_eq!(header["alg"], "RS256");
		assert_eq!(header["x5t"], certificate.thumbprint());
		assert_eq!(claims["iss"], "client-a");
		assert_eq!(claims["sub"], "client-a");
		assert_eq!(claims["aud"], "https://login.example.com/tenant/oauth2/v2.0/token");
		assert_eq!(claims["nbf"], nbf);
		assert_eq!(claims["exp"], nbf + 600);
		assert_eq!(claims["jti"].as_str().map(str::len), Some(32));
	}

	#[test]
	fn each_signature_uses_a_fresh_jti() {
		let (client_id, certificate) = fixtures();
		let clock = FixedClock::new(macros::datetime!(2025-03-01 12:00 UTC));
		let builder = AssertionBuilder::new(&client_id, &certificate);
		let first = builder.sign("aud", &clock).expect("First signature should succeed.");
		let second = builder.sign("aud", &clock).expect("Second signature should succeed.");

		assert_ne!(first.value.expose(), second.value.expose());
	}

	#[test]
	fn oversized_unsigned_token_is_rejected_before_signing() {
		let (client_id, certificate) = fixtures();
		let audience = "a".repeat(AssertionBuilder::MAX_TOKEN_LEN);
		let err = AssertionBuilder::new(&client_id, &certificate)
			.unsigned(&audience, OffsetDateTime::UNIX_EPOCH)
			.expect_err("Oversized assertions must be rejected.");

		assert!(matches!(err, Error::TokenTooLong { max: AssertionBuilder::MAX_TOKEN_LEN, .. }));
	}

	#[test]
	fn user_assertion_hash_is_stable() {
		let assertion = UserAssertion::new("abc").expect("User assertion fixture should be valid.");

		assert_eq!(assertion.hash(), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
		assert_eq!(assertion.assertion_type(), JWT_BEARER_GRANT);
		assert!(UserAssertion::new("").is_err());
		assert!(!format!("{assertion:?}").contains("\"abc\""));
	}
}
