//! Token-endpoint exchange: form POST, JSON decoding, and OAuth error classification.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	request::{GrantType, RequestParameters},
	result::TokenResponse,
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] raised while calling the token endpoint.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(grant, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_unknown_transport_error(meta),
		}
	}
}

/// OAuth error payload returned by the token endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TokenErrorResponse {
	/// OAuth `error` code.
	#[serde(default)]
	pub error: Option<String>,
	/// Human-readable description.
	#[serde(default)]
	pub error_description: Option<String>,
	/// Numeric STS error codes.
	#[serde(default)]
	pub error_codes: Vec<i64>,
	/// STS correlation id.
	#[serde(default)]
	pub correlation_id: Option<String>,
}

/// Category an STS failure is sorted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StsErrorKind {
	/// Grant (code, refresh token, user assertion) rejected.
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes are not allowed.
	InsufficientScope,
	/// User must interact with the STS (consent, MFA, sign-in).
	InteractionRequired,
	/// Temporary failure; retry.
	Transient,
}

/// Classifies an STS failure.
///
/// The OAuth `error` code wins, then `error_description`, then the raw body, and finally the
/// HTTP status.
pub fn classify_token_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
	body_preview: Option<&str>,
	status: Option<u16>,
) -> StsErrorKind {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
		.or_else(|| classify_body(body_preview))
		.unwrap_or_else(|| classify_status(status))
}

/// POSTs `params` to `endpoint` and decodes the token response.
pub(crate) async fn exchange<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: &Url,
	grant: GrantType,
	params: &RequestParameters,
) -> Result<TokenResponse>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let meta = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(meta.clone());
	let request = form_request(endpoint, params)?;
	let response = handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(grant, meta.take().as_ref(), err))?;
	let meta = meta.take().unwrap_or_else(|| ResponseMetadata {
		status: Some(response.status().as_u16()),
		retry_after: None,
	});

	decode_response(grant, &meta, response)
}

fn form_request(endpoint: &Url, params: &RequestParameters) -> Result<HttpRequest> {
	let body = params.to_form_body();

	Request::builder()
		.method(Method::POST)
		.uri(endpoint.as_str())
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(ACCEPT, "application/json")
		.body(body.as_bytes().to_vec())
		.map_err(|e| ConfigError::from(e).into())
}

fn decode_response(
	grant: GrantType,
	meta: &ResponseMetadata,
	response: HttpResponse,
) -> Result<TokenResponse> {
	if !response.status().is_success() {
		return Err(map_error_response(grant, meta, response.body()));
	}

	let mut de = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut de).map_err(|source| {
		TransientError::TokenResponseParse { source, status: meta.status }.into()
	})
}

fn map_error_response(grant: GrantType, meta: &ResponseMetadata, body: &[u8]) -> Error {
	let parsed = serde_json::from_slice::<TokenErrorResponse>(body).ok();
	let preview = match &parsed {
		Some(_) => None,
		None => Some(truncate_preview(String::from_utf8_lossy(body).into_owned())),
	};
	let parsed = parsed.unwrap_or_default();
	let kind = classify_token_error(
		parsed.error.as_deref(),
		parsed.error_description.as_deref(),
		preview.as_deref(),
		meta.status,
	);
	let message = match (&parsed.error_description, &parsed.error, &preview) {
		(Some(description), _, _) =>
			format!("Token endpoint returned an OAuth error: {description}"),
		(None, Some(code), _) => format!("Token endpoint returned an OAuth error: {code}"),
		(None, None, Some(preview)) if !preview.is_empty() =>
			format!("Token endpoint returned HTTP {}: {preview}", status_label(meta)),
		_ => format!("Token endpoint returned HTTP {}", status_label(meta)),
	};

	#[cfg(feature = "tracing")]
	tracing::warn!(
		grant = grant.as_str(),
		status = meta.status,
		error = parsed.error.as_deref(),
		correlation_id = parsed.correlation_id.as_deref(),
		?kind,
		"Token endpoint rejected the request."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = grant;

	match kind {
		StsErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		StsErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		StsErrorKind::InsufficientScope => Error::InsufficientScope { reason: message },
		StsErrorKind::InteractionRequired => Error::InteractionRequired { reason: message },
		StsErrorKind::Transient => TransientError::TokenEndpoint {
			message,
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
	}
}

fn status_label(meta: &ResponseMetadata) -> String {
	meta.status.map(|status| status.to_string()).unwrap_or_else(|| "error".into())
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn match_exact_value(value: &str) -> Option<StsErrorKind> {
	let value = value.trim();

	if any_of(value, &["invalid_grant", "access_denied"]) {
		Some(StsErrorKind::InvalidGrant)
	} else if any_of(value, &["invalid_client", "unauthorized_client"]) {
		Some(StsErrorKind::InvalidClient)
	} else if any_of(value, &["invalid_scope", "insufficient_scope"]) {
		Some(StsErrorKind::InsufficientScope)
	} else if any_of(value, &["interaction_required", "consent_required", "login_required"]) {
		Some(StsErrorKind::InteractionRequired)
	} else if any_of(value, &["temporarily_unavailable", "server_error"]) {
		Some(StsErrorKind::Transient)
	} else {
		None
	}
}

fn any_of(value: &str, candidates: &[&str]) -> bool {
	candidates.iter().any(|candidate| value.eq_ignore_ascii_case(candidate))
}

fn classify_body(body: Option<&str>) -> Option<StsErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(StsErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(StsErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(StsErrorKind::InsufficientScope),
		text if text.contains("interaction_required") || text.contains("consent_required") =>
			Some(StsErrorKind::InteractionRequired),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(StsErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> StsErrorKind {
	match status {
		Some(401) => StsErrorKind::InvalidClient,
		Some(403) => StsErrorKind::InsufficientScope,
		Some(429) => StsErrorKind::Transient,
		Some(code) if code >= 500 => StsErrorKind::Transient,
		Some(400..=499) => StsErrorKind::InvalidGrant,
		_ => StsErrorKind::Transient,
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: format!("Request timed out while redeeming the {} grant", grant.label()),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn map_unknown_transport_error(meta: Option<&ResponseMetadata>) -> Error {
	TransientError::TokenEndpoint {
		message: "HTTP client error occurred while calling the token endpoint".into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

#[cfg(feature = "reqwest")]
fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn meta(status: u16) -> ResponseMetadata {
		ResponseMetadata { status: Some(status), retry_after: Some(Duration::seconds(5)) }
	}

	#[test]
	fn oauth_code_outranks_status() {
		assert_eq!(
			classify_token_error(Some("invalid_client"), None, None, Some(400)),
			StsErrorKind::InvalidClient
		);
		assert_eq!(
			classify_token_error(Some("interaction_required"), None, None, Some(400)),
			StsErrorKind::InteractionRequired
		);
		assert_eq!(
			classify_token_error(Some("weird"), Some("AADSTS70008: invalid_grant"), None, None),
			StsErrorKind::InvalidGrant
		);
	}

	#[test]
	fn status_fallback_sorts_transient_failures() {
		assert_eq!(classify_token_error(None, None, None, Some(503)), StsErrorKind::Transient);
		assert_eq!(classify_token_error(None, None, None, Some(429)), StsErrorKind::Transient);
		assert_eq!(classify_token_error(None, None, None, Some(400)), StsErrorKind::InvalidGrant);
		assert_eq!(classify_token_error(None, None, None, Some(401)), StsErrorKind::InvalidClient);
		assert_eq!(
			classify_token_error(None, None, Some("please retry later"), Some(400)),
			StsErrorKind::Transient
		);
	}

	#[test]
	fn error_responses_map_to_client_errors() {
		let body = br#"{"error":"invalid_grant","error_description":"AADSTS50126 bad assertion"}"#;
		let err = map_error_response(GrantType::JwtBearer, &meta(400), body);

		assert!(matches!(&err, Error::InvalidGrant { reason } if reason.contains("AADSTS50126")));

		let body = b"<html>down</html>";
		let err = map_error_response(GrantType::ClientCredentials, &meta(503), body);

		match err {
			Error::Transient(TransientError::TokenEndpoint { status, retry_after, message }) => {
				assert_eq!(status, Some(503));
				assert_eq!(retry_after, Some(Duration::seconds(5)));
				assert!(message.contains("<html>down</html>"));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn malformed_success_bodies_report_the_json_path() {
		let mut response = HttpResponse::new(br#"{"access_token":"at","expires_in":[1]}"#.to_vec());

		*response.status_mut() = oauth2::http::StatusCode::OK;

		let err = decode_response(GrantType::ClientCredentials, &meta(200), response)
			.expect_err("Array lifetimes must fail to decode.");

		match err {
			Error::Transient(TransientError::TokenResponseParse { source, status }) => {
				assert_eq!(status, Some(200));
				assert_eq!(source.path().to_string(), "expires_in");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn previews_are_truncated() {
		let preview = truncate_preview("x".repeat(BODY_PREVIEW_LIMIT + 10));

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}
}
