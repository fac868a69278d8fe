//! Redemption of authorization codes.

// self
use crate::{
	_prelude::*,
	auth::{ResourceOrScope, SubjectType, TokenSecret},
	client::{self, ConfidentialClient},
	http::TokenHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::TokenGrant,
	result::AuthenticationResult,
	sts::TransportErrorMapper,
};

impl<C, M> ConfidentialClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Redeems an authorization code and caches the user's tokens.
	///
	/// When `target` is `None` the resource or scopes reported by the STS are used for the
	/// cache entry.
	pub async fn acquire_token_by_authorization_code(
		&self,
		code: impl Into<String>,
		redirect_uri: Url,
		target: Option<ResourceOrScope>,
	) -> Result<AuthenticationResult> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "acquire_token_by_authorization_code");
		let code = TokenSecret::new(code);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let grant = TokenGrant::AuthorizationCode { code, redirect_uri, target };
				let result = self.redeem(&grant, None).await?;

				self.store(&self.query(SubjectType::User), &result)?;

				Ok(result)
			})
			.await;

		client::record_outcome(KIND, &span, &result);

		result
	}
}
