//! App-only tokens via the `client_credentials` grant.

// self
use crate::{
	_prelude::*,
	auth::{ResourceOrScope, SubjectType},
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
	/// Acquires an app-only token for `target`.
	///
	/// A cached token outside the expiry margin is returned unless `force_refresh` is set.
	/// Concurrent calls for the same target share one token-endpoint request.
	pub async fn acquire_token_for_client(
		&self,
		target: ResourceOrScope,
		force_refresh: bool,
	) -> Result<AuthenticationResult> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "acquire_token_for_client");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.ensure_confidential("client_credentials")?;

				let query = self.query(SubjectType::App).target(target.clone());
				let guard = self.flow_guard(&query);
				let _singleflight = guard.lock().await;

				if !force_refresh {
					if let Some(hit) = self.lookup(KIND, &query, None)? {
						return Ok(hit);
					}
				}

				let result = self.redeem(&TokenGrant::ClientCredentials { target }, None).await?;

				self.store(&query, &result)?;

				Ok(result)
			})
			.await;

		client::record_outcome(KIND, &span, &result);

		result
	}
}
