//! Silent acquisition: cached token first, then a cached refresh token.

// self
use crate::{
	_prelude::*,
	auth::{ResourceOrScope, SubjectType, UserIdentifier},
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
	/// Returns a valid cached token for `target`, redeeming a cached refresh token if needed.
	///
	/// Fails with [`Error::InteractionRequired`] when no refresh token is available or the STS
	/// rejects it; a rejected refresh token is removed from the cache.
	pub async fn acquire_token_silent(
		&self,
		target: ResourceOrScope,
		user: Option<UserIdentifier>,
	) -> Result<AuthenticationResult> {
		const KIND: FlowKind = FlowKind::Silent;

		let span = FlowSpan::new(KIND, "acquire_token_silent");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut query = self.query(SubjectType::User).target(target.clone());

				if let Some(user) = user {
					query = query.user(user);
				}

				let guard = self.flow_guard(&query);
				let _singleflight = guard.lock().await;

				if let Some(hit) = self.lookup(KIND, &query, None)? {
					return Ok(hit);
				}

				let Some((rt_key, entry)) = self.cache.find_refresh_token(&query)? else {
					return Err(Error::InteractionRequired {
						reason: "no cached token or refresh token matches the request".into(),
					});
				};
				let grant = TokenGrant::RefreshToken {
					refresh_token: entry.refresh_token.clone(),
					target: Some(target),
				};

				match self.redeem(&grant, Some(&entry.refresh_token)).await {
					Ok(mut result) => {
						// No id_token: the rotated refresh token stays filed under the cached user.
						if result.user.is_none() {
							result.user = entry.user.clone();
							result.tenant_id = result.tenant_id.or_else(|| entry.tenant_id.clone());
						}

						self.store(&query, &result)?;

						Ok(result)
					},
					Err(Error::InvalidGrant { reason }) => {
						self.cache.remove_refresh_token(&rt_key)?;

						Err(Error::InteractionRequired {
							reason: format!("the cached refresh token was rejected: {reason}"),
						})
					},
					Err(e) => Err(e),
				}
			})
			.await;

		client::record_outcome(KIND, &span, &result);

		result
	}
}
