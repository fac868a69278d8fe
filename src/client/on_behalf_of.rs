//! Middle-tier exchange of an incoming user assertion.

// self
use crate::{
	_prelude::*,
	auth::{ResourceOrScope, SubjectType, UserIdentifier},
	client::{self, ConfidentialClient},
	credential::UserAssertion,
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
	/// Exchanges `assertion` for a token to `target` on behalf of its user.
	///
	/// Cached entries are located by the assertion hash (or the assertion's user name when one
	/// was attached). The stored token is stamped with the hash so later calls with the same
	/// assertion hit the cache.
	pub async fn acquire_token_on_behalf_of(
		&self,
		target: ResourceOrScope,
		assertion: UserAssertion,
	) -> Result<AuthenticationResult> {
		const KIND: FlowKind = FlowKind::OnBehalfOf;

		let span = FlowSpan::new(KIND, "acquire_token_on_behalf_of");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.ensure_confidential("on_behalf_of")?;

				let mut query = self
					.query(SubjectType::UserPlusClient)
					.target(target.clone())
					.assertion_hash(assertion.hash());

				if let Some(user_name) = assertion.user_name() {
					query = query.user(UserIdentifier::DisplayableId(user_name.clone()));
				}

				let guard = self.flow_guard(&query);
				let _singleflight = guard.lock().await;

				if let Some(hit) = self.lookup(KIND, &query, Some(&assertion))? {
					return Ok(hit);
				}

				let hash = assertion.hash().to_owned();
				let grant = TokenGrant::OnBehalfOf { assertion, target: Some(target) };
				let result = self.redeem(&grant, None).await?.with_assertion_hash(hash);

				self.store(&query, &result)?;

				Ok(result)
			})
			.await;

		client::record_outcome(KIND, &span, &result);

		result
	}
}
