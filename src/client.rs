//! Token acquisition orchestrator.
//!
//! [`ConfidentialClient`] sequences every flow the same way: cache lookup, request build, POST,
//! response assembly, and cache write. A per-query singleflight guard makes concurrent callers
//! asking for the same token share one token-endpoint call.

mod authorization_code;
mod client_credentials;
mod on_behalf_of;
mod silent;

// self
use crate::{
	_prelude::*,
	auth::{SubjectType, TokenSecret},
	cache::{CacheQuery, TokenCache},
	clock::{Clock, SystemClock},
	config::ClientConfig,
	credential::UserAssertion,
	http::TokenHttpClient,
	obs::{self, CacheOutcome, FlowKind, FlowOutcome, FlowSpan},
	request::{self, TokenGrant},
	result::AuthenticationResult,
	sts::{self, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, sts::ReqwestTransportErrorMapper};

/// Client specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestConfidentialClient =
	ConfidentialClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Acquires tokens for one application registration against one authority.
///
/// Clones share the transport, the token cache and the singleflight guards.
#[derive(Clone)]
pub struct ConfidentialClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP transport used for every token request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors.
	pub transport_mapper: Arc<M>,
	/// Token cache shared by all flows.
	pub cache: Arc<TokenCache>,
	/// Validated client configuration.
	pub config: ClientConfig,
	/// Time source for assertions and expiry checks.
	pub clock: Arc<dyn Clock>,
	flow_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> ConfidentialClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client over a caller-provided transport and mapper, with an empty in-memory
	/// cache and the system clock.
	pub fn with_http_client(
		config: ClientConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			cache: Default::default(),
			config,
			clock: Arc::new(SystemClock),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the token cache, for example with one wired to a [`crate::cache::FileCache`].
	pub fn with_cache(mut self, cache: Arc<TokenCache>) -> Self {
		self.cache = cache;

		self
	}

	/// Replaces the clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	fn query(&self, subject_type: SubjectType) -> CacheQuery {
		let authority = self.config.authority.clone();

		CacheQuery::new(authority, self.config.client_id().clone(), subject_type)
			.policy(self.config.policy.clone())
	}

	fn flow_guard(&self, query: &CacheQuery) -> FlowGuard<'_> {
		let key = query.canonical();
		let lock = self
			.flow_guards
			.lock()
			.entry(key.clone())
			.or_insert_with(|| Arc::new(AsyncMutex::new(())))
			.clone();

		FlowGuard { guards: &self.flow_guards, key, lock }
	}

	fn ensure_confidential(&self, grant: &'static str) -> Result<()> {
		if self.config.credential.is_confidential() {
			Ok(())
		} else {
			Err(Error::InvalidCredential {
				reason: format!("the {grant} grant requires a confidential client credential"),
			})
		}
	}

	/// Returns a cached result that is still valid outside the expiry margin.
	fn lookup(
		&self,
		kind: FlowKind,
		query: &CacheQuery,
		assertion: Option<&UserAssertion>,
	) -> Result<Option<AuthenticationResult>> {
		let resolved = match self.cache.resolve_token(query) {
			Ok(resolved) => resolved,
			Err(e) => {
				if matches!(e, Error::MultipleTokensMatched { .. }) {
					record_cache(kind, CacheOutcome::Ambiguous);
				}

				return Err(e);
			},
		};
		let now = self.clock.now();
		let margin = self.config.expiration_margin;
		let hit = resolved
			.filter(|(_, credential)| !credential.is_expired_at(now, margin))
			.and_then(|(key, credential)| {
				AuthenticationResult::from_cache(credential, key.target, assertion)
			});

		record_cache(kind, if hit.is_some() { CacheOutcome::Hit } else { CacheOutcome::Miss });

		Ok(hit)
	}

	/// Builds, sends and assembles one token request.
	async fn redeem(
		&self,
		grant: &TokenGrant,
		existing_refresh_token: Option<&TokenSecret>,
	) -> Result<AuthenticationResult> {
		let endpoint = self.config.endpoint()?;
		let params = request::build_request(
			grant,
			&self.config.credential,
			endpoint.as_str(),
			&self.config.extra_parameters,
			self.clock.as_ref(),
		)?;
		let issued_at = self.clock.now();
		let response = sts::exchange(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			&endpoint,
			grant.grant_type(),
			&params,
		)
		.await?;

		AuthenticationResult::from_response(
			response,
			grant.target(),
			existing_refresh_token,
			issued_at,
		)
	}

	/// Writes a network result into the cache. Results with no known target are not cached.
	fn store(&self, query: &CacheQuery, result: &AuthenticationResult) -> Result<()> {
		let Some(target) = result.target.clone() else {
			#[cfg(feature = "tracing")]
			tracing::debug!("Token response names no resource or scope; not caching it.");

			return Ok(());
		};

		self.cache.save(query, target, result.to_cached_credential())?;

		#[cfg(feature = "tracing")]
		tracing::debug!(entries = self.cache.count(), "Token saved to the cache.");

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl ConfidentialClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client with its own reqwest transport.
	pub fn new(config: ClientConfig) -> Self {
		Self::with_http_client(
			config,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for ConfidentialClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConfidentialClient")
			.field("authority", &self.config.authority)
			.field("client_id", self.config.client_id())
			.field("cache", &self.cache)
			.finish()
	}
}

/// Singleflight slot for one cache query.
///
/// The map entry is removed when the last holder drops, so the map only holds queries with a
/// flow in progress.
struct FlowGuard<'a> {
	guards: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
	key: String,
	lock: Arc<AsyncMutex<()>>,
}
impl FlowGuard<'_> {
	async fn lock(&self) -> async_lock::MutexGuard<'_, ()> {
		self.lock.lock().await
	}
}
impl Drop for FlowGuard<'_> {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// One reference lives in the map, one here.
		if Arc::strong_count(&self.lock) == 2 {
			guards.remove(&self.key);
		}
	}
}

fn record_cache(kind: FlowKind, outcome: CacheOutcome) {
	#[cfg(feature = "tracing")]
	tracing::debug!(flow = kind.as_str(), result = outcome.as_str(), "Cache lookup finished.");

	obs::record_cache_outcome(kind, outcome);
	obs::record_cache_on_span(outcome);
}

fn record_outcome(kind: FlowKind, span: &FlowSpan, result: &Result<AuthenticationResult>) {
	match result {
		Ok(result) => {
			span.record_source(result.source, result.correlation_id.as_deref());
			obs::record_flow_outcome(kind, FlowOutcome::Success);
		},
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::VecDeque;
	// crates.io
	use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode};
	// self
	use super::*;
	use crate::{
		auth::{ClientId, ResourceOrScope, UniqueId, UserIdentifier},
		credential::{CredentialKey, SecretMaterial},
		error::TransientError,
		http::{ResponseMetadata, ResponseMetadataSlot},
		request::GrantType,
	};

	const TOKEN: &str =
		r#"{"token_type":"Bearer","access_token":"at-1","refresh_token":"rt-1","expires_in":3600}"#;
	const REFRESHED: &str = r#"{"token_type":"Bearer","access_token":"at-2","expires_in":3600}"#;
	// Unsigned id_token for `alice@contoso.com` (oid `user-1`, tid `tenant-1`).
	const SIGNED_IN: &str = concat!(
		r#"{"token_type":"Bearer","access_token":"at-1","refresh_token":"rt-1","expires_in":3600,"#,
		r#""id_token":"eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0."#,
		"eyJvaWQiOiJ1c2VyLTEiLCJwcmVmZXJyZWRfdXNlcm5hbWUiOiJhbGljZUBjb250b3NvLmNvbSIsInRpZCI6InRl",
		r#"bmFudC0xIn0."}"#,
	);
	const ROTATED: &str =
		r#"{"token_type":"Bearer","access_token":"at-2","refresh_token":"rt-2","expires_in":3600}"#;
	const REJECTED: &str = r#"{"error":"invalid_grant","error_description":"AADSTS70008 expired"}"#;

	#[derive(Debug)]
	struct ScriptExhausted;
	impl Display for ScriptExhausted {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.write_str("No scripted response left.")
		}
	}
	impl StdError for ScriptExhausted {}

	#[derive(Default)]
	struct Script {
		responses: Mutex<VecDeque<(u16, &'static str)>>,
		requests: Mutex<Vec<String>>,
	}

	#[derive(Clone, Default)]
	struct ScriptedTransport(Arc<Script>);
	impl ScriptedTransport {
		fn new(responses: impl IntoIterator<Item = (u16, &'static str)>) -> Self {
			let responses = Mutex::new(responses.into_iter().collect());
			let script = Script { responses, ..Default::default() };

			Self(Arc::new(script))
		}

		fn requests(&self) -> Vec<String> {
			self.0.requests.lock().clone()
		}
	}
	impl TokenHttpClient for ScriptedTransport {
		type Handle = ScriptedHandle;
		type TransportError = ScriptExhausted;

		fn with_metadata(&self, _slot: ResponseMetadataSlot) -> Self::Handle {
			ScriptedHandle(Arc::clone(&self.0))
		}
	}

	struct ScriptedHandle(Arc<Script>);
	impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
		type Error = HttpClientError<ScriptExhausted>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			let script = Arc::clone(&self.0);

			Box::pin(async move {
				// Let concurrent callers queue up on the singleflight guard.
				tokio::task::yield_now().await;

				script.requests.lock().push(String::from_utf8_lossy(request.body()).into_owned());

				let (status, body) = script
					.responses
					.lock()
					.pop_front()
					.ok_or_else(|| HttpClientError::Reqwest(Box::new(ScriptExhausted)))?;
				let mut response = HttpResponse::new(body.as_bytes().to_vec());

				*response.status_mut() =
					StatusCode::from_u16(status).expect("Scripted status should be valid.");

				Ok(response)
			})
		}
	}

	struct ScriptMapper;
	impl TransportErrorMapper<ScriptExhausted> for ScriptMapper {
		fn map_transport_error(
			&self,
			_grant: GrantType,
			meta: Option<&ResponseMetadata>,
			error: HttpClientError<ScriptExhausted>,
		) -> Error {
			TransientError::TokenEndpoint {
				message: error.to_string(),
				status: meta.and_then(|meta| meta.status),
				retry_after: None,
			}
			.into()
		}
	}

	type ScriptedClient = ConfidentialClient<ScriptedTransport, ScriptMapper>;

	fn client(transport: &ScriptedTransport) -> ScriptedClient {
		let client_id = ClientId::new("client-a").expect("Client fixture should be valid.");
		let credential = CredentialKey::secret(client_id, SecretMaterial::new("s3cr3t"))
			.expect("Secret credential should build.");
		let config = ClientConfig::builder("https://login.example.com/tenant", credential)
			.build()
			.expect("Client configuration should build.");

		ConfidentialClient::with_http_client(config, transport.clone(), ScriptMapper)
	}

	fn scopes(scopes: &[&str]) -> ResourceOrScope {
		ResourceOrScope::scopes(scopes.iter().copied()).expect("Scope fixture should be valid.")
	}

	fn redirect_uri() -> Url {
		Url::parse("https://app.example.com/callback").expect("Redirect fixture should parse.")
	}

	#[tokio::test]
	async fn client_credentials_reuses_cached_token() {
		let transport = ScriptedTransport::new([(200, TOKEN), (200, REFRESHED)]);
		let client = client(&transport);
		let first = client
			.acquire_token_for_client(scopes(&["api.read"]), false)
			.await
			.expect("First request should reach the token endpoint.");
		let second = client
			.acquire_token_for_client(scopes(&["api.read"]), false)
			.await
			.expect("Second request should be served from the cache.");
		let forced = client
			.acquire_token_for_client(scopes(&["api.read"]), true)
			.await
			.expect("Forced refresh should reach the token endpoint.");
		let requests = transport.requests();

		assert_eq!(first.source, crate::result::TokenSource::IdentityProvider);
		assert_eq!(second.source, crate::result::TokenSource::Cache);
		assert_eq!(second.access_token.expose(), "at-1");
		assert_eq!(forced.access_token.expose(), "at-2");
		assert_eq!(requests.len(), 2);
		assert!(requests[0].contains("grant_type=client_credentials"));
		assert!(requests[0].contains("client_secret=s3cr3t"));
		assert_eq!(client.cache.count(), 1, "A forced refresh should replace the slot entry.");
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_request() {
		let transport = ScriptedTransport::new([(200, TOKEN), (200, REFRESHED)]);
		let client = client(&transport);
		let (first, second) = tokio::join!(
			client.acquire_token_for_client(scopes(&["api.read"]), false),
			client.acquire_token_for_client(scopes(&["api.read"]), false),
		);

		assert_eq!(first.expect("First caller should succeed.").access_token.expose(), "at-1");
		assert_eq!(second.expect("Second caller should succeed.").access_token.expose(), "at-1");
		assert_eq!(transport.requests().len(), 1);
		assert!(client.flow_guards.lock().is_empty(), "Finished flows should release their guard.");
	}

	#[tokio::test]
	async fn distinct_assertions_do_not_accumulate_guards() {
		let transport = ScriptedTransport::new(std::iter::repeat_n((200, TOKEN), 50));
		let client = client(&transport);

		for i in 0..50 {
			let assertion =
				UserAssertion::new(format!("assertion-{i}")).expect("Assertion should be valid.");

			client
				.acquire_token_on_behalf_of(scopes(&["api.read"]), assertion)
				.await
				.expect("Each exchange should succeed.");
		}

		assert_eq!(transport.requests().len(), 50);
		assert!(client.flow_guards.lock().is_empty());
	}

	#[tokio::test]
	async fn public_client_cannot_use_client_credentials() {
		let transport = ScriptedTransport::default();
		let client_id = ClientId::new("public-app").expect("Client fixture should be valid.");
		let credential = CredentialKey::public_client(client_id);
		let config = ClientConfig::builder("https://login.example.com/tenant", credential)
			.build()
			.expect("Client configuration should build.");
		let client: ScriptedClient =
			ConfidentialClient::with_http_client(config, transport.clone(), ScriptMapper);
		let err = client
			.acquire_token_for_client(scopes(&["api.read"]), false)
			.await
			.expect_err("Public clients must be rejected.");

		assert!(matches!(err, Error::InvalidCredential { .. }));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn on_behalf_of_cache_hits_require_the_same_assertion() {
		let transport = ScriptedTransport::new([(200, TOKEN), (200, REFRESHED)]);
		let client = client(&transport);
		let alice = UserAssertion::new("assertion-alice").expect("Assertion should be valid.");
		let bob = UserAssertion::new("assertion-bob").expect("Assertion should be valid.");
		let first = client
			.acquire_token_on_behalf_of(scopes(&["api.read"]), alice.clone())
			.await
			.expect("First exchange should succeed.");
		let repeated = client
			.acquire_token_on_behalf_of(scopes(&["api.read"]), alice.clone())
			.await
			.expect("Repeated exchange should hit the cache.");
		let other = client
			.acquire_token_on_behalf_of(scopes(&["api.read"]), bob.clone())
			.await
			.expect("A different assertion should reach the token endpoint.");
		let requests = transport.requests();

		assert_eq!(first.user_assertion_hash.as_deref(), Some(alice.hash()));
		assert_eq!(repeated.access_token.expose(), "at-1");
		assert_eq!(other.access_token.expose(), "at-2");
		assert_eq!(other.user_assertion_hash.as_deref(), Some(bob.hash()));
		assert_eq!(requests.len(), 2);
		assert!(requests[0].contains("requested_token_use=on_behalf_of"));
	}

	#[tokio::test]
	async fn silent_uses_cache_then_refresh_token() {
		let transport = ScriptedTransport::new([(200, TOKEN), (200, REFRESHED)]);
		let client = client(&transport);

		let target = Some(scopes(&["a", "b"]));

		client
			.acquire_token_by_authorization_code("code-1", redirect_uri(), target)
			.await
			.expect("Code redemption should succeed.");

		let cached = client
			.acquire_token_silent(scopes(&["a"]), None)
			.await
			.expect("A subset of the cached scopes should be served from the cache.");
		let refreshed = client
			.acquire_token_silent(scopes(&["c"]), None)
			.await
			.expect("A new scope should be redeemed with the cached refresh token.");
		let requests = transport.requests();

		assert_eq!(cached.access_token.expose(), "at-1");
		assert_eq!(refreshed.access_token.expose(), "at-2");
		assert_eq!(
			refreshed.refresh_token.as_ref().map(|token| token.expose()),
			Some("rt-1"),
			"The existing refresh token should carry over."
		);
		assert_eq!(requests.len(), 2);
		assert!(requests[1].contains("grant_type=refresh_token"));
		assert!(requests[1].contains("refresh_token=rt-1"));
	}

	#[tokio::test]
	async fn rotated_refresh_token_stays_with_the_cached_user() {
		let transport =
			ScriptedTransport::new([(200, SIGNED_IN), (200, ROTATED), (200, REFRESHED)]);
		let client = client(&transport);
		let user = || {
			UserIdentifier::UniqueId(UniqueId::new("user-1").expect("Unique id should be valid."))
		};

		client
			.acquire_token_by_authorization_code("code-1", redirect_uri(), Some(scopes(&["a"])))
			.await
			.expect("Code redemption should succeed.");

		let rotated = client
			.acquire_token_silent(scopes(&["c"]), Some(user()))
			.await
			.expect("The cached refresh token should be redeemed.");
		let refresh_tokens =
			client.cache.refresh_tokens().expect("Refresh token listing should succeed.");

		assert_eq!(
			rotated.user.as_ref().and_then(|user| user.unique_id.as_deref()),
			Some("user-1"),
			"The cached user should carry over when the response has no id_token."
		);
		assert_eq!(refresh_tokens.len(), 1, "The rotated token should replace the old one.");
		assert_eq!(refresh_tokens[0].1.refresh_token.expose(), "rt-2");

		client
			.acquire_token_silent(scopes(&["d"]), Some(user()))
			.await
			.expect("The rotated refresh token should be redeemed.");

		let requests = transport.requests();

		assert_eq!(requests.len(), 3);
		assert!(requests[1].contains("refresh_token=rt-1"));
		assert!(requests[2].contains("refresh_token=rt-2"));
	}

	#[tokio::test]
	async fn rejected_refresh_token_requires_interaction() {
		let transport = ScriptedTransport::new([(200, TOKEN), (400, REJECTED)]);
		let client = client(&transport);

		client
			.acquire_token_by_authorization_code("code-1", redirect_uri(), Some(scopes(&["a"])))
			.await
			.expect("Code redemption should succeed.");

		assert_eq!(client.cache.refresh_token_count(), 1);

		let err = client
			.acquire_token_silent(scopes(&["c"]), None)
			.await
			.expect_err("A rejected refresh token should fail the silent call.");

		assert!(matches!(err, Error::InteractionRequired { .. }));
		assert_eq!(client.cache.refresh_token_count(), 0);

		let err = client
			.acquire_token_silent(scopes(&["c"]), None)
			.await
			.expect_err("Without a refresh token the silent call should fail locally.");

		assert!(matches!(err, Error::InteractionRequired { .. }));
		assert_eq!(transport.requests().len(), 2);
	}

	#[tokio::test]
	async fn expired_tokens_are_not_served() {
		let transport = ScriptedTransport::new([(200, TOKEN), (200, REFRESHED)]);
		let clock = Arc::new(crate::clock::FixedClock::new(OffsetDateTime::now_utc()));
		let client = client(&transport).with_clock(clock.clone());

		client
			.acquire_token_for_client(ResourceOrScope::resource("https://graph.example.com"), false)
			.await
			.expect("First request should succeed.");
		clock.advance(Duration::minutes(56));

		let renewed = client
			.acquire_token_for_client(ResourceOrScope::resource("https://graph.example.com"), false)
			.await
			.expect("A token inside the expiry margin should be renewed.");

		assert_eq!(renewed.access_token.expose(), "at-2");
		assert_eq!(transport.requests().len(), 2);
	}
}
