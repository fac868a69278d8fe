//! OAuth 2.0 / OpenID Connect token acquisition for confidential clients: credential-aware token
//! requests, signed client assertions, and a token cache that refuses to guess between ambiguous
//! entries.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authority;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod http;
pub mod obs;
pub mod request;
pub mod result;
pub mod sts;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		cache::TokenCache,
		client::ReqwestConfidentialClient,
		config::ClientConfig,
		credential::CredentialKey,
		http::ReqwestHttpClient,
		sts::ReqwestTransportErrorMapper,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`ReqwestConfidentialClient`] for a plain-HTTP mock authority, returning the
	/// shared token cache alongside it.
	pub fn build_reqwest_test_client(
		authority: &str,
		credential: CredentialKey,
	) -> (ReqwestConfidentialClient, Arc<TokenCache>) {
		let config = ClientConfig::builder(authority, credential)
			.validate_authority(false)
			.build()
			.expect("Failed to build test client configuration.");
		let cache = Arc::new(TokenCache::new());
		let client = ReqwestConfidentialClient::with_http_client(
			config,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_cache(cache.clone());

		(client, cache)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
