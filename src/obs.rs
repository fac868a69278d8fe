//! Optional observability for token acquisition flows.
//!
//! # Feature Flags
//!
//! - `tracing` wraps each flow in a span named `oauth2_sts_client.flow` carrying the `flow` and
//!   `stage` fields, plus `cache`, `source` and `correlation_id` once they are known.
//! - `metrics` increments `oauth2_sts_client_flow_total{flow, outcome}` per attempt, success and
//!   failure, and `oauth2_sts_client_cache_total{flow, result}` per cache lookup.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Acquisition flows observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// App-only token.
	ClientCredentials,
	/// Middle-tier exchange of a user assertion.
	OnBehalfOf,
	/// Authorization code redemption.
	AuthorizationCode,
	/// Cache lookup with refresh-token fallback.
	Silent,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::OnBehalfOf => "on_behalf_of",
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Silent => "silent",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Flow entered.
	Attempt,
	/// Token returned.
	Success,
	/// Error returned.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result of a cache lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
	/// Usable access token found.
	Hit,
	/// Nothing usable; the STS is called.
	Miss,
	/// More than one entry matched.
	Ambiguous,
}
impl CacheOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheOutcome::Hit => "hit",
			CacheOutcome::Miss => "miss",
			CacheOutcome::Ambiguous => "ambiguous",
		}
	}
}
impl Display for CacheOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
