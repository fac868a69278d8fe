// self
use crate::{
	_prelude::*,
	obs::{CacheOutcome, FlowKind},
	result::TokenSource,
};

/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without the `tracing`
/// feature.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without the `tracing`
/// feature.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapping one acquisition flow.
///
/// Besides `flow` and `stage`, the span carries three fields filled in while the flow runs:
/// `cache` (lookup result), `source` (cache or identity provider) and `correlation_id`.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at the named entry point.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_sts_client.flow",
				flow = kind.as_str(),
				stage,
				cache = tracing::field::Empty,
				source = tracing::field::Empty,
				correlation_id = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Runs `fut` inside the span; no guard is held across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Records where the returned token came from.
	pub fn record_source(&self, source: TokenSource, correlation_id: Option<&str>) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("source", source.as_str());

			if let Some(correlation_id) = correlation_id {
				self.span.record("correlation_id", correlation_id);
			}
		}
		#[cfg(not(feature = "tracing"))]
		let _ = (source, correlation_id);
	}
}

/// Records the cache lookup result on the flow span currently entered.
pub fn record_cache_on_span(outcome: CacheOutcome) {
	#[cfg(feature = "tracing")]
	tracing::Span::current().record("cache", outcome.as_str());
	#[cfg(not(feature = "tracing"))]
	let _ = outcome;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_flows_pass_values_through() {
		let span = FlowSpan::new(FlowKind::Silent, "instrumented_flows_pass_values_through");
		let value = span
			.instrument(async {
				record_cache_on_span(CacheOutcome::Miss);

				42
			})
			.await;

		span.record_source(TokenSource::IdentityProvider, Some("corr-1"));

		assert_eq!(value, 42);
	}
}
