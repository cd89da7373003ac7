// self
use crate::{
	cache::CacheKey,
	obs::{CacheEvent, CallKind, FlowOutcome},
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"fitness_gateway_call_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records cache traffic as a debug event and a counter (when enabled).
pub fn record_cache_event(event: CacheEvent, key: &CacheKey) {
	#[cfg(feature = "tracing")]
	{
		::tracing::debug!(event = event.as_str(), key = key.as_str(), "response cache");
	}
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("fitness_gateway_cache_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(not(any(feature = "tracing", feature = "metrics")))]
	{
		let _ = (event, key);
	}
	#[cfg(all(feature = "metrics", not(feature = "tracing")))]
	{
		let _ = key;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_callable_with_any_feature_set() {
		record_call_outcome(CallKind::Resource, FlowOutcome::Failure);
		record_cache_event(CacheEvent::Hit, &CacheKey::from_raw("k"));
	}
}
