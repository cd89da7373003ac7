// self
use crate::{_prelude::*, obs::CallKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by gateway operations.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided call kind + stage.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("fitness_gateway.call", kind = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
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
}

/// Logs a best-effort operation that failed without failing the call.
pub fn record_degraded(op: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(op, error = %error, "degraded storage operation");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (op, error);
	}
}

/// Logs a successful credential rotation. Never includes secret material.
pub fn record_rotation(user_id: &str, expires_at: i64) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(user_id, expires_at, "access token rotated");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (user_id, expires_at);
	}
}

/// Logs a pause imposed by the locally observed quota.
pub fn record_rate_limit_wait(wait: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(wait_ms = wait.whole_milliseconds() as i64, "waiting for quota reset");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = wait;
	}
}
