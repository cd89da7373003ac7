//! Optional observability helpers for gateway calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `fitness_gateway.call` with the `kind`
//!   (operation) and `stage` (call site) fields, plus debug/warn events for cache traffic.
//! - Enable `metrics` to increment `fitness_gateway_call_total` (labeled by `kind` + `outcome`)
//!   and `fitness_gateway_cache_total` (labeled by `event`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Gateway operations observed by the instrumentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Resource read or write through [`Gateway::call`](crate::gateway::Gateway::call).
	Resource,
	/// Refresh-token exchange.
	Refresh,
	/// Authorization-code exchange.
	Authorize,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Resource => "resource",
			CallKind::Refresh => "refresh",
			CallKind::Authorize => "authorize",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
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

/// Cache traffic labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEvent {
	/// A fresh entry was served.
	Hit,
	/// No entry existed.
	Miss,
	/// A stale entry was found and evicted.
	Expired,
	/// An entry was written.
	Write,
	/// The backend failed; the operation degraded.
	Error,
}
impl CacheEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheEvent::Hit => "hit",
			CacheEvent::Miss => "miss",
			CacheEvent::Expired => "expired",
			CacheEvent::Write => "write",
			CacheEvent::Error => "error",
		}
	}
}
impl Display for CacheEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
