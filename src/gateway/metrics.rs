//! Per-gateway call counters.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Thread-safe counters shared by every clone of a gateway.
#[derive(Debug, Default)]
pub struct CallMetrics {
	attempts: AtomicU64,
	cache_hits: AtomicU64,
	upstream_requests: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
}
impl CallMetrics {
	/// Returns the number of `call` invocations.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of calls answered from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of HTTP requests sent to the resource API (retries included).
	pub fn upstream_requests(&self) -> u64 {
		self.upstream_requests.load(Ordering::Relaxed)
	}

	/// Returns the number of successful token rotations.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Copies every counter into a plain value.
	pub fn snapshot(&self) -> GatewayStats {
		GatewayStats {
			attempts: self.attempts(),
			cache_hits: self.cache_hits(),
			upstream_requests: self.upstream_requests(),
			refreshes: self.refreshes(),
			failures: self.failures(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_upstream_request(&self) {
		self.upstream_requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

/// Point-in-time copy of [`CallMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStats {
	/// `call` invocations.
	pub attempts: u64,
	/// Calls answered from the cache.
	pub cache_hits: u64,
	/// HTTP requests sent to the resource API.
	pub upstream_requests: u64,
	/// Successful token rotations.
	pub refreshes: u64,
	/// Calls that ended in an error.
	pub failures: u64,
}
impl GatewayStats {
	/// Share of calls answered from the cache, in `0.0..=1.0`.
	pub fn hit_rate(&self) -> f64 {
		if self.attempts == 0 { 0.0 } else { self.cache_hits as f64 / self.attempts as f64 }
	}
}
