//! Advisory quota tracking fed by upstream response headers.
//!
//! The tracker only knows what the last response told it. It never counts requests itself and is
//! never shared across gateway instances, so it cannot stop a burst from several processes. By
//! default any reset instant still ahead of now holds the next call until that instant;
//! [`QuotaWait::WhenExhausted`] narrows this to windows the upstream reported as used up.

// crates.io
use oauth2::http::HeaderMap;
// self
use crate::{
	_prelude::*,
	config::{QuotaHeaders, QuotaWait},
};

/// Quota snapshot taken from the most recent response that carried both headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
	/// Requests left in the current window as reported by the upstream.
	pub remaining: i64,
	/// Unix timestamp at which the window resets.
	pub reset_at: i64,
}
impl RateLimitState {
	/// Returns `true` when no requests remain in the window.
	pub fn is_exhausted(&self) -> bool {
		self.remaining <= 0
	}

	/// Time left until the window resets, if the reset is still ahead of `now`.
	pub fn time_until_reset(&self, now: OffsetDateTime) -> Option<Duration> {
		let reset = OffsetDateTime::from_unix_timestamp(self.reset_at).ok()?;
		let delta = reset - now;

		delta.is_positive().then_some(delta)
	}
}

/// Outcome of consulting the tracker before an upstream call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request should sleep for the provided duration first.
	Delay(Duration),
	/// Waiting would overrun the request deadline or the configured ceiling.
	Exceeded {
		/// Time left until the window resets.
		retry_in: Duration,
	},
}

/// In-memory holder for the latest [`RateLimitState`].
#[derive(Debug)]
pub struct RateLimitTracker {
	headers: QuotaHeaders,
	wait: QuotaWait,
	state: Mutex<Option<RateLimitState>>,
}
impl RateLimitTracker {
	/// Creates an empty tracker reading the provided header names.
	pub fn new(headers: QuotaHeaders, wait: QuotaWait) -> Self {
		Self { headers, wait, state: Mutex::new(None) }
	}

	/// Replaces the snapshot with the provided values.
	pub fn record(&self, remaining: i64, reset_at: i64) {
		*self.state.lock() = Some(RateLimitState { remaining, reset_at });
	}

	/// Records quota state from response headers.
	///
	/// Both headers must be present and parse as integers; otherwise the snapshot is left
	/// untouched and `false` is returned.
	pub fn record_headers(&self, headers: &HeaderMap) -> bool {
		let remaining = header_i64(headers, &self.headers.remaining);
		let reset_at = header_i64(headers, &self.headers.reset);

		match (remaining, reset_at) {
			(Some(remaining), Some(reset_at)) => {
				self.record(remaining, reset_at);

				true
			},
			_ => false,
		}
	}

	/// Returns how long to wait before the next call, if the reported reset is still ahead.
	///
	/// Under [`QuotaWait::WhenExhausted`] a window with requests left never waits.
	pub fn should_wait(&self, now: OffsetDateTime) -> Option<Duration> {
		let state = (*self.state.lock())?;

		match self.wait {
			QuotaWait::WhenExhausted if !state.is_exhausted() => None,
			_ => state.time_until_reset(now),
		}
	}

	/// Applies the caller's deadline and the configured ceiling to [`should_wait`](Self::should_wait).
	pub fn evaluate(
		&self,
		now: OffsetDateTime,
		deadline: Option<OffsetDateTime>,
		max_wait: Option<Duration>,
	) -> RateLimitDecision {
		let Some(wait) = self.should_wait(now) else {
			return RateLimitDecision::Allow;
		};
		let past_deadline = deadline.is_some_and(|deadline| now + wait > deadline);
		let past_ceiling = max_wait.is_some_and(|max| wait > max);

		if past_deadline || past_ceiling {
			RateLimitDecision::Exceeded { retry_in: wait }
		} else {
			RateLimitDecision::Delay(wait)
		}
	}

	/// Returns the current snapshot, if any response carried quota headers.
	pub fn snapshot(&self) -> Option<RateLimitState> {
		*self.state.lock()
	}
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
	headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderValue;
	use time::macros;
	// self
	use super::*;

	const NOW: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	fn tracker() -> RateLimitTracker {
		RateLimitTracker::new(QuotaHeaders::default(), QuotaWait::default())
	}

	fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
		let mut map = HeaderMap::new();

		for (name, value) in pairs {
			map.insert(*name, HeaderValue::from_static(value));
		}

		map
	}

	#[test]
	fn empty_tracker_never_waits() {
		assert_eq!(tracker().should_wait(NOW), None);
		assert_eq!(tracker().snapshot(), None);
	}

	#[test]
	fn exhausted_quota_waits_until_reset() {
		let tracker = tracker();

		tracker.record(0, NOW.unix_timestamp() + 5);

		assert_eq!(tracker.should_wait(NOW), Some(Duration::seconds(5)));

		tracker.record(-1, NOW.unix_timestamp() + 5);

		assert_eq!(tracker.should_wait(NOW), Some(Duration::seconds(5)));
	}

	#[test]
	fn future_reset_waits_even_with_quota_left() {
		let tracker = tracker();

		tracker.record(100, NOW.unix_timestamp() + 5);

		assert_eq!(tracker.should_wait(NOW), Some(Duration::seconds(5)));
	}

	#[test]
	fn past_reset_never_waits() {
		let tracker = tracker();

		tracker.record(0, NOW.unix_timestamp());

		assert_eq!(tracker.should_wait(NOW), None);

		tracker.record(100, NOW.unix_timestamp() - 60);

		assert_eq!(tracker.should_wait(NOW), None);
	}

	#[test]
	fn exhaustion_policy_ignores_windows_with_quota_left() {
		let tracker = RateLimitTracker::new(QuotaHeaders::default(), QuotaWait::WhenExhausted);

		tracker.record(1, NOW.unix_timestamp() + 5);

		assert_eq!(tracker.should_wait(NOW), None);

		tracker.record(0, NOW.unix_timestamp() + 5);

		assert_eq!(tracker.should_wait(NOW), Some(Duration::seconds(5)));
	}

	#[test]
	fn header_parsing_requires_both_integers() {
		let tracker = tracker();

		assert!(!tracker.record_headers(&headers(&[("remaining-quota", "10")])));
		assert!(!tracker.record_headers(&headers(&[
			("remaining-quota", "ten"),
			("quota-reset-unix-time", "1735689605"),
		])));
		assert_eq!(tracker.snapshot(), None);
		assert!(tracker.record_headers(&headers(&[
			("remaining-quota", "0"),
			("quota-reset-unix-time", "1735689605"),
		])));
		assert_eq!(tracker.snapshot(), Some(RateLimitState { remaining: 0, reset_at: 1_735_689_605 }));
	}

	#[test]
	fn evaluate_honors_deadline_and_ceiling() {
		let tracker = tracker();

		tracker.record(0, NOW.unix_timestamp() + 5);

		assert_eq!(tracker.evaluate(NOW, None, None), RateLimitDecision::Delay(Duration::seconds(5)));
		assert_eq!(
			tracker.evaluate(NOW, Some(NOW + Duration::seconds(2)), None),
			RateLimitDecision::Exceeded { retry_in: Duration::seconds(5) }
		);
		assert_eq!(
			tracker.evaluate(NOW, None, Some(Duration::seconds(1))),
			RateLimitDecision::Exceeded { retry_in: Duration::seconds(5) }
		);
		assert_eq!(
			tracker.evaluate(NOW, Some(NOW + Duration::seconds(5)), Some(Duration::seconds(5))),
			RateLimitDecision::Delay(Duration::seconds(5))
		);
	}
}
