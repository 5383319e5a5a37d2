//! Bounded exponential-backoff policy for transient upstream failures.

// self
use crate::_prelude::*;

/// Retry schedule applied to transient failures (no response, 5xx, 504).
///
/// Authorization failures (401) and rate limits (429) never enter this path;
/// they are handled by the renewal and classification branches respectively.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	/// Maximum number of retry attempts per request identity.
	pub max_retries: u32,
	/// Delay before the first retry; doubles on each subsequent attempt.
	pub base_delay: Duration,
	/// Upper bound on any single backoff delay.
	pub max_delay: Duration,
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay: Duration::seconds(1),
			max_delay: Duration::seconds(10),
		}
	}
}
impl RetryPolicy {
	/// Overrides the retry cap.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the initial backoff delay.
	pub fn with_base_delay(mut self, delay: Duration) -> Self {
		self.base_delay = delay;

		self
	}

	/// Overrides the backoff cap.
	pub fn with_max_delay(mut self, delay: Duration) -> Self {
		self.max_delay = delay;

		self
	}

	/// True when the observed outcome is safe to retry: the request produced no
	/// response at all, or the server answered in the 5xx range.
	pub fn is_transient(status: Option<u16>) -> bool {
		match status {
			None => true,
			Some(status) => status >= 500,
		}
	}

	/// Backoff before retry number `attempt` (zero-based): `base * 2^attempt`,
	/// capped at `max_delay`.
	pub fn delay(&self, attempt: u32) -> Duration {
		let factor = 2_i32.checked_pow(attempt).unwrap_or(i32::MAX);

		self.base_delay.checked_mul(factor).unwrap_or(self.max_delay).min(self.max_delay)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn delays_double_then_cap() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.delay(0), Duration::seconds(1));
		assert_eq!(policy.delay(1), Duration::seconds(2));
		assert_eq!(policy.delay(2), Duration::seconds(4));
		assert_eq!(policy.delay(3), Duration::seconds(8));
		assert_eq!(policy.delay(4), Duration::seconds(10));
		assert_eq!(policy.delay(30), Duration::seconds(10));
	}

	#[test]
	fn transient_classification_matches_taxonomy() {
		assert!(RetryPolicy::is_transient(None));
		assert!(RetryPolicy::is_transient(Some(500)));
		assert!(RetryPolicy::is_transient(Some(503)));
		assert!(RetryPolicy::is_transient(Some(504)));

		assert!(!RetryPolicy::is_transient(Some(401)));
		assert!(!RetryPolicy::is_transient(Some(404)));
		assert!(!RetryPolicy::is_transient(Some(429)));
	}
}
