//! Session configuration: endpoints, retry schedule, and classification fallbacks.

// self
use crate::{_prelude::*, retry::RetryPolicy};

/// Configuration consumed by [`Session`](crate::session::Session).
#[derive(Clone, Debug)]
pub struct SessionConfig {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Renewal endpoint path; called with an empty body, the refresh credential
	/// travels in an http-only cookie.
	pub refresh_path: String,
	/// Authentication endpoint paths excluded from the renewal flow: a 401 from
	/// any of these is fatal to the session rather than a renewal trigger.
	pub auth_paths: Vec<String>,
	/// Retry schedule for transient failures.
	pub retry: RetryPolicy,
	/// Wait reported to callers when a 429 carries no usable retry-after hint.
	pub rate_limit_fallback: Duration,
	/// Lightweight health-check path.
	pub health_path: String,
	/// Per-call timeout for the health-check path.
	pub health_timeout: Duration,
}
impl SessionConfig {
	const DEFAULT_AUTH_PATHS: [&'static str; 3] =
		["/auth/login", "/auth/register", "/auth/social-login"];
	const DEFAULT_HEALTH_PATH: &'static str = "/health";
	const DEFAULT_RATE_LIMIT_FALLBACK: Duration = Duration::seconds(30);
	const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh";

	/// Creates a configuration with default endpoints and schedules.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: Self::DEFAULT_REFRESH_PATH.into(),
			auth_paths: Self::DEFAULT_AUTH_PATHS.iter().map(|path| (*path).into()).collect(),
			retry: RetryPolicy::default(),
			rate_limit_fallback: Self::DEFAULT_RATE_LIMIT_FALLBACK,
			health_path: Self::DEFAULT_HEALTH_PATH.into(),
			health_timeout: Duration::seconds(5),
		}
	}

	/// Overrides the renewal endpoint path.
	pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Replaces the set of authentication endpoint paths.
	pub fn with_auth_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.auth_paths = paths.into_iter().map(Into::into).collect();

		self
	}

	/// Adds one authentication endpoint path.
	pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
		self.auth_paths.push(path.into());

		self
	}

	/// Overrides the retry schedule.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the rate-limit fallback wait.
	pub fn with_rate_limit_fallback(mut self, fallback: Duration) -> Self {
		self.rate_limit_fallback = fallback;

		self
	}

	/// Overrides the health-check path.
	pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
		self.health_path = path.into();

		self
	}

	/// Overrides the health-check timeout.
	pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
		self.health_timeout = timeout;

		self
	}

	/// True when a 401 from this path must not trigger token renewal.
	pub fn is_auth_path(&self, path: &str) -> bool {
		path == self.refresh_path || self.auth_paths.iter().any(|auth| auth == path)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> SessionConfig {
		SessionConfig::new(Url::parse("https://api.example.com").expect("Fixture URL should parse."))
	}

	#[test]
	fn default_auth_paths_cover_login_flows() {
		let config = config();

		assert!(config.is_auth_path("/auth/login"));
		assert!(config.is_auth_path("/auth/register"));
		assert!(config.is_auth_path("/auth/social-login"));
		assert!(config.is_auth_path("/auth/refresh"));
		assert!(!config.is_auth_path("/dive-sites"));
	}

	#[test]
	fn builders_override_defaults() {
		let config = config()
			.with_refresh_path("/session/renew")
			.with_auth_path("/auth/sso")
			.with_rate_limit_fallback(Duration::seconds(60));

		assert!(config.is_auth_path("/session/renew"));
		assert!(config.is_auth_path("/auth/sso"));
		assert_eq!(config.rate_limit_fallback, Duration::seconds(60));
	}
}
