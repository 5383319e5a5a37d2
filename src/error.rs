//! Session-level error taxonomy shared across the request pipeline, transports, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classified failure surfaced to callers of the session layer.
///
/// Recoverable classes (expired authorization, transient upstream failures) are
/// handled inside [`Session::issue`](crate::session::Session::issue) and only reach
/// callers once local recovery is exhausted; everything else propagates on first
/// occurrence.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) surfaced outside the retry loop.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The session can no longer be renewed; callers should transition to a
	/// logged-out state.
	#[error("Session is no longer valid: {reason}.")]
	SessionExpired {
		/// Summary of the renewal or authorization failure that ended the session.
		reason: String,
	},
	/// Upstream asked the caller to slow down; never retried automatically.
	#[error("Request was rate limited; retry after {retry_after}.")]
	RateLimited {
		/// Wait advertised by the server, or the configured fallback.
		retry_after: Duration,
	},
	/// Transient upstream failure that survived every retry attempt.
	#[error("Server is unavailable.")]
	ServerUnavailable {
		/// Final HTTP status observed, absent when no response arrived at all.
		status: Option<u16>,
	},
	/// Non-retryable HTTP error passed through unchanged (4xx other than 401/429).
	#[error("Request failed with HTTP {status}.")]
	Http {
		/// HTTP status returned by the server.
		status: u16,
		/// Raw response body, lossily decoded for caller inspection.
		body: String,
	},
	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure with the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the HTTP status associated with the failure, when one exists.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::RateLimited { .. } => Some(429),
			Self::ServerUnavailable { status } => *status,
			Self::Http { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns the advertised wait before the caller should retry, if rate limited.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after } => Some(*retry_after),
			_ => None,
		}
	}

	/// True when the failure is a 429 rate-limit classification.
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, Self::RateLimited { .. })
	}

	/// True when the final observed failure was a gateway timeout (504).
	pub fn is_gateway_timeout(&self) -> bool {
		matches!(self, Self::ServerUnavailable { status: Some(504) })
	}

	/// True when the failure ends the session and should trigger a logout.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired { .. })
	}
}

/// Configuration and request-assembly failures raised locally.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request path cannot be joined onto the configured base URL.
	#[error("Request path `{path}` is invalid.")]
	InvalidPath {
		/// Offending request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Renewal endpoint returned a payload without a usable access token.
	#[error("Renewal response is missing an access token.")]
	MissingAccessToken,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while dispatching the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while dispatching the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
