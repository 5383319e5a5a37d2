//! Transport primitives for the session layer.
//!
//! The module exposes [`SessionTransport`] so downstream applications can swap in a
//! custom HTTP stack without touching the renewal or retry machinery. The default
//! [`ReqwestTransport`] keeps a cookie store enabled because the refresh credential
//! travels in a server-set http-only cookie that this layer never reads directly.

// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	request::{Method, SessionResponse},
};

/// Boxed future returned by [`SessionTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<SessionResponse, TransportError>> + 'a + Send>>;

/// Fully assembled wire request produced by
/// [`Session::attach_credential`](crate::session::Session::attach_credential).
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL (base + path + query).
	pub url: Url,
	/// Header name/value pairs, credentials included.
	pub headers: Vec<(String, String)>,
	/// Serialized request body, when present.
	pub body: Option<Vec<u8>>,
	/// Per-call timeout overriding the transport default.
	pub timeout: Option<Duration>,
}

/// Abstraction over HTTP stacks capable of dispatching prepared requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared
/// across session handles, and must surface "no response arrived" conditions as
/// [`TransportError`] values so the retry classifier can treat them as transient.
pub trait SessionTransport
where
	Self: 'static + Send + Sync,
{
	/// Dispatches the request and collects the full response body.
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The client is built with its cookie store enabled; without it the http-only
/// refresh cookie would be dropped and every renewal attempt would fail.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with cookie persistence enabled.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing [`ReqwestClient`]. The caller is responsible for enabling
	/// a cookie store if token renewal is expected to work.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl SessionTransport for ReqwestTransport {
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = client.request(method, request.url.as_str());

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}
			if let Some(timeout) = request.timeout.and_then(|t| t.try_into().ok()) {
				builder = builder.timeout(timeout);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.map(|(name, value)| {
					(name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok(SessionResponse { status, headers, body })
		})
	}
}

/// Extracts a retry-after hint from a rate-limited response.
///
/// Precedence: `Retry-After` header as integer seconds, then as an RFC 2822 date,
/// then a `retry_after` field in a JSON body. Returns `None` when no usable hint
/// exists so the caller can apply the configured fallback.
pub fn parse_retry_after(response: &SessionResponse) -> Option<Duration> {
	if let Some(raw) = response.header("retry-after").map(str::trim) {
		if let Ok(secs) = raw.parse::<u64>() {
			return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
		}
		if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
			let delta = moment - OffsetDateTime::now_utc();

			if delta.is_positive() {
				return Some(delta);
			}
		}
	}

	let payload: serde_json::Value = serde_json::from_slice(&response.body).ok()?;
	let secs = payload.get("retry_after")?.as_u64()?;

	Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
}
