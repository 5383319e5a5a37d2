//! Logical request descriptors and the response payload handed back to callers.

// self
use crate::_prelude::*;

/// HTTP method subset used by session callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
	/// HTTP GET.
	Get,
	/// HTTP POST.
	Post,
	/// HTTP PUT.
	Put,
	/// HTTP PATCH.
	Patch,
	/// HTTP DELETE.
	Delete,
}
impl Method {
	/// Returns the canonical wire spelling.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Logical request issued by callers of the session layer.
///
/// Descriptors carry everything the caller decides (method, path, query, JSON
/// body, extra headers); credentials and the base URL are attached by the
/// session when the request is prepared for the wire.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL.
	pub path: String,
	/// Query string pairs appended to the URL.
	pub query: Vec<(String, String)>,
	/// Optional JSON body.
	pub body: Option<serde_json::Value>,
	/// Extra headers merged into the prepared request.
	pub headers: Vec<(String, String)>,
	/// Optional per-call timeout overriding the transport default.
	pub timeout: Option<Duration>,
}
impl RequestDescriptor {
	fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			body: None,
			headers: Vec::new(),
			timeout: None,
		}
	}

	/// Creates a GET descriptor for the provided path.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Creates a POST descriptor for the provided path.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Creates a PUT descriptor for the provided path.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Creates a PATCH descriptor for the provided path.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Creates a DELETE descriptor for the provided path.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Appends a query string pair.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Appends an extra header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Overrides the per-call timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Returns the retry-accounting identity for this request.
	pub fn identity(&self) -> RequestIdentity {
		RequestIdentity { method: self.method, path: self.path.clone() }
	}
}

/// Retry-counter key: method + path.
///
/// Query parameters are deliberately excluded, so concurrent calls to the same
/// endpoint share one counter regardless of their parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
	/// HTTP method component.
	pub method: Method,
	/// Path component, without query parameters.
	pub path: String,
}
impl Display for RequestIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} {}", self.method, self.path)
	}
}

/// Response payload resolved by [`Session::issue`](crate::session::Session::issue).
#[derive(Clone, Debug)]
pub struct SessionResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers as name/value pairs.
	pub headers: Vec<(String, String)>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl SessionResponse {
	/// True for any non-error status (below 400).
	pub fn is_success(&self) -> bool {
		self.status < 400
	}

	/// Case-insensitive header lookup returning the first matching value.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Decodes the body as JSON, reporting the failing path on malformed payloads.
	pub fn json<T>(&self) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::Decode { source })
	}

	/// Returns the body lossily decoded as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identity_ignores_query_and_body() {
		let bare = RequestDescriptor::get("/dive-sites");
		let decorated = RequestDescriptor::get("/dive-sites")
			.with_query("page", "2")
			.with_header("x-request-id", "abc");

		assert_eq!(bare.identity(), decorated.identity());
		assert_eq!(bare.identity().to_string(), "GET /dive-sites");
	}

	#[test]
	fn header_lookup_is_case_insensitive() {
		let response = SessionResponse {
			status: 429,
			headers: vec![("Retry-After".into(), "45".into())],
			body: Vec::new(),
		};

		assert_eq!(response.header("retry-after"), Some("45"));
		assert_eq!(response.header("RETRY-AFTER"), Some("45"));
		assert_eq!(response.header("content-type"), None);
	}

	#[test]
	fn json_decode_reports_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			access_token: String,
		}

		let response = SessionResponse {
			status: 200,
			headers: Vec::new(),
			body: b"{\"access_token\":42}".to_vec(),
		};
		let err = response.json::<Payload>().expect_err("Mistyped field should fail to decode.");

		assert!(matches!(err, Error::Decode { .. }));
	}
}
