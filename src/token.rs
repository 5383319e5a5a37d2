//! Access-token secret wrapper and the persisted credential record.

// self
use crate::_prelude::*;

/// Redacted bearer token wrapper keeping sensitive material out of logs.
///
/// There is at most one current access token per session; renewal replaces it
/// wholesale, it is never merged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Credential snapshot persisted by [`CredentialStore`](crate::store::CredentialStore)
/// backends so a session survives an application restart.
///
/// Only the short-lived access token is stored; the refresh credential lives in a
/// server-set http-only cookie and is never readable by this layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Current access token.
	pub access_token: AccessToken,
	/// Instant the token was installed or renewed.
	pub issued_at: OffsetDateTime,
}
impl CredentialRecord {
	/// Creates a record stamped with the current instant.
	pub fn new(access_token: AccessToken) -> Self {
		Self { access_token, issued_at: OffsetDateTime::now_utc() }
	}

	/// Overrides the issuance instant.
	pub fn with_issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = instant;

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_formatters_redact() {
		let token = AccessToken::new("super-secret");

		assert_eq!(format!("{token:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		assert_eq!(token.expose(), "super-secret");
	}

	#[test]
	fn record_round_trips_through_json() {
		let record = CredentialRecord::new(AccessToken::new("bearer-value"));
		let payload = serde_json::to_string(&record).expect("Record should serialize to JSON.");
		let round_trip: CredentialRecord =
			serde_json::from_str(&payload).expect("Serialized record should deserialize.");

		assert_eq!(round_trip.access_token, record.access_token);
		assert_eq!(round_trip.issued_at, record.issued_at);
	}
}
