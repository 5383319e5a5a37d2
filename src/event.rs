//! Fire-and-forget session notifications.
//!
//! Consumers register interest through
//! [`Session::subscribe`](crate::session::Session::subscribe) instead of relying on
//! ambient global event dispatch; delivery is best-effort and never blocks the
//! request pipeline.

// self
use crate::_prelude::*;

/// Broadcast notification emitted by the session layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionEvent {
	/// A renewal succeeded and a new access token is current.
	TokenRefreshed,
	/// The session ended: renewal failed or an already-renewed request was
	/// rejected again. Local credential state has been wiped.
	SessionExpired,
	/// The backend answered successfully after a period of observed failures.
	BackendOnline,
}
impl SessionEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionEvent::TokenRefreshed => "token_refreshed",
			SessionEvent::SessionExpired => "session_expired",
			SessionEvent::BackendOnline => "backend_online",
		}
	}
}
impl Display for SessionEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
