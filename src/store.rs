//! Client-side credential persistence contracts and built-in backends.
//!
//! The store is the "survives reload" half of the session credential: only the
//! short-lived access token is persisted, the refresh credential never leaves its
//! http-only cookie. Backends are wiped on logout and on renewal failure.

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

// self
use crate::{_prelude::*, token::CredentialRecord};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the session's current credential.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the stored credential.
	fn persist(&self, record: CredentialRecord) -> StoreFuture<'_, ()>;

	/// Loads the stored credential, if present.
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>>;

	/// Removes the stored credential.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
