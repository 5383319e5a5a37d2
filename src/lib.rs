//! Bearer-token session layer for HTTP API clients - single-flighted renewal, bounded
//! retries, and rate-limit classification in one crate.
//!
//! Callers issue logical requests through [`session::Session::issue`] and receive
//! either a response or a terminal, classified [`error::Error`]; expired access
//! tokens are renewed transparently behind a single-flight guard, transient
//! upstream failures are retried with capped exponential backoff, and 429s are
//! surfaced with retry-after metadata instead of being retried.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod obs;
pub mod request;
pub mod retry;
pub mod session;
pub mod store;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::SessionConfig,
		http::ReqwestTransport,
		retry::RetryPolicy,
		session::Session,
		store::{CredentialStore, MemoryCredentialStore},
		token::AccessToken,
	};

	/// Session type alias used by reqwest-backed integration tests.
	pub type ReqwestTestSession = Session<ReqwestTransport>;

	/// Builds a config pointed at a mock server, with millisecond-scale backoff so
	/// retry-bound tests do not sleep for real seconds.
	pub fn test_session_config(base_url: &str) -> SessionConfig {
		let base_url = Url::parse(base_url).expect("Failed to parse mock server base URL.");
		let retry = RetryPolicy::default()
			.with_base_delay(Duration::milliseconds(10))
			.with_max_delay(Duration::milliseconds(40));

		SessionConfig::new(base_url).with_retry(retry)
	}

	/// Constructs a [`Session`] backed by an in-memory store and the reqwest
	/// transport used across integration tests.
	pub fn build_test_session(config: SessionConfig) -> (ReqwestTestSession, Arc<MemoryCredentialStore>) {
		let store_backend = Arc::new(MemoryCredentialStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let transport =
			ReqwestTransport::new().expect("Failed to build reqwest transport for tests.");
		let session = Session::with_transport(config, store, transport);

		(session, store_backend)
	}

	/// Seeds the session with an in-memory access token, as after a login.
	pub async fn seed_token(session: &ReqwestTestSession, token: &str) {
		session
			.install_credential(AccessToken::new(token))
			.await
			.expect("Failed to seed access token into test session.");
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;
#[cfg(test)] use bearer_session as _;
