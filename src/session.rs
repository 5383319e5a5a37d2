//! The authenticated request pipeline: credential attachment, classification,
//! renewal, retry, and recovery notifications.

pub mod renewal;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	config::SessionConfig,
	error::ConfigError,
	event::SessionEvent,
	http::{self, PreparedRequest, SessionTransport},
	obs::{self, PhaseKind, PhaseOutcome, PhaseSpan},
	request::{RequestDescriptor, RequestIdentity, SessionResponse},
	retry::RetryPolicy,
	session::renewal::RenewalState,
	store::CredentialStore,
	token::{AccessToken, CredentialRecord},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport stack.
pub type ReqwestSession = Session<ReqwestTransport>;

type SessionFuture<'a> = Pin<Box<dyn Future<Output = Result<SessionResponse>> + 'a + Send>>;

const EVENT_CAPACITY: usize = 16;

/// Shared request/response pipeline for one authenticated API.
///
/// All mutable session state (the current credential, the renewal flag + waiter
/// queue, the retry counters) lives in explicit fields on this component rather
/// than ambient globals, so the single-flight and queue invariants are testable
/// against isolated instances. Handles are cheap to clone and share one state.
pub struct Session<T>
where
	T: ?Sized + SessionTransport,
{
	/// HTTP transport used for every outbound request.
	pub transport: Arc<T>,
	/// Endpoint and policy configuration.
	pub config: SessionConfig,
	/// Persistence backend for the current credential.
	pub store: Arc<dyn CredentialStore>,
	credential: Arc<RwLock<Option<AccessToken>>>,
	renewal: Arc<Mutex<RenewalState>>,
	retry_counters: Arc<Mutex<HashMap<RequestIdentity, u32>>>,
	online: Arc<AtomicBool>,
	events: broadcast::Sender<SessionEvent>,
}
impl<T> Session<T>
where
	T: ?Sized + SessionTransport,
{
	/// Creates a session that reuses the caller-provided transport.
	pub fn with_transport(
		config: SessionConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		Self {
			transport: transport.into(),
			config,
			store,
			credential: Default::default(),
			renewal: Default::default(),
			retry_counters: Default::default(),
			online: Arc::new(AtomicBool::new(true)),
			events,
		}
	}

	/// Registers interest in session notifications.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.events.subscribe()
	}

	/// Loads a persisted credential into the session, returning whether one was
	/// restored. Call once at startup so a session survives an application reload.
	pub async fn bootstrap(&self) -> Result<bool> {
		match self.store.load().await? {
			Some(record) => {
				*self.credential.write() = Some(record.access_token);

				Ok(true)
			},
			None => Ok(false),
		}
	}

	/// Installs a freshly issued access token (e.g., after a login response) and
	/// persists it.
	pub async fn install_credential(&self, token: AccessToken) -> Result<()> {
		*self.credential.write() = Some(token.clone());
		self.store.persist(CredentialRecord::new(token)).await?;

		Ok(())
	}

	/// Clears the session credential locally and in the persistent store.
	pub async fn logout(&self) -> Result<()> {
		*self.credential.write() = None;
		self.store.clear().await?;

		Ok(())
	}

	/// Returns a clone of the current access token, if any.
	pub fn current_token(&self) -> Option<AccessToken> {
		self.credential.read().clone()
	}

	/// Assembles the wire request for a descriptor, attaching the current access
	/// token as a bearer header when one exists.
	///
	/// Absence of a token is valid; the request proceeds unauthenticated and the
	/// server may reject it. This function has no side effects on session state.
	pub fn attach_credential(
		&self,
		descriptor: &RequestDescriptor,
	) -> Result<PreparedRequest, ConfigError> {
		let mut url = self.config.base_url.join(&descriptor.path).map_err(|source| {
			ConfigError::InvalidPath { path: descriptor.path.clone(), source }
		})?;

		if !descriptor.query.is_empty() {
			url.query_pairs_mut()
				.extend_pairs(descriptor.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		}

		let mut headers = descriptor.headers.clone();
		let body = descriptor.body.as_ref().map(|value| value.to_string().into_bytes());

		if body.is_some() {
			headers.push(("content-type".into(), "application/json".into()));
		}
		if let Some(token) = self.credential.read().as_ref() {
			headers.push(("authorization".into(), format!("Bearer {}", token.expose())));
		}

		Ok(PreparedRequest {
			method: descriptor.method,
			url,
			headers,
			body,
			timeout: descriptor.timeout,
		})
	}

	/// Issues a logical request through the full pipeline.
	///
	/// Resolves with the response for any non-error status; otherwise recovers
	/// locally where the taxonomy allows (single renewal for a 401, bounded
	/// backoff for transient failures) and rejects with a classified [`Error`].
	pub async fn issue(&self, descriptor: RequestDescriptor) -> Result<SessionResponse> {
		const KIND: PhaseKind = PhaseKind::Issue;

		let span = PhaseSpan::new(KIND, "issue");

		obs::record_phase_outcome(KIND, PhaseOutcome::Attempt);

		let result = span.instrument(self.issue_inner(descriptor, false)).await;

		match &result {
			Ok(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Success),
			Err(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Failure),
		}

		result
	}

	/// Probes the backend health endpoint with the configured short timeout.
	///
	/// Bypasses the retry loop entirely; a success after observed failures emits
	/// [`SessionEvent::BackendOnline`].
	pub async fn ping(&self) -> Result<()> {
		const KIND: PhaseKind = PhaseKind::Health;

		let span = PhaseSpan::new(KIND, "ping");

		obs::record_phase_outcome(KIND, PhaseOutcome::Attempt);

		let result = span
			.instrument(async {
				let descriptor = RequestDescriptor::get(self.config.health_path.clone())
					.with_timeout(self.config.health_timeout);
				let prepared = self.attach_credential(&descriptor)?;

				match self.transport.execute(prepared).await {
					Ok(response) if response.is_success() => {
						self.note_recovery();

						Ok(())
					},
					Ok(response) => {
						self.online.store(false, Ordering::SeqCst);

						Err(Error::ServerUnavailable { status: Some(response.status) })
					},
					Err(err) => {
						self.online.store(false, Ordering::SeqCst);

						Err(err.into())
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Success),
			Err(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Failure),
		}

		result
	}

	/// Pipeline body shared by fresh requests and post-renewal replays.
	///
	/// `renewed` marks a request that already went through one renewal cycle; a
	/// second 401 on it is fatal rather than another renewal trigger.
	pub(crate) fn issue_inner(
		&self,
		descriptor: RequestDescriptor,
		renewed: bool,
	) -> SessionFuture<'_> {
		Box::pin(async move {
			let identity = descriptor.identity();

			loop {
				let prepared = self.attach_credential(&descriptor)?;
				let outcome = self.transport.execute(prepared).await;
				let status = match &outcome {
					Ok(response) => Some(response.status),
					Err(_) => None,
				};

				match outcome {
					Ok(response) if response.is_success() => {
						self.note_success(&identity);

						return Ok(response);
					},
					Ok(response) if response.status == 401 => {
						self.retry_counters.lock().remove(&identity);

						if self.config.is_auth_path(&descriptor.path) {
							let reason = format!(
								"authentication endpoint {} rejected the credentials",
								descriptor.path,
							);

							return Err(self.expire_session(reason).await);
						}
						if renewed {
							return Err(self
								.expire_session("the renewed access token was rejected")
								.await);
						}

						return self.renew_and_replay(descriptor).await;
					},
					Ok(response) if response.status == 429 => {
						self.retry_counters.lock().remove(&identity);

						let retry_after = http::parse_retry_after(&response)
							.unwrap_or(self.config.rate_limit_fallback);

						return Err(Error::RateLimited { retry_after });
					},
					Ok(response) if RetryPolicy::is_transient(Some(response.status)) =>
						match self.next_backoff(&identity) {
							Some(delay) => self.backoff(delay).await,
							None => {
								self.online.store(false, Ordering::SeqCst);
								obs::record_phase_outcome(PhaseKind::Retry, PhaseOutcome::Failure);

								return Err(Error::ServerUnavailable {
									status: Some(response.status),
								});
							},
						},
					Ok(response) => {
						self.retry_counters.lock().remove(&identity);

						return Err(Error::Http { status: response.status, body: response.text() });
					},
					Err(_) => match self.next_backoff(&identity) {
						Some(delay) => self.backoff(delay).await,
						None => {
							self.online.store(false, Ordering::SeqCst);
							obs::record_phase_outcome(PhaseKind::Retry, PhaseOutcome::Failure);

							return Err(Error::ServerUnavailable { status });
						},
					},
				}
			}
		})
	}

	/// Reserves the next retry slot for the identity, returning the delay to wait,
	/// or `None` (and clearing the counter) once the cap is exhausted.
	fn next_backoff(&self, identity: &RequestIdentity) -> Option<Duration> {
		let mut counters = self.retry_counters.lock();
		let attempt = counters.entry(identity.clone()).or_insert(0);

		if *attempt >= self.config.retry.max_retries {
			counters.remove(identity);

			return None;
		}

		let delay = self.config.retry.delay(*attempt);

		*attempt += 1;

		Some(delay)
	}

	async fn backoff(&self, delay: Duration) {
		obs::record_phase_outcome(PhaseKind::Retry, PhaseOutcome::Attempt);

		tokio::time::sleep(delay.try_into().unwrap_or(std::time::Duration::ZERO)).await;
	}

	/// Clears retry bookkeeping for a settled request and emits
	/// [`SessionEvent::BackendOnline`] when this success follows observed failures.
	fn note_success(&self, identity: &RequestIdentity) {
		self.retry_counters.lock().remove(identity);
		self.note_recovery();
	}

	fn note_recovery(&self) {
		if !self.online.swap(true, Ordering::SeqCst) {
			self.publish(SessionEvent::BackendOnline);
		}
	}

	/// Ends the session: wipes the credential locally and in the store, notifies
	/// subscribers, and returns the terminal error for the caller.
	pub(crate) async fn expire_session(&self, reason: impl Into<String>) -> Error {
		let reason = reason.into();

		*self.credential.write() = None;

		// Persistence is best-effort here; the in-memory wipe is authoritative.
		let _ = self.store.clear().await;

		self.publish(SessionEvent::SessionExpired);

		Error::SessionExpired { reason }
	}

	pub(crate) fn store_credential(&self, token: AccessToken) {
		*self.credential.write() = Some(token);
	}

	pub(crate) fn publish(&self, event: SessionEvent) {
		// Delivery is fire-and-forget; a send with no subscribers is not an error.
		let _ = self.events.send(event);
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestTransport> {
	/// Creates a session with the crate's default reqwest transport.
	///
	/// The transport keeps a cookie store so the http-only refresh credential set
	/// by the server travels with every renewal call.
	pub fn new(config: SessionConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
		Ok(Self::with_transport(config, store, ReqwestTransport::new()?))
	}
}
impl<T> Clone for Session<T>
where
	T: ?Sized + SessionTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			store: self.store.clone(),
			credential: self.credential.clone(),
			renewal: self.renewal.clone(),
			retry_counters: self.retry_counters.clone(),
			online: self.online.clone(),
			events: self.events.clone(),
		}
	}
}
impl<T> Debug for Session<T>
where
	T: ?Sized + SessionTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("config", &self.config)
			.field("credential_set", &self.credential.read().is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{error::TransportError, http::TransportFuture, store::MemoryCredentialStore};

	struct NullTransport;
	impl SessionTransport for NullTransport {
		fn execute(&self, _request: PreparedRequest) -> TransportFuture<'_> {
			Box::pin(async {
				Err(TransportError::Network { source: "transport unused in this test".into() })
			})
		}
	}

	fn session() -> Session<NullTransport> {
		let config = SessionConfig::new(
			Url::parse("https://api.example.com").expect("Fixture URL should parse."),
		);

		Session::with_transport(config, Arc::new(MemoryCredentialStore::default()), NullTransport)
	}

	#[test]
	fn attach_without_token_stays_unauthenticated() {
		let session = session();
		let prepared = session
			.attach_credential(&RequestDescriptor::get("/dive-sites"))
			.expect("Preparation should succeed.");

		assert_eq!(prepared.url.as_str(), "https://api.example.com/dive-sites");
		assert!(prepared.headers.iter().all(|(name, _)| name != "authorization"));
	}

	#[test]
	fn attach_sets_bearer_header_and_query() {
		let session = session();

		session.store_credential(AccessToken::new("token-123"));

		let descriptor = RequestDescriptor::get("/dive-sites").with_query("page", "2");
		let prepared =
			session.attach_credential(&descriptor).expect("Preparation should succeed.");

		assert_eq!(prepared.url.as_str(), "https://api.example.com/dive-sites?page=2");
		assert!(
			prepared
				.headers
				.iter()
				.any(|(name, value)| name == "authorization" && value == "Bearer token-123"),
		);
	}

	#[test]
	fn attach_serializes_json_bodies() {
		let session = session();
		let descriptor = RequestDescriptor::post("/comments")
			.with_json(serde_json::json!({ "text": "great dive" }));
		let prepared =
			session.attach_credential(&descriptor).expect("Preparation should succeed.");

		assert!(
			prepared
				.headers
				.iter()
				.any(|(name, value)| name == "content-type" && value == "application/json"),
		);
		assert_eq!(prepared.body.as_deref(), Some(&b"{\"text\":\"great dive\"}"[..]));
	}

	#[tokio::test]
	async fn install_and_logout_cycle_persists() {
		let session = session();

		session
			.install_credential(AccessToken::new("login-token"))
			.await
			.expect("Install should persist the credential.");

		assert_eq!(session.current_token().map(|t| t.expose().to_string()), Some("login-token".into()));
		assert!(
			session
				.store
				.load()
				.await
				.expect("Store load should succeed.")
				.is_some(),
		);

		session.logout().await.expect("Logout should clear state.");

		assert!(session.current_token().is_none());
		assert!(session.store.load().await.expect("Store load should succeed.").is_none());
	}

	#[tokio::test]
	async fn bootstrap_restores_persisted_credential() {
		let store = Arc::new(MemoryCredentialStore::default());

		store
			.persist(CredentialRecord::new(AccessToken::new("persisted")))
			.await
			.expect("Seeding the store should succeed.");

		let config = SessionConfig::new(
			Url::parse("https://api.example.com").expect("Fixture URL should parse."),
		);
		let session: Session<NullTransport> =
			Session::with_transport(config, store, NullTransport);

		assert!(session.bootstrap().await.expect("Bootstrap should succeed."));
		assert_eq!(session.current_token().map(|t| t.expose().to_string()), Some("persisted".into()));
	}
}
