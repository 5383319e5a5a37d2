//! Single-flighted access-token renewal with FIFO replay of queued requests.
//!
//! Any number of requests may observe a 401 while one renewal call is already
//! outstanding; all of them enqueue a typed continuation record instead of
//! issuing their own renewal. The task that started the renewal settles every
//! queued record in the order it arrived, replaying each original request with
//! the freshly stored token. No two renewal calls are ever in flight at once.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	event::SessionEvent,
	http::SessionTransport,
	obs::{self, PhaseKind, PhaseOutcome, PhaseSpan},
	request::{RequestDescriptor, SessionResponse},
	session::Session,
	token::{AccessToken, CredentialRecord},
};

/// Renewal flag plus the FIFO queue of requests awaiting the outcome.
///
/// The queue is only non-empty while the flag is set. The flag is held from the
/// moment a renewal call is issued until its replay queue is fully drained
/// (success) or every waiter has been rejected (failure), so a 401 raised during
/// the replay window still joins this renewal instead of leading a new one.
#[derive(Debug, Default)]
pub(crate) struct RenewalState {
	in_flight: bool,
	waiters: VecDeque<PendingReplay>,
}

/// Continuation record for a request that observed a 401 mid-renewal.
#[derive(Debug)]
pub(crate) struct PendingReplay {
	descriptor: RequestDescriptor,
	tx: oneshot::Sender<Result<SessionResponse>>,
}

#[derive(Deserialize)]
struct RenewalPayload {
	access_token: String,
}

impl<T> Session<T>
where
	T: ?Sized + SessionTransport,
{
	/// Handles a 401 on a renewable request: join the in-flight renewal as a
	/// waiter, or lead a new single-flighted renewal and replay the queue.
	pub(crate) async fn renew_and_replay(
		&self,
		descriptor: RequestDescriptor,
	) -> Result<SessionResponse> {
		const KIND: PhaseKind = PhaseKind::Renewal;

		// The enqueue-or-lead decision is made synchronously under the lock, so a
		// request can never observe the flag set and still start a second renewal.
		let waiter = {
			let mut renewal = self.renewal.lock();

			if renewal.in_flight {
				let (tx, rx) = oneshot::channel();

				renewal.waiters.push_back(PendingReplay { descriptor: descriptor.clone(), tx });

				Some(rx)
			} else {
				renewal.in_flight = true;

				None
			}
		};

		if let Some(rx) = waiter {
			return match rx.await {
				Ok(result) => result,
				Err(_) => Err(Error::SessionExpired {
					reason: "the renewal task was dropped before settling".into(),
				}),
			};
		}

		let span = PhaseSpan::new(KIND, "renew_and_replay");

		obs::record_phase_outcome(KIND, PhaseOutcome::Attempt);

		let renewed = span.instrument(self.call_renewal_endpoint()).await;

		match renewed {
			Ok(token) => {
				obs::record_phase_outcome(KIND, PhaseOutcome::Success);
				self.store_credential(token.clone());

				// Persistence is best-effort; the in-memory credential is authoritative.
				let _ = self.store.persist(CredentialRecord::new(token)).await;

				self.publish(SessionEvent::TokenRefreshed);

				// The in-flight flag stays set until the queue is fully drained, so
				// requests that 401 mid-replay enqueue here instead of renewing again.
				while let Some(batch) = self.next_replay_batch() {
					for pending in batch {
						let result = self.issue_inner(pending.descriptor, true).await;
						let _ = pending.tx.send(result);
					}
				}

				self.issue_inner(descriptor, true).await
			},
			Err(err) => {
				obs::record_phase_outcome(KIND, PhaseOutcome::Failure);

				let waiters = self.settle_renewal();
				let reason = format!("token renewal failed: {err}");
				let expired = self.expire_session(reason.clone()).await;

				for pending in waiters {
					let _ = pending.tx.send(Err(Error::SessionExpired { reason: reason.clone() }));
				}

				Err(expired)
			},
		}
	}

	/// Calls the refresh endpoint with an empty body; the refresh credential
	/// travels in the transport's http-only cookie.
	async fn call_renewal_endpoint(&self) -> Result<AccessToken> {
		let descriptor = RequestDescriptor::post(self.config.refresh_path.clone());
		let prepared = self.attach_credential(&descriptor)?;
		let response = self.transport.execute(prepared).await?;

		if !response.is_success() {
			return Err(Error::Http { status: response.status, body: response.text() });
		}

		let payload: RenewalPayload = response.json()?;

		if payload.access_token.is_empty() {
			return Err(ConfigError::MissingAccessToken.into());
		}

		Ok(AccessToken::new(payload.access_token))
	}

	/// Takes the next batch of queued replays, or clears the in-flight flag and
	/// returns `None` once the queue is empty. Both happen under one lock, so no
	/// request can enqueue against a renewal that has already been released.
	fn next_replay_batch(&self) -> Option<VecDeque<PendingReplay>> {
		let mut renewal = self.renewal.lock();

		if renewal.waiters.is_empty() {
			renewal.in_flight = false;

			return None;
		}

		Some(std::mem::take(&mut renewal.waiters))
	}

	/// Clears the in-flight flag and drains the waiter queue in one step; used on
	/// renewal failure so every queued request is rejected and none can enqueue
	/// against the failed renewal afterwards.
	fn settle_renewal(&self) -> VecDeque<PendingReplay> {
		let mut renewal = self.renewal.lock();

		renewal.in_flight = false;

		std::mem::take(&mut renewal.waiters)
	}
}
