//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreError, StoreFuture},
	token::CredentialRecord,
};

type StoreSlot = Arc<RwLock<Option<CredentialRecord>>>;

/// Storage backend that keeps the credential in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore(StoreSlot);
impl MemoryCredentialStore {
	fn persist_now(slot: StoreSlot, record: CredentialRecord) -> Result<(), StoreError> {
		*slot.write() = Some(record);

		Ok(())
	}

	fn load_now(slot: StoreSlot) -> Option<CredentialRecord> {
		slot.read().clone()
	}

	fn clear_now(slot: StoreSlot) -> Result<(), StoreError> {
		*slot.write() = None;

		Ok(())
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn persist(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move { Self::persist_now(slot, record) })
	}

	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(Self::load_now(slot)) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move { Self::clear_now(slot) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::token::AccessToken;

	#[tokio::test]
	async fn persist_load_clear_cycle() {
		let store = MemoryCredentialStore::default();

		assert!(
			store.load().await.expect("Load should succeed on an empty store.").is_none(),
			"Fresh store must start empty.",
		);

		store
			.persist(CredentialRecord::new(AccessToken::new("token-one")))
			.await
			.expect("Persist should succeed.");

		let loaded = store
			.load()
			.await
			.expect("Load should succeed after persist.")
			.expect("Stored credential should be present.");

		assert_eq!(loaded.access_token.expose(), "token-one");

		store.clear().await.expect("Clear should succeed.");

		assert!(store.load().await.expect("Load should succeed after clear.").is_none());
	}

	#[tokio::test]
	async fn persist_replaces_rather_than_merges() {
		let store = MemoryCredentialStore::default();

		store
			.persist(CredentialRecord::new(AccessToken::new("stale")))
			.await
			.expect("First persist should succeed.");
		store
			.persist(CredentialRecord::new(AccessToken::new("fresh")))
			.await
			.expect("Second persist should succeed.");

		let loaded = store
			.load()
			.await
			.expect("Load should succeed.")
			.expect("Stored credential should be present.");

		assert_eq!(loaded.access_token.expose(), "fresh");
	}
}
