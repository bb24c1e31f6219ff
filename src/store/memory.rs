//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialKey, CredentialStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<CredentialKey, String>>>;

/// Thread-safe storage backend that keeps credentials in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	fn get_now(map: StoreMap, key: CredentialKey) -> Option<String> {
		map.read().get(&key).cloned()
	}

	fn set_now(map: StoreMap, key: CredentialKey, value: String) -> Result<(), StoreError> {
		map.write().insert(key, value);

		Ok(())
	}

	fn remove_now(map: StoreMap, key: CredentialKey) -> Option<String> {
		map.write().remove(&key)
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn set(&self, key: CredentialKey, value: String) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::set_now(map, key, value) })
	}

	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::remove_now(map, key)) })
	}
}
