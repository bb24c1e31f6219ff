//! Storage contracts and built-in credential store implementations.
//!
//! The credential store is an external collaborator: simple key-value storage for the access and
//! refresh token strings. The renewal orchestrator is the only component that mutates it during
//! normal operation; explicit sign-in/sign-out paths on the client are the other two writers.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Keys under which the credential pair is persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKey {
	/// Bearer token attached to every authenticated call.
	Access,
	/// Long-lived token exchanged during session renewal.
	Refresh,
}
impl CredentialKey {
	/// Returns the stable storage key string.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKey::Access => "access_token",
			CredentialKey::Refresh => "refresh_token",
		}
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Storage backend contract implemented by credential stores.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under the key, if present.
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<String>>;

	/// Persists or replaces the value stored under the key.
	fn set(&self, key: CredentialKey, value: String) -> StoreFuture<'_, ()>;

	/// Removes the value stored under the key, returning it if it was present.
	fn remove(&self, key: CredentialKey) -> StoreFuture<'_, Option<String>>;
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

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credential_keys_map_to_stable_strings() {
		assert_eq!(CredentialKey::Access.as_str(), "access_token");
		assert_eq!(CredentialKey::Refresh.as_str(), "refresh_token");
		assert_eq!(CredentialKey::Refresh.to_string(), "refresh_token");
	}

	#[test]
	fn store_error_round_trips_through_json() {
		let error = StoreError::Serialization { message: "bad snapshot".into() };
		let payload =
			serde_json::to_string(&error).expect("Store error should serialize to JSON.");
		let round_trip: StoreError =
			serde_json::from_str(&payload).expect("Serialized store error should deserialize.");

		assert_eq!(round_trip, error);
	}
}
