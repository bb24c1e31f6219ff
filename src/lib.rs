//! Resilient storefront API client - request deduplication, TTL response caching, and
//! single-flight session renewal with transparent retry in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod http;
pub mod obs;
pub mod request;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicU64, Ordering};
	// self
	use crate::{
		auth::SessionSink,
		client::Client,
		config::ClientConfig,
		http::ReqwestTransport,
		store::{CredentialStore, MemoryStore},
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = Client<ReqwestTransport>;

	/// Session sink that counts expiry notifications instead of redirecting anywhere.
	#[derive(Debug, Default)]
	pub struct RecordingSessionSink(AtomicU64);
	impl RecordingSessionSink {
		/// Returns how many times the session was reported expired.
		pub fn expirations(&self) -> u64 {
			self.0.load(Ordering::Relaxed)
		}
	}
	impl SessionSink for RecordingSessionSink {
		fn session_expired(&self) {
			self.0.fetch_add(1, Ordering::Relaxed);
		}
	}

	/// Constructs a [`Client`] backed by an in-memory credential store and the reqwest transport
	/// used across integration tests.
	pub fn build_reqwest_test_client(config: ClientConfig) -> (ReqwestTestClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let client = Client::new(config, store)
			.expect("Failed to build reqwest-backed client for tests.");

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::{Mutex as AsyncMutex, MutexGuardArc as AsyncMutexGuardArc};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")] pub use reqwest::Client as HttpClient;
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
