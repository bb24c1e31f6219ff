//! The client/session object every storefront data hook talks through.

// self
use crate::{
	_prelude::*,
	auth::{NoopSessionSink, RenewalMetrics, RenewalState, SessionSink},
	cache::{CacheLookup, CachedResource, ResponseCache},
	config::ClientConfig,
	dedup::{Claim, DedupKey, Deduplicator},
	error::{ConfigError, HttpFailure, STATUS_UNPROCESSABLE},
	http::{PreparedRequest, RawResponse, Transport},
	obs::{self, RequestKind, RequestOutcome, RequestSpan},
	request::{Method, RequestDescriptor, RequestOptions},
	store::{CredentialKey, CredentialStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestClient = Client<ReqwestTransport>;

/// Coordinates every outbound call for one storefront session.
///
/// The client owns all session-lifetime mutable state (the in-flight ticket map, the
/// per-resource response caches, and the renewal state machine), so construction and teardown
/// follow the session's lifecycle, consumers receive it by injection, and the coordination logic
/// stays unit-testable without ambient singletons. Clones share the same underlying state.
#[derive(Clone)]
pub struct Client<T>
where
	T: Transport,
{
	/// Validated configuration: base URL, timeout, renewal endpoint, cache TTLs.
	pub config: ClientConfig,
	/// HTTP transport used for every outbound call.
	pub transport: Arc<T>,
	/// Credential store holding the access/refresh token pair.
	pub store: Arc<dyn CredentialStore>,
	/// Boundary notified when the session ends unrecoverably.
	pub session_sink: Arc<dyn SessionSink>,
	/// Shared counters for renewal attempts.
	pub renewal_metrics: Arc<RenewalMetrics>,
	pub(crate) dedup: Deduplicator,
	pub(crate) cache: ResponseCache,
	pub(crate) renewal: RenewalState,
}
impl<T> Client<T>
where
	T: Transport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			config,
			transport: transport.into(),
			store,
			session_sink: Arc::new(NoopSessionSink),
			renewal_metrics: Default::default(),
			dedup: Default::default(),
			cache: Default::default(),
			renewal: Default::default(),
		}
	}

	/// Sets or replaces the session-expiry sink.
	pub fn with_session_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
		self.session_sink = sink;

		self
	}

	/// Issues a request against the storefront backend.
	///
	/// This is the uniform entry point used by every UI-facing data hook. Read-only requests are
	/// deduplicated: concurrent calls with the same method, path, and logically equal parameters
	/// share one transport call and one outcome. Unauthorized responses are transparently
	/// resolved by the renewal orchestrator where possible.
	pub async fn request(
		&self,
		method: Method,
		path: impl Into<String>,
		options: RequestOptions,
	) -> Result<Value> {
		self.dispatch(RequestDescriptor::from_options(method, path, options)).await
	}

	/// Issues a GET request.
	pub async fn get(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Method::Get, path, options).await
	}

	/// Issues a POST request.
	pub async fn post(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Method::Post, path, options).await
	}

	/// Issues a PUT request.
	pub async fn put(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Method::Put, path, options).await
	}

	/// Issues a DELETE request.
	pub async fn delete(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Method::Delete, path, options).await
	}

	/// Fetches a hot resource through its TTL cache.
	///
	/// A fresh value is served without network activity; an in-flight refresh is shared; an
	/// expired or missing entry triggers exactly one fetch through the deduplicated request
	/// path. Mutations do not invalidate entries, so a listing can be stale for up to one TTL
	/// window after a write.
	pub async fn fetch_cached(&self, resource: CachedResource) -> Result<Value> {
		const KIND: RequestKind = RequestKind::Cached;

		let span = RequestSpan::new(KIND, "fetch_cached");

		obs::record_request_outcome(KIND, RequestOutcome::Attempt);

		let result = span.instrument(self.fetch_cached_inner(resource)).await;

		match &result {
			Ok(_) => obs::record_request_outcome(KIND, RequestOutcome::Success),
			Err(_) => obs::record_request_outcome(KIND, RequestOutcome::Failure),
		}

		result
	}

	/// Persists a freshly issued credential pair after sign-in.
	pub async fn store_session(
		&self,
		access: impl Into<String>,
		refresh: impl Into<String>,
	) -> Result<()> {
		self.store.set(CredentialKey::Access, access.into()).await?;
		self.store.set(CredentialKey::Refresh, refresh.into()).await?;

		Ok(())
	}

	/// Clears both credential keys on explicit sign-out.
	pub async fn sign_out(&self) -> Result<()> {
		self.store.remove(CredentialKey::Access).await?;
		self.store.remove(CredentialKey::Refresh).await?;

		Ok(())
	}

	async fn fetch_cached_inner(&self, resource: CachedResource) -> Result<Value> {
		match self.cache.lookup(resource, OffsetDateTime::now_utc()) {
			CacheLookup::Fresh(value) => Ok(value),
			CacheLookup::Pending(ticket) => ticket.join().await,
			CacheLookup::Miss(lead) => {
				let descriptor = RequestDescriptor::new(Method::Get, resource.path());
				let outcome = self.deduped(descriptor).await;

				lead.complete(OffsetDateTime::now_utc(), self.config.ttl_for(resource), &outcome);

				outcome
			},
		}
	}

	async fn dispatch(&self, descriptor: RequestDescriptor) -> Result<Value> {
		let kind = if descriptor.method.is_read_only() {
			RequestKind::Read
		} else {
			RequestKind::Mutation
		};
		let span = RequestSpan::new(kind, "request");

		obs::record_request_outcome(kind, RequestOutcome::Attempt);

		let result = if descriptor.method.is_read_only() {
			span.instrument(self.deduped(descriptor)).await
		} else {
			span.instrument(self.send_with_renewal(descriptor)).await
		};

		match &result {
			Ok(_) => obs::record_request_outcome(kind, RequestOutcome::Success),
			Err(_) => obs::record_request_outcome(kind, RequestOutcome::Failure),
		}

		result
	}

	/// Routes a read-only descriptor through the in-flight ticket map.
	pub(crate) async fn deduped(&self, descriptor: RequestDescriptor) -> Result<Value> {
		let key = DedupKey::for_descriptor(&descriptor);

		match self.dedup.claim(key) {
			Claim::Lead(lead) => {
				let outcome = self.send_with_renewal(descriptor).await;

				lead.settle(&outcome);

				outcome
			},
			Claim::Joined(ticket) => ticket.join().await,
		}
	}

	/// Issues exactly one transport call, reading the access token immediately before dispatch.
	pub(crate) async fn send_once(&self, descriptor: &RequestDescriptor) -> Result<Value> {
		let bearer = self.store.get(CredentialKey::Access).await?;
		let prepared = PreparedRequest::resolve(&self.config, descriptor, bearer.as_deref())?;
		let response = self.transport.execute(&prepared).await?;

		classify_response(response)
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Creates a client with a reqwest transport built from the configuration.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
		let transport = ReqwestTransport::new(&config)?;

		Ok(Self::with_transport(config, store, transport))
	}
}
impl<T> Debug for Client<T>
where
	T: Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client").field("config", &self.config).finish()
	}
}

/// Normalizes a raw response: 2xx bodies pass through, 422 becomes a verbatim validation
/// failure, every other status a structured HTTP failure.
fn classify_response(response: RawResponse) -> Result<Value> {
	if response.is_success() {
		return Ok(response.body);
	}

	let status = response.status;
	let failure = HttpFailure { status, body: response.body };

	if status == STATUS_UNPROCESSABLE {
		return Err(Error::Validation(failure));
	}

	Err(Error::Http(failure))
}
