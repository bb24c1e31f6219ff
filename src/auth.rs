//! Session credentials and the single-flight renewal orchestrator.
//!
//! The orchestrator is the one piece of true concurrency coordination in the client. It observes
//! transport outcomes; on an unauthorized response it coordinates a single token-renewal exchange
//! and transparently replays every request that was waiting on it. The state machine has two
//! states, idle and refreshing, represented by the absence or presence of the current
//! [`RenewalCycle`]. Waiters park on the cycle's gate in FIFO arrival order and re-issue their own
//! descriptors once the cycle settles, so the drain is a broadcast rather than a callback walk.
//!
//! Waiters carry no timeout: a renewal call that never settles stalls every queued caller until
//! the transport-level request timeout fires. Whether a waiter-side timeout should exist is an
//! open product question.

pub mod secret;

mod metrics;

pub use metrics::RenewalMetrics;
pub use secret::TokenSecret;

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	client::Client,
	error::{RenewalError, STATUS_UNAUTHORIZED},
	http::{PreparedRequest, Transport},
	obs::{self, RequestKind, RequestOutcome, RequestSpan},
	request::{Method, RequestDescriptor},
	store::CredentialKey,
};

/// Access and refresh token strings issued by the backend.
///
/// Owned exclusively by the renewal orchestrator, which is the only component that persists or
/// clears the pair during normal operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Bearer token attached to every authenticated call.
	#[serde(rename = "access_token")]
	pub access: TokenSecret,
	/// Long-lived token exchanged during session renewal.
	#[serde(rename = "refresh_token")]
	pub refresh: TokenSecret,
}

/// Parses the renewal endpoint payload, reporting the exact path of any mismatch.
pub(crate) fn parse_renewal_response(body: &Value) -> Result<CredentialPair, RenewalError> {
	serde_path_to_error::deserialize(body.clone()).map_err(|e| RenewalError::MalformedResponse {
		path: e.path().to_string(),
		message: e.inner().to_string(),
	})
}

/// Application boundary notified when the session ends unrecoverably.
///
/// Invoked only after a renewal failure, once both credential keys have been cleared. The
/// storefront shell uses this to navigate to its login surface.
pub trait SessionSink
where
	Self: Send + Sync,
{
	/// Reports that the session expired and credentials were cleared.
	fn session_expired(&self);
}

/// Default sink that ignores session-expiry notifications.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionSink;
impl SessionSink for NoopSessionSink {
	fn session_expired(&self) {}
}

/// One renewal exchange shared by every request that failed while it was underway.
#[derive(Clone, Default)]
pub(crate) struct RenewalCycle {
	gate: Arc<AsyncMutex<()>>,
	outcome: Arc<Mutex<Option<Result<(), RenewalError>>>>,
}
impl RenewalCycle {
	/// Parks until the leader settles, then returns the cycle outcome.
	pub(crate) async fn join(&self) -> Result<(), RenewalError> {
		let _released = self.gate.lock().await;

		self.outcome.lock().clone().unwrap_or_else(|| Err(RenewalError::Interrupted))
	}
}
impl Debug for RenewalCycle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalCycle").field("settled", &self.outcome.lock().is_some()).finish()
	}
}

/// Renewal state machine: idle when no cycle is present, refreshing while one is.
#[derive(Clone, Debug, Default)]
pub(crate) struct RenewalState {
	cycle: Arc<Mutex<Option<RenewalCycle>>>,
}
impl RenewalState {
	/// Claims the renewal slot: the first unauthorized caller leads a fresh cycle, every
	/// concurrent one joins it. Check and transition happen under one lock with no suspension
	/// point, so a burst of simultaneously-expiring requests produces exactly one exchange.
	pub(crate) fn claim(&self) -> RenewalClaim {
		let mut cycle = self.cycle.lock();

		if let Some(existing) = cycle.as_ref() {
			return RenewalClaim::Joined(existing.clone());
		}

		let fresh = RenewalCycle::default();

		match fresh.gate.try_lock_arc() {
			Some(guard) => {
				*cycle = Some(fresh.clone());

				RenewalClaim::Lead(RenewalLead {
					state: self.cycle.clone(),
					cycle: fresh,
					_guard: guard,
				})
			},
			// A fresh gate always locks; joining is the sound fallback.
			None => RenewalClaim::Joined(fresh),
		}
	}

	#[cfg(test)]
	pub(crate) fn is_refreshing(&self) -> bool {
		self.cycle.lock().is_some()
	}
}

/// Outcome of claiming the renewal slot.
pub(crate) enum RenewalClaim {
	/// This caller performs the exchange and settles the cycle.
	Lead(RenewalLead),
	/// A renewal is already underway; park on it.
	Joined(RenewalCycle),
}

/// Leadership over one renewal cycle.
///
/// Dropping the lead returns the state machine to idle before the gate opens, so waiters always
/// observe a settled cycle; an unsettled drop poisons the outcome as interrupted.
pub(crate) struct RenewalLead {
	state: Arc<Mutex<Option<RenewalCycle>>>,
	cycle: RenewalCycle,
	_guard: AsyncMutexGuardArc<()>,
}
impl RenewalLead {
	/// Publishes the cycle outcome; the idle transition and waiter release happen on drop.
	pub(crate) fn settle(self, outcome: &Result<(), RenewalError>) {
		*self.cycle.outcome.lock() = Some(outcome.clone());
	}
}
impl Drop for RenewalLead {
	fn drop(&mut self) {
		{
			let mut slot = self.cycle.outcome.lock();

			if slot.is_none() {
				*slot = Some(Err(RenewalError::Interrupted));
			}
		}

		*self.state.lock() = None;
		// The gate guard drops last, waking waiters only after the machine is idle again.
	}
}

impl<T> Client<T>
where
	T: Transport,
{
	/// Sends a descriptor, intercepting unauthorized responses with the renewal state machine.
	///
	/// Every other failure passes through to the caller untouched; no generic retry exists at
	/// this layer. A descriptor already replayed once rejects immediately, so a renewal can never
	/// cascade into a second one.
	pub(crate) async fn send_with_renewal(&self, mut descriptor: RequestDescriptor) -> Result<Value> {
		loop {
			let failure = match self.send_once(&descriptor).await {
				Err(Error::Http(failure)) if failure.status == STATUS_UNAUTHORIZED => failure,
				outcome => return outcome,
			};

			if descriptor.retried() {
				return Err(Error::AuthExpired(RenewalError::ReplayUnauthorized(failure)));
			}

			match self.renewal.claim() {
				RenewalClaim::Lead(lead) => {
					let renewed = self.renew_session().await;

					lead.settle(&renewed);

					if let Err(e) = renewed {
						return Err(Error::AuthExpired(e));
					}
				},
				RenewalClaim::Joined(cycle) =>
					if let Err(e) = cycle.join().await {
						return Err(Error::AuthExpired(e));
					},
			}

			// Renewal succeeded; replay with the fresh token, exactly once.
			descriptor.mark_retried();
		}
	}

	/// Performs one renewal exchange; on failure clears both credential keys and notifies the
	/// session sink before the cycle settles.
	async fn renew_session(&self) -> Result<(), RenewalError> {
		const KIND: RequestKind = RequestKind::Renewal;

		let span = RequestSpan::new(KIND, "renew_session");

		obs::record_request_outcome(KIND, RequestOutcome::Attempt);
		self.renewal_metrics.record_attempt();

		let result = span.instrument(self.run_renewal_exchange()).await;

		match &result {
			Ok(()) => {
				self.renewal_metrics.record_success();
				obs::record_request_outcome(KIND, RequestOutcome::Success);
			},
			Err(_) => {
				self.renewal_metrics.record_failure();
				obs::record_request_outcome(KIND, RequestOutcome::Failure);

				let _ = self.store.remove(CredentialKey::Access).await;
				let _ = self.store.remove(CredentialKey::Refresh).await;

				self.session_sink.session_expired();
			},
		}

		result
	}

	async fn run_renewal_exchange(&self) -> Result<(), RenewalError> {
		let refresh = self
			.store
			.get(CredentialKey::Refresh)
			.await?
			.ok_or(RenewalError::MissingRefreshToken)?;
		let prepared = PreparedRequest {
			url: self.config.renewal_url.clone(),
			method: Method::Post,
			headers: Vec::new(),
			body: Some(json!({ "refresh_token": refresh })),
		};
		let response =
			self.transport.execute(&prepared).await.map_err(RenewalError::from_transport)?;

		if !response.is_success() {
			return Err(RenewalError::Rejected { status: response.status, body: response.body });
		}

		let pair = parse_renewal_response(&response.body)?;

		self.store.set(CredentialKey::Access, pair.access.expose().to_owned()).await?;
		self.store.set(CredentialKey::Refresh, pair.refresh.expose().to_owned()).await?;

		Ok(())
	}
}
