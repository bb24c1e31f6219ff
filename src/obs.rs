//! Optional observability helpers for client requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `storefront_client.request` with the `kind`
//!   (request class) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `storefront_client_request_total` counter for every
//!   attempt/success/failure, labeled by `kind` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Request classes observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
	/// Read-only request routed through the deduplicator.
	Read,
	/// Mutating request sent directly to the transport.
	Mutation,
	/// Hot-resource request served through the response cache.
	Cached,
	/// Session-renewal exchange.
	Renewal,
}
impl RequestKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestKind::Read => "read",
			RequestKind::Mutation => "mutation",
			RequestKind::Cached => "cached",
			RequestKind::Renewal => "renewal",
		}
	}
}
impl Display for RequestKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// Entry to a client helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Attempt => "attempt",
			RequestOutcome::Success => "success",
			RequestOutcome::Failure => "failure",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
