//! Client-level error types shared across the transport, cache, and renewal layers.
//!
//! Every variant is [`Clone`] because deduplicated callers and renewal waiters share one
//! settled outcome; failure payloads therefore carry owned strings and parsed JSON bodies
//! instead of boxed sources, following the same convention as [`StoreError`].

// self
use crate::{_prelude::*, store::StoreError};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// HTTP status the authentication orchestrator intercepts.
pub(crate) const STATUS_UNAUTHORIZED: u16 = 401;
/// HTTP status whose payloads pass through verbatim as validation failures.
pub(crate) const STATUS_UNPROCESSABLE: u16 = 422;

/// Canonical client error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Credential-store failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// No response was obtained from the backend.
	#[error("Network error occurred while contacting the backend: {message}.")]
	Network {
		/// Transport-supplied message summarizing the failure.
		message: String,
	},
	/// Backend responded with a non-success status and a parsed body.
	#[error(transparent)]
	Http(#[from] HttpFailure),
	/// Backend rejected the payload; the validation body passes through verbatim.
	#[error("Backend rejected the request payload with HTTP {}.", .0.status)]
	Validation(HttpFailure),
	/// Unauthorized response that could not be resolved by a renewal attempt.
	#[error("Authentication expired and could not be renewed.")]
	AuthExpired(#[source] RenewalError),
}
impl Error {
	/// Failure produced when the request leading an in-flight ticket was dropped before settling.
	pub(crate) fn abandoned() -> Self {
		Self::Network { message: "the in-flight request was dropped before it settled".into() }
	}
}

/// Non-success HTTP response normalized into a structured failure.
#[derive(Clone, Debug, PartialEq, ThisError)]
#[error("Backend returned HTTP {status}.")]
pub struct HttpFailure {
	/// HTTP status code of the response.
	pub status: u16,
	/// Parsed response body; [`Value::Null`] when the body was empty.
	pub body: Value,
}

/// Reasons a session-renewal cycle failed to produce a usable access token.
#[derive(Clone, Debug, ThisError)]
pub enum RenewalError {
	/// No refresh token was available in the credential store.
	#[error("No refresh token is available for session renewal.")]
	MissingRefreshToken,
	/// The renewal endpoint rejected the exchange.
	#[error("Renewal endpoint rejected the exchange with HTTP {status}.")]
	Rejected {
		/// HTTP status code of the rejection.
		status: u16,
		/// Parsed rejection body.
		body: Value,
	},
	/// The renewal endpoint returned JSON that does not match the expected token pair.
	#[error("Renewal endpoint returned a malformed response at `{path}`: {message}.")]
	MalformedResponse {
		/// Path into the payload where deserialization failed.
		path: String,
		/// Deserializer message for the offending value.
		message: String,
	},
	/// No response was obtained from the renewal endpoint.
	#[error("Network error occurred while calling the renewal endpoint: {message}.")]
	Network {
		/// Transport-supplied message summarizing the failure.
		message: String,
	},
	/// The renewal leader was dropped before the cycle settled.
	#[error("Session renewal was interrupted before it settled.")]
	Interrupted,
	/// The backend still returned unauthorized after a successful renewal.
	#[error("Backend still returned unauthorized after a successful renewal.")]
	ReplayUnauthorized(#[source] HttpFailure),
	/// Credential-store failure while reading or rotating the token pair.
	#[error(transparent)]
	Store(#[from] StoreError),
}
impl RenewalError {
	/// Converts a transport-layer [`Error`] observed during the exchange into a renewal failure.
	pub(crate) fn from_transport(error: Error) -> Self {
		match error {
			Error::Network { message } => Self::Network { message },
			Error::Store(source) => Self::Store(source),
			other => Self::Network { message: other.to_string() },
		}
	}
}

/// Configuration and validation failures raised while constructing a client.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Base URL scheme is not supported.
	#[error("Base URL must use the http or https scheme: {url}.")]
	UnsupportedScheme {
		/// URL that failed validation.
		url: String,
	},
	/// Base URL cannot serve as a base for joining request paths.
	#[error("Base URL cannot be used as a base for request paths: {url}.")]
	CannotBeABase {
		/// URL that failed validation.
		url: String,
	},
	/// A request path could not be joined onto the base URL.
	#[error("Request path could not be resolved against the base URL: {path}.")]
	InvalidPath {
		/// Path that failed to resolve.
		path: String,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be positive.")]
	NonPositiveTimeout,
	/// A cache TTL must be positive.
	#[error("Cache TTL for the {resource} resource must be positive.")]
	NonPositiveTtl {
		/// Resource label whose TTL failed validation.
		resource: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Transport builder failure message.
		message: String,
	},
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::HttpClientBuild { message: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "credential file unreadable".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Store(_)));
		assert!(client_error.to_string().contains("credential file unreadable"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn renewal_failures_keep_transport_detail() {
		let renewal =
			RenewalError::from_transport(Error::Network { message: "connection refused".into() });

		assert!(matches!(&renewal, RenewalError::Network { message } if message == "connection refused"));

		let failure = HttpFailure { status: 401, body: Value::Null };
		let replayed = Error::AuthExpired(RenewalError::ReplayUnauthorized(failure));

		assert!(StdError::source(&replayed).is_some());
	}

	#[test]
	fn http_failure_display_names_the_status() {
		let failure = HttpFailure { status: 503, body: Value::Null };

		assert_eq!(failure.to_string(), "Backend returned HTTP 503.");
	}
}
