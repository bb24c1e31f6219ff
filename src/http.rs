//! Transport primitives for storefront API calls.
//!
//! The [`Transport`] trait is the crate's only dependency on an HTTP stack. It receives a fully
//! resolved [`PreparedRequest`] (absolute URL, headers including the freshly read bearer token,
//! JSON body), issues exactly one HTTP call, and returns the raw status plus the leniently parsed
//! JSON body. Status classification happens above this layer so every caller handles success and
//! failure through one result type.

// std
use std::ops::Deref;
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::ConfigError,
	request::{Method, RequestDescriptor},
};

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<RawResponse>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing storefront API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared across client
/// clones without additional wrappers. A transport performs no retries, no redirect following for
/// the renewal endpoint, and no status interpretation.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Executes one HTTP call and resolves with the normalized response, or a network failure
	/// when no response was obtained.
	fn execute<'a>(&'a self, request: &'a PreparedRequest) -> TransportFuture<'a>;
}

/// HTTP response normalized to a status code and a parsed JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Parsed JSON body; [`Value::Null`] for empty bodies, a string for non-JSON payloads.
	pub body: Value,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// One fully resolved outbound request handed to the transport.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// Absolute request URL with query parameters applied.
	pub url: Url,
	/// HTTP method.
	pub method: Method,
	/// Header list; includes the bearer header when a token was available.
	pub headers: Vec<(String, String)>,
	/// JSON request body.
	pub body: Option<Value>,
}
impl PreparedRequest {
	/// Resolves a descriptor against the configured base URL and attaches the bearer token read
	/// immediately before dispatch. The token is never cached on the descriptor itself.
	pub fn resolve(
		config: &ClientConfig,
		descriptor: &RequestDescriptor,
		bearer: Option<&str>,
	) -> Result<Self, ConfigError> {
		let mut url = config
			.base_url
			.join(descriptor.path.trim_start_matches('/'))
			.map_err(|_| ConfigError::InvalidPath { path: descriptor.path.clone() })?;

		if let Some(query) = descriptor.query.as_ref() {
			apply_query(&mut url, query);
		}

		let mut headers = Vec::with_capacity(descriptor.headers.len() + 1);

		if let Some(token) = bearer {
			headers.push(("authorization".into(), format!("Bearer {token}")));
		}

		headers.extend(descriptor.headers.iter().cloned());

		Ok(Self { url, method: descriptor.method, headers, body: descriptor.body.clone() })
	}
}

/// Applies a query object to the URL. The top-level value must be a JSON object; null members are
/// omitted, nested arrays and objects are carried as compact JSON strings.
fn apply_query(url: &mut Url, query: &Value) {
	let Value::Object(map) = query else {
		return;
	};
	let pairs: Vec<_> = map
		.iter()
		.filter(|(_, value)| !value.is_null())
		.map(|(key, value)| (key.as_str(), query_value_string(value)))
		.collect();

	if pairs.is_empty() {
		return;
	}

	let mut serializer = url.query_pairs_mut();

	for (key, value) in pairs {
		serializer.append_pair(key, &value);
	}
}

fn query_value_string(value: &Value) -> String {
	match value {
		Value::String(inner) => inner.clone(),
		other => other.to_string(),
	}
}

/// Parses a response body leniently: empty bodies become [`Value::Null`], valid JSON parses as
/// is, anything else is carried as a string so error screens can still render it.
pub(crate) fn parse_body(bytes: &[u8]) -> Value {
	if bytes.is_empty() {
		return Value::Null;
	}

	serde_json::from_slice(bytes)
		.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Thin wrapper around a [`reqwest`] client so shared HTTP behavior lives in one place.
/// The default construction disables redirect following, matching the expectation that the
/// renewal endpoint returns results directly instead of delegating to another URI.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub HttpClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport applying the configured timeout and no-redirect policy.
	pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
		let timeout = std::time::Duration::try_from(config.timeout)
			.map_err(|_| ConfigError::NonPositiveTimeout)?;
		let client = HttpClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest client. Configure it to disable redirect following.
	pub fn with_client(client: HttpClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<HttpClient> for ReqwestTransport {
	fn as_ref(&self) -> &HttpClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = HttpClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn execute<'a>(&'a self, request: &'a PreparedRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self.0.request(method, request.url.clone());

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = &request.body {
				let bytes = serde_json::to_vec(body)
					.map_err(|e| Error::Network { message: e.to_string() })?;

				builder = builder.header("content-type", "application/json").body(bytes);
			}

			let response =
				builder.send().await.map_err(|e| Error::Network { message: e.to_string() })?;
			let status = response.status().as_u16();
			let bytes =
				response.bytes().await.map_err(|e| Error::Network { message: e.to_string() })?;

			Ok(RawResponse { status, body: parse_body(&bytes) })
		})
	}
}
