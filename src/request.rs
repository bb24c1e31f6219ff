//! Request descriptors shared by the transport, deduplication, and renewal layers.

// self
use crate::_prelude::*;

/// HTTP methods supported by the storefront backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// Read-only retrieval; the only method eligible for deduplication and caching.
	Get,
	/// Resource creation.
	Post,
	/// Resource replacement or update.
	Put,
	/// Resource removal.
	Delete,
}
impl Method {
	/// Returns the wire-format method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
		}
	}

	/// Returns `true` when concurrent identical calls may legally share one outcome.
	pub const fn is_read_only(self) -> bool {
		matches!(self, Method::Get)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Caller-supplied request parts accepted by [`Client::request`](crate::client::Client::request).
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Query parameters as an arbitrarily nested JSON object.
	pub query: Option<Value>,
	/// JSON request body.
	pub body: Option<Value>,
	/// Extra headers appended after the client's own.
	pub headers: Vec<(String, String)>,
}
impl RequestOptions {
	/// Sets the query object.
	pub fn with_query(mut self, query: Value) -> Self {
		self.query = Some(query);

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Appends one extra header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}
}

/// One outbound request; immutable except for the retried flag, which is set exactly once by the
/// renewal orchestrator before a descriptor is replayed with a fresh access token.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL.
	pub path: String,
	/// Query parameters as an arbitrarily nested JSON object.
	pub query: Option<Value>,
	/// JSON request body.
	pub body: Option<Value>,
	/// Extra headers appended after the client's own.
	pub headers: Vec<(String, String)>,
	retried: bool,
}
impl RequestDescriptor {
	/// Creates a descriptor with no query, body, or extra headers.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: None, body: None, headers: Vec::new(), retried: false }
	}

	/// Creates a descriptor from caller-supplied [`RequestOptions`].
	pub fn from_options(method: Method, path: impl Into<String>, options: RequestOptions) -> Self {
		Self {
			method,
			path: path.into(),
			query: options.query,
			body: options.body,
			headers: options.headers,
			retried: false,
		}
	}

	/// Sets the query object.
	pub fn with_query(mut self, query: Value) -> Self {
		self.query = Some(query);

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Returns `true` once the descriptor has been replayed after a renewal; such a descriptor
	/// never triggers a second renewal attempt.
	pub fn retried(&self) -> bool {
		self.retried
	}

	/// Marks the descriptor as replayed. The flag only ever moves from `false` to `true`.
	pub(crate) fn mark_retried(&mut self) {
		self.retried = true;
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn retried_flag_is_set_once() {
		let mut descriptor = RequestDescriptor::new(Method::Get, "/profile");

		assert!(!descriptor.retried());

		descriptor.mark_retried();
		descriptor.mark_retried();

		assert!(descriptor.retried());
	}

	#[test]
	fn options_carry_over_into_descriptors() {
		let options = RequestOptions::default()
			.with_query(json!({ "page": 2 }))
			.with_body(json!({ "name": "Sneakers" }))
			.with_header("x-storefront-locale", "en-US");
		let descriptor = RequestDescriptor::from_options(Method::Post, "/categories", options);

		assert_eq!(descriptor.query, Some(json!({ "page": 2 })));
		assert_eq!(descriptor.body, Some(json!({ "name": "Sneakers" })));
		assert_eq!(descriptor.headers, vec![("x-storefront-locale".to_string(), "en-US".to_string())]);
		assert!(!descriptor.retried());
	}

	#[test]
	fn only_get_is_read_only() {
		assert!(Method::Get.is_read_only());
		assert!(!Method::Post.is_read_only());
		assert!(!Method::Put.is_read_only());
		assert!(!Method::Delete.is_read_only());
	}
}
