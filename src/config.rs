//! Validated client configuration and its builder.

// self
use crate::{_prelude::*, cache::CachedResource, error::ConfigError};

/// Immutable configuration consumed by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Base URL every request path is joined onto. Should normally end with a trailing slash so
	/// path segments resolve underneath it.
	pub base_url: Url,
	/// Absolute URL of the session-renewal endpoint, resolved at build time.
	pub renewal_url: Url,
	/// Per-request timeout applied by the default transport.
	pub timeout: Duration,
	/// TTL for the cached user profile.
	pub profile_ttl: Duration,
	/// TTL for the cached category listing.
	pub categories_ttl: Duration,
	/// TTL for the cached product-variant listing.
	pub product_variants_ttl: Duration,
}
impl ClientConfig {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Returns the TTL configured for a cached resource.
	pub fn ttl_for(&self, resource: CachedResource) -> Duration {
		match resource {
			CachedResource::Profile => self.profile_ttl,
			CachedResource::Categories => self.categories_ttl,
			CachedResource::ProductVariants => self.product_variants_ttl,
		}
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Path of the session-renewal endpoint, relative to the base URL.
	pub renewal_path: String,
	/// Per-request timeout applied by the default transport.
	pub timeout: Duration,
	/// TTL for the cached user profile.
	pub profile_ttl: Duration,
	/// TTL for the cached category listing.
	pub categories_ttl: Duration,
	/// TTL for the cached product-variant listing.
	pub product_variants_ttl: Duration,
}
impl ClientConfigBuilder {
	const DEFAULT_LISTING_TTL: Duration = Duration::seconds(180);
	const DEFAULT_PROFILE_TTL: Duration = Duration::seconds(60);
	const DEFAULT_RENEWAL_PATH: &'static str = "/auth/refresh";
	const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a builder seeded with the default timeout, renewal path, and TTLs.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			renewal_path: Self::DEFAULT_RENEWAL_PATH.into(),
			timeout: Self::DEFAULT_TIMEOUT,
			profile_ttl: Self::DEFAULT_PROFILE_TTL,
			categories_ttl: Self::DEFAULT_LISTING_TTL,
			product_variants_ttl: Self::DEFAULT_LISTING_TTL,
		}
	}

	/// Overrides the session-renewal endpoint path.
	pub fn renewal_path(mut self, path: impl Into<String>) -> Self {
		self.renewal_path = path.into();

		self
	}

	/// Overrides the per-request timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the profile cache TTL.
	pub fn profile_ttl(mut self, ttl: Duration) -> Self {
		self.profile_ttl = ttl;

		self
	}

	/// Overrides the category-listing cache TTL.
	pub fn categories_ttl(mut self, ttl: Duration) -> Self {
		self.categories_ttl = ttl;

		self
	}

	/// Overrides the product-variant-listing cache TTL.
	pub fn product_variants_ttl(mut self, ttl: Duration) -> Self {
		self.product_variants_ttl = ttl;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase { url: self.base_url.to_string() });
		}
		if !self.timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout);
		}

		validate_ttl("profile", self.profile_ttl)?;
		validate_ttl("categories", self.categories_ttl)?;
		validate_ttl("product-variants", self.product_variants_ttl)?;

		let renewal_url = self
			.base_url
			.join(self.renewal_path.trim_start_matches('/'))
			.map_err(|_| ConfigError::InvalidPath { path: self.renewal_path.clone() })?;

		Ok(ClientConfig {
			base_url: self.base_url,
			renewal_url,
			timeout: self.timeout,
			profile_ttl: self.profile_ttl,
			categories_ttl: self.categories_ttl,
			product_variants_ttl: self.product_variants_ttl,
		})
	}
}

fn validate_ttl(resource: &'static str, ttl: Duration) -> Result<(), ConfigError> {
	if ttl.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveTtl { resource }) }
}
