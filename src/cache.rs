//! Per-resource TTL response cache for the storefront's hot read endpoints.
//!
//! One entry exists per named resource, never keyed by arbitrary parameters. Invalidation is
//! TTL-only: mutation endpoints do not bust entries, so list data can be stale for up to one TTL
//! window after a write. Errors are never cached; a failed refresh discards all cached state for
//! the resource.

// self
use crate::{
	_prelude::*,
	dedup::{Ticket, TicketLead},
};

/// Hot resources served through the response cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CachedResource {
	/// The signed-in user's profile.
	Profile,
	/// The category listing.
	Categories,
	/// The product-variant listing.
	ProductVariants,
}
impl CachedResource {
	/// Returns the backend path the resource is fetched from.
	pub const fn path(self) -> &'static str {
		match self {
			CachedResource::Profile => "/profile",
			CachedResource::Categories => "/categories",
			CachedResource::ProductVariants => "/product-variants",
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CachedResource::Profile => "profile",
			CachedResource::Categories => "categories",
			CachedResource::ProductVariants => "product_variants",
		}
	}
}
impl Display for CachedResource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One cached value plus the instant it was stored.
#[derive(Clone, Debug)]
struct StoredValue {
	value: Value,
	stored_at: OffsetDateTime,
	ttl: Duration,
}
impl StoredValue {
	/// A value is fresh strictly within its TTL window; at or past the boundary it is expired and
	/// must never be served.
	fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		instant - self.stored_at < self.ttl
	}
}

#[derive(Debug, Default)]
struct CacheState {
	stored: Option<StoredValue>,
	pending: Option<Ticket>,
}

type CacheMap = Arc<Mutex<HashMap<CachedResource, CacheState>>>;

/// TTL-bounded value cache with pending-fetch sharing.
#[derive(Clone, Debug, Default)]
pub(crate) struct ResponseCache {
	entries: CacheMap,
}
impl ResponseCache {
	/// Looks up a resource at the given instant.
	///
	/// Check, join, and lead-claim happen under one lock with no suspension point, so concurrent
	/// cold reads can never both fetch.
	pub(crate) fn lookup(&self, resource: CachedResource, now: OffsetDateTime) -> CacheLookup {
		let mut entries = self.entries.lock();
		let state = entries.entry(resource).or_default();

		if let Some(stored) = state.stored.as_ref().filter(|stored| stored.is_fresh_at(now)) {
			return CacheLookup::Fresh(stored.value.clone());
		}
		if let Some(pending) = state.pending.as_ref() {
			return CacheLookup::Pending(pending.clone());
		}

		let ticket = Ticket::new();

		match ticket.try_lead() {
			Some(lead) => {
				state.pending = Some(ticket);

				CacheLookup::Miss(CacheLead {
					resource,
					entries: self.entries.clone(),
					lead: Some(lead),
				})
			},
			// A fresh gate always locks; joining is the sound fallback.
			None => CacheLookup::Pending(ticket),
		}
	}

	#[cfg(test)]
	fn stored_value(&self, resource: CachedResource) -> Option<Value> {
		self.entries
			.lock()
			.get(&resource)
			.and_then(|state| state.stored.as_ref())
			.map(|stored| stored.value.clone())
	}
}

/// Outcome of a cache lookup.
pub(crate) enum CacheLookup {
	/// A fresh value was served without any network activity.
	Fresh(Value),
	/// A refresh for this resource is already underway; share its outcome.
	Pending(Ticket),
	/// Nothing usable is cached; the caller must fetch and complete the lead.
	Miss(CacheLead),
}

/// Leadership over one cache refresh.
///
/// Completing with a success records the value and timestamp; completing with a failure discards
/// all cached state for the resource. Dropping an uncompleted lead clears the pending marker and
/// poisons the shared ticket so joiners never hang.
pub(crate) struct CacheLead {
	resource: CachedResource,
	entries: CacheMap,
	lead: Option<TicketLead>,
}
impl CacheLead {
	/// Records the fetch outcome and releases every joiner with it.
	pub(crate) fn complete(mut self, now: OffsetDateTime, ttl: Duration, outcome: &Result<Value>) {
		{
			let mut entries = self.entries.lock();
			let state = entries.entry(self.resource).or_default();

			state.pending = None;
			state.stored = match outcome {
				Ok(value) => Some(StoredValue { value: value.clone(), stored_at: now, ttl }),
				Err(_) => None,
			};
		}

		if let Some(lead) = self.lead.take() {
			lead.settle(outcome);
		}
	}
}
impl Drop for CacheLead {
	fn drop(&mut self) {
		// Only an uncompleted lead still owns the pending marker; after completion it may already
		// belong to a successor fetch.
		if self.lead.is_none() {
			return;
		}
		if let Some(state) = self.entries.lock().get_mut(&self.resource) {
			state.pending = None;
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	use time::macros;
	// self
	use super::*;

	const TTL: Duration = Duration::seconds(180);

	fn t0() -> OffsetDateTime {
		macros::datetime!(2025-06-01 12:00 UTC)
	}

	fn populate(cache: &ResponseCache, now: OffsetDateTime, value: Value) {
		match cache.lookup(CachedResource::Categories, now) {
			CacheLookup::Miss(lead) => lead.complete(now, TTL, &Ok(value)),
			_ => panic!("Cold lookup should miss."),
		}
	}

	#[test]
	fn fresh_within_ttl_expired_at_and_beyond() {
		let cache = ResponseCache::default();

		populate(&cache, t0(), json!(["shoes"]));

		// t0 + 0.5 TTL: served from cache.
		match cache.lookup(CachedResource::Categories, t0() + TTL / 2) {
			CacheLookup::Fresh(value) => assert_eq!(value, json!(["shoes"])),
			_ => panic!("Lookup within the TTL window should be fresh."),
		}

		// Exactly at the TTL boundary the value must no longer be served.
		assert!(matches!(
			cache.lookup(CachedResource::Categories, t0() + TTL),
			CacheLookup::Miss(_)
		));
		assert!(matches!(
			cache.lookup(CachedResource::Categories, t0() + TTL * 3 / 2),
			CacheLookup::Miss(_)
		));
	}

	#[test]
	fn concurrent_cold_lookups_share_one_fetch() {
		let cache = ResponseCache::default();
		let lead = match cache.lookup(CachedResource::Profile, t0()) {
			CacheLookup::Miss(lead) => lead,
			_ => panic!("First cold lookup should miss."),
		};

		assert!(matches!(
			cache.lookup(CachedResource::Profile, t0()),
			CacheLookup::Pending(_)
		));

		lead.complete(t0(), Duration::seconds(60), &Ok(json!({ "name": "Ada" })));

		match cache.lookup(CachedResource::Profile, t0() + Duration::seconds(1)) {
			CacheLookup::Fresh(value) => assert_eq!(value, json!({ "name": "Ada" })),
			_ => panic!("Completed fetch should populate the cache."),
		}
	}

	#[test]
	fn failures_are_never_cached() {
		let cache = ResponseCache::default();
		let lead = match cache.lookup(CachedResource::Categories, t0()) {
			CacheLookup::Miss(lead) => lead,
			_ => panic!("Cold lookup should miss."),
		};

		lead.complete(t0(), TTL, &Err(Error::Network { message: "connection reset".into() }));

		assert!(cache.stored_value(CachedResource::Categories).is_none());
		assert!(matches!(
			cache.lookup(CachedResource::Categories, t0() + Duration::seconds(1)),
			CacheLookup::Miss(_)
		));
	}

	#[test]
	fn dropped_leads_clear_the_pending_marker() {
		let cache = ResponseCache::default();
		let lead = match cache.lookup(CachedResource::ProductVariants, t0()) {
			CacheLookup::Miss(lead) => lead,
			_ => panic!("Cold lookup should miss."),
		};

		drop(lead);

		assert!(matches!(
			cache.lookup(CachedResource::ProductVariants, t0()),
			CacheLookup::Miss(_)
		));
	}
}
