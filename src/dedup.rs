//! Concurrent-read deduplication: canonical request keys and shared in-flight tickets.
//!
//! Only read-only requests are deduplicated. The key serialization is canonical: object keys are
//! sorted recursively and array order is preserved, so logically identical parameter objects
//! always collapse onto one key regardless of insertion order. The same canonicalization is used
//! by the response cache layer.

// self
use crate::{_prelude::*, request::RequestDescriptor};

/// Serializes a query value canonically: object keys sorted recursively, array order preserved,
/// primitives in their compact JSON form.
pub fn canonical_query(value: &Value) -> String {
	sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut keys: Vec<_> = map.keys().collect();

			keys.sort();

			Value::Object(keys.into_iter().map(|key| (key.clone(), sorted(&map[key]))).collect())
		},
		Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
		other => other.clone(),
	}
}

/// Canonical identity of a read-only request: method + path + canonical query serialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DedupKey(String);
impl DedupKey {
	/// Derives the key for a request descriptor.
	pub fn for_descriptor(descriptor: &RequestDescriptor) -> Self {
		let query = descriptor.query.as_ref().map(canonical_query).unwrap_or_default();

		Self(format!("{} {}?{}", descriptor.method, descriptor.path, query))
	}
}
impl Display for DedupKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Shared pending outcome for one in-flight request.
///
/// The leader holds the gate while its request runs and writes the settled outcome into the slot;
/// joiners park on the gate and clone the outcome once it opens. Both success and failure are
/// shared, so every concurrent caller observes the identical result.
#[derive(Clone, Default)]
pub(crate) struct Ticket {
	gate: Arc<AsyncMutex<()>>,
	slot: Arc<Mutex<Option<Result<Value>>>>,
}
impl Ticket {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Claims leadership by locking the gate without suspending. Always succeeds on a fresh
	/// ticket.
	pub(crate) fn try_lead(&self) -> Option<TicketLead> {
		self.gate.try_lock_arc().map(|guard| TicketLead { ticket: self.clone(), _guard: guard })
	}

	/// Waits for the leader to settle and returns its outcome.
	pub(crate) async fn join(&self) -> Result<Value> {
		let _released = self.gate.lock().await;

		self.slot.lock().clone().unwrap_or_else(|| Err(Error::abandoned()))
	}
}
impl Debug for Ticket {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Ticket").field("settled", &self.slot.lock().is_some()).finish()
	}
}

/// Leadership over one [`Ticket`]; dropping it releases every joiner.
///
/// If the lead is dropped before [`settle`](Self::settle) because the leading future was
/// cancelled, the slot is poisoned with an abandonment error so joiners never hang on an empty
/// outcome.
pub(crate) struct TicketLead {
	ticket: Ticket,
	_guard: AsyncMutexGuardArc<()>,
}
impl TicketLead {
	/// Publishes the settled outcome and releases the gate.
	pub(crate) fn settle(self, outcome: &Result<Value>) {
		*self.ticket.slot.lock() = Some(outcome.clone());
	}
}
impl Drop for TicketLead {
	fn drop(&mut self) {
		let mut slot = self.ticket.slot.lock();

		if slot.is_none() {
			*slot = Some(Err(Error::abandoned()));
		}
	}
}

type TicketMap = Arc<Mutex<HashMap<DedupKey, Ticket>>>;

/// In-flight ticket map guaranteeing at most one transport call per [`DedupKey`].
#[derive(Clone, Debug, Default)]
pub(crate) struct Deduplicator {
	tickets: TicketMap,
}
impl Deduplicator {
	/// Claims the key: the first caller leads, every concurrent caller joins the same ticket.
	///
	/// Lookup and insertion happen under one lock with no suspension point, so two callers can
	/// never both lead the same key.
	pub(crate) fn claim(&self, key: DedupKey) -> Claim {
		let mut tickets = self.tickets.lock();

		if let Some(existing) = tickets.get(&key) {
			return Claim::Joined(existing.clone());
		}

		let ticket = Ticket::new();

		match ticket.try_lead() {
			Some(lead) => {
				tickets.insert(key.clone(), ticket);

				Claim::Lead(DedupLead { key, tickets: self.tickets.clone(), lead: Some(lead) })
			},
			// A fresh gate always locks; joining is the sound fallback.
			None => Claim::Joined(ticket),
		}
	}

	#[cfg(test)]
	pub(crate) fn in_flight(&self) -> usize {
		self.tickets.lock().len()
	}
}

/// Outcome of claiming a [`DedupKey`].
pub(crate) enum Claim {
	/// This caller issues the transport call and settles the ticket.
	Lead(DedupLead),
	/// An identical request is already in flight; share its outcome.
	Joined(Ticket),
}

/// Leadership over a deduplicated request; removes the ticket from the map on settlement.
pub(crate) struct DedupLead {
	key: DedupKey,
	tickets: TicketMap,
	lead: Option<TicketLead>,
}
impl DedupLead {
	/// Removes the ticket unconditionally, success or failure, then publishes the outcome, so the
	/// next caller always re-fetches.
	pub(crate) fn settle(mut self, outcome: &Result<Value>) {
		self.tickets.lock().remove(&self.key);

		if let Some(lead) = self.lead.take() {
			lead.settle(outcome);
		}
	}
}
impl Drop for DedupLead {
	fn drop(&mut self) {
		// Only an unsettled lead still owns the map entry; after settlement the key may already
		// belong to a successor ticket.
		if self.lead.is_some() {
			self.tickets.lock().remove(&self.key);
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::request::Method;

	#[test]
	fn canonical_query_ignores_object_key_order() {
		let a = json!({ "page": 1, "filter": { "size": "42", "color": "red" } });
		let b = json!({ "filter": { "color": "red", "size": "42" }, "page": 1 });

		assert_eq!(canonical_query(&a), canonical_query(&b));
		assert_eq!(canonical_query(&a), r#"{"filter":{"color":"red","size":"42"},"page":1}"#);
	}

	#[test]
	fn canonical_query_preserves_array_order() {
		let a = json!({ "ids": [3, 1, 2] });
		let b = json!({ "ids": [1, 2, 3] });

		assert_ne!(canonical_query(&a), canonical_query(&b));
		assert_eq!(canonical_query(&a), r#"{"ids":[3,1,2]}"#);
	}

	#[test]
	fn canonical_query_distinguishes_primitive_types() {
		assert_ne!(canonical_query(&json!({ "v": 1 })), canonical_query(&json!({ "v": "1" })));
		assert_eq!(canonical_query(&json!({ "v": null })), r#"{"v":null}"#);
		assert_eq!(canonical_query(&json!({ "v": true })), r#"{"v":true}"#);
	}

	#[test]
	fn dedup_keys_collapse_reordered_parameters() {
		let a = RequestDescriptor::new(Method::Get, "/products")
			.with_query(json!({ "category": 7, "sort": "price" }));
		let b = RequestDescriptor::new(Method::Get, "/products")
			.with_query(json!({ "sort": "price", "category": 7 }));
		let c = RequestDescriptor::new(Method::Get, "/products")
			.with_query(json!({ "sort": "name", "category": 7 }));

		assert_eq!(DedupKey::for_descriptor(&a), DedupKey::for_descriptor(&b));
		assert_ne!(DedupKey::for_descriptor(&a), DedupKey::for_descriptor(&c));
	}

	#[tokio::test]
	async fn joiners_share_the_leader_outcome() {
		let dedup = Deduplicator::default();
		let key = DedupKey::for_descriptor(&RequestDescriptor::new(Method::Get, "/categories"));
		let lead = match dedup.claim(key.clone()) {
			Claim::Lead(lead) => lead,
			Claim::Joined(_) => panic!("First claim should lead."),
		};
		let joined = match dedup.claim(key.clone()) {
			Claim::Joined(ticket) => ticket,
			Claim::Lead(_) => panic!("Second claim should join the in-flight ticket."),
		};
		let waiter = tokio::spawn(async move { joined.join().await });

		lead.settle(&Ok(json!(["shoes", "hats"])));

		let shared = waiter
			.await
			.expect("Joiner task should not panic.")
			.expect("Joiner should observe the leader's success.");

		assert_eq!(shared, json!(["shoes", "hats"]));
		assert_eq!(dedup.in_flight(), 0, "settlement must remove the ticket");
	}

	#[tokio::test]
	async fn dropped_leads_poison_their_joiners() {
		let dedup = Deduplicator::default();
		let key = DedupKey::for_descriptor(&RequestDescriptor::new(Method::Get, "/profile"));
		let lead = match dedup.claim(key.clone()) {
			Claim::Lead(lead) => lead,
			Claim::Joined(_) => panic!("First claim should lead."),
		};
		let joined = match dedup.claim(key) {
			Claim::Joined(ticket) => ticket,
			Claim::Lead(_) => panic!("Second claim should join the in-flight ticket."),
		};

		drop(lead);

		let outcome = joined.join().await;

		assert!(matches!(outcome, Err(Error::Network { .. })));
		assert_eq!(dedup.in_flight(), 0);
	}
}
