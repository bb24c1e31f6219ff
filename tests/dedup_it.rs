#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use storefront_client::{
	client::Client,
	config::ClientConfig,
	error::Error,
	http::ReqwestTransport,
	request::RequestOptions,
	store::{CredentialStore, MemoryStore},
	url::Url,
};

fn build_client(server: &MockServer) -> Client<ReqwestTransport> {
	let base = Url::parse(&server.base_url())
		.expect("Mock server base URL should parse successfully.");
	let config =
		ClientConfig::builder(base).build().expect("Test configuration should validate.");
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());

	Client::new(config, store).expect("Reqwest-backed client should build successfully.")
}

#[tokio::test]
async fn concurrent_identical_reads_share_one_call() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/products");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[\"sneakers\",\"boots\"]}");
		})
		.await;
	// Same logical parameters, different insertion order.
	let options_a = RequestOptions::default()
		.with_query(json!({ "category": 7, "sort": "price", "filter": { "size": 42, "color": "red" } }));
	let options_b = RequestOptions::default()
		.with_query(json!({ "sort": "price", "filter": { "color": "red", "size": 42 }, "category": 7 }));
	let options_c = options_a.clone();
	let (first, second, third) = tokio::join!(
		client.get("/products", options_a),
		client.get("/products", options_b),
		client.get("/products", options_c),
	);
	let first = first.expect("First deduplicated read should succeed.");
	let second = second.expect("Second deduplicated read should succeed.");
	let third = third.expect("Third deduplicated read should succeed.");

	assert_eq!(first, json!({ "items": ["sneakers", "boots"] }));
	assert_eq!(first, second);
	assert_eq!(first, third);

	mock.assert_calls_async(1).await;

	// After settlement the ticket is gone; the next identical read fetches again.
	client
		.get("/products", RequestOptions::default().with_query(json!({ "category": 7, "sort": "price", "filter": { "size": 42, "color": "red" } })))
		.await
		.expect("Read after settlement should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn joiners_share_the_leader_failure() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/flaky");
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"error\":\"upstream exploded\"}");
		})
		.await;
	let (first, second) = tokio::join!(
		client.get("/flaky", RequestOptions::default()),
		client.get("/flaky", RequestOptions::default()),
	);
	let first = first.expect_err("First read should observe the server failure.");
	let second = second.expect_err("Second read should observe the identical failure.");

	assert!(matches!(&first, Error::Http(failure) if failure.status == 500));
	assert!(matches!(&second, Error::Http(failure) if failure.status == 500));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn distinct_parameters_do_not_share_calls() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/products");
			then.status(200).header("content-type", "application/json").body("{\"items\":[]}");
		})
		.await;
	let (first, second) = tokio::join!(
		client.get("/products", RequestOptions::default().with_query(json!({ "page": 1 }))),
		client.get("/products", RequestOptions::default().with_query(json!({ "page": 2 }))),
	);

	first.expect("Page 1 read should succeed.");
	second.expect("Page 2 read should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn mutations_are_never_deduplicated() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/cart");
			then.status(200).header("content-type", "application/json").body("{\"ok\":true}");
		})
		.await;
	let options = RequestOptions::default().with_body(json!({ "product_id": 7 }));
	let (first, second) =
		tokio::join!(client.post("/cart", options.clone()), client.post("/cart", options));

	first.expect("First mutation should succeed.");
	second.expect("Second mutation should succeed.");

	mock.assert_calls_async(2).await;
}
