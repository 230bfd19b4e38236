//! End-to-end engine scenarios over wiremock HTTP mocks and an in-memory
//! cache.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catsync_ads::AdsClient;
use catsync_core::{FeedStyle, MapperConfig, ProductKind, SourceProduct, StockStatus};
use catsync_db::{products, sync_status, variations};
use catsync_engine::{SyncEngine, TargetedOutcome, WebhookHeaders, WebhookProcessor};
use catsync_store::StoreClient;

const STORE_HOST: &str = "shop.example.com";
const WEBHOOK_SECRET: &str = "whsec-test";

async fn build_engine(store: &MockServer, ads: &MockServer) -> (Arc<SyncEngine>, sqlx::SqlitePool) {
    let pool = catsync_db::connect_memory().await.expect("pool");
    let store_client =
        StoreClient::new(&store.uri(), "ck_test", "cs_test", 30).expect("store client");
    let ads_client = AdsClient::new(&ads.uri(), "777", "tok", 30).expect("ads client");
    let mapper = MapperConfig {
        brand: "Acme".to_string(),
        currency_suffix: "BAM".to_string(),
        render_base_url: "https://render.example.com/render".to_string(),
    };
    let engine = Arc::new(SyncEngine::new(store_client, ads_client, pool.clone(), mapper));
    (engine, pool)
}

fn processor(engine: &Arc<SyncEngine>) -> WebhookProcessor {
    WebhookProcessor::new(
        Arc::clone(engine),
        WEBHOOK_SECRET.to_string(),
        Some(STORE_HOST.to_string()),
    )
}

fn sign(body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("hmac key");
    mac.update(body);
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

fn webhook_headers(topic: &str, signature: String) -> WebhookHeaders {
    WebhookHeaders {
        topic: Some(topic.to_string()),
        signature: Some(signature),
        source: Some(format!("https://{STORE_HOST}")),
        delivery_id: Some("d-1".to_string()),
    }
}

fn shirt_42() -> serde_json::Value {
    serde_json::json!({
        "id": 42,
        "type": "simple",
        "name": "Shirt",
        "permalink": "https://x/shirt",
        "regular_price": "10.00",
        "stock_status": "instock",
        "stock_quantity": 7,
        "images": [{"src": "https://x/s.jpg"}],
    })
}

async fn mock_empty_remote(ads: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/777/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(ads)
        .await;
}

async fn batch_requests(ads: &MockServer) -> Vec<serde_json::Value> {
    ads.received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method == wiremock::http::Method::POST)
        .map(|r| serde_json::from_slice(&r.body).expect("batch body is JSON"))
        .collect()
}

// A single in-stock simple product on first sync becomes one CREATE.
#[tokio::test]
async fn initial_sync_creates_simple_product() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("stock_status", "instock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([shirt_42()])))
        .mount(&store)
        .await;
    mock_empty_remote(&ads).await;
    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "validation_status": [{"retailer_id": "wc_42", "errors": []}]
        })))
        .expect(1)
        .mount(&ads)
        .await;

    let (engine, pool) = build_engine(&store, &ads).await;
    let report = engine.run_initial_sync().await.expect("sync");

    assert_eq!(report.total, 1);
    assert_eq!(report.in_stock, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.errors, 0);

    let batches = batch_requests(&ads).await;
    assert_eq!(batches.len(), 1);
    let request = &batches[0]["requests"][0];
    assert_eq!(request["method"], "CREATE");
    assert_eq!(request["retailer_id"], "wc_42");
    assert_eq!(request["data"]["id"], "wc_42");
    assert_eq!(request["data"]["price"], "10.00 BAM");
    let images = request["data"]["image"].as_array().expect("image array");
    assert_eq!(images.len(), 3);
    assert_eq!(
        images[1]["tag"],
        serde_json::json!(["ASPECT_RATIO_4_5_PREFERRED"])
    );

    let status = sync_status::get_sync_status(&pool, "wc_42")
        .await
        .expect("query")
        .expect("row");
    assert_eq!(status.sync_state, "synced");
    assert_eq!(status.last_availability.as_deref(), Some("in stock"));
    assert_eq!(status.last_inventory, Some(7));
}

// A variable product with two variations: only the in-stock variation
// is emitted, never the parent.
#[tokio::test]
async fn initial_sync_emits_variations_not_parent() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;

    let parent = serde_json::json!({
        "id": 100,
        "type": "variable",
        "name": "Hoodie",
        "permalink": "https://x/hoodie",
        "stock_status": "instock",
        "variations": [201, 202],
    });
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([parent])))
        .mount(&store)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/100/variations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 201, "parent_id": 100, "type": "variation",
                "regular_price": "12.00", "sale_price": "8.00",
                "stock_status": "instock", "stock_quantity": 3
            },
            {
                "id": 202, "parent_id": 100, "type": "variation",
                "regular_price": "12.00",
                "stock_status": "outofstock", "stock_quantity": 0
            }
        ])))
        .expect(1)
        .mount(&store)
        .await;
    mock_empty_remote(&ads).await;
    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"handles": ["h1"]})),
        )
        .expect(1)
        .mount(&ads)
        .await;

    let (engine, pool) = build_engine(&store, &ads).await;
    let report = engine.run_initial_sync().await.expect("sync");

    assert_eq!(report.in_stock, 1, "only the in-stock variation is emitted");
    assert_eq!(report.skipped, 1, "the out-of-stock variation is skipped");

    let batches = batch_requests(&ads).await;
    let requests = batches[0]["requests"].as_array().expect("requests");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["retailer_id"], "wc_201");
    assert_eq!(requests[0]["data"]["item_group_id"], "wc_100");
    assert_eq!(requests[0]["data"]["sale_price"], "8.00 BAM");
    let body_text = serde_json::to_string(&batches[0]).expect("body");
    assert!(
        !body_text.contains("wc_100_main"),
        "the variable parent must not be in the batch"
    );

    // Both variations got a sync-status row owned by the parent product.
    assert!(sync_status::get_sync_status(&pool, "wc_201").await.unwrap().is_some());
    assert!(sync_status::get_sync_status(&pool, "wc_202").await.unwrap().is_some());
}

// Rerunning bulk sync on an unchanged source flips all creates into
// updates and produces no errors.
#[tokio::test]
async fn second_sync_on_unchanged_source_only_updates() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([shirt_42()])))
        .mount(&store)
        .await;
    // First enumeration: empty catalog. Afterwards: wc_42 exists.
    Mock::given(method("GET"))
        .and(path("/777/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .up_to_n_times(1)
        .mount(&ads)
        .await;
    Mock::given(method("GET"))
        .and(path("/777/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"retailer_id": "wc_42", "availability": "in stock", "inventory": 7}]
        })))
        .mount(&ads)
        .await;
    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"handles": ["h"]})),
        )
        .mount(&ads)
        .await;

    let (engine, _pool) = build_engine(&store, &ads).await;

    let first = engine.run_initial_sync().await.expect("first run");
    assert_eq!(first.created, 1);
    assert_eq!(first.updated, 0);

    let second = engine.run_initial_sync().await.expect("second run");
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 1);
    assert_eq!(second.errors, 0);
}

// An update event with unchanged stock issues no batch request.
#[tokio::test]
async fn unchanged_update_event_is_a_no_op() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;

    let (engine, pool) = build_engine(&store, &ads).await;

    // Cache already holds product 42, synced with identical stock.
    let cached: SourceProduct = serde_json::from_value(shirt_42()).expect("product");
    products::upsert_product(&pool, &cached).await.expect("seed");
    sync_status::upsert_sync_status(&pool, 42, "wc_42").await.expect("status");
    sync_status::mark_synced(&pool, "wc_42", "in stock", Some(7)).await.expect("mark");

    let body = serde_json::to_vec(&shirt_42()).expect("body");
    let headers = webhook_headers("product.updated", sign(&body));

    let processor = processor(&engine);
    let accepted = processor.ingest(&headers, &body).await.expect("ingest");
    assert_eq!(accepted.product.id, 42);
    processor.process(accepted.clone()).await;

    let events = catsync_db::events::recent_events(&pool, 10).await.expect("events");
    assert_eq!(events.len(), 1);
    assert!(events[0].processed, "event marked processed");
    assert_eq!(events[0].stock_delta, Some(0));

    assert!(
        batch_requests(&ads).await.is_empty(),
        "no batch request for unchanged stock"
    );
}

// Deleting a remotely-known product: one out-of-stock UPDATE, then the
// cache rows disappear via cascade.
#[tokio::test]
async fn deletion_marks_out_of_stock_and_drops_cache_rows() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "validation_status": [{"retailer_id": "wc_42", "errors": []}]
        })))
        .expect(1)
        .mount(&ads)
        .await;

    let (engine, pool) = build_engine(&store, &ads).await;

    let cached: SourceProduct = serde_json::from_value(shirt_42()).expect("product");
    products::upsert_product(&pool, &cached).await.expect("seed");
    sync_status::upsert_sync_status(&pool, 42, "wc_42").await.expect("status");
    sync_status::mark_synced(&pool, "wc_42", "in stock", Some(7)).await.expect("mark");

    let body = serde_json::to_vec(&shirt_42()).expect("body");
    let headers = webhook_headers("product.deleted", sign(&body));

    let processor = processor(&engine);
    let accepted = processor.ingest(&headers, &body).await.expect("ingest");
    processor.process(accepted).await;

    let batches = batch_requests(&ads).await;
    assert_eq!(batches.len(), 1, "exactly one UPDATE batch");
    let request = &batches[0]["requests"][0];
    assert_eq!(request["method"], "UPDATE");
    assert_eq!(request["retailer_id"], "wc_42");
    assert_eq!(request["data"]["availability"], "out of stock");
    assert_eq!(request["data"]["inventory"], 0);

    assert!(products::get_product(&pool, 42).await.unwrap().is_none());
    assert!(
        sync_status::get_sync_status(&pool, "wc_42").await.unwrap().is_none(),
        "sync-status cascades with the product row"
    );
}

// An invalid signature: 401, nothing persisted, nothing sent.
#[tokio::test]
async fn invalid_signature_rejects_without_side_effects() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;
    let (engine, pool) = build_engine(&store, &ads).await;

    let body = serde_json::to_vec(&shirt_42()).expect("body");
    let headers = webhook_headers("product.updated", "bm90LWEtc2lnbmF0dXJl".to_string());

    let processor = processor(&engine);
    let err = processor
        .ingest(&headers, &body)
        .await
        .expect_err("must reject");
    match err {
        catsync_engine::WebhookError::Rejected(rejection) => {
            assert_eq!(rejection.status_code(), 401);
        }
        other => panic!("expected rejection, got: {other}"),
    }

    let events = catsync_db::events::recent_events(&pool, 10).await.expect("events");
    assert!(events.is_empty(), "no event row for rejected deliveries");
    assert!(batch_requests(&ads).await.is_empty());
}

// Validation order: wrong source host is a 403 even with a bad signature.
#[tokio::test]
async fn foreign_source_rejects_with_403() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;
    let (engine, _pool) = build_engine(&store, &ads).await;

    let body = serde_json::to_vec(&shirt_42()).expect("body");
    let mut headers = webhook_headers("product.updated", "garbage".to_string());
    headers.source = Some("https://evil.example.net".to_string());

    let processor = processor(&engine);
    let err = processor.ingest(&headers, &body).await.expect_err("must reject");
    match err {
        catsync_engine::WebhookError::Rejected(rejection) => {
            assert_eq!(rejection.status_code(), 403);
        }
        other => panic!("expected rejection, got: {other}"),
    }
}

// A variation event whose parent is not cached triggers exactly one
// parent fetch.
#[tokio::test]
async fn variation_event_rehydrates_uncached_parent_once() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products/100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 100,
            "type": "variable",
            "name": "Hoodie",
            "permalink": "https://x/hoodie",
            "stock_status": "instock",
            "variations": [201],
        })))
        .expect(1)
        .mount(&store)
        .await;
    Mock::given(method("GET"))
        .and(path("/777/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&ads)
        .await;
    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"handles": ["h"]})),
        )
        .expect(1)
        .mount(&ads)
        .await;

    let (engine, pool) = build_engine(&store, &ads).await;

    let variation = serde_json::json!({
        "id": 201,
        "parent_id": 100,
        "type": "variation",
        "regular_price": "12.00",
        "stock_status": "instock",
        "stock_quantity": 3,
    });
    let body = serde_json::to_vec(&variation).expect("body");
    let headers = webhook_headers("product.updated", sign(&body));

    let processor = processor(&engine);
    let accepted = processor.ingest(&headers, &body).await.expect("ingest");
    processor.process(accepted).await;

    let events = catsync_db::events::recent_events(&pool, 10).await.expect("events");
    assert!(events[0].processed, "event processed: {:?}", events[0].error);

    // Parent landed in the cache; the variation synced under it.
    assert!(products::get_product(&pool, 100).await.unwrap().is_some());
    let cached = variations::list_variations(&pool, 100).await.expect("variations");
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].retailer_id, "wc_201");

    let batches = batch_requests(&ads).await;
    assert_eq!(batches[0]["requests"][0]["data"]["item_group_id"], "wc_100");
    assert_eq!(
        batches[0]["requests"][0]["data"]["title"], "Hoodie",
        "mapping context comes from the rehydrated parent"
    );
}

// Targeted path: out-of-stock transition while present remotely issues
// exactly one stock-zero UPDATE.
#[tokio::test]
async fn out_of_stock_transition_updates_remote() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "validation_status": [{"retailer_id": "wc_42", "errors": []}]
        })))
        .expect(1)
        .mount(&ads)
        .await;

    let (engine, pool) = build_engine(&store, &ads).await;

    let cached: SourceProduct = serde_json::from_value(shirt_42()).expect("product");
    products::upsert_product(&pool, &cached).await.expect("seed");
    sync_status::upsert_sync_status(&pool, 42, "wc_42").await.expect("status");
    sync_status::mark_synced(&pool, "wc_42", "in stock", Some(7)).await.expect("mark");

    let mut gone = cached.clone();
    gone.stock_status = StockStatus::OutOfStock;
    gone.stock_quantity = Some(0);

    let outcome = engine.sync_product(&gone, None).await.expect("targeted");
    assert_eq!(outcome, TargetedOutcome::MarkedOutOfStock);

    let status = sync_status::get_sync_status(&pool, "wc_42").await.unwrap().unwrap();
    assert_eq!(status.last_availability.as_deref(), Some("out of stock"));
    assert_eq!(status.last_inventory, Some(0));
}

// Targeted path: out-of-stock and never seen remotely is a no-op.
#[tokio::test]
async fn out_of_stock_unknown_remotely_is_skipped() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;
    let (engine, _pool) = build_engine(&store, &ads).await;

    let product = SourceProduct {
        id: 9,
        kind: ProductKind::Simple,
        stock_status: StockStatus::OutOfStock,
        ..SourceProduct::default()
    };
    let outcome = engine.sync_product(&product, None).await.expect("targeted");
    assert_eq!(outcome, TargetedOutcome::Skipped);
    assert!(batch_requests(&ads).await.is_empty());
}

// Fast CSV generation from the cache.
#[tokio::test]
async fn fast_feed_emits_anchor_and_children() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;
    let (engine, pool) = build_engine(&store, &ads).await;

    let simple: SourceProduct = serde_json::from_value(shirt_42()).expect("product");
    products::upsert_product(&pool, &simple).await.expect("seed simple");

    let parent = SourceProduct {
        id: 100,
        kind: ProductKind::Variable,
        name: "Hoodie".into(),
        permalink: "https://x/hoodie".into(),
        stock_status: StockStatus::InStock,
        variations: vec![201],
        ..SourceProduct::default()
    };
    products::upsert_product(&pool, &parent).await.expect("seed parent");
    let variation = SourceProduct {
        id: 201,
        parent_id: 100,
        kind: ProductKind::Variation,
        regular_price: "12.00".into(),
        stock_status: StockStatus::InStock,
        stock_quantity: Some(3),
        ..SourceProduct::default()
    };
    variations::upsert_variation(&pool, 100, &variation)
        .await
        .expect("seed variation");

    let csv_text = engine.generate_feed(FeedStyle::Standard).await.expect("feed");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_text.as_bytes());
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.len(), 28);
    assert_eq!(&headers[0], "id");
    assert_eq!(&headers[13], "image[1].tag[0]");

    let rows: Vec<csv::StringRecord> =
        reader.records().collect::<Result<_, _>>().expect("rows");
    assert_eq!(rows.len(), 3);

    let ids: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
    assert!(ids.contains(&"wc_42"));
    assert!(ids.contains(&"wc_100_main"), "parent anchor row present");
    assert!(ids.contains(&"wc_201"));

    for row in &rows {
        assert_eq!(row.len(), 28);
        assert_eq!(&row[13], "ASPECT_RATIO_4_5_PREFERRED");
    }

    // The anchor row aggregates its children.
    let anchor = rows.iter().find(|r| &r[0] == "wc_100_main").expect("anchor");
    assert_eq!(&anchor[4], "in stock");
    assert_eq!(&anchor[27], "3", "inventory is the child quantity sum");

    // Fast path is deterministic for identical cache state.
    let again = engine.generate_feed(FeedStyle::Standard).await.expect("feed again");
    assert_eq!(csv_text, again);
}

// The style tag only changes the rendered-image URLs.
#[tokio::test]
async fn styles_differ_only_in_render_urls() {
    let store = MockServer::start().await;
    let ads = MockServer::start().await;
    let (engine, pool) = build_engine(&store, &ads).await;

    let simple: SourceProduct = serde_json::from_value(shirt_42()).expect("product");
    products::upsert_product(&pool, &simple).await.expect("seed");

    let standard = engine.generate_feed(FeedStyle::Standard).await.expect("standard");
    let christmas = engine.generate_feed(FeedStyle::Christmas).await.expect("christmas");

    assert_ne!(standard, christmas);
    assert_eq!(
        standard.replace("style%3Dstandard", "style%3Dchristmas")
            .replace("style=standard", "style=christmas"),
        christmas
    );
}
