//! Integration tests for `AdsClient` using wiremock HTTP mocks.

use catsync_ads::{AdsClient, BatchItem, BatchMethod};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> AdsClient {
    AdsClient::new(base_url, "777", "secret-token", 30)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn enumerate_follows_cursor_chain() {
    let server = MockServer::start().await;

    let page2_url = format!("{}/777/products?after=CURSOR&fields=retailer_id", server.uri());
    let page1 = serde_json::json!({
        "data": [
            {"retailer_id": "wc_1", "availability": "in stock", "inventory": 3},
            {"retailer_id": "wc_2", "availability": "out of stock", "inventory": 0},
        ],
        "paging": {"next": page2_url}
    });
    let page2 = serde_json::json!({
        "data": [{"retailer_id": "wc_3"}],
        "paging": {}
    });

    Mock::given(method("GET"))
        .and(path("/777/products"))
        .and(query_param("limit", "500"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page1))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/777/products"))
        .and(query_param("after", "CURSOR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page2))
        .mount(&server)
        .await;

    let items = test_client(&server.uri())
        .enumerate("retailer_id,availability,inventory", 500)
        .await
        .expect("should follow the cursor chain");

    assert_eq!(items.len(), 3);
    assert_eq!(items[2].retailer_id, "wc_3");
}

#[tokio::test]
async fn remote_state_is_keyed_by_retailer_id() {
    let server = MockServer::start().await;

    let page = serde_json::json!({
        "data": [{"retailer_id": "wc_42", "availability": "in stock", "inventory": 7}]
    });
    Mock::given(method("GET"))
        .and(path("/777/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page))
        .mount(&server)
        .await;

    let state = test_client(&server.uri())
        .remote_state()
        .await
        .expect("should materialize the map");

    assert_eq!(state.len(), 1);
    assert_eq!(state["wc_42"].inventory, Some(7));
}

#[tokio::test]
async fn lookup_sends_retailer_id_filter() {
    let server = MockServer::start().await;

    let expected_filter = serde_json::json!({"retailer_id": {"eq": "wc_42"}}).to_string();
    let page = serde_json::json!({
        "data": [{"retailer_id": "wc_42", "availability": "in stock"}]
    });
    Mock::given(method("GET"))
        .and(path("/777/products"))
        .and(query_param("filter", expected_filter.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page))
        .mount(&server)
        .await;

    let found = test_client(&server.uri())
        .lookup("wc_42")
        .await
        .expect("lookup should succeed");
    assert_eq!(found.map(|i| i.retailer_id), Some("wc_42".to_string()));
}

#[tokio::test]
async fn lookup_miss_returns_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/777/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;

    let found = test_client(&server.uri())
        .lookup("wc_missing")
        .await
        .expect("lookup should succeed");
    assert!(found.is_none());
}

#[tokio::test]
async fn batch_embeds_retailer_id_into_data_block() {
    let server = MockServer::start().await;

    // The data block must repeat the retailer id as its own id.
    let expected_body = serde_json::json!({
        "item_type": "PRODUCT_ITEM",
        "requests": [{
            "method": "CREATE",
            "retailer_id": "wc_42",
            "data": {"id": "wc_42", "price": "10.00 BAM"}
        }]
    });
    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_partial_json(&expected_body))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"handles": ["h1"]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = test_client(&server.uri())
        .batch(vec![BatchItem::new(
            BatchMethod::Create,
            "wc_42",
            serde_json::json!({"price": "10.00 BAM"}),
        )])
        .await
        .expect("batch should succeed");

    assert_eq!(response.handles.as_deref(), Some(&["h1".to_string()][..]));
    assert!(response.error.is_none());
}

#[tokio::test]
async fn batch_over_limit_is_rejected_locally() {
    let server = MockServer::start().await;
    let items: Vec<BatchItem> = (0..1001)
        .map(|i| {
            BatchItem::new(
                BatchMethod::Update,
                format!("wc_{i}"),
                serde_json::json!({}),
            )
        })
        .collect();

    let err = test_client(&server.uri())
        .batch(items)
        .await
        .expect_err("1001 items must be rejected");
    assert!(matches!(
        err,
        catsync_ads::AdsError::BatchTooLarge { count: 1001, .. }
    ));
}

#[tokio::test]
async fn batch_api_error_comes_back_in_body_not_as_err() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "Invalid parameter", "type": "GraphMethodException", "code": 100}
        })))
        .mount(&server)
        .await;

    let response = test_client(&server.uri())
        .batch(vec![BatchItem::new(
            BatchMethod::Update,
            "wc_1",
            serde_json::json!({}),
        )])
        .await
        .expect("API errors are data, not transport failures");

    let error = response.error.expect("error object present");
    assert_eq!(error.message, "Invalid parameter");
    assert_eq!(error.code, Some(100));
}

#[tokio::test]
async fn update_stock_builds_single_update() {
    let server = MockServer::start().await;

    let expected_body = serde_json::json!({
        "requests": [{
            "method": "UPDATE",
            "retailer_id": "wc_42",
            "data": {"id": "wc_42", "availability": "out of stock", "inventory": 0}
        }]
    });
    Mock::given(method("POST"))
        .and(path("/777/items_batch"))
        .and(body_partial_json(&expected_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "validation_status": [{"retailer_id": "wc_42", "errors": []}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_client(&server.uri())
        .update_stock("wc_42", "out of stock", Some(0))
        .await
        .expect("update should succeed");

    let statuses = response.validation_status.expect("validation statuses");
    assert_eq!(statuses[0].retailer_id, "wc_42");
    assert!(!statuses[0].has_errors());
}

#[tokio::test]
async fn poll_handle_fetches_handle_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/h_abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "finished"
        })))
        .mount(&server)
        .await;

    let status = test_client(&server.uri())
        .poll_handle("h_abc123")
        .await
        .expect("poll should succeed");
    assert_eq!(status["status"], "finished");
}
