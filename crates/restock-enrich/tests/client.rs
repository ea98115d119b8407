//! Integration tests for `EnrichmentClient` using wiremock HTTP mocks.

use restock_enrich::{EnrichError, EnrichOptions, EnrichmentClient};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restock_core::Identifier;

fn test_client(base_url: &str) -> EnrichmentClient {
    EnrichmentClient::with_base_url("test-key", 30, 2, 0, base_url)
        .expect("client construction should not fail")
}

fn ids(raw: &[&str]) -> Vec<Identifier> {
    raw.iter()
        .map(|s| Identifier::parse(s).expect("test identifier"))
        .collect()
}

#[tokio::test]
async fn fetch_returns_parsed_records_and_token_counters() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "ok",
        "records": [
            {
                "identifier": "B0ABC12345",
                "title": "Wireless Charger 2-Pack",
                "image_url": "https://img.example.com/b0abc12345.jpg",
                "price": "10.00",
                "rating": "4.5",
                "review_count": 321,
                "in_stock": true,
                "category": "Electronics",
                "brand": "Acme"
            }
        ],
        "tokens_used": 1,
        "tokens_saved": 0,
        "from_cache": 0,
        "from_api": 1
    });

    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .and(body_partial_json(
            serde_json::json!({ "ids": ["B0ABC12345"], "skip_cache": false }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client
        .fetch(&ids(&["B0ABC12345"]), &EnrichOptions::default())
        .await
        .expect("should parse response");

    assert_eq!(response.records.len(), 1);
    assert_eq!(response.records[0].identifier.as_str(), "B0ABC12345");
    assert_eq!(
        response.records[0].title.as_deref(),
        Some("Wireless Charger 2-Pack")
    );
    assert_eq!(response.tokens_used, 1);
    assert_eq!(response.from_api, 1);
}

#[tokio::test]
async fn fetch_passes_skip_cache_flag() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .and(body_partial_json(serde_json::json!({ "skip_cache": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "records": [],
            "tokens_used": 2
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client
        .fetch(&ids(&["B0ABC12345"]), &EnrichOptions { skip_cache: true })
        .await
        .expect("should parse response");

    assert!(response.records.is_empty());
    assert_eq!(response.tokens_used, 2);
}

#[tokio::test]
async fn missing_identifiers_are_not_an_error() {
    let server = MockServer::start().await;

    // Two identifiers requested, one record returned — the caller decides
    // what a miss means; the client just reports what came back.
    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "records": [
                { "identifier": "B000000001", "title": "Present" }
            ],
            "tokens_used": 2
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client
        .fetch(&ids(&["B000000001", "B000000002"]), &EnrichOptions::default())
        .await
        .expect("partial responses are still Ok");

    assert_eq!(response.records.len(), 1);
}

#[tokio::test]
async fn quota_exhaustion_is_a_hard_stop() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "message": "daily token quota exhausted"
        })))
        // With 2 retries configured, a retried 402 would hit 3 times.
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch(&ids(&["B0ABC12345"]), &EnrichOptions::default())
        .await
        .unwrap_err();

    assert!(
        matches!(err, EnrichError::QuotaExceeded(ref msg) if msg.contains("quota")),
        "expected QuotaExceeded, got: {err:?}"
    );
}

#[tokio::test]
async fn api_error_envelope_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "error",
            "message": "invalid API key"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch(&ids(&["B0ABC12345"]), &EnrichOptions::default())
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(
        msg.contains("invalid API key"),
        "expected message to contain 'invalid API key', got: {msg}"
    );
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    // Serve 429 exactly once, then a normal response.
    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "records": [],
            "tokens_used": 1
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client
        .fetch(&ids(&["B0ABC12345"]), &EnrichOptions::default())
        .await
        .expect("should succeed after one retry");

    assert_eq!(response.tokens_used, 1);
}
