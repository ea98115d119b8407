//! HTTP client for the product-data enrichment provider.
//!
//! Wraps `reqwest` with provider-specific error handling, API key
//! management, and typed response deserialization. Batch lookups check the
//! `"status"` field in the JSON envelope and surface API-level errors as
//! [`EnrichError::ApiError`] (or [`EnrichError::QuotaExceeded`] for token
//! exhaustion, which callers must treat as a hard stop).

use std::time::Duration;

use reqwest::{Client, Url};

use restock_core::Identifier;

use crate::error::EnrichError;
use crate::retry::retry_with_backoff;
use crate::types::{EnrichOptions, EnrichResponse};

const DEFAULT_BASE_URL: &str = "https://api.keepa.com/";

/// Client for the enrichment provider's REST API.
///
/// Manages the HTTP client, API key, base URL, and retry policy. Use
/// [`EnrichmentClient::new`] for production or
/// [`EnrichmentClient::with_base_url`] to point at a mock server in tests.
pub struct EnrichmentClient {
    client: Client,
    api_key: String,
    base_url: Url,
    /// Maximum number of retry attempts after the first failure.
    max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    backoff_base_ms: u64,
}

impl EnrichmentClient {
    /// Creates a new client pointed at the production provider API.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, EnrichError> {
        Self::with_base_url(api_key, timeout_secs, max_retries, backoff_base_ms, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`EnrichError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
        base_url: &str,
    ) -> Result<Self, EnrichError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("restock/0.1 (catalog-enrichment)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // joined paths resolve under the root rather than replacing the last
        // path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| EnrichError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Fetches enrichment records for a batch of identifiers, with automatic
    /// retry on transient errors (429, network failures, 5xx).
    ///
    /// Identifiers absent from the returned `records` had no data at the
    /// provider; the caller records each as a per-item miss.
    ///
    /// # Errors
    ///
    /// - [`EnrichError::QuotaExceeded`] if the provider's token quota is
    ///   exhausted (never retried).
    /// - [`EnrichError::RateLimited`] — HTTP 429 after all retries exhausted.
    /// - [`EnrichError::ApiError`] on API-level failure.
    /// - [`EnrichError::Http`] on network failure after all retries exhausted.
    /// - [`EnrichError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`EnrichError::Deserialize`] if the response shape is unexpected.
    pub async fn fetch(
        &self,
        identifiers: &[Identifier],
        options: &EnrichOptions,
    ) -> Result<EnrichResponse, EnrichError> {
        let url = self.endpoint("v1/products")?;
        let body = serde_json::json!({
            "ids": identifiers.iter().map(Identifier::as_str).collect::<Vec<_>>(),
            "skip_cache": options.skip_cache,
        });

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let body = body.clone();
            async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(EnrichError::RateLimited { retry_after_secs });
                }

                if status == reqwest::StatusCode::PAYMENT_REQUIRED {
                    // The provider signals an exhausted token quota as 402.
                    let text = response.text().await.unwrap_or_default();
                    return Err(EnrichError::QuotaExceeded(quota_message(&text)));
                }

                if !status.is_success() {
                    return Err(EnrichError::UnexpectedStatus {
                        status: status.as_u16(),
                    });
                }

                let text = response.text().await?;
                let envelope: serde_json::Value =
                    serde_json::from_str(&text).map_err(|e| EnrichError::Deserialize {
                        context: "enrichment batch response".to_owned(),
                        source: e,
                    })?;
                Self::check_api_error(&envelope)?;

                serde_json::from_value::<EnrichResponse>(envelope).map_err(|e| {
                    EnrichError::Deserialize {
                        context: "enrichment batch response".to_owned(),
                        source: e,
                    }
                })
            }
        })
        .await
    }

    /// Joins a path onto the configured base URL.
    fn endpoint(&self, path: &str) -> Result<Url, EnrichError> {
        self.base_url
            .join(path)
            .map_err(|e| EnrichError::ApiError(format!("invalid endpoint path '{path}': {e}")))
    }

    /// Checks the top-level `"status"` field and returns an error if it
    /// indicates failure. A `"quota_exceeded"` code becomes the dedicated
    /// [`EnrichError::QuotaExceeded`] variant.
    fn check_api_error(body: &serde_json::Value) -> Result<(), EnrichError> {
        if body.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            let message = body
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            if body.get("code").and_then(serde_json::Value::as_str) == Some("quota_exceeded") {
                return Err(EnrichError::QuotaExceeded(message));
            }
            return Err(EnrichError::ApiError(message));
        }
        Ok(())
    }
}

/// Extracts a human-readable message from a 402 body, falling back to a
/// fixed phrase for empty or non-JSON bodies.
fn quota_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "token quota exhausted".to_owned())
}
