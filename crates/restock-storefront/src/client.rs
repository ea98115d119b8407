//! HTTP client for the storefront's product push API.
//!
//! Handles rate limiting (429 with `Retry-After`), not-found (404), and
//! other non-2xx responses as typed errors. [`StorefrontClient::push`]
//! implements the update-with-create-fallback contract used by the
//! reconciliation engine.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::StorefrontError;
use crate::rate_limit::retry_with_backoff;
use crate::types::{ProductPayload, PushReceipt};

/// Client for the storefront push API.
///
/// Transient errors (429, network failures) are automatically retried with
/// backoff up to `max_retries` additional attempts; `Retry-After` headers
/// stretch the delay when the storefront asks for more.
pub struct StorefrontClient {
    client: Client,
    token: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl StorefrontClient {
    /// Creates a `StorefrontClient` for the given shop base URL.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`StorefrontError::UnexpectedStatus`] if
    /// `base_url` is not a valid URL.
    pub fn new(
        base_url: &str,
        token: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, StorefrontError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("restock/0.1 (storefront-push)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| StorefrontError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            token: token.to_owned(),
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Creates a new product on the storefront.
    ///
    /// # Errors
    ///
    /// - [`StorefrontError::RateLimited`] — HTTP 429 after all retries exhausted.
    /// - [`StorefrontError::Http`] — network failure after all retries exhausted.
    /// - [`StorefrontError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`StorefrontError::Deserialize`] — response body shape is unexpected.
    pub async fn create(&self, product: &ProductPayload) -> Result<PushReceipt, StorefrontError> {
        let url = self.endpoint("products")?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.token)
                    .json(product)
                    .send()
                    .await?;
                Self::parse_receipt(response, "create product").await
            }
        })
        .await
    }

    /// Updates an existing product by its storefront id.
    ///
    /// # Errors
    ///
    /// - [`StorefrontError::NotFound`] — the product no longer exists on the
    ///   storefront (HTTP 404); callers fall back to [`Self::create`].
    /// - Everything [`Self::create`] can return.
    pub async fn update(
        &self,
        external_id: &str,
        product: &ProductPayload,
    ) -> Result<PushReceipt, StorefrontError> {
        let url = self.endpoint(&format!("products/{external_id}"))?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let external_id = external_id.to_owned();
            async move {
                let response = self
                    .client
                    .put(url)
                    .bearer_auth(&self.token)
                    .json(product)
                    .send()
                    .await?;

                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(StorefrontError::NotFound { external_id });
                }

                Self::parse_receipt(response, "update product").await
            }
        })
        .await
    }

    /// Pushes a product: update when a storefront id is known, falling back
    /// to create when the update reports not-found (the listing was deleted
    /// on the storefront side), create outright otherwise.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::create`] / [`Self::update`] except
    /// the handled [`StorefrontError::NotFound`] fallback.
    pub async fn push(
        &self,
        external_id: Option<&str>,
        product: &ProductPayload,
    ) -> Result<PushReceipt, StorefrontError> {
        match external_id {
            Some(id) => match self.update(id, product).await {
                Ok(receipt) => Ok(receipt),
                Err(StorefrontError::NotFound { external_id }) => {
                    tracing::warn!(
                        identifier = %product.identifier,
                        external_id,
                        "storefront product vanished — recreating"
                    );
                    self.create(product).await
                }
                Err(e) => Err(e),
            },
            None => self.create(product).await,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorefrontError> {
        self.base_url
            .join(path)
            .map_err(|e| StorefrontError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })
    }

    /// Maps a response to a [`PushReceipt`], converting 429 and other
    /// non-2xx statuses into typed errors.
    async fn parse_receipt(
        response: reqwest::Response,
        context: &str,
    ) -> Result<PushReceipt, StorefrontError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(2);
            return Err(StorefrontError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(StorefrontError::UnexpectedStatus {
                status: status.as_u16(),
                context: context.to_owned(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<PushReceipt>(&body).map_err(|e| StorefrontError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}
