use thiserror::Error;

/// Errors returned by the product-data enrichment client.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned `"status": "error"` with a message.
    #[error("enrichment API error: {0}")]
    ApiError(String),

    /// HTTP 429 from the provider; `retry_after_secs` is taken from the
    /// `Retry-After` header when present.
    #[error("rate limited by enrichment provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// The provider reported its token quota exhausted. Never retried —
    /// nothing will succeed until the quota window rolls over.
    #[error("enrichment provider quota exhausted: {0}")]
    QuotaExceeded(String),

    /// Any other non-2xx HTTP status.
    #[error("unexpected HTTP status {status} from enrichment provider")]
    UnexpectedStatus { status: u16 },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
