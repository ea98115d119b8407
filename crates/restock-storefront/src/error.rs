use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by storefront (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// The external product no longer exists; an update must fall back to
    /// create. Not retried.
    #[error("storefront product not found: {external_id}")]
    NotFound { external_id: String },

    #[error("unexpected HTTP status {status} from storefront for {context}")]
    UnexpectedStatus { status: u16, context: String },

    #[error("invalid storefront URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}
