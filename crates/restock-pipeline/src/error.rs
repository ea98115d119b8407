use thiserror::Error;

use restock_core::{Identifier, ItemErrorKind};

/// Opaque failure from a collaborator store. The pipeline does not branch on
/// store error detail — any store fault is job-scoped — so the contract
/// carries a message, not a variant tree.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<restock_db::DbError> for StoreError {
    fn from(err: restock_db::DbError) -> Self {
        Self(err.to_string())
    }
}

/// Synchronous rejection at batch submission, before any job exists.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Nothing in the batch survived normalization and dedup.
    #[error("no unique identifiers to process")]
    EmptyBatch,

    /// The whole batch was rejected by the token budget; nothing was
    /// consumed. Callers can shrink the batch and retry.
    #[error("batch requires {required} tokens but only {remaining} remain today")]
    BudgetExceeded { required: u32, remaining: u32 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// An item-scoped failure: recorded on the job, loop continues.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub identifier: Identifier,
    pub kind: ItemErrorKind,
    pub message: String,
}

/// A job-scoped fault: aborts the processing loop and fails the job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The enrichment provider's token quota is exhausted; nothing further
    /// can succeed today, so the job fails rather than burning retries.
    #[error("enrichment quota exhausted: {0}")]
    QuotaExceeded(String),
}
