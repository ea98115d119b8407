//! Collaborator contracts consumed by the pipeline.
//!
//! The orchestrator is generic over these traits so tests run against
//! in-memory fakes while production wires a `PgPool` (see [`crate::store`])
//! and the HTTP clients (see [`crate::providers`]).

use async_trait::async_trait;
use uuid::Uuid;

use restock_core::{
    CatalogEntry, Identifier, ItemErrorKind, ItemOutcome, PricedListing, PushStatus,
};
use restock_enrich::{EnrichError, EnrichOptions, EnrichResponse};
use restock_storefront::{ProductPayload, PushReceipt, StorefrontError};

use crate::error::StoreError;

/// A created job as referenced by the pipeline: internal id for persistence,
/// public UUID for the API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: i64,
    pub public_id: Uuid,
}

/// The catalog the pipeline reconciles into.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<CatalogEntry>, StoreError>;

    /// Membership check for a sub-batch; returns only the entries that exist.
    async fn list_by_identifiers(
        &self,
        identifiers: &[Identifier],
    ) -> Result<Vec<CatalogEntry>, StoreError>;

    /// `(identifier, title)` pairs for fuzzy duplicate detection.
    async fn list_titles(&self) -> Result<Vec<(Identifier, String)>, StoreError>;

    /// Idempotent insert-or-update by canonical identifier.
    async fn upsert(&self, listing: &PricedListing) -> Result<CatalogEntry, StoreError>;

    /// Records the outcome of a storefront push attempt.
    async fn set_push_state(
        &self,
        identifier: &Identifier,
        status: PushStatus,
        receipt: Option<&PushReceipt>,
    ) -> Result<(), StoreError>;
}

/// Persistence for job lifecycle, counters, and error rows.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, total: u32, trigger_source: &str) -> Result<JobHandle, StoreError>;

    async fn start(&self, job: &JobHandle) -> Result<(), StoreError>;

    /// Called after every single processed item so observers see monotonic
    /// progress; never batched.
    async fn record_item(&self, job: &JobHandle, outcome: ItemOutcome) -> Result<(), StoreError>;

    async fn append_error(
        &self,
        job: &JobHandle,
        identifier: Option<&Identifier>,
        kind: ItemErrorKind,
        message: &str,
    ) -> Result<(), StoreError>;

    async fn complete(&self, job: &JobHandle) -> Result<(), StoreError>;

    async fn fail(&self, job: &JobHandle) -> Result<(), StoreError>;

    async fn stop(&self, job: &JobHandle) -> Result<(), StoreError>;
}

/// The external product-data provider.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Batch lookup. Identifiers absent from the response are per-item
    /// misses, not an error.
    async fn enrich(
        &self,
        identifiers: &[Identifier],
        options: &EnrichOptions,
    ) -> Result<EnrichResponse, EnrichError>;
}

/// The storefront push endpoint (update-with-create-fallback semantics).
#[async_trait]
pub trait StorefrontPusher: Send + Sync {
    async fn push(
        &self,
        external_id: Option<&str>,
        product: &ProductPayload,
    ) -> Result<PushReceipt, StorefrontError>;
}
