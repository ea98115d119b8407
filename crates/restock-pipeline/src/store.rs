//! Production [`CatalogStore`]/[`JobStore`] implementations over a Postgres
//! pool. Thin mappings onto `restock-db`; all SQL lives there.

use async_trait::async_trait;
use sqlx::PgPool;

use restock_core::{
    CatalogEntry, Identifier, ItemErrorKind, ItemOutcome, PricedListing, PushStatus,
};
use restock_storefront::PushReceipt;

use crate::error::StoreError;
use crate::traits::{CatalogStore, JobHandle, JobStore};

#[async_trait]
impl CatalogStore for PgPool {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<CatalogEntry>, StoreError> {
        restock_db::find_by_identifier(self, identifier)
            .await
            .map_err(StoreError::from)
    }

    async fn list_by_identifiers(
        &self,
        identifiers: &[Identifier],
    ) -> Result<Vec<CatalogEntry>, StoreError> {
        restock_db::list_by_identifiers(self, identifiers)
            .await
            .map_err(StoreError::from)
    }

    async fn list_titles(&self) -> Result<Vec<(Identifier, String)>, StoreError> {
        restock_db::list_catalog_titles(self)
            .await
            .map_err(StoreError::from)
    }

    async fn upsert(&self, listing: &PricedListing) -> Result<CatalogEntry, StoreError> {
        restock_db::upsert_catalog_entry(self, listing)
            .await
            .map_err(StoreError::from)
    }

    async fn set_push_state(
        &self,
        identifier: &Identifier,
        status: PushStatus,
        receipt: Option<&PushReceipt>,
    ) -> Result<(), StoreError> {
        restock_db::set_push_state(
            self,
            identifier,
            status,
            receipt.map(|r| r.external_id.as_str()),
            receipt.map(|r| r.variant_id.as_str()),
        )
        .await
        .map_err(StoreError::from)
    }
}

#[async_trait]
impl JobStore for PgPool {
    async fn create(&self, total: u32, trigger_source: &str) -> Result<JobHandle, StoreError> {
        let total = i32::try_from(total).map_err(|_| {
            StoreError(format!("job total {total} exceeds the supported range"))
        })?;
        let row = restock_db::create_import_job(self, total, trigger_source).await?;
        Ok(JobHandle {
            id: row.id,
            public_id: row.public_id,
        })
    }

    async fn start(&self, job: &JobHandle) -> Result<(), StoreError> {
        restock_db::start_import_job(self, job.id)
            .await
            .map_err(StoreError::from)
    }

    async fn record_item(&self, job: &JobHandle, outcome: ItemOutcome) -> Result<(), StoreError> {
        restock_db::record_item_result(self, job.id, outcome)
            .await
            .map_err(StoreError::from)
    }

    async fn append_error(
        &self,
        job: &JobHandle,
        identifier: Option<&Identifier>,
        kind: ItemErrorKind,
        message: &str,
    ) -> Result<(), StoreError> {
        restock_db::append_job_error(self, job.id, identifier, kind, message)
            .await
            .map_err(StoreError::from)
    }

    async fn complete(&self, job: &JobHandle) -> Result<(), StoreError> {
        restock_db::complete_import_job(self, job.id)
            .await
            .map_err(StoreError::from)
    }

    async fn fail(&self, job: &JobHandle) -> Result<(), StoreError> {
        restock_db::fail_import_job(self, job.id)
            .await
            .map_err(StoreError::from)
    }

    async fn stop(&self, job: &JobHandle) -> Result<(), StoreError> {
        restock_db::stop_import_job(self, job.id)
            .await
            .map_err(StoreError::from)
    }
}
