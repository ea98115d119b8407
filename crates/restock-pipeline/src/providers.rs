//! Trait impls wiring the HTTP clients into the pipeline contracts.

use async_trait::async_trait;

use restock_core::Identifier;
use restock_enrich::{EnrichError, EnrichOptions, EnrichResponse, EnrichmentClient};
use restock_storefront::{ProductPayload, PushReceipt, StorefrontClient, StorefrontError};

use crate::traits::{EnrichmentProvider, StorefrontPusher};

#[async_trait]
impl EnrichmentProvider for EnrichmentClient {
    async fn enrich(
        &self,
        identifiers: &[Identifier],
        options: &EnrichOptions,
    ) -> Result<EnrichResponse, EnrichError> {
        self.fetch(identifiers, options).await
    }
}

#[async_trait]
impl StorefrontPusher for StorefrontClient {
    async fn push(
        &self,
        external_id: Option<&str>,
        product: &ProductPayload,
    ) -> Result<PushReceipt, StorefrontError> {
        StorefrontClient::push(self, external_id, product).await
    }
}
