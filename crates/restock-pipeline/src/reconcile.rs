//! Per-item reconciliation: validate → price → upsert → optional push.
//!
//! Validation and pricing problems are item-scoped and reported as
//! [`ItemFailure`]; store faults are job-scoped and bubble as
//! [`StoreError`]. A storefront push failure is neither — the catalog is
//! the source of truth, so the push state is recorded and the item still
//! succeeds.

use restock_core::dedup::NormalizedInput;
use restock_core::pricing::{self, PricingConfig};
use restock_core::{Identifier, ItemErrorKind, ListingStatus, PricedListing, PushStatus};
use restock_enrich::EnrichedRecord;
use restock_storefront::ProductPayload;

use crate::error::{ItemFailure, StoreError};
use crate::traits::{CatalogStore, StorefrontPusher};

/// Whether the upsert created a new catalog row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
}

/// Item-scoped vs job-scoped reconciliation failure.
#[derive(Debug)]
pub enum ReconcileError {
    Item(ItemFailure),
    Store(StoreError),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::Store(err)
    }
}

/// Reconciles one enriched item into the catalog.
///
/// `exists` comes from the orchestrator's once-per-sub-batch membership
/// check and only labels the outcome; the upsert itself is idempotent by
/// identifier either way.
///
/// # Errors
///
/// - [`ReconcileError::Item`] for missing title/image/cost or a
///   non-positive cost (kind `validation`).
/// - [`ReconcileError::Store`] when the catalog write fails.
pub async fn reconcile_item<C, P>(
    catalog: &C,
    pusher: Option<&P>,
    pricing_config: &PricingConfig,
    item: &NormalizedInput,
    record: &EnrichedRecord,
    exists: bool,
    base_seed: u64,
) -> Result<ReconcileOutcome, ReconcileError>
where
    C: CatalogStore,
    P: StorefrontPusher,
{
    let identifier = &item.identifier;

    // Required fields. The batch line's own title/cost act as fallbacks for
    // spreadsheet-sourced imports.
    let title = record
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or(item.record.title.as_deref())
        .filter(|t| !t.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| validation(identifier, "missing title"))?;

    let image_url = record
        .image_url
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| validation(identifier, "missing image"))?;

    let cost = item
        .record
        .cost
        .or(record.price)
        .ok_or_else(|| validation(identifier, "missing cost price"))?;

    let seed = item_seed(base_seed, identifier);
    let quote = pricing::calculate_all_prices(cost, seed, pricing_config)
        .map_err(|e| validation(identifier, &e.to_string()))?;

    for cp in quote.competitor_prices.iter().filter(|cp| cp.clamped) {
        tracing::warn!(
            identifier = %identifier,
            competitor = %cp.competitor,
            floor = %cp.price,
            "competitor draw fell below minimum markup — clamped to floor"
        );
    }

    let listing = PricedListing {
        identifier: identifier.clone(),
        title,
        image_url: Some(image_url),
        category: record.category.clone().or(item.record.category.clone()),
        brand: record.brand.clone(),
        cost_price: quote.cost,
        list_price: quote.list_price,
        compare_at_price: quote.compare_at_price,
        competitor_prices: quote.competitor_prices,
        profit_amount: quote.profit_amount,
        profit_percent: quote.profit_percent,
        profit_status: quote.profit_status,
        rating: record.rating,
        review_count: record.review_count,
        is_available: record.in_stock,
        status: ListingStatus::Draft,
    };

    let entry = catalog.upsert(&listing).await?;

    if let Some(pusher) = pusher {
        let payload = ProductPayload::from(&entry);
        match pusher
            .push(entry.storefront_product_id.as_deref(), &payload)
            .await
        {
            Ok(receipt) => {
                catalog
                    .set_push_state(identifier, PushStatus::Pushed, Some(&receipt))
                    .await?;
            }
            Err(e) => {
                // The catalog write stands; the push is retried on the next
                // reconciliation of this identifier.
                tracing::warn!(
                    identifier = %identifier,
                    error = %e,
                    "storefront push failed — catalog entry kept, push marked failed"
                );
                catalog
                    .set_push_state(identifier, PushStatus::Failed, None)
                    .await?;
            }
        }
    }

    Ok(if exists {
        ReconcileOutcome::Updated
    } else {
        ReconcileOutcome::Created
    })
}

fn validation(identifier: &Identifier, message: &str) -> ReconcileError {
    ReconcileError::Item(ItemFailure {
        identifier: identifier.clone(),
        kind: ItemErrorKind::Validation,
        message: message.to_owned(),
    })
}

/// Derives the per-item pricing seed: FNV-1a over the identifier bytes,
/// keyed by the job's base seed. Stable across runs so a job's quotes are
/// reproducible item by item.
#[must_use]
pub fn item_seed(base: u64, identifier: &Identifier) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET ^ base;
    for byte in identifier.as_str().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).expect("test identifier")
    }

    #[test]
    fn item_seed_is_deterministic() {
        assert_eq!(item_seed(7, &id("B0ABC12345")), item_seed(7, &id("B0ABC12345")));
    }

    #[test]
    fn item_seed_varies_by_identifier() {
        assert_ne!(item_seed(7, &id("B000000001")), item_seed(7, &id("B000000002")));
    }

    #[test]
    fn item_seed_varies_by_base() {
        assert_ne!(item_seed(1, &id("B0ABC12345")), item_seed(2, &id("B0ABC12345")));
    }
}
