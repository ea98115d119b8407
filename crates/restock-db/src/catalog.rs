//! Database operations for `catalog_entries`.
//!
//! All writes go through [`upsert_catalog_entry`], a single-statement
//! `ON CONFLICT (identifier)` upsert. Besides giving repeated reconciliation
//! of the same batch insert-or-update semantics, the single statement is
//! what serializes concurrent upserts of the same identifier — the unique
//! index arbitrates, last writer wins, no lost-update window.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use restock_core::{CatalogEntry, Identifier, PricedListing, PushStatus};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `catalog_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogEntryRow {
    pub id: i64,
    pub identifier: String,
    pub title: String,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Decimal,
    pub list_price: Decimal,
    pub compare_at_price: Option<Decimal>,
    /// JSONB array of `CompetitorPrice` objects.
    pub competitor_prices: serde_json::Value,
    pub profit_amount: Decimal,
    pub profit_percent: Decimal,
    pub profit_status: String,
    pub rating: Option<Decimal>,
    pub review_count: Option<i32>,
    pub is_available: bool,
    pub status: String,
    pub storefront_product_id: Option<String>,
    pub storefront_variant_id: Option<String>,
    pub push_status: String,
    pub pushed_at: Option<DateTime<Utc>>,
    pub last_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CatalogEntryRow> for CatalogEntry {
    type Error = DbError;

    fn try_from(row: CatalogEntryRow) -> Result<Self, Self::Error> {
        let identifier = row
            .identifier
            .parse::<Identifier>()
            .map_err(|e| DbError::CorruptRow {
                context: format!("catalog_entries.id={}: {e}", row.id),
            })?;
        let profit_status = row.profit_status.parse().map_err(|e| DbError::CorruptRow {
            context: format!("catalog_entries.id={}: {e}", row.id),
        })?;
        let status = row.status.parse().map_err(|e| DbError::CorruptRow {
            context: format!("catalog_entries.id={}: {e}", row.id),
        })?;
        let push_status = row.push_status.parse().map_err(|e| DbError::CorruptRow {
            context: format!("catalog_entries.id={}: {e}", row.id),
        })?;
        let competitor_prices =
            serde_json::from_value(row.competitor_prices).map_err(|e| DbError::CorruptRow {
                context: format!("catalog_entries.id={} competitor_prices: {e}", row.id),
            })?;

        Ok(CatalogEntry {
            id: row.id,
            identifier,
            title: row.title,
            image_url: row.image_url,
            category: row.category,
            brand: row.brand,
            cost_price: row.cost_price,
            list_price: row.list_price,
            compare_at_price: row.compare_at_price,
            competitor_prices,
            profit_amount: row.profit_amount,
            profit_percent: row.profit_percent,
            profit_status,
            rating: row.rating,
            review_count: row.review_count,
            is_available: row.is_available,
            status,
            storefront_product_id: row.storefront_product_id,
            storefront_variant_id: row.storefront_variant_id,
            push_status,
            pushed_at: row.pushed_at,
            last_enriched_at: row.last_enriched_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, identifier, title, image_url, category, brand, \
     cost_price, list_price, compare_at_price, competitor_prices, \
     profit_amount, profit_percent, profit_status, rating, review_count, \
     is_available, status, storefront_product_id, storefront_variant_id, \
     push_status, pushed_at, last_enriched_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// catalog_entries operations
// ---------------------------------------------------------------------------

/// Upserts a catalog entry by canonical identifier.
///
/// Conflicts on `identifier` update every enrichment/pricing field and stamp
/// `updated_at`/`last_enriched_at` in place. The stored `status` is
/// deliberately NOT overwritten on update: operators pause/remove listings
/// and a re-import must not resurrect them. Storefront sync fields are also
/// preserved; they change only through [`set_push_state`].
///
/// Returns the full row after the upsert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails, or [`DbError::CorruptRow`]
/// if the returned row cannot be mapped back to a [`CatalogEntry`].
pub async fn upsert_catalog_entry(
    pool: &PgPool,
    listing: &PricedListing,
) -> Result<CatalogEntry, DbError> {
    let competitor_prices = serde_json::to_value(&listing.competitor_prices)
        .map_err(|e| DbError::CorruptRow {
            context: format!("serializing competitor prices: {e}"),
        })?;

    let row = sqlx::query_as::<_, CatalogEntryRow>(&format!(
        "INSERT INTO catalog_entries \
             (identifier, title, image_url, category, brand, cost_price, list_price, \
              compare_at_price, competitor_prices, profit_amount, profit_percent, \
              profit_status, rating, review_count, is_available, status, last_enriched_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, \
                 $8, $9::jsonb, $10, $11, \
                 $12, $13, $14, $15, $16, NOW()) \
         ON CONFLICT (identifier) DO UPDATE SET \
             title             = EXCLUDED.title, \
             image_url         = EXCLUDED.image_url, \
             category          = EXCLUDED.category, \
             brand             = EXCLUDED.brand, \
             cost_price        = EXCLUDED.cost_price, \
             list_price        = EXCLUDED.list_price, \
             compare_at_price  = EXCLUDED.compare_at_price, \
             competitor_prices = EXCLUDED.competitor_prices, \
             profit_amount     = EXCLUDED.profit_amount, \
             profit_percent    = EXCLUDED.profit_percent, \
             profit_status     = EXCLUDED.profit_status, \
             rating            = EXCLUDED.rating, \
             review_count      = EXCLUDED.review_count, \
             is_available      = EXCLUDED.is_available, \
             last_enriched_at  = NOW(), \
             updated_at        = NOW() \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(listing.identifier.as_str())
    .bind(&listing.title)
    .bind(&listing.image_url)
    .bind(&listing.category)
    .bind(&listing.brand)
    .bind(listing.cost_price)
    .bind(listing.list_price)
    .bind(listing.compare_at_price)
    .bind(competitor_prices)
    .bind(listing.profit_amount)
    .bind(listing.profit_percent)
    .bind(listing.profit_status.as_str())
    .bind(listing.rating)
    .bind(listing.review_count)
    .bind(listing.is_available)
    .bind(listing.status.as_str())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

/// Fetches a single entry by canonical identifier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_by_identifier(
    pool: &PgPool,
    identifier: &Identifier,
) -> Result<Option<CatalogEntry>, DbError> {
    let row = sqlx::query_as::<_, CatalogEntryRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM catalog_entries WHERE identifier = $1"
    ))
    .bind(identifier.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Fetches the entries whose identifiers appear in `identifiers`, in no
/// particular order. Used by the orchestrator for its once-per-sub-batch
/// membership check.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_by_identifiers(
    pool: &PgPool,
    identifiers: &[Identifier],
) -> Result<Vec<CatalogEntry>, DbError> {
    let keys: Vec<&str> = identifiers.iter().map(Identifier::as_str).collect();
    let rows = sqlx::query_as::<_, CatalogEntryRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM catalog_entries WHERE identifier = ANY($1)"
    ))
    .bind(&keys)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Returns `(identifier, title)` for every catalog entry, for fuzzy-title
/// duplicate detection.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_catalog_titles(pool: &PgPool) -> Result<Vec<(Identifier, String)>, DbError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT identifier, title FROM catalog_entries ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(identifier, title)| {
            let identifier = identifier
                .parse::<Identifier>()
                .map_err(|e| DbError::CorruptRow {
                    context: format!("catalog_entries.identifier: {e}"),
                })?;
            Ok((identifier, title))
        })
        .collect()
}

/// Returns the most recent `limit` entries, ordered by `updated_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_catalog_entries(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<CatalogEntry>, DbError> {
    let rows = sqlx::query_as::<_, CatalogEntryRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM catalog_entries \
         ORDER BY updated_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Total number of catalog entries.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_catalog_entries(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM catalog_entries")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Records the outcome of a storefront push attempt.
///
/// A successful push stores the storefront ids and stamps `pushed_at`; a
/// failed push only flips `push_status` so the next reconciliation retries.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no entry exists with the identifier, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_push_state(
    pool: &PgPool,
    identifier: &Identifier,
    push_status: PushStatus,
    storefront_product_id: Option<&str>,
    storefront_variant_id: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE catalog_entries SET \
             push_status           = $2, \
             storefront_product_id = COALESCE($3, storefront_product_id), \
             storefront_variant_id = COALESCE($4, storefront_variant_id), \
             pushed_at             = CASE WHEN $2 = 'pushed' THEN NOW() ELSE pushed_at END, \
             updated_at            = NOW() \
         WHERE identifier = $1",
    )
    .bind(identifier.as_str())
    .bind(push_status.as_str())
    .bind(storefront_product_id)
    .bind(storefront_variant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
