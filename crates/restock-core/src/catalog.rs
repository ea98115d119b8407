//! Catalog domain types shared by the pipeline, persistence, and API layers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;
use crate::pricing::{CompetitorPrice, ProfitStatus};

/// Listing lifecycle on the storefront side. `Removed` is a status, never a
/// row deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Draft,
    Pending,
    Active,
    Paused,
    Removed,
}

impl ListingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Pending => "pending",
            ListingStatus::Active => "active",
            ListingStatus::Paused => "paused",
            ListingStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ListingStatus::Draft),
            "pending" => Ok(ListingStatus::Pending),
            "active" => Ok(ListingStatus::Active),
            "paused" => Ok(ListingStatus::Paused),
            "removed" => Ok(ListingStatus::Removed),
            other => Err(format!("unknown listing status: {other:?}")),
        }
    }
}

/// Storefront push state, tracked independently of the catalog write. A
/// failed push leaves the catalog row authoritative and is re-attempted on
/// the next reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStatus {
    Pending,
    Pushed,
    Failed,
}

impl PushStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PushStatus::Pending => "pending",
            PushStatus::Pushed => "pushed",
            PushStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PushStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PushStatus::Pending),
            "pushed" => Ok(PushStatus::Pushed),
            "failed" => Ok(PushStatus::Failed),
            other => Err(format!("unknown push status: {other:?}")),
        }
    }
}

/// One submitted batch line, before normalization. `reference` is the
/// identifier or URL; the remaining fields are optional spreadsheet
/// columns. Consumed once at intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInputRecord {
    pub reference: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Supplier cost override; when present it takes precedence over the
    /// enrichment price as the cost basis.
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RawInputRecord {
    #[must_use]
    pub fn from_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            title: None,
            cost: None,
            category: None,
        }
    }
}

/// A fully enriched and priced record, ready for reconciliation. This is
/// the input to the catalog upsert; persistence assigns ids and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedListing {
    pub identifier: Identifier,
    pub title: String,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Decimal,
    pub list_price: Decimal,
    pub compare_at_price: Decimal,
    pub competitor_prices: Vec<CompetitorPrice>,
    pub profit_amount: Decimal,
    pub profit_percent: Decimal,
    pub profit_status: ProfitStatus,
    pub rating: Option<Decimal>,
    pub review_count: Option<i32>,
    pub is_available: bool,
    /// Status applied on insert. Updates preserve the stored status so an
    /// operator's pause/remove decision survives re-imports.
    pub status: ListingStatus,
}

/// A persisted catalog row as seen by the pipeline and the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub identifier: Identifier,
    pub title: String,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Decimal,
    pub list_price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub competitor_prices: Vec<CompetitorPrice>,
    pub profit_amount: Decimal,
    pub profit_percent: Decimal,
    pub profit_status: ProfitStatus,
    pub rating: Option<Decimal>,
    pub review_count: Option<i32>,
    pub is_available: bool,
    pub status: ListingStatus,
    pub storefront_product_id: Option<String>,
    pub storefront_variant_id: Option<String>,
    pub push_status: PushStatus,
    pub pushed_at: Option<DateTime<Utc>>,
    pub last_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_status_roundtrip() {
        for status in [
            ListingStatus::Draft,
            ListingStatus::Pending,
            ListingStatus::Active,
            ListingStatus::Paused,
            ListingStatus::Removed,
        ] {
            assert_eq!(status.as_str().parse::<ListingStatus>().unwrap(), status);
        }
    }

    #[test]
    fn push_status_roundtrip() {
        for status in [PushStatus::Pending, PushStatus::Pushed, PushStatus::Failed] {
            assert_eq!(status.as_str().parse::<PushStatus>().unwrap(), status);
        }
    }

    #[test]
    fn raw_input_from_reference_has_no_extras() {
        let record = RawInputRecord::from_reference("B0ABC12345");
        assert_eq!(record.reference, "B0ABC12345");
        assert!(record.title.is_none());
        assert!(record.cost.is_none());
        assert!(record.category.is_none());
    }

    #[test]
    fn raw_input_deserializes_with_defaults() {
        let record: RawInputRecord =
            serde_json::from_str(r#"{"reference": "B0ABC12345"}"#).expect("deserialize");
        assert_eq!(record.reference, "B0ABC12345");
        assert!(record.title.is_none());
    }
}
