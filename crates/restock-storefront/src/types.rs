use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use restock_core::{CatalogEntry, Identifier};

/// The product document sent to the storefront on create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    pub identifier: Identifier,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    pub status: String,
}

impl From<&CatalogEntry> for ProductPayload {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            title: entry.title.clone(),
            image_url: entry.image_url.clone(),
            price: entry.list_price,
            compare_at_price: entry.compare_at_price,
            status: entry.status.as_str().to_owned(),
        }
    }
}

/// Ids assigned by the storefront on a successful create (or echoed back on
/// update).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushReceipt {
    pub external_id: String,
    pub variant_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use restock_core::{ListingStatus, ProfitStatus, PushStatus};

    fn entry() -> CatalogEntry {
        CatalogEntry {
            id: 1,
            identifier: Identifier::parse("B0ABC12345").unwrap(),
            title: "Wireless Charger".to_string(),
            image_url: Some("https://img.example.com/1.jpg".to_string()),
            category: None,
            brand: None,
            cost_price: Decimal::new(1000, 2),
            list_price: Decimal::new(1700, 2),
            compare_at_price: Some(Decimal::new(2100, 2)),
            competitor_prices: vec![],
            profit_amount: Decimal::new(700, 2),
            profit_percent: Decimal::new(7000, 2),
            profit_status: ProfitStatus::Profitable,
            rating: None,
            review_count: None,
            is_available: true,
            status: ListingStatus::Draft,
            storefront_product_id: None,
            storefront_variant_id: None,
            push_status: PushStatus::Pending,
            pushed_at: None,
            last_enriched_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn payload_maps_list_price_and_status() {
        let payload = ProductPayload::from(&entry());
        assert_eq!(payload.price, Decimal::new(1700, 2));
        assert_eq!(payload.compare_at_price, Some(Decimal::new(2100, 2)));
        assert_eq!(payload.status, "draft");
    }

    #[test]
    fn receipt_deserializes() {
        let receipt: PushReceipt = serde_json::from_str(
            r#"{"external_id": "gid://shopify/Product/42", "variant_id": "gid://shopify/ProductVariant/43"}"#,
        )
        .expect("deserialize");
        assert_eq!(receipt.external_id, "gid://shopify/Product/42");
    }
}
