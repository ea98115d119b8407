use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use restock_core::Identifier;

/// Options forwarded with an enrichment request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions {
    /// Bypass the provider's cache and force a live fetch (costs full tokens).
    pub skip_cache: bool,
}

/// One enriched product record from the provider.
///
/// Prices arrive as decimal strings and deserialize into [`Decimal`];
/// `price` is the supplier cost basis, not a retail price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub identifier: Identifier,
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub rating: Option<Decimal>,
    #[serde(default)]
    pub review_count: Option<i32>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

fn default_in_stock() -> bool {
    true
}

/// Envelope returned by the provider's batch endpoint. Identifiers that were
/// requested but are absent from `records` had no data; the caller treats
/// each as a per-item miss, not a call failure.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichResponse {
    pub records: Vec<EnrichedRecord>,
    /// Tokens consumed by this call.
    #[serde(default)]
    pub tokens_used: u32,
    /// Tokens avoided by cache hits.
    #[serde(default)]
    pub tokens_saved: u32,
    #[serde(default)]
    pub from_cache: u32,
    #[serde(default)]
    pub from_api: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enriched_record_deserializes_with_defaults() {
        let record: EnrichedRecord = serde_json::from_str(
            r#"{"identifier": "B0ABC12345", "title": "Wireless Charger"}"#,
        )
        .expect("deserialize");
        assert_eq!(record.identifier.as_str(), "B0ABC12345");
        assert!(record.in_stock, "in_stock defaults to true");
        assert!(record.price.is_none());
    }

    #[test]
    fn enriched_record_parses_decimal_price() {
        let record: EnrichedRecord = serde_json::from_str(
            r#"{"identifier": "B0ABC12345", "title": "Charger", "price": "12.99"}"#,
        )
        .expect("deserialize");
        assert_eq!(record.price, Some(Decimal::new(1299, 2)));
    }

    #[test]
    fn response_token_counters_default_to_zero() {
        let response: EnrichResponse =
            serde_json::from_str(r#"{"records": []}"#).expect("deserialize");
        assert_eq!(response.tokens_used, 0);
        assert_eq!(response.from_cache, 0);
    }
}
