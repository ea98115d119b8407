pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::EnrichmentClient;
pub use error::EnrichError;
pub use types::{EnrichOptions, EnrichResponse, EnrichedRecord};
