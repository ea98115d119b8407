pub mod client;
pub mod error;
pub mod rate_limit;
pub mod types;

pub use client::StorefrontClient;
pub use error::StorefrontError;
pub use types::{ProductPayload, PushReceipt};
