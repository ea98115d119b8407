use thiserror::Error;

pub mod app_config;
pub mod catalog;
pub mod competitors;
pub mod config;
pub mod dedup;
pub mod identifier;
pub mod jobs;
pub mod pricing;

pub use app_config::{AppConfig, Environment};
pub use catalog::{CatalogEntry, ListingStatus, PricedListing, PushStatus, RawInputRecord};
pub use competitors::{load_competitors, CompetitorBand, CompetitorsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use dedup::{BatchPartition, DedupConfig, DuplicateMatch, MatchKind, NormalizedInput};
pub use identifier::Identifier;
pub use jobs::{ItemErrorKind, ItemOutcome, JobStatus};
pub use pricing::{
    calculate_all_prices, CompetitorPrice, PriceQuote, PricingConfig, PricingError, ProfitStatus,
};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read competitor config at {path}: {source}")]
    CompetitorsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse competitor config: {0}")]
    CompetitorsFileParse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
