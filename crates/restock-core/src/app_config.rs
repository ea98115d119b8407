use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub competitors_path: PathBuf,
    pub enrich_base_url: String,
    pub enrich_api_key: Option<String>,
    pub enrich_timeout_secs: u64,
    pub enrich_max_retries: u32,
    pub enrich_backoff_base_ms: u64,
    pub storefront_base_url: Option<String>,
    pub storefront_token: Option<String>,
    pub storefront_timeout_secs: u64,
    pub storefront_max_retries: u32,
    pub storefront_backoff_base_ms: u64,
    pub budget_daily_limit: u32,
    pub budget_cost_per_identifier: u32,
    pub sub_batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub fuzzy_threshold: f64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("competitors_path", &self.competitors_path)
            .field("database_url", &"[redacted]")
            .field("enrich_base_url", &self.enrich_base_url)
            .field(
                "enrich_api_key",
                &self.enrich_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("enrich_timeout_secs", &self.enrich_timeout_secs)
            .field("enrich_max_retries", &self.enrich_max_retries)
            .field("enrich_backoff_base_ms", &self.enrich_backoff_base_ms)
            .field("storefront_base_url", &self.storefront_base_url)
            .field(
                "storefront_token",
                &self.storefront_token.as_ref().map(|_| "[redacted]"),
            )
            .field("storefront_timeout_secs", &self.storefront_timeout_secs)
            .field("storefront_max_retries", &self.storefront_max_retries)
            .field(
                "storefront_backoff_base_ms",
                &self.storefront_backoff_base_ms,
            )
            .field("budget_daily_limit", &self.budget_daily_limit)
            .field(
                "budget_cost_per_identifier",
                &self.budget_cost_per_identifier,
            )
            .field("sub_batch_size", &self.sub_batch_size)
            .field("inter_batch_delay_ms", &self.inter_batch_delay_ms)
            .field("fuzzy_threshold", &self.fuzzy_threshold)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
