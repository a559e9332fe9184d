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
    pub sites_path: PathBuf,
    pub ai_base_url: String,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub ai_fallback_base_url: Option<String>,
    pub ai_fallback_model: Option<String>,
    pub search_api_key: Option<String>,
    pub indexing_endpoint: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub ai_request_timeout_secs: u64,
    pub ai_max_retries: u32,
    pub ai_retry_backoff_base_ms: u64,
    pub step_budget_secs: u64,
    pub full_run_budget_secs: u64,
    pub phase_safety_margin_secs: u64,
    pub soft_lock_secs: u64,
    pub gate_threshold: i32,
    pub promote_threshold: i32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("sites_path", &self.sites_path)
            .field("database_url", &"[redacted]")
            .field("ai_base_url", &self.ai_base_url)
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "[redacted]"))
            .field("ai_model", &self.ai_model)
            .field("ai_fallback_base_url", &self.ai_fallback_base_url)
            .field("ai_fallback_model", &self.ai_fallback_model)
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("indexing_endpoint", &self.indexing_endpoint)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("ai_request_timeout_secs", &self.ai_request_timeout_secs)
            .field("ai_max_retries", &self.ai_max_retries)
            .field("ai_retry_backoff_base_ms", &self.ai_retry_backoff_base_ms)
            .field("step_budget_secs", &self.step_budget_secs)
            .field("full_run_budget_secs", &self.full_run_budget_secs)
            .field("phase_safety_margin_secs", &self.phase_safety_margin_secs)
            .field("soft_lock_secs", &self.soft_lock_secs)
            .field("gate_threshold", &self.gate_threshold)
            .field("promote_threshold", &self.promote_threshold)
            .finish()
    }
}
