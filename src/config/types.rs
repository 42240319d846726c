use serde::Deserialize;

/// Main configuration structure for fipe-sync
///
/// Every section is optional; a missing file or section falls back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Upstream client and throttling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the FIPE vehicle API
    #[serde(rename = "base-url", default = "default_fipe_url")]
    pub base_url: String,

    /// FIPE vehicle type (1 = cars, 2 = motorcycles, 3 = trucks)
    #[serde(rename = "vehicle-type", default = "default_vehicle_type")]
    pub vehicle_type: u8,

    /// Floor of the adaptive throttle interval (milliseconds)
    #[serde(rename = "base-interval-ms", default = "default_base_interval")]
    pub base_interval_ms: u64,

    /// Cap of the adaptive throttle interval (milliseconds)
    #[serde(rename = "max-interval-ms", default = "default_max_interval")]
    pub max_interval_ms: u64,

    /// Retries allowed per logical request
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff after HTTP 429 (milliseconds)
    #[serde(rename = "rate-limit-backoff-ms", default = "default_rate_limit_backoff")]
    pub rate_limit_backoff_ms: u64,

    /// Base of the exponential backoff after any other failure (milliseconds)
    #[serde(rename = "error-backoff-ms", default = "default_error_backoff")]
    pub error_backoff_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

/// Crawl policy configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlConfig {
    /// Brand codes allowed to be linked to a period; empty means all brands
    #[serde(rename = "allowed-brands", default)]
    pub allowed_brands: Vec<String>,

    /// Only mark a period crawled when no checkpoint is left pending
    #[serde(rename = "require-complete-period", default)]
    pub require_complete_period: bool,
}

/// Segment classifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL of the Anthropic API
    #[serde(rename = "base-url", default = "default_anthropic_url")]
    pub base_url: String,

    /// Model used for classification
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Models per classification request in batch mode
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batch requests (milliseconds)
    #[serde(rename = "batch-delay-ms", default = "default_batch_delay")]
    pub batch_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_fipe_url(),
            vehicle_type: default_vehicle_type(),
            base_interval_ms: default_base_interval(),
            max_interval_ms: default_max_interval(),
            max_retries: default_max_retries(),
            rate_limit_backoff_ms: default_rate_limit_backoff(),
            error_backoff_ms: default_error_backoff(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
        }
    }
}

fn default_fipe_url() -> String {
    "https://veiculos.fipe.org.br/api/veiculos".to_string()
}

fn default_vehicle_type() -> u8 {
    1
}

fn default_base_interval() -> u64 {
    800
}

fn default_max_interval() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit_backoff() -> u64 {
    5000
}

fn default_error_backoff() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_database_path() -> String {
    "./fipe.db".to_string()
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_batch_size() -> usize {
    20
}

fn default_batch_delay() -> u64 {
    500
}
