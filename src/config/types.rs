use serde::Deserialize;

/// Main configuration structure for bondharvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub pool: PoolConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

/// Portal endpoints and client identification
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin of the data portal, e.g. "https://www.qyyjt.cn"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the interactive login page
    #[serde(rename = "login-path", default = "default_login_path")]
    pub login_path: String,

    /// Path of the paginated notice-listing API
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,

    /// User-Agent header sent on API requests
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Login behavior
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Upper bound on the manual-login wait (seconds)
    #[serde(rename = "login-timeout-secs", default = "default_login_timeout")]
    pub login_timeout_secs: u64,

    /// How often the manual-login wait re-checks the page (seconds)
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Credential pool and rotation tunables
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Where the credential-pool snapshot is persisted
    #[serde(rename = "snapshot-path")]
    pub snapshot_path: String,

    /// Error count at which a credential is disabled
    #[serde(rename = "error-threshold", default = "default_error_threshold")]
    pub error_threshold: u32,

    /// Seconds since last use before a tried credential becomes eligible
    /// for a new rotation round
    #[serde(rename = "cooldown-secs", default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Successful requests allowed on one credential before voluntary rotation
    #[serde(rename = "request-quota", default = "default_request_quota")]
    pub request_quota: u32,

    /// Login identities; secrets may be omitted to force a manual login
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
}

/// One configured login identity
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    pub handle: String,
    #[serde(default)]
    pub secret: Option<String>,
}

/// Listing-API fetch tunables
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Items requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Hard cap on pages fetched for one entity
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Local retries for transient HTTP failures
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay between local retries (seconds, scales linearly)
    #[serde(rename = "retry-delay-secs", default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Randomized inter-page delay bounds (milliseconds)
    #[serde(rename = "page-delay-min-ms", default = "default_page_delay_min")]
    pub page_delay_min_ms: u64,
    #[serde(rename = "page-delay-max-ms", default = "default_page_delay_max")]
    pub page_delay_max_ms: u64,
}

/// Batch-run tunables and process-local state files
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// CSV file listing the target entities
    #[serde(rename = "entity-list-path")]
    pub entity_list_path: String,

    /// Progress checkpoint file
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// JSON error log file
    #[serde(rename = "error-log-path")]
    pub error_log_path: String,

    /// Sentinel file whose existence requests a clean halt
    #[serde(rename = "pause-file-path")]
    pub pause_file_path: String,

    /// Entities between checkpoint writes
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Attempts per entity before it is recorded as failed
    #[serde(rename = "entity-retry-attempts", default = "default_entity_retries")]
    pub entity_retry_attempts: u32,

    /// Randomized inter-entity delay bounds (milliseconds)
    #[serde(rename = "entity-delay-min-ms", default = "default_entity_delay_min")]
    pub entity_delay_min_ms: u64,
    #[serde(rename = "entity-delay-max-ms", default = "default_entity_delay_max")]
    pub entity_delay_max_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory the export views are written into
    #[serde(rename = "export-dir")]
    pub export_dir: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_timeout_secs: default_login_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            page_delay_min_ms: default_page_delay_min(),
            page_delay_max_ms: default_page_delay_max(),
        }
    }
}

fn default_login_path() -> String {
    "/user/login".to_string()
}

fn default_listing_path() -> String {
    "/finchinaAPP/v1/finchina-search/v1/getF9NoticeList".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36"
        .to_string()
}

fn default_login_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    5
}

fn default_error_threshold() -> u32 {
    5
}

fn default_cooldown() -> u64 {
    300
}

fn default_request_quota() -> u32 {
    50
}

fn default_page_size() -> u32 {
    50
}

fn default_max_pages() -> u32 {
    200
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    10
}

fn default_page_delay_min() -> u64 {
    1000
}

fn default_page_delay_max() -> u64 {
    3000
}

fn default_checkpoint_interval() -> usize {
    100
}

fn default_entity_retries() -> u32 {
    3
}

fn default_entity_delay_min() -> u64 {
    3000
}

fn default_entity_delay_max() -> u64 {
    7000
}
