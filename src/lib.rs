//! Bondharvest: bond-issuance disclosure document harvester
//!
//! This crate automates retrieval of bond disclosure documents from a
//! commercial data portal. It authenticates through browser automation,
//! pages through a notice-listing API, classifies the discovered documents
//! and persists them into a local SQLite store, and re-exports that store
//! to spreadsheet views. A pool of login credentials is rotated to work
//! around per-account rate limits.

pub mod account;
pub mod auth;
pub mod batch;
pub mod config;
pub mod export;
pub mod fetch;
pub mod storage;

use thiserror::Error;

/// Main error type for bondharvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("Credential pool error: {0}")]
    Pool(#[from] account::PoolError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entity list error: {0}")]
    EntityList(String),

    #[error("Export error: {0}")]
    Export(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for bondharvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use account::{CredentialRecord, RotationController};
pub use auth::{Session, SessionEstablisher};
pub use config::Config;
pub use fetch::{DocumentFetcher, FetchErrorKind};
pub use storage::{DocumentRecord, DocumentStore, DocumentType};
