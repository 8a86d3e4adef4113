//! Configuration loading and validation
//!
//! Configuration lives in a single TOML file: the portal endpoints, the
//! credential pool, rate-limit tunables and all output paths.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    AuthConfig, BatchConfig, Config, CredentialEntry, FetchConfig, OutputConfig, PoolConfig,
    SiteConfig,
};
pub use validation::validate;
