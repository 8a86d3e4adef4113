//! Listing API client and document normalization
//!
//! The portal exposes one paginated notice-listing endpoint. This module
//! builds the HTTP client with the portal's fixed header set, pages
//! through the listing for one entity, and normalizes each raw notice
//! into a [`DocumentRecord`](crate::storage::DocumentRecord).
//!
//! API failures are reported through [`FetchError`], tagged with a
//! [`FetchErrorKind`] so the rotation controller can tell a rate limit
//! from an expired token without string matching at the call site.

mod client;
mod envelope;
mod listing;
mod normalize;

pub use client::{build_api_client, session_headers};
pub use envelope::{classify_failure, ApiEnvelope};
pub use listing::DocumentFetcher;
pub use normalize::{normalize_date, normalize_notice, RawNotice};

use thiserror::Error;

/// What kind of failure the listing call ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The portal throttled this credential
    RateLimited,
    /// The session token is stale or invalid
    TokenExpired,
    /// The portal reported no data for this entity
    NoData,
    /// Transport-level failure (timeout, connection reset)
    Network,
    /// Non-200 HTTP status
    Http(u16),
    /// Pagination ran past the configured page cap
    PageLimitExceeded,
    /// The portal reported an error this crate does not recognize
    Unknown,
}

/// A tagged fetch failure
#[derive(Debug, Error)]
#[error("fetch failed ({kind:?}): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the rotation controller can recover by switching credentials
    pub fn is_rotatable(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::RateLimited | FetchErrorKind::TokenExpired
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(FetchErrorKind::Network, e.to_string())
    }
}
