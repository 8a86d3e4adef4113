//! Credential pool management
//!
//! This module owns everything about login identities: the per-account
//! record (tokens, cookies, usage counters), the JSON snapshot that
//! persists the pool across runs, and the rotation controller that picks
//! which credential the next request should ride on.
//!
//! Rotation works in rounds: within one round no credential is selected
//! twice. A new round may begin once some credential's cooldown has
//! elapsed (or it has never been used), at which point the tried marks
//! for qualifying credentials are cleared.

mod record;
mod rotation;
mod store;

pub use record::CredentialRecord;
pub use rotation::{PoolStatus, RotationController, RotationPolicy};
pub use store::CredentialStore;

use thiserror::Error;

/// Errors raised by the credential pool
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every available credential has been tried this round and no
    /// credential is cooldown-eligible. Fatal to the current batch run.
    #[error("credential pool exhausted in round {round}")]
    Exhausted { round: u32 },

    #[error("unknown credential handle: {0}")]
    UnknownHandle(String),

    #[error("failed to read credential snapshot: {0}")]
    Snapshot(String),
}
