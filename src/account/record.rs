use crate::auth::SessionArtifacts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One login identity and its derived session artifacts
///
/// Records are created from static configuration at startup, mutated by
/// the session establisher (on login) and the rotation controller (on
/// use/error), and persisted to the credential snapshot after every
/// mutation. They are never deleted, only disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Account handle (opaque to this crate; a phone number in practice)
    pub handle: String,

    /// Login secret; absent secrets force a manual login
    #[serde(default)]
    pub secret: Option<String>,

    /// Bearer-style session token harvested after login
    #[serde(default)]
    pub token: String,

    /// Companion user identifier required alongside the token
    #[serde(default)]
    pub user_id: String,

    /// Cookies captured from the authenticated browser session
    #[serde(default)]
    pub cookies: HashMap<String, String>,

    #[serde(default)]
    pub is_logged_in: bool,

    #[serde(default = "default_available")]
    pub is_available: bool,

    /// Unix timestamp (seconds) of the last selection/use
    #[serde(default)]
    pub last_used: Option<i64>,

    /// Cumulative successful requests across all runs
    #[serde(default)]
    pub request_count: u64,

    /// Cumulative error reports; crossing the threshold disables the record
    #[serde(default)]
    pub error_count: u32,
}

fn default_available() -> bool {
    true
}

impl CredentialRecord {
    pub fn new(handle: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            handle: handle.into(),
            secret,
            token: String::new(),
            user_id: String::new(),
            cookies: HashMap::new(),
            is_logged_in: false,
            is_available: true,
            last_used: None,
            request_count: 0,
            error_count: 0,
        }
    }

    /// Records an error against this credential. Once `error_count`
    /// reaches `threshold` the credential is disabled; only an explicit
    /// [`reset`](Self::reset) re-enables it.
    ///
    /// Returns true if this call disabled the credential.
    pub fn record_error(&mut self, threshold: u32) -> bool {
        self.error_count += 1;
        if self.error_count >= threshold {
            self.is_available = false;
            return true;
        }
        false
    }

    /// Explicit reset: clears the error count and re-enables the record
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.is_available = true;
    }

    /// Applies freshly harvested session artifacts. Only called after a
    /// successful login, so this also flips `is_logged_in`.
    pub fn apply_artifacts(&mut self, artifacts: SessionArtifacts) {
        self.token = artifacts.token;
        self.user_id = artifacts.user_id;
        self.cookies = artifacts.cookies;
        self.is_logged_in = true;
    }

    /// Marks a use at `now` (unix seconds)
    pub fn mark_used(&mut self, now: i64) {
        self.last_used = Some(now);
    }

    /// Whether this credential qualifies for a new rotation round at
    /// `now`: it has never been used, or its cooldown has elapsed.
    pub fn cooldown_elapsed(&self, cooldown_secs: u64, now: i64) -> bool {
        match self.last_used {
            None => true,
            Some(last) => now.saturating_sub(last) >= cooldown_secs as i64,
        }
    }
}
