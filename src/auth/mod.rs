//! Session establishment
//!
//! Authentication happens in a real browser: the portal issues its token
//! and user id into localStorage only after an interactive login, so the
//! crate drives a Chromium instance through the login form and harvests
//! the artifacts afterwards. Everything downstream of login works from a
//! plain [`Session`] value object; nothing here leaks into the fetch
//! path except headers.
//!
//! The establisher is a trait so batch-driver tests can swap in a mock
//! that never launches a browser.

mod browser;
mod establisher;
mod session;

pub use browser::BrowserEstablisher;
pub use establisher::SessionEstablisher;
pub use session::{Session, SessionArtifacts};

use thiserror::Error;

/// Errors raised while establishing a session
#[derive(Debug, Error)]
pub enum AuthError {
    /// The portal rejected the login (wrong secret, captcha, ban)
    #[error("login rejected for {handle}: {reason}")]
    LoginRejected { handle: String, reason: String },

    /// Login appeared to succeed but the harvested artifacts are missing
    /// a piece (token without user id, or vice versa)
    #[error("incomplete session artifacts: {0}")]
    IncompleteArtifacts(String),

    /// The login did not complete within the configured wait window
    #[error("login timed out after {0}s")]
    Timeout(u64),

    /// Browser automation failure (launch, navigation, script)
    #[error("browser error: {0}")]
    Browser(String),
}
