use crate::auth::{AuthError, SessionArtifacts};

/// Capability to turn a credential into session artifacts
///
/// The production implementation drives a browser; tests implement this
/// with canned artifacts so the batch driver can be exercised offline.
#[async_trait::async_trait]
pub trait SessionEstablisher: Send + Sync {
    /// Performs a login for `handle` and harvests its artifacts
    ///
    /// A `None` secret means an automated form fill is impossible; the
    /// implementation may fall back to waiting for a manual login.
    async fn establish(
        &self,
        handle: &str,
        secret: Option<&str>,
    ) -> Result<SessionArtifacts, AuthError>;
}
