//! Chromium-backed login
//!
//! Drives the portal's login form through chromiumoxide and harvests the
//! token, user id and cookies the page stashes in localStorage after a
//! successful login. The browser runs headful: when a credential has no
//! stored secret the operator completes the login by hand while this
//! code polls for the artifacts.

use crate::auth::{AuthError, SessionArtifacts, SessionEstablisher};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// CSS selectors for the portal's login form. The page is an SPA; the
/// tab selector is best-effort since the password tab is sometimes
/// already active.
const PASSWORD_TAB_SELECTOR: &str = ".ant-tabs-nav .ant-tabs-nav-wrap > div > div:nth-child(1)";
const PHONE_INPUT_SELECTOR: &str = "#username";
const SECRET_INPUT_SELECTOR: &str = "#password";
const SUBMIT_SELECTOR: &str = "button[type='submit']";

const TOKEN_SCRIPT: &str = "window.localStorage.getItem('s_tk')";
const USER_INFO_SCRIPT: &str = "window.localStorage.getItem('u_info')";

/// How many polls a submitted form gets before staying on the login
/// surface counts as a rejection
const REJECTION_POLLS: u32 = 2;

/// What one login poll observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginPoll {
    /// The page is still on the login surface
    OnLoginSurface,
    /// Login completed and the token is readable
    TokenPresent,
    /// Left the login surface but no token yet
    Pending,
}

fn login_poll_outcome(url: &str, token: Option<&str>) -> LoginPoll {
    if url.contains("/user/login") {
        return LoginPoll::OnLoginSurface;
    }
    match token {
        Some(token) if !token.is_empty() => LoginPoll::TokenPresent,
        _ => LoginPoll::Pending,
    }
}

/// Establishes sessions by driving a real Chromium instance
pub struct BrowserEstablisher {
    login_url: String,
    login_timeout: Duration,
    poll_interval: Duration,
}

impl BrowserEstablisher {
    pub fn new(login_url: String, login_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            login_url,
            login_timeout,
            poll_interval,
        }
    }

    async fn launch(&self) -> Result<Browser, AuthError> {
        let config = BrowserConfig::builder()
            .with_head()
            .no_sandbox()
            .window_size(1920, 1080)
            .build()
            .map_err(AuthError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(browser)
    }

    /// Fills and submits the password login form
    async fn submit_login_form(
        &self,
        page: &Page,
        handle: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        // The password tab may already be active; a missing tab element
        // is not fatal.
        match page.find_element(PASSWORD_TAB_SELECTOR).await {
            Ok(tab) => {
                tab.click()
                    .await
                    .map_err(|e| AuthError::Browser(e.to_string()))?;
            }
            Err(_) => {
                tracing::debug!("Password login tab not found; assuming it is active");
            }
        }

        let phone_input = page
            .find_element(PHONE_INPUT_SELECTOR)
            .await
            .map_err(|e| AuthError::Browser(format!("phone input not found: {}", e)))?;
        phone_input
            .click()
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;
        phone_input
            .type_str(handle)
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        let secret_input = page
            .find_element(SECRET_INPUT_SELECTOR)
            .await
            .map_err(|e| AuthError::Browser(format!("password input not found: {}", e)))?;
        secret_input
            .click()
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;
        secret_input
            .type_str(secret)
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        page.find_element(SUBMIT_SELECTOR)
            .await
            .map_err(|e| AuthError::Browser(format!("submit button not found: {}", e)))?
            .click()
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        tracing::info!(handle, "Login form submitted");
        Ok(())
    }

    /// Polls until the page has left the login surface and a token is
    /// present in localStorage, or the wait window runs out
    ///
    /// A submitted form gets only a couple of polls to leave the login
    /// surface; staying there means the portal rejected the credentials,
    /// which is reported as `LoginRejected` without burning the full
    /// wait window. The long wait is reserved for manual logins.
    async fn wait_for_login(
        &self,
        page: &Page,
        handle: &str,
        submitted: bool,
    ) -> Result<(), AuthError> {
        let started = Instant::now();
        let rejection_window = self.poll_interval * REJECTION_POLLS;
        loop {
            if started.elapsed() >= self.login_timeout {
                return Err(AuthError::Timeout(self.login_timeout.as_secs()));
            }
            tokio::time::sleep(self.poll_interval).await;

            let url = page
                .url()
                .await
                .map_err(|e| AuthError::Browser(e.to_string()))?
                .unwrap_or_default();
            let token = read_local_storage(page, TOKEN_SCRIPT).await?;

            match login_poll_outcome(&url, token.as_deref()) {
                LoginPoll::TokenPresent => {
                    tracing::info!(handle, "Login detected");
                    return Ok(());
                }
                LoginPoll::OnLoginSurface => {
                    if submitted && started.elapsed() >= rejection_window {
                        return Err(AuthError::LoginRejected {
                            handle: handle.to_string(),
                            reason: "still on login page after submitting the form".to_string(),
                        });
                    }
                    tracing::debug!(handle, "Still on login surface");
                }
                LoginPoll::Pending => {
                    tracing::debug!(handle, "Left login surface, token not yet present");
                }
            }
        }
    }

    /// Harvests token, user id and cookies from the logged-in page
    async fn harvest(&self, page: &Page, handle: &str) -> Result<SessionArtifacts, AuthError> {
        let token = read_local_storage(page, TOKEN_SCRIPT)
            .await?
            .map(|t| strip_quotes(&t).to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::IncompleteArtifacts(format!("{}: token missing after login", handle))
            })?;

        let user_info = read_local_storage(page, USER_INFO_SCRIPT)
            .await?
            .ok_or_else(|| {
                AuthError::IncompleteArtifacts(format!("{}: user info missing after login", handle))
            })?;
        let user_id = extract_user_id(&user_info).ok_or_else(|| {
            AuthError::IncompleteArtifacts(format!("{}: token present but no user id", handle))
        })?;

        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| AuthError::Browser(e.to_string()))?
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect::<HashMap<String, String>>();

        tracing::info!(handle, cookies = cookies.len(), "Session artifacts harvested");
        Ok(SessionArtifacts {
            token,
            user_id,
            cookies,
        })
    }

    async fn drive(
        &self,
        page: &Page,
        handle: &str,
        secret: Option<&str>,
    ) -> Result<SessionArtifacts, AuthError> {
        let submitted = match secret {
            Some(secret) => {
                self.submit_login_form(page, handle, secret).await?;
                true
            }
            None => {
                tracing::info!(
                    handle,
                    wait_secs = self.login_timeout.as_secs(),
                    "No stored secret; waiting for manual login"
                );
                false
            }
        };
        self.wait_for_login(page, handle, submitted).await?;
        self.harvest(page, handle).await
    }
}

#[async_trait::async_trait]
impl SessionEstablisher for BrowserEstablisher {
    async fn establish(
        &self,
        handle: &str,
        secret: Option<&str>,
    ) -> Result<SessionArtifacts, AuthError> {
        tracing::info!(handle, "Establishing session via browser login");
        let mut browser = self.launch().await?;

        let result = match browser.new_page(self.login_url.as_str()).await {
            Ok(page) => self.drive(&page, handle, secret).await,
            Err(e) => Err(AuthError::Browser(e.to_string())),
        };

        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        let _ = browser.wait().await;

        result
    }
}

async fn read_local_storage(page: &Page, script: &str) -> Result<Option<String>, AuthError> {
    page.evaluate(script)
        .await
        .map_err(|e| AuthError::Browser(e.to_string()))?
        .into_value::<Option<String>>()
        .map_err(|e| AuthError::Browser(e.to_string()))
}

/// The portal stores some localStorage values JSON-quoted
fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

/// `u_info` is a JSON object; the user id lives under the `user` key
fn extract_user_id(user_info: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(user_info).ok()?;
    parsed
        .get("user")
        .and_then(|v| v.as_str())
        .map(|s| strip_quotes(s).to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("abc"), "abc");
        assert_eq!(strip_quotes(""), "");
    }

    #[test]
    fn test_extract_user_id() {
        let info = r#"{"user":"u-42","name":"someone"}"#;
        assert_eq!(extract_user_id(info), Some("u-42".to_string()));
    }

    #[test]
    fn test_extract_user_id_missing_key() {
        assert_eq!(extract_user_id(r#"{"name":"someone"}"#), None);
    }

    #[test]
    fn test_extract_user_id_invalid_json() {
        assert_eq!(extract_user_id("not json"), None);
    }

    #[test]
    fn test_extract_user_id_empty_value() {
        assert_eq!(extract_user_id(r#"{"user":""}"#), None);
    }

    #[test]
    fn test_login_surface_outranks_token() {
        // Stale token from an earlier session; the url is authoritative
        assert_eq!(
            login_poll_outcome("https://portal.test/user/login", Some("tok")),
            LoginPoll::OnLoginSurface
        );
        assert_eq!(
            login_poll_outcome("https://portal.test/user/login?redirect=/home", None),
            LoginPoll::OnLoginSurface
        );
    }

    #[test]
    fn test_token_after_leaving_login_surface() {
        assert_eq!(
            login_poll_outcome("https://portal.test/home", Some("tok")),
            LoginPoll::TokenPresent
        );
    }

    #[test]
    fn test_pending_without_token() {
        assert_eq!(
            login_poll_outcome("https://portal.test/home", None),
            LoginPoll::Pending
        );
        assert_eq!(
            login_poll_outcome("https://portal.test/home", Some("")),
            LoginPoll::Pending
        );
    }

    #[test]
    fn test_rejection_window_is_shorter_than_login_timeout() {
        let establisher = BrowserEstablisher::new(
            "https://portal.test/user/login".to_string(),
            Duration::from_secs(300),
            Duration::from_secs(5),
        );
        // A wrong secret must fail after a couple of polls, never the
        // full manual-login window.
        let window = establisher.poll_interval * REJECTION_POLLS;
        assert!(window < establisher.login_timeout);
        assert_eq!(window, Duration::from_secs(10));
    }
}
