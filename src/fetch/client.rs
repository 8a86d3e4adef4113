//! HTTP client construction
//!
//! The portal fingerprints requests on a fixed set of headers captured
//! from its own web frontend; those are baked into the client. Per
//! credential headers (token, user id, cookies, request id) are built
//! fresh for every request from the active [`Session`].

use crate::auth::Session;
use crate::fetch::{FetchError, FetchErrorKind};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER};
use reqwest::Client;
use std::time::Duration;
use uuid::Uuid;

/// Fixed headers the portal expects on every API call
const CLIENT_HEADER: &str = "pc-web;pro";
const SYSTEM_HEADER: &str = "new";
const TERMINAL_HEADER: &str = "pc-web;pro";
const VER_HEADER: &str = "20250903";

/// Builds the shared API client
pub fn build_api_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9"),
    );
    headers.insert(
        HeaderName::from_static("client"),
        HeaderValue::from_static(CLIENT_HEADER),
    );
    headers.insert(
        HeaderName::from_static("system"),
        HeaderValue::from_static(SYSTEM_HEADER),
    );
    headers.insert(
        HeaderName::from_static("terminal"),
        HeaderValue::from_static(TERMINAL_HEADER),
    );
    headers.insert(
        HeaderName::from_static("ver"),
        HeaderValue::from_static(VER_HEADER),
    );

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the per-request header set for one session
///
/// The request id is a fresh uppercase hex UUID per call, matching what
/// the portal's own frontend sends.
pub fn session_headers(session: &Session, referer: &str) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();

    let invalid =
        |what: &str| FetchError::new(FetchErrorKind::Network, format!("invalid {} header", what));

    headers.insert(
        HeaderName::from_static("pcuss"),
        HeaderValue::from_str(&session.token).map_err(|_| invalid("token"))?,
    );
    headers.insert(
        HeaderName::from_static("user"),
        HeaderValue::from_str(&session.user_id).map_err(|_| invalid("user"))?,
    );

    let request_id = Uuid::new_v4().simple().to_string().to_uppercase();
    headers.insert(
        HeaderName::from_static("x-request-id"),
        HeaderValue::from_str(&request_id).map_err(|_| invalid("request id"))?,
    );

    if !session.cookies.is_empty() {
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&session.cookie_header()).map_err(|_| invalid("cookie"))?,
        );
    }
    headers.insert(
        REFERER,
        HeaderValue::from_str(referer).map_err(|_| invalid("referer"))?,
    );

    Ok(headers)
}
