//! Listing API response envelope and failure classification
//!
//! Every listing response arrives as `{ returncode, info, data: { data:
//! [...] } }`. A non-zero `returncode` carries a human-readable `info`
//! string; the portal's error-code contract is undocumented, so
//! classification works by substring match against observed messages.
//! All markers live in the tables below so new observations land in one
//! place.

use crate::fetch::normalize::RawNotice;
use crate::fetch::FetchErrorKind;
use serde::Deserialize;

/// Top-level listing response
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub returncode: i64,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeData {
    #[serde(default)]
    pub data: Vec<RawNotice>,
}

impl ApiEnvelope {
    pub fn is_ok(&self) -> bool {
        self.returncode == 0
    }

    pub fn items(self) -> Vec<RawNotice> {
        self.data.map(|d| d.data).unwrap_or_default()
    }

    pub fn info_message(&self) -> &str {
        self.info.as_deref().unwrap_or("unknown error")
    }
}

/// Substrings observed in throttling responses
const RATE_LIMIT_MARKERS: &[&str] = &[
    "请求过多",
    "请稍后再试",
    "频率限制",
    "rate limit",
    "too many requests",
    "429",
    "限流",
    "请稍后",
    "频繁",
];

/// Substrings observed in stale-token responses
const TOKEN_EXPIRED_MARKERS: &[&str] = &["token过时", "token过期", "token无效"];

/// Substrings observed when an entity simply has no notices
const NO_DATA_MARKERS: &[&str] = &["无数据", "暂无数据", "no data"];

/// Classifies a failing `info` message into a [`FetchErrorKind`]
///
/// Unmatched messages classify as `Unknown` and are logged distinctly so
/// the marker tables can be extended from the logs.
pub fn classify_failure(info: &str) -> FetchErrorKind {
    let lowered = info.to_lowercase();

    if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FetchErrorKind::RateLimited;
    }
    if TOKEN_EXPIRED_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FetchErrorKind::TokenExpired;
    }
    if NO_DATA_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FetchErrorKind::NoData;
    }

    tracing::warn!(info, "Unclassified listing API error");
    FetchErrorKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(classify_failure("请求过多，请稍后再试"), FetchErrorKind::RateLimited);
        assert_eq!(
            classify_failure("Too Many Requests"),
            FetchErrorKind::RateLimited
        );
    }

    #[test]
    fn test_classify_token_expired() {
        assert_eq!(classify_failure("token过期"), FetchErrorKind::TokenExpired);
        assert_eq!(classify_failure("token无效"), FetchErrorKind::TokenExpired);
    }

    #[test]
    fn test_classify_no_data() {
        assert_eq!(classify_failure("暂无数据"), FetchErrorKind::NoData);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_failure("服务器内部错误"), FetchErrorKind::Unknown);
    }

    #[test]
    fn test_envelope_parses() {
        let json = r#"{
            "returncode": 0,
            "info": "success",
            "data": { "data": [ { "title": "t" } ] }
        }"#;
        let envelope: ApiEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.is_ok());
        assert_eq!(envelope.items().len(), 1);
    }

    #[test]
    fn test_envelope_missing_data() {
        let json = r#"{ "returncode": 1, "info": "请求过多" }"#;
        let envelope: ApiEnvelope = serde_json::from_str(json).unwrap();
        assert!(!envelope.is_ok());
        assert_eq!(envelope.info_message(), "请求过多");
        assert!(envelope.items().is_empty());
    }
}
