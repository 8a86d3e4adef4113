//! Raw notice normalization
//!
//! Raw listing items are loosely typed: the download locator can appear
//! under several field names, dates arrive as compact digit strings or
//! unix timestamps, and the document category is sometimes a structured
//! label and sometimes only guessable from the title. Everything here is
//! lossy by design; an item that cannot yield a usable record is dropped
//! with a log line, never an error.

use crate::storage::{DocumentRecord, DocumentType};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use url::Url;

/// One raw item from the listing API
#[derive(Debug, Clone, Deserialize)]
pub struct RawNotice {
    #[serde(default)]
    pub title: String,

    /// Compact digit string, unix timestamp, or absent
    #[serde(default)]
    pub date: serde_json::Value,

    #[serde(default)]
    pub label: Vec<RawLabel>,

    #[serde(default)]
    pub file: Vec<RawFile>,

    #[serde(rename = "downloadUrl", default)]
    pub download_url: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(rename = "fileUrl", default)]
    pub file_url: Option<String>,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(rename = "fileSize", default)]
    pub file_size: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLabel {
    #[serde(rename = "lastLevelName", default)]
    pub last_level_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFile {
    #[serde(rename = "fileUrl", default)]
    pub file_url: Option<String>,

    #[serde(rename = "fileSize", default)]
    pub file_size: Option<serde_json::Value>,
}

/// Title keywords per category, first match wins
const TYPE_KEYWORDS: &[(DocumentType, &[&str])] = &[
    (DocumentType::Prospectus, &["募集说明书", "prospectus"]),
    (DocumentType::IssueAnnouncement, &["发行公告", "issue announcement"]),
    (DocumentType::RatingReport, &["评级报告", "rating report"]),
    (
        DocumentType::FinancialReport,
        &["财务报告", "financial report", "年报", "半年报", "季报"],
    ),
    (DocumentType::AuditReport, &["审计报告", "audit report"]),
    (DocumentType::LegalOpinion, &["法律意见书", "legal opinion"]),
    (DocumentType::Guarantee, &["担保函", "guarantee"]),
];

/// Normalizes one raw item into a document record
///
/// # Returns
///
/// `None` when the item has no title or no resolvable download URL.
pub fn normalize_notice(
    raw: &RawNotice,
    entity_short_name: &str,
    origin: &Url,
) -> Option<DocumentRecord> {
    let title = raw.title.trim();
    if title.is_empty() {
        tracing::debug!(entity = entity_short_name, "Dropping untitled notice");
        return None;
    }

    let download_url = match resolve_download_url(raw, origin) {
        Some(url) => url,
        None => {
            tracing::warn!(entity = entity_short_name, title, "Notice has no usable download URL");
            return None;
        }
    };

    Some(DocumentRecord {
        bond_short_name: entity_short_name.to_string(),
        document_title: title.to_string(),
        document_type: classify_document(raw, title),
        download_url,
        file_size: extract_file_size(raw),
        publication_date: normalize_date(&raw.date),
    })
}

/// Resolves the download locator from the file array, then the ordered
/// item-level candidates, qualifying relative URLs against the origin
fn resolve_download_url(raw: &RawNotice, origin: &Url) -> Option<String> {
    let candidates = raw
        .file
        .iter()
        .filter_map(|f| f.file_url.as_deref())
        .chain(
            [&raw.download_url, &raw.url, &raw.file_url, &raw.link]
                .into_iter()
                .filter_map(|c| c.as_deref()),
        );

    for candidate in candidates {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        if candidate.starts_with("http://") || candidate.starts_with("https://") {
            return Some(candidate.to_string());
        }
        match origin.join(candidate) {
            Ok(absolute) => return Some(absolute.to_string()),
            Err(e) => {
                tracing::warn!(candidate, "Unresolvable download URL: {}", e);
            }
        }
    }
    None
}

/// Classifies the category: structured label first, then title keywords
fn classify_document(raw: &RawNotice, title: &str) -> DocumentType {
    if let Some(label) = raw.label.first() {
        let label_name = label.last_level_name.trim();
        if !label_name.is_empty() && label_name != "未知" {
            if let Some(doc_type) = classify_text(label_name) {
                return doc_type;
            }
        }
    }
    classify_text(title).unwrap_or(DocumentType::Other)
}

fn classify_text(text: &str) -> Option<DocumentType> {
    let lowered = text.to_lowercase();
    for (doc_type, keywords) in TYPE_KEYWORDS {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return Some(*doc_type);
        }
    }
    None
}

fn extract_file_size(raw: &RawNotice) -> Option<String> {
    raw.file_size
        .as_ref()
        .or_else(|| raw.file.first().and_then(|f| f.file_size.as_ref()))
        .and_then(json_value_to_string)
}

fn json_value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalizes the portal's date representations to `YYYY-MM-DD`
///
/// Handles compact digit strings (`YYYYMMDD` or `YYYYMMDDHHMMSS`) and
/// unix timestamps in seconds or milliseconds, as strings or numbers.
/// Anything unparseable becomes the empty string.
pub fn normalize_date(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => normalize_date_str(s.trim()),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(timestamp_to_date)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn normalize_date_str(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    // Already normalized
    if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        return s.to_string();
    }

    // Compact calendar form, possibly with a time suffix
    if s.len() >= 8 && s.as_bytes()[..8].iter().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(&s[..8], "%Y%m%d") {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    // Unix timestamp, seconds or milliseconds
    if s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(ts) = s.parse::<i64>() {
            return timestamp_to_date(ts);
        }
    }

    String::new()
}

fn timestamp_to_date(ts: i64) -> String {
    // 13-digit values are milliseconds
    let secs = if ts >= 1_000_000_000_000 { ts / 1000 } else { ts };
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn origin() -> Url {
        Url::parse("https://portal.test").unwrap()
    }

    fn raw(json: serde_json::Value) -> RawNotice {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_compact_datetime_string() {
        assert_eq!(normalize_date(&json!("20240115093000")), "2024-01-15");
    }

    #[test]
    fn test_compact_date_string() {
        assert_eq!(normalize_date(&json!("20240115")), "2024-01-15");
    }

    #[test]
    fn test_unix_seconds_string() {
        // 2024-01-15 01:30:00 UTC
        assert_eq!(normalize_date(&json!("1705282200")), "2024-01-15");
    }

    #[test]
    fn test_unix_millis_number() {
        assert_eq!(normalize_date(&json!(1705282200000i64)), "2024-01-15");
    }

    #[test]
    fn test_already_normalized_date() {
        assert_eq!(normalize_date(&json!("2024-01-15")), "2024-01-15");
    }

    #[test]
    fn test_unparseable_date_is_empty() {
        assert_eq!(normalize_date(&json!("next tuesday")), "");
        assert_eq!(normalize_date(&json!("")), "");
        assert_eq!(normalize_date(&serde_json::Value::Null), "");
    }

    #[test]
    fn test_untitled_notice_is_dropped() {
        let item = raw(json!({ "title": "  ", "downloadUrl": "https://x.test/a.pdf" }));
        assert!(normalize_notice(&item, "24BOND01", &origin()).is_none());
    }

    #[test]
    fn test_file_array_url_preferred() {
        let item = raw(json!({
            "title": "公告",
            "file": [ { "fileUrl": "https://cdn.test/file.pdf", "fileSize": "1.2MB" } ],
            "downloadUrl": "https://x.test/other.pdf"
        }));
        let record = normalize_notice(&item, "24BOND01", &origin()).unwrap();
        assert_eq!(record.download_url, "https://cdn.test/file.pdf");
        assert_eq!(record.file_size, Some("1.2MB".to_string()));
    }

    #[test]
    fn test_relative_url_qualified_against_origin() {
        let item = raw(json!({ "title": "公告", "url": "/files/doc.pdf" }));
        let record = normalize_notice(&item, "24BOND01", &origin()).unwrap();
        assert_eq!(record.download_url, "https://portal.test/files/doc.pdf");
    }

    #[test]
    fn test_no_url_is_dropped() {
        let item = raw(json!({ "title": "公告" }));
        assert!(normalize_notice(&item, "24BOND01", &origin()).is_none());
    }

    #[test]
    fn test_label_classification_wins() {
        let item = raw(json!({
            "title": "某公司公告全文",
            "label": [ { "lastLevelName": "评级报告" } ],
            "downloadUrl": "https://x.test/a.pdf"
        }));
        let record = normalize_notice(&item, "24BOND01", &origin()).unwrap();
        assert_eq!(record.document_type, DocumentType::RatingReport);
    }

    #[test]
    fn test_title_keyword_fallback() {
        let item = raw(json!({
            "title": "2024年度债券募集说明书",
            "downloadUrl": "https://x.test/a.pdf"
        }));
        let record = normalize_notice(&item, "24BOND01", &origin()).unwrap();
        assert_eq!(record.document_type, DocumentType::Prospectus);
    }

    #[test]
    fn test_unknown_label_falls_back_to_title() {
        let item = raw(json!({
            "title": "年度审计报告",
            "label": [ { "lastLevelName": "未知" } ],
            "downloadUrl": "https://x.test/a.pdf"
        }));
        let record = normalize_notice(&item, "24BOND01", &origin()).unwrap();
        assert_eq!(record.document_type, DocumentType::AuditReport);
    }

    #[test]
    fn test_no_match_classifies_other() {
        let item = raw(json!({
            "title": "临时股东大会决议",
            "downloadUrl": "https://x.test/a.pdf"
        }));
        let record = normalize_notice(&item, "24BOND01", &origin()).unwrap();
        assert_eq!(record.document_type, DocumentType::Other);
    }

    #[test]
    fn test_numeric_file_size() {
        let item = raw(json!({
            "title": "公告",
            "downloadUrl": "https://x.test/a.pdf",
            "fileSize": 20480
        }));
        let record = normalize_notice(&item, "24BOND01", &origin()).unwrap();
        assert_eq!(record.file_size, Some("20480".to_string()));
    }
}
