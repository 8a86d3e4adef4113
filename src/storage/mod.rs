//! Persistence for harvested documents
//!
//! A single SQLite table holds every discovered document; the download
//! URL is the deduplication key. The schema is fixed (the export tooling
//! and older datasets read it directly), so changes here need a
//! migration story.

mod schema;
mod sqlite;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::DocumentStore;

use thiserror::Error;

/// Storage-layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unknown document type: {0}")]
    UnknownType(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A document ready for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub bond_short_name: String,
    pub document_title: String,
    pub document_type: DocumentType,
    pub download_url: String,
    /// Free-text size as reported by the portal ("1.2MB"); not parsed
    pub file_size: Option<String>,
    /// `YYYY-MM-DD`, or empty when the portal date was unparseable
    pub publication_date: String,
}

/// A document row read back from the store
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: i64,
    pub bond_short_name: String,
    pub document_title: String,
    pub document_type: DocumentType,
    pub download_url: String,
    pub file_size: Option<String>,
    pub publication_date: String,
    pub scraped_at: String,
}

/// Disclosure document categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Prospectus,
    IssueAnnouncement,
    RatingReport,
    FinancialReport,
    AuditReport,
    LegalOpinion,
    Guarantee,
    Other,
}

impl DocumentType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Prospectus => "prospectus",
            Self::IssueAnnouncement => "issue_announcement",
            Self::RatingReport => "rating_report",
            Self::FinancialReport => "financial_report",
            Self::AuditReport => "audit_report",
            Self::LegalOpinion => "legal_opinion",
            Self::Guarantee => "guarantee",
            Self::Other => "other",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "prospectus" => Some(Self::Prospectus),
            "issue_announcement" => Some(Self::IssueAnnouncement),
            "rating_report" => Some(Self::RatingReport),
            "financial_report" => Some(Self::FinancialReport),
            "audit_report" => Some(Self::AuditReport),
            "legal_opinion" => Some(Self::LegalOpinion),
            "guarantee" => Some(Self::Guarantee),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// All concrete categories, in display order
    pub fn all() -> &'static [DocumentType] {
        &[
            Self::Prospectus,
            Self::IssueAnnouncement,
            Self::RatingReport,
            Self::FinancialReport,
            Self::AuditReport,
            Self::LegalOpinion,
            Self::Guarantee,
            Self::Other,
        ]
    }
}

/// Aggregate counts over the store
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    pub total_documents: u64,
    pub total_entities: u64,
    /// (entity short name, document count), descending by count
    pub per_entity: Vec<(String, u64)>,
    /// (document type, count), descending by count
    pub per_type: Vec<(DocumentType, u64)>,
    /// Min/max non-empty publication dates
    pub date_range: Option<(String, String)>,
}
