//! Database schema definition
//!
//! The `bond_documents` table layout is shared with the export tooling;
//! `download_url` is UNIQUE and carries the deduplication.

/// SQL schema for the document store
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bond_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bond_short_name TEXT NOT NULL,
    document_title TEXT NOT NULL,
    document_type TEXT,
    download_url TEXT UNIQUE,
    file_size TEXT,
    publication_date TEXT,
    scraped_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_bond_short_name ON bond_documents(bond_short_name);
CREATE INDEX IF NOT EXISTS idx_document_type ON bond_documents(document_type);
CREATE INDEX IF NOT EXISTS idx_publication_date ON bond_documents(publication_date);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
