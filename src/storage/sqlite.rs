//! SQLite document store

use crate::storage::schema::initialize_schema;
use crate::storage::{
    DocumentRecord, DocumentType, StorageResult, StoreStatistics, StoredDocument,
};
use rusqlite::{params, Connection, Row};
use std::collections::HashSet;
use std::path::Path;

/// SQLite-backed document store
pub struct DocumentStore {
    conn: Connection,
}

const DOCUMENT_COLUMNS: &str = "id, bond_short_name, document_title, document_type, \
     download_url, file_size, publication_date, scraped_at";

impl DocumentStore {
    /// Opens (or creates) the store at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Inserts a document, deduplicating on download URL
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Row was inserted
    /// * `Ok(false)` - A document with the same download URL already exists
    pub fn insert(&mut self, record: &DocumentRecord) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO bond_documents
             (bond_short_name, document_title, document_type, download_url, file_size, publication_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.bond_short_name,
                record.document_title,
                record.document_type.to_db_string(),
                record.download_url,
                record.file_size,
                record.publication_date,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Inserts a batch of documents inside one transaction
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted (duplicates excluded).
    pub fn insert_batch(&mut self, records: &[DocumentRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO bond_documents
                 (bond_short_name, document_title, document_type, download_url, file_size, publication_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.bond_short_name,
                    record.document_title,
                    record.document_type.to_db_string(),
                    record.download_url,
                    record.file_size,
                    record.publication_date,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Entity short names that already have at least one stored document
    pub fn existing_entities(&self) -> StorageResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT bond_short_name FROM bond_documents")?;
        let entities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(entities)
    }

    /// Number of stored documents for one entity
    pub fn document_count(&self, entity: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bond_documents WHERE bond_short_name = ?1",
            params![entity],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// All documents, newest scrape first
    pub fn all_documents(&self) -> StorageResult<Vec<StoredDocument>> {
        let sql = format!(
            "SELECT {} FROM bond_documents ORDER BY scraped_at DESC",
            DOCUMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let documents = stmt
            .query_map([], map_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    pub fn documents_for_entity(&self, entity: &str) -> StorageResult<Vec<StoredDocument>> {
        let sql = format!(
            "SELECT {} FROM bond_documents WHERE bond_short_name = ?1 ORDER BY publication_date DESC",
            DOCUMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params![entity], map_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    pub fn documents_by_type(&self, doc_type: DocumentType) -> StorageResult<Vec<StoredDocument>> {
        let sql = format!(
            "SELECT {} FROM bond_documents WHERE document_type = ?1 ORDER BY publication_date DESC",
            DOCUMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params![doc_type.to_db_string()], map_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    /// Documents whose publication date falls within `[start, end]`
    /// (inclusive, `YYYY-MM-DD` strings compare lexicographically)
    pub fn documents_in_date_range(
        &self,
        start: &str,
        end: &str,
    ) -> StorageResult<Vec<StoredDocument>> {
        let sql = format!(
            "SELECT {} FROM bond_documents
             WHERE publication_date >= ?1 AND publication_date <= ?2 AND publication_date != ''
             ORDER BY publication_date DESC",
            DOCUMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params![start, end], map_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    /// Removes all documents for one entity (maintenance operation, used
    /// before a forced re-harvest)
    pub fn delete_for_entity(&mut self, entity: &str) -> StorageResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM bond_documents WHERE bond_short_name = ?1",
            params![entity],
        )?;
        Ok(deleted)
    }

    /// Aggregate statistics over the whole store
    pub fn statistics(&self) -> StorageResult<StoreStatistics> {
        let total_documents: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM bond_documents", [], |row| row.get(0))?;

        let total_entities: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT bond_short_name) FROM bond_documents",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT bond_short_name, COUNT(*) as count FROM bond_documents
             GROUP BY bond_short_name ORDER BY count DESC",
        )?;
        let per_entity = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT document_type, COUNT(*) as count FROM bond_documents
             GROUP BY document_type ORDER BY count DESC",
        )?;
        let per_type = stmt
            .query_map([], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(type_str, count)| {
                let doc_type = type_str
                    .as_deref()
                    .and_then(DocumentType::from_db_string)
                    .unwrap_or(DocumentType::Other);
                (doc_type, count)
            })
            .collect();

        let date_range: (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(publication_date), MAX(publication_date) FROM bond_documents
             WHERE publication_date IS NOT NULL AND publication_date != ''",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStatistics {
            total_documents: total_documents as u64,
            total_entities: total_entities as u64,
            per_entity,
            per_type,
            date_range: match date_range {
                (Some(min), Some(max)) => Some((min, max)),
                _ => None,
            },
        })
    }
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<StoredDocument> {
    Ok(StoredDocument {
        id: row.get(0)?,
        bond_short_name: row.get(1)?,
        document_title: row.get(2)?,
        document_type: row
            .get::<_, Option<String>>(3)?
            .as_deref()
            .and_then(DocumentType::from_db_string)
            .unwrap_or(DocumentType::Other),
        download_url: row.get(4)?,
        file_size: row.get(5)?,
        publication_date: row.get(6)?,
        scraped_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(entity: &str, url: &str) -> DocumentRecord {
        DocumentRecord {
            bond_short_name: entity.to_string(),
            document_title: format!("{} prospectus", entity),
            document_type: DocumentType::Prospectus,
            download_url: url.to_string(),
            file_size: Some("1.2MB".to_string()),
            publication_date: "2024-01-15".to_string(),
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        assert!(store.insert(&sample("24BOND01", "https://x.test/a.pdf")).unwrap());

        let docs = store.documents_for_entity("24BOND01").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_type, DocumentType::Prospectus);
        assert_eq!(docs[0].publication_date, "2024-01-15");
    }

    #[test]
    fn test_duplicate_url_is_skipped() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        assert!(store.insert(&sample("24BOND01", "https://x.test/a.pdf")).unwrap());
        // Same URL from a different entity: still a duplicate
        assert!(!store.insert(&sample("24BOND02", "https://x.test/a.pdf")).unwrap());
        assert_eq!(store.document_count("24BOND01").unwrap(), 1);
        assert_eq!(store.document_count("24BOND02").unwrap(), 0);
    }

    #[test]
    fn test_insert_batch_counts_new_rows_only() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        store.insert(&sample("24BOND01", "https://x.test/a.pdf")).unwrap();

        let batch = vec![
            sample("24BOND01", "https://x.test/a.pdf"),
            sample("24BOND01", "https://x.test/b.pdf"),
            sample("24BOND01", "https://x.test/c.pdf"),
        ];
        assert_eq!(store.insert_batch(&batch).unwrap(), 2);
    }

    #[test]
    fn test_existing_entities() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        store.insert(&sample("24BOND01", "https://x.test/a.pdf")).unwrap();
        store.insert(&sample("24BOND02", "https://x.test/b.pdf")).unwrap();

        let entities = store.existing_entities().unwrap();
        assert_eq!(entities.len(), 2);
        assert!(entities.contains("24BOND01"));
        assert!(entities.contains("24BOND02"));
    }

    #[test]
    fn test_documents_by_type() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        store.insert(&sample("24BOND01", "https://x.test/a.pdf")).unwrap();
        let mut rating = sample("24BOND01", "https://x.test/r.pdf");
        rating.document_type = DocumentType::RatingReport;
        store.insert(&rating).unwrap();

        let prospectuses = store.documents_by_type(DocumentType::Prospectus).unwrap();
        assert_eq!(prospectuses.len(), 1);
        let ratings = store.documents_by_type(DocumentType::RatingReport).unwrap();
        assert_eq!(ratings.len(), 1);
    }

    #[test]
    fn test_documents_in_date_range() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        let mut early = sample("24BOND01", "https://x.test/a.pdf");
        early.publication_date = "2023-06-01".to_string();
        let mut late = sample("24BOND01", "https://x.test/b.pdf");
        late.publication_date = "2024-06-01".to_string();
        let mut undated = sample("24BOND01", "https://x.test/c.pdf");
        undated.publication_date = String::new();
        store.insert_batch(&[early, late, undated]).unwrap();

        let in_range = store
            .documents_in_date_range("2024-01-01", "2024-12-31")
            .unwrap();
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].publication_date, "2024-06-01");
    }

    #[test]
    fn test_delete_for_entity() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        store.insert(&sample("24BOND01", "https://x.test/a.pdf")).unwrap();
        store.insert(&sample("24BOND01", "https://x.test/b.pdf")).unwrap();
        store.insert(&sample("24BOND02", "https://x.test/c.pdf")).unwrap();

        assert_eq!(store.delete_for_entity("24BOND01").unwrap(), 2);
        assert_eq!(store.document_count("24BOND01").unwrap(), 0);
        assert_eq!(store.document_count("24BOND02").unwrap(), 1);
    }

    #[test]
    fn test_statistics() {
        let mut store = DocumentStore::new_in_memory().unwrap();
        let mut early = sample("24BOND01", "https://x.test/a.pdf");
        early.publication_date = "2023-06-01".to_string();
        let mut rating = sample("24BOND02", "https://x.test/b.pdf");
        rating.document_type = DocumentType::RatingReport;
        store.insert_batch(&[early, rating]).unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_entities, 2);
        assert_eq!(stats.per_entity.len(), 2);
        assert_eq!(stats.per_type.len(), 2);
        assert_eq!(
            stats.date_range,
            Some(("2023-06-01".to_string(), "2024-01-15".to_string()))
        );
    }

    #[test]
    fn test_statistics_empty_store() {
        let store = DocumentStore::new_in_memory().unwrap();
        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.date_range, None);
    }
}
