//! CSV writers

use crate::storage::{DocumentStore, DocumentType, StoredDocument};
use crate::{HarvestError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const DOCUMENT_HEADER: &[&str] = &[
    "id",
    "bond_short_name",
    "document_title",
    "document_type",
    "download_url",
    "file_size",
    "publication_date",
    "scraped_at",
];

/// What an export run produced
#[derive(Debug, Default)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub documents: u64,
}

/// Writes the full spreadsheet set under `dir`: `all_documents.csv`,
/// `by_type/<type>.csv` for each non-empty type, and `summary.csv`.
/// Existing files are overwritten.
pub fn export_all(store: &DocumentStore, dir: &Path) -> Result<ExportReport> {
    let documents = store.all_documents()?;
    if documents.is_empty() {
        return Err(HarvestError::Export(
            "store contains no documents to export".to_string(),
        ));
    }

    std::fs::create_dir_all(dir)?;
    let mut report = ExportReport {
        documents: documents.len() as u64,
        ..Default::default()
    };

    let all_path = dir.join("all_documents.csv");
    write_documents(&all_path, &documents)?;
    report.files.push(all_path);

    let by_type_dir = dir.join("by_type");
    std::fs::create_dir_all(&by_type_dir)?;
    for &document_type in DocumentType::all() {
        let subset = store.documents_by_type(document_type)?;
        if subset.is_empty() {
            continue;
        }
        let path = by_type_dir.join(format!("{}.csv", document_type.to_db_string()));
        write_documents(&path, &subset)?;
        report.files.push(path);
    }

    let summary_path = dir.join("summary.csv");
    write_summary(store, &summary_path)?;
    report.files.push(summary_path);

    tracing::info!(
        documents = report.documents,
        files = report.files.len(),
        dir = %dir.display(),
        "Export complete"
    );
    Ok(report)
}

fn write_documents(path: &Path, documents: &[StoredDocument]) -> Result<()> {
    let mut writer = open_csv(path)?;
    write_row(&mut writer, DOCUMENT_HEADER.iter().copied())?;
    for doc in documents {
        write_row(
            &mut writer,
            [
                doc.id.to_string().as_str(),
                &doc.bond_short_name,
                &doc.document_title,
                doc.document_type.to_db_string(),
                &doc.download_url,
                doc.file_size.as_deref().unwrap_or(""),
                &doc.publication_date,
                &doc.scraped_at,
            ]
            .into_iter(),
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(store: &DocumentStore, path: &Path) -> Result<()> {
    let stats = store.statistics()?;
    let mut writer = open_csv(path)?;

    write_row(&mut writer, ["metric", "value"].into_iter())?;
    write_row(
        &mut writer,
        ["total_documents", stats.total_documents.to_string().as_str()].into_iter(),
    )?;
    write_row(
        &mut writer,
        ["total_entities", stats.total_entities.to_string().as_str()].into_iter(),
    )?;
    if let Some((earliest, latest)) = &stats.date_range {
        write_row(&mut writer, ["earliest_publication", earliest].into_iter())?;
        write_row(&mut writer, ["latest_publication", latest].into_iter())?;
    }
    for (document_type, count) in &stats.per_type {
        write_row(
            &mut writer,
            [
                format!("type:{}", document_type.to_db_string()).as_str(),
                count.to_string().as_str(),
            ]
            .into_iter(),
        )?;
    }
    for (entity, count) in &stats.per_entity {
        write_row(
            &mut writer,
            [
                format!("entity:{}", entity).as_str(),
                count.to_string().as_str(),
            ]
            .into_iter(),
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn open_csv(path: &Path) -> Result<BufWriter<File>> {
    let mut writer = BufWriter::new(File::create(path)?);
    // BOM so spreadsheet programs decode the Chinese titles as UTF-8
    writer.write_all(b"\xEF\xBB\xBF")?;
    Ok(writer)
}

fn write_row<'a>(
    writer: &mut impl Write,
    fields: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let mut first = true;
    for field in fields {
        if !first {
            writer.write_all(b",")?;
        }
        first = false;
        writer.write_all(escape_field(field).as_bytes())?;
    }
    writer.write_all(b"\r\n")?;
    Ok(())
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocumentRecord;
    use tempfile::TempDir;

    fn record(entity: &str, title: &str, url: &str, document_type: DocumentType) -> DocumentRecord {
        DocumentRecord {
            bond_short_name: entity.to_string(),
            document_title: title.to_string(),
            document_type,
            download_url: url.to_string(),
            file_size: Some("1.2MB".to_string()),
            publication_date: "2024-01-15".to_string(),
        }
    }

    fn seeded_store() -> DocumentStore {
        let mut store = DocumentStore::new_in_memory().unwrap();
        store
            .insert(&record(
                "24BOND01",
                "募集说明书",
                "https://x.test/a.pdf",
                DocumentType::Prospectus,
            ))
            .unwrap();
        store
            .insert(&record(
                "24BOND01",
                "评级报告",
                "https://x.test/b.pdf",
                DocumentType::RatingReport,
            ))
            .unwrap();
        store
            .insert(&record(
                "24BOND02",
                "含,逗号\"引号",
                "https://x.test/c.pdf",
                DocumentType::Other,
            ))
            .unwrap();
        store
    }

    #[test]
    fn test_export_writes_expected_files() {
        let store = seeded_store();
        let dir = TempDir::new().unwrap();

        let report = export_all(&store, dir.path()).unwrap();
        assert_eq!(report.documents, 3);

        assert!(dir.path().join("all_documents.csv").exists());
        assert!(dir.path().join("summary.csv").exists());
        assert!(dir.path().join("by_type/prospectus.csv").exists());
        assert!(dir.path().join("by_type/rating_report.csv").exists());
        // No financial reports were stored
        assert!(!dir.path().join("by_type/financial_report.csv").exists());
    }

    #[test]
    fn test_all_documents_content() {
        let store = seeded_store();
        let dir = TempDir::new().unwrap();
        export_all(&store, dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("all_documents.csv")).unwrap();
        let content = content.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id,bond_short_name,document_title"));
        assert!(content.contains("募集说明书"));
        // Comma and quote in the title force quoting
        assert!(content.contains("\"含,逗号\"\"引号\""));
    }

    #[test]
    fn test_summary_content() {
        let store = seeded_store();
        let dir = TempDir::new().unwrap();
        export_all(&store, dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("summary.csv")).unwrap();
        assert!(content.contains("total_documents,3"));
        assert!(content.contains("total_entities,2"));
        assert!(content.contains("type:prospectus,1"));
        assert!(content.contains("entity:24BOND01,2"));
        assert!(content.contains("earliest_publication,2024-01-15"));
    }

    #[test]
    fn test_empty_store_is_error() {
        let store = DocumentStore::new_in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            export_all(&store, dir.path()),
            Err(HarvestError::Export(_))
        ));
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }
}
