//! Statistics report

use crate::storage::{DocumentStore, StoreStatistics};
use crate::Result;
use std::fmt::Write;

/// Renders the store statistics as a plain-text report for the terminal
pub fn render_statistics(store: &DocumentStore) -> Result<String> {
    let stats = store.statistics()?;
    Ok(format_report(&stats))
}

fn format_report(stats: &StoreStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Document store statistics");
    let _ = writeln!(out, "=========================");
    let _ = writeln!(out, "Total documents: {}", stats.total_documents);
    let _ = writeln!(out, "Entities covered: {}", stats.total_entities);
    if let Some((earliest, latest)) = &stats.date_range {
        let _ = writeln!(out, "Publication dates: {} to {}", earliest, latest);
    }

    if !stats.per_type.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "By document type:");
        for (document_type, count) in &stats.per_type {
            let _ = writeln!(out, "  {:<20} {}", document_type.to_db_string(), count);
        }
    }

    if !stats.per_entity.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Top entities:");
        for (entity, count) in stats.per_entity.iter().take(20) {
            let _ = writeln!(out, "  {:<20} {}", entity, count);
        }
        if stats.per_entity.len() > 20 {
            let _ = writeln!(out, "  ... and {} more", stats.per_entity.len() - 20);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocumentType;

    #[test]
    fn test_report_layout() {
        let stats = StoreStatistics {
            total_documents: 42,
            total_entities: 3,
            per_entity: vec![
                ("24BOND01".to_string(), 30),
                ("24BOND02".to_string(), 12),
            ],
            per_type: vec![
                (DocumentType::Prospectus, 20),
                (DocumentType::Other, 22),
            ],
            date_range: Some(("2023-06-01".to_string(), "2024-01-15".to_string())),
        };

        let report = format_report(&stats);
        assert!(report.contains("Total documents: 42"));
        assert!(report.contains("Entities covered: 3"));
        assert!(report.contains("2023-06-01 to 2024-01-15"));
        assert!(report.contains("prospectus"));
        assert!(report.contains("24BOND01"));
    }

    #[test]
    fn test_empty_store_report() {
        let stats = StoreStatistics {
            total_documents: 0,
            total_entities: 0,
            per_entity: vec![],
            per_type: vec![],
            date_range: None,
        };
        let report = format_report(&stats);
        assert!(report.contains("Total documents: 0"));
        assert!(!report.contains("Top entities"));
    }
}
