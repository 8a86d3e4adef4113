//! Spreadsheet export
//!
//! Re-derives flat CSV views from the SQLite store: one file with every
//! document, one file per document type, and a summary sheet. Exports
//! are regenerated from scratch on every run, so the store stays the
//! single source of truth.

mod csv;
mod stats;

pub use csv::{export_all, ExportReport};
pub use stats::render_statistics;
