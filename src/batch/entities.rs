//! Target entity list
//!
//! The entity list is a small CSV: one bond short name per row, with an
//! optional portal code in the second column. No quoting is expected in
//! these files, so the parser is a plain comma split.

use crate::{HarvestError, Result};
use std::path::Path;

/// One harvest target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub short_name: String,
    pub code: Option<String>,
}

impl Entity {
    /// The portal code used in the listing payload; falls back to the
    /// short name when no code column was provided
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.short_name)
    }
}

/// Loads the entity list, preserving order and dropping duplicates
pub fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HarvestError::EntityList(format!("failed to read {}: {}", path.display(), e))
    })?;

    let mut entities = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (line_number, line) in content.lines().enumerate() {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split(',').map(str::trim);
        let short_name = fields.next().unwrap_or_default();
        if short_name.is_empty() {
            continue;
        }
        // Tolerate a header row
        if line_number == 0 && is_header(short_name) {
            continue;
        }

        if !seen.insert(short_name.to_string()) {
            tracing::debug!(entity = short_name, "Duplicate entity in list, skipping");
            continue;
        }

        let code = fields.next().filter(|c| !c.is_empty()).map(String::from);
        entities.push(Entity {
            short_name: short_name.to_string(),
            code,
        });
    }

    if entities.is_empty() {
        return Err(HarvestError::EntityList(format!(
            "{} contains no entities",
            path.display()
        )));
    }

    tracing::info!(count = entities.len(), "Entity list loaded");
    Ok(entities)
}

fn is_header(first_field: &str) -> bool {
    matches!(
        first_field.to_lowercase().as_str(),
        "short_name" | "bond_short_name" | "name" | "entity"
    )
}
