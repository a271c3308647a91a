// 📤 Export - entities of one type with their group and linked values
//
// CSV layout (one row per entity):
//   GROUP, <TYPE>, <LINKED TYPE 1>, <LINKED TYPE 2>, ...
// Multiple linked values of the same type share a cell, joined with "|".

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::Result;
use crate::field::Field;
use crate::normalize::normalize_type;

/// Joins several linked values inside one CSV cell
pub const LINK_VALUE_SEPARATOR: &str = "|";

// ============================================================================
// EXPORT VIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityExport {
    pub value: String,
    pub name: String,
    /// Group name ("G-3"), None for entities without links
    pub group: Option<String>,
    /// Linked type → display values of linked entities
    pub links: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeExport {
    pub entity_type: String,
    /// Every type linked from this type, sorted
    pub linked_types: Vec<String>,
    pub entities: Vec<EntityExport>,
}

impl TypeExport {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {} (expected csv or json)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

impl Field {
    /// Every entity of `entity_type` with its group and linked values
    pub fn entities_of_type(&self, entity_type: &str) -> TypeExport {
        let entity_type = normalize_type(entity_type);
        let mut linked_types: BTreeSet<String> = BTreeSet::new();
        let mut entities = Vec::new();

        for entity in self.entities_by_type(&entity_type) {
            let mut links: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for other in self.neighbours(entity.id).unwrap_or_default() {
                linked_types.insert(other.entity_type.clone());
                links
                    .entry(other.entity_type.clone())
                    .or_default()
                    .push(other.value.clone());
            }

            entities.push(EntityExport {
                value: entity.value.clone(),
                name: entity.name.clone(),
                group: entity.group().map(|g| g.to_string()),
                links,
            });
        }

        TypeExport {
            entity_type,
            linked_types: linked_types.into_iter().collect(),
            entities,
        }
    }

    /// Export view for `entity_type`, or for the most linked type if None
    ///
    /// Returns None when no type was given and nothing is linked yet.
    pub fn export_view(&self, entity_type: Option<&str>) -> Option<TypeExport> {
        let entity_type = match entity_type {
            Some(t) => t.to_string(),
            None => self.most_linked_type()?,
        };
        Some(self.entities_of_type(&entity_type))
    }
}

// ============================================================================
// WRITERS
// ============================================================================

pub fn write_csv<W: Write>(writer: W, export: &TypeExport) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["GROUP".to_string(), export.entity_type.clone()];
    header.extend(export.linked_types.iter().cloned());
    wtr.write_record(&header)?;

    for entity in &export.entities {
        let mut record = vec![
            entity.group.clone().unwrap_or_default(),
            entity.value.clone(),
        ];
        for linked_type in &export.linked_types {
            let cell = entity
                .links
                .get(linked_type)
                .map(|values| values.join(LINK_VALUE_SEPARATOR))
                .unwrap_or_default();
            record.push(cell);
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(writer: W, export: &TypeExport) -> Result<()> {
    serde_json::to_writer_pretty(writer, export)?;
    Ok(())
}

pub fn write_export<W: Write>(writer: W, export: &TypeExport, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(writer, export),
        ExportFormat::Json => write_json(writer, export),
    }
}
