// 📥 Ingestion - tabular records → entities, edges and groups
//
// Every row designates one main cell; every other populated cell becomes an
// attribute entity linked to it. Headers are entity types, normalized like
// any other type ("Phone Number" → PHONE_NUMBER).

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::error::{FieldError, Result};
use crate::field::{Field, GroupChange, LinkOutcome};
use crate::normalize::normalize_type;

// ============================================================================
// RECORD BATCH
// ============================================================================

/// Normalized headers plus raw rows, as produced by a record reader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordBatch {
    pub headers: Vec<String>,

    /// Raw cell values; an empty string means "absent"
    pub rows: Vec<Vec<String>>,

    /// Where the records came from (file name), for reports
    pub source: Option<String>,
}

impl RecordBatch {
    pub fn new<H: AsRef<str>>(headers: &[H]) -> Self {
        RecordBatch {
            headers: headers.iter().map(|h| normalize_type(h.as_ref())).collect(),
            rows: Vec::new(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn push_row<V: AsRef<str>>(&mut self, row: &[V]) {
        self.rows.push(row.iter().map(|v| v.as_ref().to_string()).collect());
    }

    /// Index of the first column with this (normalized) header
    pub fn column_index(&self, column: &str) -> Option<usize> {
        let column = normalize_type(column);
        self.headers.iter().position(|h| *h == column)
    }

    /// Cell value, empty when the row is short
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    /// One row as header → value, skipping absent cells
    pub fn row_map(&self, row: usize) -> HashMap<&str, &str> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.as_str(), self.cell(row, i)))
            .filter(|(_, v)| !v.is_empty())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// CSV READER
// ============================================================================

/// Load a CSV file into a record batch
pub fn read_csv(csv_path: &Path) -> Result<RecordBatch> {
    let file = std::fs::File::open(csv_path)?;
    let batch = read_csv_from(file)?;
    Ok(batch.with_source(csv_path.display().to_string()))
}

/// Read CSV records from any reader (first line is the header)
///
/// Rows may be shorter or longer than the header; missing cells are empty,
/// extra cells are ignored.
pub fn read_csv_from<R: Read>(reader: R) -> Result<RecordBatch> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let mut batch = RecordBatch::new(&headers);

    for result in rdr.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
        if row.len() > batch.headers.len() {
            warn!(
                "Row {} has {} cells for {} columns, extra cells ignored",
                batch.rows.len() + 1,
                row.len(),
                batch.headers.len()
            );
        }
        row.resize(batch.headers.len(), String::new());
        batch.rows.push(row);
    }

    Ok(batch)
}

// ============================================================================
// IMPORT REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub source: Option<String>,
    pub main_column: String,

    pub rows_read: usize,
    /// Rows with an empty main cell
    pub rows_skipped: usize,

    pub entities_created: u64,
    pub edges_created: usize,
    pub groups_created: usize,
    /// Groups that disappeared into larger ones during this batch
    pub groups_absorbed: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportReport {
    /// Change in the number of groups caused by this batch
    pub fn net_groups(&self) -> i64 {
        self.groups_created as i64 - self.groups_absorbed as i64
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Import completed. Imported {} new entities, and {} group(s) created ({} merged away).",
            self.entities_created, self.groups_created, self.groups_absorbed
        )
    }
}

// ============================================================================
// FIELD IMPORT
// ============================================================================

impl Field {
    /// Import one batch of records
    ///
    /// `main_column` defaults to the first column. Schema problems are
    /// reported before any row is touched; rows already imported by earlier
    /// batches stay committed.
    pub fn import_batch(
        &mut self,
        batch: &RecordBatch,
        main_column: Option<&str>,
    ) -> Result<ImportReport> {
        let started_at = Utc::now();

        let columns: Vec<(usize, String)> = batch
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (i, h.clone()))
            .collect();

        if columns.len() < 2 {
            return Err(FieldError::NotEnoughColumns {
                found: columns.len(),
            });
        }

        let main_idx = match main_column {
            Some(column) => {
                let wanted = normalize_type(column);
                columns
                    .iter()
                    .find(|(_, header)| *header == wanted)
                    .map(|(idx, _)| *idx)
                    .ok_or(FieldError::MissingMainColumn(wanted))?
            }
            None => {
                let (idx, header) = &columns[0];
                info!("...setting main entity type to {}", header);
                *idx
            }
        };
        let main_type = batch.headers[main_idx].clone();

        for (_, header) in &columns {
            self.register_type(header);
        }

        let entities_before = self.entities_created();
        let mut report = ImportReport {
            batch_id: uuid::Uuid::new_v4().to_string(),
            source: batch.source.clone(),
            main_column: main_type.clone(),
            rows_read: 0,
            rows_skipped: 0,
            entities_created: 0,
            edges_created: 0,
            groups_created: 0,
            groups_absorbed: 0,
            started_at,
            finished_at: started_at,
        };

        for row in 0..batch.rows.len() {
            report.rows_read += 1;

            let main_value = batch.cell(row, main_idx);
            if main_value.is_empty() {
                report.rows_skipped += 1;
                continue;
            }
            let main = self.resolve(&main_type, main_value)?;

            for (idx, entity_type) in &columns {
                if *idx == main_idx {
                    continue;
                }
                let value = batch.cell(row, *idx);
                if value.is_empty() {
                    continue;
                }

                let attribute = self.resolve(entity_type, value)?;
                if let LinkOutcome::Linked { change, .. } = self.link(main, attribute)? {
                    report.edges_created += 1;
                    match change {
                        GroupChange::Created(_) => report.groups_created += 1,
                        GroupChange::Merged { .. } => report.groups_absorbed += 1,
                        GroupChange::Joined(_) | GroupChange::Unchanged(_) => {}
                    }
                }
            }
        }

        report.entities_created = self.entities_created() - entities_before;
        report.finished_at = Utc::now();

        info!(
            "{} [{}: {} rows, {} skipped, {} edges]",
            report,
            report.source.as_deref().unwrap_or("batch"),
            report.rows_read,
            report.rows_skipped,
            report.edges_created
        );

        Ok(report)
    }

    /// Read a CSV file and import it
    pub fn import_csv(&mut self, csv_path: &Path, main_column: Option<&str>) -> Result<ImportReport> {
        let batch = read_csv(csv_path)?;
        self.import_batch(&batch, main_column)
    }
}
