// Entity Field - Core Library
// Typed entity registry + incremental clustering of co-occurring values.
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod normalize;
pub mod entities;   // Entity, Edge, Group
pub mod field;      // Registry: resolve, link, merge-by-size, removal, audit
pub mod stats;      // On-demand link statistics and group rankings
pub mod ingest;     // Tabular records → field
pub mod export;     // Field → CSV / JSON

// Re-export commonly used types
pub use error::{FieldError, Result};
pub use normalize::{normalize_name, normalize_type};
pub use entities::{
    Entity, EntityId,
    Edge, EdgeKey, EDGE_SEPARATOR,
    Group, GroupId,
};
pub use field::{Field, GroupChange, LinkOutcome};
pub use stats::{
    FieldStats, GroupSummary, LinkStats, TypeLinks, TypeSummary, DEFAULT_GROUP_LIMIT,
};
pub use ingest::{read_csv, read_csv_from, ImportReport, RecordBatch};
pub use export::{
    write_csv, write_export, write_json,
    EntityExport, ExportFormat, TypeExport, LINK_VALUE_SEPARATOR,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
