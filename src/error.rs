// Errors for the entity field
//
// Three kinds matter to callers:
// - schema errors abort the current import batch
// - lookup errors mean "not found" and are handled locally
// - invariant violations are defects (audit() reports them, core ops panic)

use thiserror::Error;

use crate::entities::EntityId;

pub type Result<T> = std::result::Result<T, FieldError>;

#[derive(Debug, Error)]
pub enum FieldError {
    // ========================================================================
    // SCHEMA
    // ========================================================================
    #[error("Import error: not enough columns ({found}), at least 2 required")]
    NotEnoughColumns { found: usize },

    #[error("Import error: missing main entity column {0}")]
    MissingMainColumn(String),

    #[error("Empty value for entity type {entity_type}")]
    EmptyValue { entity_type: String },

    // ========================================================================
    // LOOKUP
    // ========================================================================
    #[error("Entity not found: {entity_type}/{name}")]
    EntityNotFound { entity_type: String, name: String },

    #[error("Unknown entity id: {0}")]
    UnknownEntity(EntityId),

    #[error("Group {0} is not in this field")]
    GroupNotFound(String),

    // ========================================================================
    // DEFECTS
    // ========================================================================
    #[error("Invariant violated: {0}")]
    Invariant(String),

    // ========================================================================
    // COLLABORATORS
    // ========================================================================
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FieldError {
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            FieldError::NotEnoughColumns { .. }
                | FieldError::MissingMainColumn(_)
                | FieldError::EmptyValue { .. }
        )
    }

    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            FieldError::EntityNotFound { .. }
                | FieldError::UnknownEntity(_)
                | FieldError::GroupNotFound(_)
        )
    }

    pub fn is_invariant(&self) -> bool {
        matches!(self, FieldError::Invariant(_))
    }
}
