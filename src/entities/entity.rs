// Entity - a typed, named node in the field
//
// Identity is (entity_type, name), both normalized. The raw value seen on
// first resolution is kept for display. Group and edges are held by id only;
// the Field owns every Entity, Edge and Group.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::edge::EdgeKey;
use super::group::GroupId;

// ============================================================================
// ENTITY ID
// ============================================================================

/// Monotonic entity id, assigned by the Field in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

// ============================================================================
// ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: EntityId,

    /// Normalized type label, e.g. "CITY"
    pub entity_type: String,

    /// Normalized identity key, e.g. "rome"
    pub name: String,

    /// Original display value, e.g. "Rome"
    pub value: String,

    group: Option<GroupId>,

    edges: BTreeSet<EdgeKey>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, entity_type: String, name: String, value: String) -> Self {
        Entity {
            id,
            entity_type,
            name,
            value,
            group: None,
            edges: BTreeSet::new(),
        }
    }

    /// Group this entity currently belongs to, if any
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: Option<GroupId>) {
        self.group = group;
    }

    /// Keys of all incident edges
    pub fn edges(&self) -> impl Iterator<Item = &EdgeKey> {
        self.edges.iter()
    }

    pub fn has_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains(key)
    }

    pub(crate) fn attach_edge(&mut self, key: EdgeKey) {
        self.edges.insert(key);
    }

    pub(crate) fn detach_edge(&mut self, key: &EdgeKey) -> bool {
        self.edges.remove(key)
    }

    pub(crate) fn take_edges(&mut self) -> BTreeSet<EdgeKey> {
        std::mem::take(&mut self.edges)
    }

    /// Number of directly linked entities
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    /// Not linked to any other entity
    pub fn is_single(&self) -> bool {
        self.edges.is_empty()
    }

    /// "TYPE:name", unique within a field
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.entity_type, self.name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entity {
        Entity::new(
            EntityId(7),
            "CITY".to_string(),
            "rome".to_string(),
            "Rome".to_string(),
        )
    }

    #[test]
    fn test_entity_creation() {
        let entity = sample();

        assert_eq!(entity.id, EntityId(7));
        assert_eq!(entity.group(), None);
        assert!(entity.is_single());
        assert_eq!(entity.qualified_name(), "CITY:rome");
        assert_eq!(entity.to_string(), "Rome (CITY)");
    }

    #[test]
    fn test_entity_edges() {
        let mut entity = sample();
        let key = EdgeKey::new(EntityId(7), EntityId(2));

        entity.attach_edge(key);
        entity.attach_edge(key); // Same key - stays one edge

        assert_eq!(entity.degree(), 1);
        assert!(entity.has_edge(&key));
        assert!(entity.detach_edge(&key));
        assert!(!entity.detach_edge(&key));
        assert!(entity.is_single());
    }
}
