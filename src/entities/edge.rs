// Edge - unordered, deduplicated link between two entities
//
// EdgeKey::new(a, b) == EdgeKey::new(b, a). The key is what the Field indexes
// on and what both endpoints store; the Edge itself is never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{Entity, EntityId};

/// Separator used in the human readable edge label
pub const EDGE_SEPARATOR: &str = " -- ";

// ============================================================================
// EDGE KEY
// ============================================================================

/// Canonical, order-independent identifier of an entity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    low: EntityId,
    high: EntityId,
}

impl EdgeKey {
    pub fn new(a: EntityId, b: EntityId) -> Self {
        if a <= b {
            EdgeKey { low: a, high: b }
        } else {
            EdgeKey { low: b, high: a }
        }
    }

    pub fn endpoints(&self) -> (EntityId, EntityId) {
        (self.low, self.high)
    }

    pub fn touches(&self, id: EntityId) -> bool {
        self.low == id || self.high == id
    }

    /// The opposite endpoint, or None if `id` is not an endpoint
    pub fn other(&self, id: EntityId) -> Option<EntityId> {
        if id == self.low {
            Some(self.high)
        } else if id == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.low, EDGE_SEPARATOR, self.high)
    }
}

// ============================================================================
// EDGE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub key: EdgeKey,

    /// Sorted qualified names of both endpoints, e.g. "CITY:rome -- PERSON:alice"
    pub label: String,
}

impl Edge {
    pub(crate) fn new(a: &Entity, b: &Entity) -> Self {
        Edge {
            key: EdgeKey::new(a.id, b.id),
            label: Edge::label_for(a, b),
        }
    }

    /// Deterministic label: both qualified names sorted, then joined
    pub fn label_for(a: &Entity, b: &Entity) -> String {
        let mut names = [a.qualified_name(), b.qualified_name()];
        names.sort();
        names.join(EDGE_SEPARATOR)
    }

    pub fn endpoints(&self) -> (EntityId, EntityId) {
        self.key.endpoints()
    }

    pub fn other(&self, id: EntityId) -> Option<EntityId> {
        self.key.other(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u64, entity_type: &str, name: &str) -> Entity {
        Entity::new(
            EntityId(id),
            entity_type.to_string(),
            name.to_string(),
            name.to_string(),
        )
    }

    #[test]
    fn test_edge_key_order_independent() {
        let ab = EdgeKey::new(EntityId(1), EntityId(9));
        let ba = EdgeKey::new(EntityId(9), EntityId(1));

        assert_eq!(ab, ba);
        assert_eq!(ab.endpoints(), (EntityId(1), EntityId(9)));
    }

    #[test]
    fn test_edge_key_other() {
        let key = EdgeKey::new(EntityId(4), EntityId(2));

        assert_eq!(key.other(EntityId(4)), Some(EntityId(2)));
        assert_eq!(key.other(EntityId(2)), Some(EntityId(4)));
        assert_eq!(key.other(EntityId(3)), None);
        assert!(key.touches(EntityId(2)));
        assert!(!key.touches(EntityId(3)));
    }

    #[test]
    fn test_edge_label_sorted() {
        let alice = entity(0, "PERSON", "alice");
        let rome = entity(1, "CITY", "rome");

        let one = Edge::new(&alice, &rome);
        let two = Edge::new(&rome, &alice);

        assert_eq!(one.key, two.key);
        assert_eq!(one.label, "CITY:rome -- PERSON:alice");
        assert_eq!(one.label, two.label);
    }
}
