// Group - a connected cluster of entities (disjoint-set class)
//
// Membership is stored as a set of entity ids plus a cached size. The Field
// keeps each member's back-reference in sync; a Group never touches entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::entity::EntityId;

// ============================================================================
// GROUP ID
// ============================================================================

/// Monotonic group id, never reused within a Field. Displayed as "G-<n>".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = std::num::ParseIntError;

    /// Accepts "G-12", "g-12" or "12"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("G-")
            .or_else(|| s.strip_prefix("g-"))
            .unwrap_or(s);
        digits.parse().map(GroupId)
    }
}

// ============================================================================
// GROUP
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: GroupId,
    members: BTreeSet<EntityId>,
    size: usize,
}

impl Group {
    pub(crate) fn new(id: GroupId) -> Self {
        Group {
            id,
            members: BTreeSet::new(),
            size: 0,
        }
    }

    pub fn name(&self) -> String {
        self.id.to_string()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn members(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    /// Add a member; no-op (returns false) if it is already one
    pub(crate) fn add_member(&mut self, id: EntityId) -> bool {
        if self.members.insert(id) {
            self.size += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn remove_member(&mut self, id: EntityId) -> bool {
        if self.members.remove(&id) {
            self.size -= 1;
            true
        } else {
            false
        }
    }

    /// Absorb every member of `other`, consuming it
    ///
    /// Returns the ids moved over so the caller can repoint their group
    /// references. `other` is gone afterwards; the Field must already have
    /// deregistered it.
    pub(crate) fn annex(&mut self, other: Group) -> Vec<EntityId> {
        debug_assert_ne!(self.id, other.id, "group {} annexing itself", self.id);

        let moved: Vec<EntityId> = other.members.into_iter().collect();
        for id in &moved {
            self.add_member(*id);
        }
        moved
    }

    /// Cached size matches the member set
    pub(crate) fn size_consistent(&self) -> bool {
        self.size == self.members.len()
    }

    #[cfg(test)]
    pub(crate) fn set_cached_size(&mut self, size: usize) {
        self.size = size;
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} members)", self.id, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_display_and_parse() {
        assert_eq!(GroupId(3).to_string(), "G-3");
        assert_eq!("G-3".parse::<GroupId>().unwrap(), GroupId(3));
        assert_eq!("g-12".parse::<GroupId>().unwrap(), GroupId(12));
        assert_eq!(" 5 ".parse::<GroupId>().unwrap(), GroupId(5));
        assert!("G-x".parse::<GroupId>().is_err());
    }

    #[test]
    fn test_add_member_idempotent() {
        let mut group = Group::new(GroupId(0));

        assert!(group.add_member(EntityId(1)));
        assert!(group.add_member(EntityId(2)));
        assert!(!group.add_member(EntityId(1)));

        assert_eq!(group.size(), 2);
        assert!(group.contains(EntityId(2)));
        assert!(group.size_consistent());
    }

    #[test]
    fn test_remove_member() {
        let mut group = Group::new(GroupId(0));
        group.add_member(EntityId(1));

        assert!(group.remove_member(EntityId(1)));
        assert!(!group.remove_member(EntityId(1)));
        assert!(group.is_empty());
    }

    #[test]
    fn test_annex_moves_members() {
        let mut winner = Group::new(GroupId(0));
        winner.add_member(EntityId(1));
        winner.add_member(EntityId(2));

        let mut loser = Group::new(GroupId(1));
        loser.add_member(EntityId(3));
        loser.add_member(EntityId(2)); // overlap is tolerated

        let moved = winner.annex(loser);

        assert_eq!(moved, vec![EntityId(2), EntityId(3)]);
        assert_eq!(winner.size(), 3);
        assert!(winner.size_consistent());
    }
}
