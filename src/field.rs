// 🕸️ Field - the entity registry and clustering engine
//
// The Field owns every Entity, Edge and Group (arena style, keyed by id) and
// keeps one invariant across every operation:
//
//   two entities share a group  <=>  a path of edges connects them
//
// Linking maintains it incrementally with union-by-size; no import ever
// recomputes clusters from scratch. Destructive operations (unlink, remove)
// re-partition only the group they touched.
//
// Merge cost is O(size of the absorbed group) because every absorbed member
// has its group reference rewritten. Balanced imports stay near O(n log n);
// an adversarial order that keeps feeding the small side degrades towards
// O(n²). Fine for record counts in the thousands.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::entities::{Edge, EdgeKey, Entity, EntityId, Group, GroupId};
use crate::error::{FieldError, Result};
use crate::normalize::{normalize_name, normalize_type};

// ============================================================================
// LINK OUTCOME
// ============================================================================

/// What a new edge did to the group partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupChange {
    /// Neither endpoint was grouped; a new group holds both
    Created(GroupId),

    /// One endpoint joined the other's group
    Joined(GroupId),

    /// Two groups became one; `absorbed` no longer exists
    Merged { winner: GroupId, absorbed: GroupId },

    /// Both endpoints were already in the same group
    Unchanged(GroupId),
}

impl GroupChange {
    /// Group both endpoints belong to afterwards
    pub fn group(&self) -> GroupId {
        match *self {
            GroupChange::Created(g) | GroupChange::Joined(g) | GroupChange::Unchanged(g) => g,
            GroupChange::Merged { winner, .. } => winner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkOutcome {
    /// Both ids were the same entity; nothing happens
    SelfLink,

    /// The pair already had an edge; nothing happens
    AlreadyLinked,

    Linked { edge: EdgeKey, change: GroupChange },
}

impl LinkOutcome {
    pub fn is_new_edge(&self) -> bool {
        matches!(self, LinkOutcome::Linked { .. })
    }

    pub fn group_change(&self) -> Option<GroupChange> {
        match self {
            LinkOutcome::Linked { change, .. } => Some(*change),
            _ => None,
        }
    }
}

// ============================================================================
// FIELD
// ============================================================================

#[derive(Debug, Default)]
pub struct Field {
    /// type → normalized name → entity
    entity_index: HashMap<String, HashMap<String, EntityId>>,

    entities: BTreeMap<EntityId, Entity>,

    edges: HashMap<EdgeKey, Edge>,

    groups: BTreeMap<GroupId, Group>,

    /// Every type seen so far, in first-seen order
    entity_types: Vec<String>,

    /// Entities ever created (also the next entity id)
    entity_counter: u64,

    /// Groups ever created (also the next group id)
    group_counter: u64,
}

impl Field {
    pub fn new() -> Self {
        Field::default()
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Get-or-create the entity for (type, raw value)
    ///
    /// Values that only differ in case or whitespace resolve to the same
    /// entity. The raw value of the first resolution is kept for display.
    pub fn resolve(&mut self, entity_type: &str, raw_value: &str) -> Result<EntityId> {
        let entity_type = normalize_type(entity_type);
        let name = normalize_name(raw_value);

        if entity_type.is_empty() || name.is_empty() {
            return Err(FieldError::EmptyValue { entity_type });
        }

        if let Some(id) = self
            .entity_index
            .get(&entity_type)
            .and_then(|by_name| by_name.get(&name))
        {
            return Ok(*id);
        }

        self.register_type(&entity_type);

        let id = EntityId(self.entity_counter);
        self.entity_counter += 1;

        self.entity_index
            .entry(entity_type.clone())
            .or_default()
            .insert(name.clone(), id);
        self.entities.insert(
            id,
            Entity::new(id, entity_type, name, raw_value.to_string()),
        );

        Ok(id)
    }

    /// Record a type (normalized) without creating entities; returns it
    pub fn register_type(&mut self, entity_type: &str) -> String {
        let entity_type = normalize_type(entity_type);
        if !self.entity_types.contains(&entity_type) {
            self.entity_types.push(entity_type.clone());
        }
        self.entity_index.entry(entity_type.clone()).or_default();
        entity_type
    }

    // ========================================================================
    // LINKING
    // ========================================================================

    /// Link two entities (symmetric, idempotent)
    ///
    /// Creating the edge is what drives group reconciliation; this is the
    /// only way imports change group membership.
    pub fn link(&mut self, a: EntityId, b: EntityId) -> Result<LinkOutcome> {
        self.entity(a)?;
        self.entity(b)?;

        if a == b {
            return Ok(LinkOutcome::SelfLink);
        }

        let key = EdgeKey::new(a, b);
        if self.edges.contains_key(&key) {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        let edge = Edge::new(self.entity_ref(a), self.entity_ref(b));
        self.edges.insert(key, edge);
        self.entity_mut(a).attach_edge(key);
        self.entity_mut(b).attach_edge(key);

        let change = self.reconcile(a, b);

        debug_assert_eq!(
            self.entity_ref(a).group(),
            self.entity_ref(b).group(),
            "linked entities {} and {} ended up in different groups",
            a,
            b
        );

        Ok(LinkOutcome::Linked { edge: key, change })
    }

    /// Resolve both sides and link them
    pub fn link_values(
        &mut self,
        from_type: &str,
        from_value: &str,
        to_type: &str,
        to_value: &str,
    ) -> Result<LinkOutcome> {
        let a = self.resolve(from_type, from_value)?;
        let b = self.resolve(to_type, to_value)?;
        self.link(a, b)
    }

    /// Bring the group partition up to date after a new edge a-b
    ///
    /// Exactly one case applies, evaluated once:
    /// 1. neither grouped      → new group [a, b]
    /// 2. only b grouped       → a joins b's group
    /// 3. only a grouped       → b joins a's group
    /// 4. different groups     → larger absorbs smaller, a's group wins ties
    fn reconcile(&mut self, a: EntityId, b: EntityId) -> GroupChange {
        let group_a = self.entity_ref(a).group();
        let group_b = self.entity_ref(b).group();

        match (group_a, group_b) {
            (None, None) => {
                let gid = self.create_group();
                self.add_to_group(gid, a);
                self.add_to_group(gid, b);
                debug!("{} created for {} and {}", gid, a, b);
                GroupChange::Created(gid)
            }
            (None, Some(gid)) => {
                self.add_to_group(gid, a);
                GroupChange::Joined(gid)
            }
            (Some(gid), None) => {
                self.add_to_group(gid, b);
                GroupChange::Joined(gid)
            }
            (Some(ga), Some(gb)) if ga == gb => GroupChange::Unchanged(ga),
            (Some(ga), Some(gb)) => {
                let (winner, absorbed) = if self.group_ref(gb).size() > self.group_ref(ga).size() {
                    (gb, ga)
                } else {
                    (ga, gb)
                };
                self.merge_groups(winner, absorbed);
                GroupChange::Merged { winner, absorbed }
            }
        }
    }

    fn create_group(&mut self) -> GroupId {
        let gid = GroupId(self.group_counter);
        self.group_counter += 1;
        self.groups.insert(gid, Group::new(gid));
        gid
    }

    fn add_to_group(&mut self, gid: GroupId, id: EntityId) {
        self.group_mut(gid).add_member(id);
        self.entity_mut(id).set_group(Some(gid));
    }

    /// `winner` annexes `absorbed`; `absorbed` is deregistered first
    fn merge_groups(&mut self, winner: GroupId, absorbed: GroupId) {
        let loser = match self.groups.remove(&absorbed) {
            Some(group) => group,
            None => panic!("invariant violated: group {} merged after deregistration", absorbed),
        };
        let absorbed_size = loser.size();

        let moved = self.group_mut(winner).annex(loser);
        for id in moved {
            self.entity_mut(id).set_group(Some(winner));
        }

        debug_assert!(!self.groups.contains_key(&absorbed));
        debug!(
            "{} absorbed {} ({} members), now {} members",
            winner,
            absorbed,
            absorbed_size,
            self.group_ref(winner).size()
        );
    }

    // ========================================================================
    // REMOVAL
    // ========================================================================

    /// Remove the edge between a and b, if any
    ///
    /// Returns false when the pair was not linked. The affected group is
    /// re-partitioned: it may split or lose members that became single.
    pub fn unlink(&mut self, a: EntityId, b: EntityId) -> Result<bool> {
        self.entity(a)?;
        self.entity(b)?;

        let key = EdgeKey::new(a, b);
        if self.edges.remove(&key).is_none() {
            return Ok(false);
        }
        self.entity_mut(a).detach_edge(&key);
        self.entity_mut(b).detach_edge(&key);

        if let Some(gid) = self.entity_ref(a).group() {
            self.repartition(gid);
        }
        Ok(true)
    }

    /// Remove an entity together with all its edges
    ///
    /// Surviving neighbours lose the edge; the entity's former group is
    /// re-partitioned and deregistered if nothing is left in it.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        let mut entity = self.detach_entity(id)?;

        if let Some(gid) = entity.group() {
            entity.set_group(None);
            self.group_mut(gid).remove_member(id);
            self.repartition(gid);
        }

        Ok(entity)
    }

    /// Remove every entity that is not linked to any other entity
    pub fn remove_singles(&mut self) -> usize {
        let singles: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.is_single())
            .map(|e| e.id)
            .collect();

        // Singles carry no group and no edges: detaching them is enough
        let mut removed = 0;
        for id in singles {
            if self.detach_entity(id).is_ok() {
                removed += 1;
            }
        }

        debug!("removed {} single entities", removed);
        removed
    }

    /// Remove every group of `max_size` members or fewer, with its members
    ///
    /// Returns the number of groups removed.
    pub fn remove_groups_by_size(&mut self, max_size: usize) -> usize {
        let doomed: Vec<GroupId> = self
            .groups
            .values()
            .filter(|g| g.size() <= max_size)
            .map(|g| g.id)
            .collect();

        for gid in &doomed {
            if let Some(group) = self.groups.remove(gid) {
                // Edges never leave a group, so dropping every member leaves
                // no dangling edge behind.
                for id in group.members() {
                    if let Ok(mut entity) = self.detach_entity(id) {
                        entity.set_group(None);
                    }
                }
            }
        }

        debug!("removed {} groups of size <= {}", doomed.len(), max_size);
        doomed.len()
    }

    /// Take an entity out of the arena, the name index and every edge
    ///
    /// Group membership is left to the caller.
    fn detach_entity(&mut self, id: EntityId) -> Result<Entity> {
        let mut entity = self
            .entities
            .remove(&id)
            .ok_or(FieldError::UnknownEntity(id))?;

        for key in entity.take_edges() {
            self.edges.remove(&key);
            if let Some(other) = key.other(id).and_then(|o| self.entities.get_mut(&o)) {
                other.detach_edge(&key);
            }
        }

        if let Some(by_name) = self.entity_index.get_mut(&entity.entity_type) {
            by_name.remove(&entity.name);
        }

        Ok(entity)
    }

    /// Rebuild one group after edges or members disappeared from it
    ///
    /// The largest connected component keeps the group id, other components
    /// of two or more get fresh groups, members left without edges become
    /// ungrouped. An empty group is deregistered.
    fn repartition(&mut self, gid: GroupId) {
        let members: Vec<EntityId> = match self.groups.get(&gid) {
            Some(group) => group.members().collect(),
            None => return,
        };

        let mut components = self.components_of(&members);
        components.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));

        let mut kept = false;
        for component in components {
            if component.len() < 2 {
                for id in component {
                    self.group_mut(gid).remove_member(id);
                    self.entity_mut(id).set_group(None);
                }
            } else if !kept {
                kept = true;
            } else {
                let split = self.create_group();
                for id in &component {
                    self.group_mut(gid).remove_member(*id);
                    self.add_to_group(split, *id);
                }
                debug!("{} split off {} ({} members)", split, gid, component.len());
            }
        }

        if self.group_ref(gid).is_empty() {
            self.groups.remove(&gid);
            debug!("{} deregistered (empty)", gid);
        }
    }

    /// Connected components among `members`, each starting with its lowest id
    fn components_of(&self, members: &[EntityId]) -> Vec<Vec<EntityId>> {
        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut components = Vec::new();

        for &start in members {
            if !seen.insert(start) {
                continue;
            }

            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);

            while let Some(current) = queue.pop_front() {
                for key in self.entity_ref(current).edges() {
                    if let Some(next) = key.other(current) {
                        if seen.insert(next) {
                            component.push(next);
                            queue.push_back(next);
                        }
                    }
                }
            }

            components.push(component);
        }

        components
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(FieldError::UnknownEntity(id))
    }

    /// Look up by type and raw value (both normalized first)
    pub fn find_entity(&self, entity_type: &str, value: &str) -> Result<&Entity> {
        let entity_type = normalize_type(entity_type);
        let name = normalize_name(value);

        self.entity_index
            .get(&entity_type)
            .and_then(|by_name| by_name.get(&name))
            .and_then(|id| self.entities.get(id))
            .ok_or(FieldError::EntityNotFound { entity_type, name })
    }

    /// All entities in creation order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entities of one type, in creation order
    pub fn entities_by_type(&self, entity_type: &str) -> Vec<&Entity> {
        let entity_type = normalize_type(entity_type);
        self.entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }

    /// Directly linked entities, in id order
    pub fn neighbours(&self, id: EntityId) -> Result<Vec<&Entity>> {
        let entity = self.entity(id)?;
        Ok(entity
            .edges()
            .filter_map(|key| key.other(id))
            .filter_map(|other| self.entities.get(&other))
            .collect())
    }

    pub fn edge(&self, a: EntityId, b: EntityId) -> Option<&Edge> {
        self.edges.get(&EdgeKey::new(a, b))
    }

    pub fn are_linked(&self, a: EntityId, b: EntityId) -> bool {
        a != b && self.edges.contains_key(&EdgeKey::new(a, b))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn group(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .get(&id)
            .ok_or_else(|| FieldError::GroupNotFound(id.to_string()))
    }

    /// Look up a group by its display name ("G-3")
    pub fn group_by_name(&self, name: &str) -> Result<&Group> {
        let id: GroupId = name
            .parse()
            .map_err(|_| FieldError::GroupNotFound(name.to_string()))?;
        self.group(id)
    }

    /// The group an entity belongs to, if any
    pub fn group_of(&self, id: EntityId) -> Result<Option<&Group>> {
        let entity = self.entity(id)?;
        Ok(entity.group().and_then(|gid| self.groups.get(&gid)))
    }

    /// All groups in id order
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn entity_types(&self) -> &[String] {
        &self.entity_types
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Entities ever created in this field (removals do not decrease it)
    pub fn entities_created(&self) -> u64 {
        self.entity_counter
    }

    /// Groups ever created in this field (merges do not decrease it)
    pub fn groups_created(&self) -> u64 {
        self.group_counter
    }

    // ========================================================================
    // INVARIANT AUDIT
    // ========================================================================

    /// Walk every index and report the first inconsistency found
    pub fn audit(&self) -> Result<()> {
        let violation = |msg: String| Err(FieldError::Invariant(msg));

        for (gid, group) in &self.groups {
            if group.is_empty() {
                return violation(format!("{} is registered but empty", gid));
            }
            if !group.size_consistent() {
                return violation(format!("{} cached size {} is stale", gid, group.size()));
            }
            for member in group.members() {
                match self.entities.get(&member) {
                    None => return violation(format!("{} lists missing entity {}", gid, member)),
                    Some(entity) if entity.group() != Some(*gid) => {
                        return violation(format!(
                            "{} lists {} but it references {:?}",
                            gid,
                            member,
                            entity.group()
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        for (id, entity) in &self.entities {
            match entity.group() {
                Some(gid) => match self.groups.get(&gid) {
                    None => return violation(format!("{} references deregistered {}", id, gid)),
                    Some(group) if !group.contains(*id) => {
                        return violation(format!("{} references {} which does not list it", id, gid))
                    }
                    Some(_) if entity.is_single() => {
                        return violation(format!("{} is grouped but has no edges", id))
                    }
                    Some(_) => {}
                },
                None if !entity.is_single() => {
                    return violation(format!("{} has edges but no group", id))
                }
                None => {}
            }

            for key in entity.edges() {
                if !self.edges.contains_key(key) {
                    return violation(format!("{} holds dangling edge {}", id, key));
                }
            }

            let indexed = self
                .entity_index
                .get(&entity.entity_type)
                .and_then(|by_name| by_name.get(&entity.name));
            if indexed != Some(id) {
                return violation(format!("{} is not indexed as {}", id, entity.qualified_name()));
            }
        }

        for key in self.edges.keys() {
            let (a, b) = key.endpoints();
            let (ea, eb) = match (self.entities.get(&a), self.entities.get(&b)) {
                (Some(ea), Some(eb)) => (ea, eb),
                _ => return violation(format!("edge {} has a missing endpoint", key)),
            };
            if !ea.has_edge(key) || !eb.has_edge(key) {
                return violation(format!("edge {} is not referenced by both endpoints", key));
            }
            if ea.group() != eb.group() {
                return violation(format!("edge {} crosses groups", key));
            }
        }

        Ok(())
    }

    // ========================================================================
    // INTERNAL ACCESS (ids known to be live)
    // ========================================================================

    fn entity_ref(&self, id: EntityId) -> &Entity {
        match self.entities.get(&id) {
            Some(entity) => entity,
            None => panic!("invariant violated: entity {} is not in this field", id),
        }
    }

    fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        match self.entities.get_mut(&id) {
            Some(entity) => entity,
            None => panic!("invariant violated: entity {} is not in this field", id),
        }
    }

    fn group_ref(&self, id: GroupId) -> &Group {
        match self.groups.get(&id) {
            Some(group) => group,
            None => panic!("invariant violated: group {} used after deregistration", id),
        }
    }

    fn group_mut(&mut self, id: GroupId) -> &mut Group {
        match self.groups.get_mut(&id) {
            Some(group) => group,
            None => panic!("invariant violated: group {} used after deregistration", id),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// (PERSON=Alice, CITY=Rome), (PERSON=Bob, CITY=Rome), (PERSON=Carol, CITY=Milan)
    fn people_and_cities() -> (Field, [EntityId; 5]) {
        let mut field = Field::new();
        let alice = field.resolve("Person", "Alice").unwrap();
        let rome = field.resolve("City", "Rome").unwrap();
        field.link(alice, rome).unwrap();
        let bob = field.resolve("Person", "Bob").unwrap();
        let rome_again = field.resolve("City", "Rome").unwrap();
        field.link(bob, rome_again).unwrap();
        let carol = field.resolve("Person", "Carol").unwrap();
        let milan = field.resolve("City", "Milan").unwrap();
        field.link(carol, milan).unwrap();
        (field, [alice, rome, bob, carol, milan])
    }

    /// Star around `hub` with `spokes` leaves: a group of spokes + 1
    fn star(field: &mut Field, hub: &str, spokes: usize) -> (EntityId, GroupId) {
        let center = field.resolve("HUB", hub).unwrap();
        for i in 0..spokes {
            let leaf = field.resolve("LEAF", &format!("{}-{}", hub, i)).unwrap();
            field.link(leaf, center).unwrap();
        }
        let gid = field.entity(center).unwrap().group().unwrap();
        (center, gid)
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut field = Field::new();

        let one = field.resolve("City", "Rome").unwrap();
        let two = field.resolve(" city ", "  ROME ").unwrap();
        let other = field.resolve("Person", "Rome").unwrap();

        assert_eq!(one, two);
        assert_ne!(one, other);
        assert_eq!(field.entity_count(), 2);
        assert_eq!(field.entities_created(), 2);
        assert_eq!(field.entity(one).unwrap().value, "Rome");
    }

    #[test]
    fn test_resolve_keeps_first_raw_value() {
        let mut field = Field::new();

        let padded = field.resolve("City", "  New   York ").unwrap();
        let plain = field.resolve("City", "new york").unwrap();

        assert_eq!(padded, plain);
        assert_eq!(field.entity(padded).unwrap().value, "  New   York ");
        assert_eq!(field.entity(padded).unwrap().name, "new_york");
    }

    #[test]
    fn test_resolve_collapses_inner_whitespace() {
        let mut field = Field::new();

        let one = field.resolve("Street", "Via  Roma").unwrap();
        let two = field.resolve("street", "via roma").unwrap();

        assert_eq!(one, two);
        assert_eq!(field.entity(one).unwrap().name, "via_roma");
    }

    #[test]
    fn test_resolve_rejects_empty_value() {
        let mut field = Field::new();

        let err = field.resolve("City", "   ").unwrap_err();
        assert!(err.is_schema());
        assert_eq!(field.entity_count(), 0);
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut field = Field::new();
        let a = field.resolve("A", "one").unwrap();
        let b = field.resolve("B", "two").unwrap();

        let first = field.link(a, b).unwrap();
        let group = field.entity(a).unwrap().group();
        let second = field.link(b, a).unwrap();

        assert!(first.is_new_edge());
        assert_eq!(second, LinkOutcome::AlreadyLinked);
        assert_eq!(field.edge_count(), 1);
        assert_eq!(field.entity(a).unwrap().group(), group);
        assert_eq!(field.group_count(), 1);
    }

    #[test]
    fn test_self_link_is_noop() {
        let mut field = Field::new();
        let a = field.resolve("A", "one").unwrap();

        assert_eq!(field.link(a, a).unwrap(), LinkOutcome::SelfLink);
        assert_eq!(field.edge_count(), 0);
        assert_eq!(field.entity(a).unwrap().group(), None);
    }

    #[test]
    fn test_link_unknown_entity() {
        let mut field = Field::new();
        let a = field.resolve("A", "one").unwrap();

        let err = field.link(a, EntityId(99)).unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn test_reconcile_cases() {
        let mut field = Field::new();
        let a = field.resolve("T", "a").unwrap();
        let b = field.resolve("T", "b").unwrap();
        let c = field.resolve("T", "c").unwrap();
        let d = field.resolve("T", "d").unwrap();

        let created = field.link(a, b).unwrap().group_change().unwrap();
        assert_eq!(created, GroupChange::Created(GroupId(0)));

        // only the second endpoint is grouped
        let joined = field.link(c, a).unwrap().group_change().unwrap();
        assert_eq!(joined, GroupChange::Joined(GroupId(0)));

        // only the first endpoint is grouped
        let joined = field.link(b, d).unwrap().group_change().unwrap();
        assert_eq!(joined, GroupChange::Joined(GroupId(0)));

        // same group
        let same = field.link(c, d).unwrap().group_change().unwrap();
        assert_eq!(same, GroupChange::Unchanged(GroupId(0)));

        assert_eq!(field.group(GroupId(0)).unwrap().size(), 4);
        field.audit().unwrap();
    }

    #[test]
    fn test_example_scenario() {
        let (field, [alice, rome, bob, carol, milan]) = people_and_cities();

        assert_eq!(field.entity_count(), 5);
        assert_eq!(field.edge_count(), 3);
        assert_eq!(field.group_count(), 2);

        let big = field.group_of(alice).unwrap().unwrap();
        assert_eq!(big.size(), 3);
        assert!(big.contains(rome) && big.contains(bob));

        let small = field.group_of(carol).unwrap().unwrap();
        assert_eq!(small.size(), 2);
        assert!(small.contains(milan));

        field.audit().unwrap();
    }

    #[test]
    fn test_link_across_groups_merges() {
        let (mut field, [alice, _, bob, carol, _]) = people_and_cities();
        let big = field.entity(bob).unwrap().group().unwrap();
        let small = field.entity(carol).unwrap().group().unwrap();

        let outcome = field.link(carol, bob).unwrap();

        assert_eq!(
            outcome.group_change(),
            Some(GroupChange::Merged { winner: big, absorbed: small })
        );
        assert_eq!(field.group_count(), 1);
        assert_eq!(field.group(big).unwrap().size(), 5);
        assert_eq!(field.edge_count(), 4);
        assert_eq!(field.entity_count(), 5);
        assert_eq!(field.entity(alice).unwrap().group(), Some(big));
        assert!(field.group(small).is_err());
        field.audit().unwrap();
    }

    #[test]
    fn test_larger_group_wins_merge() {
        let mut field = Field::new();
        let (five_hub, five) = star(&mut field, "five", 4);
        let (three_hub, three) = star(&mut field, "three", 2);
        assert_eq!(field.group(five).unwrap().size(), 5);
        assert_eq!(field.group(three).unwrap().size(), 3);

        // smaller side named first: the larger group still wins
        field.link(three_hub, five_hub).unwrap();

        assert_eq!(field.group(five).unwrap().size(), 8);
        assert!(matches!(
            field.group(three),
            Err(FieldError::GroupNotFound(_))
        ));
        assert!(field.group_by_name(&three.to_string()).is_err());
        field.audit().unwrap();
    }

    #[test]
    fn test_tie_first_named_group_wins() {
        let mut field = Field::new();
        let (left_hub, left) = star(&mut field, "left", 1);
        let (right_hub, right) = star(&mut field, "right", 1);

        let outcome = field.link(right_hub, left_hub).unwrap();

        assert_eq!(
            outcome.group_change(),
            Some(GroupChange::Merged { winner: right, absorbed: left })
        );
        assert_eq!(field.group(right).unwrap().size(), 4);
    }

    #[test]
    fn test_group_ids_never_reused() {
        let mut field = Field::new();
        let (a, _) = star(&mut field, "a", 1);
        let (b, _) = star(&mut field, "b", 1);
        field.link(a, b).unwrap();

        let (_, next) = star(&mut field, "c", 1);

        assert_eq!(next, GroupId(2));
        assert_eq!(field.groups_created(), 3);
        assert_eq!(field.group_count(), 2);
    }

    #[test]
    fn test_unlink_splits_group() {
        let mut field = Field::new();
        let a = field.resolve("T", "a").unwrap();
        let b = field.resolve("T", "b").unwrap();
        let c = field.resolve("T", "c").unwrap();
        let d = field.resolve("T", "d").unwrap();
        let e = field.resolve("T", "e").unwrap();
        // a - b - c   and   c - d - e  joined at c
        field.link(a, b).unwrap();
        field.link(b, c).unwrap();
        field.link(c, d).unwrap();
        field.link(d, e).unwrap();
        let original = field.entity(a).unwrap().group().unwrap();

        assert!(field.unlink(b, c).unwrap());

        // {c, d, e} is larger and keeps the id; {a, b} moves to a fresh group
        assert_eq!(field.entity(c).unwrap().group(), Some(original));
        let split = field.entity(a).unwrap().group().unwrap();
        assert_ne!(split, original);
        assert_eq!(field.entity(b).unwrap().group(), Some(split));
        assert_eq!(field.group(original).unwrap().size(), 3);
        assert_eq!(field.group(split).unwrap().size(), 2);
        field.audit().unwrap();

        assert!(!field.unlink(b, c).unwrap());
    }

    #[test]
    fn test_unlink_last_edge_deregisters_group() {
        let mut field = Field::new();
        let a = field.resolve("T", "a").unwrap();
        let b = field.resolve("T", "b").unwrap();
        field.link(a, b).unwrap();
        let gid = field.entity(a).unwrap().group().unwrap();

        field.unlink(a, b).unwrap();

        assert!(field.group(gid).is_err());
        assert_eq!(field.entity(a).unwrap().group(), None);
        assert_eq!(field.entity(b).unwrap().group(), None);
        field.audit().unwrap();
    }

    #[test]
    fn test_remove_entity_detaches_edges() {
        let (mut field, [alice, rome, bob, _, _]) = people_and_cities();
        let gid = field.entity(rome).unwrap().group().unwrap();

        let removed = field.remove_entity(rome).unwrap();

        assert_eq!(removed.value, "Rome");
        assert_eq!(field.edge_count(), 1);
        assert!(field.entity(alice).unwrap().is_single());
        assert!(field.entity(bob).unwrap().is_single());
        assert_eq!(field.entity(alice).unwrap().group(), None);
        // Nothing left with an edge: the group is gone
        assert!(field.group(gid).is_err());
        assert!(field.find_entity("City", "rome").is_err());
        field.audit().unwrap();

        // Re-resolving creates a brand-new entity
        let rome_again = field.resolve("City", "Rome").unwrap();
        assert_ne!(rome_again, rome);
    }

    #[test]
    fn test_remove_unknown_entity() {
        let mut field = Field::new();
        assert!(field.remove_entity(EntityId(0)).unwrap_err().is_lookup());
    }

    #[test]
    fn test_remove_singles() {
        let (mut field, _) = people_and_cities();
        field.resolve("Person", "Dave").unwrap();
        field.resolve("City", "Turin").unwrap();

        assert_eq!(field.remove_singles(), 2);
        assert_eq!(field.entity_count(), 5);
        assert!(field.find_entity("Person", "dave").is_err());
        field.audit().unwrap();
    }

    #[test]
    fn test_remove_groups_by_size() {
        let (mut field, [alice, _, _, carol, _]) = people_and_cities();

        assert_eq!(field.remove_groups_by_size(2), 1);

        assert_eq!(field.group_count(), 1);
        assert_eq!(field.entity_count(), 3);
        assert_eq!(field.edge_count(), 2);
        assert!(field.entity(carol).is_err());
        assert!(field.entity(alice).is_ok());
        field.audit().unwrap();
    }

    #[test]
    fn test_lookups() {
        let (field, [alice, rome, bob, _, _]) = people_and_cities();

        assert_eq!(field.find_entity("person", " ALICE").unwrap().id, alice);
        assert!(field.find_entity("Person", "Zoe").unwrap_err().is_lookup());

        let neighbours: Vec<EntityId> = field.neighbours(rome).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(neighbours, vec![alice, bob]);

        assert!(field.are_linked(alice, rome));
        assert!(!field.are_linked(alice, bob));
        assert_eq!(
            field.edge(rome, alice).unwrap().label,
            "CITY:rome -- PERSON:alice"
        );

        assert_eq!(field.group_by_name("G-0").unwrap().size(), 3);
        assert!(field.group_by_name("G-7").unwrap_err().is_lookup());
        assert!(field.group_by_name("nonsense").unwrap_err().is_lookup());
        assert_eq!(field.entity_types(), &["PERSON".to_string(), "CITY".to_string()]);
        assert_eq!(field.entities_by_type("city").len(), 2);
    }

    #[test]
    fn test_link_values() {
        let mut field = Field::new();

        let outcome = field.link_values("Person", "Alice", "City", "Rome").unwrap();

        assert!(outcome.is_new_edge());
        assert_eq!(field.entity_count(), 2);
        assert_eq!(
            field.link_values("person", "alice", "city", "ROME").unwrap(),
            LinkOutcome::AlreadyLinked
        );
    }

    // ========================================================================
    // AUDIT ON CORRUPTED FIELDS
    // ========================================================================

    fn assert_violation(field: &Field, needle: &str) {
        let err = field.audit().unwrap_err();
        assert!(err.is_invariant(), "unexpected error kind: {}", err);
        assert!(err.to_string().contains(needle), "{}", err);
    }

    #[test]
    fn test_audit_accepts_sound_field() {
        let (field, _) = people_and_cities();
        field.audit().unwrap();
    }

    #[test]
    fn test_audit_entity_in_deregistered_group() {
        let (mut field, _) = people_and_cities();

        field.groups.remove(&GroupId(1));

        assert_violation(&field, "references deregistered G-1");
    }

    #[test]
    fn test_audit_member_with_other_back_reference() {
        let (mut field, [_, _, _, carol, _]) = people_and_cities();

        field.entity_mut(carol).set_group(Some(GroupId(0)));

        assert_violation(&field, "G-1 lists E-3 but it references");
    }

    #[test]
    fn test_audit_empty_registered_group() {
        let (mut field, _) = people_and_cities();

        field.groups.insert(GroupId(9), Group::new(GroupId(9)));

        assert_violation(&field, "G-9 is registered but empty");
    }

    #[test]
    fn test_audit_stale_group_size() {
        let (mut field, _) = people_and_cities();

        field.group_mut(GroupId(0)).set_cached_size(5);

        assert_violation(&field, "G-0 cached size 5 is stale");
    }

    #[test]
    fn test_audit_edge_with_missing_endpoint() {
        let (mut field, [_, _, _, carol, _]) = people_and_cities();

        let key = EdgeKey::new(carol, EntityId(99));
        field.edges.insert(
            key,
            Edge {
                key,
                label: "PERSON:carol -- GHOST:nobody".to_string(),
            },
        );

        assert_violation(&field, "has a missing endpoint");
    }

    #[test]
    fn test_audit_edge_across_groups() {
        let (mut field, [alice, _, _, carol, _]) = people_and_cities();

        let key = EdgeKey::new(alice, carol);
        let edge = Edge::new(field.entity_ref(alice), field.entity_ref(carol));
        field.edges.insert(key, edge);
        field.entity_mut(alice).attach_edge(key);
        field.entity_mut(carol).attach_edge(key);

        assert_violation(&field, "crosses groups");
    }

    #[test]
    #[should_panic(expected = "used after deregistration")]
    fn test_absorbed_group_is_gone() {
        let (mut field, [_, _, bob, carol, _]) = people_and_cities();
        field.link(carol, bob).unwrap();

        field.group_ref(GroupId(1));
    }
}
