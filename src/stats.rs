// 📊 Field statistics - computed on demand, never maintained incrementally
//
// links_by_type() visits each edge once and books it under both orderings of
// its endpoint types, so "from PERSON, how many links to CITY" and "from CITY,
// how many links to PERSON" are both direct lookups. Edges between two
// entities of the same type are not cross-type links and are left out.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::entities::Group;
use crate::field::Field;

/// Default number of groups listed by reports
pub const DEFAULT_GROUP_LIMIT: usize = 10;

/// Display values shown per group in summaries
const GROUP_SAMPLE_SIZE: usize = 5;

// ============================================================================
// CROSS-TYPE LINKS
// ============================================================================

/// Links from entities of one type to entities of another type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeLinks {
    /// Number of links
    pub links: usize,

    /// Target name → how many times it was reached
    pub targets: BTreeMap<String, usize>,
}

impl TypeLinks {
    pub fn distinct_targets(&self) -> usize {
        self.targets.len()
    }

    fn record(&mut self, target: &str) {
        self.links += 1;
        *self.targets.entry(target.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkStats {
    /// from type → to type → links
    pub by_type: BTreeMap<String, BTreeMap<String, TypeLinks>>,
}

impl LinkStats {
    pub fn get(&self, from_type: &str, to_type: &str) -> Option<&TypeLinks> {
        self.by_type.get(from_type).and_then(|to| to.get(to_type))
    }

    /// Every (from, to, links) triple, sorted by type names
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, &TypeLinks)> {
        self.by_type.iter().flat_map(|(from, to)| {
            to.iter()
                .map(move |(to_type, links)| (from.as_str(), to_type.as_str(), links))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

// ============================================================================
// SUMMARIES
// ============================================================================

/// Per-type roll-up of LinkStats
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSummary {
    pub entity_type: String,
    pub entities: usize,
    /// Cross-type links starting from this type
    pub link_total: usize,
    /// Number of other types linked to
    pub link_types: usize,
    /// Distinct entities reached, over all linked types
    pub distinct_targets: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub size: usize,
    /// Entity type → members of that type
    pub types: BTreeMap<String, usize>,
    /// A few member display values, in creation order
    pub sample: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStats {
    pub entities: usize,
    pub edges: usize,
    pub groups: usize,
    /// Entities not linked to anything
    pub ungrouped: usize,
    pub largest_group: usize,
    pub entities_created: u64,
    pub groups_created: u64,
    pub entity_types: Vec<String>,
}

// ============================================================================
// FIELD REPORTING
// ============================================================================

impl Field {
    /// Cross-type link counts, both directions
    pub fn links_by_type(&self) -> LinkStats {
        let mut stats = LinkStats::default();

        for edge in self.edges() {
            let (a, b) = edge.endpoints();
            let (a, b) = match (self.entity(a), self.entity(b)) {
                (Ok(a), Ok(b)) => (a, b),
                _ => continue,
            };
            if a.entity_type == b.entity_type {
                continue;
            }

            for (from, to) in [(a, b), (b, a)] {
                stats
                    .by_type
                    .entry(from.entity_type.clone())
                    .or_default()
                    .entry(to.entity_type.clone())
                    .or_default()
                    .record(&to.name);
            }
        }

        stats
    }

    /// One summary per known type, in first-seen order
    pub fn type_summaries(&self) -> Vec<TypeSummary> {
        let links = self.links_by_type();

        self.entity_types()
            .iter()
            .map(|entity_type| {
                let to = links.by_type.get(entity_type);
                TypeSummary {
                    entity_type: entity_type.clone(),
                    entities: self.entities_by_type(entity_type).len(),
                    link_total: to.map(|to| to.values().map(|l| l.links).sum()).unwrap_or(0),
                    link_types: to.map(|to| to.len()).unwrap_or(0),
                    distinct_targets: to
                        .map(|to| to.values().map(|l| l.distinct_targets()).sum())
                        .unwrap_or(0),
                }
            })
            .collect()
    }

    /// Type with the most cross-type links (first seen wins ties)
    pub fn most_linked_type(&self) -> Option<String> {
        let mut best: Option<TypeSummary> = None;
        for summary in self.type_summaries() {
            if summary.link_total == 0 {
                continue;
            }
            match &best {
                Some(current) if current.link_total >= summary.link_total => {}
                _ => best = Some(summary),
            }
        }
        best.map(|s| s.entity_type)
    }

    /// Largest groups first (ties by id), at most `limit`
    pub fn list_groups(&self, limit: usize) -> Vec<GroupSummary> {
        let mut groups: Vec<&Group> = self.groups().collect();
        groups.sort_by(|a, b| b.size().cmp(&a.size()).then(a.id.cmp(&b.id)));

        groups
            .into_iter()
            .take(limit)
            .map(|group| self.group_summary(group))
            .collect()
    }

    pub fn group_summary(&self, group: &Group) -> GroupSummary {
        let mut types: BTreeMap<String, usize> = BTreeMap::new();
        let mut sample = Vec::new();

        for id in group.members() {
            if let Ok(entity) = self.entity(id) {
                *types.entry(entity.entity_type.clone()).or_insert(0) += 1;
                if sample.len() < GROUP_SAMPLE_SIZE {
                    sample.push(entity.value.clone());
                }
            }
        }

        GroupSummary {
            name: group.name(),
            size: group.size(),
            types,
            sample,
        }
    }

    pub fn stats(&self) -> FieldStats {
        FieldStats {
            entities: self.entity_count(),
            edges: self.edge_count(),
            groups: self.group_count(),
            ungrouped: self.entities().filter(|e| e.group().is_none()).count(),
            largest_group: self.groups().map(|g| g.size()).max().unwrap_or(0),
            entities_created: self.entities_created(),
            groups_created: self.groups_created(),
            entity_types: self.entity_types().to_vec(),
        }
    }
}
