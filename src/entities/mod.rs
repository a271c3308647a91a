// Entity Models
//
// The field's graph is made of three kinds of objects:
// - Entity: typed, named node (identity = type + normalized name)
// - Edge:   unordered link between two entities
// - Group:  connected cluster of entities
//
// All three refer to each other by id only. The Field owns them.

pub mod entity;
pub mod edge;
pub mod group;

pub use entity::{Entity, EntityId};
pub use edge::{Edge, EdgeKey, EDGE_SEPARATOR};
pub use group::{Group, GroupId};
