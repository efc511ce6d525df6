//! Identifier newtypes shared across the storage core.
//!
//! Label, property, and edge-type names are interned by an external catalog;
//! this core only ever sees the resulting numeric ids and compares or stores
//! them. Gids are allocated by the store and are immutable after creation.

use serde::{Deserialize, Serialize};

/// Globally unique identifier of a graph element (vertex or edge).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gid(pub u64);

impl Gid {
    /// Returns the raw integer representation.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Interned vertex label id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u32);

/// Interned property key id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub u32);

/// Interned edge type id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeTypeId(pub u32);

/// Which kind of graph element a record refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// A vertex element.
    Vertex,
    /// An edge element.
    Edge,
}

/// One entry in a vertex adjacency list: the edge type, the neighboring
/// vertex, and the connecting edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyEntry {
    /// Type of the connecting edge.
    pub edge_type: EdgeTypeId,
    /// Gid of the vertex on the far side.
    pub vertex: Gid,
    /// Gid of the connecting edge element.
    pub edge: Gid,
}
