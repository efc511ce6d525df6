//! The edge element: current fields plus the head of its version chain.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::delta::DeltaEntry;
use crate::storage::property_value::PropertyMap;
use crate::storage::types::{EdgeTypeId, Gid};

/// An edge owned by the store for the lifetime of the database.
///
/// Endpoint identities and the edge type are immutable after creation; the
/// rest lives behind the per-element lock like [`Vertex`](crate::storage::Vertex).
#[derive(Debug)]
pub struct Edge {
    /// Immutable identity.
    pub gid: Gid,
    /// Origin vertex.
    pub from: Gid,
    /// Destination vertex.
    pub to: Gid,
    /// Interned edge type.
    pub edge_type: EdgeTypeId,
    /// Lock-guarded mutable state.
    pub inner: Mutex<EdgeInner>,
}

/// Mutable edge state, guarded by the element lock.
#[derive(Debug, Default)]
pub struct EdgeInner {
    /// Current property mapping.
    pub properties: PropertyMap,
    /// Tombstone flag.
    pub deleted: bool,
    /// Head of the version chain; `None` if untouched since consolidation.
    pub delta: Option<Arc<DeltaEntry>>,
    /// Start-time of the last transaction that fully committed a change.
    pub transaction_st: u64,
    /// Churn counter driving consolidation cadence.
    pub churn: u32,
}

impl Edge {
    /// Creates a bare edge with no history.
    pub fn new(gid: Gid, from: Gid, to: Gid, edge_type: EdgeTypeId) -> Self {
        Self {
            gid,
            from,
            to,
            edge_type,
            inner: Mutex::new(EdgeInner::default()),
        }
    }
}
