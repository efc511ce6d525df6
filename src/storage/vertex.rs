//! The vertex element: current fields plus the head of its version chain.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::delta::DeltaEntry;
use crate::storage::property_value::PropertyMap;
use crate::storage::types::{AdjacencyEntry, Gid, LabelId};

/// A vertex owned by the store for the lifetime of the database.
///
/// All mutable state lives behind the per-element lock. Writers hold the
/// lock for the full check-append-mutate critical section; readers hold it
/// only long enough to copy the fields and the chain head, then replay the
/// chain lock-free.
#[derive(Debug)]
pub struct Vertex {
    /// Immutable identity.
    pub gid: Gid,
    /// Lock-guarded mutable state.
    pub inner: Mutex<VertexInner>,
}

/// Mutable vertex state, guarded by the element lock.
#[derive(Debug, Default)]
pub struct VertexInner {
    /// Current labels.
    pub labels: Vec<LabelId>,
    /// Current property mapping.
    pub properties: PropertyMap,
    /// Incoming adjacency, in insertion order.
    pub in_edges: Vec<AdjacencyEntry>,
    /// Outgoing adjacency, in insertion order.
    pub out_edges: Vec<AdjacencyEntry>,
    /// Tombstone flag.
    pub deleted: bool,
    /// Head of the version chain; `None` if untouched since consolidation.
    pub delta: Option<Arc<DeltaEntry>>,
    /// Start-time of the last transaction that fully committed a change.
    pub transaction_st: u64,
    /// Churn counter driving consolidation cadence.
    pub churn: u32,
}

impl Vertex {
    /// Creates a bare vertex with no history.
    pub fn new(gid: Gid) -> Self {
        Self {
            gid,
            inner: Mutex::new(VertexInner::default()),
        }
    }
}
