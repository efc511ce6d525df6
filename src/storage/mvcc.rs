//! Snapshot-isolation machinery: visibility replay and the write coordinator.
//!
//! Reads never block writers. A reader copies the element's current fields
//! and chain head under the element lock, releases the lock, then walks the
//! chain newest-first applying inverse actions until it reaches state that
//! was already committed at its snapshot time. Because chain entries are
//! immutable once linked and the head swap happens under the lock, the
//! copied head always leads to a consistent prefix.
//!
//! Writes go through a two-stage coordinator:
//!
//! 1. [`prepare_for_write`] performs the pure admission checks (write-write
//!    conflict, tombstone) with no side effects, so a rejected or no-op
//!    write leaves the element untouched.
//! 2. [`stamp_write`] computes the prior start-time for the new chain entry
//!    and, when the write is the transaction's first on top of foreign
//!    committed state, drives the consolidation cadence and the audit
//!    capture.
//!
//! Both stages, the chain append, and the in-place mutation all run under
//! one acquisition of the element lock.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::db::config::Config;
use crate::db::transaction::{ElementHandle, Transaction};
use crate::error::{GraphError, Result};
use crate::storage::anchor::churn_tick;
use crate::storage::delta::{DeltaAction, DeltaEntry, EdgeEndpoints, SlotState};
use crate::storage::edge::EdgeInner;
use crate::storage::property_value::PropertyMap;
use crate::storage::types::{ElementKind, Gid};
use crate::storage::vertex::VertexInner;

/// Which state of the element a read should observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    /// The element as of the transaction's snapshot, with the
    /// transaction's own pending writes undone as well.
    Old,
    /// The snapshot plus the transaction's own pending writes.
    New,
}

/// Identity of the element a write targets, for audit and anchor records.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ElementInfo {
    Vertex { gid: Gid },
    Edge { gid: Gid, endpoints: EdgeEndpoints },
}

impl ElementInfo {
    pub(crate) fn kind(&self) -> ElementKind {
        match self {
            ElementInfo::Vertex { .. } => ElementKind::Vertex,
            ElementInfo::Edge { .. } => ElementKind::Edge,
        }
    }

    pub(crate) fn gid(&self) -> Gid {
        match self {
            ElementInfo::Vertex { gid } | ElementInfo::Edge { gid, .. } => *gid,
        }
    }

    pub(crate) fn endpoints(&self) -> Option<EdgeEndpoints> {
        match self {
            ElementInfo::Vertex { .. } => None,
            ElementInfo::Edge { endpoints, .. } => Some(*endpoints),
        }
    }
}

/// Walks a version chain newest-first, handing each entry that must be
/// undone for this reader to `apply`.
///
/// The walk stops at the first entry whose slot holds a committed
/// start-time at or below the reader's snapshot, or at the reader's own
/// open entries under [`View::New`]. Everything before the stop point is
/// invisible to the reader and its inverse action must be applied.
pub(crate) fn apply_deltas_for_read<F>(
    txn: &Transaction<'_>,
    head: Option<Arc<DeltaEntry>>,
    view: View,
    mut apply: F,
) where
    F: FnMut(&DeltaEntry),
{
    let mut current = head;
    while let Some(entry) = current {
        match entry.slot.state() {
            SlotState::Committed(ts) if ts <= txn.snapshot_ts() => break,
            SlotState::Open(id) if id == txn.id() && view == View::New => break,
            _ => {}
        }
        apply(&entry);
        current = entry.next.clone();
    }
}

/// Admission checks for a write, with no side effects.
///
/// Fails with [`GraphError::SerializationConflict`] when the chain head is
/// held open by another transaction, and with [`GraphError::DeletedObject`]
/// when the element carries a tombstone. Callers run this before any
/// mutation so an error never leaves partial state behind.
pub(crate) fn prepare_for_write(
    txn: &Transaction<'_>,
    head: Option<&Arc<DeltaEntry>>,
    deleted: bool,
) -> Result<()> {
    if let Some(entry) = head {
        if let SlotState::Open(holder) = entry.slot.state() {
            if holder != txn.id() {
                debug!(
                    tx_id = txn.id(),
                    holder, "write rejected, element held by an open transaction"
                );
                return Err(GraphError::SerializationConflict);
            }
        }
    }
    if deleted {
        return Err(GraphError::DeletedObject);
    }
    Ok(())
}

/// Commit-side bookkeeping for an admitted write.
///
/// Returns the prior start-time to record on the new chain entry. When the
/// write lands on top of foreign committed state (a commit boundary) this
/// also advances the consolidation cadence, materializes an anchor when the
/// cadence fires, and captures an audit record. Repeat writes by the owning
/// transaction reuse the prior start-time of the existing head and skip all
/// bookkeeping.
///
/// `properties` must be the element's property mapping as it stands before
/// the mutation applies.
pub(crate) fn stamp_write(
    txn: &Transaction<'_>,
    config: &Config,
    info: &ElementInfo,
    head: Option<&Arc<DeltaEntry>>,
    transaction_st: u64,
    churn: &mut u32,
    properties: &PropertyMap,
) -> Result<u64> {
    let (prior_ts, boundary, first_touch) = match head {
        None => (transaction_st, false, true),
        Some(entry) => match entry.slot.state() {
            // Own open entry; prepare_for_write ruled out foreign holders.
            SlotState::Open(_) => (entry.prior_start_ts, false, false),
            SlotState::Committed(ts) => (ts, true, false),
        },
    };

    if boundary {
        if churn_tick(churn, config.anchor_churn_threshold) && config.anchor_enabled {
            trace!(gid = info.gid().as_u64(), consolidated_ts = prior_ts, "anchoring element");
            txn.record_anchor(info, prior_ts, properties.clone());
        }
        if config.audit_enabled {
            txn.record_audit(info, prior_ts, properties.clone())?;
        }
    } else if first_touch && config.audit_enabled && config.audit_first_touch {
        txn.record_audit(info, prior_ts, properties.clone())?;
    }

    Ok(prior_ts)
}

/// Builds a chain entry for `action`, registers it in the transaction's
/// delta log, then links it at the head.
///
/// Registration happens before linking so an out-of-memory failure leaves
/// the chain unchanged. Must run under the element lock.
pub(crate) fn create_and_link_delta(
    txn: &Transaction<'_>,
    handle: ElementHandle,
    head: &mut Option<Arc<DeltaEntry>>,
    action: DeltaAction,
    endpoints: Option<EdgeEndpoints>,
    prior_start_ts: u64,
) -> Result<()> {
    let entry = Arc::new(DeltaEntry {
        slot: txn.slot(),
        prior_start_ts,
        action,
        endpoints,
        next: head.clone(),
    });
    txn.record_delta(handle, entry.clone())?;
    *head = Some(entry);
    Ok(())
}

/// Applies one inverse action to a vertex's in-place state during abort.
pub(crate) fn undo_vertex_delta(inner: &mut VertexInner, action: &DeltaAction) {
    match action {
        DeltaAction::AddLabel(label) => {
            if !inner.labels.contains(label) {
                inner.labels.push(*label);
            }
        }
        DeltaAction::RemoveLabel(label) => inner.labels.retain(|l| l != label),
        DeltaAction::SetProperty { key, prior } => {
            if prior.is_null() {
                inner.properties.remove(key);
            } else {
                inner.properties.insert(*key, prior.clone());
            }
        }
        DeltaAction::AddInEdge(entry) => {
            if !inner.in_edges.contains(entry) {
                inner.in_edges.push(*entry);
            }
        }
        DeltaAction::AddOutEdge(entry) => {
            if !inner.out_edges.contains(entry) {
                inner.out_edges.push(*entry);
            }
        }
        DeltaAction::RemoveInEdge(entry) => inner.in_edges.retain(|e| e != entry),
        DeltaAction::RemoveOutEdge(entry) => inner.out_edges.retain(|e| e != entry),
        DeltaAction::RecreateObject => inner.deleted = false,
        DeltaAction::DeleteObject => inner.deleted = true,
    }
}

/// Applies one inverse action to an edge's in-place state during abort.
pub(crate) fn undo_edge_delta(inner: &mut EdgeInner, action: &DeltaAction) {
    match action {
        DeltaAction::SetProperty { key, prior } => {
            if prior.is_null() {
                inner.properties.remove(key);
            } else {
                inner.properties.insert(*key, prior.clone());
            }
        }
        DeltaAction::RecreateObject => inner.deleted = false,
        DeltaAction::DeleteObject => inner.deleted = true,
        // Label and adjacency actions are never logged on edge elements.
        other => debug_assert!(false, "invalid edge delta action: {other:?}"),
    }
}
