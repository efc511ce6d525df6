//! Transaction lifecycle: begin, buffered write tracking, commit, rollback.
//!
//! A transaction owns one shared [`TimestampSlot`] and a delta log of every
//! chain entry it created. Commit allocates a start-time (only if the
//! transaction wrote anything), refreshes `transaction_st` on every touched
//! element, then publishes the slot once; that single store flips every
//! entry of the transaction from open to committed atomically. Rollback
//! walks the delta log in reverse, undoing each entry's in-place effect and
//! popping it off its chain.
//!
//! Dropping an active transaction rolls it back.

use std::collections::HashSet;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::db::graph::GraphStore;
use crate::error::{GraphError, Result};
use crate::storage::anchor::AnchorMap;
use crate::storage::audit::AuditRecord;
use crate::storage::delta::{DeltaAction, DeltaEntry, TimestampSlot, TxId};
use crate::storage::edge::Edge;
use crate::storage::mvcc::{undo_edge_delta, undo_vertex_delta, ElementInfo};
use crate::storage::property_value::PropertyMap;
use crate::storage::vertex::Vertex;

/// Lifecycle state of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxState {
    /// Accepting reads and writes.
    Active,
    /// Finished via [`Transaction::commit`].
    Committed,
    /// Finished via [`Transaction::rollback`] or by being dropped.
    RolledBack,
}

/// Keeps the written element alive for the abort walk and the commit-time
/// `transaction_st` refresh.
#[derive(Clone, Debug)]
pub(crate) enum ElementHandle {
    Vertex(Arc<Vertex>),
    Edge(Arc<Edge>),
}

#[derive(Default)]
struct TxBuffers {
    /// Every chain entry this transaction created, in append order.
    deltas: Vec<(ElementHandle, Arc<DeltaEntry>)>,
    audit: Vec<AuditRecord>,
    vertex_anchors: AnchorMap,
    edge_anchors: AnchorMap,
}

/// Everything a commit hands back to the caller.
#[derive(Debug)]
pub struct CommitReceipt {
    /// Start-time the writes became visible at; `None` for a read-only
    /// transaction, which consumes no timestamp.
    pub start_ts: Option<u64>,
    /// Audit records in the order the writes happened.
    pub audit: Vec<AuditRecord>,
    /// Vertex anchors materialized by this transaction.
    pub vertex_anchors: AnchorMap,
    /// Edge anchors materialized by this transaction.
    pub edge_anchors: AnchorMap,
}

/// An open unit of work against a [`GraphStore`].
pub struct Transaction<'db> {
    store: &'db GraphStore,
    id: TxId,
    snapshot_ts: u64,
    slot: Arc<TimestampSlot>,
    command_id: AtomicU32,
    state: TxState,
    buffers: Mutex<TxBuffers>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(store: &'db GraphStore, id: TxId, snapshot_ts: u64) -> Self {
        debug!(tx_id = id, snapshot_ts, "transaction started");
        Self {
            store,
            id,
            snapshot_ts,
            slot: Arc::new(TimestampSlot::open(id)),
            command_id: AtomicU32::new(0),
            state: TxState::Active,
            buffers: Mutex::new(TxBuffers::default()),
        }
    }

    /// This transaction's id.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Snapshot boundary: committed state with a start-time at or below
    /// this is visible.
    pub fn snapshot_ts(&self) -> u64 {
        self.snapshot_ts
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Intra-transaction command counter, advanced by each write.
    pub fn command_id(&self) -> u32 {
        self.command_id.load(Ordering::Relaxed)
    }

    pub(crate) fn advance_command(&self) {
        self.command_id.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn store(&self) -> &'db GraphStore {
        self.store
    }

    pub(crate) fn slot(&self) -> Arc<TimestampSlot> {
        self.slot.clone()
    }

    /// Appends to the delta log, surfacing allocation failure instead of
    /// aborting the process.
    pub(crate) fn record_delta(
        &self,
        handle: ElementHandle,
        entry: Arc<DeltaEntry>,
    ) -> Result<()> {
        let mut buffers = self.buffers.lock();
        buffers
            .deltas
            .try_reserve(1)
            .map_err(|e| GraphError::OutOfMemory(e.to_string()))?;
        buffers.deltas.push((handle, entry));
        Ok(())
    }

    pub(crate) fn record_audit(
        &self,
        info: &ElementInfo,
        prior_start_ts: u64,
        properties: PropertyMap,
    ) -> Result<()> {
        let mut buffers = self.buffers.lock();
        buffers
            .audit
            .try_reserve(1)
            .map_err(|e| GraphError::OutOfMemory(e.to_string()))?;
        buffers.audit.push(AuditRecord {
            kind: info.kind(),
            gid: info.gid(),
            endpoints: info.endpoints(),
            prior_start_ts,
            properties,
        });
        Ok(())
    }

    pub(crate) fn record_anchor(
        &self,
        info: &ElementInfo,
        consolidated_ts: u64,
        properties: PropertyMap,
    ) {
        let mut buffers = self.buffers.lock();
        let key = (info.gid(), consolidated_ts);
        match info {
            ElementInfo::Vertex { .. } => buffers.vertex_anchors.insert(key, properties),
            ElementInfo::Edge { .. } => buffers.edge_anchors.insert(key, properties),
        };
    }

    /// Makes every buffered write visible atomically.
    ///
    /// A read-only transaction commits without consuming a start-time.
    pub fn commit(mut self) -> Result<CommitReceipt> {
        if self.state != TxState::Active {
            return Err(GraphError::InvalidArgument(
                "transaction already finished".into(),
            ));
        }
        let buffers = mem::take(self.buffers.get_mut());

        let start_ts = if buffers.deltas.is_empty() {
            None
        } else {
            // The store-wide commit lock is held from the start-time
            // allocation through the slot publish. Snapshots are allocated
            // under the same lock, so no transaction can begin with a
            // snapshot above this start-time yet still observe the slot
            // open.
            let _publish = self.store.commit_lock().lock();
            let ts = self.store.oracle().allocate_start_timestamp();
            // Refresh transaction_st on each touched element before the
            // slot flips, so observers that see the commit also see the
            // element-level stamp.
            let mut seen: HashSet<u64> = HashSet::new();
            for (handle, _) in &buffers.deltas {
                match handle {
                    ElementHandle::Vertex(vertex) => {
                        if seen.insert(vertex.gid.as_u64()) {
                            vertex.inner.lock().transaction_st = ts;
                        }
                    }
                    ElementHandle::Edge(edge) => {
                        if seen.insert(edge.gid.as_u64()) {
                            edge.inner.lock().transaction_st = ts;
                        }
                    }
                }
            }
            self.slot.publish(ts);
            Some(ts)
        };

        self.state = TxState::Committed;
        debug!(
            tx_id = self.id,
            start_ts,
            deltas = buffers.deltas.len(),
            audit = buffers.audit.len(),
            "transaction committed"
        );
        Ok(CommitReceipt {
            start_ts,
            audit: buffers.audit,
            vertex_anchors: buffers.vertex_anchors,
            edge_anchors: buffers.edge_anchors,
        })
    }

    /// Undoes every buffered write and discards the audit and anchor
    /// buffers.
    pub fn rollback(mut self) {
        self.rollback_inner();
    }

    fn rollback_inner(&mut self) {
        let buffers = mem::take(self.buffers.get_mut());
        let count = buffers.deltas.len();
        for (handle, entry) in buffers.deltas.into_iter().rev() {
            let undone_creation = matches!(entry.action, DeltaAction::DeleteObject);
            match handle {
                ElementHandle::Vertex(vertex) => {
                    let mut inner = vertex.inner.lock();
                    debug_assert!(inner
                        .delta
                        .as_ref()
                        .is_some_and(|head| Arc::ptr_eq(head, &entry)));
                    undo_vertex_delta(&mut inner, &entry.action);
                    inner.delta = entry.next.clone();
                    drop(inner);
                    if undone_creation {
                        self.store.drop_vertex(vertex.gid);
                    }
                }
                ElementHandle::Edge(edge) => {
                    let mut inner = edge.inner.lock();
                    debug_assert!(inner
                        .delta
                        .as_ref()
                        .is_some_and(|head| Arc::ptr_eq(head, &entry)));
                    undo_edge_delta(&mut inner, &entry.action);
                    inner.delta = entry.next.clone();
                    drop(inner);
                    if undone_creation {
                        self.store.drop_edge(edge.gid);
                    }
                }
            }
        }
        self.state = TxState::RolledBack;
        debug!(tx_id = self.id, deltas = count, "transaction rolled back");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            debug!(tx_id = self.id, "active transaction dropped, rolling back");
            self.rollback_inner();
        }
    }
}
