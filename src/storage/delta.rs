//! Delta log entries: the units of the per-element undo log.
//!
//! Every mutation appends one [`DeltaEntry`] to the element's version chain
//! before the in-place field is changed. The entry stores the *inverse* of
//! the change, so replaying entries newest-first reconstructs older states
//! of the element.
//!
//! # Chain Structure
//!
//! ```text
//! element.delta ──► [newest entry] ──next──► [older] ──next──► ... ──► None
//! ```
//!
//! Entries are linked at the head under the element lock and are immutable
//! once linked, with a single exception: the shared [`TimestampSlot`], which
//! is rewritten exactly once when the owning transaction commits. That
//! rewrite is the sole cross-thread signal separating "still open" from
//! "committed" state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::property_value::PropertyValue;
use crate::storage::types::{AdjacencyEntry, EdgeTypeId, Gid, LabelId, PropertyId};

/// Transaction identifier. Always `>= TX_INITIAL_ID`.
pub type TxId = u64;

/// Lowest value the oracle hands out as a transaction id.
///
/// Timestamp slots hold either a transaction id (sentinel range, entry still
/// open) or a real start-time (below this threshold, entry committed). The
/// comparison lives in exactly one place: [`TimestampSlot::state`].
pub const TX_INITIAL_ID: u64 = 1 << 63;

/// The atomically-published timestamp slot shared by every delta of one
/// transaction.
///
/// Initialized to the owning transaction's id; overwritten with the
/// transaction's start-time at commit. The store uses release ordering and
/// the load acquire ordering, so a reader either sees the pre-commit
/// sentinel or the fully-written post-commit timestamp, never a torn value.
#[derive(Debug)]
pub struct TimestampSlot(AtomicU64);

/// Tagged read of a [`TimestampSlot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// The owning transaction has not committed; holds its id.
    Open(TxId),
    /// The owning transaction committed at this start-time.
    Committed(u64),
}

impl TimestampSlot {
    /// Creates a slot in the open state for the given transaction.
    pub fn open(tx_id: TxId) -> Self {
        debug_assert!(tx_id >= TX_INITIAL_ID, "transaction id below sentinel range");
        Self(AtomicU64::new(tx_id))
    }

    /// Reads the slot with acquire ordering.
    pub fn state(&self) -> SlotState {
        let raw = self.0.load(Ordering::Acquire);
        if raw >= TX_INITIAL_ID {
            SlotState::Open(raw)
        } else {
            SlotState::Committed(raw)
        }
    }

    /// Publishes the commit start-time with release ordering.
    ///
    /// All transactions starting after this store observe the committed
    /// state on every entry sharing this slot.
    pub fn publish(&self, start_ts: u64) {
        debug_assert!(start_ts < TX_INITIAL_ID, "start-time in sentinel range");
        self.0.store(start_ts, Ordering::Release);
    }
}

/// Endpoint identities carried by edge-element deltas for audit replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEndpoints {
    /// Origin vertex of the edge.
    pub from: Gid,
    /// Destination vertex of the edge.
    pub to: Gid,
    /// Type of the edge.
    pub edge_type: EdgeTypeId,
}

/// The inverse action recorded by one delta entry.
///
/// Applying the action to a copy of the element's current state yields the
/// state as of just before the change the entry logs.
#[derive(Clone, Debug, PartialEq)]
pub enum DeltaAction {
    /// Re-add a label removed by the logged change.
    AddLabel(LabelId),
    /// Remove a label added by the logged change.
    RemoveLabel(LabelId),
    /// Restore a property to its prior value (`Null` prior means absent).
    SetProperty {
        /// Property key.
        key: PropertyId,
        /// Value the property held before the logged change.
        prior: PropertyValue,
    },
    /// Re-add an in-edge removed by the logged change.
    AddInEdge(AdjacencyEntry),
    /// Re-add an out-edge removed by the logged change.
    AddOutEdge(AdjacencyEntry),
    /// Remove an in-edge added by the logged change.
    RemoveInEdge(AdjacencyEntry),
    /// Remove an out-edge added by the logged change.
    RemoveOutEdge(AdjacencyEntry),
    /// Clear the tombstone set by the logged deletion.
    RecreateObject,
    /// The element did not exist before the logged creation.
    DeleteObject,
}

/// One immutable-once-published record of a pending change to one element.
#[derive(Debug)]
pub struct DeltaEntry {
    /// Timestamp slot shared with every other delta of the same transaction.
    pub slot: Arc<TimestampSlot>,
    /// Start-time of the last transaction that fully committed a change to
    /// this element before this entry was appended.
    pub prior_start_ts: u64,
    /// The inverse of the logged change.
    pub action: DeltaAction,
    /// Endpoint identities, present on edge-element deltas only.
    pub endpoints: Option<EdgeEndpoints>,
    /// Next-older entry in the chain.
    pub next: Option<Arc<DeltaEntry>>,
}
