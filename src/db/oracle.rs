//! Timestamp and transaction-id allocation.
//!
//! Two monotonically increasing counters back the whole visibility scheme.
//! Start-times begin at 1 and stay below [`TX_INITIAL_ID`]; transaction ids
//! begin at [`TX_INITIAL_ID`]. The disjoint ranges are what lets a single
//! `u64` slot encode open-versus-committed without a separate flag.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::error::{GraphError, Result};
use crate::storage::delta::{TxId, TX_INITIAL_ID};

/// Global allocator for start-times and transaction ids.
#[derive(Debug)]
pub struct TimestampOracle {
    next_ts: AtomicU64,
    next_tx_id: AtomicU64,
}

impl TimestampOracle {
    /// Oracle starting from timestamp 1.
    pub fn new() -> Self {
        Self {
            next_ts: AtomicU64::new(1),
            next_tx_id: AtomicU64::new(TX_INITIAL_ID),
        }
    }

    /// Oracle resuming from a known timestamp, e.g. after reloading
    /// externally persisted state.
    ///
    /// Zero is reserved as the pre-history start-time of untouched
    /// elements, and the sentinel range is off limits.
    pub fn with_timestamp(next_ts: u64) -> Result<Self> {
        if next_ts == 0 || next_ts >= TX_INITIAL_ID {
            return Err(GraphError::InvalidArgument(format!(
                "timestamp {next_ts} outside the valid start-time range"
            )));
        }
        Ok(Self {
            next_ts: AtomicU64::new(next_ts),
            next_tx_id: AtomicU64::new(TX_INITIAL_ID),
        })
    }

    /// Hands out the next start-time.
    pub fn allocate_start_timestamp(&self) -> u64 {
        let ts = self.next_ts.fetch_add(1, Ordering::AcqRel);
        trace!(ts, "allocated start timestamp");
        ts
    }

    /// Hands out the next transaction id.
    pub fn allocate_transaction_id(&self) -> TxId {
        let id = self.next_tx_id.fetch_add(1, Ordering::AcqRel);
        trace!(tx_id = id, "allocated transaction id");
        id
    }

    /// Next start-time that would be handed out, without allocating it.
    pub fn current_timestamp(&self) -> u64 {
        self.next_ts.load(Ordering::Acquire)
    }
}

impl Default for TimestampOracle {
    fn default() -> Self {
        Self::new()
    }
}
