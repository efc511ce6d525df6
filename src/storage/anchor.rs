//! Consolidation (anchoring): periodic materialization of full element state.
//!
//! Without anchoring, an element modified every transaction indefinitely
//! would force every read to replay an unbounded chain back to creation.
//! Every Nth full commit on an element, its complete property mapping is
//! materialized into the transaction's anchor table keyed by
//! `(gid, consolidated-start-time)`, giving future replay of older history
//! a shortcut reference point.
//!
//! This is a checkpoint, not a compaction: older delta entries are never
//! truncated. The churn counter is purely a cadence control and is not
//! required for visibility correctness.

use std::collections::BTreeMap;

use crate::storage::property_value::PropertyMap;
use crate::storage::types::Gid;

/// Key of one anchor entry: element identity plus the consolidated
/// start-time the snapshot corresponds to.
pub type AnchorKey = (Gid, u64);

/// Anchor table produced by one transaction, consumed by the persistence
/// or replication sink at commit. Never read back by this core.
pub type AnchorMap = BTreeMap<AnchorKey, PropertyMap>;

/// Advances the churn counter for a commit-boundary write and reports
/// whether this write must anchor the element.
///
/// Fires on every `threshold`-th boundary; the counter resets when it
/// fires. The counter advances even when anchoring is disabled so that
/// enabling it later keeps the cadence.
pub(crate) fn churn_tick(churn: &mut u32, threshold: u32) -> bool {
    *churn += 1;
    if *churn >= threshold {
        *churn = 0;
        return true;
    }
    false
}
