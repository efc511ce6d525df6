//! Store configuration.
//!
//! All knobs are fixed at store creation; nothing here is hot-reloadable.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Tunable parameters for a [`GraphStore`](crate::db::GraphStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Whether edge elements carry a property mapping.
    ///
    /// When disabled, edge property reads return `Null`/empty without
    /// touching the version chain and edge property writes fail with
    /// [`GraphError::PropertiesDisabled`].
    pub properties_on_edges: bool,

    /// Whether commit-boundary writes materialize consolidation anchors.
    ///
    /// The churn cadence advances either way; this gates only the anchor
    /// table writes.
    pub anchor_enabled: bool,

    /// Number of full commits on an element between anchor writes.
    ///
    /// Must be at least 1. Every Nth commit-boundary write on an element
    /// snapshots its complete property mapping into the transaction's
    /// anchor table.
    pub anchor_churn_threshold: u32,

    /// Whether commit-boundary writes capture audit records.
    pub audit_enabled: bool,

    /// Also capture an audit record on the first write to a freshly
    /// created element.
    ///
    /// Off by default: creation-time state is empty and the creating
    /// transaction's commit already surfaces the element.
    pub audit_first_touch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            properties_on_edges: true,
            anchor_enabled: true,
            anchor_churn_threshold: 16,
            audit_enabled: true,
            audit_first_touch: false,
        }
    }
}

impl Config {
    /// Rejects parameter combinations the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.anchor_churn_threshold == 0 {
            return Err(GraphError::InvalidArgument(
                "anchor_churn_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Preset with edge properties disabled, for edge-heavy workloads that
    /// only need topology.
    pub fn topology_only() -> Self {
        Self {
            properties_on_edges: false,
            ..Self::default()
        }
    }

    /// Preset with anchoring and auditing off, for benchmarking the bare
    /// version-chain path.
    pub fn bare() -> Self {
        Self {
            anchor_enabled: false,
            audit_enabled: false,
            ..Self::default()
        }
    }
}
