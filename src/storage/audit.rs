//! Audit stream: per-transaction records of significant write events.
//!
//! A record is captured when a write crosses a commit boundary (the first
//! write this transaction makes on top of another transaction's committed
//! state), and optionally on the very first write to a freshly created
//! element. The captured property mapping is the element's state *before*
//! the mutation applies, so downstream consumers see the pre-image.
//!
//! Records accumulate in transaction order inside the transaction and are
//! handed to the caller in the commit receipt. Aborted transactions discard
//! their buffer.

use serde::{Deserialize, Serialize};

use crate::storage::delta::EdgeEndpoints;
use crate::storage::property_value::PropertyMap;
use crate::storage::types::{ElementKind, Gid};

/// One audit event. Serializable so callers can ship the buffer to an
/// external sink as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Which element table the event concerns.
    pub kind: ElementKind,
    /// Identity of the written element.
    pub gid: Gid,
    /// Endpoint identities and type, present only for edge events.
    pub endpoints: Option<EdgeEndpoints>,
    /// Start-time of the committed state the write is layered on.
    pub prior_start_ts: u64,
    /// Full property mapping as it stood before this mutation.
    pub properties: PropertyMap,
}
