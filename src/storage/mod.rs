//! Storage layer: element tables, version chains, and the MVCC machinery.

pub mod anchor;
pub mod audit;
pub mod delta;
pub mod edge;
pub mod mvcc;
pub mod property_value;
pub mod types;
pub mod vertex;

pub use anchor::{AnchorKey, AnchorMap};
pub use audit::AuditRecord;
pub use delta::{DeltaAction, DeltaEntry, EdgeEndpoints, SlotState, TimestampSlot, TxId, TX_INITIAL_ID};
pub use edge::Edge;
pub use mvcc::View;
pub use property_value::{PropertyMap, PropertyValue};
pub use types::{AdjacencyEntry, EdgeTypeId, ElementKind, Gid, LabelId, PropertyId};
pub use vertex::Vertex;
