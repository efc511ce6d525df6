//! tenebra: an in-memory transactional property-graph store with
//! multi-version concurrency control.
//!
//! Each vertex and edge keeps its current state in place plus a singly
//! linked chain of undo deltas, newest first. Transactions read at a
//! snapshot timestamp by replaying the chain until committed state at or
//! below the snapshot appears, and write optimistically: the first open
//! writer of an element wins, any second writer fails with
//! [`GraphError::SerializationConflict`] immediately.
//!
//! ```
//! use tenebra::{Config, GraphStore, PropertyId, PropertyValue, View};
//!
//! # fn main() -> tenebra::Result<()> {
//! let store = GraphStore::new(Config::default())?;
//!
//! let txn = store.begin_transaction();
//! let vertex = txn.create_vertex()?;
//! vertex.set_property(PropertyId(1), PropertyValue::from("hello"))?;
//! let gid = vertex.gid();
//! drop(vertex);
//! txn.commit()?;
//!
//! let txn = store.begin_transaction();
//! let vertex = txn.vertex(gid, View::New).ok_or(tenebra::GraphError::NonexistentObject)?;
//! assert_eq!(
//!     vertex.get_property(PropertyId(1), View::New)?,
//!     PropertyValue::from("hello")
//! );
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod logging;
pub mod storage;

pub use db::{
    Config, CommitReceipt, EdgeAccessor, GraphStore, TimestampOracle, Transaction, TxState,
    VertexAccessor,
};
pub use error::{GraphError, Result};
pub use storage::{
    AdjacencyEntry, AnchorKey, AnchorMap, AuditRecord, EdgeTypeId, ElementKind, Gid, LabelId,
    PropertyId, PropertyMap, PropertyValue, View,
};
