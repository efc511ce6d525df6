//! Database layer: store handle, transactions, and element accessors.

pub(crate) mod config;
pub(crate) mod edge_accessor;
pub(crate) mod graph;
pub(crate) mod oracle;
pub(crate) mod transaction;
pub(crate) mod vertex_accessor;

pub use config::Config;
pub use edge_accessor::EdgeAccessor;
pub use graph::GraphStore;
pub use oracle::TimestampOracle;
pub use transaction::{CommitReceipt, Transaction, TxState};
pub use vertex_accessor::VertexAccessor;
