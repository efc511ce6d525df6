//! Error handling for tenebra operations.
//!
//! This module defines the error types used throughout the storage core.
//! All public APIs return `Result<T, GraphError>` for consistent error
//! handling.
//!
//! # Error Types
//!
//! - [`GraphError`] - Main error enum with variants for different failure modes
//! - [`Result`] - Result type alias for convenience
//!
//! # Propagation Policy
//!
//! Every write operation surfaces errors immediately as a result value.
//! Nothing is retried internally; retry is a transaction-level policy owned
//! by the caller. Reads never produce [`GraphError::SerializationConflict`]
//! since reads never contend on the write path.

use thiserror::Error;

/// Result type for tenebra operations.
///
/// All public APIs return `Result<T, GraphError>` for error handling.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Another transaction holds an uncommitted write on this element.
    ///
    /// Layering a second open write on top of it would make the undo log
    /// ambiguous, so exactly one of the contending transactions fails.
    /// The failed transaction should be aborted and retried by the caller.
    #[error("serialization conflict: element has an uncommitted write from another transaction")]
    SerializationConflict,

    /// A write was attempted on a tombstoned element, or a read was
    /// attempted without the for-deleted override.
    #[error("cannot access a deleted object")]
    DeletedObject,

    /// Replay determined the element never existed as of the requested view.
    #[error("object does not exist in the requested view")]
    NonexistentObject,

    /// Properties on edges are disabled for the whole store.
    #[error("properties on edges are disabled")]
    PropertiesDisabled,

    /// Allocation failure while constructing a delta or value.
    ///
    /// Propagated, never retried; the transaction should be aborted.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Invalid argument or operation.
    ///
    /// This occurs for API misuse such as operating on a transaction that
    /// is no longer active, or deleting a vertex that still has edges.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
