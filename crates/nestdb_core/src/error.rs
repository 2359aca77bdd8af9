//! Error types for nestdb core.

use crate::types::ObjLink;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in nestdb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] nestdb_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] nestdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An index was outside the collection.
    #[error("{operation}: index {index} out of range (size {size})")]
    OutOfRange {
        /// Name of the failing operation.
        operation: &'static str,
        /// The offending index.
        index: usize,
        /// Collection size at the time of the call.
        size: usize,
    },

    /// A required dictionary key is absent.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// Null was written to a non-nullable property.
    #[error("property '{property}' is not nullable")]
    PropertyNotNullable {
        /// Name of the property.
        property: String,
    },

    /// A value or accessor does not match the column type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// What the column or slot holds.
        expected: String,
        /// What was supplied.
        actual: String,
    },

    /// A write was attempted outside a write transaction.
    #[error("not in a write transaction")]
    NotInWriteTransaction,

    /// The transaction was committed, rolled back or closed.
    #[error("transaction is closed")]
    TransactionClosed,

    /// The accessor's owner no longer exists.
    #[error("collection is not attached")]
    NotAttached,

    /// The operation is not permitted for this object or collection.
    #[error("illegal operation: {message}")]
    IllegalOperation {
        /// Description of why the operation is rejected.
        message: String,
    },

    /// Collections nest deeper than the configured limit.
    #[error("collections nest deeper than {max} levels")]
    NestingTooDeep {
        /// Configured maximum nesting level.
        max: usize,
    },

    /// No live object exists under the given link.
    #[error("object not found: {link}")]
    ObjectNotFound {
        /// The link that failed to resolve.
        link: ObjLink,
    },

    /// No table or column matches.
    #[error("schema lookup failed: {message}")]
    SchemaMismatch {
        /// What was looked up.
        message: String,
    },

    /// Database is already open or locked.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Invalid database format or version.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A persisted node could not be interpreted.
    #[error("corrupt node {node}: {message}")]
    CorruptNode {
        /// Raw ref of the node.
        node: u64,
        /// Description of the problem.
        message: String,
    },

    /// The invariant checker found an inconsistency.
    #[error("invariant violated: {message}")]
    InvariantViolation {
        /// Description of the inconsistency.
        message: String,
    },
}

impl CoreError {
    /// Creates an out of range error.
    pub fn out_of_range(operation: &'static str, index: usize, size: usize) -> Self {
        Self::OutOfRange {
            operation,
            index,
            size,
        }
    }

    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an illegal operation error.
    pub fn illegal_operation(message: impl Into<String>) -> Self {
        Self::IllegalOperation {
            message: message.into(),
        }
    }

    /// Creates a schema mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a corrupt node error.
    pub fn corrupt_node(node: u64, message: impl Into<String>) -> Self {
        Self::CorruptNode {
            node,
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }
}
