//! # nestdb storage
//!
//! Byte stores underneath the nestdb page store.
//!
//! A backend is an **append-only log of bytes**. The page store above it writes
//! checksummed node and commit records and never rewrites a byte in place; the
//! only destructive operation is cutting off a torn tail during recovery.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - shareable in-memory log, used by tests and ephemeral databases
//! - [`FileBackend`] - a single file accessed through OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use nestdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"node").unwrap();
//! assert_eq!(backend.read_at(offset, 4).unwrap(), b"node");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
