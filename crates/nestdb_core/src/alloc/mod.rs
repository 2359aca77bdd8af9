//! Versioned copy-on-write page store.
//!
//! Committed nodes are immutable and shared by every reader. A write
//! transaction copies a node into its private scratch area the first time it
//! changes it; the copy lives under a fresh [`Ref`](crate::types::Ref). Commit
//! appends the scratch nodes reachable from the new group top to the node log
//! and publishes them.

mod node;
mod slab;
mod store;

pub use node::{Child, Element, Node, TopArray};
pub use slab::SlabAlloc;
pub use store::NodeStore;
pub(crate) use store::unexpected_node;
