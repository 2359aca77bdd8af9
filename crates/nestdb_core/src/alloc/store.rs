//! Per-transaction view of the page store.

use super::node::{Node, TopArray};
use super::slab::SlabAlloc;
use crate::error::{CoreError, CoreResult};
use crate::types::Ref;
use std::collections::HashMap;
use std::sync::Arc;

/// Committed nodes plus the private scratch area of one transaction.
pub struct NodeStore {
    alloc: Arc<SlabAlloc>,
    scratch: HashMap<Ref, Arc<Node>>,
}

impl NodeStore {
    /// Creates a store with an empty scratch area.
    #[must_use]
    pub fn new(alloc: Arc<SlabAlloc>) -> Self {
        Self {
            alloc,
            scratch: HashMap::new(),
        }
    }

    /// Resolves a ref, scratch first.
    pub fn node(&self, node: Ref) -> CoreResult<Arc<Node>> {
        if let Some(content) = self.scratch.get(&node) {
            return Ok(Arc::clone(content));
        }
        self.alloc
            .get(node)
            .ok_or_else(|| CoreError::corrupt_node(node.as_u64(), "dangling ref"))
    }

    /// Stores a new node in scratch.
    pub fn alloc(&mut self, node: Node) -> Ref {
        let fresh = self.alloc.reserve_ref();
        self.scratch.insert(fresh, Arc::new(node));
        fresh
    }

    /// Returns a writable node, copying a committed one to a fresh ref first.
    ///
    /// The returned ref differs from `node` exactly when a copy was made.
    pub fn make_mut(&mut self, node: Ref) -> CoreResult<(Ref, &mut Node)> {
        let target = if self.scratch.contains_key(&node) {
            node
        } else {
            let committed = self
                .alloc
                .get(node)
                .ok_or_else(|| CoreError::corrupt_node(node.as_u64(), "dangling ref"))?;
            let fresh = self.alloc.reserve_ref();
            self.scratch.insert(fresh, committed);
            fresh
        };
        let slot = self
            .scratch
            .get_mut(&target)
            .ok_or_else(|| CoreError::corrupt_node(target.as_u64(), "scratch node vanished"))?;
        Ok((target, Arc::make_mut(slot)))
    }

    /// Reads a top array.
    pub fn top(&self, node: Ref) -> CoreResult<TopArray> {
        match &*self.node(node)? {
            Node::Top(top) => Ok(top.clone()),
            other => Err(unexpected_node(node, "top", other)),
        }
    }

    /// Writable top array.
    pub fn top_mut(&mut self, node: Ref) -> CoreResult<(Ref, &mut TopArray)> {
        match self.make_mut(node)? {
            (target, Node::Top(top)) => Ok((target, top)),
            (target, other) => Err(unexpected_node(target, "top", other)),
        }
    }

    /// Number of nodes written by this transaction so far.
    #[must_use]
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    /// Scratch nodes, for commit.
    #[must_use]
    pub fn scratch(&self) -> &HashMap<Ref, Arc<Node>> {
        &self.scratch
    }

    /// Throws away every uncommitted node.
    pub fn discard(&mut self) {
        self.scratch.clear();
    }

    /// The shared allocator.
    #[must_use]
    pub fn allocator(&self) -> &Arc<SlabAlloc> {
        &self.alloc
    }
}

/// Error for a node of the wrong kind.
pub(crate) fn unexpected_node(node: Ref, expected: &str, found: &Node) -> CoreError {
    CoreError::corrupt_node(
        node.as_u64(),
        format!("expected {expected} node, found {}", found.kind_name()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Element;
    use crate::value::Mixed;
    use nestdb_storage::InMemoryBackend;

    fn store() -> NodeStore {
        let (alloc, _) = SlabAlloc::open(Box::new(InMemoryBackend::new()), (1, 0), false).unwrap();
        NodeStore::new(Arc::new(alloc))
    }

    #[test]
    fn scratch_nodes_are_mutated_in_place() {
        let mut store = store();
        let leaf = store.alloc(Node::Leaf(vec![]));
        let (target, node) = store.make_mut(leaf).unwrap();
        assert_eq!(target, leaf);
        if let Node::Leaf(elements) = node {
            elements.push(Element::Value(Mixed::Int(1)));
        }
        assert_eq!(store.node(leaf).unwrap().children().len(), 0);
        assert_eq!(store.scratch_len(), 1);
    }

    #[test]
    fn committed_nodes_are_copied_on_write() {
        let mut store = store();
        let top = store.alloc(Node::Top(TopArray::default()));
        let alloc = Arc::clone(store.allocator());
        alloc.commit(store.scratch(), top, 1).unwrap();
        store.discard();

        let (copy, array) = store.top_mut(top).unwrap();
        array.meta.push(5);
        assert_ne!(copy, top);
        assert_eq!(store.top(copy).unwrap().meta, vec![5]);
        assert!(store.top(top).unwrap().meta.is_empty());
    }

    #[test]
    fn wrong_kind_and_dangling_refs_fail() {
        let mut store = store();
        let leaf = store.alloc(Node::Leaf(vec![]));
        assert!(matches!(store.top(leaf), Err(CoreError::CorruptNode { .. })));
        assert!(store.node(Ref(9999)).is_err());
    }
}
