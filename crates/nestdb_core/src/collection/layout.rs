//! Storage layouts of the three collection shapes.
//!
//! - typed list: the top is the B+tree root
//! - mixed list: `Top { refs: [values], meta: [next_key] }`
//! - dictionary: `Top { refs: [keys, values], meta: [next_key] }`
//!
//! `next_key` hands out the stable keys of nested entries.

use crate::alloc::{unexpected_node, Node, NodeStore, TopArray};
use crate::bptree;
use crate::error::{CoreError, CoreResult};
use crate::types::Ref;
use crate::value::CollectionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    TypedList,
    MixedList,
    Dictionary,
}

impl Layout {
    pub(crate) const fn kind(self) -> CollectionType {
        match self {
            Layout::TypedList | Layout::MixedList => CollectionType::List,
            Layout::Dictionary => CollectionType::Dictionary,
        }
    }

    /// Layout of the collection stored at `top`.
    pub(crate) fn detect(store: &NodeStore, kind: CollectionType, top: Ref) -> CoreResult<Self> {
        match (kind, &*store.node(top)?) {
            (CollectionType::Dictionary, Node::Top(_)) => Ok(Layout::Dictionary),
            (CollectionType::List, Node::Top(_)) => Ok(Layout::MixedList),
            (CollectionType::List, Node::Leaf(_) | Node::Inner(_)) => Ok(Layout::TypedList),
            (_, other) => Err(unexpected_node(top, "collection", other)),
        }
    }

    /// Allocates an empty collection and returns its top.
    pub(crate) fn create(self, store: &mut NodeStore) -> Ref {
        match self {
            Layout::TypedList => bptree::create(store),
            Layout::MixedList => {
                let values = bptree::create(store);
                store.alloc(Node::Top(TopArray {
                    refs: vec![values],
                    meta: vec![0],
                }))
            }
            Layout::Dictionary => {
                let keys = bptree::create(store);
                let values = bptree::create(store);
                store.alloc(Node::Top(TopArray {
                    refs: vec![keys, values],
                    meta: vec![0],
                }))
            }
        }
    }
}

/// Root of the tree holding the values.
pub(crate) fn values_tree(store: &NodeStore, layout: Layout, top: Ref) -> CoreResult<Ref> {
    match layout {
        Layout::TypedList => Ok(top),
        _ => store
            .top(top)?
            .refs
            .last()
            .copied()
            .ok_or_else(|| CoreError::corrupt_node(top.as_u64(), "collection top has no values")),
    }
}

/// Root of the key tree of a dictionary.
pub(crate) fn keys_tree(store: &NodeStore, top: Ref) -> CoreResult<Ref> {
    let array = store.top(top)?;
    match array.refs.as_slice() {
        [keys, _] => Ok(*keys),
        _ => Err(CoreError::corrupt_node(top.as_u64(), "dictionary top needs two refs")),
    }
}

/// Points the collection at a new values tree; returns the new top.
pub(crate) fn replace_values(
    store: &mut NodeStore,
    layout: Layout,
    top: Ref,
    values: Ref,
) -> CoreResult<Ref> {
    if layout == Layout::TypedList {
        return Ok(values);
    }
    if values_tree(store, layout, top)? == values {
        return Ok(top);
    }
    let (new_top, array) = store.top_mut(top)?;
    if let Some(slot) = array.refs.last_mut() {
        *slot = values;
    }
    Ok(new_top)
}

/// Points a dictionary at new key and value trees; returns the new top.
pub(crate) fn replace_trees(store: &mut NodeStore, top: Ref, keys: Ref, values: Ref) -> CoreResult<Ref> {
    let (new_top, array) = store.top_mut(top)?;
    array.refs = vec![keys, values];
    Ok(new_top)
}

/// Hands out the next stable entry key; returns the new top and the key.
pub(crate) fn allocate_key(store: &mut NodeStore, top: Ref) -> CoreResult<(Ref, i64)> {
    let (new_top, array) = store.top_mut(top)?;
    if array.meta.is_empty() {
        array.meta.push(0);
    }
    let key = array.meta[0];
    array.meta[0] += 1;
    Ok((new_top, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{Element, SlabAlloc};
    use crate::value::Mixed;
    use nestdb_storage::InMemoryBackend;
    use std::sync::Arc;

    fn store() -> NodeStore {
        let (alloc, _) = SlabAlloc::open(Box::new(InMemoryBackend::new()), (1, 0), false).unwrap();
        NodeStore::new(Arc::new(alloc))
    }

    #[test]
    fn layouts_are_detected_from_nodes() {
        let mut store = store();
        for layout in [Layout::TypedList, Layout::MixedList, Layout::Dictionary] {
            let top = layout.create(&mut store);
            assert_eq!(Layout::detect(&store, layout.kind(), top).unwrap(), layout);
        }
        let list = Layout::TypedList.create(&mut store);
        assert!(Layout::detect(&store, CollectionType::Dictionary, list).is_err());
    }

    #[test]
    fn keys_are_handed_out_in_order() {
        let mut store = store();
        let top = Layout::MixedList.create(&mut store);
        let (top, first) = allocate_key(&mut store, top).unwrap();
        let (_, second) = allocate_key(&mut store, top).unwrap();
        assert_eq!((first, second), (0, 1));
    }

    #[test]
    fn values_tree_is_replaced() {
        let mut store = store();
        let top = Layout::Dictionary.create(&mut store);
        let values = values_tree(&store, Layout::Dictionary, top).unwrap();
        let values = bptree::insert(&mut store, values, 0, Element::Value(Mixed::Int(1)), 8).unwrap();
        let top = replace_values(&mut store, Layout::Dictionary, top, values).unwrap();
        let tree = values_tree(&store, Layout::Dictionary, top).unwrap();
        assert_eq!(bptree::size(&store, tree).unwrap(), 1);
        assert_ne!(keys_tree(&store, top).unwrap(), tree);
    }
}
