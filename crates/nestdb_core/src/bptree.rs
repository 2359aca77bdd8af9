//! Ordered sequence of [`Element`]s stored as a B+tree of page-store nodes.
//!
//! Every mutator returns the root, which differs from the input root whenever
//! copy-on-write or a split relocated it.

use crate::alloc::{unexpected_node, Child, Element, Node, NodeStore};
use crate::error::{CoreError, CoreResult};
use crate::types::Ref;

/// Creates an empty tree and returns its root.
pub fn create(store: &mut NodeStore) -> Ref {
    store.alloc(Node::Leaf(Vec::new()))
}

/// Number of elements.
pub fn size(store: &NodeStore, root: Ref) -> CoreResult<usize> {
    match &*store.node(root)? {
        Node::Leaf(elements) => Ok(elements.len()),
        Node::Inner(children) => Ok(children.iter().map(|c| c.size).sum()),
        other => Err(unexpected_node(root, "tree", other)),
    }
}

/// Element at `ndx`.
pub fn get(store: &NodeStore, root: Ref, ndx: usize) -> CoreResult<Element> {
    let mut node = root;
    let mut ndx = ndx;
    loop {
        let content = store.node(node)?;
        match &*content {
            Node::Leaf(elements) => {
                return elements
                    .get(ndx)
                    .cloned()
                    .ok_or_else(|| CoreError::out_of_range("get", ndx, elements.len()));
            }
            Node::Inner(children) => {
                let (child, offset) = locate(children, ndx, false)?;
                node = children[child].node;
                ndx -= offset;
            }
            other => return Err(unexpected_node(node, "tree", other)),
        }
    }
}

/// Overwrites the element at `ndx`.
pub fn set(store: &mut NodeStore, root: Ref, ndx: usize, element: Element) -> CoreResult<Ref> {
    match shape(store, root)? {
        Shape::Leaf(len) => {
            if ndx >= len {
                return Err(CoreError::out_of_range("set", ndx, len));
            }
            let (target, node) = store.make_mut(root)?;
            if let Node::Leaf(elements) = node {
                elements[ndx] = element;
            }
            Ok(target)
        }
        Shape::Inner(children) => {
            let (pos, offset) = locate(&children, ndx, false)?;
            let child = children[pos];
            let new_child = set(store, child.node, ndx - offset, element)?;
            replace_child(store, root, pos, Child { node: new_child, size: child.size })
        }
    }
}

/// Inserts `element` before `ndx`; `ndx == size` appends.
pub fn insert(
    store: &mut NodeStore,
    root: Ref,
    ndx: usize,
    element: Element,
    max_leaf: usize,
) -> CoreResult<Ref> {
    let total = size(store, root)?;
    if ndx > total {
        return Err(CoreError::out_of_range("insert", ndx, total));
    }
    let (left, split) = insert_rec(store, root, ndx, element, max_leaf.max(2))?;
    match split {
        None => Ok(left),
        Some(right) => {
            let left_size = total + 1 - right.size;
            Ok(store.alloc(Node::Inner(vec![
                Child { node: left, size: left_size },
                right,
            ])))
        }
    }
}

fn insert_rec(
    store: &mut NodeStore,
    node: Ref,
    ndx: usize,
    element: Element,
    max: usize,
) -> CoreResult<(Ref, Option<Child>)> {
    match shape(store, node)? {
        Shape::Leaf(_) => {
            let (target, node) = store.make_mut(node)?;
            let Node::Leaf(elements) = node else {
                return Err(CoreError::corrupt_node(target.as_u64(), "leaf changed kind"));
            };
            elements.insert(ndx, element);
            if elements.len() <= max {
                return Ok((target, None));
            }
            let right = elements.split_off(elements.len() / 2);
            let right_size = right.len();
            let right_ref = store.alloc(Node::Leaf(right));
            Ok((target, Some(Child { node: right_ref, size: right_size })))
        }
        Shape::Inner(children) => {
            let (pos, offset) = locate(&children, ndx, true)?;
            let child = children[pos];
            let (new_child, split) = insert_rec(store, child.node, ndx - offset, element, max)?;

            let (target, node) = store.make_mut(node)?;
            let Node::Inner(children) = node else {
                return Err(CoreError::corrupt_node(target.as_u64(), "inner changed kind"));
            };
            children[pos].node = new_child;
            children[pos].size = child.size + 1;
            if let Some(right) = split {
                children[pos].size -= right.size;
                children.insert(pos + 1, right);
            }
            if children.len() <= max {
                return Ok((target, None));
            }
            let right = children.split_off(children.len() / 2);
            let right_size = right.iter().map(|c| c.size).sum();
            let right_ref = store.alloc(Node::Inner(right));
            Ok((target, Some(Child { node: right_ref, size: right_size })))
        }
    }
}

/// Removes and returns the element at `ndx`.
pub fn erase(store: &mut NodeStore, root: Ref, ndx: usize) -> CoreResult<(Ref, Element)> {
    let total = size(store, root)?;
    if ndx >= total {
        return Err(CoreError::out_of_range("erase", ndx, total));
    }
    let (mut root, removed) = erase_rec(store, root, ndx)?;

    loop {
        match shape(store, root)? {
            Shape::Inner(children) if children.len() == 1 => root = children[0].node,
            Shape::Inner(children) if children.is_empty() => return Ok((create(store), removed)),
            _ => return Ok((root, removed)),
        }
    }
}

fn erase_rec(store: &mut NodeStore, node: Ref, ndx: usize) -> CoreResult<(Ref, Element)> {
    match shape(store, node)? {
        Shape::Leaf(_) => {
            let (target, node) = store.make_mut(node)?;
            let Node::Leaf(elements) = node else {
                return Err(CoreError::corrupt_node(target.as_u64(), "leaf changed kind"));
            };
            Ok((target, elements.remove(ndx)))
        }
        Shape::Inner(children) => {
            let (pos, offset) = locate(&children, ndx, false)?;
            let child = children[pos];
            let (new_child, removed) = erase_rec(store, child.node, ndx - offset)?;

            let (target, node) = store.make_mut(node)?;
            let Node::Inner(children) = node else {
                return Err(CoreError::corrupt_node(target.as_u64(), "inner changed kind"));
            };
            if child.size == 1 {
                children.remove(pos);
            } else {
                children[pos] = Child { node: new_child, size: child.size - 1 };
            }
            Ok((target, removed))
        }
    }
}

/// Exchanges the elements at `a` and `b`.
pub fn swap(store: &mut NodeStore, root: Ref, a: usize, b: usize) -> CoreResult<Ref> {
    if a == b {
        return Ok(root);
    }
    let first = get(store, root, a)?;
    let second = get(store, root, b)?;
    let root = set(store, root, a, second)?;
    set(store, root, b, first)
}

/// Replaces the tree with an empty one.
pub fn clear(store: &mut NodeStore) -> Ref {
    create(store)
}

/// Calls `f` with each element in order until it returns false.
pub fn for_each(
    store: &NodeStore,
    root: Ref,
    f: &mut dyn FnMut(usize, &Element) -> CoreResult<bool>,
) -> CoreResult<()> {
    let mut base = 0;
    walk(store, root, &mut base, f).map(|_| ())
}

fn walk(
    store: &NodeStore,
    node: Ref,
    base: &mut usize,
    f: &mut dyn FnMut(usize, &Element) -> CoreResult<bool>,
) -> CoreResult<bool> {
    let content = store.node(node)?;
    match &*content {
        Node::Leaf(elements) => {
            for element in elements {
                if !f(*base, element)? {
                    return Ok(false);
                }
                *base += 1;
            }
            Ok(true)
        }
        Node::Inner(children) => {
            for child in children {
                if !walk(store, child.node, base, f)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        other => Err(unexpected_node(node, "tree", other)),
    }
}

/// All elements in order.
pub fn to_vec(store: &NodeStore, root: Ref) -> CoreResult<Vec<Element>> {
    let mut out = Vec::new();
    for_each(store, root, &mut |_, element| {
        out.push(element.clone());
        Ok(true)
    })?;
    Ok(out)
}

/// Position of the first element matching `pred`.
pub fn find_first(
    store: &NodeStore,
    root: Ref,
    pred: &mut dyn FnMut(&Element) -> bool,
) -> CoreResult<Option<usize>> {
    let mut found = None;
    for_each(store, root, &mut |ndx, element| {
        if pred(element) {
            found = Some(ndx);
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

/// Checks that every inner node's recorded sizes match its children.
pub fn verify(store: &NodeStore, root: Ref) -> CoreResult<usize> {
    match &*store.node(root)? {
        Node::Leaf(elements) => Ok(elements.len()),
        Node::Inner(children) => {
            let mut total = 0;
            for child in children {
                let actual = verify(store, child.node)?;
                if actual != child.size || actual == 0 {
                    return Err(CoreError::invariant(format!(
                        "tree node {} records size {} but holds {actual}",
                        child.node, child.size
                    )));
                }
                total += actual;
            }
            Ok(total)
        }
        other => Err(unexpected_node(root, "tree", other)),
    }
}

enum Shape {
    Leaf(usize),
    Inner(Vec<Child>),
}

/// Reads a tree node without keeping it borrowed, so a later `make_mut` can
/// mutate a scratch node in place.
fn shape(store: &NodeStore, node: Ref) -> CoreResult<Shape> {
    match &*store.node(node)? {
        Node::Leaf(elements) => Ok(Shape::Leaf(elements.len())),
        Node::Inner(children) => Ok(Shape::Inner(children.clone())),
        other => Err(unexpected_node(node, "tree", other)),
    }
}

/// Finds the child holding `ndx`. With `for_insert`, `ndx` may equal the total size.
fn locate(children: &[Child], ndx: usize, for_insert: bool) -> CoreResult<(usize, usize)> {
    let mut offset = 0;
    for (pos, child) in children.iter().enumerate() {
        let last = pos + 1 == children.len();
        if ndx < offset + child.size || (for_insert && last && ndx == offset + child.size) {
            return Ok((pos, offset));
        }
        offset += child.size;
    }
    Err(CoreError::out_of_range("locate", ndx, offset))
}

fn replace_child(store: &mut NodeStore, node: Ref, pos: usize, child: Child) -> CoreResult<Ref> {
    let current = match &*store.node(node)? {
        Node::Inner(children) => children.get(pos).copied(),
        _ => None,
    };
    if current == Some(child) {
        return Ok(node);
    }
    let (target, content) = store.make_mut(node)?;
    if let Node::Inner(children) = content {
        children[pos] = child;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::SlabAlloc;
    use crate::value::Mixed;
    use nestdb_storage::InMemoryBackend;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn store() -> NodeStore {
        let (alloc, _) = SlabAlloc::open(Box::new(InMemoryBackend::new()), (1, 0), false).unwrap();
        NodeStore::new(Arc::new(alloc))
    }

    fn int(v: i64) -> Element {
        Element::Value(Mixed::Int(v))
    }

    fn ints(store: &NodeStore, root: Ref) -> Vec<i64> {
        to_vec(store, root)
            .unwrap()
            .iter()
            .map(|e| e.as_value().and_then(Mixed::as_int).unwrap())
            .collect()
    }

    #[test]
    fn inserts_split_leaves_and_keep_order() {
        let mut store = store();
        let mut root = create(&mut store);
        for v in 0..50 {
            root = insert(&mut store, root, 0, int(v), 4).unwrap();
        }
        assert_eq!(size(&store, root).unwrap(), 50);
        assert_eq!(verify(&store, root).unwrap(), 50);
        let expected: Vec<i64> = (0..50).rev().collect();
        assert_eq!(ints(&store, root), expected);
        assert_eq!(get(&store, root, 10).unwrap(), int(39));
    }

    #[test]
    fn append_and_middle_insert() {
        let mut store = store();
        let mut root = create(&mut store);
        for v in 0..20 {
            let end = size(&store, root).unwrap();
            root = insert(&mut store, root, end, int(v), 3).unwrap();
        }
        root = insert(&mut store, root, 7, int(100), 3).unwrap();
        let values = ints(&store, root);
        assert_eq!(values[7], 100);
        assert_eq!(values[8], 7);
        assert_eq!(values.len(), 21);
        assert!(insert(&mut store, root, 30, int(0), 3).is_err());
    }

    #[test]
    fn erase_collapses_to_leaf() {
        let mut store = store();
        let mut root = create(&mut store);
        for v in 0..30 {
            root = insert(&mut store, root, v as usize, int(v), 4).unwrap();
        }
        for expected in 0..30 {
            let (next, removed) = erase(&mut store, root, 0).unwrap();
            assert_eq!(removed, int(expected));
            root = next;
            verify(&store, root).unwrap();
        }
        assert_eq!(size(&store, root).unwrap(), 0);
        assert!(matches!(&*store.node(root).unwrap(), Node::Leaf(_)));
    }

    #[test]
    fn set_swap_and_find() {
        let mut store = store();
        let mut root = create(&mut store);
        for v in 0..12 {
            root = insert(&mut store, root, v as usize, int(v), 3).unwrap();
        }
        root = set(&mut store, root, 5, int(-5)).unwrap();
        root = swap(&mut store, root, 0, 11).unwrap();
        assert_eq!(get(&store, root, 0).unwrap(), int(11));
        assert_eq!(get(&store, root, 11).unwrap(), int(0));
        assert_eq!(
            find_first(&store, root, &mut |e| *e == int(-5)).unwrap(),
            Some(5)
        );
        assert_eq!(find_first(&store, root, &mut |e| *e == int(99)).unwrap(), None);
        assert!(matches!(
            get(&store, root, 12),
            Err(CoreError::OutOfRange { index: 12, .. })
        ));
    }

    #[derive(Debug, Clone)]
    enum TreeOp {
        Insert(usize, i64),
        Set(usize, i64),
        Erase(usize),
        Swap(usize, usize),
    }

    fn tree_op() -> impl Strategy<Value = TreeOp> {
        prop_oneof![
            4 => (any::<usize>(), -100i64..100).prop_map(|(n, v)| TreeOp::Insert(n, v)),
            1 => (any::<usize>(), -100i64..100).prop_map(|(n, v)| TreeOp::Set(n, v)),
            3 => any::<usize>().prop_map(TreeOp::Erase),
            1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| TreeOp::Swap(a, b)),
        ]
    }

    proptest! {
        #[test]
        fn edits_match_vector_model(
            max_leaf in 2usize..6,
            ops in prop::collection::vec(tree_op(), 0..150),
        ) {
            let mut store = store();
            let mut root = create(&mut store);
            let mut model: Vec<i64> = Vec::new();
            for op in ops {
                match op {
                    TreeOp::Insert(n, v) => {
                        let ndx = n % (model.len() + 1);
                        root = insert(&mut store, root, ndx, int(v), max_leaf).unwrap();
                        model.insert(ndx, v);
                    }
                    _ if model.is_empty() => {}
                    TreeOp::Set(n, v) => {
                        let ndx = n % model.len();
                        root = set(&mut store, root, ndx, int(v)).unwrap();
                        model[ndx] = v;
                    }
                    TreeOp::Erase(n) => {
                        let ndx = n % model.len();
                        let (next, removed) = erase(&mut store, root, ndx).unwrap();
                        prop_assert_eq!(removed, int(model.remove(ndx)));
                        root = next;
                    }
                    TreeOp::Swap(a, b) => {
                        let (a, b) = (a % model.len(), b % model.len());
                        root = swap(&mut store, root, a, b).unwrap();
                        model.swap(a, b);
                    }
                }
                prop_assert_eq!(verify(&store, root).unwrap(), model.len());
            }
            prop_assert_eq!(ints(&store, root), model);
        }
    }
}
