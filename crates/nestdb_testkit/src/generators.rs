//! Property-based test generators using proptest.
//!
//! Operations carry raw indices; [`ListOp::resolve`] maps them onto the
//! current size so that every generated sequence applies cleanly.

use nestdb_core::{CollectionType, Mixed};
use proptest::prelude::*;

/// Strategy for scalar mixed values, null included.
pub fn scalar_strategy() -> impl Strategy<Value = Mixed> + Clone {
    prop_oneof![
        Just(Mixed::Null),
        any::<bool>().prop_map(Mixed::Bool),
        (-1000i64..1000).prop_map(Mixed::Int),
        (-1.0e6f64..1.0e6).prop_map(Mixed::Double),
        "[a-z]{0,8}".prop_map(Mixed::String),
    ]
}

/// Strategy for small integers.
pub fn int_strategy() -> impl Strategy<Value = i64> + Clone {
    -50i64..50
}

/// Strategy for dictionary keys drawn from a small alphabet, so that
/// sequences hit existing keys often.
pub fn dict_key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

/// Strategy for a nested collection kind.
pub fn collection_type_strategy() -> impl Strategy<Value = CollectionType> {
    prop_oneof![Just(CollectionType::List), Just(CollectionType::Dictionary)]
}

/// A list edit with unresolved indices.
#[derive(Debug, Clone)]
pub enum ListOp {
    /// Insert before a position (`ndx % (size + 1)`).
    Insert(usize, Mixed),
    /// Overwrite a position.
    Set(usize, Mixed),
    /// Remove a position.
    Remove(usize),
    /// Move one element.
    Move(usize, usize),
    /// Exchange two elements.
    Swap(usize, usize),
    /// Remove everything.
    Clear,
}

/// A list edit with indices valid for the current size.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedListOp {
    /// Insert before `ndx`.
    Insert(usize, Mixed),
    /// Overwrite `ndx`.
    Set(usize, Mixed),
    /// Remove `ndx`.
    Remove(usize),
    /// Move from the first index to the second.
    Move(usize, usize),
    /// Exchange two positions.
    Swap(usize, usize),
    /// Remove everything.
    Clear,
}

impl ListOp {
    /// Maps raw indices onto a list of `size` elements. Returns `None` for
    /// edits that need an element when the list is empty.
    pub fn resolve(&self, size: usize) -> Option<ResolvedListOp> {
        Some(match self {
            ListOp::Insert(ndx, value) => ResolvedListOp::Insert(ndx % (size + 1), value.clone()),
            ListOp::Clear => ResolvedListOp::Clear,
            _ if size == 0 => return None,
            ListOp::Set(ndx, value) => ResolvedListOp::Set(ndx % size, value.clone()),
            ListOp::Remove(ndx) => ResolvedListOp::Remove(ndx % size),
            ListOp::Move(from, to) => ResolvedListOp::Move(from % size, to % size),
            ListOp::Swap(a, b) => ResolvedListOp::Swap(a % size, b % size),
        })
    }
}

impl ResolvedListOp {
    /// Applies the edit to a plain vector.
    pub fn apply_to<T: Clone>(&self, model: &mut Vec<T>, convert: impl Fn(&Mixed) -> T) {
        match self {
            ResolvedListOp::Insert(ndx, value) => model.insert(*ndx, convert(value)),
            ResolvedListOp::Set(ndx, value) => model[*ndx] = convert(value),
            ResolvedListOp::Remove(ndx) => {
                model.remove(*ndx);
            }
            ResolvedListOp::Move(from, to) => {
                let value = model.remove(*from);
                model.insert(*to, value);
            }
            ResolvedListOp::Swap(a, b) => model.swap(*a, *b),
            ResolvedListOp::Clear => model.clear(),
        }
    }
}

/// Strategy for list edits whose values come from `values`.
pub fn list_op_strategy<S>(values: S) -> impl Strategy<Value = ListOp>
where
    S: Strategy<Value = Mixed> + Clone,
{
    let ndx = 0usize..64;
    prop_oneof![
        4 => (ndx.clone(), values.clone()).prop_map(|(n, v)| ListOp::Insert(n, v)),
        2 => (ndx.clone(), values).prop_map(|(n, v)| ListOp::Set(n, v)),
        2 => ndx.clone().prop_map(ListOp::Remove),
        2 => (ndx.clone(), ndx.clone()).prop_map(|(a, b)| ListOp::Move(a, b)),
        2 => (ndx.clone(), ndx).prop_map(|(a, b)| ListOp::Swap(a, b)),
        1 => Just(ListOp::Clear),
    ]
}

/// Strategy for a sequence of list edits over scalar values.
pub fn list_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<ListOp>> {
    prop::collection::vec(list_op_strategy(scalar_strategy()), 0..max_len)
}

/// A dictionary edit.
#[derive(Debug, Clone)]
pub enum DictOp {
    /// Insert or overwrite a key.
    Insert(String, Mixed),
    /// Erase a key if present.
    Erase(String),
    /// Put an empty nested collection under a key.
    InsertCollection(String, CollectionType),
    /// Remove everything.
    Clear,
}

/// Strategy for a sequence of dictionary edits.
pub fn dict_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<DictOp>> {
    let op = prop_oneof![
        5 => (dict_key_strategy(), scalar_strategy()).prop_map(|(k, v)| DictOp::Insert(k, v)),
        3 => dict_key_strategy().prop_map(DictOp::Erase),
        1 => (dict_key_strategy(), collection_type_strategy())
            .prop_map(|(k, c)| DictOp::InsertCollection(k, c)),
        1 => Just(DictOp::Clear),
    ];
    prop::collection::vec(op, 0..max_len)
}

/// Strategy for which of `count` link targets to invalidate.
pub fn tombstone_mask_strategy(count: usize) -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_wraps_indices() {
        assert_eq!(
            ListOp::Insert(7, Mixed::Int(1)).resolve(3),
            Some(ResolvedListOp::Insert(3, Mixed::Int(1)))
        );
        assert_eq!(ListOp::Remove(7).resolve(3), Some(ResolvedListOp::Remove(1)));
        assert_eq!(ListOp::Swap(1, 2).resolve(0), None);
        assert_eq!(ListOp::Clear.resolve(0), Some(ResolvedListOp::Clear));
    }

    #[test]
    fn move_on_model_matches_remove_then_insert() {
        let mut model = vec![0, 1, 2, 3];
        ResolvedListOp::Move(0, 2).apply_to(&mut model, |_| 0);
        assert_eq!(model, vec![1, 2, 0, 3]);
        ResolvedListOp::Move(3, 0).apply_to(&mut model, |_| 0);
        assert_eq!(model, vec![3, 1, 2, 0]);
    }
}
