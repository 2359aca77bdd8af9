//! Lists of mixed values, which may hold nested collections.

use super::base::StablePath;
use super::dictionary::Dictionary;
use super::list::List;
use crate::alloc::Element;
use crate::error::{CoreError, CoreResult};
use crate::transaction::{Transaction, TxnState};
use crate::value::{CollectionType, Mixed};
use std::ops::Deref;

/// Accessor for a list of [`Mixed`] values.
///
/// Every [`List`] operation is available through `Deref`. Writing
/// [`Mixed::List`] or [`Mixed::Dictionary`] creates an empty nested
/// collection, reachable through [`MixedList::get_list`] and
/// [`MixedList::get_dictionary`].
pub struct MixedList {
    list: List,
}

impl MixedList {
    pub(crate) fn new(txn: Transaction, path: StablePath, property: String) -> Self {
        Self {
            list: List::mixed(txn, path, property),
        }
    }

    pub(crate) fn from_list(list: List) -> Self {
        Self { list }
    }

    /// Inserts an empty nested collection before `ndx`.
    pub fn insert_collection(&self, ndx: usize, kind: CollectionType) -> CoreResult<()> {
        self.list.insert_any(ndx, marker(kind))
    }

    /// Replaces the element at `ndx` with an empty nested collection.
    pub fn set_collection(&self, ndx: usize, kind: CollectionType) -> CoreResult<()> {
        self.list.set_any(ndx, marker(kind)).map(|_| ())
    }

    /// Accessor for the nested list at `ndx`.
    pub fn get_list(&self, ndx: usize) -> CoreResult<MixedList> {
        let st = self.list.base.txn.lock();
        let path = self.nested_path(&st, ndx, CollectionType::List)?;
        Ok(MixedList::new(
            self.list.base.txn.clone(),
            path,
            self.list.spec.property.clone(),
        ))
    }

    /// Accessor for the nested dictionary at `ndx`.
    pub fn get_dictionary(&self, ndx: usize) -> CoreResult<Dictionary> {
        let st = self.list.base.txn.lock();
        let path = self.nested_path(&st, ndx, CollectionType::Dictionary)?;
        Ok(Dictionary::mixed(
            self.list.base.txn.clone(),
            path,
            self.list.spec.property.clone(),
        ))
    }

    /// Stable key of the nested collection at `ndx`; `None` for plain values.
    pub fn get_key(&self, ndx: usize) -> CoreResult<Option<i64>> {
        let st = self.list.base.txn.lock();
        Ok(match self.list.element_in(&st, ndx)? {
            Element::Nested { key, .. } => Some(key),
            Element::Value(_) => None,
        })
    }

    fn nested_path(&self, st: &TxnState, ndx: usize, expected: CollectionType) -> CoreResult<StablePath> {
        match self.list.element_in(st, ndx)? {
            Element::Nested { kind, key, .. } if kind == expected => self.list.base.child_path(st, key),
            other => Err(CoreError::type_mismatch(
                marker(expected).type_name(),
                other.to_mixed().type_name(),
            )),
        }
    }
}

impl Deref for MixedList {
    type Target = List;

    fn deref(&self) -> &List {
        &self.list
    }
}

pub(crate) const fn marker(kind: CollectionType) -> Mixed {
    match kind {
        CollectionType::List => Mixed::List,
        CollectionType::Dictionary => Mixed::Dictionary,
    }
}
