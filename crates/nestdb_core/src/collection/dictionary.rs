//! String-keyed dictionaries.
//!
//! Keys live in their own tree, sorted and unique, parallel to the value
//! tree. Lookups binary-search the key tree; iteration is in key order.

use super::aggregate;
use super::base::{self, CollectionBase, ElementSpec, StablePath, UpdateStatus};
use super::json::{self, JsonOutputMode, MixedFormatter};
use super::layout::{self, Layout};
use super::mixed_list::{marker, MixedList};
use crate::alloc::Element;
use crate::bptree;
use crate::error::{CoreError, CoreResult};
use crate::replication::FullPath;
use crate::schema::ColumnSpec;
use crate::table::Obj;
use crate::transaction::{Transaction, TxnState};
use crate::types::{ColKey, ObjLink, Ref, TableKey};
use crate::value::{CollectionType, DataType, Mixed};
use std::cmp::Ordering;

/// Accessor for a dictionary stored in a column or nested in a mixed value.
pub struct Dictionary {
    pub(crate) base: CollectionBase,
    spec: ElementSpec,
}

impl Dictionary {
    pub(crate) fn for_column(txn: Transaction, owner: ObjLink, col: ColKey, spec: &ColumnSpec) -> Self {
        Self {
            base: CollectionBase::new(txn, StablePath::new(owner, col), Layout::Dictionary),
            spec: ElementSpec::for_column(spec),
        }
    }

    pub(crate) fn mixed(txn: Transaction, path: StablePath, property: String) -> Self {
        Self {
            base: CollectionBase::new(txn, path, Layout::Dictionary),
            spec: ElementSpec::mixed(property),
        }
    }

    /// Number of entries; 0 when detached.
    pub fn size(&self) -> CoreResult<usize> {
        self.base.read(|st, top| base::size(st, Layout::Dictionary, top))
    }

    /// Returns true when the dictionary has no entries.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Value under `key`.
    pub fn get(&self, key: &str) -> CoreResult<Mixed> {
        self.try_get(key)?.ok_or_else(|| CoreError::key_not_found(key))
    }

    /// Value under `key`, or `None` if absent. A stored null is `Some(Null)`.
    pub fn try_get(&self, key: &str) -> CoreResult<Option<Mixed>> {
        let st = self.base.txn.lock();
        match self.lookup(&st, key)? {
            Some((_, element)) => Ok(Some(base::visible(Layout::Dictionary, &element))),
            None => Ok(None),
        }
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> CoreResult<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Position of `key` in key order.
    pub fn find(&self, key: &str) -> CoreResult<Option<usize>> {
        let st = self.base.txn.lock();
        Ok(self.lookup(&st, key)?.map(|(ndx, _)| ndx))
    }

    /// Position of the first value equal to `value`. A null needle also
    /// matches unresolved links.
    pub fn find_any(&self, value: &Mixed) -> CoreResult<Option<usize>> {
        let st = self.base.txn.lock();
        let entries = self.entries_in(&st)?;
        Ok(entries.iter().position(|(_, element)| {
            let stored = element.to_mixed();
            (value.is_null() && stored.is_unresolved_link())
                || stored.total_cmp(value) == Ordering::Equal
        }))
    }

    /// Key of the first value equal to `value`.
    pub fn find_any_key(&self, value: &Mixed) -> CoreResult<Option<String>> {
        match self.find_any(value)? {
            Some(ndx) => self.get_key(ndx).map(Some),
            None => Ok(None),
        }
    }

    /// Key and value at position `ndx` in key order.
    pub fn get_pair(&self, ndx: usize) -> CoreResult<(String, Mixed)> {
        let st = self.base.txn.lock();
        let entries = self.entries_in(&st)?;
        let size = entries.len();
        entries
            .into_iter()
            .nth(ndx)
            .map(|(key, element)| (key, base::visible(Layout::Dictionary, &element)))
            .ok_or_else(|| CoreError::out_of_range("get_pair", ndx, size))
    }

    /// Key at position `ndx`.
    pub fn get_key(&self, ndx: usize) -> CoreResult<String> {
        self.get_pair(ndx).map(|(key, _)| key)
    }

    /// Value at position `ndx`.
    pub fn get_any(&self, ndx: usize) -> CoreResult<Mixed> {
        self.get_pair(ndx).map(|(_, value)| value)
    }

    /// Returns true if the value at position `ndx` is null.
    pub fn is_null(&self, ndx: usize) -> CoreResult<bool> {
        Ok(self.get_any(ndx)?.is_null())
    }

    /// Entries in key order.
    pub fn to_vec(&self) -> CoreResult<Vec<(String, Mixed)>> {
        let st = self.base.txn.lock();
        Ok(self
            .entries_in(&st)?
            .into_iter()
            .map(|(key, element)| (key, base::visible(Layout::Dictionary, &element)))
            .collect())
    }

    /// Iterates over a snapshot of the entries.
    pub fn iter(&self) -> CoreResult<std::vec::IntoIter<(String, Mixed)>> {
        Ok(self.to_vec()?.into_iter())
    }

    /// Keys in order.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        Ok(self.to_vec()?.into_iter().map(|(key, _)| key).collect())
    }

    /// Values in key order.
    pub fn values(&self) -> CoreResult<Vec<Mixed>> {
        Ok(self.to_vec()?.into_iter().map(|(_, value)| value).collect())
    }

    /// Smallest non-null value.
    pub fn min(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::min(self.spec.data_type, &self.values()?))
    }

    /// Largest non-null value.
    pub fn max(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::max(self.spec.data_type, &self.values()?))
    }

    /// Sum of the numeric values.
    pub fn sum(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::sum(self.spec.data_type, &self.values()?))
    }

    /// Mean of the numeric values.
    pub fn avg(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::avg(self.spec.data_type, &self.values()?))
    }

    /// Permutation of positions ordering the values.
    pub fn sort(&self, ascending: bool) -> CoreResult<Vec<usize>> {
        Ok(aggregate::sort_indices(&self.values()?, ascending))
    }

    /// Positions of the first occurrence of each value.
    pub fn distinct(&self, order: Option<bool>) -> CoreResult<Vec<usize>> {
        Ok(aggregate::distinct_indices(&self.values()?, order))
    }

    /// Permutation of positions ordering the keys.
    pub fn sort_keys(&self, ascending: bool) -> CoreResult<Vec<usize>> {
        Ok(aggregate::sort_indices(&self.key_values()?, ascending))
    }

    /// Positions of distinct keys. Keys are unique, so this is every position.
    pub fn distinct_keys(&self, order: Option<bool>) -> CoreResult<Vec<usize>> {
        Ok(aggregate::distinct_indices(&self.key_values()?, order))
    }

    fn key_values(&self) -> CoreResult<Vec<Mixed>> {
        Ok(self.keys()?.into_iter().map(Mixed::String).collect())
    }

    /// Always [`DataType::String`].
    #[must_use]
    pub fn key_data_type(&self) -> DataType {
        DataType::String
    }

    /// Kind of the values.
    #[must_use]
    pub fn value_data_type(&self) -> DataType {
        self.spec.data_type
    }

    /// Table a link-valued dictionary points into.
    pub(crate) fn link_target(&self) -> Option<TableKey> {
        self.spec.target.filter(|_| self.spec.data_type == DataType::Link)
    }

    /// Whether values may be null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.spec.nullable
    }

    /// Always [`CollectionType::Dictionary`].
    #[must_use]
    pub fn collection_type(&self) -> CollectionType {
        CollectionType::Dictionary
    }

    /// Exports the dictionary as a JSON object in key order.
    pub fn to_json(&self, mode: JsonOutputMode) -> CoreResult<String> {
        let mut out = String::new();
        self.to_json_with(&mut out, mode, &json::write_mixed)?;
        Ok(out)
    }

    /// Exports the dictionary, formatting plain values with `formatter`.
    pub fn to_json_with(
        &self,
        out: &mut String,
        mode: JsonOutputMode,
        formatter: MixedFormatter<'_>,
    ) -> CoreResult<()> {
        self.base
            .read(|st, top| json::write_collection(st, out, Layout::Dictionary, top, mode, formatter))
    }

    /// Returns true while the owner and the dictionary exist.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.base.is_attached()
    }

    /// Revalidates against the transaction.
    pub fn update_if_needed(&self) -> CoreResult<UpdateStatus> {
        self.base.update_if_needed()
    }

    /// Current positional path.
    pub fn get_path(&self) -> CoreResult<FullPath> {
        self.base.get_path()
    }

    /// Path that survives reordering of siblings.
    #[must_use]
    pub fn get_stable_path(&self) -> StablePath {
        self.base.path.clone()
    }

    /// Nesting level; 1 for a column dictionary.
    #[must_use]
    pub fn get_level(&self) -> usize {
        self.base.path.level()
    }

    /// The object a link value under `key` points at; `None` for null and
    /// unresolved links.
    pub fn get_object(&self, key: &str) -> CoreResult<Option<Obj>> {
        match self.get(key)? {
            Mixed::Null => Ok(None),
            Mixed::Link(link) if link.is_unresolved() => Ok(None),
            Mixed::Link(link) => Ok(Some(Obj::new(self.base.txn.clone(), link))),
            other => Err(CoreError::type_mismatch("link", other.type_name())),
        }
    }

    /// Accessor for the nested list under `key`.
    pub fn get_list(&self, key: &str) -> CoreResult<MixedList> {
        let st = self.base.txn.lock();
        let path = self.nested_path(&st, key, CollectionType::List)?;
        Ok(MixedList::new(self.base.txn.clone(), path, self.spec.property.clone()))
    }

    /// Accessor for the nested dictionary under `key`.
    pub fn get_dictionary(&self, key: &str) -> CoreResult<Dictionary> {
        let st = self.base.txn.lock();
        let path = self.nested_path(&st, key, CollectionType::Dictionary)?;
        Ok(Dictionary::mixed(self.base.txn.clone(), path, self.spec.property.clone()))
    }

    fn nested_path(&self, st: &TxnState, key: &str, expected: CollectionType) -> CoreResult<StablePath> {
        match self.lookup(st, key)? {
            Some((_, Element::Nested { kind, key, .. })) if kind == expected => self.base.child_path(st, key),
            Some((_, other)) => Err(CoreError::type_mismatch(
                marker(expected).type_name(),
                other.to_mixed().type_name(),
            )),
            None => Err(CoreError::key_not_found(key)),
        }
    }

    /// Inserts or overwrites `key`. Returns the position and whether the key
    /// is new; `false` means an existing value was replaced.
    pub fn insert(&self, key: &str, value: impl Into<Mixed>) -> CoreResult<(usize, bool)> {
        let value = value.into();
        self.base.write(|st| self.insert_in(st, key, value, false))
    }

    /// Puts an empty nested collection under `key`.
    pub fn insert_collection(&self, key: &str, kind: CollectionType) -> CoreResult<()> {
        self.insert(key, marker(kind)).map(|_| ())
    }

    /// Creates an embedded object and stores the only link to it under
    /// `key`. An embedded object previously stored there is deleted.
    pub fn create_and_insert_linked_object(&self, key: &str) -> CoreResult<Obj> {
        let link = self.base.write(|st| {
            let target = self.embedded_target(st)?;
            self.base.attached_top(st)?;
            let obj = st.create_object(target, true)?;
            let link = ObjLink::new(target, obj);
            self.insert_in(st, key, Mixed::Link(link), true)?;
            Ok(link)
        })?;
        Ok(Obj::new(self.base.txn.clone(), link))
    }

    /// Sets the value under an existing `key` to null.
    pub fn nullify(&self, key: &str) -> CoreResult<()> {
        self.base.write(|st| {
            if self.lookup(st, key)?.is_none() {
                return Err(CoreError::key_not_found(key));
            }
            self.insert_in(st, key, Mixed::Null, false).map(|_| ())
        })
    }

    /// Replaces the first link to `old` with a link to `new`. Returns false
    /// if no value links to `old`.
    pub fn replace_link(&self, old: ObjLink, new: ObjLink) -> CoreResult<bool> {
        self.base.write(|st| {
            let entries = self.entries_in(st)?;
            let found = entries
                .into_iter()
                .find(|(_, element)| matches!(element, Element::Value(Mixed::Link(link)) if *link == old));
            match found {
                Some((key, _)) => {
                    self.insert_in(st, &key, Mixed::Link(new), false)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// Removes `key`; fails if it is absent.
    pub fn erase(&self, key: &str) -> CoreResult<()> {
        if self.try_erase(key)? {
            Ok(())
        } else {
            Err(CoreError::key_not_found(key))
        }
    }

    /// Removes `key` if present.
    pub fn try_erase(&self, key: &str) -> CoreResult<bool> {
        self.base.write(|st| match self.lookup(st, key)? {
            Some((ndx, _)) => self.erase_in(st, ndx).map(|_| true),
            None => Ok(false),
        })
    }

    /// Removes the entry at position `ndx`.
    pub fn erase_at(&self, ndx: usize) -> CoreResult<()> {
        self.base.write(|st| {
            let size = self.entries_in(st)?.len();
            if ndx >= size {
                return Err(CoreError::out_of_range("erase", ndx, size));
            }
            self.erase_in(st, ndx)
        })
    }

    /// Removes every entry. Replication sees one clear.
    pub fn clear(&self) -> CoreResult<()> {
        self.base.write(|st| {
            let top = self.base.attached_top(st)?;
            let old = base::values(st, Layout::Dictionary, base::stored(top))?;
            if old.is_empty() {
                return Ok(());
            }
            self.base.replicate(st, |r, path| r.collection_clear(path))?;
            let keys = bptree::clear(&mut st.store);
            let values = bptree::clear(&mut st.store);
            let new_top = layout::replace_trees(&mut st.store, top, keys, values)?;
            self.base.commit_top(st, new_top, true)?;
            self.base.release(st, &old)
        })
    }

    fn entries_in(&self, st: &TxnState) -> CoreResult<Vec<(String, Element)>> {
        let Some(top) = self.base.current(st)? else {
            return Ok(Vec::new());
        };
        let keys = bptree::to_vec(&st.store, layout::keys_tree(&st.store, top)?)?;
        let values = base::values(st, Layout::Dictionary, Some(top))?;
        Ok(keys
            .iter()
            .map(|k| k.to_mixed().as_str().unwrap_or_default().to_string())
            .zip(values)
            .collect())
    }

    /// Binary search for `key`: `Ok(ndx)` if present, `Err(insertion point)`.
    fn search(st: &TxnState, top: Ref, key: &str) -> CoreResult<Result<usize, usize>> {
        let keys_tree = layout::keys_tree(&st.store, top)?;
        let (mut lo, mut hi) = (0, bptree::size(&st.store, keys_tree)?);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let candidate = bptree::get(&st.store, keys_tree, mid)?.to_mixed();
            match candidate.as_str().unwrap_or_default().cmp(key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(lo))
    }

    fn lookup(&self, st: &TxnState, key: &str) -> CoreResult<Option<(usize, Element)>> {
        let Some(top) = self.base.current(st)? else {
            return Ok(None);
        };
        match Self::search(st, top, key)? {
            Ok(ndx) => {
                let values = layout::values_tree(&st.store, Layout::Dictionary, top)?;
                Ok(Some((ndx, bptree::get(&st.store, values, ndx)?)))
            }
            Err(_) => Ok(None),
        }
    }

    fn embedded_target(&self, st: &TxnState) -> CoreResult<TableKey> {
        match (self.spec.data_type, self.spec.target) {
            (DataType::Link, Some(target)) if st.schema.table(target)?.embedded => Ok(target),
            _ => Err(CoreError::illegal_operation(format!(
                "'{}' does not hold embedded objects",
                self.spec.property
            ))),
        }
    }

    fn insert_in(&self, st: &mut TxnState, key: &str, value: Mixed, allow_embedded: bool) -> CoreResult<(usize, bool)> {
        self.base.attached_top(st)?;
        self.spec.check(st, &self.base, &value, allow_embedded)?;
        let top = self.base.ensure_created(st)?;
        let owner = self.base.path.owner;
        let col = self.base.path.col;

        match Self::search(st, top, key)? {
            Ok(ndx) => {
                let values = layout::values_tree(&st.store, Layout::Dictionary, top)?;
                let old = bptree::get(&st.store, values, ndx)?;
                if base::unchanged(&old, &value) {
                    return Ok((ndx, false));
                }
                self.base.replicate(st, |r, path| r.dictionary_set(path, key, &value))?;
                let (top, element) = base::make_element(st, top, &value)?;
                let values = layout::values_tree(&st.store, Layout::Dictionary, top)?;
                let values = bptree::set(&mut st.store, values, ndx, element)?;
                let new_top = layout::replace_values(&mut st.store, Layout::Dictionary, top, values)?;
                let structural = value.collection_type().is_some() || matches!(old, Element::Nested { .. });
                self.base.commit_top(st, new_top, structural)?;
                st.link_value(&value, owner, col)?;
                self.base.release(st, std::slice::from_ref(&old))?;
                Ok((ndx, false))
            }
            Err(ndx) => {
                self.base.replicate(st, |r, path| r.dictionary_insert(path, key, &value))?;
                let (top, element) = base::make_element(st, top, &value)?;
                let max_leaf = st.config().max_leaf_size;
                let keys = layout::keys_tree(&st.store, top)?;
                let keys = bptree::insert(&mut st.store, keys, ndx, Element::Value(Mixed::from(key)), max_leaf)?;
                let values = layout::values_tree(&st.store, Layout::Dictionary, top)?;
                let values = bptree::insert(&mut st.store, values, ndx, element, max_leaf)?;
                let new_top = layout::replace_trees(&mut st.store, top, keys, values)?;
                self.base.commit_top(st, new_top, true)?;
                st.link_value(&value, owner, col)?;
                Ok((ndx, true))
            }
        }
    }

    fn erase_in(&self, st: &mut TxnState, ndx: usize) -> CoreResult<()> {
        let top = self.base.attached_top(st)?;
        let keys = layout::keys_tree(&st.store, top)?;
        let key = bptree::get(&st.store, keys, ndx)?.to_mixed();
        let key = key.as_str().unwrap_or_default();
        self.base.replicate(st, |r, path| r.dictionary_erase(path, key))?;
        let (keys, _) = bptree::erase(&mut st.store, keys, ndx)?;
        let values = layout::values_tree(&st.store, Layout::Dictionary, top)?;
        let (values, old) = bptree::erase(&mut st.store, values, ndx)?;
        let new_top = layout::replace_trees(&mut st.store, top, keys, values)?;
        self.base.commit_top(st, new_top, true)?;
        self.base.release(st, std::slice::from_ref(&old))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::schema::TableSpec;

    struct Fixture {
        txn: Transaction,
        obj: Obj,
    }

    impl Fixture {
        fn dictionary(&self, name: &str) -> Dictionary {
            self.obj.get_dictionary(self.obj.col_key(name).unwrap()).unwrap()
        }
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let table = txn
            .add_table(
                TableSpec::new("Bag")
                    .column(ColumnSpec::dictionary("ints", DataType::Int))
                    .column(ColumnSpec::dictionary("any", DataType::Mixed)),
            )
            .unwrap();
        let obj = txn.create_object(table).unwrap();
        Fixture { txn, obj }
    }

    #[test]
    fn insert_overwrite_and_erase() {
        let f = fixture();
        let dict = f.dictionary("ints");
        assert_eq!(dict.insert("a", 1).unwrap(), (0, true));
        assert_eq!(dict.insert("a", 2).unwrap(), (0, false));
        assert_eq!(dict.get("a").unwrap(), Mixed::Int(2));
        dict.erase("a").unwrap();
        assert!(matches!(dict.get("a"), Err(CoreError::KeyNotFound { key }) if key == "a"));
        assert_eq!(dict.try_get("a").unwrap(), None);
        assert!(!dict.try_erase("a").unwrap());
        assert!(matches!(dict.erase("a"), Err(CoreError::KeyNotFound { .. })));
    }

    #[test]
    fn keys_stay_sorted() {
        let f = fixture();
        let dict = f.dictionary("ints");
        for (key, value) in [("m", 1), ("c", 2), ("x", 3), ("a", 4)] {
            dict.insert(key, value).unwrap();
        }
        assert_eq!(dict.keys().unwrap(), vec!["a", "c", "m", "x"]);
        assert_eq!(dict.find("m").unwrap(), Some(2));
        assert_eq!(dict.get_pair(1).unwrap(), ("c".to_string(), Mixed::Int(2)));
        assert_eq!(dict.sort_keys(false).unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(dict.sort(true).unwrap(), vec![2, 1, 3, 0]);
        assert!(matches!(dict.get_pair(4), Err(CoreError::OutOfRange { .. })));
    }

    #[test]
    fn null_is_not_absence() {
        let f = fixture();
        let dict = f.dictionary("any");
        dict.insert("n", Mixed::Null).unwrap();
        assert_eq!(dict.try_get("n").unwrap(), Some(Mixed::Null));
        assert!(dict.contains("n").unwrap());
        assert_eq!(dict.find_any(&Mixed::Null).unwrap(), Some(0));
        assert_eq!(dict.find_any_key(&Mixed::Null).unwrap(), Some("n".to_string()));
    }

    #[test]
    fn overwriting_with_the_same_value_does_not_bump() {
        let f = fixture();
        let dict = f.dictionary("ints");
        dict.insert("k", 7).unwrap();
        let before = f.txn.content_version();
        dict.insert("k", 7).unwrap();
        assert_eq!(f.txn.content_version(), before);
    }

    #[test]
    fn non_nullable_values_reject_null() {
        let f = fixture();
        let dict = f.dictionary("ints");
        assert!(matches!(
            dict.insert("k", Mixed::Null),
            Err(CoreError::PropertyNotNullable { .. })
        ));
        assert!(matches!(dict.insert("k", "text"), Err(CoreError::TypeMismatch { .. })));
    }

    #[test]
    fn nested_collections_by_key() {
        let f = fixture();
        let dict = f.dictionary("any");
        dict.insert_collection("list", CollectionType::List).unwrap();
        dict.insert_collection("dict", CollectionType::Dictionary).unwrap();
        dict.get_list("list").unwrap().add(1).unwrap();
        let inner = dict.get_dictionary("dict").unwrap();
        inner.insert("z", "deep").unwrap();

        dict.insert("a", 0).unwrap();
        assert_eq!(inner.get("z").unwrap(), Mixed::from("deep"));
        assert_eq!(inner.get_path().unwrap().to_string(), r#"table:0/obj:0/col:1["dict"]"#);
        assert!(matches!(dict.get_list("dict"), Err(CoreError::TypeMismatch { .. })));
        assert!(matches!(dict.get_list("missing"), Err(CoreError::KeyNotFound { .. })));
        assert_eq!(
            dict.to_json(JsonOutputMode::Json).unwrap(),
            r#"{"a":0,"dict":{"z":"deep"},"list":[1]}"#
        );
    }

    #[test]
    fn clear_and_aggregates() {
        let f = fixture();
        let dict = f.dictionary("ints");
        assert_eq!(dict.sum().unwrap(), Some(Mixed::Int(0)));
        assert_eq!(dict.avg().unwrap(), None);
        dict.insert("a", 3).unwrap();
        dict.insert("b", 5).unwrap();
        assert_eq!(dict.max().unwrap(), Some(Mixed::Int(5)));
        assert_eq!(dict.avg().unwrap(), Some(Mixed::Double(4.0)));
        dict.erase_at(0).unwrap();
        assert_eq!(dict.keys().unwrap(), vec!["b"]);
        dict.clear().unwrap();
        assert!(dict.is_empty().unwrap());
        assert_eq!(dict.key_data_type(), DataType::String);
        assert_eq!(dict.value_data_type(), DataType::Int);
    }
}
