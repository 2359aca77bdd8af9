//! Ordered list accessors.
//!
//! [`List`] works on [`Mixed`] values and backs every list shape: typed
//! columns, mixed columns, nested mixed lists and (through
//! [`super::LnkLst`]) link lists. [`Lst`] adds a statically typed surface over
//! the closed set of [`ListElement`] kinds.

use super::aggregate;
use super::base::{self, CollectionBase, ElementSpec, StablePath, UpdateStatus};
use super::json::{self, JsonOutputMode, MixedFormatter};
use super::layout::{self, Layout};
use crate::alloc::Element;
use crate::bptree;
use crate::error::{CoreError, CoreResult};
use crate::replication::FullPath;
use crate::schema::ColumnSpec;
use crate::transaction::{Transaction, TxnState};
use crate::types::{ColKey, ObjKey, ObjLink, TableKey};
use crate::value::{default_value, CollectionType, DataType, Mixed, ObjectId, Timestamp};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::marker::PhantomData;
use uuid::Uuid;

/// Accessor for a list stored in a column or nested in a mixed value.
pub struct List {
    pub(crate) base: CollectionBase,
    pub(crate) spec: ElementSpec,
}

impl List {
    pub(crate) fn for_column(txn: Transaction, owner: ObjLink, col: ColKey, spec: &ColumnSpec) -> Self {
        let layout = if spec.data_type == DataType::Mixed {
            Layout::MixedList
        } else {
            Layout::TypedList
        };
        Self {
            base: CollectionBase::new(txn, StablePath::new(owner, col), layout),
            spec: ElementSpec::for_column(spec),
        }
    }

    /// A list of mixed values at `path`: a mixed column or a nested entry.
    pub(crate) fn mixed(txn: Transaction, path: StablePath, property: String) -> Self {
        Self {
            base: CollectionBase::new(txn, path, Layout::MixedList),
            spec: ElementSpec::mixed(property),
        }
    }

    fn owner(&self) -> ObjLink {
        self.base.path.owner
    }

    /// Number of elements; 0 when detached.
    pub fn size(&self) -> CoreResult<usize> {
        self.base.read(|st, top| base::size(st, self.base.layout, top))
    }

    /// Returns true when the list has no elements.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Element at `ndx`. Nested collections read as their marker.
    pub fn get(&self, ndx: usize) -> CoreResult<Mixed> {
        let st = self.base.txn.lock();
        let element = self.element_in(&st, ndx)?;
        Ok(base::visible(self.base.layout, &element))
    }

    /// Same as [`List::get`].
    pub fn get_any(&self, ndx: usize) -> CoreResult<Mixed> {
        self.get(ndx)
    }

    /// Returns true if the element at `ndx` is null.
    pub fn is_null(&self, ndx: usize) -> CoreResult<bool> {
        Ok(self.get(ndx)?.is_null())
    }

    /// All elements in order.
    pub fn to_vec(&self) -> CoreResult<Vec<Mixed>> {
        self.base.read(|st, top| {
            Ok(base::values(st, self.base.layout, top)?
                .iter()
                .map(|e| base::visible(self.base.layout, e))
                .collect())
        })
    }

    /// Iterates over a snapshot of the elements.
    pub fn iter(&self) -> CoreResult<std::vec::IntoIter<Mixed>> {
        Ok(self.to_vec()?.into_iter())
    }

    /// Position of the first element equal to `value`.
    pub fn find_first(&self, value: impl Into<Mixed>) -> CoreResult<Option<usize>> {
        self.find_any(&value.into())
    }

    /// Position of the first element equal to `value`. In mixed lists a null
    /// needle also matches unresolved links.
    pub fn find_any(&self, value: &Mixed) -> CoreResult<Option<usize>> {
        let st = self.base.txn.lock();
        Ok(self.find_in(&st, value)?.into_iter().next())
    }

    /// Positions of every element equal to `value`.
    pub fn find_all(&self, value: impl Into<Mixed>) -> CoreResult<Vec<usize>> {
        let st = self.base.txn.lock();
        self.find_in(&st, &value.into())
    }

    /// Smallest non-null element.
    pub fn min(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::min(self.spec.data_type, &self.to_vec()?))
    }

    /// Largest non-null element.
    pub fn max(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::max(self.spec.data_type, &self.to_vec()?))
    }

    /// Sum of the numeric elements; zero for an empty list.
    pub fn sum(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::sum(self.spec.data_type, &self.to_vec()?))
    }

    /// Mean of the numeric elements.
    pub fn avg(&self) -> CoreResult<Option<Mixed>> {
        Ok(aggregate::avg(self.spec.data_type, &self.to_vec()?))
    }

    /// Index permutation that orders the list. Ties keep list order.
    pub fn sort(&self, ascending: bool) -> CoreResult<Vec<usize>> {
        Ok(aggregate::sort_indices(&self.to_vec()?, ascending))
    }

    /// Indices of the first occurrence of each value, optionally sorted.
    pub fn distinct(&self, order: Option<bool>) -> CoreResult<Vec<usize>> {
        Ok(aggregate::distinct_indices(&self.to_vec()?, order))
    }

    /// Exports the list as JSON.
    pub fn to_json(&self, mode: JsonOutputMode) -> CoreResult<String> {
        let mut out = String::new();
        self.to_json_with(&mut out, mode, &json::write_mixed)?;
        Ok(out)
    }

    /// Exports the list as JSON, formatting plain values with `formatter`.
    pub fn to_json_with(
        &self,
        out: &mut String,
        mode: JsonOutputMode,
        formatter: MixedFormatter<'_>,
    ) -> CoreResult<()> {
        self.base
            .read(|st, top| json::write_collection(st, out, self.base.layout, top, mode, formatter))
    }

    /// Element kind.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.spec.data_type
    }

    /// Whether elements may be null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.spec.nullable
    }

    /// Always [`CollectionType::List`].
    #[must_use]
    pub fn collection_type(&self) -> CollectionType {
        CollectionType::List
    }

    /// Returns true while the owner and the list exist.
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

    /// Nesting level; 1 for a column list.
    #[must_use]
    pub fn get_level(&self) -> usize {
        self.base.path.level()
    }

    /// Overwrites the element at `ndx` and returns the old value.
    ///
    /// Writing an identical value changes nothing.
    pub fn set(&self, ndx: usize, value: impl Into<Mixed>) -> CoreResult<Mixed> {
        self.set_any(ndx, value.into())
    }

    /// Same as [`List::set`] for an already dynamic value.
    pub fn set_any(&self, ndx: usize, value: Mixed) -> CoreResult<Mixed> {
        self.base.write(|st| self.set_in(st, ndx, value, false))
    }

    /// Sets the element at `ndx` to null.
    pub fn set_null(&self, ndx: usize) -> CoreResult<Mixed> {
        self.set_any(ndx, Mixed::Null)
    }

    /// Inserts before `ndx`; `ndx == size` appends.
    pub fn insert(&self, ndx: usize, value: impl Into<Mixed>) -> CoreResult<()> {
        self.insert_any(ndx, value.into())
    }

    /// Same as [`List::insert`] for an already dynamic value.
    pub fn insert_any(&self, ndx: usize, value: Mixed) -> CoreResult<()> {
        self.base.write(|st| self.insert_in(st, ndx, value, false))
    }

    /// Inserts a null before `ndx`.
    pub fn insert_null(&self, ndx: usize) -> CoreResult<()> {
        self.insert_any(ndx, Mixed::Null)
    }

    /// Appends a value.
    pub fn add(&self, value: impl Into<Mixed>) -> CoreResult<()> {
        let value = value.into();
        self.base.write(|st| {
            let size = self.size_in(st)?;
            self.insert_in(st, size, value, false)
        })
    }

    /// Removes the element at `ndx` and returns it.
    pub fn remove(&self, ndx: usize) -> CoreResult<Mixed> {
        self.base.write(|st| self.remove_in(st, ndx))
    }

    /// Removes the elements in `from..to`, last first.
    pub fn remove_range(&self, from: usize, to: usize) -> CoreResult<()> {
        self.base.write(|st| self.remove_range_in(st, from, to))
    }

    /// Moves the element at `from` so that it ends up at `to`.
    pub fn move_item(&self, from: usize, to: usize) -> CoreResult<()> {
        self.base.write(|st| self.move_in(st, from, to))
    }

    /// Exchanges two elements.
    pub fn swap(&self, a: usize, b: usize) -> CoreResult<()> {
        self.base.write(|st| self.swap_in(st, a, b))
    }

    /// Grows with default values or shrinks from the tail.
    pub fn resize(&self, new_size: usize) -> CoreResult<()> {
        self.base.write(|st| {
            let size = self.size_in(st)?;
            if new_size < size {
                return self.remove_range_in(st, new_size, size);
            }
            for ndx in size..new_size {
                let value = default_value(self.spec.data_type, self.spec.nullable);
                self.insert_in(st, ndx, value, false)?;
            }
            Ok(())
        })
    }

    /// Removes every element.
    pub fn clear(&self) -> CoreResult<()> {
        self.base.write(|st| self.clear_in(st))
    }

    pub(crate) fn size_in(&self, st: &TxnState) -> CoreResult<usize> {
        let top = self.base.current(st)?;
        base::size(st, self.base.layout, top)
    }

    pub(crate) fn elements_in(&self, st: &TxnState) -> CoreResult<Vec<Element>> {
        let top = self.base.current(st)?;
        base::values(st, self.base.layout, top)
    }

    pub(crate) fn element_in(&self, st: &TxnState, ndx: usize) -> CoreResult<Element> {
        let top = self.base.current(st)?;
        let size = base::size(st, self.base.layout, top)?;
        match top {
            Some(top) if ndx < size => {
                let values = layout::values_tree(&st.store, self.base.layout, top)?;
                bptree::get(&st.store, values, ndx)
            }
            _ => Err(CoreError::out_of_range("get", ndx, size)),
        }
    }

    pub(crate) fn find_in(&self, st: &TxnState, needle: &Mixed) -> CoreResult<Vec<usize>> {
        let layout = self.base.layout;
        let null_matches_unresolved = needle.is_null() && layout != Layout::TypedList;
        Ok(self
            .elements_in(st)?
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                let value = e.to_mixed();
                (null_matches_unresolved && value.is_unresolved_link())
                    || value.total_cmp(needle) == Ordering::Equal
            })
            .map(|(ndx, _)| ndx)
            .collect())
    }

    pub(crate) fn set_in(
        &self,
        st: &mut TxnState,
        ndx: usize,
        value: Mixed,
        allow_embedded: bool,
    ) -> CoreResult<Mixed> {
        let layout = self.base.layout;
        let top = self.base.attached_top(st)?;
        let size = base::size(st, layout, base::stored(top))?;
        if ndx >= size {
            return Err(CoreError::out_of_range("set", ndx, size));
        }
        self.spec.check(st, &self.base, &value, allow_embedded)?;
        let values = layout::values_tree(&st.store, layout, top)?;
        let old = bptree::get(&st.store, values, ndx)?;
        if base::unchanged(&old, &value) {
            return Ok(base::visible(layout, &old));
        }

        self.base.replicate(st, |r, path| r.list_set(path, ndx, &value))?;
        let (top, element) = base::make_element(st, top, &value)?;
        let values = layout::values_tree(&st.store, layout, top)?;
        let values = bptree::set(&mut st.store, values, ndx, element)?;
        let new_top = layout::replace_values(&mut st.store, layout, top, values)?;
        let structural = value.collection_type().is_some() || matches!(old, Element::Nested { .. });
        self.base.commit_top(st, new_top, structural)?;
        st.link_value(&value, self.owner(), self.base.path.col)?;
        self.base.release(st, std::slice::from_ref(&old))?;
        Ok(base::visible(layout, &old))
    }

    pub(crate) fn insert_in(
        &self,
        st: &mut TxnState,
        ndx: usize,
        value: Mixed,
        allow_embedded: bool,
    ) -> CoreResult<()> {
        let layout = self.base.layout;
        let size = self.size_in(st)?;
        self.base.attached_top(st)?;
        if ndx > size {
            return Err(CoreError::out_of_range("insert", ndx, size));
        }
        self.spec.check(st, &self.base, &value, allow_embedded)?;

        self.base.replicate(st, |r, path| r.list_insert(path, ndx, &value))?;
        let top = self.base.ensure_created(st)?;
        let (top, element) = base::make_element(st, top, &value)?;
        let values = layout::values_tree(&st.store, layout, top)?;
        let max_leaf = st.config().max_leaf_size;
        let values = bptree::insert(&mut st.store, values, ndx, element, max_leaf)?;
        let new_top = layout::replace_values(&mut st.store, layout, top, values)?;
        self.base.commit_top(st, new_top, true)?;
        st.link_value(&value, self.owner(), self.base.path.col)
    }

    pub(crate) fn remove_in(&self, st: &mut TxnState, ndx: usize) -> CoreResult<Mixed> {
        let layout = self.base.layout;
        let top = self.base.attached_top(st)?;
        let size = base::size(st, layout, base::stored(top))?;
        if ndx >= size {
            return Err(CoreError::out_of_range("remove", ndx, size));
        }
        self.base.replicate(st, |r, path| r.list_erase(path, ndx))?;
        let values = layout::values_tree(&st.store, layout, top)?;
        let (values, old) = bptree::erase(&mut st.store, values, ndx)?;
        let new_top = layout::replace_values(&mut st.store, layout, top, values)?;
        self.base.commit_top(st, new_top, true)?;
        self.base.release(st, std::slice::from_ref(&old))?;
        Ok(base::visible(layout, &old))
    }

    pub(crate) fn remove_range_in(&self, st: &mut TxnState, from: usize, to: usize) -> CoreResult<()> {
        let size = self.size_in(st)?;
        if from > to || to > size {
            return Err(CoreError::out_of_range("remove", to, size));
        }
        for ndx in (from..to).rev() {
            self.remove_in(st, ndx)?;
        }
        Ok(())
    }

    pub(crate) fn move_in(&self, st: &mut TxnState, from: usize, to: usize) -> CoreResult<()> {
        let layout = self.base.layout;
        let top = self.base.attached_top(st)?;
        let size = base::size(st, layout, base::stored(top))?;
        if from >= size {
            return Err(CoreError::out_of_range("move", from, size));
        }
        if to >= size {
            return Err(CoreError::out_of_range("move", to, size));
        }
        if from == to {
            return Ok(());
        }
        self.base.replicate(st, |r, path| r.list_move(path, from, to))?;

        // A placeholder at the destination, then swap, then drop the source.
        let (from, to) = if to > from { (from, to + 1) } else { (from + 1, to) };
        let max_leaf = st.config().max_leaf_size;
        let values = layout::values_tree(&st.store, layout, top)?;
        let values = bptree::insert(&mut st.store, values, to, Element::NULL, max_leaf)?;
        let values = bptree::swap(&mut st.store, values, from, to)?;
        let (values, _) = bptree::erase(&mut st.store, values, from)?;
        let new_top = layout::replace_values(&mut st.store, layout, top, values)?;
        self.base.commit_top(st, new_top, true)
    }

    pub(crate) fn swap_in(&self, st: &mut TxnState, a: usize, b: usize) -> CoreResult<()> {
        let layout = self.base.layout;
        let top = self.base.attached_top(st)?;
        let size = base::size(st, layout, base::stored(top))?;
        for ndx in [a, b] {
            if ndx >= size {
                return Err(CoreError::out_of_range("swap", ndx, size));
            }
        }
        if a == b {
            return Ok(());
        }
        let (lo, hi) = (a.min(b), a.max(b));
        self.base.replicate(st, |r, path| {
            r.list_move(path, hi, lo);
            if hi - lo > 1 {
                r.list_move(path, lo + 1, hi);
            }
        })?;
        let values = layout::values_tree(&st.store, layout, top)?;
        let values = bptree::swap(&mut st.store, values, lo, hi)?;
        let new_top = layout::replace_values(&mut st.store, layout, top, values)?;
        self.base.commit_top(st, new_top, false)
    }

    pub(crate) fn clear_in(&self, st: &mut TxnState) -> CoreResult<()> {
        let layout = self.base.layout;
        let top = self.base.attached_top(st)?;
        let old = base::values(st, layout, base::stored(top))?;
        if old.is_empty() {
            return Ok(());
        }
        self.base.replicate(st, |r, path| r.list_clear(path, old.len()))?;
        let values = bptree::clear(&mut st.store);
        let new_top = layout::replace_values(&mut st.store, layout, top, values)?;
        self.base.commit_top(st, new_top, true)?;
        self.base.release(st, &old)
    }
}

/// A value kind a [`Lst`] can hold.
pub trait ListElement: Sized {
    /// Column kind holding this type.
    const DATA_TYPE: DataType;
    /// Whether the column must be nullable.
    const NULLABLE: bool = false;

    /// Dynamic form. `target` is the link target of `Link` columns.
    fn into_mixed(self, target: Option<TableKey>) -> Mixed;

    /// Static form; `None` if `value` is of another kind.
    fn from_mixed(value: Mixed) -> Option<Self>;
}

macro_rules! list_element {
    ($ty:ty, $data_type:ident, $variant:ident) => {
        impl ListElement for $ty {
            const DATA_TYPE: DataType = DataType::$data_type;

            fn into_mixed(self, _target: Option<TableKey>) -> Mixed {
                Mixed::$variant(self)
            }

            fn from_mixed(value: Mixed) -> Option<Self> {
                match value {
                    Mixed::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl ListElement for Option<$ty> {
            const DATA_TYPE: DataType = DataType::$data_type;
            const NULLABLE: bool = true;

            fn into_mixed(self, target: Option<TableKey>) -> Mixed {
                self.map_or(Mixed::Null, |v| v.into_mixed(target))
            }

            fn from_mixed(value: Mixed) -> Option<Self> {
                match value {
                    Mixed::Null => Some(None),
                    other => <$ty>::from_mixed(other).map(Some),
                }
            }
        }
    };
}

list_element!(i64, Int, Int);
list_element!(bool, Bool, Bool);
list_element!(f32, Float, Float);
list_element!(f64, Double, Double);
list_element!(Decimal, Decimal, Decimal);
list_element!(String, String, String);
list_element!(Vec<u8>, Binary, Binary);
list_element!(Timestamp, Timestamp, Timestamp);
list_element!(ObjectId, ObjectId, ObjectId);
list_element!(Uuid, Uuid, Uuid);

impl ListElement for ObjKey {
    const DATA_TYPE: DataType = DataType::Link;

    fn into_mixed(self, target: Option<TableKey>) -> Mixed {
        match target {
            Some(table) => Mixed::link_to(table, self),
            None => Mixed::Null,
        }
    }

    fn from_mixed(value: Mixed) -> Option<Self> {
        value.as_link().map(|link| link.key)
    }
}

impl ListElement for ObjLink {
    const DATA_TYPE: DataType = DataType::TypedLink;

    fn into_mixed(self, _target: Option<TableKey>) -> Mixed {
        Mixed::Link(self)
    }

    fn from_mixed(value: Mixed) -> Option<Self> {
        value.as_link()
    }
}

impl ListElement for Mixed {
    const DATA_TYPE: DataType = DataType::Mixed;
    const NULLABLE: bool = true;

    fn into_mixed(self, _target: Option<TableKey>) -> Mixed {
        self
    }

    fn from_mixed(value: Mixed) -> Option<Self> {
        Some(value)
    }
}

/// Statically typed list accessor.
pub struct Lst<T> {
    list: List,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ListElement> Lst<T> {
    /// Wraps `list` after checking that `T` matches its column.
    pub(crate) fn new(list: List) -> CoreResult<Self> {
        let nullable_matches = T::NULLABLE == list.spec.nullable || T::DATA_TYPE.is_link();
        if list.spec.data_type != T::DATA_TYPE || !nullable_matches {
            return Err(CoreError::type_mismatch(
                format!("{}{}", list.spec.data_type, if list.spec.nullable { "?" } else { "" }),
                format!("{}{}", T::DATA_TYPE, if T::NULLABLE { "?" } else { "" }),
            ));
        }
        Ok(Self {
            list,
            _marker: PhantomData,
        })
    }

    fn typed(&self, value: Mixed) -> CoreResult<T> {
        let actual = value.type_name();
        T::from_mixed(value).ok_or_else(|| CoreError::type_mismatch(T::DATA_TYPE.to_string(), actual))
    }

    /// The untyped accessor.
    #[must_use]
    pub fn as_list(&self) -> &List {
        &self.list
    }

    /// Number of elements.
    pub fn size(&self) -> CoreResult<usize> {
        self.list.size()
    }

    /// Returns true when the list has no elements.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.list.is_empty()
    }

    /// Element at `ndx`.
    pub fn get(&self, ndx: usize) -> CoreResult<T> {
        self.typed(self.list.get(ndx)?)
    }

    /// Overwrites the element at `ndx`; returns the old one.
    pub fn set(&self, ndx: usize, value: T) -> CoreResult<T> {
        let old = self.list.set_any(ndx, value.into_mixed(self.list.spec.target))?;
        self.typed(old)
    }

    /// Inserts before `ndx`.
    pub fn insert(&self, ndx: usize, value: T) -> CoreResult<()> {
        self.list.insert_any(ndx, value.into_mixed(self.list.spec.target))
    }

    /// Appends.
    pub fn add(&self, value: T) -> CoreResult<()> {
        self.list.add(value.into_mixed(self.list.spec.target))
    }

    /// Removes and returns the element at `ndx`.
    pub fn remove(&self, ndx: usize) -> CoreResult<T> {
        let old = self.list.remove(ndx)?;
        self.typed(old)
    }

    /// Position of the first element equal to `value`.
    pub fn find_first(&self, value: T) -> CoreResult<Option<usize>> {
        self.list.find_any(&value.into_mixed(self.list.spec.target))
    }

    /// All elements in order.
    pub fn to_vec(&self) -> CoreResult<Vec<T>> {
        self.list
            .to_vec()?
            .into_iter()
            .map(|v| self.typed(v))
            .collect()
    }
}
