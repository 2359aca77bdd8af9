//! Object accessor.

use crate::alloc::Element;
use crate::collection::{
    CollectionHandle, Dictionary, DictionaryLinkValues, List, ListElement, LnkLst, Lst, MixedList,
    StablePath,
};
use crate::error::{CoreError, CoreResult};
use crate::schema::ColumnSpec;
use crate::transaction::{Transaction, TxnState};
use crate::types::{ColKey, ObjKey, ObjLink, TableKey};
use crate::value::{CollectionType, DataType, Mixed};

/// Handle to one object of a transaction.
///
/// Like collection accessors, an `Obj` does not pin the object: every call
/// checks that it still exists.
#[derive(Clone)]
pub struct Obj {
    txn: Transaction,
    link: ObjLink,
}

impl Obj {
    pub(crate) fn new(txn: Transaction, link: ObjLink) -> Self {
        Self { txn, link }
    }

    /// Key within its table.
    #[must_use]
    pub fn key(&self) -> ObjKey {
        self.link.key
    }

    /// Table of the object.
    #[must_use]
    pub fn table(&self) -> TableKey {
        self.link.table
    }

    /// Table and key.
    #[must_use]
    pub fn link(&self) -> ObjLink {
        self.link
    }

    /// Returns true while the object exists in the transaction.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let st = self.txn.lock();
        st.check_open().is_ok() && st.is_live(self.link).unwrap_or(false)
    }

    /// Looks up a column of this object's table by name.
    pub fn col_key(&self, name: &str) -> CoreResult<ColKey> {
        self.txn.col_key(self.link.table, name)
    }

    fn column(&self, st: &TxnState, col: ColKey) -> CoreResult<ColumnSpec> {
        st.check_open()?;
        if !st.is_live(self.link)? {
            return Err(CoreError::ObjectNotFound { link: self.link });
        }
        st.schema.column(self.link.table, col).cloned()
    }

    /// Value of a column. Collection columns read as their marker and
    /// unresolved links as null.
    pub fn get(&self, col: ColKey) -> CoreResult<Mixed> {
        let st = self.txn.lock();
        self.column(&st, col)?;
        let element = st
            .slot(self.link, col)?
            .ok_or(CoreError::ObjectNotFound { link: self.link })?;
        Ok(match element.to_mixed() {
            Mixed::Link(link) if link.is_unresolved() => Mixed::Null,
            value => value,
        })
    }

    /// Returns true if a scalar column is null.
    pub fn is_null(&self, col: ColKey) -> CoreResult<bool> {
        Ok(self.get(col)?.is_null())
    }

    /// Sets a scalar column. A collection marker on a mixed column creates
    /// an empty nested collection.
    pub fn set(&self, col: ColKey, value: impl Into<Mixed>) -> CoreResult<()> {
        self.txn.lock().set_value(self.link, col, value.into())
    }

    /// Sets a scalar column to null.
    pub fn set_null(&self, col: ColKey) -> CoreResult<()> {
        self.set(col, Mixed::Null)
    }

    /// Puts an empty nested collection into a mixed column.
    pub fn set_collection(&self, col: ColKey, kind: CollectionType) -> CoreResult<()> {
        self.txn.lock().set_collection(self.link, col, kind)
    }

    /// Deletes the object and cascades to what it owns.
    pub fn remove(&self) -> CoreResult<()> {
        self.txn.lock().remove_object(self.link)
    }

    /// Turns the object into a tombstone; links to it become unresolved.
    pub fn invalidate(&self) -> CoreResult<()> {
        self.txn.lock().invalidate_object(self.link)
    }

    /// Number of links pointing at this object.
    pub fn backlink_count(&self) -> CoreResult<usize> {
        let st = self.txn.lock();
        st.check_open()?;
        st.with_cluster(self.link.table, |c| c.row(self.link.key).map(|row| row.backlinks.len()))?
            .ok_or(CoreError::ObjectNotFound { link: self.link })
    }

    /// Path of the collection a mixed column holds; fails unless it holds
    /// one of kind `expected`.
    fn nested_path(&self, st: &TxnState, col: ColKey, expected: CollectionType) -> CoreResult<StablePath> {
        match st.slot(self.link, col)? {
            Some(Element::Nested { kind, key, .. }) if kind == expected => {
                Ok(StablePath::new(self.link, col).with_generation(key))
            }
            Some(element) => Err(CoreError::type_mismatch(
                format!("{expected:?}"),
                element.to_mixed().type_name(),
            )),
            None => Err(CoreError::ObjectNotFound { link: self.link }),
        }
    }

    /// Accessor for a list column, or for the list held by a mixed column.
    pub fn get_list(&self, col: ColKey) -> CoreResult<List> {
        let st = self.txn.lock();
        let spec = self.column(&st, col)?;
        match (spec.collection, spec.data_type) {
            (Some(CollectionType::List), _) => Ok(List::for_column(self.txn.clone(), self.link, col, &spec)),
            (None, DataType::Mixed) => {
                let path = self.nested_path(&st, col, CollectionType::List)?;
                Ok(List::mixed(self.txn.clone(), path, spec.name))
            }
            _ => Err(CoreError::type_mismatch("list column", describe(&spec))),
        }
    }

    /// Statically typed accessor for a list column.
    pub fn get_list_typed<T: ListElement>(&self, col: ColKey) -> CoreResult<Lst<T>> {
        Lst::new(self.get_list(col)?)
    }

    /// Accessor for a list of mixed values.
    pub fn get_list_mixed(&self, col: ColKey) -> CoreResult<MixedList> {
        let list = self.get_list(col)?;
        if list.data_type() != DataType::Mixed {
            return Err(CoreError::type_mismatch("mixed list", list.data_type().to_string()));
        }
        Ok(MixedList::from_list(list))
    }

    /// Accessor for a dictionary column, or for the dictionary held by a
    /// mixed column.
    pub fn get_dictionary(&self, col: ColKey) -> CoreResult<Dictionary> {
        let st = self.txn.lock();
        let spec = self.column(&st, col)?;
        match (spec.collection, spec.data_type) {
            (Some(CollectionType::Dictionary), _) => {
                Ok(Dictionary::for_column(self.txn.clone(), self.link, col, &spec))
            }
            (None, DataType::Mixed) => {
                let path = self.nested_path(&st, col, CollectionType::Dictionary)?;
                Ok(Dictionary::mixed(self.txn.clone(), path, spec.name))
            }
            _ => Err(CoreError::type_mismatch("dictionary column", describe(&spec))),
        }
    }

    /// Accessor for a list-of-links column.
    pub fn get_linklist(&self, col: ColKey) -> CoreResult<LnkLst> {
        let st = self.txn.lock();
        let spec = self.column(&st, col)?;
        match (spec.collection, spec.data_type, spec.target) {
            (Some(CollectionType::List), DataType::Link, Some(target)) => Ok(LnkLst::new(
                List::for_column(self.txn.clone(), self.link, col, &spec),
                target,
            )),
            _ => Err(CoreError::type_mismatch("link list column", describe(&spec))),
        }
    }

    /// Accessor for whatever collection the column holds.
    pub fn get_collection(&self, col: ColKey) -> CoreResult<CollectionHandle> {
        let (spec, current) = {
            let st = self.txn.lock();
            let spec = self.column(&st, col)?;
            (spec, st.slot(self.link, col)?)
        };
        match (spec.collection, spec.data_type) {
            (Some(CollectionType::List), DataType::Link) => self.get_linklist(col).map(CollectionHandle::LinkList),
            (Some(CollectionType::List), DataType::Mixed) => {
                self.get_list_mixed(col).map(CollectionHandle::MixedList)
            }
            (Some(CollectionType::List), _) => self.get_list(col).map(CollectionHandle::List),
            (Some(CollectionType::Dictionary), DataType::Link) => self
                .get_dictionary(col)
                .and_then(DictionaryLinkValues::new)
                .map(CollectionHandle::DictionaryLinks),
            (Some(CollectionType::Dictionary), _) => self.get_dictionary(col).map(CollectionHandle::Dictionary),
            (None, DataType::Mixed) => match current {
                Some(Element::Nested {
                    kind: CollectionType::List,
                    ..
                }) => self.get_list_mixed(col).map(CollectionHandle::MixedList),
                Some(Element::Nested {
                    kind: CollectionType::Dictionary,
                    ..
                }) => self.get_dictionary(col).map(CollectionHandle::Dictionary),
                _ => Err(CoreError::type_mismatch("collection", "scalar value")),
            },
            _ => Err(CoreError::type_mismatch("collection column", describe(&spec))),
        }
    }

    /// Creates an embedded object and stores the only link to it in a link
    /// column. The embedded object linked there before is deleted.
    pub fn create_and_set_linked_object(&self, col: ColKey) -> CoreResult<Obj> {
        let link = self.txn.lock().create_and_set_linked_object(self.link, col)?;
        Ok(Obj::new(self.txn.clone(), link))
    }

    /// The object a link column points at; `None` for null and unresolved
    /// links.
    pub fn get_linked_object(&self, col: ColKey) -> CoreResult<Option<Obj>> {
        match self.get(col)? {
            Mixed::Null => Ok(None),
            Mixed::Link(link) => Ok(Some(Obj::new(self.txn.clone(), link))),
            other => Err(CoreError::type_mismatch("link", other.type_name())),
        }
    }
}

impl std::fmt::Debug for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Obj").field("link", &self.link).finish()
    }
}

fn describe(spec: &ColumnSpec) -> String {
    match spec.collection {
        Some(kind) => format!("{kind:?} of {} '{}'", spec.data_type, spec.name),
        None => format!("{} '{}'", spec.data_type, spec.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::schema::TableSpec;

    struct Fixture {
        txn: Transaction,
        people: TableKey,
        addresses: TableKey,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let addresses = txn
            .add_table(TableSpec::embedded("Address").column(ColumnSpec::new("city", DataType::String)))
            .unwrap();
        let people = txn
            .add_table(
                TableSpec::new("Person")
                    .column(ColumnSpec::new("name", DataType::String))
                    .column(ColumnSpec::new("age", DataType::Int).nullable())
                    .column(ColumnSpec::new("friend", DataType::Link).link_to(TableKey::new(1)))
                    .column(ColumnSpec::new("home", DataType::Link).link_to(addresses))
                    .column(ColumnSpec::new("any", DataType::Mixed))
                    .column(ColumnSpec::list("tags", DataType::String)),
            )
            .unwrap();
        Fixture {
            txn,
            people,
            addresses,
        }
    }

    #[test]
    fn scalar_columns_round_trip() {
        let f = fixture();
        let obj = f.txn.create_object(f.people).unwrap();
        let name = obj.col_key("name").unwrap();
        let age = obj.col_key("age").unwrap();
        assert_eq!(obj.get(name).unwrap(), Mixed::from(""));
        assert!(obj.is_null(age).unwrap());
        obj.set(name, "Ada").unwrap();
        obj.set(age, 36).unwrap();
        assert_eq!(obj.get(name).unwrap(), Mixed::from("Ada"));
        assert!(matches!(obj.set_null(name), Err(CoreError::PropertyNotNullable { .. })));
        assert!(matches!(obj.set(age, "x"), Err(CoreError::TypeMismatch { .. })));
        let tags = obj.col_key("tags").unwrap();
        assert!(matches!(obj.set(tags, 1), Err(CoreError::TypeMismatch { .. })));
        assert_eq!(obj.get(tags).unwrap(), Mixed::List);
    }

    #[test]
    fn links_keep_backlinks() {
        let f = fixture();
        let a = f.txn.create_object(f.people).unwrap();
        let b = f.txn.create_object(f.people).unwrap();
        let friend = a.col_key("friend").unwrap();
        a.set(friend, b.link()).unwrap();
        assert_eq!(b.backlink_count().unwrap(), 1);
        assert_eq!(a.get_linked_object(friend).unwrap().unwrap().key(), b.key());

        b.remove().unwrap();
        assert!(!b.is_valid());
        assert!(a.get(friend).unwrap().is_null());
        f.txn.verify().unwrap();
    }

    #[test]
    fn invalidated_target_reads_as_null() {
        let f = fixture();
        let a = f.txn.create_object(f.people).unwrap();
        let b = f.txn.create_object(f.people).unwrap();
        let friend = a.col_key("friend").unwrap();
        a.set(friend, b.link()).unwrap();
        b.invalidate().unwrap();
        assert!(a.get(friend).unwrap().is_null());
        assert!(a.get_linked_object(friend).unwrap().is_none());
        assert_eq!(f.txn.tombstone_count(f.people).unwrap(), 1);

        a.set_null(friend).unwrap();
        assert_eq!(f.txn.tombstone_count(f.people).unwrap(), 0);
        f.txn.verify().unwrap();
    }

    #[test]
    fn embedded_objects_are_owned_by_their_link() {
        let f = fixture();
        let person = f.txn.create_object(f.people).unwrap();
        let home = person.col_key("home").unwrap();
        assert!(f.txn.create_object(f.addresses).is_err());

        let first = person.create_and_set_linked_object(home).unwrap();
        first.set(first.col_key("city").unwrap(), "Oslo").unwrap();
        let second = person.create_and_set_linked_object(home).unwrap();
        assert!(!first.is_valid());
        assert!(second.is_valid());
        assert!(matches!(second.invalidate(), Err(CoreError::IllegalOperation { .. })));

        person.remove().unwrap();
        assert_eq!(f.txn.object_count(f.addresses).unwrap(), 0);
        f.txn.verify().unwrap();
    }

    #[test]
    fn collections_by_column_kind() {
        let f = fixture();
        let obj = f.txn.create_object(f.people).unwrap();
        let any = obj.col_key("any").unwrap();
        let tags = obj.col_key("tags").unwrap();
        assert!(matches!(obj.get_collection(any), Err(CoreError::TypeMismatch { .. })));
        obj.set(any, Mixed::Dictionary).unwrap();
        let handle = obj.get_collection(any).unwrap();
        assert_eq!(handle.collection_type(), CollectionType::Dictionary);
        assert!(matches!(obj.get_collection(tags).unwrap(), CollectionHandle::List(_)));
        assert!(obj.get_linklist(tags).is_err());
        assert!(obj.get_dictionary(tags).is_err());
    }

    #[test]
    fn mixed_column_getters_check_the_held_kind() {
        let f = fixture();
        let obj = f.txn.create_object(f.people).unwrap();
        let any = obj.col_key("any").unwrap();
        assert!(matches!(obj.get_list(any), Err(CoreError::TypeMismatch { .. })));

        obj.set_collection(any, CollectionType::Dictionary).unwrap();
        assert!(matches!(obj.get_list(any), Err(CoreError::TypeMismatch { .. })));
        assert!(matches!(obj.get_list_mixed(any), Err(CoreError::TypeMismatch { .. })));
        assert!(obj.get_dictionary(any).unwrap().is_attached());

        obj.set(any, 5).unwrap();
        assert!(matches!(obj.get_dictionary(any), Err(CoreError::TypeMismatch { .. })));
    }

    #[test]
    fn replaced_collection_detaches_old_accessors() {
        let f = fixture();
        let obj = f.txn.create_object(f.people).unwrap();
        let any = obj.col_key("any").unwrap();
        obj.set_collection(any, CollectionType::Dictionary).unwrap();
        let dict = obj.get_dictionary(any).unwrap();
        dict.insert_collection("x", CollectionType::List).unwrap();
        let stale = dict.get_list("x").unwrap();
        stale.add("old").unwrap();

        obj.set(any, 1).unwrap();
        obj.set_collection(any, CollectionType::Dictionary).unwrap();
        let fresh = obj.get_dictionary(any).unwrap();
        fresh.insert_collection("y", CollectionType::List).unwrap();
        fresh.get_list("y").unwrap().add("new").unwrap();

        assert!(!dict.is_attached());
        assert!(!stale.is_attached());
        assert_eq!(stale.size().unwrap(), 0);
        assert!(matches!(stale.add("again"), Err(CoreError::NotAttached)));
        assert_eq!(
            fresh.get_list("y").unwrap().to_vec().unwrap(),
            vec![Mixed::from("new")]
        );
        f.txn.verify().unwrap();
    }

    #[test]
    fn switching_collection_kind_detaches_old_accessors() {
        let f = fixture();
        let obj = f.txn.create_object(f.people).unwrap();
        let any = obj.col_key("any").unwrap();
        obj.set_collection(any, CollectionType::List).unwrap();
        let first = obj.get_list_mixed(any).unwrap();
        first.add(1).unwrap();

        obj.set_collection(any, CollectionType::Dictionary).unwrap();
        obj.set_collection(any, CollectionType::List).unwrap();
        let second = obj.get_list_mixed(any).unwrap();
        second.add(2).unwrap();

        assert!(!first.is_attached());
        assert_eq!(first.size().unwrap(), 0);
        assert_eq!(second.to_vec().unwrap(), vec![Mixed::Int(2)]);
        assert_ne!(first.get_stable_path(), second.get_stable_path());
    }

    #[test]
    fn removed_object_rejects_access() {
        let f = fixture();
        let obj = f.txn.create_object(f.people).unwrap();
        let name = obj.col_key("name").unwrap();
        obj.remove().unwrap();
        assert!(matches!(obj.get(name), Err(CoreError::ObjectNotFound { .. })));
        assert!(matches!(obj.remove(), Err(CoreError::ObjectNotFound { .. })));
    }
}
