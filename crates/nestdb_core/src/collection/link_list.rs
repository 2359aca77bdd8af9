//! Object view over a list of links.
//!
//! Links to tombstones stay in the list physically but are hidden: positions
//! seen by callers are *virtual* and skip unresolved entries. The sorted
//! physical positions of unresolved entries are cached per content version.

use super::base::{StablePath, UpdateStatus};
use super::json::JsonOutputMode;
use super::list::List;
use crate::alloc::Element;
use crate::error::{CoreError, CoreResult};
use crate::replication::FullPath;
use crate::table::Obj;
use crate::transaction::TxnState;
use crate::types::{ObjKey, ObjLink, TableKey};
use crate::value::{CollectionType, DataType, Mixed};
use std::cell::RefCell;

/// Accessor for a list-of-links column.
pub struct LnkLst {
    list: List,
    target: TableKey,
    /// Content version and the physical positions of unresolved links.
    unresolved: RefCell<Option<(u64, Vec<usize>)>>,
}

impl LnkLst {
    pub(crate) fn new(list: List, target: TableKey) -> Self {
        Self {
            list,
            target,
            unresolved: RefCell::new(None),
        }
    }

    /// Table the links point into.
    #[must_use]
    pub fn target_table(&self) -> TableKey {
        self.target
    }

    /// The physical list, unresolved links included.
    #[must_use]
    pub fn as_list(&self) -> &List {
        &self.list
    }

    fn unresolved_in(&self, st: &TxnState) -> CoreResult<Vec<usize>> {
        if let Some((stamp, positions)) = &*self.unresolved.borrow() {
            if *stamp == st.content_version {
                return Ok(positions.clone());
            }
        }
        let positions: Vec<usize> = self
            .list
            .elements_in(st)?
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Element::Value(value) if value.is_unresolved_link()))
            .map(|(ndx, _)| ndx)
            .collect();
        *self.unresolved.borrow_mut() = Some((st.content_version, positions.clone()));
        Ok(positions)
    }

    fn size_in(&self, st: &TxnState) -> CoreResult<usize> {
        Ok(self.list.size_in(st)? - self.unresolved_in(st)?.len())
    }

    fn to_real(&self, st: &TxnState, ndx: usize) -> CoreResult<usize> {
        Ok(virtual_to_real(&self.unresolved_in(st)?, ndx))
    }

    fn to_virtual(&self, st: &TxnState, ndx: usize) -> CoreResult<usize> {
        Ok(real_to_virtual(&self.unresolved_in(st)?, ndx))
    }

    /// Real position of an existing element at virtual position `ndx`.
    fn checked_real(&self, st: &TxnState, operation: &'static str, ndx: usize) -> CoreResult<usize> {
        let size = self.size_in(st)?;
        if ndx >= size {
            return Err(CoreError::out_of_range(operation, ndx, size));
        }
        self.to_real(st, ndx)
    }

    fn link(&self, key: ObjKey) -> Mixed {
        Mixed::link_to(self.target, key)
    }

    fn embedded_target(&self, st: &TxnState) -> CoreResult<()> {
        if st.schema.table(self.target)?.embedded {
            Ok(())
        } else {
            Err(CoreError::illegal_operation(format!(
                "{} is not an embedded table",
                self.target
            )))
        }
    }

    /// Physical position of the element at virtual position `ndx`.
    pub fn virtual2real(&self, ndx: usize) -> CoreResult<usize> {
        let st = self.list.base.txn.lock();
        self.to_real(&st, ndx)
    }

    /// Virtual position of the element at physical position `ndx`.
    pub fn real2virtual(&self, ndx: usize) -> CoreResult<usize> {
        let st = self.list.base.txn.lock();
        self.to_virtual(&st, ndx)
    }

    /// Number of visible links.
    pub fn size(&self) -> CoreResult<usize> {
        let st = self.list.base.txn.lock();
        self.size_in(&st)
    }

    /// Returns true when no link is visible.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Key of the object linked at `ndx`.
    pub fn get(&self, ndx: usize) -> CoreResult<ObjKey> {
        let st = self.list.base.txn.lock();
        let real = self.checked_real(&st, "get", ndx)?;
        let element = self.list.element_in(&st, real)?;
        element
            .to_mixed()
            .as_link()
            .map(|link| link.key)
            .ok_or_else(|| CoreError::invariant(format!("link list entry {real} is not a link")))
    }

    /// Link at `ndx` as a dynamic value.
    pub fn get_any(&self, ndx: usize) -> CoreResult<Mixed> {
        Ok(self.link(self.get(ndx)?))
    }

    /// Accessor for the object linked at `ndx`.
    pub fn get_object(&self, ndx: usize) -> CoreResult<Obj> {
        let key = self.get(ndx)?;
        Ok(Obj::new(self.list.base.txn.clone(), ObjLink::new(self.target, key)))
    }

    /// Keys of the visible links in order.
    pub fn to_vec(&self) -> CoreResult<Vec<ObjKey>> {
        let st = self.list.base.txn.lock();
        Ok(self
            .list
            .elements_in(&st)?
            .iter()
            .filter_map(|e| e.to_mixed().as_link())
            .filter(|link| !link.is_unresolved())
            .map(|link| link.key)
            .collect())
    }

    /// Virtual position of the first link to `key`.
    pub fn find_first(&self, key: ObjKey) -> CoreResult<Option<usize>> {
        Ok(self.find_all(key)?.into_iter().next())
    }

    /// Virtual positions of every link to `key`.
    pub fn find_all(&self, key: ObjKey) -> CoreResult<Vec<usize>> {
        if key.is_unresolved() {
            return Ok(Vec::new());
        }
        let st = self.list.base.txn.lock();
        let unresolved = self.unresolved_in(&st)?;
        Ok(self
            .list
            .find_in(&st, &self.link(key))?
            .into_iter()
            .map(|real| real_to_virtual(&unresolved, real))
            .collect())
    }

    /// Index permutation ordering the visible links by key.
    pub fn sort(&self, ascending: bool) -> CoreResult<Vec<usize>> {
        let links: Vec<Mixed> = self.to_vec()?.into_iter().map(|k| self.link(k)).collect();
        Ok(super::aggregate::sort_indices(&links, ascending))
    }

    /// Positions of the first link to each distinct object.
    pub fn distinct(&self, order: Option<bool>) -> CoreResult<Vec<usize>> {
        let links: Vec<Mixed> = self.to_vec()?.into_iter().map(|k| self.link(k)).collect();
        Ok(super::aggregate::distinct_indices(&links, order))
    }

    /// Replaces the link at `ndx`; returns the old key.
    pub fn set(&self, ndx: usize, key: ObjKey) -> CoreResult<ObjKey> {
        self.list.base.write(|st| {
            let real = self.checked_real(st, "set", ndx)?;
            let old = self.list.set_in(st, real, self.link(key), false)?;
            Ok(old.as_link().map_or(ObjKey::NULL, |link| link.key))
        })
    }

    /// Inserts a link before virtual position `ndx`.
    pub fn insert(&self, ndx: usize, key: ObjKey) -> CoreResult<()> {
        self.list.base.write(|st| self.insert_in(st, ndx, self.link(key), false))
    }

    /// Appends a link.
    pub fn add(&self, key: ObjKey) -> CoreResult<()> {
        self.list.base.write(|st| {
            let size = self.size_in(st)?;
            self.insert_in(st, size, self.link(key), false)
        })
    }

    fn insert_in(&self, st: &mut TxnState, ndx: usize, value: Mixed, allow_embedded: bool) -> CoreResult<()> {
        let size = self.size_in(st)?;
        if ndx > size {
            return Err(CoreError::out_of_range("insert", ndx, size));
        }
        let real = if ndx == size {
            self.list.size_in(st)?
        } else {
            self.to_real(st, ndx)?
        };
        self.list.insert_in(st, real, value, allow_embedded)
    }

    /// Removes the link at `ndx`; returns its key.
    pub fn remove(&self, ndx: usize) -> CoreResult<ObjKey> {
        self.list.base.write(|st| self.remove_in(st, ndx))
    }

    fn remove_in(&self, st: &mut TxnState, ndx: usize) -> CoreResult<ObjKey> {
        let real = self.checked_real(st, "remove", ndx)?;
        let old = self.list.remove_in(st, real)?;
        Ok(old.as_link().map_or(ObjKey::NULL, |link| link.key))
    }

    /// Removes the links in `from..to`, last first.
    pub fn remove_range(&self, from: usize, to: usize) -> CoreResult<()> {
        self.list.base.write(|st| {
            let size = self.size_in(st)?;
            if from > to || to > size {
                return Err(CoreError::out_of_range("remove", to, size));
            }
            for ndx in (from..to).rev() {
                self.remove_in(st, ndx)?;
            }
            Ok(())
        })
    }

    /// Moves the link at `from` so that it ends up at `to`.
    pub fn move_item(&self, from: usize, to: usize) -> CoreResult<()> {
        self.list.base.write(|st| {
            let real_from = self.checked_real(st, "move", from)?;
            let real_to = self.checked_real(st, "move", to)?;
            self.list.move_in(st, real_from, real_to)
        })
    }

    /// Exchanges two links.
    pub fn swap(&self, a: usize, b: usize) -> CoreResult<()> {
        self.list.base.write(|st| {
            let real_a = self.checked_real(st, "swap", a)?;
            let real_b = self.checked_real(st, "swap", b)?;
            self.list.swap_in(st, real_a, real_b)
        })
    }

    /// Removes every link, unresolved ones included.
    pub fn clear(&self) -> CoreResult<()> {
        self.list.clear()
    }

    /// Deletes the object linked at `ndx`. The deletion removes the link.
    pub fn remove_target_row(&self, ndx: usize) -> CoreResult<()> {
        self.list.base.write(|st| {
            let real = self.checked_real(st, "remove_target_row", ndx)?;
            match self.list.element_in(st, real)?.to_mixed().as_link() {
                Some(link) => st.remove_object(link),
                None => Ok(()),
            }
        })
    }

    /// Deletes every linked object.
    pub fn remove_all_target_rows(&self) -> CoreResult<()> {
        self.list.base.write(|st| {
            if st.schema.table(self.target)?.embedded {
                return self.list.clear_in(st);
            }
            let mut targets: Vec<ObjLink> = self
                .list
                .elements_in(st)?
                .iter()
                .filter_map(|e| e.to_mixed().as_link())
                .filter(|link| !link.is_unresolved())
                .collect();
            targets.sort();
            targets.dedup();
            for target in targets {
                if st.is_live(target)? {
                    st.remove_object(target)?;
                }
            }
            Ok(())
        })
    }

    /// Creates an embedded object and inserts its only link at `ndx`.
    pub fn create_and_insert_linked_object(&self, ndx: usize) -> CoreResult<Obj> {
        let link = self.list.base.write(|st| {
            self.embedded_target(st)?;
            let size = self.size_in(st)?;
            self.list.base.attached_top(st)?;
            if ndx > size {
                return Err(CoreError::out_of_range("insert", ndx, size));
            }
            let key = st.create_object(self.target, true)?;
            let link = ObjLink::new(self.target, key);
            self.insert_in(st, ndx, Mixed::Link(link), true)?;
            Ok(link)
        })?;
        Ok(Obj::new(self.list.base.txn.clone(), link))
    }

    /// Creates an embedded object and links it at `ndx`, deleting the
    /// embedded object linked there before.
    pub fn create_and_set_linked_object(&self, ndx: usize) -> CoreResult<Obj> {
        let link = self.list.base.write(|st| {
            self.embedded_target(st)?;
            let real = self.checked_real(st, "set", ndx)?;
            let key = st.create_object(self.target, true)?;
            let link = ObjLink::new(self.target, key);
            self.list.set_in(st, real, Mixed::Link(link), true)?;
            Ok(link)
        })?;
        Ok(Obj::new(self.list.base.txn.clone(), link))
    }

    /// Replaces the first link to `old` with a link to `new`. Returns false
    /// if `old` is not linked.
    pub fn replace_link(&self, old: ObjKey, new: ObjKey) -> CoreResult<bool> {
        self.list.base.write(|st| {
            match self.list.find_in(st, &self.link(old))?.first() {
                Some(&real) => {
                    self.list.set_in(st, real, self.link(new), false)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// Always [`DataType::Link`].
    #[must_use]
    pub fn data_type(&self) -> DataType {
        DataType::Link
    }

    /// Always [`CollectionType::List`].
    #[must_use]
    pub fn collection_type(&self) -> CollectionType {
        CollectionType::List
    }

    /// Exports the links as JSON. Unresolved links print as `null`.
    pub fn to_json(&self, mode: JsonOutputMode) -> CoreResult<String> {
        self.list.to_json(mode)
    }

    /// Returns true while the owner exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.list.is_attached()
    }

    /// Revalidates against the transaction.
    pub fn update_if_needed(&self) -> CoreResult<UpdateStatus> {
        self.list.update_if_needed()
    }

    /// Current positional path.
    pub fn get_path(&self) -> CoreResult<FullPath> {
        self.list.get_path()
    }

    /// Path that survives reordering of siblings.
    #[must_use]
    pub fn get_stable_path(&self) -> StablePath {
        self.list.get_stable_path()
    }

    /// Always 1: link lists live in columns.
    #[must_use]
    pub fn get_level(&self) -> usize {
        self.list.get_level()
    }
}

/// Physical position of virtual position `ndx`, given the sorted physical
/// positions of hidden entries.
pub(crate) fn virtual_to_real(unresolved: &[usize], ndx: usize) -> usize {
    let mut real = ndx;
    for &hidden in unresolved {
        if hidden <= real {
            real += 1;
        } else {
            break;
        }
    }
    real
}

/// Virtual position of physical position `ndx`.
pub(crate) fn real_to_virtual(unresolved: &[usize], ndx: usize) -> usize {
    ndx - unresolved.iter().take_while(|&&hidden| hidden < ndx).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::schema::{ColumnSpec, TableSpec};
    use crate::transaction::Transaction;

    #[test]
    fn index_translation_skips_hidden_entries() {
        let hidden = [1, 2, 5];
        let reals: Vec<usize> = (0..4).map(|v| virtual_to_real(&hidden, v)).collect();
        assert_eq!(reals, vec![0, 3, 4, 6]);
        for (virt, real) in reals.iter().enumerate() {
            assert_eq!(real_to_virtual(&hidden, *real), virt);
        }
        assert_eq!(virtual_to_real(&[], 3), 3);
    }

    struct Fixture {
        txn: Transaction,
        owner: Obj,
        people: TableKey,
        pets: TableKey,
    }

    impl Fixture {
        fn links(&self, name: &str) -> LnkLst {
            self.owner.get_linklist(self.owner.col_key(name).unwrap()).unwrap()
        }

        fn pet(&self) -> ObjKey {
            self.txn.create_object(self.pets).unwrap().key()
        }
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let pets = txn.add_table(TableSpec::new("Pet")).unwrap();
        let tags = txn.add_table(TableSpec::embedded("Tag")).unwrap();
        let people = txn
            .add_table(
                TableSpec::new("Person")
                    .column(ColumnSpec::link_list("pets", pets))
                    .column(ColumnSpec::link_list("tags", tags)),
            )
            .unwrap();
        let owner = txn.create_object(people).unwrap();
        Fixture {
            txn,
            owner,
            people,
            pets,
        }
    }

    #[test]
    fn unresolved_links_are_hidden() {
        let f = fixture();
        let links = f.links("pets");
        let keys: Vec<ObjKey> = (0..3).map(|_| f.pet()).collect();
        for key in &keys {
            links.add(*key).unwrap();
        }
        f.txn
            .get_object(ObjLink::new(f.pets, keys[1]))
            .unwrap()
            .invalidate()
            .unwrap();

        assert_eq!(links.size().unwrap(), 2);
        assert_eq!(links.as_list().size().unwrap(), 3);
        assert_eq!(links.get(1).unwrap(), keys[2]);
        assert_eq!(links.virtual2real(1).unwrap(), 2);
        assert_eq!(links.real2virtual(2).unwrap(), 1);
        assert_eq!(links.find_first(keys[2]).unwrap(), Some(1));
        assert_eq!(f.txn.tombstone_count(f.pets).unwrap(), 1);
        f.txn.verify().unwrap();
    }

    #[test]
    fn deleting_a_target_erases_the_link() {
        let f = fixture();
        let links = f.links("pets");
        let a = f.pet();
        let b = f.pet();
        links.add(a).unwrap();
        links.add(b).unwrap();
        links.remove_target_row(0).unwrap();
        assert_eq!(links.to_vec().unwrap(), vec![b]);
        assert_eq!(f.txn.object_count(f.pets).unwrap(), 1);
        links.remove_all_target_rows().unwrap();
        assert!(links.is_empty().unwrap());
        assert_eq!(f.txn.object_count(f.pets).unwrap(), 0);
        f.txn.verify().unwrap();
    }

    #[test]
    fn unresolved_and_embedded_inserts_are_rejected() {
        let f = fixture();
        let pets = f.links("pets");
        let key = f.pet();
        assert!(matches!(
            pets.add(key.get_unresolved()),
            Err(CoreError::IllegalOperation { .. })
        ));
        assert!(matches!(
            pets.create_and_insert_linked_object(0),
            Err(CoreError::IllegalOperation { .. })
        ));

        let tags = f.links("tags");
        let tag = tags.create_and_insert_linked_object(0).unwrap();
        let other = f.txn.create_object(f.people).unwrap();
        let other_tags = other.get_linklist(other.col_key("tags").unwrap()).unwrap();
        assert!(matches!(
            other_tags.add(tag.key()),
            Err(CoreError::IllegalOperation { .. })
        ));
    }

    #[test]
    fn embedded_objects_follow_their_link() {
        let f = fixture();
        let tags = f.links("tags");
        let first = tags.create_and_insert_linked_object(0).unwrap();
        tags.create_and_insert_linked_object(1).unwrap();
        let table = first.table();
        assert_eq!(f.txn.object_count(table).unwrap(), 2);

        let replacement = tags.create_and_set_linked_object(0).unwrap();
        assert!(!first.is_valid());
        assert!(replacement.is_valid());
        assert_eq!(f.txn.object_count(table).unwrap(), 2);

        let before = f.txn.cascade_invocations();
        tags.clear().unwrap();
        assert_eq!(f.txn.cascade_invocations() - before, 2);
        assert_eq!(f.txn.object_count(table).unwrap(), 0);
        f.txn.verify().unwrap();
    }

    #[test]
    fn moves_and_replacements_use_virtual_positions() {
        let f = fixture();
        let links = f.links("pets");
        let keys: Vec<ObjKey> = (0..4).map(|_| f.pet()).collect();
        for key in &keys {
            links.add(*key).unwrap();
        }
        f.txn
            .get_object(ObjLink::new(f.pets, keys[1]))
            .unwrap()
            .invalidate()
            .unwrap();
        links.move_item(0, 2).unwrap();
        assert_eq!(links.to_vec().unwrap(), vec![keys[2], keys[3], keys[0]]);
        assert!(links.replace_link(keys[3], keys[0]).unwrap());
        assert_eq!(links.find_all(keys[0]).unwrap(), vec![1, 2]);
        assert!(!links.replace_link(keys[3], keys[0]).unwrap());
        f.txn.verify().unwrap();
    }
}
