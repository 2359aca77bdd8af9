//! Lifecycle shared by every collection accessor.
//!
//! An accessor never caches a pointer into storage across transactions. It
//! keeps a [`StablePath`] from its owning object down to the collection and a
//! cached top ref stamped with the transaction's content version. Every
//! operation first compares the stamp: equal means the cached ref is still
//! good, different means the path is replayed to find the (possibly
//! relocated) collection, and a path that no longer resolves detaches the
//! accessor.

use super::layout::{self, Layout};
use crate::alloc::Element;
use crate::bptree;
use crate::error::{CoreError, CoreResult};
use crate::replication::{FullPath, PathElement, Replication};
use crate::schema::ColumnSpec;
use crate::table::CascadeState;
use crate::transaction::{Stage, Transaction, TxnState};
use crate::types::{ColKey, ObjLink, Ref, TableKey};
use crate::value::{accepts, CollectionType, DataType, Mixed};
use smallvec::SmallVec;
use std::cell::Cell;
use std::fmt;
use tracing::trace;

/// Address of a collection that survives reordering of its siblings.
///
/// The column value of `owner.col` is the root; each step is the stable key
/// of a nested entry in the collection above it. A mixed column gets a new
/// `generation` every time a collection is put into it, so a path into a
/// replaced collection no longer resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StablePath {
    /// Object owning the column.
    pub owner: ObjLink,
    /// Column holding the outermost collection.
    pub col: ColKey,
    /// Key of the column's collection value; 0 for collection columns.
    pub generation: i64,
    /// Stable keys of nested entries, outermost first.
    pub steps: SmallVec<[i64; 4]>,
}

impl StablePath {
    /// Path of the collection stored directly in a column.
    #[must_use]
    pub fn new(owner: ObjLink, col: ColKey) -> Self {
        Self {
            owner,
            col,
            generation: 0,
            steps: SmallVec::new(),
        }
    }

    /// The same path bound to one incarnation of the column's collection.
    #[must_use]
    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = generation;
        self
    }

    /// Nesting level: 1 for a column collection.
    #[must_use]
    pub fn level(&self) -> usize {
        self.steps.len() + 1
    }

    /// Path of the nested entry with stable key `key`.
    #[must_use]
    pub fn child(&self, key: i64) -> Self {
        let mut steps = self.steps.clone();
        steps.push(key);
        Self {
            owner: self.owner,
            col: self.col,
            generation: self.generation,
            steps,
        }
    }
}

impl fmt::Display for StablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.col)?;
        if self.generation != 0 {
            write!(f, "#{}", self.generation)?;
        }
        for step in &self.steps {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

/// Result of revalidating an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The owner or the collection is gone.
    Detached,
    /// Nothing changed since the last check.
    NoChange,
    /// The accessor was rebound to the current storage.
    Updated,
}

struct Hop {
    parent_kind: CollectionType,
    parent_top: Ref,
    ndx: usize,
    child_top: Ref,
}

struct Located {
    kind: CollectionType,
    top: Ref,
    hops: Vec<Hop>,
}

/// Replays `path` from the owning object's column.
fn locate(st: &TxnState, path: &StablePath) -> CoreResult<Option<Located>> {
    let Some(Element::Nested {
        mut kind,
        mut top,
        key,
    }) = st.slot(path.owner, path.col)?
    else {
        return Ok(None);
    };
    if key != path.generation {
        return Ok(None);
    }
    let mut hops = Vec::with_capacity(path.steps.len());
    for &step in &path.steps {
        if top.is_null() {
            return Ok(None);
        }
        let parent = Layout::detect(&st.store, kind, top)?;
        if parent == Layout::TypedList {
            return Ok(None);
        }
        let values = layout::values_tree(&st.store, parent, top)?;
        let mut found = None;
        bptree::for_each(&st.store, values, &mut |ndx, element| {
            if let Element::Nested { kind, top, key } = element {
                if *key == step {
                    found = Some((ndx, *kind, *top));
                    return Ok(false);
                }
            }
            Ok(true)
        })?;
        let Some((ndx, child_kind, child_top)) = found else {
            return Ok(None);
        };
        hops.push(Hop {
            parent_kind: kind,
            parent_top: top,
            ndx,
            child_top,
        });
        kind = child_kind;
        top = child_top;
    }
    Ok(Some(Located { kind, top, hops }))
}

pub(crate) struct CollectionBase {
    pub(crate) txn: Transaction,
    pub(crate) path: StablePath,
    pub(crate) layout: Layout,
    /// Content version of the last validation and the top found then.
    cache: Cell<Option<(u64, Ref)>>,
}

impl CollectionBase {
    pub(crate) fn new(txn: Transaction, path: StablePath, layout: Layout) -> Self {
        Self {
            txn,
            path,
            layout,
            cache: Cell::new(None),
        }
    }

    /// Revalidates against the transaction's current state.
    pub(crate) fn update(&self, st: &TxnState) -> CoreResult<UpdateStatus> {
        if st.stage == Stage::Closed {
            self.cache.set(None);
            return Ok(UpdateStatus::Detached);
        }
        if let Some((stamp, _)) = self.cache.get() {
            if stamp == st.content_version {
                return Ok(UpdateStatus::NoChange);
            }
        }
        match locate(st, &self.path)? {
            Some(found) if found.kind == self.layout.kind() => {
                trace!(path = %self.path, top = %found.top, "collection rebound");
                self.cache.set(Some((st.content_version, found.top)));
                Ok(UpdateStatus::Updated)
            }
            _ => {
                trace!(path = %self.path, "collection detached");
                self.cache.set(None);
                Ok(UpdateStatus::Detached)
            }
        }
    }

    /// Cached top; null when the collection has no storage yet.
    pub(crate) fn top(&self) -> Ref {
        self.cache.get().map_or(Ref::NULL, |(_, top)| top)
    }

    /// Runs a read. `f` gets `None` when the accessor is detached or the
    /// collection has no storage, which reads as empty.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&TxnState, Option<Ref>) -> CoreResult<R>) -> CoreResult<R> {
        let st = self.txn.lock();
        let top = self.current(&st)?;
        f(&st, top)
    }

    /// Revalidates; `None` when detached or without storage.
    pub(crate) fn current(&self, st: &TxnState) -> CoreResult<Option<Ref>> {
        Ok(match self.update(st)? {
            UpdateStatus::Detached => None,
            _ => stored(self.top()),
        })
    }

    /// Runs a write inside the write transaction.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut TxnState) -> CoreResult<R>) -> CoreResult<R> {
        let mut st = self.txn.lock();
        match st.stage {
            Stage::Writing => {}
            Stage::Reading => return Err(CoreError::NotInWriteTransaction),
            Stage::Closed => return Err(CoreError::NotAttached),
        }
        f(&mut st)
    }

    /// Current top inside a write; fails if detached. May be null.
    pub(crate) fn attached_top(&self, st: &TxnState) -> CoreResult<Ref> {
        match self.update(st)? {
            UpdateStatus::Detached => Err(CoreError::NotAttached),
            _ => Ok(self.top()),
        }
    }

    /// Current top, creating empty storage if there is none yet.
    ///
    /// A created collection is linked into its parent by the next
    /// [`CollectionBase::commit_top`].
    pub(crate) fn ensure_created(&self, st: &mut TxnState) -> CoreResult<Ref> {
        let top = self.attached_top(st)?;
        if !top.is_null() {
            return Ok(top);
        }
        Ok(self.layout.create(&mut st.store))
    }

    /// Publishes a new top and bumps the versions. Structural changes bump
    /// both counters.
    pub(crate) fn commit_top(&self, st: &mut TxnState, new_top: Ref, structural: bool) -> CoreResult<()> {
        self.write_top(st, new_top)?;
        if structural {
            st.bump_both();
        } else {
            st.bump_content();
        }
        self.cache.set(Some((st.content_version, new_top)));
        Ok(())
    }

    /// Stores `new_top` in the parent entry and propagates relocated refs up
    /// to the owning object's column.
    fn write_top(&self, st: &mut TxnState, new_top: Ref) -> CoreResult<()> {
        let located = locate(st, &self.path)?.ok_or(CoreError::NotAttached)?;
        let mut child_top = new_top;
        let mut child_kind = located.kind;
        for (hop, step) in located.hops.iter().zip(self.path.steps.iter()).rev() {
            if hop.child_top == child_top {
                return Ok(());
            }
            let parent = parent_layout(hop.parent_kind);
            let values = layout::values_tree(&st.store, parent, hop.parent_top)?;
            let values = bptree::set(
                &mut st.store,
                values,
                hop.ndx,
                Element::Nested {
                    kind: child_kind,
                    top: child_top,
                    key: *step,
                },
            )?;
            child_top = layout::replace_values(&mut st.store, parent, hop.parent_top, values)?;
            child_kind = hop.parent_kind;
        }
        let current = located.hops.first().map_or(located.top, |hop| hop.parent_top);
        if current != child_top {
            st.set_slot(
                self.path.owner,
                self.path.col,
                Element::Nested {
                    kind: child_kind,
                    top: child_top,
                    key: self.path.generation,
                },
            )?;
        }
        Ok(())
    }

    /// Positional path of the collection.
    pub(crate) fn full_path(&self, st: &TxnState) -> CoreResult<FullPath> {
        let located = locate(st, &self.path)?.ok_or(CoreError::NotAttached)?;
        let mut elements = Vec::with_capacity(located.hops.len());
        for hop in &located.hops {
            elements.push(match hop.parent_kind {
                CollectionType::List => PathElement::Index(hop.ndx),
                CollectionType::Dictionary => {
                    let keys = layout::keys_tree(&st.store, hop.parent_top)?;
                    let key = bptree::get(&st.store, keys, hop.ndx)?.to_mixed();
                    PathElement::Key(key.as_str().unwrap_or_default().to_string())
                }
            });
        }
        Ok(FullPath {
            table: self.path.owner.table,
            obj: self.path.owner.key,
            col: self.path.col,
            elements,
        })
    }

    /// Calls the replication sink with this collection's path.
    pub(crate) fn replicate(
        &self,
        st: &TxnState,
        f: impl FnOnce(&mut dyn Replication, &FullPath),
    ) -> CoreResult<()> {
        st.replicate_at(|st| self.full_path(st), f)
    }

    /// Path of a nested entry, rejecting nesting deeper than configured.
    pub(crate) fn child_path(&self, st: &TxnState, key: i64) -> CoreResult<StablePath> {
        let max = st.config().max_nesting_level;
        if self.path.level() + 1 > max {
            return Err(CoreError::NestingTooDeep { max });
        }
        Ok(self.path.child(key))
    }

    /// Checks that one more level of nesting is allowed.
    pub(crate) fn check_nesting(&self, st: &TxnState) -> CoreResult<()> {
        self.child_path(st, 0).map(|_| ())
    }

    /// Releases the links held by removed elements and runs the cascade.
    pub(crate) fn release(&self, st: &mut TxnState, old: &[Element]) -> CoreResult<()> {
        let mut cascade = CascadeState::new();
        for element in old {
            st.release(element, self.path.owner, self.path.col, &mut cascade)?;
        }
        st.remove_recursive(&mut cascade)
    }

    pub(crate) fn is_attached(&self) -> bool {
        let st = self.txn.lock();
        !matches!(self.update(&st), Ok(UpdateStatus::Detached) | Err(_))
    }

    /// Revalidates and reports the outcome.
    pub(crate) fn update_if_needed(&self) -> CoreResult<UpdateStatus> {
        let st = self.txn.lock();
        self.update(&st)
    }

    pub(crate) fn get_path(&self) -> CoreResult<FullPath> {
        let st = self.txn.lock();
        self.attached_top(&st)?;
        self.full_path(&st)
    }
}

/// What a collection's elements may hold.
#[derive(Debug, Clone)]
pub(crate) struct ElementSpec {
    pub(crate) data_type: DataType,
    pub(crate) nullable: bool,
    pub(crate) target: Option<TableKey>,
    pub(crate) property: String,
}

impl ElementSpec {
    /// Elements of a list or dictionary column. Mixed elements and
    /// dictionary links are always nullable.
    pub(crate) fn for_column(spec: &ColumnSpec) -> Self {
        let always_nullable = spec.data_type == DataType::Mixed
            || (spec.data_type.is_link() && spec.collection == Some(CollectionType::Dictionary));
        Self {
            data_type: spec.data_type,
            nullable: spec.nullable || always_nullable,
            target: spec.target,
            property: spec.name.clone(),
        }
    }

    /// Elements of a collection nested in a mixed value.
    pub(crate) fn mixed(property: String) -> Self {
        Self {
            data_type: DataType::Mixed,
            nullable: true,
            target: None,
            property,
        }
    }

    /// Rejects values the collection cannot hold.
    ///
    /// Collection markers need mixed elements and room for one more level.
    pub(crate) fn check(
        &self,
        st: &TxnState,
        base: &CollectionBase,
        value: &Mixed,
        allow_embedded: bool,
    ) -> CoreResult<()> {
        if value.collection_type().is_some() {
            if self.data_type != DataType::Mixed {
                return Err(CoreError::type_mismatch(self.data_type.to_string(), value.type_name()));
            }
            return base.check_nesting(st);
        }
        if value.is_null() {
            if !self.nullable {
                return Err(CoreError::PropertyNotNullable {
                    property: self.property.clone(),
                });
            }
            return Ok(());
        }
        if !accepts(self.data_type, value) {
            return Err(CoreError::type_mismatch(self.data_type.to_string(), value.type_name()));
        }
        if let Mixed::Link(link) = value {
            if self.data_type == DataType::Link && Some(link.table) != self.target {
                return Err(CoreError::type_mismatch(
                    format!("link to {:?}", self.target),
                    format!("link to {}", link.table),
                ));
            }
            st.check_link_target(*link, allow_embedded)?;
        }
        Ok(())
    }
}

/// Stored form of `value`. A marker becomes an empty nested entry under a
/// fresh stable key taken from `top`.
pub(crate) fn make_element(st: &mut TxnState, top: Ref, value: &Mixed) -> CoreResult<(Ref, Element)> {
    match value.collection_type() {
        Some(kind) => {
            let (top, key) = layout::allocate_key(&mut st.store, top)?;
            Ok((
                top,
                Element::Nested {
                    kind,
                    top: Ref::NULL,
                    key,
                },
            ))
        }
        None => Ok((top, Element::Value(value.clone()))),
    }
}

/// Returns true when writing `value` over `old` changes nothing.
pub(crate) fn unchanged(old: &Element, value: &Mixed) -> bool {
    match (old, value.collection_type()) {
        (Element::Value(current), None) => current.is_identical(value),
        (Element::Nested { kind, .. }, Some(new_kind)) => *kind == new_kind,
        _ => false,
    }
}

const fn parent_layout(kind: CollectionType) -> Layout {
    match kind {
        CollectionType::List => Layout::MixedList,
        CollectionType::Dictionary => Layout::Dictionary,
    }
}

/// `None` for a collection without storage.
pub(crate) fn stored(top: Ref) -> Option<Ref> {
    Some(top).filter(|top| !top.is_null())
}

/// Values of the tree under `top`, in order; empty for `None`.
pub(crate) fn values(st: &TxnState, layout: Layout, top: Option<Ref>) -> CoreResult<Vec<Element>> {
    match top {
        Some(top) => bptree::to_vec(&st.store, layout::values_tree(&st.store, layout, top)?),
        None => Ok(Vec::new()),
    }
}

/// Number of values under `top`.
pub(crate) fn size(st: &TxnState, layout: Layout, top: Option<Ref>) -> CoreResult<usize> {
    match top {
        Some(top) => bptree::size(&st.store, layout::values_tree(&st.store, layout, top)?),
        None => Ok(0),
    }
}

/// Reader's view of a stored element. Unresolved links read as null in
/// mixed collections.
pub(crate) fn visible(layout: Layout, element: &Element) -> Mixed {
    match element.to_mixed() {
        Mixed::Link(link) if layout != Layout::TypedList && link.is_unresolved() => Mixed::Null,
        value => value,
    }
}
