//! Object view over the values of a link dictionary.
//!
//! Unlike [`LnkLst`](super::LnkLst), nothing is hidden: a null or
//! unresolved value keeps its position and has no object.

use super::base::{StablePath, UpdateStatus};
use super::dictionary::Dictionary;
use super::json::JsonOutputMode;
use crate::error::{CoreError, CoreResult};
use crate::replication::FullPath;
use crate::table::Obj;
use crate::types::{ObjKey, TableKey};
use crate::value::{CollectionType, Mixed};

/// Positional object access to a dictionary of links.
pub struct DictionaryLinkValues {
    source: Dictionary,
    target: TableKey,
}

impl DictionaryLinkValues {
    /// Wraps `source`, which must hold links.
    pub fn new(source: Dictionary) -> CoreResult<Self> {
        let target = source.link_target().ok_or_else(|| {
            CoreError::type_mismatch("link dictionary", source.value_data_type().to_string())
        })?;
        Ok(Self { source, target })
    }

    /// Table the links point into.
    #[must_use]
    pub fn target_table(&self) -> TableKey {
        self.target
    }

    /// The dictionary underneath.
    #[must_use]
    pub fn as_dictionary(&self) -> &Dictionary {
        &self.source
    }

    /// Key of the object linked at `ndx` in key order. Null values and
    /// unresolved links give [`ObjKey::NULL`].
    pub fn get_key(&self, ndx: usize) -> CoreResult<ObjKey> {
        match self.source.get_any(ndx)? {
            Mixed::Null => Ok(ObjKey::NULL),
            Mixed::Link(link) => Ok(link.key),
            other => Err(CoreError::invariant(format!(
                "link dictionary holds a {} at {ndx}",
                other.type_name()
            ))),
        }
    }

    /// The object linked at `ndx`; `None` for null and unresolved links.
    pub fn get_object(&self, ndx: usize) -> CoreResult<Option<Obj>> {
        match self.source.get_any(ndx)? {
            Mixed::Link(link) if !link.is_unresolved() => {
                Ok(Some(Obj::new(self.source.base.txn.clone(), link)))
            }
            _ => Ok(None),
        }
    }

    /// Number of entries.
    pub fn size(&self) -> CoreResult<usize> {
        self.source.size()
    }

    /// Returns true when the dictionary has no entries.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.source.is_empty()
    }

    /// Value at `ndx` as a dynamic value.
    pub fn get_any(&self, ndx: usize) -> CoreResult<Mixed> {
        self.source.get_any(ndx)
    }

    /// Returns true if the value at `ndx` is null.
    pub fn is_null(&self, ndx: usize) -> CoreResult<bool> {
        self.source.is_null(ndx)
    }

    /// Position of the first value equal to `value`.
    pub fn find_any(&self, value: &Mixed) -> CoreResult<Option<usize>> {
        self.source.find_any(value)
    }

    /// Always `None`; links have no order for aggregates.
    pub fn min(&self) -> CoreResult<Option<Mixed>> {
        self.source.min()
    }

    /// Always `None`; links have no order for aggregates.
    pub fn max(&self) -> CoreResult<Option<Mixed>> {
        self.source.max()
    }

    /// Always `None`; links have no sum.
    pub fn sum(&self) -> CoreResult<Option<Mixed>> {
        self.source.sum()
    }

    /// Always `None`; links have no mean.
    pub fn avg(&self) -> CoreResult<Option<Mixed>> {
        self.source.avg()
    }

    /// Permutation of positions ordering the links.
    pub fn sort(&self, ascending: bool) -> CoreResult<Vec<usize>> {
        self.source.sort(ascending)
    }

    /// Positions of the first link to each distinct object.
    pub fn distinct(&self, order: Option<bool>) -> CoreResult<Vec<usize>> {
        self.source.distinct(order)
    }

    /// Removes every entry.
    pub fn clear(&self) -> CoreResult<()> {
        self.source.clear()
    }

    /// Exports the underlying dictionary.
    pub fn to_json(&self, mode: JsonOutputMode) -> CoreResult<String> {
        self.source.to_json(mode)
    }

    /// Always [`CollectionType::List`]: the view is positional.
    #[must_use]
    pub fn collection_type(&self) -> CollectionType {
        CollectionType::List
    }

    /// Returns true while the owner and the dictionary exist.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.source.is_attached()
    }

    /// Revalidates against the transaction.
    pub fn update_if_needed(&self) -> CoreResult<UpdateStatus> {
        self.source.update_if_needed()
    }

    /// Current positional path of the dictionary.
    pub fn get_path(&self) -> CoreResult<FullPath> {
        self.source.get_path()
    }

    /// Stable path of the dictionary.
    #[must_use]
    pub fn get_stable_path(&self) -> StablePath {
        self.source.get_stable_path()
    }
}
