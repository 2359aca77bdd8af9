//! Collection accessors.
//!
//! An accessor is a handle onto a list or dictionary value of an object. It
//! holds a [`StablePath`] rather than a pointer into storage and revalidates
//! itself at the start of every operation:
//!
//! - the owner and the path still resolve and nothing changed: reuse the
//!   cached top
//! - they resolve but the transaction changed: rebind to the new top
//! - they no longer resolve: reads see an empty collection and writes fail
//!   with [`CoreError::NotAttached`](crate::CoreError::NotAttached)
//!
//! | accessor | holds |
//! |---|---|
//! | [`List`] / [`Lst`] | one value kind |
//! | [`MixedList`] | mixed values and nested collections |
//! | [`Dictionary`] | string keys to values or nested collections |
//! | [`LnkLst`] | links, hiding links to tombstones |
//! | [`DictionaryLinkValues`] | positional objects of a link dictionary |

mod aggregate;
mod base;
mod dictionary;
mod json;
pub(crate) mod layout;
mod link_list;
mod link_values;
mod list;
mod mixed_list;

pub use base::{StablePath, UpdateStatus};
pub use dictionary::Dictionary;
pub use json::{write_mixed, JsonOutputMode, MixedFormatter};
pub use link_list::LnkLst;
pub use link_values::DictionaryLinkValues;
pub use list::{List, ListElement, Lst};
pub use mixed_list::MixedList;

use crate::error::CoreResult;
use crate::replication::FullPath;
use crate::value::{CollectionType, Mixed};

/// Any collection accessor, behind one shared set of operations.
pub enum CollectionHandle {
    /// A list of one value kind.
    List(List),
    /// A list of mixed values.
    MixedList(MixedList),
    /// A dictionary.
    Dictionary(Dictionary),
    /// A list of links.
    LinkList(LnkLst),
    /// The values of a link dictionary, by position.
    DictionaryLinks(DictionaryLinkValues),
}

impl CollectionHandle {
    /// Number of visible elements.
    pub fn size(&self) -> CoreResult<usize> {
        match self {
            Self::List(c) => c.size(),
            Self::MixedList(c) => c.size(),
            Self::Dictionary(c) => c.size(),
            Self::LinkList(c) => c.size(),
            Self::DictionaryLinks(c) => c.size(),
        }
    }

    /// Value at position `ndx`.
    pub fn get_any(&self, ndx: usize) -> CoreResult<Mixed> {
        match self {
            Self::List(c) => c.get_any(ndx),
            Self::MixedList(c) => c.get_any(ndx),
            Self::Dictionary(c) => c.get_any(ndx),
            Self::LinkList(c) => c.get_any(ndx),
            Self::DictionaryLinks(c) => c.get_any(ndx),
        }
    }

    /// Returns true if the value at `ndx` is null.
    pub fn is_null(&self, ndx: usize) -> CoreResult<bool> {
        Ok(self.get_any(ndx)?.is_null())
    }

    /// Smallest value; `None` for links.
    pub fn min(&self) -> CoreResult<Option<Mixed>> {
        match self {
            Self::List(c) => c.min(),
            Self::MixedList(c) => c.min(),
            Self::Dictionary(c) => c.min(),
            Self::LinkList(_) => Ok(None),
            Self::DictionaryLinks(c) => c.min(),
        }
    }

    /// Largest value; `None` for links.
    pub fn max(&self) -> CoreResult<Option<Mixed>> {
        match self {
            Self::List(c) => c.max(),
            Self::MixedList(c) => c.max(),
            Self::Dictionary(c) => c.max(),
            Self::LinkList(_) => Ok(None),
            Self::DictionaryLinks(c) => c.max(),
        }
    }

    /// Sum; `None` for kinds without one.
    pub fn sum(&self) -> CoreResult<Option<Mixed>> {
        match self {
            Self::List(c) => c.sum(),
            Self::MixedList(c) => c.sum(),
            Self::Dictionary(c) => c.sum(),
            Self::LinkList(_) => Ok(None),
            Self::DictionaryLinks(c) => c.sum(),
        }
    }

    /// Mean; `None` for kinds without one.
    pub fn avg(&self) -> CoreResult<Option<Mixed>> {
        match self {
            Self::List(c) => c.avg(),
            Self::MixedList(c) => c.avg(),
            Self::Dictionary(c) => c.avg(),
            Self::LinkList(_) => Ok(None),
            Self::DictionaryLinks(c) => c.avg(),
        }
    }

    /// Index permutation ordering the values.
    pub fn sort(&self, ascending: bool) -> CoreResult<Vec<usize>> {
        match self {
            Self::List(c) => c.sort(ascending),
            Self::MixedList(c) => c.sort(ascending),
            Self::Dictionary(c) => c.sort(ascending),
            Self::LinkList(c) => c.sort(ascending),
            Self::DictionaryLinks(c) => c.sort(ascending),
        }
    }

    /// Positions of the first occurrence of each value.
    pub fn distinct(&self, order: Option<bool>) -> CoreResult<Vec<usize>> {
        match self {
            Self::List(c) => c.distinct(order),
            Self::MixedList(c) => c.distinct(order),
            Self::Dictionary(c) => c.distinct(order),
            Self::LinkList(c) => c.distinct(order),
            Self::DictionaryLinks(c) => c.distinct(order),
        }
    }

    /// Removes every element.
    pub fn clear(&self) -> CoreResult<()> {
        match self {
            Self::List(c) => c.clear(),
            Self::MixedList(c) => c.clear(),
            Self::Dictionary(c) => c.clear(),
            Self::LinkList(c) => c.clear(),
            Self::DictionaryLinks(c) => c.clear(),
        }
    }

    /// Exports the collection as JSON.
    pub fn to_json(&self, mode: JsonOutputMode) -> CoreResult<String> {
        match self {
            Self::List(c) => c.to_json(mode),
            Self::MixedList(c) => c.to_json(mode),
            Self::Dictionary(c) => c.to_json(mode),
            Self::LinkList(c) => c.to_json(mode),
            Self::DictionaryLinks(c) => c.to_json(mode),
        }
    }

    /// Shape of the collection.
    #[must_use]
    pub fn collection_type(&self) -> CollectionType {
        match self {
            Self::Dictionary(_) => CollectionType::Dictionary,
            _ => CollectionType::List,
        }
    }

    /// Returns true while the owner and the collection exist.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        match self {
            Self::List(c) => c.is_attached(),
            Self::MixedList(c) => c.is_attached(),
            Self::Dictionary(c) => c.is_attached(),
            Self::LinkList(c) => c.is_attached(),
            Self::DictionaryLinks(c) => c.is_attached(),
        }
    }

    /// Current positional path.
    pub fn get_path(&self) -> CoreResult<FullPath> {
        match self {
            Self::List(c) => c.get_path(),
            Self::MixedList(c) => c.get_path(),
            Self::Dictionary(c) => c.get_path(),
            Self::LinkList(c) => c.get_path(),
            Self::DictionaryLinks(c) => c.get_path(),
        }
    }
}
