//! Core type definitions for nestdb.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an immutable node in the page store.
///
/// Refs are never reused. [`Ref::NULL`] means "no storage yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ref(pub u64);

impl Ref {
    /// The absent ref.
    pub const NULL: Ref = Ref(0);

    /// Returns true for [`Ref::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reinterprets a slot of a top array.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub(crate) const fn from_slot(slot: i64) -> Self {
        Self(slot as u64)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref:{}", self.0)
    }
}

/// Identifier for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableKey(pub u32);

impl TableKey {
    /// Creates a new table key.
    #[must_use]
    pub const fn new(key: u32) -> Self {
        Self(key)
    }

    /// Position of the table in the schema.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table:{}", self.0)
    }
}

/// Identifier for a column within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColKey(pub u32);

impl ColKey {
    /// Creates a new column key.
    #[must_use]
    pub const fn new(key: u32) -> Self {
        Self(key)
    }

    /// Position of the column in its table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ColKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col:{}", self.0)
    }
}

/// Key of an object within its table.
///
/// Live keys are non-negative. A link to a tombstoned object stores the
/// *unresolved* form `-2 - key`, which is always `<= -2`. `-1` is the null key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjKey(pub i64);

impl ObjKey {
    /// The null key.
    pub const NULL: ObjKey = ObjKey(-1);

    /// Creates a new object key.
    #[must_use]
    pub const fn new(key: i64) -> Self {
        Self(key)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns true for the null key.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == -1
    }

    /// Returns true if this key points at a tombstone.
    #[must_use]
    pub const fn is_unresolved(self) -> bool {
        self.0 <= -2
    }

    /// Switches between the live and unresolved form. Applying it twice is the identity.
    #[must_use]
    pub const fn get_unresolved(self) -> Self {
        Self(-2 - self.0)
    }

    /// Returns the live form of this key.
    #[must_use]
    pub const fn resolved(self) -> Self {
        if self.is_unresolved() {
            self.get_unresolved()
        } else {
            self
        }
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unresolved() {
            write!(f, "obj:unresolved({})", self.get_unresolved().0)
        } else {
            write!(f, "obj:{}", self.0)
        }
    }
}

/// A fully qualified link: target table and object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjLink {
    /// Table of the target object.
    pub table: TableKey,
    /// Key of the target object.
    pub key: ObjKey,
}

impl ObjLink {
    /// Creates a new link.
    #[must_use]
    pub const fn new(table: TableKey, key: ObjKey) -> Self {
        Self { table, key }
    }

    /// Returns true if the target is a tombstone.
    #[must_use]
    pub const fn is_unresolved(self) -> bool {
        self.key.is_unresolved()
    }

    /// Returns the same link with the key in its live form.
    #[must_use]
    pub const fn resolved(self) -> Self {
        Self {
            table: self.table,
            key: self.key.resolved(),
        }
    }
}

impl fmt::Display for ObjLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.key)
    }
}

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_key_is_an_involution() {
        for raw in [0, 1, 7, 1 << 40] {
            let key = ObjKey::new(raw);
            let unresolved = key.get_unresolved();
            assert!(unresolved.is_unresolved());
            assert!(unresolved.value() <= -2);
            assert_eq!(unresolved.get_unresolved(), key);
            assert_eq!(unresolved.resolved(), key);
        }
        assert!(!ObjKey::NULL.is_unresolved());
        assert!(ObjKey::NULL.is_null());
    }

    #[test]
    fn link_resolution_keeps_table() {
        let link = ObjLink::new(TableKey::new(3), ObjKey::new(5).get_unresolved());
        assert!(link.is_unresolved());
        assert_eq!(link.resolved(), ObjLink::new(TableKey::new(3), ObjKey::new(5)));
    }

    #[test]
    fn display_formats() {
        assert_eq!(Ref(9).to_string(), "ref:9");
        assert_eq!(ObjKey::new(4).to_string(), "obj:4");
        assert_eq!(ObjKey::new(4).get_unresolved().to_string(), "obj:unresolved(4)");
        assert_eq!(TransactionId::new(2).to_string(), "txn:2");
        assert!(Ref::NULL.is_null());
    }
}
