//! Replication of write transactions as instruction changesets.
//!
//! Accessors call the installed [`Replication`] sink *before* applying each
//! change locally. [`ChangesetLog`] is the bundled sink: it buffers the
//! instructions of one write transaction and seals them into a [`Changeset`]
//! on commit.
//!
//! ```rust,ignore
//! let log = Arc::new(Mutex::new(ChangesetLog::new()));
//! db.set_replication(Some(log.clone()));
//! ```

use crate::error::CoreResult;
use crate::types::{ColKey, ObjKey, TableKey};
use crate::value::Mixed;
use nestdb_codec::{to_canonical_cbor, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A shared replication sink.
pub type ReplicationSink = Arc<Mutex<dyn Replication>>;

/// One step of a [`FullPath`] below the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// Position in a list.
    Index(usize),
    /// Key in a dictionary.
    Key(String),
}

/// Positional address of a collection: object, column and the steps into
/// nested collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullPath {
    /// Table of the owning object.
    pub table: TableKey,
    /// Owning object.
    pub obj: ObjKey,
    /// Column of the owning object.
    pub col: ColKey,
    /// Steps from the column value down to the collection.
    pub elements: Vec<PathElement>,
}

impl fmt::Display for FullPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.table, self.obj, self.col)?;
        for element in &self.elements {
            match element {
                PathElement::Index(ndx) => write!(f, "[{ndx}]")?,
                PathElement::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

/// Receiver of structural changes, called before each change is applied.
///
/// Every method defaults to doing nothing.
#[allow(unused_variables)]
pub trait Replication: Send {
    /// An object was created.
    fn create_object(&mut self, table: TableKey, key: ObjKey) {}
    /// An object was removed or invalidated.
    fn remove_object(&mut self, table: TableKey, key: ObjKey) {}
    /// A scalar column was set.
    fn set(&mut self, table: TableKey, key: ObjKey, col: ColKey, value: &Mixed) {}
    /// An element was inserted into a list.
    fn list_insert(&mut self, path: &FullPath, ndx: usize, value: &Mixed) {}
    /// A list element was overwritten.
    fn list_set(&mut self, path: &FullPath, ndx: usize, value: &Mixed) {}
    /// A list element was removed.
    fn list_erase(&mut self, path: &FullPath, ndx: usize) {}
    /// A list element moved from `from` to `to`.
    fn list_move(&mut self, path: &FullPath, from: usize, to: usize) {}
    /// A list of `old_size` elements was cleared.
    fn list_clear(&mut self, path: &FullPath, old_size: usize) {}
    /// A new key was inserted into a dictionary.
    fn dictionary_insert(&mut self, path: &FullPath, key: &str, value: &Mixed) {}
    /// An existing dictionary key got a new value.
    fn dictionary_set(&mut self, path: &FullPath, key: &str, value: &Mixed) {}
    /// A dictionary key was removed.
    fn dictionary_erase(&mut self, path: &FullPath, key: &str) {}
    /// A dictionary was cleared.
    fn collection_clear(&mut self, path: &FullPath) {}
    /// The write transaction committed as `version`.
    fn commit(&mut self, version: u64) {}
    /// The write transaction was rolled back.
    fn abort(&mut self) {}
}

/// One replicated change.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// See [`Replication::create_object`].
    CreateObject {
        /// Table.
        table: TableKey,
        /// New object.
        key: ObjKey,
    },
    /// See [`Replication::remove_object`].
    RemoveObject {
        /// Table.
        table: TableKey,
        /// Removed object.
        key: ObjKey,
    },
    /// See [`Replication::set`].
    Set {
        /// Table.
        table: TableKey,
        /// Object.
        key: ObjKey,
        /// Column.
        col: ColKey,
        /// New value.
        value: Mixed,
    },
    /// See [`Replication::list_insert`].
    ListInsert {
        /// Collection.
        path: FullPath,
        /// Position.
        ndx: usize,
        /// Inserted value.
        value: Mixed,
    },
    /// See [`Replication::list_set`].
    ListSet {
        /// Collection.
        path: FullPath,
        /// Position.
        ndx: usize,
        /// New value.
        value: Mixed,
    },
    /// See [`Replication::list_erase`].
    ListErase {
        /// Collection.
        path: FullPath,
        /// Position.
        ndx: usize,
    },
    /// See [`Replication::list_move`].
    ListMove {
        /// Collection.
        path: FullPath,
        /// Old position.
        from: usize,
        /// New position.
        to: usize,
    },
    /// See [`Replication::list_clear`].
    ListClear {
        /// Collection.
        path: FullPath,
        /// Size before clearing.
        old_size: usize,
    },
    /// See [`Replication::dictionary_insert`].
    DictionaryInsert {
        /// Collection.
        path: FullPath,
        /// Key.
        key: String,
        /// Value.
        value: Mixed,
    },
    /// See [`Replication::dictionary_set`].
    DictionarySet {
        /// Collection.
        path: FullPath,
        /// Key.
        key: String,
        /// Value.
        value: Mixed,
    },
    /// See [`Replication::dictionary_erase`].
    DictionaryErase {
        /// Collection.
        path: FullPath,
        /// Key.
        key: String,
    },
    /// See [`Replication::collection_clear`].
    CollectionClear {
        /// Collection.
        path: FullPath,
    },
}

impl Instruction {
    /// Short name of the instruction kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Instruction::CreateObject { .. } => "create_object",
            Instruction::RemoveObject { .. } => "remove_object",
            Instruction::Set { .. } => "set",
            Instruction::ListInsert { .. } => "list_insert",
            Instruction::ListSet { .. } => "list_set",
            Instruction::ListErase { .. } => "list_erase",
            Instruction::ListMove { .. } => "list_move",
            Instruction::ListClear { .. } => "list_clear",
            Instruction::DictionaryInsert { .. } => "dictionary_insert",
            Instruction::DictionarySet { .. } => "dictionary_set",
            Instruction::DictionaryErase { .. } => "dictionary_erase",
            Instruction::CollectionClear { .. } => "collection_clear",
        }
    }

    fn to_cbor(&self) -> Value {
        let mut fields = vec![Value::from(self.name())];
        match self {
            Instruction::CreateObject { table, key } | Instruction::RemoveObject { table, key } => {
                fields.push(Value::from(table.0));
                fields.push(Value::Integer(key.value()));
            }
            Instruction::Set {
                table,
                key,
                col,
                value,
            } => {
                fields.push(Value::from(table.0));
                fields.push(Value::Integer(key.value()));
                fields.push(Value::from(col.0));
                fields.push(value.to_cbor());
            }
            Instruction::ListInsert { path, ndx, value } | Instruction::ListSet { path, ndx, value } => {
                fields.push(path_to_cbor(path));
                fields.push(index(*ndx));
                fields.push(value.to_cbor());
            }
            Instruction::ListErase { path, ndx } => {
                fields.push(path_to_cbor(path));
                fields.push(index(*ndx));
            }
            Instruction::ListMove { path, from, to } => {
                fields.push(path_to_cbor(path));
                fields.push(index(*from));
                fields.push(index(*to));
            }
            Instruction::ListClear { path, old_size } => {
                fields.push(path_to_cbor(path));
                fields.push(index(*old_size));
            }
            Instruction::DictionaryInsert { path, key, value }
            | Instruction::DictionarySet { path, key, value } => {
                fields.push(path_to_cbor(path));
                fields.push(Value::from(key.as_str()));
                fields.push(value.to_cbor());
            }
            Instruction::DictionaryErase { path, key } => {
                fields.push(path_to_cbor(path));
                fields.push(Value::from(key.as_str()));
            }
            Instruction::CollectionClear { path } => fields.push(path_to_cbor(path)),
        }
        Value::Array(fields)
    }
}

fn index(ndx: usize) -> Value {
    Value::Integer(i64::try_from(ndx).unwrap_or(i64::MAX))
}

fn path_to_cbor(path: &FullPath) -> Value {
    Value::Array(vec![
        Value::from(path.table.0),
        Value::Integer(path.obj.value()),
        Value::from(path.col.0),
        Value::Array(
            path.elements
                .iter()
                .map(|e| match e {
                    PathElement::Index(ndx) => index(*ndx),
                    PathElement::Key(key) => Value::from(key.as_str()),
                })
                .collect(),
        ),
    ])
}

/// The instructions of one committed write transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    /// Version produced by the commit.
    pub version: u64,
    /// Instructions in the order they were applied.
    pub instructions: Vec<Instruction>,
}

impl Changeset {
    /// Canonical CBOR encoding.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let value = Value::map(vec![
            (
                Value::from("instructions"),
                Value::Array(self.instructions.iter().map(Instruction::to_cbor).collect()),
            ),
            (
                Value::from("version"),
                Value::Integer(i64::try_from(self.version).unwrap_or(i64::MAX)),
            ),
        ]);
        Ok(to_canonical_cbor(&value)?)
    }
}

/// Buffers instructions and seals them into changesets on commit.
#[derive(Debug, Default)]
pub struct ChangesetLog {
    pending: Vec<Instruction>,
    changesets: Vec<Changeset>,
}

impl ChangesetLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty log ready to be installed with `Database::set_replication`.
    #[must_use]
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Instructions of the open write transaction.
    #[must_use]
    pub fn pending(&self) -> &[Instruction] {
        &self.pending
    }

    /// Sealed changesets, oldest first.
    #[must_use]
    pub fn changesets(&self) -> &[Changeset] {
        &self.changesets
    }

    /// Removes and returns every sealed changeset.
    pub fn take_changesets(&mut self) -> Vec<Changeset> {
        std::mem::take(&mut self.changesets)
    }
}

impl Replication for ChangesetLog {
    fn create_object(&mut self, table: TableKey, key: ObjKey) {
        self.pending.push(Instruction::CreateObject { table, key });
    }

    fn remove_object(&mut self, table: TableKey, key: ObjKey) {
        self.pending.push(Instruction::RemoveObject { table, key });
    }

    fn set(&mut self, table: TableKey, key: ObjKey, col: ColKey, value: &Mixed) {
        self.pending.push(Instruction::Set {
            table,
            key,
            col,
            value: value.clone(),
        });
    }

    fn list_insert(&mut self, path: &FullPath, ndx: usize, value: &Mixed) {
        self.pending.push(Instruction::ListInsert {
            path: path.clone(),
            ndx,
            value: value.clone(),
        });
    }

    fn list_set(&mut self, path: &FullPath, ndx: usize, value: &Mixed) {
        self.pending.push(Instruction::ListSet {
            path: path.clone(),
            ndx,
            value: value.clone(),
        });
    }

    fn list_erase(&mut self, path: &FullPath, ndx: usize) {
        self.pending.push(Instruction::ListErase {
            path: path.clone(),
            ndx,
        });
    }

    fn list_move(&mut self, path: &FullPath, from: usize, to: usize) {
        self.pending.push(Instruction::ListMove {
            path: path.clone(),
            from,
            to,
        });
    }

    fn list_clear(&mut self, path: &FullPath, old_size: usize) {
        self.pending.push(Instruction::ListClear {
            path: path.clone(),
            old_size,
        });
    }

    fn dictionary_insert(&mut self, path: &FullPath, key: &str, value: &Mixed) {
        self.pending.push(Instruction::DictionaryInsert {
            path: path.clone(),
            key: key.to_string(),
            value: value.clone(),
        });
    }

    fn dictionary_set(&mut self, path: &FullPath, key: &str, value: &Mixed) {
        self.pending.push(Instruction::DictionarySet {
            path: path.clone(),
            key: key.to_string(),
            value: value.clone(),
        });
    }

    fn dictionary_erase(&mut self, path: &FullPath, key: &str) {
        self.pending.push(Instruction::DictionaryErase {
            path: path.clone(),
            key: key.to_string(),
        });
    }

    fn collection_clear(&mut self, path: &FullPath) {
        self.pending.push(Instruction::CollectionClear { path: path.clone() });
    }

    fn commit(&mut self, version: u64) {
        let instructions = std::mem::take(&mut self.pending);
        self.changesets.push(Changeset {
            version,
            instructions,
        });
    }

    fn abort(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestdb_codec::from_cbor;

    fn path() -> FullPath {
        FullPath {
            table: TableKey::new(0),
            obj: ObjKey::new(3),
            col: ColKey::new(1),
            elements: vec![PathElement::Key("a".into()), PathElement::Index(2)],
        }
    }

    #[test]
    fn commit_seals_pending_instructions() {
        let mut log = ChangesetLog::new();
        log.create_object(TableKey::new(0), ObjKey::new(0));
        log.list_insert(&path(), 0, &Mixed::Int(5));
        assert_eq!(log.pending().len(), 2);

        log.commit(7);
        assert!(log.pending().is_empty());
        assert_eq!(log.changesets().len(), 1);
        assert_eq!(log.changesets()[0].version, 7);
        assert_eq!(log.changesets()[0].instructions[1].name(), "list_insert");
    }

    #[test]
    fn abort_discards_pending_instructions() {
        let mut log = ChangesetLog::new();
        log.list_clear(&path(), 4);
        log.abort();
        log.commit(2);
        assert!(log.take_changesets()[0].instructions.is_empty());
        assert!(log.changesets().is_empty());
    }

    #[test]
    fn changesets_encode_canonically() {
        let mut log = ChangesetLog::new();
        log.dictionary_insert(&path(), "k", &Mixed::String("v".into()));
        log.list_move(&path(), 0, 3);
        log.commit(1);

        let bytes = log.changesets()[0].encode().unwrap();
        let decoded = from_cbor(&bytes).unwrap();
        let instructions = decoded.get("instructions").unwrap().as_array().unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(
            instructions[0].as_array().unwrap()[0].as_text(),
            Some("dictionary_insert")
        );
    }

    #[test]
    fn full_path_display() {
        assert_eq!(path().to_string(), "table:0/obj:3/col:1[\"a\"][2]");
    }
}
