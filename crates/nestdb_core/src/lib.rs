//! # nestdb core
//!
//! Object database with nested collections over a copy-on-write page store.
//!
//! This crate provides:
//! - Versioned page store: B+trees of elements in copy-on-write nodes,
//!   appended to a checksummed node log
//! - Transactions with snapshot reads and a single writer
//! - Tables of objects with links, backlinks, tombstones and embedded objects
//! - Collection accessors ([`List`], [`Lst`], [`MixedList`], [`Dictionary`],
//!   [`LnkLst`], [`DictionaryLinkValues`]) that survive structural changes through stable paths
//! - Replication of every change as path-addressed instructions
//! - JSON export of collections
//!
//! ## Example
//!
//! ```rust
//! use nestdb_core::{CollectionType, ColumnSpec, Database, DataType, Mixed, TableSpec};
//!
//! let db = Database::open_in_memory().unwrap();
//! let txn = db.begin_write().unwrap();
//! let docs = txn
//!     .add_table(TableSpec::new("Doc").column(ColumnSpec::new("body", DataType::Mixed)))
//!     .unwrap();
//! let doc = txn.create_object(docs).unwrap();
//! let body = doc.col_key("body").unwrap();
//! doc.set_collection(body, CollectionType::Dictionary).unwrap();
//!
//! let dict = doc.get_dictionary(body).unwrap();
//! dict.insert("title", "nested").unwrap();
//! dict.insert_collection("tags", CollectionType::List).unwrap();
//! dict.get_list("tags").unwrap().add("a").unwrap();
//! assert_eq!(dict.get("title").unwrap(), Mixed::from("nested"));
//! txn.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod alloc;
mod bptree;
mod collection;
mod config;
mod database;
mod dir;
mod error;
mod replication;
mod schema;
mod table;
mod transaction;
mod types;
mod value;
mod verify;

pub use collection::{
    write_mixed, CollectionHandle, Dictionary, DictionaryLinkValues, JsonOutputMode, List, ListElement, LnkLst, Lst,
    MixedFormatter, MixedList, StablePath, UpdateStatus,
};
pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use replication::{
    Changeset, ChangesetLog, FullPath, Instruction, PathElement, Replication, ReplicationSink,
};
pub use schema::{ColumnSpec, Schema, TableSpec};
pub use table::{Backlink, CascadeState, Obj};
pub use transaction::{Stage, Transaction};
pub use types::{ColKey, ObjKey, ObjLink, Ref, TableKey, TransactionId};
pub use rust_decimal::Decimal;
pub use value::{accepts, default_value, CollectionType, DataType, Mixed, ObjectId, Timestamp};
