//! Test fixtures and database helpers.
//!
//! Provides ready-made databases and a document schema that covers every
//! collection kind.

use nestdb_core::{
    ChangesetLog, ColumnSpec, Config, DataType, Database, Dictionary, List, LnkLst, MixedList, Obj,
    ReplicationSink, TableKey, TableSpec, Transaction,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;

/// Installs a `tracing` subscriber for tests, once per process.
///
/// Honors `RUST_LOG`; defaults to warnings only.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an in-memory test database with `config`.
    pub fn memory_with_config(config: Config) -> Self {
        init_tracing();
        let backend = Box::new(nestdb_storage::InMemoryBackend::new());
        Self {
            db: Database::open_with_backend(backend, config).expect("Failed to open in-memory database"),
            temp_dir: None,
        }
    }

    /// Creates a new file-based test database in a temporary directory.
    pub fn file() -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("db")).expect("Failed to open file database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("db"))
    }

    /// Closes and reopens a file-based database from its directory.
    ///
    /// # Panics
    ///
    /// Panics for in-memory databases.
    pub fn reopen(self) -> Self {
        let Self { db, temp_dir } = self;
        let temp_dir = temp_dir.expect("Only file databases can be reopened");
        drop(db);
        let db = Database::open(&temp_dir.path().join("db")).expect("Failed to reopen database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Tables of the document schema.
#[derive(Debug, Clone, Copy)]
pub struct DocTables {
    /// Link target table.
    pub target: TableKey,
    /// Embedded table owned through `Doc.parts`.
    pub part: TableKey,
    /// The document table.
    pub doc: TableKey,
}

/// Adds the document schema:
///
/// | table | column | kind |
/// |---|---|---|
/// | Target | `name` | string |
/// | Part | `label` | string |
/// | Doc | `ints` | list of int |
/// | Doc | `opt_ints` | list of int? |
/// | Doc | `items` | list of mixed |
/// | Doc | `props` | dictionary of mixed |
/// | Doc | `any` | mixed |
/// | Doc | `links` | list of links to Target |
/// | Doc | `parts` | list of links to Part |
pub fn add_doc_tables(txn: &Transaction) -> nestdb_core::CoreResult<DocTables> {
    let target = txn.add_table(TableSpec::new("Target").column(ColumnSpec::new("name", DataType::String)))?;
    let part = txn.add_table(TableSpec::embedded("Part").column(ColumnSpec::new("label", DataType::String)))?;
    let doc = txn.add_table(
        TableSpec::new("Doc")
            .column(ColumnSpec::list("ints", DataType::Int))
            .column(ColumnSpec::list("opt_ints", DataType::Int).nullable())
            .column(ColumnSpec::list("items", DataType::Mixed))
            .column(ColumnSpec::dictionary("props", DataType::Mixed))
            .column(ColumnSpec::new("any", DataType::Mixed))
            .column(ColumnSpec::link_list("links", target))
            .column(ColumnSpec::link_list("parts", part)),
    )?;
    Ok(DocTables { target, part, doc })
}

/// Shared handle to a changeset log.
pub type SharedLog = Arc<Mutex<ChangesetLog>>;

/// A write transaction on a fresh database holding one document.
pub struct DocFixture {
    /// Owns the database.
    pub db: TestDatabase,
    /// Open write transaction.
    pub txn: Transaction,
    /// Table keys.
    pub tables: DocTables,
    /// The document.
    pub doc: Obj,
    /// Changes logged since the transaction began.
    pub log: SharedLog,
}

impl DocFixture {
    /// Builds the fixture on an in-memory database.
    pub fn memory() -> Self {
        Self::with_config(Config::default())
    }

    /// Builds the fixture with `config`.
    pub fn with_config(config: Config) -> Self {
        let db = TestDatabase::memory_with_config(config);
        let log = ChangesetLog::shared();
        db.set_replication(Some(log.clone() as ReplicationSink));
        let txn = db.begin_write().expect("Failed to begin write");
        let tables = add_doc_tables(&txn).expect("Failed to add tables");
        let doc = txn.create_object(tables.doc).expect("Failed to create document");
        Self {
            db,
            txn,
            tables,
            doc,
            log,
        }
    }

    fn col(&self, name: &str) -> nestdb_core::ColKey {
        self.doc.col_key(name).expect("Unknown column")
    }

    /// The `ints` list.
    pub fn ints(&self) -> List {
        self.doc.get_list(self.col("ints")).expect("Failed to get ints")
    }

    /// The `opt_ints` list.
    pub fn opt_ints(&self) -> List {
        self.doc.get_list(self.col("opt_ints")).expect("Failed to get opt_ints")
    }

    /// The `items` list.
    pub fn items(&self) -> MixedList {
        self.doc.get_list_mixed(self.col("items")).expect("Failed to get items")
    }

    /// The `props` dictionary.
    pub fn props(&self) -> Dictionary {
        self.doc.get_dictionary(self.col("props")).expect("Failed to get props")
    }

    /// The `links` list.
    pub fn links(&self) -> LnkLst {
        self.doc.get_linklist(self.col("links")).expect("Failed to get links")
    }

    /// The `parts` list.
    pub fn parts(&self) -> LnkLst {
        self.doc.get_linklist(self.col("parts")).expect("Failed to get parts")
    }

    /// Creates `count` objects in the link target table.
    pub fn targets(&self, count: usize) -> Vec<Obj> {
        (0..count)
            .map(|_| self.txn.create_object(self.tables.target).expect("Failed to create target"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_database_starts_at_version_one() {
        with_temp_db(|db| assert_eq!(db.version(), 1));
    }

    #[test]
    fn fixture_columns_resolve() {
        let f = DocFixture::memory();
        assert_eq!(f.ints().size().unwrap(), 0);
        assert_eq!(f.props().size().unwrap(), 0);
        assert_eq!(f.links().target_table(), f.tables.target);
        assert_eq!(f.targets(3).len(), 3);
    }

    #[test]
    fn file_database_reopens() {
        let db = TestDatabase::file();
        let txn = db.begin_write().unwrap();
        add_doc_tables(&txn).unwrap();
        txn.commit().unwrap();
        drop(txn);
        let db = db.reopen();
        assert_eq!(db.version(), 2);
    }
}
