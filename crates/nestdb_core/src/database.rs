//! Database facade and recovery.

use crate::alloc::{Node, NodeStore, SlabAlloc, TopArray};
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::replication::ReplicationSink;
use crate::schema::Schema;
use crate::transaction::{Stage, Transaction, TransactionManager, TxnState};
use nestdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// State shared by a database and all of its transactions.
pub(crate) struct DbShared {
    pub(crate) alloc: Arc<SlabAlloc>,
    pub(crate) config: Config,
    pub(crate) manager: TransactionManager,
    pub(crate) replication: RwLock<Option<ReplicationSink>>,
    closed: AtomicBool,
    /// Holds the directory lock. None for in-memory databases.
    _dir: Option<DatabaseDir>,
}

impl DbShared {
    pub(crate) fn check_open(&self) -> CoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::DatabaseClosed);
        }
        Ok(())
    }
}

/// The main database handle.
///
/// # Opening a Database
///
/// ```rust,ignore
/// use nestdb_core::{ColumnSpec, DataType, Database, TableSpec};
///
/// let db = Database::open(Path::new("my_database"))?;
/// let txn = db.begin_write()?;
/// let people = txn.add_table(
///     TableSpec::new("Person").column(ColumnSpec::list("scores", DataType::Int)),
/// )?;
/// let person = txn.create_object(people)?;
/// person.get_list(txn.col_key(people, "scores")?)?.add(5)?;
/// txn.commit()?;
/// ```
///
/// For tests, use `Database::open_in_memory()`.
pub struct Database {
    shared: Arc<DbShared>,
}

impl Database {
    /// Opens a database from a directory path with the default configuration.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database from a directory path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another handle has the database locked (`DatabaseLocked`)
    /// - The directory is missing and `create_if_missing` is false
    /// - The database exists and `error_if_exists` is set
    /// - I/O errors occur
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, &config)?;
        let backend = FileBackend::open(&dir.node_log_path())?;
        Self::open_inner(Box::new(backend), config, Some(dir))
    }

    /// Opens a database over an arbitrary backend.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        Self::open_inner(backend, config, None)
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), Config::default())
    }

    fn open_inner(
        backend: Box<dyn StorageBackend>,
        config: Config,
        dir: Option<DatabaseDir>,
    ) -> CoreResult<Self> {
        let (alloc, recovered) =
            SlabAlloc::open(backend, config.format_version, config.sync_on_commit)?;
        if recovered.format_version.0 != config.format_version.0 {
            return Err(CoreError::invalid_format(format!(
                "unsupported format version {}.{}",
                recovered.format_version.0, recovered.format_version.1
            )));
        }
        let alloc = Arc::new(alloc);

        let (version, top) = match recovered.last_commit {
            Some(last) => last,
            None => {
                let mut store = NodeStore::new(Arc::clone(&alloc));
                let schema = store.alloc(Node::Schema(Schema::default()));
                let top = store.alloc(Node::Top(TopArray {
                    refs: vec![schema],
                    meta: Vec::new(),
                }));
                alloc.commit(store.scratch(), top, 1)?;
                (1, top)
            }
        };
        match dir.as_ref() {
            Some(dir) => info!(
                version,
                nodes = alloc.node_count(),
                path = %dir.root().display(),
                existed = dir.existed(),
                "opened database"
            ),
            None => info!(version, nodes = alloc.node_count(), "opened database"),
        }

        Ok(Self {
            shared: Arc::new(DbShared {
                alloc,
                config,
                manager: TransactionManager::new(version, top),
                replication: RwLock::new(None),
                closed: AtomicBool::new(false),
                _dir: dir,
            }),
        })
    }

    /// Starts a read transaction on the latest committed version.
    pub fn begin_read(&self) -> CoreResult<Transaction> {
        self.shared.check_open()?;
        let (version, top) = self.shared.manager.snapshot();
        let id = self.shared.manager.next_txid();
        let state = TxnState::new(id, Stage::Reading, Arc::clone(&self.shared), version, top)?;
        Ok(Transaction::new(state))
    }

    /// Starts the write transaction, blocking while another writer is active.
    pub fn begin_write(&self) -> CoreResult<Transaction> {
        self.shared.check_open()?;
        self.shared.manager.acquire_writer();
        let (version, top) = self.shared.manager.snapshot();
        let id = self.shared.manager.next_txid();
        match TxnState::new(id, Stage::Writing, Arc::clone(&self.shared), version, top) {
            Ok(state) => Ok(Transaction::new(state)),
            Err(err) => {
                self.shared.manager.release_writer();
                Err(err)
            }
        }
    }

    /// Installs or removes the replication sink used by later write transactions.
    pub fn set_replication(&self, sink: Option<ReplicationSink>) {
        *self.shared.replication.write() = sink;
    }

    /// Latest committed version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.manager.snapshot().0
    }

    /// The configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Size of the node log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.shared.alloc.log_size()
    }

    /// Refuses new transactions. Open transactions keep working.
    pub fn close(&self) -> CoreResult<()> {
        self.shared.check_open()?;
        self.shared.closed.store(true, Ordering::SeqCst);
        info!(version = self.version(), "closed database");
        Ok(())
    }

    /// Returns true until [`Database::close`] is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("version", &self.version())
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, TableSpec};
    use crate::types::ObjLink;
    use crate::value::{DataType, Mixed};
    use tempfile::TempDir;

    fn doc_table(txn: &Transaction) -> crate::types::TableKey {
        txn.add_table(
            TableSpec::new("Doc")
                .column(ColumnSpec::new("title", DataType::String))
                .column(ColumnSpec::list("scores", DataType::Int)),
        )
        .unwrap()
    }

    #[test]
    fn commit_publishes_a_new_version() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.version(), 1);
        let txn = db.begin_write().unwrap();
        doc_table(&txn);
        assert_eq!(txn.commit().unwrap(), 2);
        assert_eq!(db.version(), 2);
        assert_eq!(txn.stage(), Stage::Closed);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let table = doc_table(&txn);
        txn.create_object(table).unwrap();
        txn.commit().unwrap();

        let reader = db.begin_read().unwrap();
        let writer = db.begin_write().unwrap();
        writer.create_object(table).unwrap();
        writer.commit().unwrap();

        assert_eq!(reader.object_count(table).unwrap(), 1);
        assert_eq!(reader.advance_read().unwrap(), 3);
        assert_eq!(reader.object_count(table).unwrap(), 2);
    }

    #[test]
    fn rollback_discards_changes() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let table = doc_table(&txn);
        txn.commit().unwrap();

        let txn = db.begin_write().unwrap();
        txn.create_object(table).unwrap();
        txn.rollback_and_continue_as_read().unwrap();
        assert_eq!(txn.stage(), Stage::Reading);
        assert_eq!(txn.object_count(table).unwrap(), 0);
        assert_eq!(db.version(), 2);
    }

    #[test]
    fn reads_cannot_write() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        doc_table(&txn);
        txn.commit().unwrap();

        let reader = db.begin_read().unwrap();
        let table = reader.table_key("Doc").unwrap();
        assert!(matches!(
            reader.create_object(table),
            Err(CoreError::NotInWriteTransaction)
        ));
        reader.promote_to_write().unwrap();
        reader.create_object(table).unwrap();
        reader.commit().unwrap();
        assert_eq!(db.version(), 3);
    }

    #[test]
    fn promoted_reader_replicates_its_changes() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let table = doc_table(&txn);
        txn.commit().unwrap();

        let log = crate::replication::ChangesetLog::shared();
        db.set_replication(Some(log.clone() as ReplicationSink));
        let reader = db.begin_read().unwrap();
        reader.promote_to_write().unwrap();
        let obj = reader.create_object(table).unwrap();
        assert!(log.lock().pending().iter().any(|i| matches!(
            i,
            crate::replication::Instruction::CreateObject { key, .. } if *key == obj.link().key
        )));
        reader.rollback().unwrap();
    }

    #[test]
    fn closed_database_refuses_transactions() {
        let db = Database::open_in_memory().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
        assert!(matches!(db.begin_read(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.close(), Err(CoreError::DatabaseClosed)));
    }

    #[test]
    fn reopen_recovers_committed_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        let link = {
            let db = Database::open(&path).unwrap();
            let txn = db.begin_write().unwrap();
            let table = doc_table(&txn);
            let obj = txn.create_object(table).unwrap();
            obj.set(obj.col_key("title").unwrap(), "kept").unwrap();
            let scores = obj.get_list(obj.col_key("scores").unwrap()).unwrap();
            for n in [3, 1, 2] {
                scores.add(n).unwrap();
            }
            txn.commit().unwrap();

            let lost = db.begin_write().unwrap();
            lost.create_object(table).unwrap();
            lost.rollback().unwrap();
            obj.link()
        };

        let db = Database::open(&path).unwrap();
        assert_eq!(db.version(), 2);
        let txn = db.begin_read().unwrap();
        assert_eq!(txn.object_count(link.table).unwrap(), 1);
        let obj = txn.get_object(link).unwrap();
        assert_eq!(obj.get(obj.col_key("title").unwrap()).unwrap(), Mixed::from("kept"));
        let scores = obj.get_list(obj.col_key("scores").unwrap()).unwrap();
        assert_eq!(
            scores.to_vec().unwrap(),
            vec![Mixed::Int(3), Mixed::Int(1), Mixed::Int(2)]
        );
        txn.verify().unwrap();
        assert!(matches!(
            txn.get_object(ObjLink::new(link.table, crate::types::ObjKey::new(9))),
            Err(CoreError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn second_handle_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let _db = Database::open(dir.path()).unwrap();
        assert!(matches!(
            Database::open(dir.path()),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn error_if_exists_rejects_existing_database() {
        let dir = TempDir::new().unwrap();
        drop(Database::open(dir.path()).unwrap());
        let config = Config::default().error_if_exists(true);
        assert!(Database::open_with_config(dir.path(), config).is_err());
    }
}
