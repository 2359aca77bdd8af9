//! Transactions over versioned snapshots of the page store.
//!
//! nestdb provides:
//! - **Snapshot isolation**: a transaction reads the committed version it
//!   started from until it advances
//! - **Single writer**: one write transaction at a time per database
//! - **Atomic commits**: every node written by a transaction becomes visible
//!   together with the new group top
//!
//! A [`Transaction`] is a cheap handle; accessors created from it keep a
//! clone. Committing, rolling back or closing a transaction detaches every
//! accessor whose owner no longer exists in the resulting snapshot.

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::Stage;
pub(crate) use state::TxnState;

use crate::error::{CoreError, CoreResult};
use crate::schema::{Schema, TableSpec};
use crate::table::Obj;
use crate::types::{ColKey, ObjKey, ObjLink, TableKey, TransactionId};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::debug;

/// Handle to a read or write transaction.
///
/// Clones share the same transaction. Dropping the last clone of a write
/// transaction rolls it back.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Mutex<TxnState>>,
}

impl Transaction {
    pub(crate) fn new(state: TxnState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TxnState> {
        self.inner.lock()
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.lock().id
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.lock().stage
    }

    /// Committed version this transaction reads from (or last committed).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Counter bumped by every change visible to this transaction.
    #[must_use]
    pub fn content_version(&self) -> u64 {
        self.lock().content_version
    }

    /// Counter bumped by changes to the number or position of elements.
    #[must_use]
    pub fn storage_version(&self) -> u64 {
        self.lock().storage_version
    }

    /// Links released through the cascade so far.
    #[must_use]
    pub fn cascade_invocations(&self) -> u64 {
        self.lock().cascade_invocations
    }

    /// Schema of the current snapshot.
    #[must_use]
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.lock().schema)
    }

    /// Looks up a table by name.
    pub fn table_key(&self, name: &str) -> CoreResult<TableKey> {
        self.lock()
            .schema
            .table_key(name)
            .ok_or_else(|| CoreError::schema_mismatch(format!("no table '{name}'")))
    }

    /// Looks up a column by name.
    pub fn col_key(&self, table: TableKey, name: &str) -> CoreResult<ColKey> {
        self.lock()
            .schema
            .table(table)?
            .col_key(name)
            .ok_or_else(|| CoreError::schema_mismatch(format!("no column '{name}' in {table}")))
    }

    /// Adds a table.
    pub fn add_table(&self, spec: TableSpec) -> CoreResult<TableKey> {
        self.lock().add_table(spec)
    }

    /// Creates an object with default values in a top-level table.
    pub fn create_object(&self, table: TableKey) -> CoreResult<Obj> {
        let key = self.lock().create_object(table, false)?;
        Ok(Obj::new(self.clone(), ObjLink::new(table, key)))
    }

    /// Returns an accessor for a live object.
    pub fn get_object(&self, link: ObjLink) -> CoreResult<Obj> {
        let state = self.lock();
        state.check_open()?;
        if !state.is_live(link)? {
            return Err(CoreError::ObjectNotFound { link });
        }
        drop(state);
        Ok(Obj::new(self.clone(), link))
    }

    /// Keys of the live objects of a table.
    pub fn object_keys(&self, table: TableKey) -> CoreResult<Vec<ObjKey>> {
        let state = self.lock();
        state.check_open()?;
        state.with_cluster(table, |c| c.keys().collect())
    }

    /// Number of live objects in a table.
    pub fn object_count(&self, table: TableKey) -> CoreResult<usize> {
        let state = self.lock();
        state.check_open()?;
        state.with_cluster(table, |c| c.len())
    }

    /// Number of tombstones in a table.
    pub fn tombstone_count(&self, table: TableKey) -> CoreResult<usize> {
        let state = self.lock();
        state.check_open()?;
        state.with_cluster(table, |c| c.tombstones.len())
    }

    /// Runs the invariant checker over the whole snapshot.
    pub fn verify(&self) -> CoreResult<()> {
        let state = self.lock();
        state.check_open()?;
        state.verify()
    }

    /// Commits and closes the transaction. Returns the new version.
    pub fn commit(&self) -> CoreResult<u64> {
        let mut state = self.lock();
        let version = commit(&mut state)?;
        state.stage = Stage::Closed;
        Ok(version)
    }

    /// Commits and keeps reading from the new version.
    pub fn commit_and_continue_as_read(&self) -> CoreResult<u64> {
        commit(&mut self.lock())
    }

    /// Discards every change and closes the transaction.
    pub fn rollback(&self) -> CoreResult<()> {
        let mut state = self.lock();
        rollback(&mut state)?;
        state.stage = Stage::Closed;
        Ok(())
    }

    /// Discards every change and keeps reading from the starting version.
    pub fn rollback_and_continue_as_read(&self) -> CoreResult<()> {
        rollback(&mut self.lock())
    }

    /// Moves a read transaction to the latest committed version.
    pub fn advance_read(&self) -> CoreResult<u64> {
        let mut state = self.lock();
        match state.stage {
            Stage::Reading => {}
            Stage::Writing => {
                return Err(CoreError::illegal_operation(
                    "a write transaction cannot advance",
                ))
            }
            Stage::Closed => return Err(CoreError::TransactionClosed),
        }
        advance(&mut state)?;
        debug!(txn = %state.id, version = state.version, "advanced read transaction");
        Ok(state.version)
    }

    /// Turns a read transaction into the write transaction, waiting for the
    /// current writer if there is one. Reads the latest version afterwards.
    pub fn promote_to_write(&self) -> CoreResult<()> {
        let mut state = self.lock();
        match state.stage {
            Stage::Reading => {}
            Stage::Writing => return Ok(()),
            Stage::Closed => return Err(CoreError::TransactionClosed),
        }
        state.shared.check_open()?;
        state.shared.manager.acquire_writer();
        if let Err(err) = advance(&mut state) {
            state.shared.manager.release_writer();
            return Err(err);
        }
        state.stage = Stage::Writing;
        let sink = state.shared.replication.read().clone();
        state.replication = sink;
        debug!(txn = %state.id, version = state.version, "promoted to write");
        Ok(())
    }

    /// Ends the transaction, rolling back pending writes.
    pub fn close(&self) {
        let mut state = self.lock();
        state.end_write();
        state.stage = Stage::Closed;
        state.bump_both();
    }
}

fn commit(state: &mut TxnState) -> CoreResult<u64> {
    state.check_write()?;
    let (latest, _) = state.shared.manager.snapshot();
    let version = latest + 1;
    let nodes = state
        .shared
        .alloc
        .commit(state.store.scratch(), state.top, version)?;
    state.shared.manager.publish(version, state.top);
    if let Some(sink) = state.replication.take() {
        sink.lock().commit(version);
    }
    state.store.discard();
    state.version = version;
    state.stage = Stage::Reading;
    state.shared.manager.release_writer();
    state.bump_both();
    debug!(txn = %state.id, version, nodes, "committed");
    Ok(version)
}

fn rollback(state: &mut TxnState) -> CoreResult<()> {
    state.check_write()?;
    state.end_write();
    let (version, top) = state.shared.manager.snapshot();
    state.version = version;
    state.top = top;
    state.stage = Stage::Reading;
    state.reload_schema()?;
    state.bump_both();
    debug!(txn = %state.id, version, "rolled back");
    Ok(())
}

fn advance(state: &mut TxnState) -> CoreResult<()> {
    let (version, top) = state.shared.manager.snapshot();
    if version != state.version {
        state.version = version;
        state.top = top;
        state.reload_schema()?;
        state.bump_both();
    }
    Ok(())
}
