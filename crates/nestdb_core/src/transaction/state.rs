//! Per-transaction state shared by the transaction handle and its accessors.

use crate::alloc::{unexpected_node, Element, Node, NodeStore};
use crate::config::Config;
use crate::database::DbShared;
use crate::error::{CoreError, CoreResult};
use crate::replication::{FullPath, Replication, ReplicationSink};
use crate::schema::Schema;
use crate::table::Cluster;
use crate::types::{ColKey, ObjLink, Ref, TableKey, TransactionId};
use std::sync::Arc;

/// Stage of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Bound to a committed snapshot; no writes.
    Reading,
    /// Holds the writer role.
    Writing,
    /// Committed, rolled back or closed. Every accessor is detached.
    Closed,
}

pub(crate) struct TxnState {
    pub(crate) id: TransactionId,
    pub(crate) stage: Stage,
    pub(crate) shared: Arc<DbShared>,
    /// Committed version this transaction started from.
    pub(crate) version: u64,
    /// Current group top; a scratch ref once the transaction has written.
    pub(crate) top: Ref,
    pub(crate) store: NodeStore,
    pub(crate) schema: Arc<Schema>,
    /// Bumped by every change to any value.
    pub(crate) content_version: u64,
    /// Bumped by changes to the number or position of elements.
    pub(crate) storage_version: u64,
    pub(crate) replication: Option<ReplicationSink>,
    pub(crate) cascade_invocations: u64,
}

impl TxnState {
    pub(crate) fn new(
        id: TransactionId,
        stage: Stage,
        shared: Arc<DbShared>,
        version: u64,
        top: Ref,
    ) -> CoreResult<Self> {
        let store = NodeStore::new(Arc::clone(&shared.alloc));
        let replication = match stage {
            Stage::Writing => shared.replication.read().clone(),
            _ => None,
        };
        let mut state = Self {
            id,
            stage,
            shared,
            version,
            top,
            store,
            schema: Arc::new(Schema::default()),
            content_version: 1,
            storage_version: 1,
            replication,
            cascade_invocations: 0,
        };
        state.reload_schema()?;
        Ok(state)
    }

    pub(crate) fn config(&self) -> &Config {
        &self.shared.config
    }

    pub(crate) fn check_open(&self) -> CoreResult<()> {
        match self.stage {
            Stage::Closed => Err(CoreError::TransactionClosed),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_write(&self) -> CoreResult<()> {
        match self.stage {
            Stage::Writing => Ok(()),
            Stage::Reading => Err(CoreError::NotInWriteTransaction),
            Stage::Closed => Err(CoreError::TransactionClosed),
        }
    }

    pub(crate) fn bump_content(&mut self) {
        self.content_version += 1;
    }

    pub(crate) fn bump_both(&mut self) {
        self.content_version += 1;
        self.storage_version += 1;
    }

    /// Re-reads the schema node of the current group top.
    pub(crate) fn reload_schema(&mut self) -> CoreResult<()> {
        let top = self.store.top(self.top)?;
        let schema_ref = top
            .refs
            .first()
            .copied()
            .ok_or_else(|| CoreError::corrupt_node(self.top.as_u64(), "group top has no schema"))?;
        match &*self.store.node(schema_ref)? {
            Node::Schema(schema) => {
                self.schema = Arc::new(schema.clone());
                Ok(())
            }
            other => Err(unexpected_node(schema_ref, "schema", other)),
        }
    }

    /// Adds a table and its empty cluster.
    pub(crate) fn add_table(&mut self, spec: crate::schema::TableSpec) -> CoreResult<TableKey> {
        self.check_write()?;
        let mut schema = (*self.schema).clone();
        let key = schema.add_table(spec)?;
        let schema_ref = self.store.alloc(Node::Schema(schema.clone()));
        let cluster_ref = self.store.alloc(Node::Cluster(Cluster::default()));
        let (top, array) = self.store.top_mut(self.top)?;
        if let Some(slot) = array.refs.first_mut() {
            *slot = schema_ref;
        }
        array.refs.push(cluster_ref);
        self.top = top;
        self.schema = Arc::new(schema);
        self.bump_both();
        Ok(key)
    }

    fn cluster_ref(&self, table: TableKey) -> CoreResult<Ref> {
        self.store
            .top(self.top)?
            .refs
            .get(table.index() + 1)
            .copied()
            .ok_or_else(|| CoreError::schema_mismatch(format!("no table {table}")))
    }

    /// Runs `f` against the cluster of `table`.
    pub(crate) fn with_cluster<R>(
        &self,
        table: TableKey,
        f: impl FnOnce(&Cluster) -> R,
    ) -> CoreResult<R> {
        let node_ref = self.cluster_ref(table)?;
        match &*self.store.node(node_ref)? {
            Node::Cluster(cluster) => Ok(f(cluster)),
            other => Err(unexpected_node(node_ref, "cluster", other)),
        }
    }

    /// Writable cluster of `table`; relocates the group top when copied.
    pub(crate) fn cluster_mut(&mut self, table: TableKey) -> CoreResult<&mut Cluster> {
        let current = self.cluster_ref(table)?;
        let (fresh, _) = self.store.make_mut(current)?;
        if fresh != current {
            let (top, array) = self.store.top_mut(self.top)?;
            array.refs[table.index() + 1] = fresh;
            self.top = top;
        }
        match self.store.make_mut(fresh)? {
            (_, Node::Cluster(cluster)) => Ok(cluster),
            (node, other) => Err(unexpected_node(node, "cluster", other)),
        }
    }

    /// Returns true if `obj` is a live object.
    pub(crate) fn is_live(&self, obj: ObjLink) -> CoreResult<bool> {
        if obj.key.is_unresolved() || obj.key.is_null() || obj.table.index() >= self.schema.len() {
            return Ok(false);
        }
        self.with_cluster(obj.table, |c| c.objects.contains_key(&obj.key))
    }

    /// Value of one column of a live object, or `None` if the object is gone.
    pub(crate) fn slot(&self, obj: ObjLink, col: ColKey) -> CoreResult<Option<Element>> {
        if !self.is_live(obj)? {
            return Ok(None);
        }
        self.with_cluster(obj.table, |c| {
            c.objects
                .get(&obj.key)
                .and_then(|row| row.values.get(col.index()).cloned())
        })
    }

    /// Overwrites one column of a live object.
    pub(crate) fn set_slot(&mut self, obj: ObjLink, col: ColKey, element: Element) -> CoreResult<()> {
        let cluster = self.cluster_mut(obj.table)?;
        let row = cluster
            .objects
            .get_mut(&obj.key)
            .ok_or(CoreError::ObjectNotFound { link: obj })?;
        let slot = row
            .values
            .get_mut(col.index())
            .ok_or_else(|| CoreError::schema_mismatch(format!("no column {col}")))?;
        *slot = element;
        Ok(())
    }

    /// Calls `f` on the replication sink, if one is installed.
    pub(crate) fn replicate(&self, f: impl FnOnce(&mut dyn Replication)) {
        if let Some(sink) = &self.replication {
            f(&mut *sink.lock());
        }
    }

    /// Like [`TxnState::replicate`], computing the path only when needed.
    pub(crate) fn replicate_at(
        &self,
        path: impl FnOnce(&Self) -> CoreResult<FullPath>,
        f: impl FnOnce(&mut dyn Replication, &FullPath),
    ) -> CoreResult<()> {
        if let Some(sink) = &self.replication {
            let path = path(self)?;
            f(&mut *sink.lock(), &path);
        }
        Ok(())
    }

    /// Gives up the writer role and aborts pending replication.
    pub(crate) fn end_write(&mut self) {
        if self.stage == Stage::Writing {
            if let Some(sink) = self.replication.take() {
                sink.lock().abort();
            }
            self.store.discard();
            self.shared.manager.release_writer();
        }
    }
}

impl Drop for TxnState {
    fn drop(&mut self) {
        self.end_write();
    }
}
