//! Objects, links and the cascade that keeps them consistent.
//!
//! Every table stores its rows in one [`Cluster`] node. Each row records its
//! incoming links as [`Backlink`]s, so deleting an object can find and clear
//! every link pointing at it.

mod cascade;
mod cluster;
mod links;
mod obj;

pub use cascade::CascadeState;
pub use cluster::{Backlink, Cluster, Row};
pub use obj::Obj;

use crate::alloc::Element;
use crate::error::{CoreError, CoreResult};
use crate::transaction::TxnState;
use crate::types::{ColKey, ObjKey, ObjLink, Ref, TableKey};
use crate::value::{accepts, default_value, CollectionType, DataType, Mixed};

/// What to do with an incoming link whose target goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkRewrite {
    /// Target deleted: erase list entries, null everything else.
    Nullify,
    /// Target invalidated: keep the entry as an unresolved link.
    Unresolve,
}

impl TxnState {
    /// Creates a row with default values.
    pub(crate) fn create_object(&mut self, table: TableKey, allow_embedded: bool) -> CoreResult<ObjKey> {
        self.check_write()?;
        let spec = self.schema.table(table)?;
        if spec.embedded && !allow_embedded {
            return Err(CoreError::illegal_operation(format!(
                "objects of embedded table '{}' are created through a link",
                spec.name
            )));
        }
        let values: Vec<Element> = spec
            .columns
            .iter()
            .map(|c| match c.collection {
                Some(kind) => Element::Nested {
                    kind,
                    top: Ref::NULL,
                    key: 0,
                },
                None => Element::Value(default_value(c.data_type, c.nullable)),
            })
            .collect();

        let cluster = self.cluster_mut(table)?;
        let key = cluster.allocate_key();
        cluster.objects.insert(
            key,
            Row {
                values,
                backlinks: Vec::new(),
            },
        );
        self.replicate(|r| r.create_object(table, key));
        self.bump_both();
        Ok(key)
    }

    /// Deletes a live object and everything the deletion cascades to.
    pub(crate) fn remove_object(&mut self, obj: ObjLink) -> CoreResult<()> {
        self.check_write()?;
        if !self.is_live(obj)? {
            return Err(CoreError::ObjectNotFound { link: obj });
        }
        self.replicate(|r| r.remove_object(obj.table, obj.key));
        let mut cascade = CascadeState::new();
        cascade.enqueue(obj);
        self.remove_recursive(&mut cascade)
    }

    /// Turns a live object into a tombstone.
    ///
    /// Incoming links become unresolved and the tombstone keeps their
    /// backlinks. Without incoming links the object is simply deleted.
    pub(crate) fn invalidate_object(&mut self, obj: ObjLink) -> CoreResult<()> {
        self.check_write()?;
        if !self.is_live(obj)? {
            return Err(CoreError::ObjectNotFound { link: obj });
        }
        if self.schema.table(obj.table)?.embedded {
            return Err(CoreError::illegal_operation("embedded objects cannot be invalidated"));
        }
        self.replicate(|r| r.remove_object(obj.table, obj.key));

        let mut cascade = CascadeState::new();
        let cluster = self.cluster_mut(obj.table)?;
        let Some(mut row) = cluster.objects.remove(&obj.key) else {
            return Err(CoreError::ObjectNotFound { link: obj });
        };
        row.backlinks.retain(|b| b.origin != obj);
        if !row.backlinks.is_empty() {
            cluster.tombstones.insert(
                obj.key,
                Row {
                    values: Vec::new(),
                    backlinks: row.backlinks.clone(),
                },
            );
        }
        for (ndx, element) in row.values.iter().enumerate() {
            self.release(element, obj, col_key(ndx), &mut cascade)?;
        }
        for backlink in &row.backlinks {
            self.rewrite_incoming(backlink.origin, backlink.col, obj, LinkRewrite::Unresolve)?;
        }
        self.bump_both();
        self.remove_recursive(&mut cascade)
    }

    /// Sets a scalar column.
    pub(crate) fn set_value(&mut self, obj: ObjLink, col: ColKey, value: Mixed) -> CoreResult<()> {
        self.check_write()?;
        let spec = self.schema.column(obj.table, col)?.clone();
        if spec.is_collection() {
            return Err(CoreError::type_mismatch(
                "scalar value",
                format!("collection column '{}'", spec.name),
            ));
        }
        if let Some(kind) = value.collection_type() {
            if spec.data_type != DataType::Mixed {
                return Err(CoreError::type_mismatch(spec.data_type.to_string(), value.type_name()));
            }
            return self.set_collection(obj, col, kind);
        }
        let nullable = spec.nullable || spec.data_type.is_link() || spec.data_type == DataType::Mixed;
        if value.is_null() && !nullable {
            return Err(CoreError::PropertyNotNullable { property: spec.name });
        }
        if !accepts(spec.data_type, &value) {
            return Err(CoreError::type_mismatch(spec.data_type.to_string(), value.type_name()));
        }
        if let Mixed::Link(link) = &value {
            if spec.data_type == DataType::Link && Some(link.table) != spec.target {
                return Err(CoreError::type_mismatch(
                    format!("link to {:?}", spec.target),
                    format!("link to {}", link.table),
                ));
            }
            self.check_link_target(*link, false)?;
        }

        let old = self
            .slot(obj, col)?
            .ok_or(CoreError::ObjectNotFound { link: obj })?;
        if matches!(&old, Element::Value(current) if current.is_identical(&value)) {
            return Ok(());
        }
        self.replicate(|r| r.set(obj.table, obj.key, col, &value));
        self.set_slot(obj, col, Element::Value(value.clone()))?;
        self.link_value(&value, obj, col)?;
        let mut cascade = CascadeState::new();
        self.release(&old, obj, col, &mut cascade)?;
        self.bump_content();
        self.remove_recursive(&mut cascade)
    }

    /// Puts an empty nested collection into a mixed column.
    ///
    /// A column already holding a collection of that kind is left as is.
    pub(crate) fn set_collection(&mut self, obj: ObjLink, col: ColKey, kind: CollectionType) -> CoreResult<()> {
        self.check_write()?;
        let spec = self.schema.column(obj.table, col)?;
        if spec.is_collection() || spec.data_type != DataType::Mixed {
            return Err(CoreError::type_mismatch("mixed column", spec.data_type.to_string()));
        }
        let old = self
            .slot(obj, col)?
            .ok_or(CoreError::ObjectNotFound { link: obj })?;
        if matches!(&old, Element::Nested { kind: k, .. } if *k == kind) {
            return Ok(());
        }
        let previous = match &old {
            Element::Nested { key, .. } => Some(*key),
            Element::Value(_) => None,
        };
        let marker = Element::Nested {
            kind,
            top: Ref::NULL,
            key: fresh_generation(previous),
        };
        self.replicate(|r| r.set(obj.table, obj.key, col, &marker.to_mixed()));
        self.set_slot(obj, col, marker)?;
        let mut cascade = CascadeState::new();
        self.release(&old, obj, col, &mut cascade)?;
        self.bump_both();
        self.remove_recursive(&mut cascade)
    }

    /// Creates an embedded object and stores the only link to it in a scalar
    /// link column. An embedded object previously linked there is deleted.
    pub(crate) fn create_and_set_linked_object(&mut self, obj: ObjLink, col: ColKey) -> CoreResult<ObjLink> {
        self.check_write()?;
        let spec = self.schema.column(obj.table, col)?;
        let target_table = match (spec.data_type, spec.collection, spec.target) {
            (DataType::Link, None, Some(target)) => target,
            _ => {
                return Err(CoreError::type_mismatch(
                    "scalar link column",
                    spec.data_type.to_string(),
                ))
            }
        };
        let old = self
            .slot(obj, col)?
            .ok_or(CoreError::ObjectNotFound { link: obj })?;
        let key = self.create_object(target_table, true)?;
        let target = ObjLink::new(target_table, key);
        let value = Mixed::Link(target);
        self.replicate(|r| r.set(obj.table, obj.key, col, &value));
        self.set_slot(obj, col, Element::Value(value))?;
        self.add_backlink(target, obj, col)?;
        let mut cascade = CascadeState::new();
        self.release(&old, obj, col, &mut cascade)?;
        self.bump_content();
        self.remove_recursive(&mut cascade)?;
        Ok(target)
    }
}

/// Random non-zero key for a collection put into a mixed column.
fn fresh_generation(previous: Option<i64>) -> i64 {
    loop {
        let key = rand::random::<i64>() & i64::MAX;
        if key != 0 && Some(key) != previous {
            return key;
        }
    }
}

pub(crate) fn col_key(ndx: usize) -> ColKey {
    ColKey::new(u32::try_from(ndx).unwrap_or(u32::MAX))
}
