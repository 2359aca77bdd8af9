//! Consistency checker for a whole snapshot.
//!
//! Rebuilds the set of backlinks every stored link implies and compares it
//! with the backlinks the rows record. Also walks every collection tree.

use crate::alloc::Element;
use crate::bptree;
use crate::collection::layout::{self, Layout};
use crate::error::{CoreError, CoreResult};
use crate::table::{col_key, Backlink};
use crate::transaction::TxnState;
use crate::types::{ObjKey, ObjLink, Ref, TableKey};
use crate::value::Mixed;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

type Incoming = BTreeMap<(TableKey, ObjKey), Vec<(ObjLink, u32)>>;

impl TxnState {
    /// Checks links, backlinks, tombstones and collection trees.
    pub(crate) fn verify(&self) -> CoreResult<()> {
        let mut expected: Incoming = BTreeMap::new();
        let mut recorded: Incoming = BTreeMap::new();
        let mut objects = 0usize;

        for (table, spec) in self.schema.tables() {
            let rows: Vec<(ObjKey, Vec<Element>, Vec<Backlink>, bool)> = self.with_cluster(table, |c| {
                c.objects
                    .iter()
                    .map(|(k, r)| (*k, r.values.clone(), r.backlinks.clone(), false))
                    .chain(
                        c.tombstones
                            .iter()
                            .map(|(k, r)| (*k, r.values.clone(), r.backlinks.clone(), true)),
                    )
                    .collect()
            })?;

            for (key, values, backlinks, tombstone) in rows {
                let origin = ObjLink::new(table, key);
                if tombstone {
                    if backlinks.is_empty() {
                        return Err(CoreError::invariant(format!("tombstone {origin} has no backlinks")));
                    }
                    if !values.is_empty() {
                        return Err(CoreError::invariant(format!("tombstone {origin} holds values")));
                    }
                } else {
                    objects += 1;
                    if values.len() != spec.columns.len() {
                        return Err(CoreError::invariant(format!(
                            "{origin} has {} values for {} columns",
                            values.len(),
                            spec.columns.len()
                        )));
                    }
                    if spec.embedded && backlinks.len() != 1 {
                        return Err(CoreError::invariant(format!(
                            "embedded {origin} has {} owners",
                            backlinks.len()
                        )));
                    }
                }
                let slot = if tombstone { key.get_unresolved() } else { key };
                recorded.entry((table, slot)).or_default().extend(
                    backlinks.iter().map(|b| (b.origin, b.col.0)),
                );

                for (ndx, element) in values.iter().enumerate() {
                    let mut links = Vec::new();
                    self.verify_element(element, &mut links)?;
                    for target in links {
                        self.check_target(origin, target)?;
                        expected
                            .entry((target.table, target.key))
                            .or_default()
                            .push((origin, col_key(ndx).0));
                    }
                }
            }
        }

        for list in expected.values_mut().chain(recorded.values_mut()) {
            list.sort();
        }
        recorded.retain(|_, list| !list.is_empty());
        if expected != recorded {
            let target = expected
                .iter()
                .find(|(k, v)| recorded.get(*k) != Some(*v))
                .or_else(|| recorded.iter().find(|(k, _)| !expected.contains_key(*k)))
                .map(|((t, k), _)| ObjLink::new(*t, *k));
            return Err(CoreError::invariant(match target {
                Some(target) => format!("backlinks of {target} do not match stored links"),
                None => "backlinks do not match stored links".to_string(),
            }));
        }
        debug!(objects, targets = expected.len(), "snapshot verified");
        Ok(())
    }

    fn check_target(&self, origin: ObjLink, target: ObjLink) -> CoreResult<()> {
        let exists = self.with_cluster(target.table, |c| c.row(target.key).is_some())?;
        if exists {
            Ok(())
        } else {
            Err(CoreError::invariant(format!("{origin} links to missing {target}")))
        }
    }

    /// Collects the links in `element` and checks any collection under it.
    fn verify_element(&self, element: &Element, links: &mut Vec<ObjLink>) -> CoreResult<()> {
        match element {
            Element::Value(Mixed::Link(link)) => links.push(*link),
            Element::Value(_) => {}
            Element::Nested { top, .. } if top.is_null() => {}
            Element::Nested { kind, top, .. } => {
                let layout = Layout::detect(&self.store, *kind, *top)?;
                self.verify_collection(layout, *top, links)?;
            }
        }
        Ok(())
    }

    fn verify_collection(&self, layout: Layout, top: Ref, links: &mut Vec<ObjLink>) -> CoreResult<()> {
        let values = layout::values_tree(&self.store, layout, top)?;
        let size = bptree::verify(&self.store, values)?;

        if layout == Layout::Dictionary {
            let keys_tree = layout::keys_tree(&self.store, top)?;
            let key_count = bptree::verify(&self.store, keys_tree)?;
            if key_count != size {
                return Err(CoreError::invariant(format!(
                    "dictionary {top} has {key_count} keys and {size} values"
                )));
            }
            let keys = bptree::to_vec(&self.store, keys_tree)?;
            for pair in keys.windows(2) {
                let (a, b) = (pair[0].to_mixed(), pair[1].to_mixed());
                if a.total_cmp(&b).is_ge() {
                    return Err(CoreError::invariant(format!(
                        "dictionary {top} keys out of order: {a} before {b}"
                    )));
                }
            }
        }

        let elements = bptree::to_vec(&self.store, values)?;
        let mut nested_keys = HashSet::new();
        for element in &elements {
            if let Element::Nested { key, .. } = element {
                if !nested_keys.insert(*key) {
                    return Err(CoreError::invariant(format!(
                        "collection {top} reuses nested key {key}"
                    )));
                }
            }
            self.verify_element(element, links)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::database::Database;
    use crate::schema::{ColumnSpec, TableSpec};
    use crate::table::Backlink;
    use crate::types::{ColKey, ObjLink, TableKey};
    use crate::value::{CollectionType, DataType};
    use crate::CoreError;

    #[test]
    fn consistent_graph_passes() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let table = txn
            .add_table(
                TableSpec::new("Node")
                    .column(ColumnSpec::link_list("edges", TableKey::new(0)))
                    .column(ColumnSpec::new("any", DataType::Mixed)),
            )
            .unwrap();
        let a = txn.create_object(table).unwrap();
        let b = txn.create_object(table).unwrap();
        let edges = a.get_linklist(a.col_key("edges").unwrap()).unwrap();
        edges.add(b.key()).unwrap();
        edges.add(b.key()).unwrap();
        edges.add(a.key()).unwrap();

        let any = b.col_key("any").unwrap();
        b.set_collection(any, CollectionType::Dictionary).unwrap();
        let dict = b.get_dictionary(any).unwrap();
        dict.insert("self", b.link()).unwrap();
        dict.insert_collection("inner", CollectionType::List).unwrap();
        dict.get_list("inner").unwrap().add(a.link()).unwrap();
        txn.verify().unwrap();

        b.invalidate().unwrap();
        txn.verify().unwrap();
    }

    #[test]
    fn missing_backlink_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let table = txn
            .add_table(
                TableSpec::new("Node")
                    .column(ColumnSpec::new("next", DataType::Link).link_to(TableKey::new(0))),
            )
            .unwrap();
        let a = txn.create_object(table).unwrap();
        let b = txn.create_object(table).unwrap();
        a.set(a.col_key("next").unwrap(), b.link()).unwrap();

        {
            let mut st = txn.lock();
            let row = st.cluster_mut(table).unwrap().row_mut(b.key()).unwrap();
            row.backlinks.push(Backlink {
                origin: ObjLink::new(table, a.key()),
                col: ColKey::new(0),
            });
        }
        assert!(matches!(txn.verify(), Err(CoreError::InvariantViolation { .. })));
    }
}
