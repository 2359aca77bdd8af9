//! Row storage of one table.

use crate::alloc::Element;
use crate::types::{ColKey, ObjKey, ObjLink, TableKey};
use nestdb_codec::Value;
use std::collections::BTreeMap;

/// An incoming link: which object and column point at a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Backlink {
    /// The object holding the link.
    pub origin: ObjLink,
    /// The column of `origin` holding the link.
    pub col: ColKey,
}

/// Column values and incoming links of one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// One element per column. Collection columns hold [`Element::Nested`].
    pub values: Vec<Element>,
    /// Incoming links, one entry per stored link.
    pub backlinks: Vec<Backlink>,
}

impl Row {
    /// Removes one matching backlink. Returns false if none matched.
    pub(crate) fn remove_backlink(&mut self, origin: ObjLink, col: ColKey) -> bool {
        match self
            .backlinks
            .iter()
            .position(|b| b.origin == origin && b.col == col)
        {
            Some(pos) => {
                self.backlinks.swap_remove(pos);
                true
            }
            None => false,
        }
    }
}

/// All live objects and tombstones of a table.
///
/// Tombstones keep their backlinks so that unresolved links can still be
/// cleaned up; they hold no values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cluster {
    pub(crate) next_key: i64,
    pub(crate) objects: BTreeMap<ObjKey, Row>,
    pub(crate) tombstones: BTreeMap<ObjKey, Row>,
}

impl Cluster {
    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true when no live object exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Keys of live objects in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = ObjKey> + '_ {
        self.objects.keys().copied()
    }

    /// Row of a live object, or of a tombstone when `key` is unresolved.
    #[must_use]
    pub fn row(&self, key: ObjKey) -> Option<&Row> {
        if key.is_unresolved() {
            self.tombstones.get(&key.resolved())
        } else {
            self.objects.get(&key)
        }
    }

    pub(crate) fn row_mut(&mut self, key: ObjKey) -> Option<&mut Row> {
        if key.is_unresolved() {
            self.tombstones.get_mut(&key.resolved())
        } else {
            self.objects.get_mut(&key)
        }
    }

    /// Hands out the next object key.
    pub(crate) fn allocate_key(&mut self) -> ObjKey {
        let key = ObjKey::new(self.next_key);
        self.next_key += 1;
        key
    }

    /// Every stored element, tombstones included.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.objects
            .values()
            .chain(self.tombstones.values())
            .flat_map(|row| row.values.iter())
    }

    pub(crate) fn to_cbor(&self) -> Value {
        Value::Array(vec![
            Value::Integer(self.next_key),
            rows_to_cbor(&self.objects),
            rows_to_cbor(&self.tombstones),
        ])
    }

    pub(crate) fn from_cbor(value: &Value) -> Option<Self> {
        let parts = value.as_array()?;
        Some(Self {
            next_key: parts.first()?.as_integer()?,
            objects: rows_from_cbor(parts.get(1)?)?,
            tombstones: rows_from_cbor(parts.get(2)?)?,
        })
    }
}

fn rows_to_cbor(rows: &BTreeMap<ObjKey, Row>) -> Value {
    Value::Array(
        rows.iter()
            .map(|(key, row)| {
                Value::Array(vec![
                    Value::Integer(key.value()),
                    Value::Array(row.values.iter().map(Element::to_cbor).collect()),
                    Value::Array(
                        row.backlinks
                            .iter()
                            .map(|b| {
                                Value::Array(vec![
                                    Value::from(b.origin.table.0),
                                    Value::Integer(b.origin.key.value()),
                                    Value::from(b.col.0),
                                ])
                            })
                            .collect(),
                    ),
                ])
            })
            .collect(),
    )
}

fn rows_from_cbor(value: &Value) -> Option<BTreeMap<ObjKey, Row>> {
    value
        .as_array()?
        .iter()
        .map(|entry| {
            let parts = entry.as_array()?;
            let key = ObjKey::new(parts.first()?.as_integer()?);
            let values = parts
                .get(1)?
                .as_array()?
                .iter()
                .map(Element::from_cbor)
                .collect::<Option<Vec<_>>>()?;
            let backlinks = parts
                .get(2)?
                .as_array()?
                .iter()
                .map(|b| {
                    let b = b.as_array()?;
                    let table = u32::try_from(b.first()?.as_integer()?).ok()?;
                    let origin = ObjKey::new(b.get(1)?.as_integer()?);
                    let col = u32::try_from(b.get(2)?.as_integer()?).ok()?;
                    Some(Backlink {
                        origin: ObjLink::new(TableKey::new(table), origin),
                        col: ColKey::new(col),
                    })
                })
                .collect::<Option<Vec<_>>>()?;
            Some((key, Row { values, backlinks }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ref;
    use crate::value::{CollectionType, Mixed};

    fn sample() -> Cluster {
        let mut cluster = Cluster::default();
        let a = cluster.allocate_key();
        let b = cluster.allocate_key();
        cluster.objects.insert(
            a,
            Row {
                values: vec![
                    Element::Value(Mixed::Int(4)),
                    Element::Nested {
                        kind: CollectionType::List,
                        top: Ref(12),
                        key: 0,
                    },
                ],
                backlinks: vec![Backlink {
                    origin: ObjLink::new(TableKey::new(1), ObjKey::new(3)),
                    col: ColKey::new(2),
                }],
            },
        );
        cluster.tombstones.insert(b, Row::default());
        cluster
    }

    #[test]
    fn keys_are_never_reused() {
        let mut cluster = sample();
        assert_eq!(cluster.allocate_key(), ObjKey::new(2));
        assert_eq!(cluster.len(), 1);
        assert_eq!(cluster.keys().collect::<Vec<_>>(), vec![ObjKey::new(0)]);
    }

    #[test]
    fn unresolved_keys_address_tombstones() {
        let cluster = sample();
        assert!(cluster.row(ObjKey::new(1)).is_none());
        assert!(cluster.row(ObjKey::new(1).get_unresolved()).is_some());
        assert!(cluster.row(ObjKey::new(0)).is_some());
    }

    #[test]
    fn persisted_form_round_trips() {
        let cluster = sample();
        let decoded = Cluster::from_cbor(&cluster.to_cbor()).unwrap();
        assert_eq!(decoded, cluster);
        assert_eq!(decoded.elements().count(), 2);
    }

    #[test]
    fn backlinks_are_removed_one_at_a_time() {
        let mut row = Row::default();
        let origin = ObjLink::new(TableKey::new(0), ObjKey::new(0));
        let backlink = Backlink {
            origin,
            col: ColKey::new(1),
        };
        row.backlinks = vec![backlink, backlink];
        assert!(row.remove_backlink(origin, ColKey::new(1)));
        assert_eq!(row.backlinks.len(), 1);
        assert!(!row.remove_backlink(origin, ColKey::new(0)));
    }
}
