//! Node kinds and their persisted form.

use crate::error::{CoreError, CoreResult};
use crate::schema::Schema;
use crate::table::Cluster;
use crate::types::Ref;
use crate::value::{CollectionType, Mixed};
use nestdb_codec::Value;

const KIND_LEAF: i64 = 0;
const KIND_INNER: i64 = 1;
const KIND_TOP: i64 = 2;
const KIND_CLUSTER: i64 = 3;
const KIND_SCHEMA: i64 = 4;

const TAG_NESTED: u64 = 40_010;

/// One slot of a B+tree leaf or an object row.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A plain value.
    Value(Mixed),
    /// A nested collection stored under its own top node.
    Nested {
        /// Shape of the nested collection.
        kind: CollectionType,
        /// Top node of the nested collection.
        top: Ref,
        /// Stable key identifying this entry within its parent.
        key: i64,
    },
}

impl Element {
    /// Null value.
    pub const NULL: Element = Element::Value(Mixed::Null);

    /// The value as seen by readers: nested collections show as their marker.
    #[must_use]
    pub fn to_mixed(&self) -> Mixed {
        match self {
            Element::Value(value) => value.clone(),
            Element::Nested {
                kind: CollectionType::List,
                ..
            } => Mixed::List,
            Element::Nested {
                kind: CollectionType::Dictionary,
                ..
            } => Mixed::Dictionary,
        }
    }

    /// Returns the plain value, if any.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Mixed> {
        match self {
            Element::Value(value) => Some(value),
            Element::Nested { .. } => None,
        }
    }

    pub(crate) fn to_cbor(&self) -> Value {
        match self {
            Element::Value(value) => value.to_cbor(),
            Element::Nested { kind, top, key } => Value::tag(
                TAG_NESTED,
                Value::Array(vec![
                    Value::Integer(kind.code()),
                    slot(*top),
                    Value::Integer(*key),
                ]),
            ),
        }
    }

    pub(crate) fn from_cbor(value: &Value) -> Option<Self> {
        if let Some((TAG_NESTED, inner)) = value.as_tag() {
            let parts = inner.as_array()?;
            return Some(Element::Nested {
                kind: CollectionType::from_code(parts.first()?.as_integer()?)?,
                top: Ref::from_slot(parts.get(1)?.as_integer()?),
                key: parts.get(2)?.as_integer()?,
            });
        }
        Mixed::from_cbor(value).map(Element::Value)
    }
}

/// Child entry of an inner B+tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Child {
    /// The child node.
    pub node: Ref,
    /// Number of elements below it.
    pub size: usize,
}

/// A small array of child refs plus integer metadata.
///
/// Layouts:
/// - group top: `refs = [schema, cluster per table...]`
/// - mixed list: `refs = [values]`, `meta = [next_key]`
/// - dictionary: `refs = [keys, values]`, `meta = [next_key]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopArray {
    /// Child refs.
    pub refs: Vec<Ref>,
    /// Counters and other metadata.
    pub meta: Vec<i64>,
}

/// A page-store node.
#[derive(Debug, Clone)]
pub enum Node {
    /// B+tree leaf.
    Leaf(Vec<Element>),
    /// B+tree inner node.
    Inner(Vec<Child>),
    /// Top array of a collection or of the whole group.
    Top(TopArray),
    /// All objects of one table.
    Cluster(Cluster),
    /// The persisted schema.
    Schema(Schema),
}

impl Node {
    /// Refs this node points at.
    #[must_use]
    pub fn children(&self) -> Vec<Ref> {
        match self {
            Node::Leaf(elements) => nested_refs(elements.iter()),
            Node::Inner(children) => children.iter().map(|c| c.node).collect(),
            Node::Top(top) => top.refs.iter().copied().filter(|r| !r.is_null()).collect(),
            Node::Cluster(cluster) => nested_refs(cluster.elements()),
            Node::Schema(_) => Vec::new(),
        }
    }

    /// Short name of the node kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Node::Leaf(_) => "leaf",
            Node::Inner(_) => "inner",
            Node::Top(_) => "top",
            Node::Cluster(_) => "cluster",
            Node::Schema(_) => "schema",
        }
    }

    pub(crate) fn to_cbor(&self) -> Value {
        let (kind, mut body) = match self {
            Node::Leaf(elements) => (
                KIND_LEAF,
                vec![Value::Array(elements.iter().map(Element::to_cbor).collect())],
            ),
            Node::Inner(children) => (
                KIND_INNER,
                vec![Value::Array(
                    children
                        .iter()
                        .flat_map(|c| [slot(c.node), Value::Integer(size_slot(c.size))])
                        .collect(),
                )],
            ),
            Node::Top(top) => (
                KIND_TOP,
                vec![
                    Value::Array(top.refs.iter().map(|r| slot(*r)).collect()),
                    Value::Array(top.meta.iter().map(|m| Value::Integer(*m)).collect()),
                ],
            ),
            Node::Cluster(cluster) => (KIND_CLUSTER, vec![cluster.to_cbor()]),
            Node::Schema(schema) => (KIND_SCHEMA, vec![schema.to_cbor()]),
        };
        body.insert(0, Value::Integer(kind));
        Value::Array(body)
    }

    pub(crate) fn from_cbor(node: Ref, value: &Value) -> CoreResult<Self> {
        let corrupt = |what: &str| CoreError::corrupt_node(node.as_u64(), what);
        let parts = value.as_array().ok_or_else(|| corrupt("not an array"))?;
        let kind = parts
            .first()
            .and_then(Value::as_integer)
            .ok_or_else(|| corrupt("missing kind"))?;
        let body = parts.get(1).ok_or_else(|| corrupt("missing body"))?;

        match kind {
            KIND_LEAF => body
                .as_array()
                .and_then(|items| items.iter().map(Element::from_cbor).collect::<Option<Vec<_>>>())
                .map(Node::Leaf)
                .ok_or_else(|| corrupt("bad leaf element")),
            KIND_INNER => {
                let flat = body.as_array().ok_or_else(|| corrupt("bad inner node"))?;
                flat.chunks(2)
                    .map(|pair| {
                        let node = Ref::from_slot(pair.first()?.as_integer()?);
                        let size = usize::try_from(pair.get(1)?.as_integer()?).ok()?;
                        Some(Child { node, size })
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(Node::Inner)
                    .ok_or_else(|| corrupt("bad inner child"))
            }
            KIND_TOP => {
                let ints = |v: Option<&Value>| -> Option<Vec<i64>> {
                    v?.as_array()?.iter().map(Value::as_integer).collect()
                };
                let refs = ints(Some(body)).ok_or_else(|| corrupt("bad top refs"))?;
                let meta = ints(parts.get(2)).ok_or_else(|| corrupt("bad top meta"))?;
                Ok(Node::Top(TopArray {
                    refs: refs.into_iter().map(Ref::from_slot).collect(),
                    meta,
                }))
            }
            KIND_CLUSTER => Cluster::from_cbor(body)
                .map(Node::Cluster)
                .ok_or_else(|| corrupt("bad cluster")),
            KIND_SCHEMA => Schema::from_cbor(body)
                .map(Node::Schema)
                .ok_or_else(|| corrupt("bad schema")),
            other => Err(corrupt(&format!("unknown node kind {other}"))),
        }
    }
}

fn nested_refs<'a>(elements: impl Iterator<Item = &'a Element>) -> Vec<Ref> {
    elements
        .filter_map(|e| match e {
            Element::Nested { top, .. } if !top.is_null() => Some(*top),
            _ => None,
        })
        .collect()
}

#[allow(clippy::cast_possible_wrap)]
fn slot(r: Ref) -> Value {
    Value::Integer(r.as_u64() as i64)
}

fn size_slot(size: usize) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestdb_codec::{from_cbor, to_canonical_cbor};

    fn reload(node: &Node) -> Node {
        let bytes = to_canonical_cbor(&node.to_cbor()).unwrap();
        Node::from_cbor(Ref(1), &from_cbor(&bytes).unwrap()).unwrap()
    }

    #[test]
    fn leaf_keeps_nested_entries() {
        let leaf = Node::Leaf(vec![
            Element::Value(Mixed::Int(4)),
            Element::Nested {
                kind: CollectionType::Dictionary,
                top: Ref(12),
                key: 3,
            },
        ]);
        match reload(&leaf) {
            Node::Leaf(elements) => {
                assert_eq!(elements.len(), 2);
                assert_eq!(elements[1].to_mixed(), Mixed::Dictionary);
            }
            other => panic!("unexpected {}", other.kind_name()),
        }
        assert_eq!(leaf.children(), vec![Ref(12)]);
    }

    #[test]
    fn inner_and_top_layouts() {
        let inner = Node::Inner(vec![
            Child { node: Ref(5), size: 3 },
            Child { node: Ref(6), size: 1 },
        ]);
        match reload(&inner) {
            Node::Inner(children) => assert_eq!(children[1], Child { node: Ref(6), size: 1 }),
            other => panic!("unexpected {}", other.kind_name()),
        }

        let top = Node::Top(TopArray {
            refs: vec![Ref(2), Ref::NULL],
            meta: vec![17],
        });
        match reload(&top) {
            Node::Top(array) => assert_eq!(array.meta, vec![17]),
            other => panic!("unexpected {}", other.kind_name()),
        }
        assert_eq!(top.children(), vec![Ref(2)]);
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let err = Node::from_cbor(Ref(8), &Value::Integer(1)).unwrap_err();
        assert!(matches!(err, CoreError::CorruptNode { node: 8, .. }));
        let err = Node::from_cbor(Ref(8), &Value::Array(vec![Value::Integer(42), Value::Null]))
            .unwrap_err();
        assert!(matches!(err, CoreError::CorruptNode { .. }));
    }
}
