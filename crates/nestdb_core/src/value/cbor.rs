//! Mapping between [`Mixed`] and codec values.

use super::{CollectionType, Mixed, ObjectId, Timestamp};
use crate::types::{ObjKey, ObjLink, TableKey};
use nestdb_codec::Value;
use rust_decimal::Decimal;
use uuid::Uuid;

pub(crate) const TAG_UUID: u64 = 37;
pub(crate) const TAG_FLOAT: u64 = 40_001;
pub(crate) const TAG_TIMESTAMP: u64 = 40_002;
pub(crate) const TAG_OBJECT_ID: u64 = 40_003;
pub(crate) const TAG_LINK: u64 = 40_004;
pub(crate) const TAG_MARKER: u64 = 40_005;
pub(crate) const TAG_DECIMAL: u64 = 40_006;

impl Mixed {
    /// Codec form of this value.
    pub(crate) fn to_cbor(&self) -> Value {
        match self {
            Mixed::Null => Value::Null,
            Mixed::Bool(b) => Value::Bool(*b),
            Mixed::Int(n) => Value::Integer(*n),
            Mixed::Float(f) => Value::tag(TAG_FLOAT, Value::from(*f)),
            Mixed::Double(d) => Value::Float(*d),
            Mixed::Decimal(d) => Value::tag(TAG_DECIMAL, Value::Bytes(d.serialize().to_vec())),
            Mixed::String(s) => Value::Text(s.clone()),
            Mixed::Binary(b) => Value::Bytes(b.clone()),
            Mixed::Timestamp(t) => Value::tag(
                TAG_TIMESTAMP,
                Value::Array(vec![
                    Value::Integer(t.seconds()),
                    Value::Integer(i64::from(t.nanoseconds())),
                ]),
            ),
            Mixed::ObjectId(id) => Value::tag(TAG_OBJECT_ID, Value::Bytes(id.as_bytes().to_vec())),
            Mixed::Uuid(u) => Value::tag(TAG_UUID, Value::Bytes(u.as_bytes().to_vec())),
            Mixed::Link(link) => Value::tag(
                TAG_LINK,
                Value::Array(vec![
                    Value::from(link.table.0),
                    Value::Integer(link.key.value()),
                ]),
            ),
            Mixed::List => Value::tag(TAG_MARKER, Value::Integer(CollectionType::List.code())),
            Mixed::Dictionary => {
                Value::tag(TAG_MARKER, Value::Integer(CollectionType::Dictionary.code()))
            }
        }
    }

    /// Rebuilds a value from its codec form.
    pub(crate) fn from_cbor(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => Mixed::Null,
            Value::Bool(b) => Mixed::Bool(*b),
            Value::Integer(n) => Mixed::Int(*n),
            Value::Float(d) => Mixed::Double(*d),
            Value::Text(s) => Mixed::String(s.clone()),
            Value::Bytes(b) => Mixed::Binary(b.clone()),
            Value::Tag(tag, inner) => from_tagged(*tag, inner)?,
            Value::Array(_) | Value::Map(_) => return None,
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn from_tagged(tag: u64, inner: &Value) -> Option<Mixed> {
    Some(match tag {
        TAG_FLOAT => Mixed::Float(inner.as_float()? as f32),
        TAG_TIMESTAMP => {
            let parts = inner.as_array()?;
            let nanos = i32::try_from(parts.get(1)?.as_integer()?).ok()?;
            Mixed::Timestamp(Timestamp::new(parts.first()?.as_integer()?, nanos))
        }
        TAG_OBJECT_ID => Mixed::ObjectId(ObjectId::from_bytes(inner.as_bytes()?.try_into().ok()?)),
        TAG_UUID => Mixed::Uuid(Uuid::from_slice(inner.as_bytes()?).ok()?),
        TAG_DECIMAL => Mixed::Decimal(Decimal::deserialize(inner.as_bytes()?.try_into().ok()?)),
        TAG_LINK => {
            let parts = inner.as_array()?;
            let table = u32::try_from(parts.first()?.as_integer()?).ok()?;
            let key = parts.get(1)?.as_integer()?;
            Mixed::Link(ObjLink::new(TableKey::new(table), ObjKey::new(key)))
        }
        TAG_MARKER => match CollectionType::from_code(inner.as_integer()?)? {
            CollectionType::List => Mixed::List,
            CollectionType::Dictionary => Mixed::Dictionary,
        },
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestdb_codec::{from_cbor, to_canonical_cbor};

    fn through_bytes(value: &Mixed) -> Mixed {
        let bytes = to_canonical_cbor(&value.to_cbor()).unwrap();
        Mixed::from_cbor(&from_cbor(&bytes).unwrap()).unwrap()
    }

    #[test]
    fn every_kind_survives_encoding() {
        let values = vec![
            Mixed::Null,
            Mixed::Bool(true),
            Mixed::Int(-40),
            Mixed::Float(1.25),
            Mixed::Double(-2.5e300),
            Mixed::Decimal(Decimal::new(-123_456_789, 4)),
            Mixed::from("héllo"),
            Mixed::Binary(vec![0, 255]),
            Mixed::Timestamp(Timestamp::new(-5, -100)),
            Mixed::ObjectId(ObjectId::from_bytes([7; 12])),
            Mixed::Uuid(Uuid::from_bytes([9; 16])),
            Mixed::link_to(TableKey::new(2), ObjKey::new(3).get_unresolved()),
            Mixed::List,
            Mixed::Dictionary,
        ];
        for value in values {
            assert!(through_bytes(&value).is_identical(&value), "{value:?}");
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(Mixed::from_cbor(&Value::tag(99, Value::Null)).is_none());
        assert!(Mixed::from_cbor(&Value::Array(vec![])).is_none());
    }
}
