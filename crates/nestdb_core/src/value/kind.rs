//! Per-kind tables: default values and accepted values.

use super::{DataType, Mixed, ObjectId, Timestamp};
use rust_decimal::Decimal;
use crate::types::ObjKey;
use uuid::Uuid;

/// Value a new element of this kind takes.
///
/// Nullable kinds default to null; others to their zero value.
#[must_use]
pub fn default_value(data_type: DataType, nullable: bool) -> Mixed {
    if nullable {
        return Mixed::Null;
    }
    match data_type {
        DataType::Int => Mixed::Int(0),
        DataType::Bool => Mixed::Bool(false),
        DataType::Float => Mixed::Float(0.0),
        DataType::Double => Mixed::Double(0.0),
        DataType::Decimal => Mixed::Decimal(Decimal::ZERO),
        DataType::String => Mixed::String(String::new()),
        DataType::Binary => Mixed::Binary(Vec::new()),
        DataType::Timestamp => Mixed::Timestamp(Timestamp::default()),
        DataType::ObjectId => Mixed::ObjectId(ObjectId::default()),
        DataType::Uuid => Mixed::Uuid(Uuid::nil()),
        DataType::Link | DataType::TypedLink | DataType::Mixed => Mixed::Null,
    }
}

/// Whether `value` may be stored in a slot of kind `data_type`.
///
/// Null is accepted here; nullability is checked separately.
#[must_use]
pub fn accepts(data_type: DataType, value: &Mixed) -> bool {
    match (data_type, value) {
        (_, Mixed::Null) | (DataType::Mixed, _) => true,
        (DataType::Link | DataType::TypedLink, Mixed::Link(link)) => link.key != ObjKey::NULL,
        (_, Mixed::List | Mixed::Dictionary) => false,
        (expected, other) => other.data_type() == Some(expected),
    }
}
