//! Dynamically typed values and the closed set of storage kinds.

mod cbor;
mod compare;
mod kind;

pub use kind::{accepts, default_value};

use crate::types::{ObjKey, ObjLink, TableKey};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Storage kind of a column or collection element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int,
    /// Boolean.
    Bool,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Byte string.
    Binary,
    /// Point in time.
    Timestamp,
    /// 12-byte object id.
    ObjectId,
    /// 128-bit UUID.
    Uuid,
    /// Link to an object of one fixed target table.
    Link,
    /// Link to an object of any table.
    TypedLink,
    /// Any of the above, or a nested collection.
    Mixed,
    /// 128-bit decimal.
    Decimal,
}

impl DataType {
    /// Integer code used in the persisted schema.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            DataType::Int => 0,
            DataType::Bool => 1,
            DataType::Float => 2,
            DataType::Double => 3,
            DataType::String => 4,
            DataType::Binary => 5,
            DataType::Timestamp => 6,
            DataType::ObjectId => 7,
            DataType::Uuid => 8,
            DataType::Link => 9,
            DataType::TypedLink => 10,
            DataType::Mixed => 11,
            DataType::Decimal => 12,
        }
    }

    /// Inverse of [`DataType::code`].
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => DataType::Int,
            1 => DataType::Bool,
            2 => DataType::Float,
            3 => DataType::Double,
            4 => DataType::String,
            5 => DataType::Binary,
            6 => DataType::Timestamp,
            7 => DataType::ObjectId,
            8 => DataType::Uuid,
            9 => DataType::Link,
            10 => DataType::TypedLink,
            11 => DataType::Mixed,
            12 => DataType::Decimal,
            _ => return None,
        })
    }

    /// Returns true for link kinds.
    #[must_use]
    pub const fn is_link(self) -> bool {
        matches!(self, DataType::Link | DataType::TypedLink)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shape of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionType {
    /// Ordered sequence.
    List,
    /// String-keyed map in key order.
    Dictionary,
}

impl CollectionType {
    pub(crate) const fn code(self) -> i64 {
        match self {
            CollectionType::List => 1,
            CollectionType::Dictionary => 2,
        }
    }

    pub(crate) const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(CollectionType::List),
            2 => Some(CollectionType::Dictionary),
            _ => None,
        }
    }
}

/// A point in time as seconds and nanoseconds since the Unix epoch.
///
/// Both parts carry the same sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    seconds: i64,
    nanoseconds: i32,
}

impl Timestamp {
    /// Creates a timestamp.
    #[must_use]
    pub const fn new(seconds: i64, nanoseconds: i32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Whole seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.seconds
    }

    /// Sub-second part.
    #[must_use]
    pub const fn nanoseconds(self) -> i32 {
        self.nanoseconds
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}:{}", self.seconds, self.nanoseconds)
    }
}

/// A 12-byte object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Parses 24 hex digits.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 24 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A dynamically typed value.
///
/// `List` and `Dictionary` are markers: writing one into a mixed slot creates an
/// empty nested collection there, and reading a nested collection yields its marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Mixed {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// 128-bit decimal.
    Decimal(Decimal),
    /// UTF-8 string.
    String(String),
    /// Byte string.
    Binary(Vec<u8>),
    /// Point in time.
    Timestamp(Timestamp),
    /// 12-byte object id.
    ObjectId(ObjectId),
    /// 128-bit UUID.
    Uuid(Uuid),
    /// Link to an object.
    Link(ObjLink),
    /// Nested list marker.
    List,
    /// Nested dictionary marker.
    Dictionary,
}

impl Mixed {
    /// Returns true for [`Mixed::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Mixed::Null)
    }

    /// Storage kind of this value; `None` for null and collection markers.
    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Mixed::Bool(_) => DataType::Bool,
            Mixed::Int(_) => DataType::Int,
            Mixed::Float(_) => DataType::Float,
            Mixed::Double(_) => DataType::Double,
            Mixed::Decimal(_) => DataType::Decimal,
            Mixed::String(_) => DataType::String,
            Mixed::Binary(_) => DataType::Binary,
            Mixed::Timestamp(_) => DataType::Timestamp,
            Mixed::ObjectId(_) => DataType::ObjectId,
            Mixed::Uuid(_) => DataType::Uuid,
            Mixed::Link(_) => DataType::TypedLink,
            Mixed::Null | Mixed::List | Mixed::Dictionary => return None,
        })
    }

    /// The collection shape a marker stands for.
    #[must_use]
    pub const fn collection_type(&self) -> Option<CollectionType> {
        match self {
            Mixed::List => Some(CollectionType::List),
            Mixed::Dictionary => Some(CollectionType::Dictionary),
            _ => None,
        }
    }

    /// Returns the link, if this is one.
    #[must_use]
    pub const fn as_link(&self) -> Option<ObjLink> {
        match self {
            Mixed::Link(link) => Some(*link),
            _ => None,
        }
    }

    /// Returns true for a link to a tombstone.
    #[must_use]
    pub const fn is_unresolved_link(&self) -> bool {
        matches!(self, Mixed::Link(link) if link.key.is_unresolved())
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Mixed::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Mixed::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of Int, Float, Double and Decimal.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Mixed::Int(n) => Some(*n as f64),
            Mixed::Float(f) => Some(f64::from(*f)),
            Mixed::Double(d) => Some(*d),
            Mixed::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Mixed::Null => "null",
            Mixed::Bool(_) => "bool",
            Mixed::Int(_) => "int",
            Mixed::Float(_) => "float",
            Mixed::Double(_) => "double",
            Mixed::Decimal(_) => "decimal",
            Mixed::String(_) => "string",
            Mixed::Binary(_) => "binary",
            Mixed::Timestamp(_) => "timestamp",
            Mixed::ObjectId(_) => "objectId",
            Mixed::Uuid(_) => "uuid",
            Mixed::Link(_) => "link",
            Mixed::List => "list",
            Mixed::Dictionary => "dictionary",
        }
    }

    pub(crate) fn link_to(table: TableKey, key: ObjKey) -> Self {
        Mixed::Link(ObjLink::new(table, key))
    }
}

impl From<i64> for Mixed {
    fn from(v: i64) -> Self {
        Mixed::Int(v)
    }
}

impl From<i32> for Mixed {
    fn from(v: i32) -> Self {
        Mixed::Int(i64::from(v))
    }
}

impl From<bool> for Mixed {
    fn from(v: bool) -> Self {
        Mixed::Bool(v)
    }
}

impl From<f32> for Mixed {
    fn from(v: f32) -> Self {
        Mixed::Float(v)
    }
}

impl From<f64> for Mixed {
    fn from(v: f64) -> Self {
        Mixed::Double(v)
    }
}

impl From<Decimal> for Mixed {
    fn from(v: Decimal) -> Self {
        Mixed::Decimal(v)
    }
}

impl From<&str> for Mixed {
    fn from(v: &str) -> Self {
        Mixed::String(v.to_string())
    }
}

impl From<String> for Mixed {
    fn from(v: String) -> Self {
        Mixed::String(v)
    }
}

impl From<Vec<u8>> for Mixed {
    fn from(v: Vec<u8>) -> Self {
        Mixed::Binary(v)
    }
}

impl From<Timestamp> for Mixed {
    fn from(v: Timestamp) -> Self {
        Mixed::Timestamp(v)
    }
}

impl From<ObjectId> for Mixed {
    fn from(v: ObjectId) -> Self {
        Mixed::ObjectId(v)
    }
}

impl From<Uuid> for Mixed {
    fn from(v: Uuid) -> Self {
        Mixed::Uuid(v)
    }
}

impl From<ObjLink> for Mixed {
    fn from(v: ObjLink) -> Self {
        Mixed::Link(v)
    }
}

impl<T: Into<Mixed>> From<Option<T>> for Mixed {
    fn from(v: Option<T>) -> Self {
        v.map_or(Mixed::Null, Into::into)
    }
}

impl fmt::Display for Mixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mixed::Null => f.write_str("null"),
            Mixed::Bool(b) => write!(f, "{b}"),
            Mixed::Int(n) => write!(f, "{n}"),
            Mixed::Float(v) => write!(f, "{v}"),
            Mixed::Double(v) => write!(f, "{v}"),
            Mixed::Decimal(v) => write!(f, "{v}"),
            Mixed::String(s) => write!(f, "\"{s}\""),
            Mixed::Binary(b) => write!(f, "binary[{}]", b.len()),
            Mixed::Timestamp(t) => write!(f, "{t}"),
            Mixed::ObjectId(id) => write!(f, "{id}"),
            Mixed::Uuid(u) => write!(f, "{u}"),
            Mixed::Link(link) => write!(f, "{link}"),
            Mixed::List => f.write_str("list"),
            Mixed::Dictionary => f.write_str("dictionary"),
        }
    }
}
