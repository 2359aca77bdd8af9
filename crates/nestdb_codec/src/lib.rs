//! # nestdb codec
//!
//! Canonical CBOR used for every persisted nestdb node and for replication
//! changesets.
//!
//! ## Canonical rules
//!
//! - Integers and lengths use the shortest head
//! - Floats are written as 8-byte doubles; NaN has a single bit pattern
//! - Map keys are sorted by encoded bytes, shorter first
//! - No indefinite-length items
//! - Semantic tags are preserved on decode
//!
//! ```
//! use nestdb_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let value = Value::Array(vec![Value::Integer(3), Value::Float(0.25)]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder, MAX_DEPTH};
pub use error::{CodecError, CodecResult};
pub use value::{Value, CANONICAL_NAN_BITS};

/// Types with a canonical CBOR form.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Types that can be rebuilt from CBOR bytes.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn to_ciborium(bytes: &[u8]) -> ciborium::value::Value {
        ciborium::de::from_reader(bytes).unwrap()
    }

    #[test]
    fn node_shaped_value_survives() {
        let node = Value::Array(vec![
            Value::Integer(2),
            Value::Array(vec![
                Value::Null,
                Value::tag(40_002, Value::Array(vec![Value::Integer(12), Value::Integer(-3)])),
                Value::Float(-0.0),
                Value::from("text"),
            ]),
        ]);
        let bytes = node.encode().unwrap();
        assert_eq!(Value::decode(&bytes).unwrap(), node);
    }

    #[test]
    fn ciborium_reads_tags_and_floats() {
        let bytes = to_canonical_cbor(&Value::tag(37, Value::Float(2.5))).unwrap();
        match to_ciborium(&bytes) {
            ciborium::value::Value::Tag(37, inner) => {
                assert_eq!(*inner, ciborium::value::Value::Float(2.5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ciborium_agrees_on_maps() {
        let map = Value::map(vec![
            (Value::from("zz"), Value::Integer(-7)),
            (Value::from("a"), Value::Bytes(vec![9])),
        ]);
        let bytes = to_canonical_cbor(&map).unwrap();
        let theirs = to_ciborium(&bytes);
        let entries = theirs.as_map().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, ciborium::value::Value::Text("a".into()));
        assert_eq!(entries[1].1, ciborium::value::Value::Integer((-7i64).into()));
    }

    proptest! {
        #[test]
        fn scalars_decode_to_themselves(n in any::<i64>(), f in any::<f64>(), s in ".{0,24}") {
            let value = Value::Array(vec![Value::Integer(n), Value::Float(f), Value::Text(s)]);
            let bytes = to_canonical_cbor(&value).unwrap();
            prop_assert_eq!(from_cbor(&bytes).unwrap(), value);
        }
    }
}
