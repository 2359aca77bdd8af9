//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{canonical_bits, Value};

/// Deepest array/map/tag nesting either direction of the codec accepts.
pub const MAX_DEPTH: usize = 512;

/// Encode a value to canonical CBOR bytes.
///
/// - integers and lengths use the shortest form
/// - floats are always written as 8-byte doubles with NaN folded to one pattern
/// - map entries are ordered by encoded key, length first
///
/// # Errors
///
/// Returns [`CodecError::NestingTooDeep`] when the value nests beyond [`MAX_DEPTH`].
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder writing into an owned buffer.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    /// Append the encoding of `value`.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&canonical_bits(*f).to_be_bytes());
            }
            Value::Bytes(b) => {
                self.write_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.write_head(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.enter()?;
                self.write_head(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
                self.depth -= 1;
            }
            Value::Map(pairs) => {
                self.enter()?;
                self.encode_map(pairs)?;
                self.depth -= 1;
            }
            Value::Tag(tag, inner) => {
                self.enter()?;
                self.write_head(6, *tag);
                self.encode(inner)?;
                self.depth -= 1;
            }
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn enter(&mut self) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::NestingTooDeep { max: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_head(0, n as u64);
        } else {
            // -1 - n never overflows for negative n.
            self.write_head(1, (-1 - n) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major_type: u8, argument: u64) {
        let mt = major_type << 5;
        if argument < 24 {
            self.buffer.push(mt | argument as u8);
        } else if argument <= u64::from(u8::MAX) {
            self.buffer.extend_from_slice(&[mt | 24, argument as u8]);
        } else if argument <= u64::from(u16::MAX) {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(argument as u16).to_be_bytes());
        } else if argument <= u64::from(u32::MAX) {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(argument as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&argument.to_be_bytes());
        }
    }

    fn encode_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let mut key_encoder = CanonicalEncoder {
                buffer: Vec::new(),
                depth: self.depth,
            };
            key_encoder.encode(key)?;
            entries.push((key_encoder.into_bytes(), value));
        }
        entries.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

        self.write_head(5, entries.len() as u64);
        for (key, value) in entries {
            self.buffer.extend_from_slice(&key);
            self.encode(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(value: &Value) -> Vec<u8> {
        to_canonical_cbor(value).unwrap()
    }

    #[test]
    fn encode_simple_values() {
        assert_eq!(enc(&Value::Null), vec![0xf6]);
        assert_eq!(enc(&Value::Bool(false)), vec![0xf4]);
        assert_eq!(enc(&Value::Bool(true)), vec![0xf5]);
    }

    #[test]
    fn integers_use_shortest_head() {
        assert_eq!(enc(&Value::Integer(23)), vec![0x17]);
        assert_eq!(enc(&Value::Integer(24)), vec![0x18, 24]);
        assert_eq!(enc(&Value::Integer(256)), vec![0x19, 0x01, 0x00]);
        assert_eq!(enc(&Value::Integer(65536)), vec![0x1a, 0, 1, 0, 0]);
        assert_eq!(enc(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(enc(&Value::Integer(-25)), vec![0x38, 24]);
        assert_eq!(
            enc(&Value::Integer(i64::MIN)),
            vec![0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn floats_are_always_doubles() {
        assert_eq!(
            enc(&Value::Float(1.5)),
            vec![0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(enc(&Value::from(1.5f32)), enc(&Value::Float(1.5)));
    }

    #[test]
    fn nan_payloads_collapse() {
        let quiet = enc(&Value::Float(f64::NAN));
        let odd = enc(&Value::Float(f64::from_bits(0x7ff0_0000_0000_0001)));
        assert_eq!(quiet, odd);
        assert_eq!(quiet, vec![0xfb, 0x7f, 0xf8, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn tags_prefix_their_content() {
        assert_eq!(
            enc(&Value::tag(37, Value::Bytes(vec![1, 2]))),
            vec![0xd8, 37, 0x42, 1, 2]
        );
        assert_eq!(
            enc(&Value::tag(40_001, Value::Integer(0))),
            vec![0xd9, 0x9c, 0x41, 0x00]
        );
    }

    #[test]
    fn map_order_is_independent_of_insertion() {
        let forward = Value::Map(vec![
            (Value::from("bb"), Value::Integer(2)),
            (Value::from("a"), Value::Integer(1)),
        ]);
        let backward = Value::Map(vec![
            (Value::from("a"), Value::Integer(1)),
            (Value::from("bb"), Value::Integer(2)),
        ]);
        assert_eq!(enc(&forward), enc(&backward));
        assert_eq!(
            enc(&forward),
            vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]
        );
    }

    #[test]
    fn excessive_nesting_is_refused() {
        let mut value = Value::Null;
        for _ in 0..=MAX_DEPTH {
            value = Value::Array(vec![value]);
        }
        assert_eq!(
            to_canonical_cbor(&value),
            Err(CodecError::NestingTooDeep { max: MAX_DEPTH })
        );
    }
}
