//! JSON export of collection contents.
//!
//! Export walks a collection and hands every plain value to a formatter;
//! nested collections recurse. [`write_mixed`] is the default formatter.

use super::layout::{self, Layout};
use crate::alloc::Element;
use crate::bptree;
use crate::error::CoreResult;
use crate::transaction::TxnState;
use crate::types::Ref;
use crate::value::{CollectionType, Mixed};
use std::fmt::Write;

/// Flavor of the exported JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonOutputMode {
    /// Plain JSON. Links print as `{"table":..,"key":..}`.
    #[default]
    Json,
    /// Extended JSON with `$link`, `$oid`, `$uuid`, `$numberDecimal` and
    /// `$date` wrappers.
    XJson,
}

/// Formatter of one plain value.
pub type MixedFormatter<'a> = &'a dyn Fn(&mut String, &Mixed, JsonOutputMode);

/// Writes one value in the given mode.
///
/// Binary values print as hex strings and non-finite floats as `null`.
pub fn write_mixed(out: &mut String, value: &Mixed, mode: JsonOutputMode) {
    match value {
        Mixed::Null => out.push_str("null"),
        Mixed::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Mixed::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Mixed::Float(f) => write_float(out, f64::from(*f)),
        Mixed::Double(d) => write_float(out, *d),
        Mixed::Decimal(d) => match mode {
            JsonOutputMode::Json => {
                let _ = write!(out, "{d}");
            }
            JsonOutputMode::XJson => {
                let _ = write!(out, "{{\"$numberDecimal\":\"{d}\"}}");
            }
        },
        Mixed::String(s) => write_string(out, s),
        Mixed::Binary(bytes) => {
            out.push('"');
            for byte in bytes {
                let _ = write!(out, "{byte:02x}");
            }
            out.push('"');
        }
        Mixed::Timestamp(ts) => match mode {
            JsonOutputMode::Json => write_string(out, &ts.to_string()),
            JsonOutputMode::XJson => {
                let millis = ts
                    .seconds()
                    .saturating_mul(1000)
                    .saturating_add(i64::from(ts.nanoseconds() / 1_000_000));
                let _ = write!(out, "{{\"$date\":{{\"$numberLong\":\"{millis}\"}}}}");
            }
        },
        Mixed::ObjectId(id) => match mode {
            JsonOutputMode::Json => write_string(out, &id.to_string()),
            JsonOutputMode::XJson => {
                let _ = write!(out, "{{\"$oid\":\"{id}\"}}");
            }
        },
        Mixed::Uuid(uuid) => match mode {
            JsonOutputMode::Json => write_string(out, &uuid.to_string()),
            JsonOutputMode::XJson => {
                let _ = write!(out, "{{\"$uuid\":\"{uuid}\"}}");
            }
        },
        Mixed::Link(link) if link.is_unresolved() => out.push_str("null"),
        Mixed::Link(link) => {
            let (table, key) = (link.table.index(), link.key.value());
            match mode {
                JsonOutputMode::Json => {
                    let _ = write!(out, "{{\"table\":{table},\"key\":{key}}}");
                }
                JsonOutputMode::XJson => {
                    let _ = write!(out, "{{\"$link\":{{\"table\":{table},\"key\":{key}}}}}");
                }
            }
        }
        Mixed::List => out.push_str("[]"),
        Mixed::Dictionary => out.push_str("{}"),
    }
}

fn write_float(out: &mut String, value: f64) {
    match serde_json::Number::from_f64(value) {
        Some(number) => {
            let _ = write!(out, "{number}");
        }
        None => out.push_str("null"),
    }
}

fn write_string(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("null"),
    }
}

/// Writes the collection at `top`; `None` prints as an empty collection.
pub(crate) fn write_collection(
    st: &TxnState,
    out: &mut String,
    layout: Layout,
    top: Option<Ref>,
    mode: JsonOutputMode,
    formatter: MixedFormatter<'_>,
) -> CoreResult<()> {
    let Some(top) = top else {
        out.push_str(if layout == Layout::Dictionary { "{}" } else { "[]" });
        return Ok(());
    };
    let values = bptree::to_vec(&st.store, layout::values_tree(&st.store, layout, top)?)?;
    if layout == Layout::Dictionary {
        let keys = bptree::to_vec(&st.store, layout::keys_tree(&st.store, top)?)?;
        out.push('{');
        for (i, (key, value)) in keys.iter().zip(&values).enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_string(out, key.to_mixed().as_str().unwrap_or_default());
            out.push(':');
            write_element(st, out, value, mode, formatter)?;
        }
        out.push('}');
    } else {
        out.push('[');
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_element(st, out, value, mode, formatter)?;
        }
        out.push(']');
    }
    Ok(())
}

fn write_element(
    st: &TxnState,
    out: &mut String,
    element: &Element,
    mode: JsonOutputMode,
    formatter: MixedFormatter<'_>,
) -> CoreResult<()> {
    match element {
        Element::Value(value) if value.is_unresolved_link() => {
            out.push_str("null");
            Ok(())
        }
        Element::Value(value) => {
            formatter(out, value, mode);
            Ok(())
        }
        Element::Nested { kind, top, .. } => {
            if top.is_null() {
                let layout = match kind {
                    CollectionType::List => Layout::MixedList,
                    CollectionType::Dictionary => Layout::Dictionary,
                };
                return write_collection(st, out, layout, None, mode, formatter);
            }
            let layout = Layout::detect(&st.store, *kind, *top)?;
            write_collection(st, out, layout, Some(*top), mode, formatter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjKey, ObjLink, TableKey};
    use crate::value::{ObjectId, Timestamp};

    fn render(value: &Mixed, mode: JsonOutputMode) -> String {
        let mut out = String::new();
        write_mixed(&mut out, value, mode);
        out
    }

    #[test]
    fn plain_values() {
        assert_eq!(render(&Mixed::Int(-4), JsonOutputMode::Json), "-4");
        assert_eq!(render(&Mixed::from("a\"b"), JsonOutputMode::Json), r#""a\"b""#);
        assert_eq!(render(&Mixed::Double(f64::NAN), JsonOutputMode::Json), "null");
        assert_eq!(render(&Mixed::Binary(vec![0, 255]), JsonOutputMode::Json), "\"00ff\"");
    }

    #[test]
    fn links_depend_on_mode() {
        let link = Mixed::Link(ObjLink::new(TableKey::new(1), ObjKey::new(5)));
        assert_eq!(render(&link, JsonOutputMode::Json), r#"{"table":1,"key":5}"#);
        assert_eq!(
            render(&link, JsonOutputMode::XJson),
            r#"{"$link":{"table":1,"key":5}}"#
        );
        let dead = Mixed::Link(ObjLink::new(TableKey::new(1), ObjKey::new(5).get_unresolved()));
        assert_eq!(render(&dead, JsonOutputMode::XJson), "null");
    }

    #[test]
    fn extended_wrappers() {
        let oid = ObjectId::from_bytes([1; 12]);
        assert_eq!(
            render(&Mixed::ObjectId(oid), JsonOutputMode::XJson),
            r#"{"$oid":"010101010101010101010101"}"#
        );
        assert_eq!(
            render(&Mixed::Timestamp(Timestamp::new(2, 500_000_000)), JsonOutputMode::XJson),
            r#"{"$date":{"$numberLong":"2500"}}"#
        );
        let price = Mixed::Decimal(rust_decimal::Decimal::new(1999, 2));
        assert_eq!(render(&price, JsonOutputMode::Json), "19.99");
        assert_eq!(
            render(&price, JsonOutputMode::XJson),
            r#"{"$numberDecimal":"19.99"}"#
        );
    }
}
