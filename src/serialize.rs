//! Text emission for [`ConvertedMap`]: a hand-rolled, JSON-shaped renderer.
//!
//! The output is `{"key":value,...}` with keys in insertion order. Strings are
//! written verbatim between quotes; no escaping is performed, so a quote or
//! control character inside a value passes straight through. Callers that need
//! well-formed JSON for arbitrary input should reach for a real JSON encoder.

use std::fmt::Write;

use crate::map::{ConvertedMap, Value};

/// Renders `map` as a JSON-shaped object string.
pub(crate) fn to_text(map: &ConvertedMap) -> String {
    let mut out = String::new();
    write_map(&mut out, map);
    out
}

fn write_map(out: &mut String, map: &ConvertedMap) {
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        out.push_str(key);
        out.push_str("\":");
        write_value(out, value);
    }
    out.push('}');
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Seq(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Bool(v) => {
            let _ = write!(out, "{v}");
        }
        Value::U64(v) => {
            let _ = write!(out, "{v}");
        }
        Value::I64(v) => {
            let _ = write!(out, "{v}");
        }
        Value::U128(v) => {
            let _ = write!(out, "{v}");
        }
        Value::I128(v) => {
            let _ = write!(out, "{v}");
        }
        Value::F64(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Map(map) => write_map(out, map),
        // Everything else renders as quoted text, unescaped.
        Value::Char(v) => {
            let _ = write!(out, "\"{v}\"");
        }
        Value::Text(v) => {
            out.push('"');
            out.push_str(v);
            out.push('"');
        }
    }
}

/// Renders a scalar value as a bare string, for use as a map key.
///
/// Containers have no sensible key rendering; they fall back to their
/// JSON-shaped form so the result is at least unambiguous.
pub(crate) fn key_text(value: &Value) -> String {
    match value {
        Value::Text(v) => v.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U128(v) => v.to_string(),
        Value::I128(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Seq(_) | Value::Map(_) => {
            let mut out = String::new();
            write_value(&mut out, value);
            out
        }
    }
}
