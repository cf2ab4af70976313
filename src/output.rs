//! JSON serialization for runtime values, backing the `tojson` filter.
//!
//! The writer supports both compact and indented output with the knobs the
//! filter exposes: `indent`, `ensure_ascii`, `sort_keys`, and custom
//! separators.
//!
//! # Features
//!
//! - **Compact output** by default, with `", "` / `": "` separators
//! - **Indented output** when an indent string is configured
//! - **String escaping** for special characters and control codes, with
//!   optional `\uXXXX` escaping of all non-ASCII characters
//! - **Type preservation** - floats always keep a decimal point
//! - **Key ordering** - insertion order by default, sorted on request
//!
//! # Examples
//!
//! ```
//! use sprig_lang::output::{DumpOptions, dump};
//! use sprig_lang::Value;
//!
//! let value = Value::Array(vec![Value::Integer(1), Value::Float(2.0)]);
//! assert_eq!(dump(&value, &DumpOptions::default()).unwrap(), "[1, 2.0]");
//! ```

use crate::evaluator::EvalError;
use crate::value::{Value, ValueMap, format_float};

/// Serialization knobs for [`dump`].
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Indent string per nesting level; `None` produces compact output
    pub indent: Option<String>,
    /// Escape every non-ASCII character as `\uXXXX`
    pub ensure_ascii: bool,
    /// Emit object keys in sorted order instead of insertion order
    pub sort_keys: bool,
    /// Separator between array elements and object entries
    pub item_separator: String,
    /// Separator between an object key and its value
    pub key_separator: String,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            indent: None,
            ensure_ascii: false,
            sort_keys: false,
            item_separator: ", ".to_string(),
            key_separator: ": ".to_string(),
        }
    }
}

/// Serialize a runtime value to JSON text.
///
/// Null and undefined both serialize as `null`; function values are not
/// serializable and error.
pub fn dump(value: &Value, options: &DumpOptions) -> Result<String, EvalError> {
    let mut out = String::new();
    JsonWriter { options }.write_value(value, 0, &mut out)?;
    Ok(out)
}

struct JsonWriter<'a> {
    options: &'a DumpOptions,
}

impl JsonWriter<'_> {
    fn write_value(
        &self,
        value: &Value,
        depth: usize,
        out: &mut String,
    ) -> Result<(), EvalError> {
        match value {
            Value::Null | Value::Undefined => out.push_str("null"),
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Integer(n) => out.push_str(&n.to_string()),
            Value::Float(n) => {
                if !n.is_finite() {
                    return Err(EvalError::TypeError(
                        "Non-finite float is not JSON serializable".to_string(),
                    ));
                }
                out.push_str(&format_float(*n));
            }
            Value::String(s) => self.write_string(s, out),
            Value::Array(items) | Value::Tuple(items) => {
                self.write_array(items, depth, out)?;
            }
            Value::Object(map) | Value::KeywordArguments(map) => {
                self.write_object(map, depth, out)?;
            }
            Value::Function(_) => {
                return Err(EvalError::TypeError(
                    "Function values are not JSON serializable".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn write_array(
        &self,
        items: &[Value],
        depth: usize,
        out: &mut String,
    ) -> Result<(), EvalError> {
        if items.is_empty() {
            out.push_str("[]");
            return Ok(());
        }

        match &self.options.indent {
            Some(indent) => {
                out.push_str("[\n");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(&self.options.item_separator);
                        out.push('\n');
                    }
                    out.push_str(&indent.repeat(depth + 1));
                    self.write_value(item, depth + 1, out)?;
                }
                out.push('\n');
                out.push_str(&indent.repeat(depth));
                out.push(']');
            }
            None => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(&self.options.item_separator);
                    }
                    self.write_value(item, depth, out)?;
                }
                out.push(']');
            }
        }
        Ok(())
    }

    fn write_object(
        &self,
        map: &ValueMap,
        depth: usize,
        out: &mut String,
    ) -> Result<(), EvalError> {
        if map.is_empty() {
            out.push_str("{}");
            return Ok(());
        }

        let mut keys: Vec<&String> = map.keys().collect();
        if self.options.sort_keys {
            keys.sort();
        }

        match &self.options.indent {
            Some(indent) => {
                out.push_str("{\n");
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(&self.options.item_separator);
                        out.push('\n');
                    }
                    out.push_str(&indent.repeat(depth + 1));
                    self.write_string(key, out);
                    out.push_str(&self.options.key_separator);
                    if let Some(value) = map.get(key.as_str()) {
                        self.write_value(value, depth + 1, out)?;
                    }
                }
                out.push('\n');
                out.push_str(&indent.repeat(depth));
                out.push('}');
            }
            None => {
                out.push('{');
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(&self.options.item_separator);
                    }
                    self.write_string(key, out);
                    out.push_str(&self.options.key_separator);
                    if let Some(value) = map.get(key.as_str()) {
                        self.write_value(value, depth, out)?;
                    }
                }
                out.push('}');
            }
        }
        Ok(())
    }

    fn write_string(&self, s: &str, out: &mut String) {
        out.push('"');
        for c in s.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                }
                c if self.options.ensure_ascii && !c.is_ascii() => {
                    // Surrogate pairs for characters beyond the BMP
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        out.push_str(&format!("\\u{:04x}", unit));
                    }
                }
                c => out.push(c),
            }
        }
        out.push('"');
    }
}
