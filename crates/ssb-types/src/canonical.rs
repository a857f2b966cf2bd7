//! Byte-exact canonical JSON encoding.
//!
//! Every signature in the system is computed over a specific textual
//! rendering of a [`SignedMessage`](crate::message::SignedMessage): keys in
//! the fixed field order, 2-space indentation, `ensure_ascii`-style string
//! escaping (non-ASCII codepoints escaped as `\uXXXX`), and object keys
//! emitted in the order they were inserted. This module reproduces that
//! rendering independent of `serde_json`'s own (differently-opinionated)
//! pretty-printer, since signatures depend on getting every byte right.

use serde_json::Value;
use std::fmt::Write as _;

use crate::ids::{Identity, MessageId};
use crate::message::SignedMessage;

/// Renders `value` the way Python's `json.dumps(value, indent=2)` would,
/// starting at the given base indentation depth (in units of 2 spaces).
pub fn render_value(value: &Value, base_indent: usize) -> String {
    let mut out = String::new();
    write_value(&mut out, value, base_indent);
    out
}

fn write_value(out: &mut String, value: &Value, indent: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_json_string(out, s),
        Value::Array(items) => write_array(out, items, indent),
        Value::Object(map) => write_object(out, map, indent),
    }
}

fn write_array(out: &mut String, items: &[Value], indent: usize) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    out.push('[');
    let inner = indent + 1;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('\n');
        push_indent(out, inner);
        write_value(out, item, inner);
    }
    out.push('\n');
    push_indent(out, indent);
    out.push(']');
}

fn write_object(out: &mut String, map: &serde_json::Map<String, Value>, indent: usize) {
    if map.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push('{');
    let inner = indent + 1;
    for (i, (key, val)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('\n');
        push_indent(out, inner);
        write_json_string(out, key);
        out.push_str(": ");
        write_value(out, val, inner);
    }
    out.push('\n');
    push_indent(out, indent);
    out.push('}');
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Escapes a string the way Python's `json.dumps` does with its default
/// `ensure_ascii=True`: control characters and the standard two-character
/// escapes, everything else outside ASCII as `\uXXXX` (with surrogate pairs
/// for codepoints above the BMP).
fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if (c as u32) < 0x7f => out.push(c),
            c => {
                let cp = c as u32;
                if cp <= 0xffff {
                    let _ = write!(out, "\\u{cp:04x}");
                } else {
                    let v = cp - 0x10000;
                    let hi = 0xd800 + (v >> 10);
                    let lo = 0xdc00 + (v & 0x3ff);
                    let _ = write!(out, "\\u{hi:04x}\\u{lo:04x}");
                }
            }
        }
    }
    out.push('"');
}

/// Renders the text a [`SignedMessage`] is signed over, i.e. every field
/// except `signature`, with `content` indented one level deeper than the
/// top-level object.
pub fn render_unsigned(
    previous: Option<&MessageId>,
    author: &Identity,
    sequence: u64,
    timestamp: i64,
    content: &Value,
) -> String {
    let previous_json = match previous {
        Some(id) => format!("\"{}\"", id.as_str()),
        None => "null".to_string(),
    };
    let content_json = render_value(content, 1);
    format!(
        "{{\n  \"previous\": {previous_json},\n  \"author\": \"{author}\",\n  \"sequence\": {sequence},\n  \"timestamp\": {timestamp},\n  \"hash\": \"sha256\",\n  \"content\": {content_json}\n}}"
    )
}

/// Renders the full signed message (including `signature`), the form that
/// is hashed to produce the message id and that is stored on disk.
pub fn render_signed(msg: &SignedMessage) -> String {
    let unsigned = render_unsigned(
        msg.previous.as_ref(),
        &msg.author,
        msg.sequence,
        msg.timestamp,
        &msg.content,
    );
    // Splice `"signature": "..."` in before the closing brace, matching
    // `render_unsigned`'s `,\n  "signature": ...` placement exactly.
    let body = unsigned.trim_end_matches('}').trim_end_matches('\n');
    format!("{body},\n  \"signature\": \"{}\"\n}}", msg.signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_keep_insertion_order() {
        let v = json!({"b": 1, "a": 2});
        let rendered = render_value(&v, 0);
        assert!(rendered.find("\"b\"").unwrap() < rendered.find("\"a\"").unwrap());
    }

    #[test]
    fn empty_containers_are_not_expanded() {
        assert_eq!(render_value(&json!([]), 0), "[]");
        assert_eq!(render_value(&json!({}), 0), "{}");
    }

    #[test]
    fn unsigned_rendering_matches_expected_shape() {
        let author = Identity::from_raw("@abc.ed25519");
        let content = json!({"type": "about", "name": "alice"});
        let rendered = render_unsigned(None, &author, 1, 1495706260190, &content);
        assert!(rendered.starts_with("{\n  \"previous\": null,\n  \"author\": \"@abc.ed25519\","));
        assert!(rendered.contains("\"content\": {\n    \"type\": \"about\","));
        assert!(rendered.ends_with('}'));
    }
}
