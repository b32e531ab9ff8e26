//! Canonical JSON encoding.
//!
//! Hashing and signing require that two implementations produce
//! byte-identical bytes for the same logical payload: object keys are
//! written in byte-wise sorted order, arrays in element order, and numbers
//! in serde_json's shortest round-trip form.

use serde_json::Value;

/// Encode a JSON value canonically.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key);
                out.push(b':');
                write_value(out, &map[*key]);
            }
            out.push(b'}');
        }
    }
}

/// JSON string escaping, matching serde_json's escape rules.
fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes())
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn nested_objects_sorted_recursively() {
        let v = json!({"z": {"b": 1, "a": [ {"y": 1, "x": 2} ]}, "a": null});
        let bytes = canonical_bytes(&v);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":null,"z":{"a":[{"x":2,"y":1}],"b":1}}"#
        );
    }

    #[test]
    fn arrays_preserve_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonical_bytes(&v), b"[3,1,2]");
    }

    #[test]
    fn strings_escaped() {
        let v = json!({"msg": "line1\nline2 \"quoted\""});
        assert_eq!(
            String::from_utf8(canonical_bytes(&v)).unwrap(),
            r#"{"msg":"line1\nline2 \"quoted\""}"#
        );
    }

    #[test]
    fn numbers_stable() {
        let v = json!({"int": 180000, "float": 0.29, "neg": -3});
        assert_eq!(
            String::from_utf8(canonical_bytes(&v)).unwrap(),
            r#"{"float":0.29,"int":180000,"neg":-3}"#
        );
    }

    #[test]
    fn encoding_is_deterministic_across_roundtrips() {
        let v = json!({"payload": {"b": [1, 2, {"k": "v"}], "a": true}});
        let once = canonical_bytes(&v);
        let reparsed: Value = serde_json::from_slice(&once).unwrap();
        assert_eq!(once, canonical_bytes(&reparsed));
    }
}
