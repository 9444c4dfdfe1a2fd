// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable fingerprints of tool argument maps.
//!
//! Two argument objects that differ only in key order hash identically.
//! Long string values are truncated before hashing so that huge payloads
//! (file contents, scripts) do not have to match byte for byte beyond the cap.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// String values are cut to this many characters before hashing.
const MAX_VALUE_CHARS: usize = 256;

/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

pub fn fingerprint(args: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(args, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => {
            let clipped: String = s.chars().take(MAX_VALUE_CHARS).collect();
            out.push_str(&Value::String(clipped).to_string());
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"path": "a.txt", "content": "x", "opts": {"b": 1, "a": 2}});
        let b = json!({"opts": {"a": 2, "b": 1}, "content": "x", "path": "a.txt"});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_values_differ() {
        assert_ne!(
            fingerprint(&json!({"path": "a.txt"})),
            fingerprint(&json!({"path": "b.txt"}))
        );
    }

    #[test]
    fn long_values_are_truncated_before_hashing() {
        let base = "x".repeat(MAX_VALUE_CHARS);
        let a = json!({"content": format!("{base}tail-one")});
        let b = json!({"content": format!("{base}tail-two")});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_has_fixed_length() {
        assert_eq!(fingerprint(&json!({})).len(), FINGERPRINT_LEN);
    }
}
