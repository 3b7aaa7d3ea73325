// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Small shared helpers: hashing and recursive config merging.

use std::any::Any;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Returns the lowercase hex SHA-256 digest of `input`.
pub fn digest_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Recursively copies keys from `src` into `dest` when `dest` lacks them
/// or holds `null`.
///
/// Existing scalar and array values in `dest` are never overwritten; when
/// both sides hold an object under the same key the merge recurses.
/// A non-object `dest` is left untouched.
pub fn merge(dest: &mut Value, src: &Value) {
    let (Value::Object(dest), Value::Object(src)) = (dest, src) else {
        return;
    };

    for (key, value) in src {
        match dest.get_mut(key) {
            None | Some(Value::Null) => {
                dest.insert(key.clone(), value.clone());
            }
            Some(existing @ Value::Object(_)) => merge(existing, value),
            Some(_) => {}
        }
    }
}

/// Clones `options` (treating null as `{}`) and fills in `defaults`.
pub fn merge_defaults(options: &Value, defaults: &Value) -> Value {
    let mut merged = match options {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    merge(&mut merged, defaults);
    merged
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_hex() {
        let hash = digest_hex("");
        assert_eq!(hash.len(), 64);
        assert!(hash.starts_with("e3b0c442"));
        assert_ne!(digest_hex("a"), digest_hex("b"));
    }

    #[test]
    fn test_merge_fills_missing_keys_only() {
        let mut dest = json!({ "a": "mine", "list": [1] });
        merge(&mut dest, &json!({ "a": "theirs", "b": "b", "list": [2, 3] }));
        assert_eq!(dest, json!({ "a": "mine", "b": "b", "list": [1] }));
    }

    #[test]
    fn test_merge_recurses_into_objects() {
        let mut dest = json!({ "obj": { "a": "a" } });
        merge(&mut dest, &json!({ "obj": { "a": "x", "b": "b" }, "c": "c" }));
        assert_eq!(dest["obj"]["a"], "a");
        assert_eq!(dest["obj"]["b"], "b");
        assert_eq!(dest["c"], "c");
    }

    #[test]
    fn test_merge_defaults_from_null() {
        let merged = merge_defaults(&Value::Null, &json!({ "production": false }));
        assert_eq!(merged, json!({ "production": false }));
    }
}
