//! Content hashing for export change detection.
//!
//! The mapped values of an export are hashed and stored on the binding, so
//! a re-export with identical values can skip the remote write.

use sha2::{Digest, Sha256};

use crate::rpc::Record;

/// SHA256 of the JSON form of `values`.
///
/// `serde_json::Map` keeps keys sorted, so equal maps hash equally
/// regardless of insertion order.
#[must_use]
pub fn content_hash(values: &Record) -> String {
    let json = serde_json::Value::Object(values.clone()).to_string();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if values changed since the last export.
///
/// Returns `true` when there is no stored hash or it differs.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let mut a = Record::new();
        a.insert("name".into(), json!("SO001"));
        a.insert("partner_id".into(), json!(4));
        let mut b = Record::new();
        b.insert("partner_id".into(), json!(4));
        b.insert("name".into(), json!("SO001"));

        assert_eq!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a).len(), 64);
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = record(json!({"name": "SO001", "note": "a"}));
        let b = record(json!({"name": "SO001", "note": "b"}));
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
