//! Canonical hashing for trace fingerprints.

use crate::trace::Trace;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Prefix naming the digest algorithm in every hash produced here.
const DIGEST_PREFIX: &str = "sha256:";

/// `"sha256:<hex>"` digest of `data`.
pub fn sha256_hash(data: &str) -> String {
    let digest = Sha256::new_with_prefix(data.as_bytes()).finalize();
    format!("{}{:x}", DIGEST_PREFIX, digest)
}

pub fn canonical_hash(value: &Value) -> String {
    sha256_hash(&canonical_json(value))
}

/// Compact JSON with object keys in sorted order, so equal values always
/// render to the same text regardless of insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
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
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Behavioural fingerprint of a trace: the hash of its ordered
/// `(name, step_type, status)` triples. Ids, timestamps and payloads are
/// ignored, so two runs that took the same path share a fingerprint.
pub fn fingerprint(trace: &Trace) -> String {
    let shape: Vec<Value> = trace
        .steps
        .iter()
        .map(|s| json!([s.name, s.step_type.as_str(), s.status.as_str()]))
        .collect();
    canonical_hash(&Value::Array(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Step, StepType};

    #[test]
    fn digest_is_prefixed_hex() {
        assert_eq!(
            sha256_hash("hello"),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn canonical_form_ignores_key_order() {
        let a = json!({"b": 2, "a": {"d": [1, "x"], "c": null}});
        let b = json!({"a": {"c": null, "d": [1, "x"]}, "b": 2});
        assert_eq!(canonical_json(&a), r#"{"a":{"c":null,"d":[1,"x"]},"b":2}"#);
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
        assert_eq!(canonical_json(&json!([])), "[]");
        assert_eq!(canonical_json(&json!({"k": "a\"b"})), r#"{"k":"a\"b"}"#);
    }

    #[test]
    fn fingerprint_ignores_ids_and_payloads() {
        let mut a = Trace::new("a");
        a.add_step(Step::new("search", StepType::ToolCall));
        a.add_step(Step::new("answer", StepType::LlmCall));

        let mut b = Trace::new("b");
        let mut search = Step::new("search", StepType::ToolCall);
        search.set_output("result", json!(["hit"]));
        b.add_step(search);
        b.add_step(Step::new("answer", StepType::LlmCall).with_duration_ms(12.0));

        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.add_step(Step::new("extra", StepType::Custom));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_sees_status_changes() {
        let mut ok = Trace::new("t");
        ok.add_step(Step::new("fetch", StepType::ToolCall));
        let mut failed = Trace::new("t");
        failed.add_step(Step::new("fetch", StepType::ToolCall).fail("timeout"));
        assert_ne!(fingerprint(&ok), fingerprint(&failed));
    }
}
