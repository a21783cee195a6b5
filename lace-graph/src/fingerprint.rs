//! Content fingerprints for graph nodes.
//!
//! A [`Fingerprint`] is a BLAKE3 hash over a node's structure: kind, op name,
//! declared type, literal payload, and the fingerprints of its inputs. Two
//! nodes with the same fingerprint denote the same computation even when
//! built independently, so fingerprints serve as cache keys and as the
//! deduplication key in the wire form.
//!
//! Hashing walks the canonical structure directly rather than a serialized
//! encoding: every variant writes a discriminant byte and length-prefixes
//! variable payloads, so distinct structures never collide by concatenation.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use lace_types::{Domain, Primitive, Type, Value};

use crate::node::{Node, NodeRef};

/// BLAKE3 digest identifying a node's computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty for logs; full digests via to_hex.
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Per-walk memo mapping node handles to fingerprints.
///
/// Keys are raw `Arc` pointers, valid only while the caller keeps the graph
/// alive, so a memo is scoped to one traversal (or one engine execute) and
/// never outlives the roots it was built from.
pub struct FingerprintMemo {
    memo: FxHashMap<*const Node, Fingerprint>,
}

impl FingerprintMemo {
    pub fn new() -> Self {
        Self {
            memo: FxHashMap::default(),
        }
    }

    /// Fingerprint `node`, reusing previously computed results for shared
    /// subtrees.
    pub fn fingerprint(&mut self, node: &NodeRef) -> Fingerprint {
        let ptr = Arc::as_ptr(node);
        if let Some(fp) = self.memo.get(&ptr) {
            return *fp;
        }
        let mut hasher = blake3::Hasher::new();
        match &**node {
            Node::Const { ty, value } => {
                hasher.update(&[0u8]);
                hash_type(&mut hasher, ty);
                hash_value(&mut hasher, value);
            }
            Node::Output { op, ty, inputs } => {
                hasher.update(&[1u8]);
                hash_str(&mut hasher, op);
                hash_type(&mut hasher, ty);
                hash_len(&mut hasher, inputs.len());
                for input in inputs {
                    let child = self.fingerprint(input);
                    hasher.update(child.as_bytes());
                }
            }
        }
        let fp = Fingerprint(*hasher.finalize().as_bytes());
        self.memo.insert(ptr, fp);
        fp
    }
}

impl Default for FingerprintMemo {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint a single node with a fresh memo.
pub fn fingerprint(node: &NodeRef) -> Fingerprint {
    FingerprintMemo::new().fingerprint(node)
}

fn hash_len(hasher: &mut blake3::Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hash_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn hash_type(hasher: &mut blake3::Hasher, ty: &Type) {
    match ty {
        Type::Any => {
            hasher.update(&[0u8]);
        }
        Type::None => {
            hasher.update(&[1u8]);
        }
        Type::Primitive(p) => {
            let tag = match p {
                Primitive::Bool => 0u8,
                Primitive::Int => 1,
                Primitive::Float => 2,
                Primitive::Text => 3,
                Primitive::Bytes => 4,
            };
            hasher.update(&[2u8, tag]);
        }
        Type::TypedDict(dict) => {
            hasher.update(&[3u8]);
            hash_len(hasher, dict.fields.len());
            for field in &dict.fields {
                hash_str(hasher, &field.name);
                hash_type(hasher, &field.ty);
            }
        }
        Type::List(elem) => {
            hasher.update(&[4u8]);
            hash_type(hasher, elem);
        }
        Type::Union(members) => {
            hasher.update(&[5u8]);
            hash_len(hasher, members.len());
            for member in members {
                hash_type(hasher, member);
            }
        }
        Type::Domain(Domain::Asset) => {
            hasher.update(&[6u8, 0]);
        }
    }
}

fn hash_value(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(&[0u8]);
        }
        Value::Bool(b) => {
            hasher.update(&[1u8, *b as u8]);
        }
        Value::Int(i) => {
            hasher.update(&[2u8]);
            hasher.update(&i.to_le_bytes());
        }
        Value::Float(v) => {
            // Bit pattern, so NaN payloads and signed zero hash distinctly.
            hasher.update(&[3u8]);
            hasher.update(&v.to_bits().to_le_bytes());
        }
        Value::Text(s) => {
            hasher.update(&[4u8]);
            hash_str(hasher, s);
        }
        Value::Bytes(b) => {
            hasher.update(&[5u8]);
            hash_len(hasher, b.len());
            hasher.update(b);
        }
        Value::Asset(asset) => {
            hasher.update(&[6u8]);
            hasher.update(&u64::from(asset.artifact).to_le_bytes());
            hash_str(hasher, &asset.path);
        }
        Value::List(items) => {
            hasher.update(&[7u8]);
            hash_len(hasher, items.len());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Dict(fields) => {
            hasher.update(&[8u8]);
            hash_len(hasher, fields.len());
            for (name, v) in fields {
                hash_str(hasher, name);
                hash_value(hasher, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lace_types::Type;

    #[test]
    fn test_equal_structure_equal_fingerprint() {
        let a = Node::output(
            "eq",
            Type::BOOL,
            vec![Node::constant(1i64), Node::constant(2i64)],
        );
        let b = Node::output(
            "eq",
            Type::BOOL,
            vec![Node::constant(1i64), Node::constant(2i64)],
        );
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_op_name_and_payload_change_fingerprint() {
        let base = Node::output("eq", Type::BOOL, vec![Node::constant(1i64)]);
        let other_op = Node::output("ne", Type::BOOL, vec![Node::constant(1i64)]);
        let other_input = Node::output("eq", Type::BOOL, vec![Node::constant(2i64)]);
        assert_ne!(fingerprint(&base), fingerprint(&other_op));
        assert_ne!(fingerprint(&base), fingerprint(&other_input));
    }

    #[test]
    fn test_type_annotation_is_part_of_identity() {
        let plain = Node::constant(Value::Null);
        let typed = Node::constant_typed(Type::optional(Type::INT), Value::Null).unwrap();
        assert_ne!(fingerprint(&plain), fingerprint(&typed));
    }

    #[test]
    fn test_memo_is_consistent_across_shared_subtrees() {
        let shared = Node::constant("s");
        let root = Node::output("eq", Type::BOOL, vec![shared.clone(), shared.clone()]);
        let mut memo = FingerprintMemo::new();
        let first = memo.fingerprint(&root);
        let second = memo.fingerprint(&root);
        assert_eq!(first, second);
        assert_eq!(memo.fingerprint(&shared), fingerprint(&shared));
    }

    #[test]
    fn test_display_is_a_short_hex_prefix() {
        let fp = fingerprint(&Node::constant(1i64));
        let display = fp.to_string();
        assert_eq!(display.len(), 16);
        assert!(fp.to_hex().starts_with(&display));
    }
}
