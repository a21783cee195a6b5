//! Comparison-safety rewriting.
//!
//! Opaque media, structured records, and lists cannot serve as raw
//! equality/join/sort keys. [`make_comparison_safe`] rewrites a graph node
//! into one producing a comparable rendition of the same value:
//!
//! - asset-typed nodes become their content hash,
//! - dict-typed nodes recurse field-by-field and are reassembled only when
//!   some field actually changed,
//! - list-typed nodes become their delimited string rendering,
//! - everything else passes through untouched.
//!
//! The rewrite is pure graph-to-graph: it walks types and emits nodes, never
//! data. "Unchanged" is decided by content fingerprint rather than handle
//! identity, so an equal-but-separately-built field still counts as
//! unchanged and an untouched dict keeps its original handle (no graph
//! growth on repeated rewrites).

#![forbid(unsafe_code)]

use tracing::trace;

use lace_graph::{FingerprintMemo, Node, NodeRef, OpRegistry, op_names};
use lace_result::{Error, Result};
use lace_types::{Domain, Type, non_none};

/// Delimiter used when lists are rendered into join keys.
pub const LIST_JOIN_DELIMITER: &str = ",";

/// Rewrite `node` into a comparison-safe form.
///
/// Errors with [`Error::UnsupportedRewrite`] when the type offers no safe
/// rendition (a non-optional union mixing structured members cannot be
/// dispatched), and propagates construction failures from the ops the
/// rewrite emits.
pub fn make_comparison_safe(node: &NodeRef, registry: &OpRegistry) -> Result<NodeRef> {
    let mut memo = FingerprintMemo::new();
    rewrite(node, registry, &mut memo)
}

fn rewrite(node: &NodeRef, registry: &OpRegistry, memo: &mut FingerprintMemo) -> Result<NodeRef> {
    let base = non_none(node.ty());
    match &base {
        Type::Domain(Domain::Asset) => {
            trace!(ty = %node.ty(), "rewriting asset to content hash");
            registry.apply(op_names::ASSET_SHA256, vec![node.clone()])
        }
        Type::TypedDict(dict) => {
            let mut dirty = false;
            let mut inputs: Vec<NodeRef> = Vec::with_capacity(dict.fields.len() * 2);
            for field in &dict.fields {
                let picked = registry.field(node.clone(), &field.name)?;
                let safe = rewrite(&picked, registry, memo)?;
                if memo.fingerprint(&safe) != memo.fingerprint(&picked) {
                    dirty = true;
                }
                inputs.push(Node::constant(field.name.as_str()));
                inputs.push(safe);
            }
            if dirty {
                trace!(ty = %node.ty(), "reassembling dict from rewritten fields");
                registry.apply(op_names::DICT, inputs)
            } else {
                Ok(node.clone())
            }
        }
        Type::List(_) => {
            trace!(ty = %node.ty(), "rewriting list to joined string");
            registry.apply(
                op_names::JOIN_TO_STR,
                vec![node.clone(), Node::constant(LIST_JOIN_DELIMITER)],
            )
        }
        Type::Union(members) => {
            if members.iter().any(needs_rewrite) {
                Err(Error::UnsupportedRewrite(node.ty().to_string()))
            } else {
                Ok(node.clone())
            }
        }
        _ => Ok(node.clone()),
    }
}

/// Would [`make_comparison_safe`] change a node of this type?
fn needs_rewrite(ty: &Type) -> bool {
    match ty {
        Type::Domain(Domain::Asset) | Type::TypedDict(_) | Type::List(_) => true,
        Type::Union(members) => members.iter().any(needs_rewrite),
        _ => false,
    }
}
