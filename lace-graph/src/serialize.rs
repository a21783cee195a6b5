//! Wire form of computation graphs.
//!
//! A [`FlatGraph`] is a topologically ordered node table plus root indices:
//! every input reference points at an earlier row, so decoding is a single
//! forward pass and malformed tables (forward or out-of-range references)
//! are rejected before any node is built.
//!
//! Flattening deduplicates by [`Fingerprint`]: structurally equal subtrees
//! collapse to one row even when the in-memory graph built them separately,
//! and decoding restores the sharing as `Arc` identity. Round-tripping a
//! graph therefore preserves types, op names, literals, and the shape of
//! shared branches.
//!
//! Two codecs cover the transport cases: JSON (via `serde_json`) for
//! debugging and cross-language clients, and a compact binary encoding (via
//! `bitcode`) for storage and same-stack transport.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lace_result::{Error, Result};
use lace_types::{Type, Value};

use crate::fingerprint::{Fingerprint, FingerprintMemo};
use crate::node::{Node, NodeRef};

/// One row of the wire-form node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlatNode {
    Const {
        ty: Type,
        value: Value,
    },
    Output {
        op: String,
        ty: Type,
        inputs: Vec<u32>,
    },
}

/// A serialized graph: node table in dependency order plus root indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatGraph {
    pub nodes: Vec<FlatNode>,
    pub roots: Vec<u32>,
}

impl FlatGraph {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::serialization)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::serialization)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bitcode::serialize(self).map_err(Error::serialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bitcode::deserialize(bytes).map_err(Error::serialization)
    }
}

/// Flatten `roots` (and everything they reach) into wire form.
///
/// Shared and structurally equal subtrees are emitted once; children always
/// precede parents in the node table.
pub fn to_flat(roots: &[NodeRef]) -> FlatGraph {
    let mut memo = FingerprintMemo::new();
    let mut index: FxHashMap<Fingerprint, u32> = FxHashMap::default();
    let mut nodes: Vec<FlatNode> = Vec::new();
    let root_ids = roots
        .iter()
        .map(|root| add_node(root, &mut memo, &mut index, &mut nodes))
        .collect();
    debug!(
        roots = roots.len(),
        rows = nodes.len(),
        "flattened graph"
    );
    FlatGraph {
        nodes,
        roots: root_ids,
    }
}

fn add_node(
    node: &NodeRef,
    memo: &mut FingerprintMemo,
    index: &mut FxHashMap<Fingerprint, u32>,
    nodes: &mut Vec<FlatNode>,
) -> u32 {
    let fp = memo.fingerprint(node);
    if let Some(&id) = index.get(&fp) {
        return id;
    }
    let flat = match &**node {
        Node::Const { ty, value } => FlatNode::Const {
            ty: ty.clone(),
            value: value.clone(),
        },
        Node::Output { op, ty, inputs } => {
            let input_ids = inputs
                .iter()
                .map(|input| add_node(input, memo, index, nodes))
                .collect();
            FlatNode::Output {
                op: op.clone(),
                ty: ty.clone(),
                inputs: input_ids,
            }
        }
    };
    let id = nodes.len() as u32;
    nodes.push(flat);
    index.insert(fp, id);
    id
}

/// Rebuild root nodes from wire form.
///
/// Declared types are trusted as written; rows that reference themselves,
/// later rows, or rows beyond the table are a [`Error::Serialization`].
pub fn from_flat(flat: &FlatGraph) -> Result<Vec<NodeRef>> {
    let mut built: Vec<NodeRef> = Vec::with_capacity(flat.nodes.len());
    for (row, flat_node) in flat.nodes.iter().enumerate() {
        let node = match flat_node {
            FlatNode::Const { ty, value } => Arc::new(Node::Const {
                ty: ty.clone(),
                value: value.clone(),
            }),
            FlatNode::Output { op, ty, inputs } => {
                let mut children = Vec::with_capacity(inputs.len());
                for &input in inputs {
                    let input = input as usize;
                    if input >= row {
                        return Err(Error::Serialization(format!(
                            "node {} references node {} out of dependency order",
                            row, input
                        )));
                    }
                    children.push(Arc::clone(&built[input]));
                }
                Arc::new(Node::Output {
                    op: op.clone(),
                    ty: ty.clone(),
                    inputs: children,
                })
            }
        };
        built.push(node);
    }
    flat.roots
        .iter()
        .map(|&root| {
            built
                .get(root as usize)
                .cloned()
                .ok_or_else(|| {
                    Error::Serialization(format!("root index {} beyond node table", root))
                })
        })
        .collect()
}
