//! Computation-graph IR for lace.
//!
//! This crate defines the lazy intermediate representation the engine
//! evaluates: immutable, reference-counted nodes ([`Node`]), the typed
//! construction path ([`OpRegistry`]), content identity ([`Fingerprint`]),
//! and the wire form ([`FlatGraph`]).
//!
//! ## Design
//!
//! - **Nodes are values.** A node is either a literal constant or an op
//!   applied to input nodes, and it never changes after construction.
//!   Rewrites build new nodes and reuse untouched branches by handle.
//! - **Types are checked where graphs are built.** [`OpRegistry::apply`]
//!   validates inputs against the op signature and computes the output type,
//!   so evaluation never encounters an ill-typed graph.
//! - **Identity is content.** [`Fingerprint`] hashes structure, not
//!   addresses: independently built but equal subgraphs share cache entries
//!   and collapse to one row on the wire.

#![forbid(unsafe_code)]

pub mod fingerprint;
pub mod node;
pub mod ops;
pub mod serialize;

pub use fingerprint::{Fingerprint, FingerprintMemo, fingerprint};
pub use node::{Node, NodeRef};
pub use ops::{NullPolicy, OpDef, OpRegistry, OutputType, Param, op_names};
pub use serialize::{FlatGraph, FlatNode, from_flat, to_flat};
