//! Lace: lazy, typed computation graphs over columnar data.
//!
//! A lace graph is built before anything runs. Each node carries a structural
//! [`Type`] checked at construction, so evaluation never sees an ill-typed
//! graph. Evaluation is columnar where it can be: list constants and bound
//! Arrow columns flow through the op kernels row by row, and scalars
//! broadcast to match.
//!
//! # Quick Start
//!
//! ```rust
//! use lace::{Engine, Node, Value, op_names};
//!
//! let engine = Engine::new();
//! let row = engine
//!     .registry()
//!     .apply(
//!         op_names::DICT,
//!         vec![
//!             Node::constant("label"),
//!             Node::constant("a"),
//!             Node::constant("count"),
//!             Node::constant(3i64),
//!         ],
//!     )
//!     .unwrap();
//! let count = engine.registry().field(row, "count").unwrap();
//!
//! assert_eq!(
//!     engine.execute_one(&count).unwrap().as_scalar(),
//!     Some(&Value::Int(3)),
//! );
//! ```
//!
//! # Architecture
//!
//! Lace is built in layers, one crate per layer:
//!
//! - `lace-types`: structural types, literal values, and the assignability
//!   relation everything else checks against.
//! - `lace-graph`: the immutable node IR, the op registry that type-checks
//!   graphs as they are built, content fingerprints, and the flat wire form.
//! - `lace-array`: typed Arrow columns with dictionary transparency, plus the
//!   null-safe comparison kernels.
//! - `lace-rewrite`: rewrites graphs into comparison-safe form (assets become
//!   digests, lists become delimited strings, dicts are rebuilt field by
//!   field).
//! - `lace-runtime`: the [`Engine`], scoped execution modes, the artifact
//!   offload worker, node tags, and the cache policy.
//!
//! # Re-exports
//!
//! The commonly used surface is re-exported at the crate root: [`Engine`]
//! and its results, graph construction ([`Node`], [`OpRegistry`],
//! [`op_names`]), the type and value model, [`TypedArray`], the
//! comparison-safety rewrite, and the runtime scopes. The wire encoding
//! lives under [`wire`].

#![forbid(unsafe_code)]

pub use lace_runtime::{
    ArtifactStore, CACHE_MODE_ENV_VAR, CacheMode, Engine, Evaluated, ExecMode, MemArtifactStore,
    ModeGuard, OffloadClient, OffloadService, RunOutcome, TagScopeGuard, attach_tag,
    eager_execution, execution_mode, isolated_tag_scope, lazy_execution, tag_value, tags_for,
};

pub use lace_array::TypedArray;
pub use lace_graph::{
    Fingerprint, FingerprintMemo, Node, NodeRef, NullPolicy, OpRegistry, fingerprint, op_names,
};
pub use lace_rewrite::{LIST_JOIN_DELIMITER, make_comparison_safe};
pub use lace_types::{ArtifactId, AssetRef, Type, TypedDict, Value};

pub mod wire {
    //! Flat graph encoding for transport.
    //!
    //! [`to_flat`] collapses a graph to a table of rows deduplicated by
    //! fingerprint; [`FlatGraph`] carries JSON and binary codecs; and
    //! [`from_flat`] / [`Engine::execute_flat`](crate::Engine::execute_flat)
    //! turn the table back into live nodes on the receiving side.
    pub use lace_graph::{FlatGraph, FlatNode, from_flat, to_flat};
}

pub use lace_result::{Error, Result};
