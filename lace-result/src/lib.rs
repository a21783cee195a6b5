//! Error types and result definitions for the lace computation-graph engine.
//!
//! This crate provides the unified error type ([`Error`]) and result alias
//! ([`Result<T>`]) used throughout all lace crates. Operations that can fail
//! return `Result<T>`; the error variant carries enough context to tell a
//! caller what went wrong and at which boundary.
//!
//! # Error Philosophy
//!
//! lace uses a single error enum rather than crate-specific error types.
//! This approach:
//! - Simplifies error handling across crate boundaries
//! - Allows errors to propagate naturally with the `?` operator
//! - Enables structured matching for programmatic handling
//!
//! # Error Categories
//!
//! - **Graph construction** ([`Error::TypeMismatch`]): an operation applied
//!   to inputs whose types fit no declared signature. Raised at construction
//!   time, never during evaluation, so malformed graphs fail fast.
//! - **Rewriting** ([`Error::UnsupportedRewrite`]): the comparison-safety
//!   rewriter met a type it has no rule for.
//! - **Columnar data** ([`Error::ArrayEncoding`], [`Error::Arrow`]): a
//!   physical array inconsistent with its logical type, or an Arrow kernel
//!   failure.
//! - **External collaborators** ([`Error::Offload`], [`Error::Io`]): the I/O
//!   offload worker reported a failure; these are expected errors (missing
//!   artifact, transient I/O) and surface as evaluation failures, never
//!   panics.
//! - **Wire format** ([`Error::Serialization`]): malformed serialized graphs.
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
