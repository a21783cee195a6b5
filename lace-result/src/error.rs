use std::{fmt, io};
use thiserror::Error;

/// Unified error type for all lace operations.
///
/// This enum covers every failure mode across the lace stack, from graph
/// construction through columnar evaluation to the offload boundary. Errors
/// propagate upward with the `?` operator; internal code matches on specific
/// variants for fine-grained handling.
///
/// # Propagation Policy
///
/// Type-system and graph-construction errors are never retried; they
/// indicate a programming error and surface to the caller immediately.
/// Offload failures may be retried by the external collaborator, but lace
/// treats every offload call as single-shot and surfaces whatever the
/// collaborator ultimately returned.
#[derive(Error, Debug)]
pub enum Error {
    /// An operation was applied to inputs whose types are not assignable to
    /// any declared signature.
    ///
    /// Raised at graph-construction time, never at evaluation time, so
    /// malformed graphs fail fast. Carries the operation name and the
    /// argument that failed to match.
    #[error("type mismatch in op '{op}': argument {argument} has type {actual}, expected {expected}")]
    TypeMismatch {
        op: String,
        argument: String,
        expected: String,
        actual: String,
    },

    /// The comparison-safety rewriter encountered a type it has no rule for.
    ///
    /// Propagated to the caller of the rewrite rather than passed through
    /// silently: producing a non-comparable key would corrupt downstream
    /// join correctness.
    #[error("cannot rewrite type {0} to a comparison-safe form")]
    UnsupportedRewrite(String),

    /// A columnar operation received an array whose physical encoding is
    /// inconsistent with its declared logical type.
    ///
    /// Includes the dictionary-encoded case where the dictionary's values do
    /// not match the logical type after decode.
    #[error("array encoding error: {0}")]
    ArrayEncoding(String),

    /// The I/O offload collaborator reported a failure.
    ///
    /// Surfaced as a node-evaluation failure, not a crash: offload failures
    /// are expected (artifact missing, transient I/O, worker shut down).
    #[error("offload failure: {0}")]
    Offload(String),

    /// Arrow library error during columnar data operations.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// I/O error during file or stream operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A serialized graph could not be encoded or decoded.
    ///
    /// Covers malformed node tables (forward input references, out-of-range
    /// indices) as well as codec-level failures.
    #[error("graph serialization error: {0}")]
    Serialization(String),

    /// Invalid user input or API parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error indicating a bug or unexpected state.
    ///
    /// Should never occur during normal operation; the message includes the
    /// violated invariant.
    #[error("an internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a [`Error::TypeMismatch`] for the given op and argument.
    pub fn type_mismatch(
        op: impl Into<String>,
        argument: impl fmt::Display,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Error::TypeMismatch {
            op: op.into(),
            argument: argument.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an [`Error::Offload`] from any displayable error.
    #[inline]
    pub fn offload<E: fmt::Display>(err: E) -> Self {
        Error::Offload(err.to_string())
    }

    /// Create an [`Error::Serialization`] from any displayable error.
    #[inline]
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Error::Serialization(err.to_string())
    }
}
