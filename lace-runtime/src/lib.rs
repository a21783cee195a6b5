//! Runtime for lace graphs.
//!
//! Everything that happens after a graph is built lives here:
//!
//! - [`Engine`] evaluates roots to [`Evaluated`] results, memoizing shared
//!   subgraphs per execution and caching across executions by fingerprint
//!   under the policy in [`CacheMode`].
//! - [`execution_mode`] and the [`eager_execution`] / [`lazy_execution`]
//!   scopes decide whether [`Engine::run_or_defer`] computes a node or hands
//!   it back untouched.
//! - [`OffloadService`] runs artifact I/O on a worker thread; the engine
//!   holds an [`OffloadClient`] and `asset_sha256` is the only op that uses
//!   it.
//! - [`tags`] attaches out-of-band annotations to nodes by fingerprint,
//!   scoped the same way execution modes are.
//!
//! Scoped state is thread-local and guard-based throughout: entering a scope
//! returns a value whose `Drop` restores the previous state, so an early
//! return or panic inside the scope cannot leak it.

#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod engine;
pub mod offload;
pub mod tags;

pub use config::{CACHE_MODE_ENV_VAR, CacheMode};
pub use context::{ExecMode, ModeGuard, eager_execution, execution_mode, lazy_execution};
pub use engine::{Engine, Evaluated, RunOutcome};
pub use offload::{ArtifactStore, MemArtifactStore, OffloadClient, OffloadService};
pub use tags::{TagScopeGuard, attach_tag, isolated_tag_scope, tag_value, tags_for};
