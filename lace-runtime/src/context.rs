//! Scoped execution-mode control.
//!
//! Whether a graph node runs immediately or is deferred is decided by the
//! innermost active mode scope on the current thread. Scopes nest: entering
//! one pushes onto a thread-local stack and the returned guard pops it again
//! when dropped, so the surrounding mode is restored even when the scope is
//! exited by an early return or a panic.
//!
//! ```
//! use lace_runtime::{execution_mode, lazy_execution, eager_execution, ExecMode};
//!
//! assert_eq!(execution_mode(), ExecMode::Eager);
//! {
//!     let _lazy = lazy_execution();
//!     assert_eq!(execution_mode(), ExecMode::Lazy);
//!     {
//!         let _eager = eager_execution();
//!         assert_eq!(execution_mode(), ExecMode::Eager);
//!     }
//!     assert_eq!(execution_mode(), ExecMode::Lazy);
//! }
//! assert_eq!(execution_mode(), ExecMode::Eager);
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;

/// How [`Engine::run_or_defer`](crate::Engine::run_or_defer) treats a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Evaluate the node now and return its result.
    #[default]
    Eager,
    /// Leave the node unevaluated and hand it back to the caller.
    Lazy,
}

thread_local! {
    static MODE_STACK: RefCell<Vec<ExecMode>> = const { RefCell::new(Vec::new()) };
}

/// The mode of the innermost active scope on this thread.
///
/// Consulted at call time, never captured: a node built while one mode is
/// active still follows whatever scope is innermost when it is actually
/// dispatched. Defaults to [`ExecMode::Eager`] outside any scope.
pub fn execution_mode() -> ExecMode {
    MODE_STACK.with(|stack| stack.borrow().last().copied().unwrap_or_default())
}

/// Enter an eager scope; the previous mode is restored when the guard drops.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub fn eager_execution() -> ModeGuard {
    ModeGuard::enter(ExecMode::Eager)
}

/// Enter a lazy scope; the previous mode is restored when the guard drops.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub fn lazy_execution() -> ModeGuard {
    ModeGuard::enter(ExecMode::Lazy)
}

/// RAII handle for one entry on the thread-local mode stack.
///
/// Not `Send`: the guard must drop on the thread whose stack it pushed onto.
pub struct ModeGuard {
    _not_send: PhantomData<*const ()>,
}

impl ModeGuard {
    fn enter(mode: ExecMode) -> Self {
        MODE_STACK.with(|stack| stack.borrow_mut().push(mode));
        tracing::trace!(?mode, "entered execution-mode scope");
        ModeGuard {
            _not_send: PhantomData,
        }
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        MODE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        tracing::trace!("left execution-mode scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_eager() {
        assert_eq!(execution_mode(), ExecMode::Eager);
    }

    #[test]
    fn test_scopes_nest_and_restore() {
        let _lazy = lazy_execution();
        assert_eq!(execution_mode(), ExecMode::Lazy);
        {
            let _eager = eager_execution();
            assert_eq!(execution_mode(), ExecMode::Eager);
            {
                let _inner = lazy_execution();
                assert_eq!(execution_mode(), ExecMode::Lazy);
            }
            assert_eq!(execution_mode(), ExecMode::Eager);
        }
        assert_eq!(execution_mode(), ExecMode::Lazy);
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let _outer = lazy_execution();
        let result = std::panic::catch_unwind(|| {
            let _eager = eager_execution();
            assert_eq!(execution_mode(), ExecMode::Eager);
            panic!("scope body failed");
        });
        assert!(result.is_err());
        assert_eq!(execution_mode(), ExecMode::Lazy);
    }

    #[test]
    fn test_mode_is_per_thread() {
        let _lazy = lazy_execution();
        let other = std::thread::spawn(execution_mode).join().unwrap();
        assert_eq!(other, ExecMode::Eager);
        assert_eq!(execution_mode(), ExecMode::Lazy);
    }
}
