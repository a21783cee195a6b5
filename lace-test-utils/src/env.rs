//! Scoped environment-variable overrides for tests.
//!
//! The process environment is global, so every override holds a shared lock
//! for its lifetime; tests that use [`EnvVarGuard`] serialize against each
//! other and cannot race through `cargo test`'s parallel runner.

use std::env;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn lock_env() -> MutexGuard<'static, ()> {
    // A panicking env test poisons the lock; the env itself is still
    // restored by the guard's Drop, so later tests can proceed.
    ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sets or clears one environment variable and restores its previous state
/// on drop.
///
/// The guard holds the environment lock, so at most one can be live per
/// process; creating a second on the same thread deadlocks. Override one
/// variable at a time and let the guard drop between overrides.
pub struct EnvVarGuard {
    key: &'static str,
    prev: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    pub fn set(key: &'static str, value: &str) -> Self {
        let lock = lock_env();
        let prev = env::var(key).ok();
        // SAFETY: ENV_LOCK is held for this guard's whole lifetime, so no
        // other EnvVarGuard mutates or reads the environment concurrently.
        unsafe { env::set_var(key, value) };
        Self {
            key,
            prev,
            _lock: lock,
        }
    }

    pub fn unset(key: &'static str) -> Self {
        let lock = lock_env();
        let prev = env::var(key).ok();
        // SAFETY: as in `set`.
        unsafe { env::remove_var(key) };
        Self {
            key,
            prev,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        // SAFETY: the lock is still held until this guard is fully dropped.
        match self.prev.take() {
            Some(value) => unsafe { env::set_var(self.key, value) },
            None => unsafe { env::remove_var(self.key) },
        }
    }
}
