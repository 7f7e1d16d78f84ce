//! Execution context for calls into the backend.
//!
//! All callbacks share one process-wide lock. It is reentrant so that a deleter
//! running inside a callback (for example when the backend drops a tensor while
//! servicing a request) does not deadlock the thread that already holds it.

use parking_lot::{const_reentrant_mutex, ReentrantMutex, ReentrantMutexGuard};

static CALLBACK_CONTEXT: ReentrantMutex<()> = const_reentrant_mutex(());

/// Held for the duration of a backend call; released on drop.
#[must_use = "the execution context is released as soon as the guard is dropped"]
pub struct ContextGuard {
    _guard: ReentrantMutexGuard<'static, ()>,
}

/// Blocks until the calling thread holds the execution context.
pub fn acquire() -> ContextGuard {
    ContextGuard {
        _guard: CALLBACK_CONTEXT.lock(),
    }
}

/// Runs `f` while holding the execution context.
pub fn with_context<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = acquire();
    f()
}
