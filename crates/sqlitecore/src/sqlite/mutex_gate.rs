//! Bounded backoff around the engine's per-connection mutex.
//!
//! SQLite's own mutex is recursive per-thread and held briefly for many small
//! operations, so contention is handled by polling rather than blocking
//! indefinitely: callers try to acquire, and on failure back off for
//! increasing intervals up to a fixed ceiling before giving up.

use std::cell::Cell;
use std::time::Duration;

use crate::error::Error;

/// Backoff schedule, in milliseconds, tried in order on repeated contention.
/// The last entry repeats once the table is exhausted, capping total wait at
/// roughly 328ms across 12 attempts.
const BACKOFF_MS: [u64; 12] = [1, 2, 5, 10, 15, 20, 25, 25, 25, 50, 50, 100];

thread_local! {
    /// Set while the current thread is a connection's dedicated worker, where
    /// contention on that connection's own gate can never happen because the
    /// worker is its sole caller. Used to fast-path `acquire_blocking` and to
    /// detect accidental reentrant acquisition from within a hook callback.
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as a connection worker for the duration of `f`.
pub(crate) fn run_as_worker<R>(f: impl FnOnce() -> R) -> R {
    ON_WORKER.with(|flag| flag.set(true));
    let result = f();
    ON_WORKER.with(|flag| flag.set(false));
    result
}

pub(crate) fn on_worker_thread() -> bool {
    ON_WORKER.with(Cell::get)
}

/// Acquires the gate from a synchronous context (the connection's own worker
/// thread), blocking the OS thread between retries. Contention here is not
/// expected in normal operation since the worker is the connection's sole
/// owner, but the same bounded schedule applies in case a hook callback
/// reenters while a statement is mid-step.
pub(crate) fn acquire_blocking<T>(mut try_acquire: impl FnMut() -> Option<T>) -> Result<T, Error> {
    if let Some(v) = try_acquire() {
        return Ok(v);
    }
    for &ms in BACKOFF_MS.iter() {
        std::thread::sleep(Duration::from_millis(ms));
        if let Some(v) = try_acquire() {
            return Ok(v);
        }
    }
    Err(Error::ConnectionBusy)
}

/// Acquires the gate from an async context (any caller not on the
/// connection's worker thread), yielding the executor thread back to the
/// runtime between retries via `tokio::time::sleep` rather than parking it.
pub(crate) async fn acquire_async<T>(mut try_acquire: impl FnMut() -> Option<T>) -> Result<T, Error> {
    if let Some(v) = try_acquire() {
        return Ok(v);
    }
    for &ms in BACKOFF_MS.iter() {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        if let Some(v) = try_acquire() {
            return Ok(v);
        }
    }
    Err(Error::ConnectionBusy)
}
