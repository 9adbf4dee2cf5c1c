//! Public `Connection` methods that register host callbacks against the
//! hook registries living inside `ConnectionState`. Every method here is a
//! thin `worker.call()` closure: the actual bookkeeping lives in
//! `sqlite::hooks`, grounded one module per engine seat.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::row::Row;
use crate::sqlite::Value;
use crate::sqlite::hooks::{AuthDecision, Aggregate, RowChange, TraceEvent, WindowAggregate};

use super::Connection;

/// Generates ids for multiplexed hook registrations (trace, progress) so a
/// caller can later unregister a specific callback without disturbing the
/// others sharing the one engine seat.
static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

fn next_hook_id() -> u64 {
    NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed)
}

impl Connection {
    /// Register a trace callback, returning an id that can later be passed
    /// to [`Connection::untrace`]. `mask` is the bitwise-or of the
    /// `SQLITE_TRACE_*` event kinds the callback wants to observe.
    pub async fn trace<F>(&self, mask: u32, callback: F) -> Result<u64>
    where
        F: Fn(TraceEvent) + Send + Sync + 'static,
    {
        let id = next_hook_id();
        let callback: Arc<dyn Fn(TraceEvent) + Send + Sync> = Arc::new(callback);
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.trace.register(db, Some(id), mask as _, callback);
            })
            .await?;
        Ok(id)
    }

    /// Remove a previously registered trace callback.
    pub async fn untrace(&self, id: u64) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.trace.unregister(db, id);
            })
            .await
    }

    /// Register a progress callback invoked roughly every `n_steps` VM
    /// instructions. Returning `true` asks the engine to interrupt the
    /// running statement. Returns an id for [`Connection::unprogress`].
    pub async fn progress_handler<F>(&self, n_steps: i32, callback: F) -> Result<u64>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let id = next_hook_id();
        let callback: Arc<dyn Fn() -> bool + Send + Sync> = Arc::new(callback);
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks
                    .progress
                    .register(db, Some(id), n_steps, callback);
            })
            .await?;
        Ok(id)
    }

    /// Remove a previously registered progress callback.
    pub async fn unprogress(&self, id: u64) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.progress.unregister(db, id);
            })
            .await
    }

    /// Install (or clear, with `None`) the commit hook. Returning `Ok(true)`
    /// from the callback aborts the commit, turning it into a rollback; an
    /// `Err` does the same, and is additionally reported as unraisable.
    pub async fn commit_hook(
        &self,
        callback: Option<Box<dyn FnMut() -> std::result::Result<bool, String> + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.commit.set(db, callback);
            })
            .await
    }

    /// Install (or clear) the rollback hook. The engine gives a rollback
    /// hook no way to abort the rollback already underway, so an `Err`
    /// return is only reported as unraisable.
    pub async fn rollback_hook(
        &self,
        callback: Option<Box<dyn FnMut() -> std::result::Result<(), String> + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.rollback.set(db, callback);
            })
            .await
    }

    /// Install (or clear) the update hook, notified of every row-level
    /// insert/update/delete. As with the rollback hook, an `Err` return is
    /// only reported as unraisable.
    pub async fn update_hook(
        &self,
        callback: Option<
            Box<dyn FnMut(RowChange, &str, &str, i64) -> std::result::Result<(), String> + Send>,
        >,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.update.set(db, callback);
            })
            .await
    }

    /// Install (or clear) the WAL commit hook. An `Err` return aborts the
    /// checkpoint decision and is reported as unraisable.
    pub async fn wal_hook(
        &self,
        callback: Option<Box<dyn FnMut(&str, i32) -> std::result::Result<i32, String> + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.wal.set(db, callback);
            })
            .await
    }

    /// Install (or clear) a custom busy handler, replacing any
    /// `busy_timeout` previously configured via [`crate::ConnectOptions`].
    pub async fn busy_handler(
        &self,
        callback: Option<Box<dyn FnMut(i32) -> bool + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.busy.set(db, callback)
            })
            .await?
    }

    /// Install (or clear) the authorizer callback vetting every action taken
    /// while preparing a statement.
    pub async fn set_authorizer(
        &self,
        callback: Option<
            Box<
                dyn FnMut(
                        i32,
                        Option<&str>,
                        Option<&str>,
                        Option<&str>,
                        Option<&str>,
                    ) -> std::result::Result<AuthDecision, String>
                    + Send,
            >,
        >,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.authorizer.set(db, callback)
            })
            .await?
    }

    /// Install (or clear) the auto-vacuum incremental-truncation hook.
    pub async fn autovacuum_pages(
        &self,
        callback: Option<Box<dyn FnMut(&str, u32, u32, u32) -> u32 + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.autovacuum_pages.set(db, callback)
            })
            .await?
    }

    /// Install (or clear) the `sqlite3_collation_needed` seat, letting the
    /// host register a collation lazily the first time a query needs it.
    pub async fn collation_needed(
        &self,
        callback: Option<Box<dyn Fn(*mut libsqlite3_sys::sqlite3, &str) + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                conn.hooks.collation_needed.set(db, callback)
            })
            .await?
    }

    /// Register a named collating sequence.
    pub async fn register_collation<F>(&self, name: &str, compare: F) -> Result<()>
    where
        F: Fn(&[u8], &[u8]) -> std::cmp::Ordering + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                crate::sqlite::hooks::collation::register_collation(db, &name, compare)
            })
            .await?
    }

    /// Register a scalar SQL function. `n_arg` of `-1` accepts any number of
    /// arguments.
    pub async fn create_scalar_function<F>(
        &self,
        name: &str,
        n_arg: i32,
        func: F,
    ) -> Result<()>
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                crate::sqlite::hooks::function::register_scalar(db, &name, n_arg, func)
            })
            .await?
    }

    /// Register an aggregate SQL function from a per-invocation state
    /// factory.
    pub async fn create_aggregate_function<A, F>(
        &self,
        name: &str,
        n_arg: i32,
        factory: F,
    ) -> Result<()>
    where
        A: Aggregate + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                crate::sqlite::hooks::function::register_aggregate(db, &name, n_arg, factory)
            })
            .await?
    }

    /// Register a window SQL function (also usable as a plain aggregate).
    pub async fn create_window_function<A, F>(
        &self,
        name: &str,
        n_arg: i32,
        factory: F,
    ) -> Result<()>
    where
        A: WindowAggregate + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let name = name.to_string();
        self.worker
            .call(move |conn| {
                let db = conn.handle.as_ptr();
                crate::sqlite::hooks::function::register_window(db, &name, n_arg, factory)
            })
            .await?
    }

    /// Interrupt any statement currently executing on this connection.
    /// Safe to call concurrently with the worker thread; `sqlite3_interrupt`
    /// is documented as callable from any thread.
    pub async fn interrupt(&self) -> Result<()> {
        self.worker
            .call(|conn| {
                crate::sqlite::ffi::interrupt(conn.handle.as_ptr());
            })
            .await
    }

    /// Returns `true` if an interrupt is currently pending on this
    /// connection's handle.
    pub async fn is_interrupted(&self) -> Result<bool> {
        self.worker
            .call(|conn| crate::sqlite::ffi::is_interrupted(conn.handle.as_ptr()))
            .await
    }

    /// Name of the VFS the `main` database was opened through, via
    /// `SQLITE_FCNTL_VFSNAME`.
    pub async fn vfs_name(&self) -> Result<Option<String>> {
        self.worker
            .call(|conn| {
                let db = conn.handle.as_ptr();
                crate::sqlite::ffi::vfs_name(db, c"main".as_ptr())
            })
            .await
    }

    /// Data-version counter for the `main` schema, via
    /// `SQLITE_FCNTL_DATA_VERSION`. Bumped whenever another connection
    /// commits a change visible to this one; cheap to poll for cache
    /// invalidation without re-running a query.
    pub async fn data_version(&self) -> Result<Option<u32>> {
        self.worker
            .call(|conn| {
                let db = conn.handle.as_ptr();
                crate::sqlite::ffi::data_version(db, c"main".as_ptr())
            })
            .await
    }

    /// Install (or clear, with `None`) the exec tracer: called once per
    /// sub-statement before it begins stepping, with the original query
    /// text. Returning `false` aborts the statement with
    /// [`crate::Error::TraceAbort`].
    pub async fn set_exec_trace(
        &self,
        callback: Option<Box<dyn FnMut(&str) -> bool + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                conn.exec_tracer = callback;
            })
            .await
    }

    /// Install (or clear, with `None`) the row tracer: called once per
    /// fetched row before it is handed back to the caller. Returning
    /// `false` skips the row.
    pub async fn set_row_trace(
        &self,
        callback: Option<Box<dyn FnMut(&Row) -> bool + Send>>,
    ) -> Result<()> {
        self.worker
            .call(move |conn| {
                conn.row_tracer = callback;
            })
            .await
    }

    /// Open an incremental BLOB handle onto a single column/row.
    pub async fn blob_open(
        &mut self,
        db_name: &str,
        table: &str,
        column: &str,
        rowid: i64,
        writable: bool,
    ) -> Result<crate::sqlite::Blob<'_>> {
        crate::sqlite::Blob::open(self, db_name, table, column, rowid, writable).await
    }
}
