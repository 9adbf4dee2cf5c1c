use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use tokio::sync::Mutex;
use tokio::sync::oneshot;

use either::Either;

use crate::{
    QueryResult, Row,
    error::{Error, Result},
    sqlite::{
        Arguments, Statement,
        connection::{ConnectionState, establish::EstablishParams, execute},
        mutex_gate,
    },
    statement_cache::ExplainMode,
    transaction::{
        begin_ansi_transaction_sql, commit_ansi_transaction_sql, rollback_ansi_transaction_sql,
    },
};

// Two dispatch modes share one connection: the default spawns a dedicated
// thread that owns the handle for its whole life and serializes every call
// through a channel (`Threaded`), realizing the optional worker-thread mode.
// `ConnectOptions::asynchronous(false)` instead makes the caller's own thread
// the owner and routes every call straight through the mutex gate with no
// worker at all (`Direct`), realizing the primary mode of parallel threads
// contending for the connection under a bounded-backoff lock.
pub(crate) enum ConnectionWorker {
    Threaded(ThreadedWorker),
    Direct(DirectWorker),
}

pub(crate) struct WorkerSharedState {
    pub(crate) cached_statements_size: AtomicUsize,
    pub(crate) conn: Mutex<ConnectionState>,
    closed: AtomicBool,
    /// See the comment in `ThreadedWorker::establish` on why a completed
    /// commit/rollback sometimes needs to suppress the next drop-triggered
    /// rollback. `Direct` mode never sets this: every call there returns its
    /// result directly to the awaiting caller, so there is no unacknowledged
    /// completion for a later drop to race against.
    ignore_next_start_rollback: AtomicBool,
}

impl WorkerSharedState {
    fn new(conn: ConnectionState) -> Self {
        Self {
            cached_statements_size: AtomicUsize::new(0),
            conn: Mutex::new(conn),
            closed: AtomicBool::new(false),
            ignore_next_start_rollback: AtomicBool::new(false),
        }
    }
}

enum BoxedCall {
    Prepare {
        query: Box<str>,
        tx: oneshot::Sender<Result<Statement>>,
    },
    Execute {
        query: Box<str>,
        arguments: Option<Arguments>,
        explain: ExplainMode,
        tx: flume::Sender<Result<Either<QueryResult, Row>>>,
    },
    Begin {
        tx: rendezvous_oneshot::Sender<Result<()>>,
    },
    Commit {
        tx: rendezvous_oneshot::Sender<Result<()>>,
    },
    Rollback {
        tx: Option<rendezvous_oneshot::Sender<Result<()>>>,
    },
    /// A generic call into `ConnectionState`, boxed up by the caller. This is
    /// the escape hatch every hook-registration, introspection, and
    /// cursor/blob operation that does not warrant its own variant routes
    /// through: the closure runs on the worker thread with exclusive access
    /// to the connection, same as every other variant.
    Access(Box<dyn FnOnce(&mut ConnectionState) + Send>),
    Shutdown {
        tx: oneshot::Sender<Result<()>>,
    },
}

impl ConnectionWorker {
    pub(crate) async fn establish(params: EstablishParams) -> Result<Self> {
        if params.asynchronous {
            Ok(Self::Threaded(ThreadedWorker::establish(params).await?))
        } else {
            Ok(Self::Direct(DirectWorker::establish(params)?))
        }
    }

    pub(crate) fn shared(&self) -> &Arc<WorkerSharedState> {
        match self {
            Self::Threaded(w) => &w.shared,
            Self::Direct(w) => &w.shared,
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shared().closed.load(Ordering::Acquire)
    }

    pub(crate) async fn prepare(&self, query: &str) -> Result<Statement> {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }
        match self {
            Self::Threaded(w) => w.prepare(query).await,
            Self::Direct(w) => w.prepare(query).await,
        }
    }

    /// We take an owned string here - we immediatley copy it into the command anyway.
    pub(crate) async fn execute(
        &self,
        query: String,
        args: Option<Arguments>,
        explain: ExplainMode,
        chan_size: usize,
    ) -> Result<flume::Receiver<Result<Either<QueryResult, Row>>>> {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }
        match self {
            Self::Threaded(w) => w.execute(query, args, explain, chan_size).await,
            Self::Direct(w) => w.execute(query, args, explain).await,
        }
    }

    pub(crate) async fn begin(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }
        match self {
            Self::Threaded(w) => w.begin().await,
            Self::Direct(w) => w.begin().await,
        }
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }
        match self {
            Self::Threaded(w) => w.commit().await,
            Self::Direct(w) => w.commit().await,
        }
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }
        match self {
            Self::Threaded(w) => w.rollback().await,
            Self::Direct(w) => w.rollback().await,
        }
    }

    pub(crate) fn start_rollback(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }
        match self {
            Self::Threaded(w) => w.start_rollback(),
            Self::Direct(w) => w.start_rollback(),
        }
    }

    #[cfg(test)]
    pub(crate) async fn clear_cache(&self) -> Result<()> {
        self.call(|conn| conn.statements.clear()).await?;
        self.shared()
            .cached_statements_size
            .store(0, Ordering::Release);
        Ok(())
    }

    /// Run an arbitrary closure against `ConnectionState`, whichever mode
    /// owns it, and return its result. Used for hook registration,
    /// savepoints, introspection, and anything else that does not warrant
    /// its own `BoxedCall` variant.
    pub(crate) async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConnectionState) -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }
        match self {
            Self::Threaded(w) => w.call(f).await,
            Self::Direct(w) => w.call(f).await,
        }
    }

    /// Send a command to the worker to shut down the processing thread, or
    /// (in `Direct` mode) close the handle directly on the caller's own task.
    ///
    /// A `WorkerCrashed` error may be returned if the thread has already stopped.
    pub(crate) fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        match self {
            Self::Threaded(w) => w.shutdown(),
            Self::Direct(w) => w.shutdown(),
        }
    }
}

// Each SQLite connection has a dedicated thread. It's possible to create a worker pool for this,
// but given typical application usage patterns for SQLite, the simplicity of a single-threaded
// worker is preferred.
pub(crate) struct ThreadedWorker {
    command_tx: flume::Sender<BoxedCall>,
    /// Mutex for locking access to the database.
    pub(crate) shared: Arc<WorkerSharedState>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl ThreadedWorker {
    async fn establish(params: EstablishParams) -> Result<Self> {
        let (establish_tx, establish_rx) = oneshot::channel();

        let join_handle = thread::Builder::new()
            .name(params.thread_name.clone())
            .spawn(move || {
                let (command_tx, command_rx) = flume::bounded(params.command_channel_size);

                let conn = match params.establish() {
                    Ok(conn) => conn,
                    Err(e) => {
                        establish_tx.send(Err(e)).ok();
                        return;
                    }
                };

                let shared = Arc::new(WorkerSharedState::new(conn));
                let mut conn = match shared.conn.try_lock() {
                    Ok(lock) => lock,
                    Err(e) => {
                        establish_tx.send(Err(e.into())).ok();
                        return;
                    }
                };

                if establish_tx
                    .send(Ok((command_tx, Arc::clone(&shared))))
                    .is_err()
                {
                    return;
                }

                mutex_gate::run_as_worker(move || {
                    for cmd in command_rx {
                        match cmd {
                            BoxedCall::Prepare { query, tx } => {
                                tx.send(prepare(&mut conn, &query).inspect(|_prepared| {
                                    update_cached_statements_size(
                                        &conn,
                                        &shared.cached_statements_size,
                                    );
                                }))
                                .ok();
                            }
                            BoxedCall::Execute {
                                query,
                                arguments,
                                explain,
                                tx,
                            } => {
                                let iter =
                                    match execute::iter(&mut conn, &query, arguments, explain) {
                                        Ok(iter) => iter,
                                        Err(e) => {
                                            tx.send(Err(e)).ok();
                                            continue;
                                        }
                                    };

                                for res in iter {
                                    if tx.send(res).is_err() {
                                        break;
                                    }
                                }

                                update_cached_statements_size(
                                    &conn,
                                    &shared.cached_statements_size,
                                );
                            }
                            BoxedCall::Begin { tx } => {
                                let depth = conn.transaction_depth;
                                let res = do_begin(&mut conn);
                                let res_ok = res.is_ok();

                                if tx.blocking_send(res).is_err() && res_ok {
                                    // The BEGIN was processed but not acknowledged. This means no
                                    // `Transaction` was created and so there is no way to commit /
                                    // rollback this transaction. We need to roll it back
                                    // immediately otherwise it would remain started forever.
                                    if let Err(error) = conn
                                        .handle
                                        .exec(rollback_ansi_transaction_sql(depth + 1))
                                        .map(|_| {
                                            conn.transaction_depth -= 1;
                                        })
                                    {
                                        // The rollback failed. To prevent leaving the connection
                                        // in an inconsistent state we shutdown this worker which
                                        // causes any subsequent operation on the connection to fail.
                                        tracing::error!(%error, "failed to rollback cancelled transaction");
                                        break;
                                    }
                                }
                            }
                            BoxedCall::Commit { tx } => {
                                let res = do_commit(&mut conn);
                                let res_ok = res.is_ok();

                                if tx.blocking_send(res).is_err() && res_ok {
                                    // The COMMIT was processed but not acknowledged. This means that
                                    // the `Transaction` doesn't know it was committed and will try to
                                    // rollback on drop. We need to ignore that rollback.
                                    shared
                                        .ignore_next_start_rollback
                                        .store(true, Ordering::Relaxed);
                                }
                            }
                            BoxedCall::Rollback { tx } => {
                                if tx.is_none()
                                    && shared
                                        .ignore_next_start_rollback
                                        .swap(false, Ordering::Relaxed)
                                {
                                    continue;
                                }

                                let res = do_rollback(&mut conn);

                                match tx {
                                    Some(tx) => {
                                        let res_ok = res.is_ok();
                                        if tx.blocking_send(res).is_err() && res_ok {
                                            // The ROLLBACK was processed but not acknowledged. This
                                            // means that the `Transaction` doesn't know it was rolled
                                            // back and will try to rollback again on drop. We need to
                                            // ignore that rollback.
                                            shared
                                                .ignore_next_start_rollback
                                                .store(true, Ordering::Relaxed);
                                        }
                                    }
                                    None => {
                                        // Fire-and-forget rollback from a dropped `Transaction`:
                                        // there is no channel to report failure on, so it is
                                        // reported as unraisable instead.
                                        if let Err(error) = res {
                                            tracing::error!(
                                                %error,
                                                "rollback on transaction drop failed"
                                            );
                                        }
                                    }
                                }
                            }
                            BoxedCall::Access(f) => {
                                f(&mut conn);
                            }
                            BoxedCall::Shutdown { tx } => {
                                conn.statements.clear();
                                let res = conn.handle.close();
                                shared.closed.store(true, Ordering::Release);

                                // drop the connection references before sending confirmation
                                // and ending the command loop
                                drop(conn);
                                drop(shared);
                                let _ = tx.send(res);
                                return;
                            }
                        }
                    }
                })
            })?;

        let (command_tx, shared) = establish_rx.await.map_err(|_| Error::WorkerCrashed)??;

        Ok(Self {
            command_tx,
            shared,
            join_handle: Some(join_handle),
        })
    }

    async fn prepare(&self, query: &str) -> Result<Statement> {
        self.oneshot_cmd(|tx| BoxedCall::Prepare {
            query: query.into(),
            tx,
        })
        .await?
    }

    async fn execute(
        &self,
        query: String,
        args: Option<Arguments>,
        explain: ExplainMode,
        chan_size: usize,
    ) -> Result<flume::Receiver<Result<Either<QueryResult, Row>>>> {
        let (tx, rx) = flume::bounded(chan_size);

        self.command_tx
            .send_async(BoxedCall::Execute {
                query: query.into(),
                arguments: args,
                explain,
                tx,
            })
            .await
            .map_err(|_| Error::WorkerCrashed)?;

        Ok(rx)
    }

    async fn begin(&self) -> Result<()> {
        self.oneshot_cmd_with_ack(|tx| BoxedCall::Begin { tx })
            .await?
    }

    async fn commit(&self) -> Result<()> {
        self.oneshot_cmd_with_ack(|tx| BoxedCall::Commit { tx })
            .await?
    }

    async fn rollback(&self) -> Result<()> {
        self.oneshot_cmd_with_ack(|tx| BoxedCall::Rollback { tx: Some(tx) })
            .await?
    }

    fn start_rollback(&self) -> Result<()> {
        self.command_tx
            .send(BoxedCall::Rollback { tx: None })
            .map_err(|_| Error::WorkerCrashed)
    }

    async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConnectionState) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let call = Box::new(move |conn: &mut ConnectionState| {
            let _ = tx.send(f(conn));
        });

        self.command_tx
            .send_async(BoxedCall::Access(call))
            .await
            .map_err(|_| Error::WorkerCrashed)?;

        rx.await.map_err(|_| Error::WorkerCrashed)
    }

    async fn oneshot_cmd<F, T>(&self, command: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> BoxedCall,
    {
        let (tx, rx) = oneshot::channel();

        self.command_tx
            .send_async(command(tx))
            .await
            .map_err(|_| Error::WorkerCrashed)?;

        rx.await.map_err(|_| Error::WorkerCrashed)
    }

    async fn oneshot_cmd_with_ack<F, T>(&self, command: F) -> Result<T>
    where
        F: FnOnce(rendezvous_oneshot::Sender<T>) -> BoxedCall,
    {
        let (tx, rx) = rendezvous_oneshot::channel();

        self.command_tx
            .send_async(command(tx))
            .await
            .map_err(|_| Error::WorkerCrashed)?;

        rx.recv().await.map_err(|_| Error::WorkerCrashed)
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let join_handle = self.join_handle.take();
        let (tx, rx) = oneshot::channel();

        let send_res = self
            .command_tx
            .send(BoxedCall::Shutdown { tx })
            .map_err(|_| Error::WorkerCrashed);

        Box::pin(async move {
            if let Err(e) = send_res {
                if let Some(handle) = join_handle {
                    let _ = handle.join();
                }
                return Err(e);
            }

            // wait for the response
            let res = rx.await.map_err(|_| Error::WorkerCrashed)?;
            res?;

            if let Some(handle) = join_handle {
                handle.join().map_err(|_| Error::WorkerCrashed)?;
            }

            Ok(())
        })
    }
}

/// The owning thread talks straight to the connection through the mutex
/// gate, with no dedicated worker and no channel. Used when
/// `ConnectOptions::asynchronous(false)`, so that many caller threads can
/// contend for one connection the way `sqlite3_mutex_enter` contention is
/// meant to be handled: bounded backoff, not a single serializing owner.
pub(crate) struct DirectWorker {
    pub(crate) shared: Arc<WorkerSharedState>,
}

impl DirectWorker {
    fn establish(params: EstablishParams) -> Result<Self> {
        let conn = params.establish()?;
        Ok(Self {
            shared: Arc::new(WorkerSharedState::new(conn)),
        })
    }

    async fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, ConnectionState>> {
        mutex_gate::acquire_async(|| self.shared.conn.try_lock().ok()).await
    }

    async fn prepare(&self, query: &str) -> Result<Statement> {
        let mut conn = self.lock().await?;
        let result = prepare(&mut conn, query);
        if result.is_ok() {
            update_cached_statements_size(&conn, &self.shared.cached_statements_size);
        }
        result
    }

    async fn execute(
        &self,
        query: String,
        args: Option<Arguments>,
        explain: ExplainMode,
    ) -> Result<flume::Receiver<Result<Either<QueryResult, Row>>>> {
        let mut conn = self.lock().await?;
        let (tx, rx) = flume::unbounded();

        // There is no worker loop to stream rows through one at a time, so
        // the whole result set is drained here while the gate is held; the
        // receiver still presents the familiar streaming interface to callers.
        let iter = execute::iter(&mut conn, &query, args, explain)?;
        for res in iter {
            if tx.send(res).is_err() {
                break;
            }
        }

        update_cached_statements_size(&conn, &self.shared.cached_statements_size);
        Ok(rx)
    }

    async fn begin(&self) -> Result<()> {
        let mut conn = self.lock().await?;
        do_begin(&mut conn)
    }

    async fn commit(&self) -> Result<()> {
        let mut conn = self.lock().await?;
        do_commit(&mut conn)
    }

    async fn rollback(&self) -> Result<()> {
        let mut conn = self.lock().await?;
        do_rollback(&mut conn)
    }

    fn start_rollback(&self) -> Result<()> {
        let mut conn = mutex_gate::acquire_blocking(|| self.shared.conn.try_lock().ok())?;
        if let Err(error) = do_rollback(&mut conn) {
            tracing::error!(%error, "rollback on transaction drop failed");
        }
        Ok(())
    }

    async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConnectionState) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.lock().await?;
        Ok(f(&mut conn))
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut conn = self.lock().await?;
            conn.statements.clear();
            let res = conn.handle.close();
            self.shared.closed.store(true, Ordering::Release);
            res
        })
    }
}

fn do_begin(conn: &mut ConnectionState) -> Result<()> {
    let depth = conn.transaction_depth;
    conn.handle.exec(begin_ansi_transaction_sql(depth)).map(|_| {
        conn.transaction_depth += 1;
    })
}

fn do_commit(conn: &mut ConnectionState) -> Result<()> {
    let depth = conn.transaction_depth;
    if depth > 0 {
        conn.handle.exec(commit_ansi_transaction_sql(depth)).map(|_| {
            conn.transaction_depth -= 1;
        })
    } else {
        Ok(())
    }
}

fn do_rollback(conn: &mut ConnectionState) -> Result<()> {
    let depth = conn.transaction_depth;
    if depth > 0 {
        conn.handle.exec(rollback_ansi_transaction_sql(depth)).map(|_| {
            conn.transaction_depth -= 1;
        })
    } else {
        Ok(())
    }
}

fn prepare(conn: &mut ConnectionState, query: &str) -> Result<Statement> {
    conn.check_not_forked()?;

    // prepare statement object (or checkout from cache)
    let statement = conn.statements.get(query, ExplainMode::None)?;

    let mut columns = None;
    let mut column_names = None;

    while let Some(statement) = statement.prepare_next(&mut conn.handle)? {
        // the first non-empty statement is chosen as the statement we pull columns from
        if !statement.columns.is_empty() && columns.is_none() {
            columns = Some(Arc::clone(statement.columns));
            column_names = Some(Arc::clone(statement.column_names));
        }
    }

    let bindings_count = statement.total_bind_parameters();
    let bindings_names = statement.bind_parameter_names();

    Ok(Statement {
        sql: query.to_string(),
        columns: columns.unwrap_or_default(),
        column_names: column_names.unwrap_or_default(),
        bindings_count,
        bindings_names,
    })
}

fn update_cached_statements_size(conn: &ConnectionState, size: &AtomicUsize) {
    size.store(conn.statements.len(), Ordering::Release);
}

// A oneshot channel where send completes only after the receiver receives the value.
mod rendezvous_oneshot {
    use super::oneshot;

    #[derive(Debug)]
    pub struct Canceled;

    pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
        let (inner_tx, inner_rx) = oneshot::channel();
        (Sender { inner: inner_tx }, Receiver { inner: inner_rx })
    }

    pub struct Sender<T> {
        inner: oneshot::Sender<(T, oneshot::Sender<()>)>,
    }

    impl<T> Sender<T> {
        pub async fn send(self, value: T) -> std::result::Result<(), Canceled> {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.inner.send((value, ack_tx)).map_err(|_| Canceled)?;
            ack_rx.await.map_err(|_| Canceled)?;
            Ok(())
        }

        pub fn blocking_send(self, value: T) -> std::result::Result<(), Canceled> {
            futures_executor::block_on(self.send(value))
        }
    }

    pub struct Receiver<T> {
        inner: oneshot::Receiver<(T, oneshot::Sender<()>)>,
    }

    impl<T> Receiver<T> {
        pub async fn recv(self) -> std::result::Result<T, Canceled> {
            let (value, ack_tx) = self.inner.await.map_err(|_| Canceled)?;
            ack_tx.send(()).map_err(|_| Canceled)?;
            Ok(value)
        }
    }
}
