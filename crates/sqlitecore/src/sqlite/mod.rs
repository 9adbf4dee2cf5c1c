pub use arguments::Arguments;
pub use blob::Blob;
pub use connection::Connection;
pub use cursor::Shape;
pub use error::SqliteError;
pub use hooks::{
    Aggregate, AuthDecision, RowChange, TRACE_CLOSE, TRACE_PROFILE, TRACE_ROW, TRACE_STMT,
    TraceEvent, WindowAggregate,
};
pub use statement::{Prepared, Statement};
pub use type_info::SqliteDataType;
pub use value::Value;

/// Argument parsing and binding.
mod arguments;
/// Incremental BLOB I/O, independent of the statement cache and VM.
mod blob;
/// SQLite connection handling.
mod connection;
/// Least-structured result-set aggregation (`Connection::get`).
pub mod cursor;
/// SQLite error types and helpers.
pub mod error;
/// Raw FFI bindings.
mod ffi;
/// Trace/progress multiplexing and single-seat commit/rollback/update/WAL hooks.
pub(crate) mod hooks;
/// Bounded backoff around the engine's per-connection mutex.
pub(crate) mod mutex_gate;
/// Prepared statement types and helpers.
pub mod statement;
/// SQLite type information utilities.
mod type_info;
/// SQLite value container and accessors.
pub mod value;

/// Default number of times [`unlock_notify::wait`] is allowed to retry when a
/// statement is reset due to `SQLITE_LOCKED`.
///
/// [`ConnectionHandle::exec`] and [`StatementHandle::step`] use this constant to
/// limit how many unlock notification attempts will be made before returning
/// [`Error::UnlockNotify`].
pub const DEFAULT_MAX_RETRIES: usize = 5;
