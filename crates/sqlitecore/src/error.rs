//! Types for working with errors produced by this crate.

use std::cell::RefCell;
use std::io;
use std::num::TryFromIntError;
use std::sync::PoisonError;

use tokio::sync::TryLockError;

pub use crate::sqlite::error::{ExtendedErrCode, PrimaryErrCode};
use crate::{SqliteDataType, sqlite, sqlite::error::SqliteError};

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

thread_local! {
    /// The engine reports `errmsg` per-connection, not per-thread, so a thread attempting
    /// to read it after another thread has touched the same connection can observe a message
    /// belonging to someone else's call. We keep our own last-seen message per thread,
    /// refreshed every time [`SqliteError::new`] reads `sqlite3_errmsg`.
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record the most recently observed engine error message for the calling thread.
pub(crate) fn set_last_error(message: String) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(message));
}

/// Retrieve the last engine error message observed on the calling thread, if any.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|cell| cell.borrow().clone())
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("incompatible source data type: {0}")]
    IncompatibleDataType(SqliteDataType),
    #[error("decoding conversion error: {0}")]
    Conversion(String),
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("encoding conversion error: {0}")]
    Conversion(String),
}

impl From<TryFromIntError> for DecodeError {
    fn from(err: TryFromIntError) -> Self {
        DecodeError::Conversion(err.to_string())
    }
}

impl From<String> for DecodeError {
    fn from(err: String) -> Self {
        DecodeError::Conversion(err)
    }
}

impl From<String> for EncodeError {
    fn from(err: String) -> Self {
        EncodeError::Conversion(err)
    }
}

/// Represents all the ways a method can fail within this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error returned from the database.
    #[error(
        "error returned from database (primary: {primary:?}, extended: {extended:?}): {message}"
    )]
    Sqlite {
        primary: PrimaryErrCode,
        extended: ExtendedErrCode,
        message: String,
        /// Byte offset into the query text where the engine detected the
        /// error, when it was able to report one (`sqlite3_error_offset`).
        error_offset: Option<i32>,
    },

    /// Error communicating with the database backend.
    #[error("error communicating with database: {0}")]
    Io(#[from] io::Error),

    /// Unexpected or invalid data encountered while communicating with the database.
    ///
    /// This should indicate there is a programming error in ConnectOptions or there
    /// is something corrupted with the connection to the database itself.
    #[error("encountered unexpected or invalid data: {0}")]
    Protocol(String),

    /// No rows returned by a query that expected to return at least one row.
    #[error("no rows returned by a query that expected to return at least one row")]
    RowNotFound,

    /// Type in query doesn't exist. Likely due to typo or missing user type.
    #[error("type named {type_name} not found")]
    TypeNotFound { type_name: String },

    /// Column index was out of bounds.
    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// No column found for the given name.
    #[error("no column found for name: {0}")]
    ColumnNotFound(String),

    /// Encountered an unknown column type code.
    #[error("unknown column type: {0}")]
    UnknownColumnType(i32),

    /// Error occurred while decoding a value from a specific column.
    #[error(
        "error occurred while decoding column {column_name} at index {index} (value: {value:?}): {source}"
    )]
    ColumnDecode {
        index: String,
        column_name: String,
        value: crate::sqlite::Value,

        #[source]
        source: DecodeError,
    },

    /// Error occurred while decoding a value.
    #[error("error occurred while decoding: {0}")]
    Decode(#[source] DecodeError),

    /// Error occurred while encoding a value.
    #[error("error occurred while encoding: {0}")]
    Encode(#[source] EncodeError),

    /// A background worker has crashed.
    #[error("attempted to communicate with a crashed background worker")]
    WorkerCrashed,

    /// [`sqlite3_unlock_notify`] kept returning `SQLITE_LOCKED` even after
    /// resetting the blocking statement.
    #[error("unlock_notify failed after multiple attempts")]
    UnlockNotify,

    /// A call attempted to use a connection, cursor, or statement from a thread other than
    /// the one that is permitted to touch it (the worker thread in async-dispatch mode, or a
    /// cursor already mid-step being re-entered from a callback).
    #[error("connection or cursor used from a thread that does not own it")]
    ThreadingViolation,

    /// A cursor was closed, or the process was torn down, while a statement still had
    /// pending rows or an in-flight execute-many iteration.
    #[error("statement execution was not carried through to completion")]
    IncompleteExecution,

    /// A required bind parameter was missing from the supplied bindings.
    #[error("required bind parameter `{0}` was not supplied")]
    Bindings(String),

    /// An operation was attempted on a cursor whose statement has already run to completion.
    #[error("cursor has no more statements to execute")]
    ExecutionComplete,

    /// An exec-trace callback returned a falsey value, aborting the statement.
    #[error("exec trace callback aborted statement execution")]
    TraceAbort,

    /// Loading a SQLite extension failed.
    #[error("failed to load SQLite extension: {0}")]
    ExtensionLoading(String),

    /// A connection was dropped while dependents (cursors, blobs) were still open.
    #[error("connection dropped with open cursors or blobs still attached")]
    ConnectionNotClosed,

    /// An operation was attempted on a connection that has already been closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// An operation was attempted on a cursor that has already been closed.
    #[error("cursor is closed")]
    CursorClosed,

    /// The requested VFS facility is not implemented by this core.
    #[error("VFS facility not implemented: {0}")]
    VFSNotImplemented(String),

    /// An operation was attempted on a VFS-backed file that has already been closed.
    #[error("VFS file is closed")]
    VFSFileClosed,

    /// A connection was used from a process other than the one that opened it.
    #[error("connection used after fork")]
    ForkingViolation,

    /// The linked SQLite library was not built with FTS5 support.
    #[error("SQLite was not built with FTS5 support")]
    NoFTS5,

    /// A callback was invoked outside of the context required to service it (e.g. an
    /// aggregate step function called with no aggregate context available).
    #[error("invalid callback context")]
    InvalidContext,

    /// The connection's mutex gate exhausted its backoff schedule without
    /// acquiring exclusive access (another thread is mid-call on the same
    /// connection).
    #[error("connection is busy in another thread")]
    ConnectionBusy,
}

impl Error {
    pub fn into_sqlite_error(self) -> Option<sqlite::error::SqliteError> {
        match self {
            Error::Sqlite {
                primary,
                extended,
                message,
                error_offset,
            } => Some(sqlite::error::SqliteError {
                primary,
                extended,
                message,
                error_offset,
            }),
            _ => None,
        }
    }
}

impl From<SqliteError> for Error {
    fn from(error: SqliteError) -> Self {
        Error::Sqlite {
            primary: error.primary,
            extended: error.extended,
            message: error.message,
            error_offset: error.error_offset,
        }
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::WorkerCrashed
    }
}

impl From<TryLockError> for Error {
    fn from(_: TryLockError) -> Self {
        Error::WorkerCrashed
    }
}
