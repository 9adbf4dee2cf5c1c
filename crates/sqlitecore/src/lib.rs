//! An async SQLite driver focused on performance, correctness, and flexibility.

/// SQLite backend implementation.
mod sqlite;
#[macro_use]
/// Macro helper for enum mode definitions.
mod enum_mode;

#[macro_use]
/// Hand-rolled `try_stream!`, avoiding a dependency on the `async-stream` crate.
mod async_stream;

/// Column metadata utilities.
mod column;
/// Debug formatting helpers.
mod debugfn;
/// Decoding support for database values.
pub mod decode;
/// Encoding support for database values.
pub mod encode;
/// Error types and result helpers.
pub mod error;
/// Query execution trait and adapters.
mod executor;
/// Row decoding support.
mod from_row;
#[macro_use]
/// Logging utilities.
mod logger;
/// Connection options and configuration.
mod connect_options;
/// Query types and helpers.
pub mod query;
/// Query execution results.
mod query_result;
/// Row representation.
mod row;
/// Prepared statement cache.
mod statement_cache;
/// Transaction handling.
mod transaction;
/// Built-in type adapters.
#[macro_use]
pub mod types;

pub use crate::{
    encode::Null,
    error::{DecodeError, EncodeError, Error, Result},
    executor::Execute,
    from_row::{AllNull, FromRow},
    connect_options::{AutoVacuum, JournalMode, LockingMode, ConnectOptions, Synchronous},
    query::{
        Query, query, query_as, query_as_with, query_scalar, query_scalar_with, query_with,
        quote_identifier,
    },
    query_result::QueryResult,
    row::Row,
    sqlite::{
        Aggregate, Arguments, AuthDecision, Blob, Connection, Prepared, RowChange, Shape,
        SqliteDataType, SqliteError, Statement, TRACE_CLOSE, TRACE_PROFILE, TRACE_ROW,
        TRACE_STMT, TraceEvent, Value, WindowAggregate,
        value::PointerDestructor,
    },
    statement_cache::ExplainMode,
    transaction::Transaction,
};
