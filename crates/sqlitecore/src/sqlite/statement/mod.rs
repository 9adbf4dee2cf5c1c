use std::collections::HashMap;
use std::sync::Arc;

use crate::{Result, Row, column::Column, from_row, query, sqlite::Arguments};

/// Compound statement handling.
mod compound;
/// Low-level statement handle wrapper.
mod handle;
/// Unlock notify helpers.
pub(super) mod unlock_notify;

pub use compound::CompoundStatement;
pub use handle::StatementHandle;

/// An explicitly prepared statement.
///
/// Statements are prepared and cached by default, per connection. This type allows you to
/// look at that cache in-between the statement being prepared and it being executed. This contains
/// the expected columns to be returned and the expected parameter types (if available).
///
/// Statements can be re-used with any connection and on first-use it will be re-prepared and
/// cached within the connection.
#[derive(Debug, Clone)]
#[allow(clippy::rc_buffer)]
pub struct Statement {
    /// SQL string for the prepared statement.
    pub(crate) sql: String,
    /// Columns produced by the first sub-statement (of a compound statement)
    /// that returns any. Empty for statements that produce no rows.
    pub(crate) columns: Arc<Vec<Column>>,
    /// Column name lookup table matching `columns`.
    pub(crate) column_names: Arc<HashMap<Arc<str>, usize>>,
    /// Total number of bind parameters across every sub-statement.
    pub(crate) bindings_count: usize,
    /// Names of every named bind parameter, across every sub-statement.
    pub(crate) bindings_names: Vec<String>,
}

impl Statement {
    /// Return the SQL string for this statement.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Return the columns this statement is expected to yield, if any.
    pub(crate) fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Total number of bind parameters across every sub-statement.
    pub fn bindings_count(&self) -> usize {
        self.bindings_count
    }

    /// Names of every named bind parameter (`:name`, `@name`, `$name`, or
    /// numbered `?NNN`), across every sub-statement.
    pub fn bindings_names(&self) -> &[String] {
        &self.bindings_names
    }
}

/// A prepared statement without exposed metadata.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Prepared statement with metadata.
    pub(crate) statement: Statement,
}

impl Prepared {
    /// Return the SQL string for this statement.
    pub fn sql(&self) -> &str {
        self.statement.sql()
    }

    /// Total number of bind parameters across every sub-statement.
    pub fn bindings_count(&self) -> usize {
        self.statement.bindings_count()
    }

    /// Names of every named bind parameter across every sub-statement.
    pub fn bindings_names(&self) -> &[String] {
        self.statement.bindings_names()
    }

    /// Create a query from this prepared statement.
    pub fn query(&self) -> query::Query {
        query::query_statement(&self.statement)
    }

    /// Create a query from this prepared statement with arguments.
    pub fn query_with(&self, arguments: Arguments) -> query::Query {
        query::query_statement_with(&self.statement, arguments)
    }

    /// Create a typed query from this prepared statement.
    pub fn query_as<O>(&self) -> query::Map<impl FnMut(Row) -> Result<O> + Send>
    where
        O: for<'r> from_row::FromRow<'r> + Send + Unpin,
    {
        query::query_statement_as(&self.statement)
    }

    /// Create a typed query from this prepared statement with arguments.
    pub fn query_as_with<'s, O>(
        &'s self,
        arguments: Arguments,
    ) -> query::Map<impl FnMut(Row) -> Result<O> + Send>
    where
        O: for<'r> from_row::FromRow<'r> + Send + Unpin,
    {
        query::query_statement_as_with(&self.statement, arguments)
    }

    /// Create a scalar query from this prepared statement.
    pub fn query_scalar<O>(&self) -> query::Map<impl FnMut(Row) -> Result<O> + Send>
    where
        (O,): for<'r> from_row::FromRow<'r>,
        O: Send + Unpin,
    {
        query::query_statement_scalar(&self.statement)
    }

    /// Create a scalar query from this prepared statement with arguments.
    pub fn query_scalar_with<'s, O>(
        &'s self,
        arguments: Arguments,
    ) -> query::Map<impl FnMut(Row) -> Result<O> + Send>
    where
        (O,): for<'r> from_row::FromRow<'r>,
        O: Send + Unpin,
    {
        query::query_statement_scalar_with(&self.statement, arguments)
    }
}
