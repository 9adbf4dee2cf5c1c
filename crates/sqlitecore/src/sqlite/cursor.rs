//! The least-structured aggregate shape for a finished query, used by
//! [`crate::sqlite::Connection::get`].

use std::cell::Cell;

use crate::error::{Error, Result};
use crate::sqlite::Value;
use crate::Row;

thread_local! {
    /// Set for the duration of a single bind-and-step sequence on whichever
    /// OS thread is actually running it (the worker thread in the threaded
    /// dispatch mode, or the calling thread in direct mode).
    static IN_QUERY: Cell<bool> = const { Cell::new(false) };
}

/// Held by an in-progress statement iteration. A hook callback that runs
/// synchronously mid-step (an exec tracer, a row tracer) and tries to
/// recurse back into the same connection - rather than being handled by the
/// engine's own single-threaded access, which would otherwise deadlock or
/// silently retry into a busy error - is rejected immediately instead.
pub(crate) struct InQueryGuard(());

impl InQueryGuard {
    pub(crate) fn enter() -> Result<Self> {
        if IN_QUERY.with(Cell::get) {
            return Err(Error::ThreadingViolation);
        }
        IN_QUERY.with(|flag| flag.set(true));
        Ok(Self(()))
    }
}

impl Drop for InQueryGuard {
    fn drop(&mut self) {
        IN_QUERY.with(|flag| flag.set(false));
    }
}

/// The result of collapsing every remaining row of a query into the
/// smallest shape that still represents it: a single value if there was
/// exactly one row with one column, a single row's values if there was
/// exactly one row with more than one column, and a list of shapes
/// (recursively collapsed per-row) otherwise.
#[derive(Clone, Debug)]
pub enum Shape {
    /// No rows remained.
    Empty,
    /// Exactly one row with exactly one column.
    Scalar(Value),
    /// Exactly one row with more than one column.
    Row(Vec<Value>),
    /// More than one row; each element is that row's own collapsed shape.
    Rows(Vec<Shape>),
}

/// Collapse a single row into a [`Shape`], without considering how many
/// other rows are present.
fn collapse_row(row: &Row) -> Shape {
    let mut values = row.values().to_vec();
    match values.len() {
        0 => Shape::Empty,
        1 => Shape::Scalar(values.pop().unwrap()),
        _ => Shape::Row(values),
    }
}

/// Collapse a full result set into a [`Shape`] per the rule documented on
/// [`Shape`] itself.
pub(crate) fn collapse(rows: &[Row]) -> Shape {
    match rows {
        [] => Shape::Empty,
        [row] => collapse_row(row),
        rows => Shape::Rows(rows.iter().map(collapse_row).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::InQueryGuard;
    use crate::Error;

    #[test]
    fn reentrant_enter_on_the_same_thread_is_rejected() {
        let outer = InQueryGuard::enter().unwrap();
        let err = InQueryGuard::enter().unwrap_err();
        assert!(matches!(err, Error::ThreadingViolation));
        drop(outer);
    }

    #[test]
    fn enter_succeeds_again_once_the_prior_guard_drops() {
        let first = InQueryGuard::enter().unwrap();
        drop(first);
        assert!(InQueryGuard::enter().is_ok());
    }
}
