use either::Either;

use crate::{
    QueryResult, Result, Row,
    error::Error,
    logger::{NopQueryLogger, QueryLog, QueryLogger},
    sqlite::{
        Arguments,
        connection::{ConnectionHandle, ConnectionState, ExecTracer, RowTracer},
        cursor::InQueryGuard,
        statement::{CompoundStatement, StatementHandle},
    },
    statement_cache::ExplainMode,
};

pub struct ExecuteIter<'a> {
    handle: &'a mut ConnectionHandle,
    statement: &'a mut CompoundStatement,
    logger: Box<dyn QueryLog + 'a>,
    args: Option<Arguments>,
    exec_tracer: Option<&'a mut ExecTracer>,
    row_tracer: Option<&'a mut RowTracer>,
    query: &'a str,

    /// since a `VirtualStatement` can encompass multiple actual statements,
    /// this keeps track of the number of arguments so far
    args_used: usize,

    goto_next: bool,

    _in_query: InQueryGuard,
}

pub(crate) fn iter<'a>(
    conn: &'a mut ConnectionState,
    query: &'a str,
    args: Option<Arguments>,
    explain: ExplainMode,
) -> Result<ExecuteIter<'a>> {
    conn.check_not_forked()?;
    let in_query = InQueryGuard::enter()?;

    // fetch the cached statement or allocate a new one
    let statement = conn.statements.get(query, explain)?;

    let logger: Box<dyn QueryLog + 'a> = if conn.log_settings.is_enabled() {
        Box::new(QueryLogger::new(query, conn.log_settings.clone()))
    } else {
        Box::new(NopQueryLogger)
    };

    Ok(ExecuteIter {
        handle: &mut conn.handle,
        statement,
        logger,
        args,
        exec_tracer: conn.exec_tracer.as_mut(),
        row_tracer: conn.row_tracer.as_mut(),
        query,
        args_used: 0,
        goto_next: true,
        _in_query: in_query,
    })
}

fn bind(
    statement: &mut StatementHandle,
    arguments: &Option<Arguments>,
    offset: usize,
) -> Result<usize> {
    let mut n = 0;

    if let Some(arguments) = arguments {
        n = arguments.bind(statement, offset)?;
    }

    Ok(n)
}

impl Iterator for ExecuteIter<'_> {
    type Item = Result<Either<QueryResult, Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let statement = if self.goto_next {
                let statement = match self.statement.prepare_next(self.handle) {
                    Ok(Some(statement)) => statement,
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e)),
                };

                self.goto_next = false;

                if let Some(tracer) = self.exec_tracer.as_mut()
                    && !tracer(self.query)
                {
                    return Some(Err(Error::TraceAbort));
                }

                // sanity check: ensure the VM is reset and the bindings are cleared
                if let Err(e) = statement.handle.reset() {
                    return Some(Err(e.into()));
                }

                statement.handle.clear_bindings();

                match bind(statement.handle, &self.args, self.args_used) {
                    Ok(args_used) => self.args_used += args_used,
                    Err(e) => return Some(Err(e)),
                }

                statement
            } else {
                self.statement.current()?
            };

            match statement.handle.step() {
                Ok(true) => {
                    let row = match Row::current(
                        statement.handle,
                        statement.columns,
                        statement.column_names,
                    ) {
                        Ok(row) => row,
                        Err(e) => return Some(Err(e)),
                    };

                    if let Some(tracer) = self.row_tracer.as_mut()
                        && !tracer(&row)
                    {
                        // the row tracer asked to skip this row; continue stepping
                        continue;
                    }

                    self.logger.inc_rows_returned();

                    return Some(Ok(Either::Right(row)));
                }
                Ok(false) => {
                    let last_insert_rowid = self.handle.last_insert_rowid();

                    let changes = statement.handle.changes();
                    self.logger.inc_rows_affected(changes);

                    let done = QueryResult {
                        changes,
                        last_insert_rowid,
                    };

                    self.goto_next = true;

                    return Some(Ok(Either::Left(done)));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl Drop for ExecuteIter<'_> {
    fn drop(&mut self) {
        self.statement.reset().ok();
    }
}
