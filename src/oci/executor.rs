use tracing::{debug, warn};

use crate::error::SqlMiddlewareDbError;
use crate::native::{CommitMode, NativeConnection, NativeCursor};
use crate::results::ResultSet;
use crate::rewrite::{is_manip, modify_query};
use crate::types::{DataType, FetchMode, RowValues};

use super::connection::OciConnection;
use super::cursor::{Buffered, CursorCore, CursorSettings, QueryCursor, ResultCursor, Streaming};
use super::error_map::translate;

/// What a single native execution produced.
pub(crate) enum RawOutcome {
    Affected(usize),
    Rows(Box<dyn NativeCursor>),
    /// Queries are disabled; nothing reached the server.
    Disabled,
}

/// Result of [`OciConnection::query`].
#[derive(Debug)]
pub enum QueryOutcome {
    /// Rows touched by a manipulation.
    Affected(usize),
    Rows(QueryCursor),
    /// A row-producing query skipped because queries are disabled.
    Empty,
}

impl QueryOutcome {
    /// The cursor, if the query produced one.
    #[must_use]
    pub fn into_cursor(self) -> Option<QueryCursor> {
        match self {
            QueryOutcome::Rows(cursor) => Some(cursor),
            _ => None,
        }
    }

    #[must_use]
    pub fn affected_rows(&self) -> Option<usize> {
        match self {
            QueryOutcome::Affected(n) => Some(*n),
            _ => None,
        }
    }
}

pub(crate) fn statement_error(err: &crate::native::NativeError) -> SqlMiddlewareDbError {
    SqlMiddlewareDbError::ExecutionError(format!("Could not create statement: {err}"))
}

fn run_statement(
    native: &mut dyn NativeConnection,
    sql: &str,
    is_manip: bool,
    mode: CommitMode,
) -> Result<RawOutcome, SqlMiddlewareDbError> {
    let mut statement = native.parse(sql).map_err(|err| statement_error(&err))?;
    let outcome = match statement.execute(mode) {
        Err(err) => Err(translate(&err, Some("execute"))),
        Ok(()) if is_manip => Ok(RawOutcome::Affected(statement.row_count())),
        Ok(()) => statement
            .take_cursor()
            .map(RawOutcome::Rows)
            .map_err(|err| translate(&err, Some("execute"))),
    };
    statement.free();
    outcome
}

impl OciConnection {
    /// Send an already rewritten query through the open session.
    pub(crate) fn do_query(
        &mut self,
        query: &str,
        is_manip: bool,
    ) -> Result<RawOutcome, SqlMiddlewareDbError> {
        self.last_query = Some(query.to_owned());
        debug!(query, is_manip, "executing");
        if self.options.disable_query {
            return Ok(if is_manip {
                RawOutcome::Affected(0)
            } else {
                RawOutcome::Disabled
            });
        }
        let auto_commit = self.auto_commit;
        let native = self.native_mut()?;
        let mode = CommitMode::for_auto_commit(auto_commit);
        let outcome = run_statement(native, query, is_manip, mode)?;
        if is_manip && !auto_commit {
            self.uncommitted += 1;
        }
        Ok(outcome)
    }

    /// Apply `limit` and `offset` (0 means unset) to the next query or prepared statement.
    pub fn set_limit(&mut self, limit: usize, offset: usize) {
        self.row_limit = limit;
        self.row_offset = offset;
    }

    pub(crate) fn take_limit(&mut self) -> (usize, usize) {
        (
            std::mem::take(&mut self.row_limit),
            std::mem::take(&mut self.row_offset),
        )
    }

    pub(crate) fn wrap_cursor(
        &self,
        native: Box<dyn NativeCursor>,
        types: Option<Vec<DataType>>,
        limit: usize,
        offset: usize,
    ) -> QueryCursor {
        let settings = CursorSettings {
            portability: self.options.portability,
            fetch_mode: self.options.fetch_mode,
            types,
            limit,
            offset,
        };
        let core = CursorCore::new(native, self.session_link(), settings);
        if self.options.result_buffering {
            QueryCursor::Buffered(ResultCursor::<Buffered>::new(core))
        } else {
            QueryCursor::Streaming(ResultCursor::<Streaming>::new(core))
        }
    }

    /// Run a query, connecting first if needed.
    ///
    /// Table-less selects are pointed at `dual`. Row-producing queries come
    /// back as a cursor carrying the limit and offset set by
    /// [`set_limit`](Self::set_limit).
    ///
    /// # Errors
    /// Returns connect failures, statement creation failures, and the
    /// translated native error of a failed execution.
    pub fn query(&mut self, sql: &str) -> Result<QueryOutcome, SqlMiddlewareDbError> {
        self.query_with_types(sql, None)
    }

    /// [`query`](Self::query) with declared result column types.
    ///
    /// # Errors
    /// Same as [`query`](Self::query).
    pub fn query_with_types(
        &mut self,
        sql: &str,
        types: Option<&[DataType]>,
    ) -> Result<QueryOutcome, SqlMiddlewareDbError> {
        let manip = is_manip(sql);
        let (limit, offset) = self.take_limit();
        let rewritten = modify_query(sql);
        if !self.options.disable_query {
            self.connect()?;
        }
        let outcome = match self.do_query(&rewritten, manip)? {
            RawOutcome::Affected(n) => QueryOutcome::Affected(n),
            RawOutcome::Disabled => QueryOutcome::Empty,
            RawOutcome::Rows(native) => QueryOutcome::Rows(self.wrap_cursor(
                native,
                types.map(<[DataType]>::to_vec),
                limit,
                offset,
            )),
        };
        Ok(outcome)
    }

    /// Run a statement for its side effects and return the affected-row count.
    ///
    /// # Errors
    /// Same as [`query`](Self::query).
    pub fn exec(&mut self, sql: &str) -> Result<usize, SqlMiddlewareDbError> {
        match self.query(sql)? {
            QueryOutcome::Affected(n) => Ok(n),
            QueryOutcome::Empty => Ok(0),
            QueryOutcome::Rows(mut cursor) => {
                cursor.free()?;
                Ok(0)
            }
        }
    }

    /// First column of the first row, or `None` when no row comes back.
    ///
    /// # Errors
    /// Same as [`query`](Self::query), plus fetch failures.
    pub fn query_one(&mut self, sql: &str) -> Result<Option<RowValues>, SqlMiddlewareDbError> {
        self.first_value(sql, None)
    }

    /// [`query_one`](Self::query_one) converting the value to `ty`.
    ///
    /// # Errors
    /// Same as [`query_one`](Self::query_one), plus conversion failures.
    pub fn query_one_typed(
        &mut self,
        sql: &str,
        ty: DataType,
    ) -> Result<Option<RowValues>, SqlMiddlewareDbError> {
        self.first_value(sql, Some(std::slice::from_ref(&ty)))
    }

    fn first_value(
        &mut self,
        sql: &str,
        types: Option<&[DataType]>,
    ) -> Result<Option<RowValues>, SqlMiddlewareDbError> {
        let Some(mut cursor) = self.query_with_types(sql, types)?.into_cursor() else {
            return Ok(None);
        };
        let row = cursor.fetch_row(Some(FetchMode::Ordered), None)?;
        cursor.free()?;
        Ok(row.and_then(|row| row.values().into_iter().next()))
    }

    /// Run a query and materialize every row.
    ///
    /// # Errors
    /// Same as [`query`](Self::query), plus fetch failures.
    pub fn query_all(&mut self, sql: &str) -> Result<ResultSet, SqlMiddlewareDbError> {
        match self.query(sql)? {
            QueryOutcome::Affected(n) => Ok(ResultSet::affected(n)),
            QueryOutcome::Empty => Ok(ResultSet::default()),
            QueryOutcome::Rows(cursor) => cursor.into_result_set(),
        }
    }

    /// Run one statement on a separate session opened with the DBA credentials.
    ///
    /// The pending limit and offset apply to this statement and are then
    /// cleared. The separate session is always closed, and this session's
    /// transaction state is not touched.
    ///
    /// # Errors
    /// Returns `ConfigError` when no DBA credentials are configured, and
    /// otherwise the connect or query error of the separate session.
    pub fn standalone_query(&mut self, sql: &str) -> Result<ResultSet, SqlMiddlewareDbError> {
        let (Some(username), Some(password)) = (
            self.options.dba_username.clone(),
            self.options.dba_password.clone(),
        ) else {
            return Err(SqlMiddlewareDbError::ConfigError(
                "standalone query requires dba_username and dba_password".into(),
            ));
        };
        let (limit, offset) = self.take_limit();
        let mut standalone = self.standalone_connect(username, password)?;
        standalone.set_limit(limit, offset);
        let result = standalone.query_all(sql);
        self.last_query = standalone.last_query.take();
        if let Err(err) = standalone.close() {
            warn!(error = %err, "closing standalone session failed");
        }
        result
    }
}
