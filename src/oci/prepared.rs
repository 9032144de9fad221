use std::io::Read;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::conversion::coerce_param;
use crate::error::SqlMiddlewareDbError;
use crate::native::{BindValue, CommitMode, NativeConnection, NativeStatement};
use crate::rewrite::{append_lob_returning, is_manip, modify_query};
use crate::types::{DataType, RowValues};

use super::connection::OciConnection;
use super::error_map::translate;
use super::executor::{QueryOutcome, statement_error};
use super::lob::{LobBinding, LobSource, ParamValue, SharedReader, release_all, stream_all};

#[derive(Debug)]
struct ParamSlot {
    name: String,
    ty: Option<DataType>,
    value: ParamValue,
}

/// A statement parsed once and executed any number of times.
///
/// Large-object parameters are not bound inline: the statement returns a
/// writable descriptor per large object, and each source is streamed into
/// its descriptor in `lob_buffer_length` chunks after execution.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use sql_middleware_oci::prelude::*;
///
/// fn store_doc(
///     conn: &mut OciConnection,
///     id: i64,
///     body: &[u8],
/// ) -> Result<usize, SqlMiddlewareDbError> {
///     let mut stmt = conn.prepare(
///         "INSERT INTO docs (id, body) VALUES (:id, EMPTY_BLOB())",
///         &[("id", DataType::Integer), ("body", DataType::Blob)],
///     )?;
///     stmt.bind_value("id", RowValues::Int(id));
///     stmt.bind_stream("body", Arc::new(Mutex::new(std::io::Cursor::new(body.to_vec()))));
///     let affected = stmt.execute(conn)?.affected_rows().unwrap_or(0);
///     stmt.free();
///     Ok(affected)
/// }
/// # let _ = store_doc;
/// ```
pub struct OciStatement {
    native: Option<Box<dyn NativeStatement>>,
    session: Weak<()>,
    query: String,
    prepared_query: String,
    is_manip: bool,
    slots: Vec<ParamSlot>,
    result_types: Option<Vec<DataType>>,
    row_limit: usize,
    row_offset: usize,
    freed: bool,
}

impl OciConnection {
    /// Parse `query` once for repeated execution.
    ///
    /// `params` declares the named placeholders and their types. Large-object
    /// parameters get a `RETURNING ... INTO` clause appended. The pending
    /// limit and offset set by [`set_limit`](Self::set_limit) move to the statement.
    ///
    /// # Errors
    /// Returns connect failures, or `ExecutionError` when the statement cannot be created.
    pub fn prepare(
        &mut self,
        query: &str,
        params: &[(&str, DataType)],
    ) -> Result<OciStatement, SqlMiddlewareDbError> {
        let declared: Vec<(String, DataType)> = params
            .iter()
            .map(|(name, ty)| ((*name).to_owned(), *ty))
            .collect();
        let with_returning = append_lob_returning(query, &declared);
        let prepared_query = modify_query(&with_returning).into_owned();
        debug!(query = %prepared_query, "preparing");
        let (row_limit, row_offset) = self.take_limit();

        let native = if self.options.disable_query {
            None
        } else {
            self.connect()?;
            let statement = self
                .native_mut()?
                .parse(&prepared_query)
                .map_err(|err| statement_error(&err))?;
            Some(statement)
        };

        Ok(OciStatement {
            native,
            session: self.session_link(),
            query: query.to_owned(),
            prepared_query,
            is_manip: is_manip(query),
            slots: declared
                .into_iter()
                .map(|(name, ty)| ParamSlot {
                    name,
                    ty: Some(ty),
                    value: ParamValue::Null,
                })
                .collect(),
            result_types: None,
            row_limit,
            row_offset,
            freed: false,
        })
    }
}

impl OciStatement {
    /// Query text as given to `prepare`.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Query text as sent to the server.
    #[must_use]
    pub fn prepared_query(&self) -> &str {
        &self.prepared_query
    }

    #[must_use]
    pub fn is_manip(&self) -> bool {
        self.is_manip
    }

    fn slot_mut(&mut self, name: &str) -> &mut ParamSlot {
        let name = name.trim_start_matches(':');
        if let Some(idx) = self.slots.iter().position(|slot| slot.name == name) {
            return &mut self.slots[idx];
        }
        self.slots.push(ParamSlot {
            name: name.to_owned(),
            ty: None,
            value: ParamValue::Null,
        });
        let last = self.slots.len() - 1;
        &mut self.slots[last]
    }

    /// Bind a value to `name`. Undeclared names bind untyped.
    ///
    /// For large-object parameters a text value of the form `file://<path>`
    /// is read from that file; any other value is the object's content.
    pub fn bind_value(&mut self, name: &str, value: RowValues) {
        self.slot_mut(name).value = match value {
            RowValues::Null => ParamValue::Null,
            value => ParamValue::Value(value),
        };
    }

    /// Bind an open stream to a large-object parameter. The stream is left open.
    pub fn bind_stream(&mut self, name: &str, stream: SharedReader) {
        self.slot_mut(name).value = ParamValue::Stream(stream);
    }

    /// Convenience for [`bind_stream`](Self::bind_stream) with an owned reader.
    pub fn bind_reader<R: Read + Send + 'static>(&mut self, name: &str, reader: R) {
        self.bind_stream(name, Arc::new(Mutex::new(reader)));
    }

    pub fn bind_null(&mut self, name: &str) {
        self.slot_mut(name).value = ParamValue::Null;
    }

    /// Declared types of the result columns, applied to fetched rows.
    pub fn set_result_types(&mut self, types: Vec<DataType>) {
        self.result_types = Some(types);
    }

    fn freed_error(op: &str) -> SqlMiddlewareDbError {
        SqlMiddlewareDbError::AlreadyFreed(format!("{op}: statement has already been freed"))
    }

    fn ensure_owned_by(&self, conn: &OciConnection, op: &str) -> Result<(), SqlMiddlewareDbError> {
        if self.freed || self.session.strong_count() == 0 {
            return Err(Self::freed_error(op));
        }
        if !Weak::ptr_eq(&self.session, &conn.session_link()) {
            return Err(SqlMiddlewareDbError::ExecutionError(format!(
                "{op}: statement was prepared on another session"
            )));
        }
        Ok(())
    }

    /// Bind every parameter, execute, then stream large objects.
    ///
    /// Descriptors are released and sources opened for this execution are
    /// closed whether or not the execution succeeded. Under autocommit the
    /// large-object transaction is committed (or rolled back on failure)
    /// here; in explicit mode the execution counts as a pending write.
    ///
    /// # Errors
    /// Returns `AlreadyFreed` after [`free`](Self::free) or once the session
    /// closed, and otherwise the first failure of binding, execution,
    /// streaming or the large-object commit.
    pub fn execute(
        &mut self,
        conn: &mut OciConnection,
    ) -> Result<QueryOutcome, SqlMiddlewareDbError> {
        self.ensure_owned_by(conn, "execute")?;
        conn.last_query = Some(self.prepared_query.clone());
        debug!(query = %self.prepared_query, "executing prepared statement");
        if conn.options.disable_query {
            return Ok(if self.is_manip {
                QueryOutcome::Affected(0)
            } else {
                QueryOutcome::Empty
            });
        }
        conn.connect()?;
        self.ensure_owned_by(conn, "execute")?;

        let auto_commit = conn.auto_commit;
        let chunk = conn.options.lob_buffer_length.max(1);
        let statement = match &mut self.native {
            Some(statement) => statement.as_mut(),
            // prepared while queries were disabled
            native @ None => {
                debug!(query = %self.prepared_query, "parsing deferred statement");
                let parsed = conn
                    .native_mut()?
                    .parse(&self.prepared_query)
                    .map_err(|err| statement_error(&err))?;
                native.insert(parsed).as_mut()
            }
        };
        let session = conn.native_mut()?;

        let mut lobs = Vec::new();
        let mut outcome = bind_params(statement, session, &self.slots, &mut lobs);
        let has_lobs = !lobs.is_empty();
        let mut executed = false;
        if outcome.is_ok() {
            let mode = if has_lobs {
                CommitMode::Deferred
            } else {
                CommitMode::for_auto_commit(auto_commit)
            };
            outcome = statement
                .execute(mode)
                .map_err(|err| translate(&err, Some("execute")));
            executed = outcome.is_ok();
        }
        if executed {
            outcome = stream_all(&mut lobs, chunk);
        }
        if executed && has_lobs && auto_commit {
            let finished = if outcome.is_ok() {
                session.commit().map_err(|err| translate(&err, Some("commit")))
            } else {
                session
                    .rollback()
                    .map_err(|err| translate(&err, Some("rollback")))
            };
            if let Err(err) = finished {
                if outcome.is_ok() {
                    outcome = Err(err);
                } else {
                    warn!(error = %err, "rollback after failed large-object write");
                }
            }
        }
        release_all(lobs);

        if executed && !auto_commit && (self.is_manip || has_lobs) {
            conn.uncommitted += 1;
        }
        outcome?;

        if self.is_manip {
            return Ok(QueryOutcome::Affected(statement.row_count()));
        }
        let cursor = statement
            .take_cursor()
            .map_err(|err| translate(&err, Some("execute")))?;
        Ok(QueryOutcome::Rows(conn.wrap_cursor(
            cursor,
            self.result_types.clone(),
            self.row_limit,
            self.row_offset,
        )))
    }

    /// Release the statement handle. Best effort; freeing twice is a no-op.
    pub fn free(&mut self) {
        self.freed = true;
        if let Some(mut native) = self.native.take()
            && self.session.strong_count() > 0
        {
            native.free();
        }
    }

    #[must_use]
    pub fn is_freed(&self) -> bool {
        self.freed
    }
}

fn bind_params(
    statement: &mut dyn NativeStatement,
    session: &mut dyn NativeConnection,
    slots: &[ParamSlot],
    lobs: &mut Vec<LobBinding>,
) -> Result<(), SqlMiddlewareDbError> {
    for slot in slots {
        let lob_kind = slot.ty.and_then(DataType::lob_kind);
        let bound = match (&slot.value, lob_kind) {
            (ParamValue::Null, _) => statement.bind_by_name(&slot.name, BindValue::Null),
            (value, Some(kind)) => {
                let source = LobSource::open(value)?;
                let descriptor = session.new_lob_descriptor(kind).map_err(|_| {
                    SqlMiddlewareDbError::ExecutionError(format!(
                        "Unable to create descriptor for LOB in parameter: {}",
                        slot.name
                    ))
                })?;
                let bound =
                    statement.bind_by_name(&slot.name, BindValue::Lob(descriptor.as_ref(), kind));
                lobs.push(LobBinding {
                    name: slot.name.clone(),
                    kind,
                    descriptor,
                    source,
                });
                bound
            }
            (ParamValue::Value(value), None) => {
                let coerced = coerce_param(value, slot.ty)?;
                statement.bind_by_name(&slot.name, BindValue::Scalar(&coerced))
            }
            (ParamValue::Stream(_), None) => {
                return Err(SqlMiddlewareDbError::ParameterError(format!(
                    "parameter {} takes a stream but is not declared as a large object",
                    slot.name
                )));
            }
        };
        bound.map_err(|err| translate(&err, Some("bind")))?;
    }
    Ok(())
}

impl std::fmt::Debug for OciStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciStatement")
            .field("prepared_query", &self.prepared_query)
            .field("params", &self.slots)
            .field("freed", &self.freed)
            .finish_non_exhaustive()
    }
}

impl Drop for OciStatement {
    fn drop(&mut self) {
        self.free();
    }
}
