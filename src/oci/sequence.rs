use tracing::debug;

use crate::error::{ErrorKind, SqlMiddlewareDbError};
use crate::types::{DataType, RowValues};

use super::connection::OciConnection;

impl OciConnection {
    /// Physical sequence name for `name`, per the `seqname_format` option.
    #[must_use]
    pub fn sequence_name(&self, name: &str) -> String {
        self.options.seqname_format.replace("%s", name)
    }

    /// # Errors
    /// Returns the error of the `CREATE SEQUENCE` statement.
    pub fn create_sequence(&mut self, name: &str) -> Result<(), SqlMiddlewareDbError> {
        let seq = self.sequence_name(name);
        self.exec(&format!("CREATE SEQUENCE {seq} START WITH 1"))?;
        debug!(sequence = %seq, "sequence created");
        Ok(())
    }

    /// Next value of sequence `name`.
    ///
    /// With `on_demand`, a missing sequence is created and the call retried once.
    ///
    /// # Errors
    /// Returns query errors, including `NoSuchTable` when the sequence is
    /// missing and `on_demand` is off.
    pub fn next_id(&mut self, name: &str, on_demand: bool) -> Result<i64, SqlMiddlewareDbError> {
        let seq = self.sequence_name(name);
        let sql = format!("SELECT {seq}.nextval FROM DUAL");
        match self.query_one_typed(&sql, DataType::Integer) {
            Err(err) if on_demand && err.kind() == ErrorKind::NoSuchTable => {
                debug!(sequence = %seq, "creating missing sequence on demand");
                self.create_sequence(name)?;
                self.next_id(name, false)
            }
            result => sequence_value(result?, &seq),
        }
    }

    /// Value most recently returned by [`next_id`](Self::next_id) in this session.
    ///
    /// # Errors
    /// Returns query errors.
    pub fn curr_id(&mut self, name: &str) -> Result<i64, SqlMiddlewareDbError> {
        let seq = self.sequence_name(name);
        let sql = format!("SELECT {seq}.currval FROM DUAL");
        let value = self.query_one_typed(&sql, DataType::Integer)?;
        sequence_value(value, &seq)
    }
}

fn sequence_value(value: Option<RowValues>, seq: &str) -> Result<i64, SqlMiddlewareDbError> {
    match value {
        Some(RowValues::Int(id)) => Ok(id),
        Some(other) => Err(SqlMiddlewareDbError::ConversionError(format!(
            "sequence {seq} returned {other:?}"
        ))),
        None => Err(SqlMiddlewareDbError::ExecutionError(format!(
            "sequence {seq} returned no value"
        ))),
    }
}
