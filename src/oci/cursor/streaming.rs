use crate::error::SqlMiddlewareDbError;
use crate::types::RowValues;

use super::{CursorCore, RowSource, private};

/// Rows go straight from the native cursor to the caller.
#[derive(Debug, Default)]
pub struct Streaming;

impl private::Sealed for Streaming {}

impl RowSource for Streaming {
    fn next_row(
        &mut self,
        core: &mut CursorCore,
    ) -> Result<Option<Vec<RowValues>>, SqlMiddlewareDbError> {
        if !core.skip_limit_offset()? {
            return Ok(None);
        }
        let row = core.pull_row()?;
        if row.is_some() {
            core.position += 1;
        }
        Ok(row)
    }

    /// Forward only: skipped rows are fetched and discarded.
    fn seek(&mut self, core: &mut CursorCore, row: usize) -> Result<(), SqlMiddlewareDbError> {
        if row < core.position {
            return Err(SqlMiddlewareDbError::ExecutionError(format!(
                "seek: streaming cursor is at row {} and cannot move back to row {row}",
                core.position
            )));
        }
        while core.position < row {
            if self.next_row(core)?.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn release(&mut self) {}
}
