use crate::error::SqlMiddlewareDbError;
use crate::types::RowValues;

use super::{CursorCore, ResultCursor, RowSource, private};

/// Fetched rows are kept by index.
///
/// `None` marks end of data at its index; once a slot is filled it never
/// changes, so repeated lookups past the end do not touch the native cursor.
#[derive(Debug, Default)]
pub struct Buffered {
    rows: Vec<Option<Vec<RowValues>>>,
}

impl private::Sealed for Buffered {}

impl Buffered {
    fn at_end(&self) -> bool {
        matches!(self.rows.last(), Some(None))
    }

    /// Fill up to `target` (everything when `None`) and report whether `target` holds a row.
    fn fill(
        &mut self,
        core: &mut CursorCore,
        target: Option<usize>,
    ) -> Result<bool, SqlMiddlewareDbError> {
        if let Some(target) = target
            && let Some(slot) = self.rows.get(target)
        {
            return Ok(slot.is_some());
        }
        if !self.at_end() {
            while target.is_none_or(|target| self.rows.len() <= target) {
                if !core.skip_limit_offset()? {
                    self.rows.push(None);
                    break;
                }
                match core.pull_row()? {
                    Some(row) => self.rows.push(Some(row)),
                    None => {
                        self.rows.push(None);
                        break;
                    }
                }
            }
        }
        Ok(target.is_some_and(|target| matches!(self.rows.get(target), Some(Some(_)))))
    }

    fn row_count(&self) -> usize {
        self.rows.iter().filter(|slot| slot.is_some()).count()
    }
}

impl RowSource for Buffered {
    fn next_row(
        &mut self,
        core: &mut CursorCore,
    ) -> Result<Option<Vec<RowValues>>, SqlMiddlewareDbError> {
        let target = core.position;
        if !self.fill(core, Some(target))? {
            return Ok(None);
        }
        core.position += 1;
        Ok(self.rows.get(target).cloned().flatten())
    }

    fn seek(&mut self, core: &mut CursorCore, row: usize) -> Result<(), SqlMiddlewareDbError> {
        core.position = row;
        Ok(())
    }

    fn release(&mut self) {
        self.rows = Vec::new();
    }
}

impl ResultCursor<Buffered> {
    /// Whether a row exists at the current position.
    ///
    /// # Errors
    /// Returns `AlreadyFreed` after [`free`](Self::free), and fetch failures.
    pub fn valid(&mut self) -> Result<bool, SqlMiddlewareDbError> {
        self.core.ensure_live("valid")?;
        let target = self.core.position;
        self.source.fill(&mut self.core, Some(target))
    }

    /// Number of rows after limit and offset; reads the whole result.
    ///
    /// # Errors
    /// Returns `AlreadyFreed` after [`free`](Self::free), and fetch failures.
    pub fn num_rows(&mut self) -> Result<usize, SqlMiddlewareDbError> {
        self.core.ensure_live("numRows")?;
        self.source.fill(&mut self.core, None)?;
        Ok(self.source.row_count())
    }
}
