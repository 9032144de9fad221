//! Result cursors.
//!
//! Native cursors only move forward, once. A [`ResultCursor`] wraps one and
//! emulates limit and offset on top of it; its [`RowSource`] strategy decides
//! whether rows are handed through directly ([`Streaming`]) or kept in an
//! indexed buffer that supports seeking and counting ([`Buffered`]).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::conversion::convert_result_row;
use crate::error::SqlMiddlewareDbError;
use crate::native::NativeCursor;
use crate::options::Portability;
use crate::results::{CustomDbRow, FetchedRow, ResultSet};
use crate::types::{DataType, FetchMode, RowValues};

use super::error_map::translate;

mod buffered;
mod streaming;

pub use buffered::Buffered;
pub use streaming::Streaming;

/// Cursor that hands rows through as they are fetched.
pub type StreamingCursor = ResultCursor<Streaming>;
/// Cursor that keeps fetched rows for seeking and counting.
pub type BufferedCursor = ResultCursor<Buffered>;

#[derive(Debug, Clone)]
pub(crate) struct CursorSettings {
    pub(crate) portability: Portability,
    pub(crate) fetch_mode: FetchMode,
    pub(crate) types: Option<Vec<DataType>>,
    /// 0 means unset.
    pub(crate) limit: usize,
    pub(crate) offset: usize,
}

/// State shared by both strategies: the native handle, limit and offset
/// bookkeeping, and the caller-visible row position.
pub struct CursorCore {
    native: Option<Box<dyn NativeCursor>>,
    session: Weak<()>,
    settings: CursorSettings,
    /// Index of the next row handed to the caller.
    position: usize,
    offset_skipped: usize,
    /// Rows taken from the native cursor after the offset.
    pulled: usize,
    exhausted: bool,
    columns: Option<(Arc<Vec<String>>, Arc<HashMap<String, usize>>)>,
}

impl CursorCore {
    pub(crate) fn new(
        native: Box<dyn NativeCursor>,
        session: Weak<()>,
        settings: CursorSettings,
    ) -> Self {
        Self {
            native: Some(native),
            session,
            settings,
            position: 0,
            offset_skipped: 0,
            pulled: 0,
            exhausted: false,
            columns: None,
        }
    }

    fn is_live(&self) -> bool {
        self.native.is_some() && self.session.strong_count() > 0
    }

    fn ensure_live(&self, op: &str) -> Result<(), SqlMiddlewareDbError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(SqlMiddlewareDbError::AlreadyFreed(format!(
                "{op}: resultset has already been freed"
            )))
        }
    }

    fn native_fetch(&mut self) -> Result<Option<Vec<RowValues>>, SqlMiddlewareDbError> {
        self.ensure_live("fetchRow")?;
        let Some(native) = self.native.as_deref_mut() else {
            return Ok(None);
        };
        native
            .fetch_row()
            .map_err(|err| translate(&err, Some("fetchRow")))
    }

    /// Apply limit and offset before the next native fetch.
    ///
    /// Returns `false` once the limit is reached or the source ran dry while
    /// skipping the offset.
    fn skip_limit_offset(&mut self) -> Result<bool, SqlMiddlewareDbError> {
        if self.exhausted {
            return Ok(false);
        }
        if self.settings.limit > 0 && self.pulled >= self.settings.limit {
            return Ok(false);
        }
        while self.offset_skipped < self.settings.offset {
            if self.native_fetch()?.is_none() {
                self.offset_skipped = self.settings.offset;
                self.exhausted = true;
                return Ok(false);
            }
            self.offset_skipped += 1;
        }
        Ok(true)
    }

    fn pull_row(&mut self) -> Result<Option<Vec<RowValues>>, SqlMiddlewareDbError> {
        let row = self.native_fetch()?;
        match row {
            Some(_) => self.pulled += 1,
            None => self.exhausted = true,
        }
        Ok(row)
    }

    fn columns(
        &mut self,
    ) -> Result<(Arc<Vec<String>>, Arc<HashMap<String, usize>>), SqlMiddlewareDbError> {
        if let Some((names, index)) = &self.columns {
            return Ok((Arc::clone(names), Arc::clone(index)));
        }
        self.ensure_live("getColumnNames")?;
        let Some(native) = self.native.as_deref() else {
            return Ok((Arc::default(), Arc::default()));
        };
        let names: Vec<String> = (0..native.num_cols())
            .map(|idx| {
                let name = native.column_name(idx).unwrap_or_default();
                if self.settings.portability.lowercase {
                    name.to_lowercase()
                } else {
                    name
                }
            })
            .collect();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let columns = (Arc::new(names), Arc::new(index));
        self.columns = Some(columns.clone());
        Ok(columns)
    }

    /// Declared-type conversion and trailing-whitespace trimming.
    fn convert(&self, row: Vec<RowValues>) -> Result<Vec<RowValues>, SqlMiddlewareDbError> {
        let mut row = match &self.settings.types {
            Some(types) => convert_result_row(types, row)?,
            None => row,
        };
        if self.settings.portability.rtrim {
            for value in &mut row {
                if let RowValues::Text(text) = value {
                    text.truncate(text.trim_end().len());
                }
            }
        }
        Ok(row)
    }

    fn shape(
        &mut self,
        row: Vec<RowValues>,
        mode: FetchMode,
    ) -> Result<FetchedRow, SqlMiddlewareDbError> {
        let row = self.convert(row)?;
        if mode == FetchMode::Ordered {
            return Ok(FetchedRow::Ordered(row));
        }
        let (names, index) = self.columns()?;
        let mapped = CustomDbRow::with_cache(names, index, row);
        Ok(match mode {
            FetchMode::Record => FetchedRow::Record(mapped.to_record()),
            _ => FetchedRow::Mapped(mapped),
        })
    }

    fn free(&mut self) -> Result<(), SqlMiddlewareDbError> {
        let Some(mut native) = self.native.take() else {
            return Ok(());
        };
        self.columns = None;
        if self.session.strong_count() == 0 {
            // the session already released every handle it owned
            return Ok(());
        }
        native.free().map_err(|err| translate(&err, Some("free")))
    }
}

mod private {
    pub trait Sealed {}
}

/// Strategy deciding where the next row comes from.
pub trait RowSource: Default + Send + private::Sealed {
    /// Row at the core's position, advancing the position when one is returned.
    ///
    /// # Errors
    /// Returns fetch failures.
    fn next_row(
        &mut self,
        core: &mut CursorCore,
    ) -> Result<Option<Vec<RowValues>>, SqlMiddlewareDbError>;

    /// Make `row` the next row returned.
    ///
    /// # Errors
    /// Returns fetch failures, or an error when the strategy cannot reach `row`.
    fn seek(&mut self, core: &mut CursorCore, row: usize) -> Result<(), SqlMiddlewareDbError>;

    /// Drop whatever the strategy holds.
    fn release(&mut self);
}

/// A query result over a native cursor.
///
/// Rows are numbered from 0. The cursor holds a weak link to its session
/// and reports `AlreadyFreed` once either the cursor or the session is gone.
pub struct ResultCursor<S: RowSource> {
    core: CursorCore,
    source: S,
}

impl<S: RowSource> ResultCursor<S> {
    pub(crate) fn new(core: CursorCore) -> Self {
        Self {
            core,
            source: S::default(),
        }
    }

    /// Fetch the next row, or row `row` when given.
    ///
    /// `mode` overrides the session's default fetch mode. Returns `None` at
    /// end of data.
    ///
    /// # Errors
    /// Returns `AlreadyFreed` after [`free`](Self::free), fetch failures,
    /// and conversion failures of declared result types.
    pub fn fetch_row(
        &mut self,
        mode: Option<FetchMode>,
        row: Option<usize>,
    ) -> Result<Option<FetchedRow>, SqlMiddlewareDbError> {
        self.core.ensure_live("fetchRow")?;
        if let Some(row) = row {
            self.source.seek(&mut self.core, row)?;
        }
        let mode = mode.unwrap_or(self.core.settings.fetch_mode);
        match self.source.next_row(&mut self.core)? {
            Some(values) => Ok(Some(self.core.shape(values, mode)?)),
            None => Ok(None),
        }
    }

    /// Decode the next row into `T` through its JSON record form.
    ///
    /// # Errors
    /// Same as [`fetch_row`](Self::fetch_row), plus `RecordDecode` when the
    /// record does not match `T`.
    pub fn fetch_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, SqlMiddlewareDbError> {
        let Some(row) = self.fetch_row(Some(FetchMode::Record), None)? else {
            return Ok(None);
        };
        let value = match row {
            FetchedRow::Record(map) => JsonValue::Object(map),
            other => JsonValue::Array(other.values().iter().map(RowValues::to_json).collect()),
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Make `row` the next row returned.
    ///
    /// # Errors
    /// Returns `AlreadyFreed` after [`free`](Self::free); a streaming
    /// cursor also refuses to move backward.
    pub fn seek(&mut self, row: usize) -> Result<(), SqlMiddlewareDbError> {
        self.core.ensure_live("seek")?;
        self.source.seek(&mut self.core, row)
    }

    /// Index of the next row [`fetch_row`](Self::fetch_row) returns.
    #[must_use]
    pub fn position(&self) -> usize {
        self.core.position
    }

    /// # Errors
    /// Returns `AlreadyFreed` after [`free`](Self::free).
    pub fn column_names(&mut self) -> Result<Vec<String>, SqlMiddlewareDbError> {
        self.core.ensure_live("getColumnNames")?;
        let (names, _) = self.core.columns()?;
        Ok(names.as_ref().clone())
    }

    /// # Errors
    /// Returns `AlreadyFreed` after [`free`](Self::free).
    pub fn num_cols(&self) -> Result<usize, SqlMiddlewareDbError> {
        self.core.ensure_live("numCols")?;
        Ok(self.core.native.as_deref().map_or(0, |native| native.num_cols()))
    }

    /// Release the native cursor. Freeing twice is a no-op.
    ///
    /// # Errors
    /// Returns the translated native error if the handle cannot be released.
    pub fn free(&mut self) -> Result<(), SqlMiddlewareDbError> {
        self.source.release();
        self.core.free()
    }

    #[must_use]
    pub fn is_freed(&self) -> bool {
        !self.core.is_live()
    }

    pub(crate) fn ensure_live(&self, op: &str) -> Result<(), SqlMiddlewareDbError> {
        self.core.ensure_live(op)
    }

    /// Read the remaining rows into a [`ResultSet`] and free the cursor.
    ///
    /// # Errors
    /// Same as [`fetch_row`](Self::fetch_row).
    pub fn into_result_set(mut self) -> Result<ResultSet, SqlMiddlewareDbError> {
        self.core.ensure_live("fetchRow")?;
        let (names, _) = self.core.columns()?;
        let mut result_set = ResultSet::with_capacity(16);
        result_set.set_column_names(names);
        while let Some(values) = self.source.next_row(&mut self.core)? {
            result_set.add_row_values(self.core.convert(values)?);
        }
        self.free()?;
        Ok(result_set)
    }
}

impl<S: RowSource> fmt::Debug for ResultCursor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("position", &self.core.position)
            .field("limit", &self.core.settings.limit)
            .field("offset", &self.core.settings.offset)
            .field("freed", &!self.core.is_live())
            .finish_non_exhaustive()
    }
}

impl<S: RowSource> Drop for ResultCursor<S> {
    fn drop(&mut self) {
        if let Err(err) = self.free() {
            warn!(error = %err, "freeing cursor on drop failed");
        }
    }
}

/// Cursor returned by a query; the variant follows the `result_buffering` option.
#[derive(Debug)]
pub enum QueryCursor {
    Streaming(StreamingCursor),
    Buffered(BufferedCursor),
}

impl QueryCursor {
    /// See [`ResultCursor::fetch_row`].
    ///
    /// # Errors
    /// See [`ResultCursor::fetch_row`].
    pub fn fetch_row(
        &mut self,
        mode: Option<FetchMode>,
        row: Option<usize>,
    ) -> Result<Option<FetchedRow>, SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => cursor.fetch_row(mode, row),
            QueryCursor::Buffered(cursor) => cursor.fetch_row(mode, row),
        }
    }

    /// # Errors
    /// See [`ResultCursor::fetch_record`].
    pub fn fetch_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => cursor.fetch_record(),
            QueryCursor::Buffered(cursor) => cursor.fetch_record(),
        }
    }

    /// # Errors
    /// See [`ResultCursor::seek`].
    pub fn seek(&mut self, row: usize) -> Result<(), SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => cursor.seek(row),
            QueryCursor::Buffered(cursor) => cursor.seek(row),
        }
    }

    /// Whether another row can be fetched.
    ///
    /// # Errors
    /// Streaming cursors cannot look ahead and return `Unimplemented`.
    pub fn valid(&mut self) -> Result<bool, SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => {
                cursor.ensure_live("valid")?;
                Err(SqlMiddlewareDbError::Unimplemented(
                    "valid: method not implemented for streaming cursors".into(),
                ))
            }
            QueryCursor::Buffered(cursor) => cursor.valid(),
        }
    }

    /// Number of rows the query returns, after limit and offset.
    ///
    /// # Errors
    /// Streaming cursors cannot count and return `Unimplemented`.
    pub fn num_rows(&mut self) -> Result<usize, SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => {
                cursor.ensure_live("numRows")?;
                Err(SqlMiddlewareDbError::Unimplemented(
                    "numRows: method not implemented for streaming cursors".into(),
                ))
            }
            QueryCursor::Buffered(cursor) => cursor.num_rows(),
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            QueryCursor::Streaming(cursor) => cursor.position(),
            QueryCursor::Buffered(cursor) => cursor.position(),
        }
    }

    /// # Errors
    /// See [`ResultCursor::column_names`].
    pub fn column_names(&mut self) -> Result<Vec<String>, SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => cursor.column_names(),
            QueryCursor::Buffered(cursor) => cursor.column_names(),
        }
    }

    /// # Errors
    /// See [`ResultCursor::num_cols`].
    pub fn num_cols(&self) -> Result<usize, SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => cursor.num_cols(),
            QueryCursor::Buffered(cursor) => cursor.num_cols(),
        }
    }

    /// # Errors
    /// See [`ResultCursor::free`].
    pub fn free(&mut self) -> Result<(), SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => cursor.free(),
            QueryCursor::Buffered(cursor) => cursor.free(),
        }
    }

    #[must_use]
    pub fn is_freed(&self) -> bool {
        match self {
            QueryCursor::Streaming(cursor) => cursor.is_freed(),
            QueryCursor::Buffered(cursor) => cursor.is_freed(),
        }
    }

    /// # Errors
    /// See [`ResultCursor::into_result_set`].
    pub fn into_result_set(self) -> Result<ResultSet, SqlMiddlewareDbError> {
        match self {
            QueryCursor::Streaming(cursor) => cursor.into_result_set(),
            QueryCursor::Buffered(cursor) => cursor.into_result_set(),
        }
    }

    #[must_use]
    pub fn as_buffered(&mut self) -> Option<&mut BufferedCursor> {
        match self {
            QueryCursor::Buffered(cursor) => Some(cursor),
            QueryCursor::Streaming(_) => None,
        }
    }
}
