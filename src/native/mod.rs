//! Native client seam.
//!
//! The driver core only talks to the engine through these traits: a logon
//! entry point, connection handles, parsed statements with bind-by-name
//! parameters, forward-only cursors and large-object descriptors. A real
//! client library implements them once; the in-memory engine in
//! [`crate::test_utils`] implements them for tests.

use std::fmt;

use crate::types::RowValues;

/// Error state reported by a native handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORA-{:05}: {}", self.code, self.message)
    }
}

impl std::error::Error for NativeError {}

/// How the engine finishes a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Commit as soon as the statement succeeds.
    CommitOnSuccess,
    /// Leave the work pending until an explicit commit or rollback.
    Deferred,
}

impl CommitMode {
    #[must_use]
    pub fn for_auto_commit(auto_commit: bool) -> Self {
        if auto_commit {
            CommitMode::CommitOnSuccess
        } else {
            CommitMode::Deferred
        }
    }
}

/// Large-object flavor of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobKind {
    Clob,
    Blob,
}

/// Credentials and target handed to [`NativeDriver::logon`].
#[derive(Debug, Clone)]
pub struct LogonRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    /// Service identifier the session attaches to.
    pub service: &'a str,
    pub persistent: bool,
    /// Client installation directory, when configured.
    pub home: Option<&'a str>,
}

/// Value bound to a named placeholder.
pub enum BindValue<'a> {
    Null,
    Scalar(&'a RowValues),
    Lob(&'a dyn LobDescriptor, LobKind),
}

impl fmt::Debug for BindValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Null => f.write_str("Null"),
            BindValue::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            BindValue::Lob(descriptor, kind) => f
                .debug_tuple("Lob")
                .field(&descriptor.locator())
                .field(kind)
                .finish(),
        }
    }
}

/// Entry point of a native client library.
pub trait NativeDriver: Send + Sync {
    /// Open a session. Persistent sessions may be shared by the client library.
    ///
    /// # Errors
    /// Returns the client's error state when no session handle could be produced.
    fn logon(&self, request: &LogonRequest<'_>) -> Result<Box<dyn NativeConnection>, NativeError>;

    /// Process-level error state, consulted when no handle is available.
    fn last_error(&self) -> Option<NativeError>;
}

/// An open session handle.
pub trait NativeConnection: Send {
    /// Parse `sql` into a statement handle without executing it.
    ///
    /// # Errors
    /// Returns the session error state when the statement cannot be created.
    fn parse(&mut self, sql: &str) -> Result<Box<dyn NativeStatement>, NativeError>;

    /// # Errors
    /// Returns the session error state if the commit fails.
    fn commit(&mut self) -> Result<(), NativeError>;

    /// # Errors
    /// Returns the session error state if the rollback fails.
    fn rollback(&mut self) -> Result<(), NativeError>;

    /// Allocate a server-side large-object descriptor.
    ///
    /// # Errors
    /// Returns the session error state if allocation fails.
    fn new_lob_descriptor(&mut self, kind: LobKind)
    -> Result<Box<dyn LobDescriptor>, NativeError>;

    /// Error state of the session handle.
    fn last_error(&self) -> Option<NativeError>;

    /// Release the session.
    ///
    /// # Errors
    /// Returns the session error state if the logoff fails.
    fn logoff(&mut self) -> Result<(), NativeError>;
}

/// A parsed statement bound to one session.
pub trait NativeStatement: Send {
    /// Bind `value` to the `:name` placeholder.
    ///
    /// # Errors
    /// Returns the statement error state if the placeholder cannot be bound.
    fn bind_by_name(&mut self, name: &str, value: BindValue<'_>) -> Result<(), NativeError>;

    /// # Errors
    /// Returns the statement error state if execution fails.
    fn execute(&mut self, mode: CommitMode) -> Result<(), NativeError>;

    /// Rows touched by the last execution.
    fn row_count(&self) -> usize;

    /// Detach the result set produced by the last execution.
    ///
    /// # Errors
    /// Returns the statement error state when the execution produced no rows source.
    fn take_cursor(&mut self) -> Result<Box<dyn NativeCursor>, NativeError>;

    /// Release the statement handle.
    fn free(&mut self);
}

/// Forward-only, single-pass result handle.
pub trait NativeCursor: Send {
    /// Next row with NULLs preserved, or `None` at end of data.
    ///
    /// # Errors
    /// Returns the cursor error state if the fetch fails.
    fn fetch_row(&mut self) -> Result<Option<Vec<RowValues>>, NativeError>;

    fn num_cols(&self) -> usize;

    /// Name of the zero-based column `index`.
    fn column_name(&self, index: usize) -> Option<String>;

    /// # Errors
    /// Returns the cursor error state if the handle cannot be released.
    fn free(&mut self) -> Result<(), NativeError>;
}

/// Writable server-side large-object descriptor.
pub trait LobDescriptor: Send {
    /// Identity of the locator backing this descriptor.
    fn locator(&self) -> u64;

    /// Append `chunk`, returning the number of bytes written.
    ///
    /// # Errors
    /// Returns the descriptor error state if the write fails.
    fn write(&mut self, chunk: &[u8]) -> Result<usize, NativeError>;

    fn free(&mut self);
}
