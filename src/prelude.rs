//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::error::{ErrorKind, SqlMiddlewareDbError};
pub use crate::native::{CommitMode, LobKind, NativeDriver, NativeError};
pub use crate::oci::{
    BufferedCursor, ExplicitTransaction, OciConnection, OciStatement, QueryCursor, QueryOutcome,
    StreamingCursor,
};
pub use crate::options::{ConnectionParams, DriverOptions, Portability};
pub use crate::registry::{SessionDeregister, SessionRegistry};
pub use crate::results::{CustomDbRow, FetchedRow, ResultSet};
pub use crate::rewrite::{is_manip, modify_query};
pub use crate::types::{DataType, FetchMode, RowValues};
