//! Oracle driver core for a synchronous database-abstraction layer.
//!
//! The crate maps a uniform connection, transaction, query and cursor API
//! onto a native client expressed by the traits in [`native`]:
//!
//! * [`OciConnection`] opens and reuses sessions and tracks autocommit,
//!   explicit transactions and pending writes.
//! * Queries are rewritten for the dialect ([`rewrite`]) and come back as
//!   streaming or buffered cursors with emulated limit and offset.
//! * Prepared statements stream large objects through server descriptors.
//! * Native error codes are translated into [`ErrorKind`].
//!
//! ```rust
//! use sql_middleware_oci::prelude::*;
//!
//! fn employee_names(conn: &mut OciConnection) -> Result<Vec<String>, SqlMiddlewareDbError> {
//!     conn.set_limit(10, 0);
//!     let mut names = Vec::new();
//!     let outcome = conn.query("SELECT ename FROM emp ORDER BY ename")?;
//!     if let Some(mut cursor) = outcome.into_cursor() {
//!         while let Some(row) = cursor.fetch_row(Some(FetchMode::Ordered), None)? {
//!             if let Some(name) = row.values().first().and_then(RowValues::as_text) {
//!                 names.push(name.to_owned());
//!             }
//!         }
//!     }
//!     Ok(names)
//! }
//! # let _ = employee_names;
//! ```

pub mod conversion;
pub mod error;
pub mod native;
pub mod oci;
pub mod options;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod rewrite;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ErrorKind, SqlMiddlewareDbError};
pub use oci::{
    BufferedCursor, ExplicitTransaction, OciConnection, OciStatement, QueryCursor, QueryOutcome,
    StreamingCursor,
};
pub use options::{ConnectionParams, DriverOptions, Portability};
pub use registry::{SessionDeregister, SessionRegistry};
pub use results::{CustomDbRow, FetchedRow, ResultSet};
pub use types::{DataType, FetchMode, RowValues};
