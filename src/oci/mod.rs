//! Oracle (OCI) driver core.
//!
//! [`OciConnection`] owns one native session and carries the transaction
//! bookkeeping; queries, prepared statements, sequences and cursors all
//! hang off it.

mod connection;
pub mod cursor;
pub mod error_map;
mod executor;
pub mod lob;
mod prepared;
mod sequence;
mod transaction;

pub use connection::{OciConnection, SESSION_SETUP};
pub use cursor::{BufferedCursor, QueryCursor, ResultCursor, StreamingCursor};
pub use error_map::{ErrorInfo, ErrorSource};
pub use executor::QueryOutcome;
pub use lob::{ParamValue, SharedReader};
pub use prepared::OciStatement;
pub use transaction::ExplicitTransaction;
