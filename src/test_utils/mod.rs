//! Test utilities: an in-memory native engine and session helpers.

use std::sync::Arc;

pub mod memory;

use crate::oci::OciConnection;
use crate::options::{ConnectionParams, DriverOptions};
use crate::results::CustomDbRow;
use crate::types::RowValues;

pub use memory::MemoryDriver;

/// Service identifier the helpers connect to.
pub const TEST_SERVICE: &str = "XE";

/// DSN for `scott/tiger` on [`TEST_SERVICE`].
#[must_use]
pub fn test_dsn() -> ConnectionParams {
    ConnectionParams::new("scott", "tiger").with_hostspec(TEST_SERVICE)
}

/// A fresh engine and an unconnected session over it.
#[must_use]
pub fn memory_session(options: DriverOptions) -> (MemoryDriver, OciConnection) {
    let engine = MemoryDriver::new();
    let conn = OciConnection::new(engine.clone().into_driver(), test_dsn(), options);
    (engine, conn)
}

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}
