use serde_json::{Map, Value as JsonValue};

use super::row::CustomDbRow;
use crate::types::RowValues;

/// One row handed back by a cursor, shaped by the requested [`FetchMode`](crate::types::FetchMode).
#[derive(Debug, Clone)]
pub enum FetchedRow {
    Ordered(Vec<RowValues>),
    Mapped(CustomDbRow),
    Record(Map<String, JsonValue>),
}

impl FetchedRow {
    /// Values in column order. Records yield their JSON values in key order.
    #[must_use]
    pub fn values(&self) -> Vec<RowValues> {
        match self {
            FetchedRow::Ordered(values) => values.clone(),
            FetchedRow::Mapped(row) => row.rows.clone(),
            FetchedRow::Record(map) => map
                .values()
                .map(|v| RowValues::JSON(v.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn as_ordered(&self) -> Option<&[RowValues]> {
        match self {
            FetchedRow::Ordered(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mapped(&self) -> Option<&CustomDbRow> {
        match self {
            FetchedRow::Mapped(row) => Some(row),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Map<String, JsonValue>> {
        match self {
            FetchedRow::Record(map) => Some(map),
            _ => None,
        }
    }
}
