//! Database models

use serde::{Deserialize, Serialize};

/// A single glucose value at a point in time
///
/// The epoch timestamp is the natural unique key: the remote source and the
/// store both treat it as deduplication identity, not merely ordering. A
/// later occurrence of an already-stored timestamp is a value correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Glucose concentration in mmol/L (> 0)
    pub value: f64,
    /// Reading time in seconds since epoch (UTC)
    pub timestamp: i64,
}

/// A persisted observation with its store-assigned surrogate id
///
/// The id is assigned on insert and stable for the lifetime of the row.
/// Only `value` is ever mutated (by upsert-on-conflict).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GlucoseReading {
    pub id: i64,
    pub value: f64,
    pub timestamp: i64,
}

impl GlucoseReading {
    /// The observation carried by this row
    pub fn observation(&self) -> Observation {
        Observation {
            value: self.value,
            timestamp: self.timestamp,
        }
    }
}

/// Sort order for timestamp-ordered queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// SQL keyword for this order
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}
