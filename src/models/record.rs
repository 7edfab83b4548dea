use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One (region, date) observation.
///
/// Values are `None` while a field has no valid statistic; the missing-value
/// substitutor turns every `None` into the configured sentinel before export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub region_id: String,
    pub date: NaiveDate,
    pub values: BTreeMap<String, Option<f64>>,
    pub metadata: BTreeMap<String, String>,
}

impl SeriesRecord {
    pub fn new(region_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            region_id: region_id.into(),
            date,
            values: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: Option<f64>) {
        self.values.insert(field.into(), value);
    }

    /// Date formatted the way records are exported
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn has_missing_values(&self) -> bool {
        self.values.values().any(|v| v.is_none())
    }
}

/// The terminal flat table: date-major, region order as supplied, with a
/// fixed exported field order.
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub fields: Vec<String>,
    pub metadata_fields: Vec<String>,
    pub records: Vec<SeriesRecord>,
}

impl RecordTable {
    pub fn new(fields: Vec<String>, metadata_fields: Vec<String>) -> Self {
        Self {
            fields,
            metadata_fields,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
