//! Loading and normalizing merged historical kiosk data

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::models::{validation::format_timestamp, RawEvent};

/// Offset-carrying layouts seen in kiosk exports
const OFFSET_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];

/// Layouts without an offset; read as UTC
const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// One data row of the merged CSV, columns `at, site, val, type`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricalRow {
    pub at: String,
    pub site: String,
    pub val: String,
    pub support_type: String,
}

impl HistoricalRow {
    /// Build a row from its four cells
    pub fn new(
        at: impl Into<String>,
        site: impl Into<String>,
        val: impl Into<String>,
        support_type: impl Into<String>,
    ) -> Self {
        Self {
            at: at.into(),
            site: site.into(),
            val: val.into(),
            support_type: support_type.into(),
        }
    }

    fn from_record(record: &csv::StringRecord) -> Self {
        let cell = |index: usize| record.get(index).unwrap_or_default().to_string();
        Self::new(cell(0), cell(1), cell(2), cell(3))
    }
}

/// Read the merged CSV, dropping the header row
pub fn load_kiosk_rows(path: &Path) -> Result<Vec<HistoricalRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(HistoricalRow::from_record(&record?));
    }

    info!(path = %path.display(), rows = rows.len(), "Kiosk data successfully acquired");
    Ok(rows)
}

/// Turn a CSV row into the same raw shape a kiosk message decodes to
///
/// Numeric cells may have been written as floats (`1.0`); they are read
/// back as integers. An empty `type` cell means the key was absent. Cells
/// that do not parse are passed through as strings so validation rejects
/// them with a reason.
pub fn normalize_row(row: &HistoricalRow) -> RawEvent {
    let at = row.at.trim();
    let at = normalize_timestamp(at).unwrap_or_else(|| at.to_string());

    let site = row.site.trim();
    let site = match integral(site) {
        Some(site) => site.to_string(),
        None => site.to_string(),
    };

    RawEvent {
        at: Some(Value::String(at)),
        val: Some(numeric_cell(&row.val).unwrap_or(Value::Null)),
        site: Some(Value::String(site)),
        support_type: numeric_cell(&row.support_type),
    }
}

/// Re-render a timestamp in the canonical 32-character UTC layout
pub fn normalize_timestamp(at: &str) -> Option<String> {
    let parsed: Option<DateTime<Utc>> = OFFSET_LAYOUTS
        .iter()
        .find_map(|layout| DateTime::parse_from_str(at, layout).ok())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(at, layout).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        });

    parsed.map(|timestamp| format_timestamp(&timestamp))
}

fn numeric_cell(cell: &str) -> Option<Value> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    Some(match integral(cell) {
        Some(number) => Value::from(number),
        None => Value::String(cell.to_string()),
    })
}

/// Integer value of `1`, `1.0` or `-1.0`; `None` for anything else
fn integral(cell: &str) -> Option<i64> {
    if let Ok(number) = cell.parse::<i64>() {
        return Some(number);
    }

    cell.parse::<f64>()
        .ok()
        .filter(|number| number.is_finite() && number.fract() == 0.0)
        .map(|number| number as i64)
}
