//! Schema validation for kiosk events
//!
//! Validation runs in two ordered phases. The presence phase checks that
//! every required key is there and holds something; the range phase checks
//! enumerated values and the timestamp. The first failing check wins.

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::error::{ValidationError, ValidationErrorKind, ValidationResult};
use super::event::{ExhibitionEvent, RawEvent};

/// Accepted `val` values
pub const VALID_VALS: [i64; 6] = [-1, 0, 1, 2, 3, 4];

/// Accepted `site` values
pub const VALID_SITES: [&str; 6] = ["0", "1", "2", "3", "4", "5"];

/// Accepted `type` values
pub const VALID_TYPES: [i64; 2] = [0, 1];

/// Exact length of a well-formed `at` value
pub const VALID_AT_LEN: usize = 32;

/// chrono layout matching `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`
pub const AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f+00:00";

static AT_REGEX: OnceLock<Regex> = OnceLock::new();

/// Get or initialize the `at` shape pattern
fn at_regex() -> &'static Regex {
    AT_REGEX.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6}\+00:00$")
            .expect("Invalid timestamp regex pattern")
    })
}

/// Start of the operating-hours window
pub fn opening_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 45, 0).unwrap_or_default()
}

/// End of the operating-hours window
pub fn closing_time() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 15, 0).unwrap_or_default()
}

/// Validate a raw kiosk event
///
/// Range checks only run once every presence check has passed, so a
/// missing field is never also reported as out of range.
pub fn validate(raw: &RawEvent) -> ValidationResult<ExhibitionEvent> {
    check_presence(raw)?;
    check_ranges(raw)
}

/// Decode and validate a message payload
pub fn validate_payload(payload: &[u8]) -> ValidationResult<ExhibitionEvent> {
    let raw = RawEvent::from_slice(payload)?;
    validate(&raw)
}

/// Presence phase
fn check_presence(raw: &RawEvent) -> ValidationResult<()> {
    require_key(&raw.at, "at")?;
    let val = require_key(&raw.val, "val")?;

    if is_support_request(val) && raw.support_type.is_none() {
        return Err(ValidationError::with_context(
            ValidationErrorKind::MissingField,
            "type",
            "'type' is required for support instances",
        ));
    }

    let site = require_key(&raw.site, "site")?;

    require_value(val, "val")?;
    require_value(site, "site")?;

    Ok(())
}

/// Range/format phase
fn check_ranges(raw: &RawEvent) -> ValidationResult<ExhibitionEvent> {
    let val = parse_val(raw.val.as_ref())?;
    let site = parse_site(raw.site.as_ref())?;
    let support_type = match raw.support_type.as_ref() {
        Some(value) => Some(parse_support_type(value)?),
        None => None,
    };
    let timestamp = parse_at(raw.at.as_ref())?;

    let event = match (val, support_type) {
        (-1, Some(support_type)) => {
            ExhibitionEvent::support_request(timestamp, site, support_type)
        },
        (-1, None) => {
            return Err(ValidationError::with_context(
                ValidationErrorKind::MissingField,
                "type",
                "'type' is required for support instances",
            ))
        },
        (rating, declared) => ExhibitionEvent::rating(timestamp, site, rating as u8)
            .with_declared_support_type(declared),
    };

    Ok(event)
}

fn require_key<'a>(field: &'a Option<Value>, name: &str) -> ValidationResult<&'a Value> {
    field
        .as_ref()
        .ok_or_else(|| ValidationError::new(ValidationErrorKind::MissingField, name))
}

fn require_value(value: &Value, name: &str) -> ValidationResult<()> {
    if is_empty(value) {
        Err(ValidationError::new(ValidationErrorKind::EmptyField, name))
    } else {
        Ok(())
    }
}

/// A key that is present but carries nothing: `null`, `""`, `[]` or `{}`
///
/// `0` is a real value, not an empty one.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn is_support_request(val: &Value) -> bool {
    val.as_i64() == Some(i64::from(ExhibitionEvent::SUPPORT_REQUEST_VALUE))
}

fn parse_val(value: Option<&Value>) -> ValidationResult<i8> {
    value
        .and_then(Value::as_i64)
        .filter(|val| VALID_VALS.contains(val))
        .map(|val| val as i8)
        .ok_or_else(|| {
            ValidationError::with_context(
                ValidationErrorKind::InvalidValue,
                "val",
                format!("'val' must be one of {:?}", VALID_VALS),
            )
        })
}

fn parse_site(value: Option<&Value>) -> ValidationResult<u8> {
    value
        .and_then(Value::as_str)
        .filter(|site| VALID_SITES.contains(site))
        .and_then(|site| site.parse::<u8>().ok())
        .ok_or_else(|| {
            ValidationError::with_context(
                ValidationErrorKind::InvalidValue,
                "site",
                format!("'site' must be one of {:?}", VALID_SITES),
            )
        })
}

fn parse_support_type(value: &Value) -> ValidationResult<u8> {
    value
        .as_i64()
        .filter(|support_type| VALID_TYPES.contains(support_type))
        .map(|support_type| support_type as u8)
        .ok_or_else(|| {
            ValidationError::with_context(
                ValidationErrorKind::InvalidValue,
                "type",
                format!("'type' must be one of {:?}", VALID_TYPES),
            )
        })
}

fn parse_at(value: Option<&Value>) -> ValidationResult<DateTime<Utc>> {
    let at = value
        .and_then(Value::as_str)
        .filter(|at| !at.is_empty() && at.chars().count() == VALID_AT_LEN)
        .ok_or_else(|| {
            ValidationError::with_context(
                ValidationErrorKind::InvalidTimestampLength,
                "at",
                format!("'at' must be a {} character timestamp", VALID_AT_LEN),
            )
        })?;

    let timestamp = parse_timestamp(at)?;

    let time_of_day = timestamp.time();
    if time_of_day < opening_time() || time_of_day > closing_time() {
        return Err(ValidationError::with_context(
            ValidationErrorKind::OutsideOperatingHours,
            "at",
            "Time can only be between 08:45 and 18:15",
        ));
    }

    Ok(timestamp)
}

/// Parse a timestamp in the exact `YYYY-MM-DDTHH:MM:SS.ffffff+00:00` layout
pub fn parse_timestamp(at: &str) -> ValidationResult<DateTime<Utc>> {
    let format_error = |detail: String| {
        ValidationError::with_context(ValidationErrorKind::InvalidTimestampFormat, "at", detail)
    };

    if !at_regex().is_match(at) {
        return Err(format_error(format!(
            "'{}' does not match YYYY-MM-DDTHH:MM:SS.ffffff+00:00",
            at
        )));
    }

    NaiveDateTime::parse_from_str(at, AT_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| format_error(format!("Failed to parse '{}': {}", at, e)))
}

/// Render a UTC instant in the canonical kiosk layout
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(AT_FORMAT).to_string()
}
