//! Validation error types for kiosk events
//!
//! A kiosk event is either valid or invalid; the first failing check wins
//! and is reported as a single [`ValidationError`].

use std::fmt;
use thiserror::Error;

/// Main validation error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The kind of validation error
    pub kind: ValidationErrorKind,
    /// The field that failed validation
    pub field: String,
    /// Optional additional context
    pub context: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ValidationErrorKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            context: None,
        }
    }

    /// Create a validation error with additional context
    pub fn with_context(
        kind: ValidationErrorKind,
        field: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            context: Some(context.into()),
        }
    }

    /// The validation phase that produced this error
    pub fn phase(&self) -> ValidationPhase {
        self.kind.phase()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(
                f,
                "Validation failed for field '{}': {} - {}",
                self.field, self.kind, ctx
            ),
            None => write!(
                f,
                "Validation failed for field '{}': {}",
                self.field, self.kind
            ),
        }
    }
}

/// Specific validation error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Payload is not a UTF-8 JSON object
    #[error("Malformed payload")]
    Malformed,

    /// Key is absent from the payload
    #[error("Missing key")]
    MissingField,

    /// Key is present but holds no value
    #[error("Missing key value")]
    EmptyField,

    /// Value is outside its enumerated domain
    #[error("Invalid key value")]
    InvalidValue,

    /// Timestamp is empty or not exactly 32 characters
    #[error("Invalid timestamp length")]
    InvalidTimestampLength,

    /// Timestamp does not follow YYYY-MM-DDTHH:MM:SS.ffffff+00:00
    #[error("Invalid timestamp format")]
    InvalidTimestampFormat,

    /// Time of day is outside 08:45:00..=18:15:00
    #[error("Timestamp outside operating hours")]
    OutsideOperatingHours,
}

impl ValidationErrorKind {
    /// The validation phase this kind belongs to
    pub fn phase(&self) -> ValidationPhase {
        match self {
            ValidationErrorKind::Malformed => ValidationPhase::Decode,
            ValidationErrorKind::MissingField | ValidationErrorKind::EmptyField => {
                ValidationPhase::Presence
            },
            ValidationErrorKind::InvalidValue
            | ValidationErrorKind::InvalidTimestampLength
            | ValidationErrorKind::InvalidTimestampFormat
            | ValidationErrorKind::OutsideOperatingHours => ValidationPhase::Range,
        }
    }
}

/// Ordered validation phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationPhase {
    /// Structural decode of the payload
    Decode,
    /// Key presence and emptiness checks
    Presence,
    /// Enumerated values and timestamp format
    Range,
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationPhase::Decode => "decode",
            ValidationPhase::Presence => "presence",
            ValidationPhase::Range => "range",
        };
        f.write_str(name)
    }
}

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Convert validation errors to application errors
impl From<ValidationError> for crate::error::Error {
    fn from(err: ValidationError) -> Self {
        crate::error::Error::validation(err.to_string())
    }
}
