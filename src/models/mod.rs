//! Data models for kioskflow
//!
//! This module contains the kiosk event structures, the schema validator
//! and its error types.

pub mod error;
pub mod event;
pub mod validation;

// Re-export commonly used types
pub use error::{ValidationError, ValidationErrorKind, ValidationPhase, ValidationResult};
pub use event::{
    ClassifiedInstance, ExhibitionEvent, Interaction, RatingInstance, RawEvent, SupportInstance,
    RATING_TABLE, SUPPORT_TABLE,
};
pub use validation::{validate, validate_payload};
