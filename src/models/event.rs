//! Event data models for kioskflow
//!
//! This module defines the structures a kiosk event passes through:
//! the raw decoded payload, the validated event, the classified
//! interaction and the storage-ready instance row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::{ValidationError, ValidationErrorKind, ValidationResult};

/// Storage relation for visitor ratings
pub const RATING_TABLE: &str = "rating_instance";

/// Storage relation for staff-support requests
pub const SUPPORT_TABLE: &str = "support_instance";

/// Raw event as received from a kiosk
///
/// Every key is kept as an untyped JSON value so the validator can tell an
/// absent key (`None`) from a key holding `null` (`Some(Value::Null)`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawEvent {
    /// When the interaction happened
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub at: Option<Value>,

    /// Rating (0..=4) or -1 for a support request
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub val: Option<Value>,

    /// Exhibition site identifier ("0".."5")
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub site: Option<Value>,

    /// Support request type (0 or 1)
    #[serde(
        rename = "type",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub support_type: Option<Value>,
}

/// Keeps an explicit `null` distinguishable from a missing key
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl RawEvent {
    /// Create a raw rating/support event (mainly for tests and batch normalization)
    pub fn new(at: impl Into<Value>, val: impl Into<Value>, site: impl Into<Value>) -> Self {
        Self {
            at: Some(at.into()),
            val: Some(val.into()),
            site: Some(site.into()),
            support_type: None,
        }
    }

    /// Attach a `type` key
    pub fn with_support_type(mut self, support_type: impl Into<Value>) -> Self {
        self.support_type = Some(support_type.into());
        self
    }

    /// Decode a message payload
    ///
    /// Fails closed: anything that is not a UTF-8 JSON object is rejected
    /// before field-level checks run.
    pub fn from_slice(payload: &[u8]) -> ValidationResult<Self> {
        let text = std::str::from_utf8(payload).map_err(|e| {
            ValidationError::with_context(
                ValidationErrorKind::Malformed,
                "payload",
                format!("Payload is not UTF-8: {}", e),
            )
        })?;

        serde_json::from_str(text).map_err(|e| {
            ValidationError::with_context(
                ValidationErrorKind::Malformed,
                "payload",
                format!("Payload is not a JSON object: {}", e),
            )
        })
    }

    /// Render the event back to its JSON form for logging
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("<unserializable>"))
    }
}

/// What a validated kiosk event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reading {
    /// Visitor rating on the 0..=4 scale
    Rating(u8),
    /// Staff-support request of the given type
    SupportRequest(u8),
}

/// Kiosk event that passed validation
///
/// Only the validator constructs these, so a support request always carries
/// its support type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhibitionEvent {
    timestamp: DateTime<Utc>,
    site: u8,
    reading: Reading,
    declared_support_type: Option<u8>,
}

impl ExhibitionEvent {
    /// Value sent by the kiosk for a support request
    pub const SUPPORT_REQUEST_VALUE: i8 = -1;

    pub(crate) fn rating(timestamp: DateTime<Utc>, site: u8, rating: u8) -> Self {
        Self {
            timestamp,
            site,
            reading: Reading::Rating(rating),
            declared_support_type: None,
        }
    }

    pub(crate) fn support_request(timestamp: DateTime<Utc>, site: u8, support_type: u8) -> Self {
        Self {
            timestamp,
            site,
            reading: Reading::SupportRequest(support_type),
            declared_support_type: Some(support_type),
        }
    }

    /// Record a `type` key sent alongside a rating; it does not change the classification
    pub(crate) fn with_declared_support_type(mut self, support_type: Option<u8>) -> Self {
        if let Reading::Rating(_) = self.reading {
            self.declared_support_type = support_type;
        }
        self
    }

    /// When the interaction happened
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Zero-based site identifier
    pub fn site(&self) -> u8 {
        self.site
    }

    /// The `val` key as sent by the kiosk
    pub fn value(&self) -> i8 {
        match self.reading {
            Reading::Rating(rating) => rating as i8,
            Reading::SupportRequest(_) => Self::SUPPORT_REQUEST_VALUE,
        }
    }

    /// The `type` key as sent by the kiosk, if any
    pub fn support_type(&self) -> Option<u8> {
        self.declared_support_type
    }

    /// Whether the kiosk reported a support request
    pub fn is_support_request(&self) -> bool {
        matches!(self.reading, Reading::SupportRequest(_))
    }

    /// Split into the classified interaction
    pub(crate) fn interaction(&self) -> Interaction {
        match self.reading {
            Reading::Rating(rating) => Interaction::Rating {
                created_at: self.timestamp,
                site: self.site,
                rating,
            },
            Reading::SupportRequest(support_type) => Interaction::Support {
                created_at: self.timestamp,
                site: self.site,
                support_type,
            },
        }
    }
}

/// Classified kiosk interaction, still in zero-based domain encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Visitor rating
    Rating {
        created_at: DateTime<Utc>,
        site: u8,
        rating: u8,
    },
    /// Staff-support request
    Support {
        created_at: DateTime<Utc>,
        site: u8,
        support_type: u8,
    },
}

impl Interaction {
    /// Check if this is a support request
    pub fn is_support(&self) -> bool {
        matches!(self, Interaction::Support { .. })
    }
}

/// Row of the `rating_instance` relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingInstance {
    pub rating_created_at: DateTime<Utc>,
    pub exhibition_id: i32,
    pub rating_type_id: i32,
}

/// Row of the `support_instance` relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportInstance {
    pub instance_created_at: DateTime<Utc>,
    pub exhibition_id: i32,
    pub support_type_id: i32,
}

/// Storage-ready instance, tagged by target relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifiedInstance {
    Rating(RatingInstance),
    Support(SupportInstance),
}

impl ClassifiedInstance {
    /// Relation this instance is inserted into
    pub fn table(&self) -> &'static str {
        match self {
            ClassifiedInstance::Rating(_) => RATING_TABLE,
            ClassifiedInstance::Support(_) => SUPPORT_TABLE,
        }
    }

    /// One-based exhibition foreign key
    pub fn exhibition_id(&self) -> i32 {
        match self {
            ClassifiedInstance::Rating(row) => row.exhibition_id,
            ClassifiedInstance::Support(row) => row.exhibition_id,
        }
    }

    /// When the interaction happened
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ClassifiedInstance::Rating(row) => row.rating_created_at,
            ClassifiedInstance::Support(row) => row.instance_created_at,
        }
    }
}
