//! The shared validate, classify, transform pipeline and its batch driver
//!
//! The streaming driver lives in [`crate::kafka`]; both drivers go through
//! [`transform::to_instance`] or its two halves.

pub mod batch;
pub mod transform;

pub use batch::{BatchLoader, BatchSummary, SubsetSummary};
pub use transform::{classify, to_instance, transform, ID_SHIFT};
