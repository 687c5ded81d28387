//! Version handling for zinject feeds
//!
//! This crate provides parsing, ordering and range matching for implementation
//! versions as they appear in feed documents (`1.2-pre3`, `2.0..!3.0 | !2.5`),
//! plus the stability levels attached to implementations.

mod error;
mod range;
mod stability;
mod version;

pub use error::VersionError;
pub use range::{Constraint, VersionRange, VersionRangePart};
pub use stability::Stability;
pub use version::{ImplementationVersion, Modifier, VersionPart};
