//! Domain types for the versioning core.

pub mod config;
pub mod error;

pub use config::VersioningConfiguration;
pub use error::{Result, ValidationError, VersioningError};
