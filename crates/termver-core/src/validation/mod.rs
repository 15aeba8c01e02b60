//! Structured validators for version names and effective times.
//!
//! Validators return `Result<(), ValidationError>` values instead of
//! failing the workflow, so callers can collect and render field errors.

pub mod effective_time;
pub mod name;

pub use effective_time::{platform_epoch, TimeValidator};
pub use name::{validate_version_name, INITIAL_STATE, UNVERSIONED};
