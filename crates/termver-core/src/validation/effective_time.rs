//! Effective time validation.

use chrono::{NaiveDate, Utc};

use crate::domain::error::ValidationError;

/// Earliest effective time the platform accepts.
pub fn platform_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2002, 1, 1).expect("valid epoch date")
}

/// Latest effective time policy allows: one year past today.
fn policy_upper_bound() -> NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(366)
}

/// Validates a candidate effective date, optionally against the effective
/// date of a previously released version.
///
/// Without a floor only the calendar-sanity bounds apply; with a floor the
/// candidate must additionally be strictly greater than it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeValidator {
    floor: Option<NaiveDate>,
}

impl TimeValidator {
    /// Calendar-sanity validation only; used when no version has ever been
    /// released for the tooling area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the candidate to be strictly after the given date.
    pub fn after(floor: NaiveDate) -> Self {
        Self { floor: Some(floor) }
    }

    pub fn validate(&self, candidate: NaiveDate) -> Result<(), ValidationError> {
        if candidate < platform_epoch() || candidate > policy_upper_bound() {
            return Err(ValidationError::EffectiveTimeOutOfBounds { candidate });
        }
        if let Some(floor) = self.floor {
            if candidate <= floor {
                return Err(ValidationError::EffectiveTimeNotAfter { candidate, floor });
            }
        }
        Ok(())
    }
}
