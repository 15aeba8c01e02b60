//! Version name validation.
//!
//! Rules apply in order; the first failure wins:
//! 1. not empty
//! 2. not a reserved word (branch sentinels, terminology sentinels,
//!    OS device names, NTFS internal names) — case-sensitive exact match
//! 3. no whitespace and none of `< > : / ' | ? *`
//! 4. unique against the existing version names of every tooling area
//! 5. at least one non-digit character

use crate::domain::error::ValidationError;
use termver_store::MAIN_BRANCH;

/// Sentinel version id of content that has never been released.
pub const UNVERSIONED: &str = "unversioned";
/// Sentinel version id of the empty initial state of a repository.
pub const INITIAL_STATE: &str = "init";

const RESERVED_WORDS: &[&str] = &[
    MAIN_BRANCH,
    UNVERSIONED,
    INITIAL_STATE,
    // OS-reserved device names
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    // NTFS internal names
    "$MFT", "$MFTMirr", "$LogFile", "$Volume", "$AttrDef", "$Bitmap", "$Boot", "$BadClus",
    "$Secure", "$UpCase", "$Extend",
];

const DISALLOWED_CHARACTERS: &[char] = &['<', '>', ':', '/', '\'', '|', '?', '*'];

/// Validate a candidate version name against the lexical rules and the
/// supplied set of names already in use.
///
/// Pure function: the same inputs always yield the same result.
pub fn validate_version_name(
    candidate: &str,
    existing_names: &[String],
) -> Result<(), ValidationError> {
    if candidate.is_empty() {
        return Err(ValidationError::EmptyVersionId);
    }

    if RESERVED_WORDS.contains(&candidate) {
        return Err(ValidationError::ReservedWord {
            word: candidate.to_string(),
        });
    }

    if candidate
        .chars()
        .any(|c| c.is_whitespace() || DISALLOWED_CHARACTERS.contains(&c))
    {
        return Err(ValidationError::IllegalCharacter {
            version_id: candidate.to_string(),
        });
    }

    if existing_names.iter().any(|name| name == candidate) {
        return Err(ValidationError::DuplicateVersionId {
            version_id: candidate.to_string(),
        });
    }

    // Purely numeric identifiers clash with timestamp-addressed lookups.
    if candidate.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::AllDigits {
            version_id: candidate.to_string(),
        });
    }

    Ok(())
}
