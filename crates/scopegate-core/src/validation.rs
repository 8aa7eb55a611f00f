//! Input validation for names and titles.

use crate::error::{CoreError, Result};
use crate::model::GENERAL_AREA_NAME;

/// Maximum length of a space, area, group or resource name, in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Validate a scope, group or resource name.
///
/// Names are trimmed by the caller; this only checks the trimmed value is
/// non-empty, bounded, and free of control characters.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidName("name must not be empty".into()));
    }
    if name.trim() != name {
        return Err(CoreError::InvalidName(
            "name must not start or end with whitespace".into(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::InvalidName(format!(
            "name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(CoreError::InvalidName(
            "name must not contain control characters".into(),
        ));
    }
    Ok(())
}

/// Validate the name of a new or renamed area.
///
/// The General name is reserved for the area every space is created with.
pub fn validate_area_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name.eq_ignore_ascii_case(GENERAL_AREA_NAME) {
        return Err(CoreError::InvalidName(format!(
            "{:?} is reserved",
            GENERAL_AREA_NAME
        )));
    }
    Ok(())
}
