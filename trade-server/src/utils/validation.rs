//! Input validation helpers for API payloads

use crate::utils::{AppError, AppResult};

pub const MAX_ID_LEN: usize = 64;
pub const MAX_PLACE_LEN: usize = 200;

/// Validate a required text field: non-empty after trim, bounded length
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if trimmed.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} exceeds maximum length of {max_len}"
        )));
    }
    Ok(())
}

/// Validate an optional text field if present
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> AppResult<()> {
    match value {
        Some(v) => validate_required_text(v, field, max_len),
        None => Ok(()),
    }
}

/// Validate a unix-millis timestamp is plausible (positive)
pub fn validate_timestamp(value: i64, field: &str) -> AppResult<()> {
    if value <= 0 {
        return Err(AppError::validation(format!(
            "{field} must be a positive unix-millis timestamp"
        )));
    }
    Ok(())
}
