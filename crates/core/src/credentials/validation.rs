use std::time::Duration;

use crate::error::{Error, Result};

/// Shortest session the identity service grants.
pub const MIN_SESSION_SECS: u64 = 900;

/// Longest session the identity service grants.
pub const MAX_SESSION_SECS: u64 = 43_200;

/// An account id is exactly 12 ASCII digits.
pub fn validate_account_id(account_id: &str) -> Result<()> {
    if account_id.len() != 12 || !account_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::validation(
            account_id,
            "account id must be exactly 12 digits",
        ));
    }
    Ok(())
}

/// Role names are 1-64 characters of `[A-Za-z0-9+=,.@_-]`.
pub fn validate_role_name(role_name: &str) -> Result<()> {
    let valid_chars = role_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "+=,.@_-".contains(c));
    if role_name.is_empty() || role_name.len() > 64 || !valid_chars {
        return Err(Error::validation(
            role_name,
            "role name must be 1-64 characters of [A-Za-z0-9+=,.@_-]",
        ));
    }
    Ok(())
}

/// Requested session durations must fall within the service's bounds.
pub fn validate_duration(resource: &str, duration: Duration) -> Result<()> {
    let secs = duration.as_secs();
    if !(MIN_SESSION_SECS..=MAX_SESSION_SECS).contains(&secs) {
        return Err(Error::validation(
            resource,
            format!(
                "session duration {secs}s is outside {MIN_SESSION_SECS}-{MAX_SESSION_SECS}s"
            ),
        ));
    }
    Ok(())
}
