//! Validation helpers for DTOs.

use validator::ValidationError;

/// Shortest accepted username, after trimming.
pub const USERNAME_MIN_CHARS: usize = 3;
/// Longest accepted username, after trimming.
pub const USERNAME_MAX_CHARS: usize = 15;
/// Longest accepted lobby name.
pub const LOBBY_NAME_MAX_CHARS: usize = 40;

/// Validates that a username is 3 to 15 characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_username("alice")   // Ok
/// validate_username("  al  ")  // Err - too short once trimmed
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.trim().chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!(
                "Username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates that a lobby name, when given, fits the display limit.
pub fn validate_lobby_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length > LOBBY_NAME_MAX_CHARS {
        let mut err = ValidationError::new("lobby_name_length");
        err.message = Some(
            format!("Lobby name must be at most {LOBBY_NAME_MAX_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }
    Ok(())
}
