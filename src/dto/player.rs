use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::validation::validate_username;

/// Payload registering a new player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterPlayerRequest {
    /// Display name, 3-15 characters, unique ignoring case.
    pub username: String,
}

impl Validate for RegisterPlayerRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_username(&self.username) {
            errors.add("username", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
