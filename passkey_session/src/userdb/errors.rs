use thiserror::Error;

#[derive(Clone, Error, Debug)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Duplicate user: {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for UserError {
    fn from(err: serde_json::Error) -> Self {
        UserError::InvalidData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<UserError>();
    }

    #[test]
    fn test_error_propagation() {
        fn validate_user_email(email: &str) -> Result<(), UserError> {
            if email.is_empty() {
                return Err(UserError::InvalidData("Email cannot be empty".to_string()));
            }
            Ok(())
        }

        assert!(validate_user_email("alice@example.com").is_ok());
        assert!(matches!(
            validate_user_email(""),
            Err(UserError::InvalidData(_))
        ));
    }
}
