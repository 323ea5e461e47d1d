use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur during WebAuthn/Passkey operations.
///
/// The distinctions below (notably `Replay` and `NotFound`) exist for
/// logging and telemetry; the coordination layer collapses them before they
/// reach an external caller.
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// Error related to passkey configuration (e.g., missing verifier or origin)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The ceremony challenge is missing, already consumed, or expired
    #[error("Invalid challenge: {0}")]
    Challenge(String),

    /// The ceremony verifier rejected the client response
    #[error("Verification error: {0}")]
    Verification(String),

    /// Error during the registration process (e.g., duplicate credential)
    #[error("Registration error: {0}")]
    Registration(String),

    /// Signature counter regression; treated as a cloned-authenticator signal
    #[error("Replay detected: {0}")]
    Replay(String),

    /// Error when a requested resource (e.g., credential) is not found
    #[error("Not found error: {0}")]
    NotFound(String),

    /// Error validating the client data JSON from the browser
    #[error("Invalid client data: {0}")]
    ClientData(String),

    /// Error with improperly formatted data
    #[error("Invalid format: {0}")]
    Format(String),

    /// Error accessing or modifying stored passkey data
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),

    /// Error from JSON serialization/deserialization
    #[error("Serde error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<PasskeyError>();
    }

    #[test]
    fn test_from_util_error() {
        let err: PasskeyError = UtilError::Format("bad encoding".to_string()).into();
        assert!(matches!(err, PasskeyError::Utils(_)));
    }
}
