use thiserror::Error;

/// Errors that can occur while minting, verifying, or revoking bearer
/// tokens.
///
/// The variants are deliberately fine-grained for logging; the coordination
/// layer folds them into a single uniform error before they leave the
/// process.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token is not a structurally valid, correctly signed JWT
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The token is valid but of the wrong kind (access vs refresh)
    #[error("Wrong token kind: expected {expected}, got {actual}")]
    WrongKind { expected: String, actual: String },

    /// The token's embedded expiry has passed
    #[error("Token expired")]
    Expired,

    /// The token appears in the revocation ledger
    #[error("Token revoked")]
    Revoked,

    /// Error related to token configuration (e.g., missing signing secret)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error accessing the revocation ledger
    #[error("Storage error: {0}")]
    Storage(String),
}
