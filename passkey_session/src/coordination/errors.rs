//! The closed error taxonomy exposed by the session façade.
//!
//! Internal components keep their fine-grained errors for logs and
//! telemetry; everything an external caller can observe is one of the
//! variants below, with fixed messages for the anti-enumeration cases.

use thiserror::Error;

use crate::passkey::PasskeyError;
use crate::token::TokenError;
use crate::userdb::UserError;

/// Errors produced by the public session operations.
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// The named user does not exist
    #[error("User not found")]
    UserNotFound,

    /// The ceremony challenge is gone: restart from the "begin" step
    #[error("Challenge expired or invalid")]
    ChallengeExpiredOrInvalid,

    /// Generic ceremony rejection. Deliberately message-free of root cause:
    /// unknown credential, counter replay, duplicate registration, and
    /// signature failure all surface exactly like this
    #[error("Verification failed")]
    VerificationFailed,

    /// Covers malformed, expired, revoked, and wrong-kind refresh tokens
    /// uniformly
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// No valid bearer credential present
    #[error("Unauthorized access")]
    Unauthorized,

    /// Registration conflict (duplicate email or username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Required input missing or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found with context
    #[error("Resource not found: {resource_type} {resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    /// Infrastructure failure (persistence, signing)
    #[error("Database error: {0}")]
    Database(String),
}

impl CoordinationError {
    /// Log the error and return self, allowing method chaining at the point
    /// an operation decides to fail.
    pub fn log(self) -> Self {
        match &self {
            Self::UserNotFound => tracing::warn!("User not found"),
            Self::ChallengeExpiredOrInvalid => tracing::warn!("Challenge expired or invalid"),
            Self::VerificationFailed => tracing::warn!("Ceremony verification failed"),
            Self::InvalidRefreshToken => tracing::warn!("Invalid refresh token"),
            Self::Unauthorized => tracing::warn!("Unauthorized access"),
            Self::Conflict(msg) => tracing::warn!("Conflict: {}", msg),
            Self::InvalidInput(msg) => tracing::warn!("Invalid input: {}", msg),
            Self::ResourceNotFound {
                resource_type,
                resource_id,
            } => tracing::warn!("Resource not found: {} {}", resource_type, resource_id),
            Self::Database(msg) => tracing::error!("Database error: {}", msg),
        }
        self
    }
}

/// Collapse a ceremony error for the external boundary.
///
/// Only the challenge-lifecycle failure stays distinguishable (the caller
/// must restart from "begin"); unknown credentials, replays, duplicates,
/// and verifier rejections all become the same `VerificationFailed` so the
/// error channel reveals nothing about which credential ids exist.
pub(super) fn map_ceremony_error(err: PasskeyError) -> CoordinationError {
    // The interesting distinctions are preserved here for operators before
    // the collapse
    tracing::info!(error = %err, "Ceremony failed");

    match err {
        PasskeyError::Challenge(_) => CoordinationError::ChallengeExpiredOrInvalid,
        PasskeyError::Storage(_) => CoordinationError::Database(err.to_string()),
        PasskeyError::Config(msg) => CoordinationError::Database(msg),
        _ => CoordinationError::VerificationFailed,
    }
}

pub(super) fn map_user_error(err: UserError) -> CoordinationError {
    match err {
        UserError::NotFound => CoordinationError::UserNotFound,
        UserError::Duplicate(msg) => CoordinationError::Conflict(msg),
        UserError::InvalidData(msg) => CoordinationError::InvalidInput(msg),
        UserError::Storage(msg) => CoordinationError::Database(msg),
    }
}

pub(super) fn map_infrastructure_token_error(err: TokenError) -> CoordinationError {
    CoordinationError::Database(err.to_string())
}
