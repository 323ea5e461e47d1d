use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The two bearer token kinds. Each is signed with its own secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Claims carried by every token minted here. Tokens are stateless: nothing
/// is persisted for a valid token, only revoked ones get a ledger row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id
    pub sub: String,
    /// access | refresh
    pub kind: TokenKind,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
}

/// A freshly minted access/refresh pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// One revocation ledger row. `expires_at` mirrors the token's own expiry,
/// so entries whose token could no longer be replayed anyway are prunable.
#[derive(Clone, Debug, FromRow)]
pub struct RevokedToken {
    /// SHA-256 of the encoded token, base64url
    pub token_hash: String,
    pub user_id: String,
    pub token_kind: String,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
