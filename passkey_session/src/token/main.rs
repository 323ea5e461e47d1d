use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};

use crate::utils::base64url_encode;

use super::config::{
    JWT_ACCESS_TOKEN_SECRET, JWT_ACCESS_TOKEN_TTL, JWT_REFRESH_TOKEN_SECRET,
    JWT_REFRESH_TOKEN_TTL,
};
use super::errors::TokenError;
use super::storage::RevocationStore;
use super::types::{RevokedToken, TokenClaims, TokenKind, TokenPair};

fn secret_for(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => JWT_ACCESS_TOKEN_SECRET.as_str(),
        TokenKind::Refresh => JWT_REFRESH_TOKEN_SECRET.as_str(),
    }
}

fn ttl_for(kind: TokenKind) -> i64 {
    match kind {
        TokenKind::Access => *JWT_ACCESS_TOKEN_TTL,
        TokenKind::Refresh => *JWT_REFRESH_TOKEN_TTL,
    }
}

/// SHA-256 of the encoded token, base64url. The ledger stores this instead
/// of the bearer value itself.
pub(super) fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64url_encode(digest.to_vec()).unwrap_or_default()
}

fn mint_token(kind: TokenKind, user_id: &str) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        kind,
        iat: now.timestamp(),
        exp: now.timestamp() + ttl_for(kind),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret_for(kind).as_bytes()),
    )
    .map_err(|e| TokenError::Config(format!("Failed to sign token: {e}")))
}

/// Decode and validate a token's signature and claims with the given kind's
/// secret. `validate_exp` is switched off on the revocation path so expired
/// tokens can still be revoked cleanly.
fn decode_token(kind: TokenKind, token: &str, validate_exp: bool) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = validate_exp;

    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret_for(kind).as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(e.to_string()),
    })?;

    if data.claims.kind != kind {
        return Err(TokenError::WrongKind {
            expected: kind.as_str().to_string(),
            actual: data.claims.kind.as_str().to_string(),
        });
    }

    Ok(data.claims)
}

/// Mint a fresh access/refresh pair for a user.
pub fn mint_token_pair(user_id: &str) -> Result<TokenPair, TokenError> {
    let access_token = mint_token(TokenKind::Access, user_id)?;
    let refresh_token = mint_token(TokenKind::Refresh, user_id)?;

    tracing::debug!(user_id, "Minted token pair");

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Full verification: signature, expiry, declared kind, and the revocation
/// ledger. Every path that accepts a bearer token goes through here.
pub async fn verify_token(kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError> {
    let claims = decode_token(kind, token, true)?;

    if is_revoked(token).await? {
        tracing::info!(kind = kind.as_str(), sub = %claims.sub, "Rejected revoked token");
        return Err(TokenError::Revoked);
    }

    Ok(claims)
}

/// Verify a refresh token and mint a brand-new pair for its subject.
///
/// The presented refresh token stays valid until its own expiry; rotation
/// does not revoke it.
pub async fn refresh_token_pair(refresh_token: &str) -> Result<(TokenClaims, TokenPair), TokenError> {
    let claims = verify_token(TokenKind::Refresh, refresh_token).await?;
    let pair = mint_token_pair(&claims.sub)?;
    Ok((claims, pair))
}

/// Add a token to the revocation ledger.
///
/// The entry's `expires_at` is copied from the token's own claims, so the
/// ledger never has to retain entries past the point the token would have
/// died anyway. Revoking twice is not an error.
pub async fn revoke_token(kind: TokenKind, token: &str) -> Result<(), TokenError> {
    // Expiry is deliberately not validated: revoking an already-expired
    // token must succeed
    let claims = decode_token(kind, token, false)?;

    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(ttl_for(kind)));

    let entry = RevokedToken {
        token_hash: hash_token(token),
        user_id: claims.sub.clone(),
        token_kind: kind.as_str().to_string(),
        revoked_at: Utc::now(),
        expires_at,
    };

    RevocationStore::insert(entry).await?;

    tracing::info!(kind = kind.as_str(), sub = %claims.sub, "Revoked token");

    Ok(())
}

/// Revocation ledger membership check.
pub async fn is_revoked(token: &str) -> Result<bool, TokenError> {
    RevocationStore::is_listed(&hash_token(token)).await
}
