use crate::token::{TokenKind, TokenPair, refresh_token_pair, revoke_token, verify_token};
use crate::userdb::{User, UserStore};

use super::errors::{CoordinationError, map_user_error};

/// Exchange a live refresh token for a brand-new access/refresh pair.
///
/// Malformed, expired, revoked, and wrong-kind tokens, as well as missing
/// or deactivated users, all fail with the same uniform error. The
/// presented refresh token remains valid until its own expiry.
pub async fn refresh_access_token_core(refresh_token: &str) -> Result<TokenPair, CoordinationError> {
    let (claims, pair) = refresh_token_pair(refresh_token).await.map_err(|e| {
        tracing::info!(error = %e, "Refresh token rejected");
        CoordinationError::InvalidRefreshToken
    })?;

    match UserStore::get_user(&claims.sub).await.map_err(map_user_error)? {
        Some(user) if user.is_active => Ok(pair),
        _ => {
            tracing::warn!(sub = %claims.sub, "Refresh rejected: user missing or inactive");
            Err(CoordinationError::InvalidRefreshToken)
        }
    }
}

/// Log out: revoke the presented access token and, when supplied, the
/// refresh token. Requires a currently valid access token.
pub async fn logout_core(
    access_token: &str,
    refresh_token: Option<&str>,
) -> Result<(), CoordinationError> {
    let claims = verify_token(TokenKind::Access, access_token)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Logout with invalid access token");
            CoordinationError::Unauthorized
        })?;

    revoke_token(TokenKind::Access, access_token)
        .await
        .map_err(|e| CoordinationError::Database(e.to_string()))?;

    if let Some(token) = refresh_token {
        // A bad refresh token does not abort the logout; the session is
        // already dead once the access token is revoked
        if let Err(e) = revoke_token(TokenKind::Refresh, token).await {
            tracing::warn!(error = %e, "Failed to revoke refresh token during logout");
        }
    }

    tracing::info!(user_id = %claims.sub, "Logged out");

    Ok(())
}

/// Resolve the bearer of an access token to their user record.
///
/// This is the current-user lookup and the operation the transport's auth
/// middleware consumes: signature, expiry, kind, and revocation are all
/// checked, and the user must still exist and be active.
pub async fn get_authorized_user_core(access_token: &str) -> Result<User, CoordinationError> {
    let claims = verify_token(TokenKind::Access, access_token)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Rejected bearer token");
            CoordinationError::Unauthorized
        })?;

    match UserStore::get_user(&claims.sub).await.map_err(map_user_error)? {
        Some(user) if user.is_active => Ok(user),
        _ => {
            tracing::warn!(sub = %claims.sub, "Bearer resolved to missing or inactive user");
            Err(CoordinationError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, init_test_environment};
    use crate::token::mint_token_pair;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_refresh_returns_new_pair_old_token_survives() {
        init_test_environment().await;
        let user = create_test_user("tok-refresh").await;

        let pair = mint_token_pair(&user.id).unwrap();
        let new_pair = refresh_access_token_core(&pair.refresh_token).await.unwrap();

        let claims = verify_token(TokenKind::Access, &new_pair.access_token)
            .await
            .unwrap();
        assert_eq!(claims.sub, user.id);

        // Documented baseline: rotation does not revoke the old token
        assert!(
            verify_token(TokenKind::Refresh, &pair.refresh_token)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_refresh_failures_are_uniform() {
        init_test_environment().await;
        let user = create_test_user("tok-uniform").await;
        let pair = mint_token_pair(&user.id).unwrap();

        // Malformed
        let malformed = refresh_access_token_core("junk").await.unwrap_err();
        // Wrong kind (access token presented as refresh)
        let wrong_kind = refresh_access_token_core(&pair.access_token).await.unwrap_err();
        // Revoked
        crate::token::revoke_token(TokenKind::Refresh, &pair.refresh_token)
            .await
            .unwrap();
        let revoked = refresh_access_token_core(&pair.refresh_token).await.unwrap_err();

        for err in [&malformed, &wrong_kind, &revoked] {
            assert!(matches!(err, CoordinationError::InvalidRefreshToken));
            assert_eq!(err.to_string(), "Invalid refresh token");
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_refresh_for_missing_or_inactive_user() {
        init_test_environment().await;

        // Token for a subject that does not exist
        let orphan = mint_token_pair("ghost-user-id").unwrap();
        let result = refresh_access_token_core(&orphan.refresh_token).await;
        assert!(matches!(result, Err(CoordinationError::InvalidRefreshToken)));

        // Deactivated account
        let user = create_test_user("tok-inactive").await;
        let pair = mint_token_pair(&user.id).unwrap();
        UserStore::set_active(&user.id, false).await.unwrap();

        let result = refresh_access_token_core(&pair.refresh_token).await;
        assert!(matches!(result, Err(CoordinationError::InvalidRefreshToken)));
    }

    #[tokio::test]
    #[serial]
    async fn test_logout_revokes_both_tokens() {
        init_test_environment().await;
        let user = create_test_user("tok-logout").await;
        let pair = mint_token_pair(&user.id).unwrap();

        logout_core(&pair.access_token, Some(&pair.refresh_token))
            .await
            .unwrap();

        // Both tokens are dead immediately
        let bearer = get_authorized_user_core(&pair.access_token).await;
        assert!(matches!(bearer, Err(CoordinationError::Unauthorized)));

        let refresh = refresh_access_token_core(&pair.refresh_token).await;
        assert!(matches!(refresh, Err(CoordinationError::InvalidRefreshToken)));
    }

    #[tokio::test]
    #[serial]
    async fn test_logout_requires_valid_access_token() {
        init_test_environment().await;

        let result = logout_core("junk", None).await;
        assert!(matches!(result, Err(CoordinationError::Unauthorized)));
    }

    #[tokio::test]
    #[serial]
    async fn test_logout_is_idempotent_for_refresh() {
        init_test_environment().await;
        let user = create_test_user("tok-twice").await;
        let first = mint_token_pair(&user.id).unwrap();
        let second = mint_token_pair(&user.id).unwrap();

        // Revoke the same refresh token through two separate logouts
        logout_core(&first.access_token, Some(&first.refresh_token))
            .await
            .unwrap();
        logout_core(&second.access_token, Some(&first.refresh_token))
            .await
            .unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_get_authorized_user() {
        init_test_environment().await;
        let user = create_test_user("tok-me").await;
        let pair = mint_token_pair(&user.id).unwrap();

        let me = get_authorized_user_core(&pair.access_token).await.unwrap();
        assert_eq!(me.id, user.id);

        // Refresh tokens are not bearer credentials
        let result = get_authorized_user_core(&pair.refresh_token).await;
        assert!(matches!(result, Err(CoordinationError::Unauthorized)));
    }

    #[tokio::test]
    #[serial]
    async fn test_get_authorized_user_inactive_account() {
        init_test_environment().await;
        let user = create_test_user("tok-me-inactive").await;
        let pair = mint_token_pair(&user.id).unwrap();

        UserStore::set_active(&user.id, false).await.unwrap();

        let result = get_authorized_user_core(&pair.access_token).await;
        assert!(matches!(result, Err(CoordinationError::Unauthorized)));
    }
}
