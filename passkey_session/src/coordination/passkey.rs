use chrono::Utc;

use crate::passkey::{
    AuthenticationOptions, AuthenticatorResponse, CredentialStore, PasskeyCredentialSummary,
    RegisterCredential, RegistrationOptions, finish_authentication, finish_registration,
    start_authentication, start_registration,
};
use crate::token::{TokenPair, mint_token_pair};
use crate::userdb::{User, UserStore};

use super::errors::{
    CoordinationError, map_ceremony_error, map_infrastructure_token_error, map_user_error,
};

/// Begin a passkey registration ceremony for an existing user.
pub async fn handle_start_registration_core(
    user_id: &str,
) -> Result<RegistrationOptions, CoordinationError> {
    let user = UserStore::get_user(user_id)
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| CoordinationError::UserNotFound.log())?;

    start_registration(&user).await.map_err(map_ceremony_error)
}

/// Finish a passkey registration ceremony.
///
/// On success the user's email is marked verified: completing a passkey
/// ceremony for the registered address is treated as proof of control of
/// that address.
pub async fn handle_finish_registration_core(
    user_id: &str,
    reg_data: &RegisterCredential,
    friendly_name: Option<String>,
) -> Result<PasskeyCredentialSummary, CoordinationError> {
    let user = UserStore::get_user(user_id)
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| CoordinationError::UserNotFound.log())?;

    let credential = finish_registration(&user.id, reg_data, friendly_name)
        .await
        .map_err(map_ceremony_error)?;

    UserStore::mark_email_verified(&user.id)
        .await
        .map_err(map_user_error)?;

    Ok(credential.into())
}

/// Begin a passkey authentication ceremony.
///
/// Supplying an email narrows the allowed-credentials hint to that user's
/// passkeys, purely as a UX aid. An unknown email produces exactly the same
/// unrestricted options as no email, so this path cannot be used to probe
/// which addresses have accounts.
pub async fn handle_start_authentication_core(
    user_email: Option<&str>,
) -> Result<AuthenticationOptions, CoordinationError> {
    let mut allow_credential_ids = Vec::new();

    if let Some(email) = user_email {
        if let Some(user) = UserStore::get_user_by_email(email)
            .await
            .map_err(map_user_error)?
        {
            allow_credential_ids = CredentialStore::get_credentials_by_user(&user.id)
                .await
                .map_err(map_ceremony_error)?
                .into_iter()
                .map(|credential| credential.credential_id)
                .collect();
        }
    }

    start_authentication(allow_credential_ids)
        .await
        .map_err(map_ceremony_error)
}

/// Finish a passkey authentication ceremony: verify the assertion, commit
/// the counter, stamp the login time, and mint a token pair.
pub async fn handle_finish_authentication_core(
    auth_response: &AuthenticatorResponse,
) -> Result<(User, TokenPair), CoordinationError> {
    let (credential, _new_counter) = finish_authentication(auth_response)
        .await
        .map_err(map_ceremony_error)?;

    // A credential row without its user is a dangling reference; surfacing
    // anything other than the generic failure would leak that the
    // credential id exists
    let mut user = UserStore::get_user(&credential.user_id)
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| {
            tracing::error!(
                credential_id = %credential.credential_id,
                "Credential resolved to a missing user"
            );
            CoordinationError::VerificationFailed
        })?;

    let now = Utc::now();
    UserStore::touch_last_login(&user.id, now)
        .await
        .map_err(map_user_error)?;
    user.last_login_at = Some(now);

    let tokens = mint_token_pair(&user.id).map_err(map_infrastructure_token_error)?;

    tracing::info!(user_id = %user.id, "Authentication ceremony completed");

    Ok((user, tokens))
}

/// List a user's passkeys, oldest first, without key material or counters.
pub async fn list_passkey_credentials_core(
    user_id: &str,
) -> Result<Vec<PasskeyCredentialSummary>, CoordinationError> {
    let user = UserStore::get_user(user_id)
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| CoordinationError::UserNotFound.log())?;

    let credentials = CredentialStore::get_credentials_by_user(&user.id)
        .await
        .map_err(map_ceremony_error)?;

    Ok(credentials.into_iter().map(Into::into).collect())
}

/// Delete one of the caller's passkeys. Ids that do not exist and ids owned
/// by someone else fail identically.
pub async fn delete_passkey_credential_core(
    user_id: &str,
    credential_id: &str,
) -> Result<(), CoordinationError> {
    let deleted = CredentialStore::delete_credential(user_id, credential_id)
        .await
        .map_err(map_ceremony_error)?;

    if !deleted {
        return Err(CoordinationError::ResourceNotFound {
            resource_type: "Passkey".to_string(),
            resource_id: credential_id.to_string(),
        }
        .log());
    }

    tracing::info!(user_id, credential_id, "Deleted passkey credential");

    Ok(())
}
