use chrono::Utc;

use super::challenge::{consume_challenge, issue_challenge};

use crate::passkey::config::{
    PASSKEY_AUTHENTICATOR_ATTACHMENT, PASSKEY_RESIDENT_KEY, PASSKEY_RP_ID, PASSKEY_RP_NAME,
    PASSKEY_TIMEOUT, PASSKEY_USER_VERIFICATION,
};
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::CredentialStore;
use crate::passkey::types::{
    AuthenticatorSelection, ChallengePurpose, CredentialDescriptor, PasskeyCredential,
    PubKeyCredParam, PublicKeyCredentialUserEntity, RegisterCredential, RegistrationOptions,
    RelyingParty, embedded_challenge,
};
use crate::passkey::verifier::{CeremonyContext, ceremony_verifier};
use crate::userdb::User;
use crate::utils::base64url_encode;

const DEFAULT_FRIENDLY_NAME: &str = "Passkey Device";

/// Begin a registration ceremony for an existing user.
///
/// The returned options exclude every credential the user already holds, so
/// an authenticator cannot be registered twice, and ask for a discoverable
/// key with platform-preferred, user-verification-preferred settings.
pub(crate) async fn start_registration(user: &User) -> Result<RegistrationOptions, PasskeyError> {
    let existing = CredentialStore::get_credentials_by_user(&user.id).await?;
    let exclude_credentials = existing
        .into_iter()
        .map(|credential| CredentialDescriptor {
            type_: "public-key".to_string(),
            id: credential.credential_id,
        })
        .collect();

    let stored = issue_challenge(ChallengePurpose::Registration, Some(&user.id)).await?;

    let user_entity = PublicKeyCredentialUserEntity {
        id: base64url_encode(user.id.clone().into_bytes())?,
        name: user.email.clone(),
        display_name: user.full_name.clone(),
    };

    let options = RegistrationOptions {
        challenge: stored.challenge,
        rp: RelyingParty {
            name: PASSKEY_RP_NAME.to_string(),
            id: PASSKEY_RP_ID.to_string(),
        },
        user: user_entity,
        pub_key_cred_params: vec![
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: -7, // ES256
            },
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: -257, // RS256
            },
        ],
        exclude_credentials,
        authenticator_selection: AuthenticatorSelection {
            authenticator_attachment: PASSKEY_AUTHENTICATOR_ATTACHMENT.to_string(),
            resident_key: PASSKEY_RESIDENT_KEY.to_string(),
            user_verification: PASSKEY_USER_VERIFICATION.to_string(),
        },
        timeout: (*PASSKEY_TIMEOUT) * 1000, // Convert seconds to milliseconds
        attestation: "none".to_string(),
    };

    tracing::debug!(user_id = %user.id, "Registration options issued");

    Ok(options)
}

/// Finish a registration ceremony: consume the challenge the response was
/// produced against, delegate verification, and persist the credential.
pub(crate) async fn finish_registration(
    user_id: &str,
    reg_data: &RegisterCredential,
    friendly_name: Option<String>,
) -> Result<PasskeyCredential, PasskeyError> {
    let challenge_value = embedded_challenge(&reg_data.response.client_data_json)?;
    let stored = consume_challenge(ChallengePurpose::Registration, &challenge_value).await?;

    // The challenge was issued for a specific user; a response from anyone
    // else cannot consume it
    if stored.user_id.as_deref() != Some(user_id) {
        tracing::warn!(user_id, "Registration challenge subject mismatch");
        return Err(PasskeyError::Challenge(
            "Challenge was not issued for this user".to_string(),
        ));
    }

    let context = CeremonyContext::from_config();
    let material = ceremony_verifier()?
        .verify_registration(&context, &stored.challenge, reg_data)
        .await?;

    let now = Utc::now();
    let credential = PasskeyCredential {
        credential_id: material.credential_id,
        user_id: user_id.to_string(),
        public_key: material.public_key,
        sign_count: material.sign_count,
        friendly_name: friendly_name.unwrap_or_else(|| DEFAULT_FRIENDLY_NAME.to_string()),
        device_type: material.device_type,
        created_at: now,
        last_used_at: now,
    };

    CredentialStore::store_credential(&credential).await?;

    tracing::info!(
        user_id,
        credential_id = %credential.credential_id,
        "Registered passkey credential"
    );

    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_test_user, encode_client_data, init_test_environment, register_credential_response,
    };
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_start_registration_excludes_existing_credentials() {
        init_test_environment().await;
        let user = create_test_user("reg-exclude").await;

        // Register one credential first
        let options = start_registration(&user).await.unwrap();
        let response = register_credential_response("cred-reg-exclude", &options.challenge, 0);
        finish_registration(&user.id, &response, None).await.unwrap();

        let second = start_registration(&user).await.unwrap();
        let excluded: Vec<&str> = second
            .exclude_credentials
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert!(excluded.contains(&"cred-reg-exclude"));
    }

    #[tokio::test]
    #[serial]
    async fn test_finish_registration_stores_credential_with_defaults() {
        init_test_environment().await;
        let user = create_test_user("reg-finish").await;

        let options = start_registration(&user).await.unwrap();
        let response = register_credential_response("cred-reg-finish", &options.challenge, 0);
        let credential = finish_registration(&user.id, &response, None).await.unwrap();

        assert_eq!(credential.friendly_name, "Passkey Device");
        assert_eq!(credential.sign_count, 0);
        assert_eq!(credential.user_id, user.id);

        let stored = CredentialStore::get_credential("cred-reg-finish")
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    #[serial]
    async fn test_finish_registration_rejects_consumed_challenge() {
        init_test_environment().await;
        let user = create_test_user("reg-replay").await;

        let options = start_registration(&user).await.unwrap();
        let response = register_credential_response("cred-reg-replay", &options.challenge, 0);
        finish_registration(&user.id, &response, None).await.unwrap();

        // Same payload again: the challenge is gone
        let replay = register_credential_response("cred-reg-replay-2", &options.challenge, 0);
        let result = finish_registration(&user.id, &replay, None).await;
        assert!(matches!(result, Err(PasskeyError::Challenge(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_finish_registration_rejects_foreign_challenge() {
        init_test_environment().await;
        let alice = create_test_user("reg-alice").await;
        let mallory = create_test_user("reg-mallory").await;

        let options = start_registration(&alice).await.unwrap();
        let response = register_credential_response("cred-reg-foreign", &options.challenge, 0);

        let result = finish_registration(&mallory.id, &response, None).await;
        assert!(matches!(result, Err(PasskeyError::Challenge(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_finish_registration_verifier_rejection() {
        init_test_environment().await;
        let user = create_test_user("reg-reject").await;

        let options = start_registration(&user).await.unwrap();
        // The mock verifier rejects attestation objects it cannot parse
        let mut response = register_credential_response("cred-reg-reject", &options.challenge, 0);
        response.response.attestation_object = "garbage".to_string();

        let result = finish_registration(&user.id, &response, None).await;
        assert!(matches!(result, Err(PasskeyError::Verification(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_finish_registration_duplicate_credential() {
        init_test_environment().await;
        let user = create_test_user("reg-dup").await;

        let options = start_registration(&user).await.unwrap();
        let response = register_credential_response("cred-reg-dup", &options.challenge, 0);
        finish_registration(&user.id, &response, None).await.unwrap();

        // Fresh challenge, same credential id
        let options = start_registration(&user).await.unwrap();
        let response = register_credential_response("cred-reg-dup", &options.challenge, 0);
        let result = finish_registration(&user.id, &response, None).await;
        assert!(matches!(result, Err(PasskeyError::Registration(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_finish_registration_rejects_unissued_challenge() {
        init_test_environment().await;
        let user = create_test_user("reg-unissued").await;

        let client_data = encode_client_data("webauthn.create", "never-issued-challenge");
        let mut response = register_credential_response("cred-x", "unused", 0);
        response.response.client_data_json = client_data;

        let result = finish_registration(&user.id, &response, None).await;
        assert!(matches!(result, Err(PasskeyError::Challenge(_))));
    }
}
