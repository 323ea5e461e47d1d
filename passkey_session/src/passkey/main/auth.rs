use chrono::Utc;

use super::challenge::{consume_challenge, issue_challenge};

use crate::passkey::config::{PASSKEY_RP_ID, PASSKEY_TIMEOUT, PASSKEY_USER_VERIFICATION};
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::CredentialStore;
use crate::passkey::types::{
    AuthenticationOptions, AuthenticatorResponse, ChallengePurpose, CredentialDescriptor,
    PasskeyCredential, embedded_challenge,
};
use crate::passkey::verifier::{CeremonyContext, ceremony_verifier};

/// Begin an authentication ceremony.
///
/// `allow_credential_ids` is a UX hint, not a security boundary: when empty
/// the request is unrestricted and discoverable credentials resolve the user
/// on their own.
pub(crate) async fn start_authentication(
    allow_credential_ids: Vec<String>,
) -> Result<AuthenticationOptions, PasskeyError> {
    let allow_credentials = allow_credential_ids
        .into_iter()
        .map(|id| CredentialDescriptor {
            type_: "public-key".to_string(),
            id,
        })
        .collect();

    let stored = issue_challenge(ChallengePurpose::Authentication, None).await?;

    let options = AuthenticationOptions {
        challenge: stored.challenge,
        timeout: (*PASSKEY_TIMEOUT) * 1000, // Convert seconds to milliseconds
        rp_id: PASSKEY_RP_ID.to_string(),
        allow_credentials,
        user_verification: PASSKEY_USER_VERIFICATION.to_string(),
    };

    tracing::debug!("Authentication options issued");

    Ok(options)
}

/// Finish an authentication ceremony.
///
/// Consumes the challenge, resolves the credential by the id the
/// authenticator supplied, delegates signature verification, enforces the
/// counter-regression rule, and commits the new counter with a
/// compare-and-set. Returns the credential (which carries the resolved user
/// id) and the committed counter.
pub(crate) async fn finish_authentication(
    auth_response: &AuthenticatorResponse,
) -> Result<(PasskeyCredential, u32), PasskeyError> {
    let challenge_value = embedded_challenge(&auth_response.response.client_data_json)?;
    let stored_challenge =
        consume_challenge(ChallengePurpose::Authentication, &challenge_value).await?;

    let credential = CredentialStore::get_credential(&auth_response.id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Authentication attempt with unknown credential id");
            PasskeyError::NotFound("Credential not found".into())
        })?;

    let context = CeremonyContext::from_config();
    let verification = ceremony_verifier()?
        .verify_authentication(&context, &stored_challenge.challenge, auth_response, &credential)
        .await?;

    verify_counter(&credential, verification.new_counter)?;

    // The store re-checks the counter under a compare-and-set, so a
    // concurrent authentication that already advanced it turns this call
    // into a replay failure rather than a silent overwrite
    CredentialStore::update_counter_and_usage(
        &credential.credential_id,
        verification.new_counter,
        Utc::now(),
    )
    .await?;

    tracing::info!(
        credential_id = %credential.credential_id,
        user_id = %credential.user_id,
        "Passkey authentication verified"
    );

    Ok((credential, verification.new_counter))
}

/// Enforce the monotonic counter rule.
///
/// A reported counter at or below the stored one means a cloned
/// authenticator or a replayed assertion. The exception is 0/0:
/// authenticators that do not implement counters report 0 forever.
fn verify_counter(credential: &PasskeyCredential, reported: u32) -> Result<(), PasskeyError> {
    if reported == 0 && credential.sign_count == 0 {
        tracing::debug!(
            credential_id = %credential.credential_id,
            "Authenticator does not implement a signature counter"
        );
        return Ok(());
    }

    if reported <= credential.sign_count {
        tracing::warn!(
            credential_id = %credential.credential_id,
            stored = credential.sign_count,
            reported,
            "Signature counter regression - possible credential cloning"
        );
        return Err(PasskeyError::Replay(
            "Signature counter regression detected".to_string(),
        ));
    }

    Ok(())
}
