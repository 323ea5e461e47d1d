use async_trait::async_trait;
use std::sync::{Arc, OnceLock};

use super::config::{ORIGIN, PASSKEY_RP_ID};
use super::errors::PasskeyError;
use super::types::{
    AuthVerification, AuthenticatorResponse, CredentialMaterial, PasskeyCredential,
    RegisterCredential,
};

/// Relying-party parameters handed to the verifier with every ceremony.
#[derive(Clone, Debug)]
pub struct CeremonyContext {
    pub rp_id: String,
    pub origin: String,
}

impl CeremonyContext {
    pub(crate) fn from_config() -> Self {
        Self {
            rp_id: PASSKEY_RP_ID.to_string(),
            origin: ORIGIN.to_string(),
        }
    }
}

/// The cryptographic half of the WebAuthn ceremonies.
///
/// Signature verification, attestation parsing, and client-data validation
/// are delegated to an implementation of this trait; this crate only
/// orchestrates challenges, storage, and replay detection around it.
#[async_trait]
pub trait CeremonyVerifier: Send + Sync + 'static {
    /// Validate a credential-creation response against the issued challenge
    /// and return the material to store.
    async fn verify_registration(
        &self,
        context: &CeremonyContext,
        expected_challenge: &str,
        response: &RegisterCredential,
    ) -> Result<CredentialMaterial, PasskeyError>;

    /// Validate an assertion against the issued challenge and the stored
    /// credential, returning the authenticator-reported counter.
    async fn verify_authentication(
        &self,
        context: &CeremonyContext,
        expected_challenge: &str,
        response: &AuthenticatorResponse,
        credential: &PasskeyCredential,
    ) -> Result<AuthVerification, PasskeyError>;
}

static CEREMONY_VERIFIER: OnceLock<Arc<dyn CeremonyVerifier>> = OnceLock::new();

/// Register the process-wide ceremony verifier. Must be called once before
/// any ceremony finishes.
pub fn set_ceremony_verifier(verifier: Arc<dyn CeremonyVerifier>) -> Result<(), PasskeyError> {
    CEREMONY_VERIFIER
        .set(verifier)
        .map_err(|_| PasskeyError::Config("Ceremony verifier already registered".to_string()))
}

pub(super) fn ceremony_verifier() -> Result<Arc<dyn CeremonyVerifier>, PasskeyError> {
    CEREMONY_VERIFIER
        .get()
        .cloned()
        .ok_or_else(|| PasskeyError::Config("No ceremony verifier registered".to_string()))
}
