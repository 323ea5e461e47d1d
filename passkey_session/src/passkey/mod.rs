mod config;
mod errors;
mod main;
mod storage;
mod types;
mod verifier;

pub use errors::PasskeyError;
pub use storage::CredentialStore;
pub use types::{
    AuthVerification, AuthenticationOptions, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, AuthenticatorResponse, CredentialMaterial, DeviceType,
    PasskeyCredential, PasskeyCredentialSummary, PublicKeyCredentialUserEntity,
    RegisterCredential, RegistrationOptions,
};
pub use verifier::{CeremonyContext, CeremonyVerifier, set_ceremony_verifier};

pub(crate) use main::{
    finish_authentication, finish_registration, start_authentication, start_registration,
};

pub(crate) async fn init() -> Result<(), PasskeyError> {
    CredentialStore::init().await
}
