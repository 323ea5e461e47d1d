//! passkey_session - Passkey credential lifecycle and session token management
//!
//! This crate implements the challenge-response ceremonies for registering
//! and authenticating WebAuthn passkeys, the credential registry with
//! replay protection behind them, and the access/refresh bearer token
//! service (issuance, rotation, revocation) that turns a verified ceremony
//! into a session.
//!
//! The cryptographic half of WebAuthn (signature verification, attestation
//! parsing) is deliberately not implemented here: it is delegated to a
//! [`CeremonyVerifier`] registered at startup. Everything around that seam
//! - what is stored, when challenges are issued and expire, how replays
//! are detected, and how tokens are minted and revoked - lives in this
//! crate.

mod coordination;
mod passkey;
mod storage;
mod token;
mod userdb;
mod utils;

#[cfg(test)]
mod test_utils;

// The public session operations
pub use coordination::{
    CoordinationError, delete_passkey_credential_core, delete_user_account_core,
    get_authorized_user_core, handle_finish_authentication_core,
    handle_finish_registration_core, handle_start_authentication_core,
    handle_start_registration_core, list_passkey_credentials_core, logout_core,
    refresh_access_token_core, register_user_core,
};

// The verifier seam and the ceremony data types a transport layer needs
pub use passkey::{
    AuthVerification, AuthenticationOptions, AuthenticatorAssertionResponse,
    AuthenticatorAttestationResponse, AuthenticatorResponse, CeremonyContext, CeremonyVerifier,
    CredentialMaterial, DeviceType, PasskeyCredential, PasskeyCredentialSummary, PasskeyError,
    PublicKeyCredentialUserEntity, RegisterCredential, RegistrationOptions, set_ceremony_verifier,
};

pub use token::{
    TokenClaims, TokenError, TokenKind, TokenPair, is_revoked, mint_token_pair,
    refresh_token_pair, revoke_token, verify_token,
};

pub use userdb::{User, UserError};

pub use utils::gen_random_string;

/// Initialize the underlying stores. Call once at startup, before serving
/// any session operation.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    storage::init().await?;
    userdb::init().await?;
    passkey::init().await?;
    token::init().await?;
    Ok(())
}
