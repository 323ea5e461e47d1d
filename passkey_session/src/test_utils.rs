//! Shared test initialization and ceremony fixtures.
//!
//! Tests run against the global stores (SQLite file database + in-memory
//! cache), so the environment is seeded exactly once per process and the
//! mock ceremony verifier is registered before any ceremony finishes.

use std::env;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::passkey::{
    AuthVerification, AuthenticatorResponse, CeremonyContext, CeremonyVerifier,
    CredentialMaterial, DeviceType, PasskeyCredential, PasskeyError, RegisterCredential,
    set_ceremony_verifier,
};
use crate::userdb::{User, UserStore};

const TEST_SQLITE_PATH: &str = "/tmp/passkey_session_test.db";

/// A ceremony verifier driven entirely by the response payload, so tests
/// can exercise success and failure paths without real authenticators:
///
/// - registration approves `attestation_object` of the form
///   `material:<counter>`, minting the credential from the response's id
/// - authentication approves `signature` of the form `ok:<counter>`
///
/// Both directions still insist the client data echoes the expected
/// challenge, like a real verifier would.
struct MockCeremonyVerifier;

fn challenge_matches(client_data_json: &str, expected: &str) -> Result<(), PasskeyError> {
    let raw = URL_SAFE_NO_PAD
        .decode(client_data_json)
        .map_err(|_| PasskeyError::Verification("Unreadable client data".to_string()))?;
    let data: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|_| PasskeyError::Verification("Unreadable client data".to_string()))?;

    if data["challenge"].as_str() != Some(expected) {
        return Err(PasskeyError::Verification("Challenge mismatch".to_string()));
    }
    Ok(())
}

#[async_trait]
impl CeremonyVerifier for MockCeremonyVerifier {
    async fn verify_registration(
        &self,
        _context: &CeremonyContext,
        expected_challenge: &str,
        response: &RegisterCredential,
    ) -> Result<CredentialMaterial, PasskeyError> {
        challenge_matches(&response.response.client_data_json, expected_challenge)?;

        let counter = response
            .response
            .attestation_object
            .strip_prefix("material:")
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| PasskeyError::Verification("Attestation rejected".to_string()))?;

        Ok(CredentialMaterial {
            credential_id: response.raw_id.clone(),
            public_key: "dGVzdC1wdWJsaWMta2V5".to_string(),
            sign_count: counter,
            device_type: DeviceType::Platform,
        })
    }

    async fn verify_authentication(
        &self,
        _context: &CeremonyContext,
        expected_challenge: &str,
        response: &AuthenticatorResponse,
        _credential: &PasskeyCredential,
    ) -> Result<AuthVerification, PasskeyError> {
        challenge_matches(&response.response.client_data_json, expected_challenge)?;

        let new_counter = response
            .response
            .signature
            .strip_prefix("ok:")
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| PasskeyError::Verification("Signature rejected".to_string()))?;

        Ok(AuthVerification { new_counter })
    }
}

/// Centralized test initialization for all tests across the crate.
///
/// Seeds the environment (preferring `.env_test` when present, with
/// self-contained fallbacks), wipes the previous SQLite test database,
/// initializes every store, and registers the mock verifier.
pub async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }

        let data_store_url = format!("sqlite:{TEST_SQLITE_PATH}");
        let defaults = [
            ("GENERIC_DATA_STORE_TYPE", "sqlite"),
            ("GENERIC_DATA_STORE_URL", data_store_url.as_str()),
            ("GENERIC_CACHE_STORE_TYPE", "memory"),
            ("ORIGIN", "http://localhost:4200"),
            ("JWT_ACCESS_TOKEN_SECRET", "test-access-secret"),
            ("JWT_REFRESH_TOKEN_SECRET", "test-refresh-secret"),
        ];
        for (key, value) in defaults {
            if env::var(key).is_err() {
                // Setting process env is inherently global state; tests only
                // do it once, before any store is touched
                unsafe {
                    env::set_var(key, value);
                }
            }
        }

        // Start from an empty database each run
        let _ = std::fs::remove_file(TEST_SQLITE_PATH);

        // The verifier registry is set-once per process; a second call from
        // another test binary path is fine to ignore
        let _ = set_ceremony_verifier(Arc::new(MockCeremonyVerifier));
    });

    ensure_stores_initialized().await;
}

async fn ensure_stores_initialized() {
    if let Err(e) = crate::userdb::init().await {
        eprintln!("Warning: Failed to initialize UserStore: {e}");
    }
    if let Err(e) = crate::passkey::init().await {
        eprintln!("Warning: Failed to initialize CredentialStore: {e}");
    }
    if let Err(e) = crate::token::init().await {
        eprintln!("Warning: Failed to initialize RevocationStore: {e}");
    }
}

/// Base64url-encoded clientDataJSON with the given type and challenge.
pub fn encode_client_data(type_: &str, challenge: &str) -> String {
    let data = serde_json::json!({
        "type": type_,
        "challenge": challenge,
        "origin": "http://localhost:4200",
    });
    URL_SAFE_NO_PAD.encode(data.to_string())
}

/// A registration response the mock verifier approves at the given counter.
pub fn register_credential_response(
    credential_id: &str,
    challenge: &str,
    counter: u32,
) -> RegisterCredential {
    RegisterCredential {
        id: credential_id.to_string(),
        raw_id: credential_id.to_string(),
        type_: "public-key".to_string(),
        response: crate::passkey::AuthenticatorAttestationResponse {
            client_data_json: encode_client_data("webauthn.create", challenge),
            attestation_object: format!("material:{counter}"),
        },
    }
}

/// An assertion the mock verifier approves with the given reported counter.
pub fn authenticator_response(
    credential_id: &str,
    challenge: &str,
    counter: u32,
) -> AuthenticatorResponse {
    AuthenticatorResponse {
        id: credential_id.to_string(),
        raw_id: credential_id.to_string(),
        response: crate::passkey::AuthenticatorAssertionResponse {
            client_data_json: encode_client_data("webauthn.get", challenge),
            authenticator_data: "test-authenticator-data".to_string(),
            signature: format!("ok:{counter}"),
            user_handle: None,
        },
    }
}

/// Create a user with unique email/username derived from `tag`.
pub async fn create_test_user(tag: &str) -> User {
    let nonce = uuid::Uuid::new_v4();
    let user = User::new(
        nonce.to_string(),
        format!("{tag}-{nonce}@example.com"),
        format!("{tag}-{nonce}"),
        format!("Test User {tag}"),
    );
    UserStore::create_user(user)
        .await
        .expect("Failed to create test user")
}

/// Run the full registration ceremony for an existing user, returning the
/// credential id.
pub async fn register_test_passkey(user_id: &str, credential_id: &str) -> String {
    let user = UserStore::get_user(user_id)
        .await
        .expect("Failed to load test user")
        .expect("Test user missing");

    let options = crate::passkey::start_registration(&user)
        .await
        .expect("Failed to start registration");
    let response = register_credential_response(credential_id, &options.challenge, 0);
    crate::passkey::finish_registration(user_id, &response, None)
        .await
        .expect("Failed to finish registration");

    credential_id.to_string()
}
