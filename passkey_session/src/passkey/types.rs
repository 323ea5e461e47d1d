use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::PasskeyError;
use crate::storage::CacheData;
use crate::utils::base64url_decode;

/// Authenticator attachment class reported at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    Platform,
    CrossPlatform,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Platform => "platform",
            DeviceType::CrossPlatform => "cross-platform",
        }
    }

    pub(crate) fn from_db(value: &str) -> Self {
        match value {
            "cross-platform" => DeviceType::CrossPlatform,
            _ => DeviceType::Platform,
        }
    }
}

/// Stored credential information for a WebAuthn/Passkey.
///
/// Contains everything needed to verify subsequent authentications with the
/// same credential: the public key, the credential id chosen by the
/// authenticator, and the monotonically non-decreasing signature counter.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PasskeyCredential {
    /// Credential ID chosen by the authenticator (globally unique, base64url)
    pub credential_id: String,
    /// Owning user (database ID)
    pub user_id: String,
    /// Opaque public key material, base64-encoded
    pub public_key: String,
    /// Authenticator-reported use counter; a regression is a replay signal
    pub sign_count: u32,
    /// User-chosen display label
    pub friendly_name: String,
    /// platform | cross-platform
    pub device_type: DeviceType,
    /// When the credential was registered
    pub created_at: DateTime<Utc>,
    /// When the credential last completed an authentication
    pub last_used_at: DateTime<Utc>,
}

/// Sanitized credential view for listings. Never carries the public key or
/// the counter outside this subsystem.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyCredentialSummary {
    pub credential_id: String,
    pub friendly_name: String,
    pub device_type: DeviceType,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl From<PasskeyCredential> for PasskeyCredentialSummary {
    fn from(credential: PasskeyCredential) -> Self {
        Self {
            credential_id: credential.credential_id,
            friendly_name: credential.friendly_name,
            device_type: credential.device_type,
            created_at: credential.created_at,
            last_used_at: credential.last_used_at,
        }
    }
}

/// Which ceremony a challenge was issued for. A challenge issued for one
/// purpose is invisible to the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChallengePurpose {
    Registration,
    Authentication,
}

impl ChallengePurpose {
    pub(crate) fn cache_prefix(&self) -> &'static str {
        match self {
            ChallengePurpose::Registration => "regi_challenge",
            ChallengePurpose::Authentication => "auth_challenge",
        }
    }
}

/// A live, not-yet-consumed ceremony challenge.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub(crate) struct StoredChallenge {
    pub(crate) challenge: String,
    /// Bound subject: the user id for registration, None for authentication
    pub(crate) user_id: Option<String>,
    /// Issuance time, unix seconds
    pub(crate) timestamp: u64,
    pub(crate) ttl: u64,
}

impl From<StoredChallenge> for CacheData {
    fn from(data: StoredChallenge) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(data.ttl as i64);
        Self {
            value: serde_json::to_string(&data).expect("Failed to serialize StoredChallenge"),
            expires_at,
        }
    }
}

impl TryFrom<CacheData> for StoredChallenge {
    type Error = PasskeyError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| PasskeyError::Storage(e.to_string()))
    }
}

/// Options for initiating a WebAuthn registration request, in the
/// navigator.credentials.create() shape.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub(crate) challenge: String,
    pub(crate) rp: RelyingParty,
    pub(crate) user: PublicKeyCredentialUserEntity,
    pub(crate) pub_key_cred_params: Vec<PubKeyCredParam>,
    pub(crate) exclude_credentials: Vec<CredentialDescriptor>,
    pub(crate) authenticator_selection: AuthenticatorSelection,
    pub(crate) timeout: u32,
    pub(crate) attestation: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct RelyingParty {
    pub(crate) name: String,
    pub(crate) id: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct PublicKeyCredentialUserEntity {
    /// WebAuthn user handle (base64url of the user id)
    pub id: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub(crate) type_: String,
    pub(crate) alg: i32,
}

#[derive(Serialize, Debug)]
pub(crate) struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub(crate) type_: String,
    pub(crate) id: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthenticatorSelection {
    pub(crate) authenticator_attachment: String,
    pub(crate) resident_key: String,
    pub(crate) user_verification: String,
}

/// Options for initiating a WebAuthn authentication request, in the
/// navigator.credentials.get() shape.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub(crate) challenge: String,
    pub(crate) timeout: u32,
    pub(crate) rp_id: String,
    /// Empty means unrestricted (discoverable-credential flow)
    pub(crate) allow_credentials: Vec<CredentialDescriptor>,
    pub(crate) user_verification: String,
}

/// Credential data received from the browser after credential creation.
#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredential {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AuthenticatorAttestationResponse,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
}

/// Assertion data received from the browser during authentication.
#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorResponse {
    pub id: String,
    pub raw_id: String,
    pub response: AuthenticatorAssertionResponse,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    pub user_handle: Option<String>,
}

/// What the ceremony verifier returns for an approved registration.
#[derive(Clone, Debug)]
pub struct CredentialMaterial {
    pub credential_id: String,
    pub public_key: String,
    pub sign_count: u32,
    pub device_type: DeviceType,
}

/// What the ceremony verifier returns for an approved authentication.
#[derive(Clone, Copy, Debug)]
pub struct AuthVerification {
    pub new_counter: u32,
}

/// Extract the challenge value a client response was produced against.
///
/// The clientDataJSON is base64url-encoded JSON whose `challenge` member
/// echoes the issued challenge; the full client-data validation (origin,
/// type) is the verifier's job.
pub(crate) fn embedded_challenge(client_data_json: &str) -> Result<String, PasskeyError> {
    let raw_data = base64url_decode(client_data_json)
        .map_err(|e| PasskeyError::ClientData(format!("Failed to decode client data: {e}")))?;

    let data: serde_json::Value = serde_json::from_slice(&raw_data)
        .map_err(|e| PasskeyError::ClientData(format!("Invalid client data JSON: {e}")))?;

    data["challenge"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| PasskeyError::ClientData("Missing challenge".into()))
}
