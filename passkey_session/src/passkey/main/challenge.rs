use std::time::SystemTime;

use crate::passkey::config::PASSKEY_CHALLENGE_TTL;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{ChallengePurpose, StoredChallenge};
use crate::storage::GENERIC_CACHE_STORE;
use crate::utils::gen_random_string;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Issue a fresh single-use challenge for the given ceremony.
///
/// The challenge value doubles as the cache key, so the "finish" step can
/// consume it with nothing but the value echoed in the client response.
pub(crate) async fn issue_challenge(
    purpose: ChallengePurpose,
    subject: Option<&str>,
) -> Result<StoredChallenge, PasskeyError> {
    let challenge = gen_random_string(32)?;

    let stored = StoredChallenge {
        challenge: challenge.clone(),
        user_id: subject.map(String::from),
        timestamp: now_secs(),
        ttl: PASSKEY_CHALLENGE_TTL,
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            purpose.cache_prefix(),
            &challenge,
            stored.clone().into(),
            PASSKEY_CHALLENGE_TTL as usize,
        )
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    tracing::debug!(purpose = purpose.cache_prefix(), "Issued ceremony challenge");

    Ok(stored)
}

/// Atomically consume a challenge: remove it from the store and return it.
///
/// Exactly one concurrent caller can succeed for a given value; everyone
/// else, and every caller presenting an expired or unknown value, gets a
/// `Challenge` error. Expiry is honored here even if the backing store has
/// not evicted the entry yet.
pub(crate) async fn consume_challenge(
    purpose: ChallengePurpose,
    value: &str,
) -> Result<StoredChallenge, PasskeyError> {
    let taken = GENERIC_CACHE_STORE
        .lock()
        .await
        .take(purpose.cache_prefix(), value)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    let stored: StoredChallenge = taken
        .ok_or_else(|| PasskeyError::Challenge("Challenge not found or already used".to_string()))?
        .try_into()?;

    let age = now_secs().saturating_sub(stored.timestamp);
    if age > stored.ttl {
        tracing::warn!(age, ttl = stored.ttl, "Challenge expired before consumption");
        return Err(PasskeyError::Challenge("Challenge has expired".to_string()));
    }

    Ok(stored)
}
