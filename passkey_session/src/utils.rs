use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::rand::SecureRandom;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid format: {0}")]
    Format(String),
}

pub(crate) fn base64url_decode(input: &str) -> Result<Vec<u8>, UtilError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|_| UtilError::Format("Failed to decode base64url".to_string()))?;
    Ok(decoded)
}

pub(crate) fn base64url_encode(input: Vec<u8>) -> Result<String, UtilError> {
    Ok(URL_SAFE_NO_PAD.encode(input))
}

/// Generate `len` random bytes and return them base64url-encoded.
pub fn gen_random_string(len: usize) -> Result<String, UtilError> {
    let rng = ring::rand::SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| UtilError::Crypto("Failed to generate random string".to_string()))?;
    base64url_encode(bytes).map_err(|_| UtilError::Crypto("Failed to encode random string".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64url_roundtrip() {
        let input = b"challenge bytes \xff\x00\x7f".to_vec();
        let encoded = base64url_encode(input.clone()).unwrap();
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert_eq!(base64url_decode(&encoded).unwrap(), input);
    }

    #[test]
    fn test_base64url_decode_rejects_garbage() {
        let result = base64url_decode("not base64url!!");
        assert!(matches!(result, Err(UtilError::Format(_))));
    }

    #[test]
    fn test_gen_random_string_length_and_uniqueness() {
        let a = gen_random_string(32).unwrap();
        let b = gen_random_string(32).unwrap();

        // 32 bytes without padding encode to 43 characters
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }
}
