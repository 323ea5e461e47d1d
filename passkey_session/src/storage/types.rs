use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data stored in the cache.
///
/// `expires_at` lets backends without native key expiry (the in-memory store)
/// honor TTLs at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheData {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
