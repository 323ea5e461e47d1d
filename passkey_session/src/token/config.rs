use std::{env, sync::LazyLock};

/// Signing secret for access tokens. Kept separate from the refresh secret
/// so one kind can never be replayed as the other.
pub(super) static JWT_ACCESS_TOKEN_SECRET: LazyLock<String> = LazyLock::new(|| {
    env::var("JWT_ACCESS_TOKEN_SECRET").expect("JWT_ACCESS_TOKEN_SECRET must be set")
});

pub(super) static JWT_REFRESH_TOKEN_SECRET: LazyLock<String> = LazyLock::new(|| {
    env::var("JWT_REFRESH_TOKEN_SECRET").expect("JWT_REFRESH_TOKEN_SECRET must be set")
});

/// Access token lifetime in seconds (default one hour)
pub(super) static JWT_ACCESS_TOKEN_TTL: LazyLock<i64> = LazyLock::new(|| {
    env::var("JWT_ACCESS_TOKEN_TTL")
        .map(|v| v.parse::<i64>().unwrap_or(3600))
        .unwrap_or(3600)
});

/// Refresh token lifetime in seconds (default seven days)
pub(super) static JWT_REFRESH_TOKEN_TTL: LazyLock<i64> = LazyLock::new(|| {
    env::var("JWT_REFRESH_TOKEN_TTL")
        .map(|v| v.parse::<i64>().unwrap_or(604_800))
        .unwrap_or(604_800)
});
