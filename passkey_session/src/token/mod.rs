mod config;
mod errors;
mod main;
mod storage;
mod types;

pub use errors::TokenError;
pub use storage::RevocationStore;
pub use types::{TokenClaims, TokenKind, TokenPair};

pub use main::{is_revoked, mint_token_pair, refresh_token_pair, revoke_token, verify_token};

pub(crate) async fn init() -> Result<(), TokenError> {
    RevocationStore::init().await
}
