mod cache_store;
mod data_store;
mod errors;
mod types;

pub async fn init() -> Result<(), errors::StorageError> {
    let _ = *cache_store::GENERIC_CACHE_STORE;
    let _ = *data_store::GENERIC_DATA_STORE;

    Ok(())
}

pub use cache_store::GENERIC_CACHE_STORE;
pub use errors::StorageError;
pub use types::CacheData;

pub(crate) use data_store::{
    DB_TABLE_PASSKEY_CREDENTIALS, DB_TABLE_REVOKED_TOKENS, DB_TABLE_USERS, GENERIC_DATA_STORE,
};
