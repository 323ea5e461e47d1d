use chrono::Utc;
use sqlx::{Pool, Postgres, Sqlite};

use crate::storage::{DB_TABLE_REVOKED_TOKENS, GENERIC_DATA_STORE};

use crate::token::errors::TokenError;
use crate::token::types::RevokedToken;

/// The revocation ledger. Rows are written on logout/revoke, read on every
/// verification path, never updated, and garbage-collectable once the
/// underlying token's own expiry has passed.
pub struct RevocationStore;

impl RevocationStore {
    pub async fn init() -> Result<(), TokenError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            create_tables_sqlite(pool).await
        } else if let Some(pool) = store.as_postgres() {
            create_tables_postgres(pool).await
        } else {
            Err(TokenError::Storage("Unsupported database type".into()))
        }
    }

    /// Insert a ledger entry. Revoking the same token twice is a no-op.
    pub async fn insert(entry: RevokedToken) -> Result<(), TokenError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            insert_sqlite(pool, &entry).await
        } else if let Some(pool) = store.as_postgres() {
            insert_postgres(pool, &entry).await
        } else {
            Err(TokenError::Storage("Unsupported database type".into()))
        }
    }

    /// Ledger membership check. Entries past their own expiry are invisible
    /// even before they are physically pruned.
    pub async fn is_listed(token_hash: &str) -> Result<bool, TokenError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            is_listed_sqlite(pool, token_hash).await
        } else if let Some(pool) = store.as_postgres() {
            is_listed_postgres(pool, token_hash).await
        } else {
            Err(TokenError::Storage("Unsupported database type".into()))
        }
    }

    /// Drop ledger entries whose token has expired on its own. Correctness
    /// never depends on calling this; it only bounds table growth.
    pub async fn prune_expired() -> Result<u64, TokenError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let pruned = if let Some(pool) = store.as_sqlite() {
            prune_expired_sqlite(pool).await?
        } else if let Some(pool) = store.as_postgres() {
            prune_expired_postgres(pool).await?
        } else {
            return Err(TokenError::Storage("Unsupported database type".into()));
        };

        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired revocation ledger entries");
        }

        Ok(pruned)
    }
}

// SQLite implementations
async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            token_hash TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            token_kind TEXT NOT NULL,
            revoked_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at TIMESTAMP NOT NULL
        )
        "#,
        revoked_table
    ))
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_{}_expires_at ON {}(expires_at)"#,
        revoked_table.replace(".", "_"),
        revoked_table
    ))
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(())
}

async fn insert_sqlite(pool: &Pool<Sqlite>, entry: &RevokedToken) -> Result<(), TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {} (token_hash, user_id, token_kind, revoked_at, expires_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (token_hash) DO NOTHING
        "#,
        revoked_table
    ))
    .bind(&entry.token_hash)
    .bind(&entry.user_id)
    .bind(&entry.token_kind)
    .bind(entry.revoked_at)
    .bind(entry.expires_at)
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(())
}

async fn is_listed_sqlite(pool: &Pool<Sqlite>, token_hash: &str) -> Result<bool, TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    let row: Option<(i64,)> = sqlx::query_as(&format!(
        r#"SELECT 1 FROM {} WHERE token_hash = ? AND expires_at > ?"#,
        revoked_table
    ))
    .bind(token_hash)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(row.is_some())
}

async fn prune_expired_sqlite(pool: &Pool<Sqlite>) -> Result<u64, TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    let result = sqlx::query(&format!(
        r#"DELETE FROM {} WHERE expires_at <= ?"#,
        revoked_table
    ))
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}

// PostgreSQL implementations
async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            token_hash TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            token_kind TEXT NOT NULL,
            revoked_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#,
        revoked_table
    ))
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_{}_expires_at ON {}(expires_at)"#,
        revoked_table.replace(".", "_"),
        revoked_table
    ))
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(())
}

async fn insert_postgres(pool: &Pool<Postgres>, entry: &RevokedToken) -> Result<(), TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {} (token_hash, user_id, token_kind, revoked_at, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (token_hash) DO NOTHING
        "#,
        revoked_table
    ))
    .bind(&entry.token_hash)
    .bind(&entry.user_id)
    .bind(&entry.token_kind)
    .bind(entry.revoked_at)
    .bind(entry.expires_at)
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(())
}

async fn is_listed_postgres(pool: &Pool<Postgres>, token_hash: &str) -> Result<bool, TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    let row: Option<(i32,)> = sqlx::query_as(&format!(
        r#"SELECT 1 FROM {} WHERE token_hash = $1 AND expires_at > $2"#,
        revoked_table
    ))
    .bind(token_hash)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(row.is_some())
}

async fn prune_expired_postgres(pool: &Pool<Postgres>) -> Result<u64, TokenError> {
    let revoked_table = DB_TABLE_REVOKED_TOKENS.as_str();

    let result = sqlx::query(&format!(
        r#"DELETE FROM {} WHERE expires_at <= $1"#,
        revoked_table
    ))
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| TokenError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use chrono::Duration;
    use serial_test::serial;

    fn entry(hash: &str, expires_in_secs: i64) -> RevokedToken {
        RevokedToken {
            token_hash: hash.to_string(),
            user_id: "user-ledger".to_string(),
            token_kind: "refresh".to_string(),
            revoked_at: Utc::now(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_insert_and_membership() {
        init_test_environment().await;

        let hash = format!("hash-{}", uuid::Uuid::new_v4());
        RevocationStore::insert(entry(&hash, 3600)).await.unwrap();

        assert!(RevocationStore::is_listed(&hash).await.unwrap());
        assert!(!RevocationStore::is_listed("hash-absent").await.unwrap());
    }

    #[tokio::test]
    #[serial]
    async fn test_insert_is_idempotent() {
        init_test_environment().await;

        let hash = format!("hash-{}", uuid::Uuid::new_v4());
        RevocationStore::insert(entry(&hash, 3600)).await.unwrap();
        RevocationStore::insert(entry(&hash, 3600)).await.unwrap();

        assert!(RevocationStore::is_listed(&hash).await.unwrap());
    }

    #[tokio::test]
    #[serial]
    async fn test_expired_entries_are_invisible_and_prunable() {
        init_test_environment().await;

        let hash = format!("hash-{}", uuid::Uuid::new_v4());
        RevocationStore::insert(entry(&hash, -10)).await.unwrap();

        // Invisible to membership checks even before pruning
        assert!(!RevocationStore::is_listed(&hash).await.unwrap());

        let pruned = RevocationStore::prune_expired().await.unwrap();
        assert!(pruned >= 1);
        assert!(!RevocationStore::is_listed(&hash).await.unwrap());
    }
}
