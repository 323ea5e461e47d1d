use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Row, Sqlite, postgres::PgRow, sqlite::SqliteRow};

use crate::storage::{DB_TABLE_PASSKEY_CREDENTIALS, DB_TABLE_USERS, GENERIC_DATA_STORE};

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{DeviceType, PasskeyCredential};

/// The credential registry: one row per registered passkey, keyed by the
/// authenticator-chosen credential id.
pub struct CredentialStore;

impl CredentialStore {
    pub async fn init() -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            create_tables_sqlite(pool).await
        } else if let Some(pool) = store.as_postgres() {
            create_tables_postgres(pool).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Append a credential. Credential ids are globally unique; a second
    /// insert with the same id fails with a registration error.
    pub async fn store_credential(credential: &PasskeyCredential) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            store_credential_sqlite(pool, credential).await
        } else if let Some(pool) = store.as_postgres() {
            store_credential_postgres(pool, credential).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Lookup by credential id — the authentication path, where the user is
    /// not known until the credential resolves them.
    pub async fn get_credential(
        credential_id: &str,
    ) -> Result<Option<PasskeyCredential>, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credential_sqlite(pool, credential_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_credential_postgres(pool, credential_id).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// All credentials owned by a user, oldest first.
    pub async fn get_credentials_by_user(
        user_id: &str,
    ) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credentials_by_user_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_credentials_by_user_postgres(pool, user_id).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Compare-and-set counter update after a verified authentication.
    ///
    /// The row is only written when the new counter is strictly greater than
    /// the stored one (or both are zero, for authenticators that do not
    /// implement counters). Losing the race, or presenting a regressed
    /// counter, yields `Replay`.
    pub async fn update_counter_and_usage(
        credential_id: &str,
        new_counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let updated = if let Some(pool) = store.as_sqlite() {
            update_counter_sqlite(pool, credential_id, new_counter, used_at).await?
        } else if let Some(pool) = store.as_postgres() {
            update_counter_postgres(pool, credential_id, new_counter, used_at).await?
        } else {
            return Err(PasskeyError::Storage("Unsupported database type".into()));
        };

        if updated == 0 {
            tracing::warn!(
                credential_id,
                new_counter,
                "Counter compare-and-set rejected the update"
            );
            return Err(PasskeyError::Replay(
                "Signature counter did not advance".to_string(),
            ));
        }

        Ok(())
    }

    /// Delete a credential, but only when owned by `user_id`. Returns false
    /// for a missing id and for an id owned by someone else, without
    /// distinguishing the two.
    pub async fn delete_credential(
        user_id: &str,
        credential_id: &str,
    ) -> Result<bool, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let deleted = if let Some(pool) = store.as_sqlite() {
            delete_credential_sqlite(pool, user_id, credential_id).await?
        } else if let Some(pool) = store.as_postgres() {
            delete_credential_postgres(pool, user_id, credential_id).await?
        } else {
            return Err(PasskeyError::Storage("Unsupported database type".into()));
        };

        Ok(deleted > 0)
    }

    /// Remove every credential a user owns (account deletion).
    pub async fn delete_credentials_by_user(user_id: &str) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_credentials_by_user_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_credentials_by_user_postgres(pool, user_id).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }
}

fn map_insert_error(e: sqlx::Error) -> PasskeyError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return PasskeyError::Registration("Credential already registered".to_string());
        }
    }
    PasskeyError::Storage(e.to_string())
}

// SQLite implementations
async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL REFERENCES {}(id),
            public_key TEXT NOT NULL,
            sign_count INTEGER NOT NULL DEFAULT 0,
            friendly_name TEXT NOT NULL,
            device_type TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_used_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        credentials_table, users_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_{}_user_id ON {}(user_id)"#,
        credentials_table.replace(".", "_"),
        credentials_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn store_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();
    let sign_count = credential.sign_count as i64;

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (credential_id, user_id, public_key, sign_count, friendly_name, device_type, created_at, last_used_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        credentials_table
    ))
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.public_key)
    .bind(sign_count)
    .bind(&credential.friendly_name)
    .bind(credential.device_type.as_str())
    .bind(credential.created_at)
    .bind(credential.last_used_at)
    .execute(pool)
    .await
    .map_err(map_insert_error)?;

    Ok(())
}

async fn get_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<Option<PasskeyCredential>, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query_as::<_, PasskeyCredential>(&format!(
        r#"SELECT * FROM {} WHERE credential_id = ?"#,
        credentials_table
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_credentials_by_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query_as::<_, PasskeyCredential>(&format!(
        r#"SELECT * FROM {} WHERE user_id = ? ORDER BY created_at"#,
        credentials_table
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn update_counter_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
    new_counter: u32,
    used_at: DateTime<Utc>,
) -> Result<u64, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();
    let counter = new_counter as i64;

    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET sign_count = ?, last_used_at = ?
        WHERE credential_id = ? AND (sign_count < ? OR (sign_count = 0 AND ? = 0))
        "#,
        credentials_table
    ))
    .bind(counter)
    .bind(used_at)
    .bind(credential_id)
    .bind(counter)
    .bind(counter)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}

async fn delete_credential_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    credential_id: &str,
) -> Result<u64, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let result = sqlx::query(&format!(
        r#"DELETE FROM {} WHERE credential_id = ? AND user_id = ?"#,
        credentials_table
    ))
    .bind(credential_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}

async fn delete_credentials_by_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"DELETE FROM {} WHERE user_id = ?"#,
        credentials_table
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

// PostgreSQL implementations
async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL REFERENCES {}(id),
            public_key TEXT NOT NULL,
            sign_count BIGINT NOT NULL DEFAULT 0,
            friendly_name TEXT NOT NULL,
            device_type TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_used_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        credentials_table, users_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_{}_user_id ON {}(user_id)"#,
        credentials_table.replace(".", "_"),
        credentials_table
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn store_credential_postgres(
    pool: &Pool<Postgres>,
    credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();
    let sign_count = credential.sign_count as i64;

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (credential_id, user_id, public_key, sign_count, friendly_name, device_type, created_at, last_used_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
        credentials_table
    ))
    .bind(&credential.credential_id)
    .bind(&credential.user_id)
    .bind(&credential.public_key)
    .bind(sign_count)
    .bind(&credential.friendly_name)
    .bind(credential.device_type.as_str())
    .bind(credential.created_at)
    .bind(credential.last_used_at)
    .execute(pool)
    .await
    .map_err(map_insert_error)?;

    Ok(())
}

async fn get_credential_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<Option<PasskeyCredential>, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query_as::<_, PasskeyCredential>(&format!(
        r#"SELECT * FROM {} WHERE credential_id = $1"#,
        credentials_table
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_credentials_by_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query_as::<_, PasskeyCredential>(&format!(
        r#"SELECT * FROM {} WHERE user_id = $1 ORDER BY created_at"#,
        credentials_table
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn update_counter_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    new_counter: u32,
    used_at: DateTime<Utc>,
) -> Result<u64, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();
    let counter = new_counter as i64;

    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET sign_count = $1, last_used_at = $2
        WHERE credential_id = $3 AND (sign_count < $1 OR (sign_count = 0 AND $1 = 0))
        "#,
        credentials_table
    ))
    .bind(counter)
    .bind(used_at)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}

async fn delete_credential_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    credential_id: &str,
) -> Result<u64, PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let result = sqlx::query(&format!(
        r#"DELETE FROM {} WHERE credential_id = $1 AND user_id = $2"#,
        credentials_table
    ))
    .bind(credential_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}

async fn delete_credentials_by_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<(), PasskeyError> {
    let credentials_table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"DELETE FROM {} WHERE user_id = $1"#,
        credentials_table
    ))
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

// Implement FromRow for PasskeyCredential to handle the flattened database
// structure for SQLite
impl<'r> FromRow<'r, SqliteRow> for PasskeyCredential {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let credential_id: String = row.try_get("credential_id")?;
        let user_id: String = row.try_get("user_id")?;
        let public_key: String = row.try_get("public_key")?;
        let sign_count: i64 = row.try_get("sign_count")?;
        let friendly_name: String = row.try_get("friendly_name")?;
        let device_type: String = row.try_get("device_type")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let last_used_at: DateTime<Utc> = row.try_get("last_used_at")?;

        Ok(PasskeyCredential {
            credential_id,
            user_id,
            public_key,
            sign_count: sign_count as u32,
            friendly_name,
            device_type: DeviceType::from_db(&device_type),
            created_at,
            last_used_at,
        })
    }
}

// Implement FromRow for PasskeyCredential to handle the flattened database
// structure for PostgreSQL
impl<'r> FromRow<'r, PgRow> for PasskeyCredential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let credential_id: String = row.try_get("credential_id")?;
        let user_id: String = row.try_get("user_id")?;
        let public_key: String = row.try_get("public_key")?;
        let sign_count: i64 = row.try_get("sign_count")?;
        let friendly_name: String = row.try_get("friendly_name")?;
        let device_type: String = row.try_get("device_type")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let last_used_at: DateTime<Utc> = row.try_get("last_used_at")?;

        Ok(PasskeyCredential {
            credential_id,
            user_id,
            public_key,
            sign_count: sign_count as u32,
            friendly_name,
            device_type: DeviceType::from_db(&device_type),
            created_at,
            last_used_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, init_test_environment};
    use serial_test::serial;

    fn test_credential(user_id: &str, sign_count: u32) -> PasskeyCredential {
        let now = Utc::now();
        PasskeyCredential {
            credential_id: format!("cred-{}", uuid::Uuid::new_v4()),
            user_id: user_id.to_string(),
            public_key: "dGVzdC1wdWJsaWMta2V5".to_string(),
            sign_count,
            friendly_name: "Passkey Device".to_string(),
            device_type: DeviceType::Platform,
            created_at: now,
            last_used_at: now,
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_store_and_get_credential() {
        init_test_environment().await;
        let user = create_test_user("cred-store").await;

        let credential = test_credential(&user.id, 0);
        CredentialStore::store_credential(&credential).await.unwrap();

        let fetched = CredentialStore::get_credential(&credential.credential_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.user_id, user.id);
        assert_eq!(fetched.sign_count, 0);
        assert_eq!(fetched.device_type, DeviceType::Platform);
    }

    #[tokio::test]
    #[serial]
    async fn test_duplicate_credential_id_rejected() {
        init_test_environment().await;
        let user = create_test_user("cred-dup").await;

        let credential = test_credential(&user.id, 0);
        CredentialStore::store_credential(&credential).await.unwrap();

        let result = CredentialStore::store_credential(&credential).await;
        assert!(matches!(result, Err(PasskeyError::Registration(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_list_by_user_is_ordered_by_creation() {
        init_test_environment().await;
        let user = create_test_user("cred-list").await;

        let mut first = test_credential(&user.id, 0);
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        let second = test_credential(&user.id, 0);

        // Insert newest first to prove ordering comes from the query
        CredentialStore::store_credential(&second).await.unwrap();
        CredentialStore::store_credential(&first).await.unwrap();

        let listed = CredentialStore::get_credentials_by_user(&user.id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].credential_id, first.credential_id);
        assert_eq!(listed[1].credential_id, second.credential_id);
    }

    #[tokio::test]
    #[serial]
    async fn test_counter_cas_accepts_only_advances() {
        init_test_environment().await;
        let user = create_test_user("cred-cas").await;

        let credential = test_credential(&user.id, 4);
        CredentialStore::store_credential(&credential).await.unwrap();

        // Regression: 3 <= 4
        let regress = CredentialStore::update_counter_and_usage(
            &credential.credential_id,
            3,
            Utc::now(),
        )
        .await;
        assert!(matches!(regress, Err(PasskeyError::Replay(_))));

        // Stagnation: 4 <= 4
        let stall = CredentialStore::update_counter_and_usage(
            &credential.credential_id,
            4,
            Utc::now(),
        )
        .await;
        assert!(matches!(stall, Err(PasskeyError::Replay(_))));

        // Advance: 5 > 4
        CredentialStore::update_counter_and_usage(&credential.credential_id, 5, Utc::now())
            .await
            .unwrap();

        let fetched = CredentialStore::get_credential(&credential.credential_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.sign_count, 5);
    }

    #[tokio::test]
    #[serial]
    async fn test_counter_zero_zero_exception() {
        init_test_environment().await;
        let user = create_test_user("cred-zero").await;

        let credential = test_credential(&user.id, 0);
        CredentialStore::store_credential(&credential).await.unwrap();

        // Authenticators without counters report 0 forever; that is not a replay
        CredentialStore::update_counter_and_usage(&credential.credential_id, 0, Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_delete_requires_ownership() {
        init_test_environment().await;
        let owner = create_test_user("cred-owner").await;
        let other = create_test_user("cred-other").await;

        let credential = test_credential(&owner.id, 0);
        CredentialStore::store_credential(&credential).await.unwrap();

        // Someone else's user id cannot delete it, and the result is
        // indistinguishable from a missing credential
        let foreign = CredentialStore::delete_credential(&other.id, &credential.credential_id)
            .await
            .unwrap();
        let missing = CredentialStore::delete_credential(&other.id, "no-such-credential")
            .await
            .unwrap();
        assert_eq!(foreign, missing);
        assert!(!foreign);

        let owned = CredentialStore::delete_credential(&owner.id, &credential.credential_id)
            .await
            .unwrap();
        assert!(owned);

        assert!(
            CredentialStore::get_credential(&credential.credential_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_delete_credentials_by_user() {
        init_test_environment().await;
        let user = create_test_user("cred-wipe").await;

        CredentialStore::store_credential(&test_credential(&user.id, 0))
            .await
            .unwrap();
        CredentialStore::store_credential(&test_credential(&user.id, 0))
            .await
            .unwrap();

        CredentialStore::delete_credentials_by_user(&user.id)
            .await
            .unwrap();

        assert!(
            CredentialStore::get_credentials_by_user(&user.id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
