use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Sqlite};

use crate::storage::{DB_TABLE_USERS, GENERIC_DATA_STORE};

use super::errors::UserError;
use super::types::User;

pub struct UserStore;

impl UserStore {
    /// Initialize the user table
    pub async fn init() -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            create_tables_sqlite(pool).await
        } else if let Some(pool) = store.as_postgres() {
            create_tables_postgres(pool).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Insert a new user. Fails with `Duplicate` if the email or username is
    /// already registered.
    #[tracing::instrument(skip(user), fields(user_id = %user.id))]
    pub async fn create_user(user: User) -> Result<User, UserError> {
        if Self::get_user_by_email(&user.email).await?.is_some() {
            return Err(UserError::Duplicate(
                "Email address is already registered".to_string(),
            ));
        }
        if Self::get_user_by_username(&user.username).await?.is_some() {
            return Err(UserError::Duplicate(
                "Username is already taken".to_string(),
            ));
        }

        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            insert_user_sqlite(pool, &user).await?;
        } else if let Some(pool) = store.as_postgres() {
            insert_user_postgres(pool, &user).await?;
        } else {
            return Err(UserError::Storage("Unsupported database type".to_string()));
        }

        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    /// Get a user by their ID
    #[tracing::instrument(fields(user_id = %id))]
    pub async fn get_user(id: &str) -> Result<Option<User>, UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_user_by_column_sqlite(pool, "id", id).await
        } else if let Some(pool) = store.as_postgres() {
            get_user_by_column_postgres(pool, "id", id).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Get a user by email. The lookup is lowercased, matching how emails
    /// are stored.
    pub async fn get_user_by_email(email: &str) -> Result<Option<User>, UserError> {
        let email = email.to_lowercase();
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_user_by_column_sqlite(pool, "email", &email).await
        } else if let Some(pool) = store.as_postgres() {
            get_user_by_column_postgres(pool, "email", &email).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    pub async fn get_user_by_username(username: &str) -> Result<Option<User>, UserError> {
        let username = username.to_lowercase();
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_user_by_column_sqlite(pool, "username", &username).await
        } else if let Some(pool) = store.as_postgres() {
            get_user_by_column_postgres(pool, "username", &username).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Record that a passkey registration proved control of the user's email
    pub async fn mark_email_verified(id: &str) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            set_email_verified_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            set_email_verified_postgres(pool, id).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Update the login timestamp after a successful authentication ceremony
    pub async fn touch_last_login(id: &str, at: DateTime<Utc>) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            touch_last_login_sqlite(pool, id, at).await
        } else if let Some(pool) = store.as_postgres() {
            touch_last_login_postgres(pool, id, at).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Flip the account's active flag. Deactivation is how accounts are
    /// retired; user rows are never deleted outside account deletion.
    pub async fn set_active(id: &str, is_active: bool) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            set_active_sqlite(pool, id, is_active).await
        } else if let Some(pool) = store.as_postgres() {
            set_active_postgres(pool, id, is_active).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Delete a user row. Credential cleanup is the caller's responsibility
    /// (see the account-deletion flow in the coordination layer).
    pub async fn delete_user(id: &str) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_user_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_user_postgres(pool, id).await
        } else {
            Err(UserError::Storage("Unsupported database type".to_string()))
        }
    }
}

// SQLite implementations
async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY NOT NULL,
            email TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_email_verified BOOLEAN NOT NULL DEFAULT FALSE,
            last_login_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        users_table
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn insert_user_sqlite(pool: &Pool<Sqlite>, user: &User) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (id, email, username, full_name, role, is_active, is_email_verified, last_login_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        users_table
    ))
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.full_name)
    .bind(&user.role)
    .bind(user.is_active)
    .bind(user.is_email_verified)
    .bind(user.last_login_at)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn get_user_by_column_sqlite(
    pool: &Pool<Sqlite>,
    column: &str,
    value: &str,
) -> Result<Option<User>, UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query_as::<_, User>(&format!(
        r#"SELECT * FROM {} WHERE {} = ?"#,
        users_table, column
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

async fn set_email_verified_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET is_email_verified = TRUE, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        users_table
    ))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn touch_last_login_sqlite(
    pool: &Pool<Sqlite>,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET last_login_at = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        users_table
    ))
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn set_active_sqlite(
    pool: &Pool<Sqlite>,
    id: &str,
    is_active: bool,
) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET is_active = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        users_table
    ))
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn delete_user_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(r#"DELETE FROM {} WHERE id = ?"#, users_table))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

// PostgreSQL implementations
async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY NOT NULL,
            email TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_email_verified BOOLEAN NOT NULL DEFAULT FALSE,
            last_login_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        users_table
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn insert_user_postgres(pool: &Pool<Postgres>, user: &User) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (id, email, username, full_name, role, is_active, is_email_verified, last_login_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
        users_table
    ))
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.full_name)
    .bind(&user.role)
    .bind(user.is_active)
    .bind(user.is_email_verified)
    .bind(user.last_login_at)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn get_user_by_column_postgres(
    pool: &Pool<Postgres>,
    column: &str,
    value: &str,
) -> Result<Option<User>, UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query_as::<_, User>(&format!(
        r#"SELECT * FROM {} WHERE {} = $1"#,
        users_table, column
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

async fn set_email_verified_postgres(pool: &Pool<Postgres>, id: &str) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET is_email_verified = TRUE, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        "#,
        users_table
    ))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn touch_last_login_postgres(
    pool: &Pool<Postgres>,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET last_login_at = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        "#,
        users_table
    ))
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn set_active_postgres(
    pool: &Pool<Postgres>,
    id: &str,
    is_active: bool,
) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET is_active = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        "#,
        users_table
    ))
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn delete_user_postgres(pool: &Pool<Postgres>, id: &str) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(r#"DELETE FROM {} WHERE id = $1"#, users_table))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}
