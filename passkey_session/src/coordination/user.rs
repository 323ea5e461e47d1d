use crate::passkey::CredentialStore;
use crate::userdb::{User, UserStore};

use super::errors::{CoordinationError, map_ceremony_error, map_user_error};

/// Generate a new unique user ID
fn gen_new_user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Register a new user (step 1 of onboarding: identity capture; a passkey
/// is registered separately).
pub async fn register_user_core(
    full_name: &str,
    email: &str,
    username: &str,
) -> Result<User, CoordinationError> {
    if full_name.trim().is_empty() || email.trim().is_empty() || username.trim().is_empty() {
        return Err(CoordinationError::InvalidInput(
            "Full name, email and username are required".to_string(),
        )
        .log());
    }
    if !email.contains('@') {
        return Err(CoordinationError::InvalidInput("Invalid email format".to_string()).log());
    }

    let user = User::new(
        gen_new_user_id(),
        email.to_string(),
        username.to_string(),
        full_name.to_string(),
    );

    let created = UserStore::create_user(user).await.map_err(map_user_error)?;

    tracing::info!(user_id = %created.id, "Registered user");

    Ok(created)
}

/// Delete a user account and, because credentials are strongly owned,
/// every passkey registered to it.
pub async fn delete_user_account_core(user_id: &str) -> Result<(), CoordinationError> {
    let user = UserStore::get_user(user_id)
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| CoordinationError::UserNotFound.log())?;

    CredentialStore::delete_credentials_by_user(&user.id)
        .await
        .map_err(map_ceremony_error)?;

    UserStore::delete_user(&user.id).await.map_err(map_user_error)?;

    tracing::info!(user_id = %user.id, "Deleted user account and owned credentials");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use serial_test::serial;

    fn unique(tag: &str) -> (String, String) {
        let nonce = uuid::Uuid::new_v4();
        (format!("{tag}-{nonce}@example.com"), format!("{tag}-{nonce}"))
    }

    #[tokio::test]
    #[serial]
    async fn test_register_user() {
        init_test_environment().await;
        let (email, username) = unique("facade-reg");

        let user = register_user_core("Alice Liddell", &email, &username)
            .await
            .unwrap();

        assert_eq!(user.full_name, "Alice Liddell");
        assert_eq!(user.email, email);
        assert!(user.is_active);
        assert!(!user.is_email_verified);
    }

    #[tokio::test]
    #[serial]
    async fn test_register_user_requires_all_fields() {
        init_test_environment().await;

        let result = register_user_core("", "a@example.com", "alice").await;
        assert!(matches!(result, Err(CoordinationError::InvalidInput(_))));

        let result = register_user_core("Alice", "not-an-email", "alice").await;
        assert!(matches!(result, Err(CoordinationError::InvalidInput(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_register_user_duplicate_email_conflicts() {
        init_test_environment().await;
        let (email, username) = unique("facade-dup");

        register_user_core("First", &email, &username).await.unwrap();

        let result = register_user_core("Second", &email, "someone-else").await;
        assert!(matches!(result, Err(CoordinationError::Conflict(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_delete_account_removes_credentials() {
        init_test_environment().await;
        let user = crate::test_utils::create_test_user("facade-del").await;
        let credential_id =
            crate::test_utils::register_test_passkey(&user.id, "cred-facade-del").await;

        delete_user_account_core(&user.id).await.unwrap();

        assert!(UserStore::get_user(&user.id).await.unwrap().is_none());
        assert!(
            CredentialStore::get_credential(&credential_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_delete_missing_account() {
        init_test_environment().await;

        let result = delete_user_account_core("no-such-user").await;
        assert!(matches!(result, Err(CoordinationError::UserNotFound)));
    }
}
