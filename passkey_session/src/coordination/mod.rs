mod errors;
mod passkey;
mod tokens;
mod user;

pub use errors::CoordinationError;
pub use passkey::{
    delete_passkey_credential_core, handle_finish_authentication_core,
    handle_finish_registration_core, handle_start_authentication_core,
    handle_start_registration_core, list_passkey_credentials_core,
};
pub use tokens::{get_authorized_user_core, logout_core, refresh_access_token_core};
pub use user::{delete_user_account_core, register_user_core};
