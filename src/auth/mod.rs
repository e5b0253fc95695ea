mod extract;
mod login;
mod me;
mod password;
mod register;
mod token;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use extract::AuthUser;
pub use password::{hash_password, verify_password};
pub use token::{Claims, Keys, TOKEN_LIFETIME};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/me", get(me::me))
}

/// Trims a form value; blank counts as absent.
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
