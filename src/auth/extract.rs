use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{AppError, AppResult};

use super::{Claims, Keys};

/// The caller behind `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn require_teacher(&self, denied: &str) -> AppResult<()> {
        if self.0.is_teacher() {
            Ok(())
        } else {
            Err(AppError::Forbidden(denied.to_owned()))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    Keys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split_once(' '))
            .map(|(_scheme, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("No token".into()))?;

        let keys = Keys::from_ref(state);
        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(err) => {
                tracing::debug!("rejected token: {err}");
                Err(AppError::Unauthorized("Invalid token".into()))
            }
        }
    }
}
