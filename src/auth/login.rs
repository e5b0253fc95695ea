use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{db::User, AppError, AppResult};

use super::{trimmed, verify_password, Claims, Keys};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    email: Option<String>,
    phone: Option<String>,
    password: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    State(keys): State<Keys>,
    Json(LoginBody { email, phone, password }): Json<LoginBody>,
) -> AppResult<Json<Value>> {
    let identifier = trimmed(email).or(trimmed(phone));
    let (Some(identifier), Some(password)) = (identifier, trimmed(password)) else {
        return Err(AppError::BadRequest("Missing fields".into()));
    };

    // an email and a phone number could in theory spell the same string
    let candidates: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE email=? OR phone=?")
        .bind(&identifier)
        .bind(&identifier)
        .fetch_all(&db_pool)
        .await?;

    let Some(user) = candidates
        .into_iter()
        .find(|user| verify_password(&password, &user.password))
    else {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    let token = keys.issue(&Claims::for_user(&user, OffsetDateTime::now_utc()))?;
    tracing::info!(user = user.id, "login");

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": user.id,
            "name": user.name,
            "role": user.role,
            "email": user.email,
            "phone": user.phone,
            "college": user.college,
        },
    })))
}
