use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{db::User, AppError, AppResult};

use super::AuthUser;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn me(
    AuthUser(claims): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Value>> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id=?")
        .bind(claims.id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(json!({ "user": user })))
}
