use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{auth::{trimmed, AuthUser}, db::Classroom, AppError, AppResult};

use super::ensure_member;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn join(
    AuthUser(claims): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(classroom_id): Path<i64>,
) -> AppResult<Json<Value>> {
    if super::find(&db_pool, classroom_id).await?.is_none() {
        return Err(AppError::NotFound("Classroom not found".into()));
    }

    if ensure_member(&db_pool, classroom_id, claims.id).await? {
        tracing::info!(classroom = classroom_id, user = claims.id, "joined classroom");
    }

    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct JoinByCodeBody {
    code: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn join_by_code(
    AuthUser(claims): AuthUser,
    State(db_pool): State<SqlitePool>,
    Json(JoinByCodeBody { code }): Json<JoinByCodeBody>,
) -> AppResult<Json<Value>> {
    let code = trimmed(code).unwrap_or_default();

    let Some(classroom): Option<Classroom> = sqlx::query_as("SELECT * FROM classrooms WHERE code=?")
        .bind(&code)
        .fetch_optional(&db_pool)
        .await?
    else {
        return Err(AppError::NotFound("Classroom not found".into()));
    };

    if ensure_member(&db_pool, classroom.id, claims.id).await? {
        tracing::info!(classroom = classroom.id, user = claims.id, "joined classroom by code");
    }

    Ok(Json(json!({ "success": true, "classroom": classroom })))
}
