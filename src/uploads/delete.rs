use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, db::Upload, AppError, AppResult};

use super::UploadStore;

/// File first, then the row.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_upload(
    user: AuthUser,
    State(db_pool): State<SqlitePool>,
    State(store): State<UploadStore>,
    Path(upload_id): Path<i64>,
) -> AppResult<Json<Value>> {
    user.require_teacher("Only teachers can delete uploads")?;

    let Some(upload): Option<Upload> = sqlx::query_as("SELECT * FROM uploads WHERE id=?")
        .bind(upload_id)
        .fetch_optional(&db_pool)
        .await?
    else {
        return Err(AppError::NotFound("Upload not found".into()));
    };

    store.remove(&upload.filename).await?;
    sqlx::query("DELETE FROM uploads WHERE id=?")
        .bind(upload.id)
        .execute(&db_pool)
        .await?;

    tracing::info!(upload = upload.id, filename = %upload.filename, "deleted upload");
    Ok(Json(json!({ "success": true })))
}
