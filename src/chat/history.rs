use axum::{debug_handler, extract::{Path, State}, Json};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, classrooms, db::Message, AppError, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn history(
    AuthUser(claims): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(classroom_id): Path<i64>,
) -> AppResult<Json<Vec<Message>>> {
    if !classrooms::is_participant(&db_pool, classroom_id, claims.id).await? {
        return Err(AppError::Forbidden("Not a member of this classroom".into()));
    }

    let messages = sqlx::query_as(
        "SELECT m.id, m.sender_id, COALESCE(u.name, '') AS sender_name, m.classroom_id, m.content, m.created_at
         FROM messages m
         LEFT JOIN users u ON u.id=m.sender_id
         WHERE m.classroom_id=?
         ORDER BY m.id",
    )
    .bind(classroom_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(messages))
}
