use axum::{debug_handler, extract::{Path, State}, Json};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, db::{Classroom, Member}, AppError, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn classroom(
    _user: AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(classroom_id): Path<i64>,
) -> AppResult<Json<Classroom>> {
    super::find(&db_pool, classroom_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Not found".into()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn members(
    _user: AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(classroom_id): Path<i64>,
) -> AppResult<Json<Vec<Member>>> {
    let members = sqlx::query_as(
        "SELECT u.id, u.name, u.role, u.college
         FROM classroom_members m
         JOIN users u ON u.id=m.user_id
         WHERE m.classroom_id=?
         ORDER BY m.id",
    )
    .bind(classroom_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(members))
}
