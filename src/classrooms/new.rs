use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{auth::{trimmed, AuthUser}, db::Classroom, AppError, AppResult};

use super::{random_code, unique_code};

#[derive(Debug, Deserialize)]
pub(crate) struct NewClassroomBody {
    name: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_classroom(
    user: AuthUser,
    State(db_pool): State<SqlitePool>,
    Json(NewClassroomBody { name }): Json<NewClassroomBody>,
) -> AppResult<Json<Classroom>> {
    user.require_teacher("Only teachers can create")?;
    let Some(name) = trimmed(name) else {
        return Err(AppError::BadRequest("Name required".into()));
    };

    let code = unique_code(&db_pool, random_code).await?;

    let classroom: Classroom = sqlx::query_as(
        "INSERT INTO classrooms (name,code,teacher_id) VALUES (?,?,?) RETURNING *",
    )
    .bind(&name)
    .bind(&code)
    .bind(user.0.id)
    .fetch_one(&db_pool)
    .await
    .map_err(|err| {
        tracing::error!("classroom creation failed: {err}");
        AppError::BadRequest("Failed to create classroom".into())
    })?;

    tracing::info!(classroom = classroom.id, %code, teacher = user.0.id, "created classroom");
    Ok(Json(classroom))
}
