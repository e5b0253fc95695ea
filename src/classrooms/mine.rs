use axum::{debug_handler, extract::State, Json};
use sqlx::SqlitePool;

use crate::{auth::AuthUser, db::Classroom, AppResult};

/// Owned classrooms for teachers, joined ones for students; newest first.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn my_classrooms(
    AuthUser(claims): AuthUser,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Classroom>>> {
    let query = if claims.is_teacher() {
        "SELECT * FROM classrooms WHERE teacher_id=? ORDER BY created_at DESC, id DESC"
    } else {
        "SELECT c.* FROM classrooms c
         JOIN classroom_members m ON m.classroom_id=c.id
         WHERE m.user_id=? ORDER BY c.created_at DESC, c.id DESC"
    };

    let classrooms = sqlx::query_as(query)
        .bind(claims.id)
        .fetch_all(&db_pool)
        .await?;

    Ok(Json(classrooms))
}
