use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{auth::AuthUser, db::Upload, AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    class_id: Option<i64>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_uploads(
    _: AuthUser,
    State(db_pool): State<SqlitePool>,
    Query(ListQuery { class_id }): Query<ListQuery>,
) -> AppResult<Json<Vec<Upload>>> {
    let uploads = match class_id {
        Some(class_id) => {
            sqlx::query_as("SELECT * FROM uploads WHERE classroom_id=? ORDER BY id")
                .bind(class_id)
                .fetch_all(&db_pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM uploads ORDER BY id")
                .fetch_all(&db_pool)
                .await?
        }
    };

    Ok(Json(uploads))
}
