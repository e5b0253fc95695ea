mod classroom;
mod code;
mod join;
mod mine;
mod new;

use axum::{routing::{get, post}, Router};
use sqlx::SqlitePool;

use crate::{db::Classroom, AppState};

pub use code::{random_code, unique_code, CODE_LEN};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/classrooms", post(new::new_classroom))
        .route("/classrooms/mine", get(mine::my_classrooms))
        .route("/classrooms/{id}", get(classroom::classroom))
        .route("/classrooms/{id}/members", get(classroom::members))
        .route("/classrooms/{id}/join", post(join::join))
        .route("/joinByCode", post(join::join_by_code))
}

pub async fn find(db_pool: &SqlitePool, classroom_id: i64) -> Result<Option<Classroom>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM classrooms WHERE id=?")
        .bind(classroom_id)
        .fetch_optional(db_pool)
        .await
}

/// Adds the membership unless it already exists. Returns whether a row was added.
pub async fn ensure_member(db_pool: &SqlitePool, classroom_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO classroom_members (classroom_id,user_id,approved) VALUES (?,?,1)",
    )
    .bind(classroom_id)
    .bind(user_id)
    .execute(db_pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Owner or member.
pub async fn is_participant(db_pool: &SqlitePool, classroom_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM classrooms c
         WHERE c.id=? AND (c.teacher_id=? OR EXISTS (
             SELECT 1 FROM classroom_members m WHERE m.classroom_id=c.id AND m.user_id=?
         ))",
    )
    .bind(classroom_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?;

    Ok(row.is_some())
}

pub async fn is_owner(db_pool: &SqlitePool, classroom_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM classrooms WHERE id=? AND teacher_id=?")
        .bind(classroom_id)
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, test_support::*, Role};

    #[tokio::test]
    async fn joining_twice_keeps_one_row() {
        let db_pool = connect_in_memory().await.unwrap();
        let teacher = seed_user(&db_pool, "Tess", Role::Teacher).await;
        let student = seed_user(&db_pool, "Sam", Role::Student).await;
        let classroom = seed_classroom(&db_pool, teacher, "ABC123").await;

        assert!(ensure_member(&db_pool, classroom, student).await.unwrap());
        assert!(!ensure_member(&db_pool, classroom, student).await.unwrap());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM classroom_members WHERE classroom_id=? AND user_id=?")
            .bind(classroom)
            .bind(student)
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn owners_and_members_participate() {
        let db_pool = connect_in_memory().await.unwrap();
        let teacher = seed_user(&db_pool, "Tess", Role::Teacher).await;
        let student = seed_user(&db_pool, "Sam", Role::Student).await;
        let outsider = seed_user(&db_pool, "Olly", Role::Student).await;
        let classroom = seed_classroom(&db_pool, teacher, "ABC123").await;
        ensure_member(&db_pool, classroom, student).await.unwrap();

        assert!(is_participant(&db_pool, classroom, teacher).await.unwrap());
        assert!(is_participant(&db_pool, classroom, student).await.unwrap());
        assert!(!is_participant(&db_pool, classroom, outsider).await.unwrap());
        assert!(!is_participant(&db_pool, classroom + 1, teacher).await.unwrap());

        assert!(is_owner(&db_pool, classroom, teacher).await.unwrap());
        assert!(!is_owner(&db_pool, classroom, student).await.unwrap());
    }
}
