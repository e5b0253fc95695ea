use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{db::{self, Role}, AppError, AppResult};

use super::{hash_password, trimmed};

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterBody {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    university: Option<String>,
    college: Option<String>,
    student_id: Option<String>,
    role: Option<String>,
    password: Option<String>,
}

#[debug_handler]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    Json(body): Json<RegisterBody>,
) -> AppResult<Json<Value>> {
    let RegisterBody { name, email, phone, university, college, student_id, role, password } = body;

    let (email, phone) = (trimmed(email), trimmed(phone));
    let (Some(name), Some(role), Some(password)) = (trimmed(name), trimmed(role), trimmed(password)) else {
        return Err(AppError::BadRequest("Missing required fields".into()));
    };
    if email.is_none() && phone.is_none() {
        return Err(AppError::BadRequest("Missing required fields".into()));
    }

    let role: Role = role.parse().map_err(AppError::BadRequest)?;
    let student_id = trimmed(student_id);
    if role == Role::Student && student_id.is_none() {
        return Err(AppError::BadRequest("Student ID required".into()));
    }

    let password_hash = hash_password(&password)?;

    let inserted = sqlx::query(
        "INSERT INTO users (name,email,phone,university,college,student_id,role,password)
         VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(&name)
    .bind(&email)
    .bind(&phone)
    .bind(trimmed(university).unwrap_or_default())
    .bind(trimmed(college).unwrap_or_default())
    .bind(&student_id)
    .bind(role)
    .bind(&password_hash)
    .execute(&db_pool)
    .await;

    match inserted {
        Ok(_) => {
            tracing::info!(%name, ?role, "registered user");
            Ok(Json(json!({ "success": true })))
        }
        Err(err) if db::is_unique_violation(&err) => {
            Err(AppError::BadRequest("User already exists".into()))
        }
        Err(err) => Err(err.into()),
    }
}
