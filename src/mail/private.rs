use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{auth::{trimmed, AuthUser}, AppError, AppResult};

use super::{Mail, PRIVATE_MESSAGE_SUBJECT};

#[derive(Debug, Deserialize)]
pub(crate) struct PrivateMessageBody {
    to: Option<String>,
    content: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn private_message(
    AuthUser(claims): AuthUser,
    State(mail): State<Mail>,
    Json(PrivateMessageBody { to, content }): Json<PrivateMessageBody>,
) -> AppResult<Json<Value>> {
    let (Some(to), Some(content)) = (trimmed(to), trimmed(content)) else {
        return Err(AppError::BadRequest("Missing fields".into()));
    };

    let mailer = mail
        .mailer()
        .ok_or_else(|| AppError::internal("Failed to send", anyhow::anyhow!("mail is not configured")))?;

    mailer
        .send(&to, PRIVATE_MESSAGE_SUBJECT, &format!("{}: {content}", claims.name))
        .await
        .map_err(|err| AppError::internal("Failed to send", err))?;

    tracing::info!(from = claims.id, to = %to, "private message sent");
    Ok(Json(json!({ "success": true })))
}
