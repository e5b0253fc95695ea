use sqlx::SqlitePool;

use crate::{auth::Claims, db::Message, socket::ServerEvent, AppError, AppResult};

use super::ChatRelay;

/// Persists the message, then fans it out to the classroom's channel,
/// sender included.
pub async fn send_msg(
    db_pool: &SqlitePool,
    relay: &ChatRelay,

    sender: &Claims,
    classroom_id: i64,

    content: String,
) -> AppResult<Message> {
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("Empty message".into()));
    }

    let (id, created_at): (i64, String) = sqlx::query_as(
        "INSERT INTO messages (sender_id,classroom_id,type,content) VALUES (?,?,'text',?)
         RETURNING id, created_at",
    )
    .bind(sender.id)
    .bind(classroom_id)
    .bind(&content)
    .fetch_one(db_pool)
    .await?;

    let message = Message {
        id,
        sender_id: sender.id,
        sender_name: sender.name.clone(),
        classroom_id,
        content,
        created_at,
    };

    let delivered = relay.broadcast(classroom_id, ServerEvent::NewMessage(message.clone())).await;
    tracing::debug!(classroom = classroom_id, message = id, delivered, "chat message");

    Ok(message)
}
