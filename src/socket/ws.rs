use axum::{
    debug_handler,
    extract::{
        ws::{Message as WsMessage, WebSocket},
        FromRef, FromRequestParts, Query, State, WebSocketUpgrade,
    },
    http::request::Parts,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::{
    auth::{Claims, Keys},
    chat,
    classrooms,
    signaling::{Participant, Signal},
    AppError, AppResult, AppState,
};

use super::{ClientEvent, ConnId, ServerEvent};

#[derive(Deserialize)]
struct SocketQuery {
    token: Option<String>,
}

/// The caller behind `/ws?token=<token>`. Browsers cannot put headers on an
/// upgrade request, so the token rides in the query.
pub(crate) struct SocketUser(Claims);

impl<S> FromRequestParts<S> for SocketUser
where
    Keys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = Query::<SocketQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("No token".into()))?;

        match Keys::from_ref(state).verify(&token) {
            Ok(claims) => Ok(SocketUser(claims)),
            Err(err) => {
                tracing::debug!("rejected socket token: {err}");
                Err(AppError::Unauthorized("Invalid token".into()))
            }
        }
    }
}

/// Authentication runs before the upgrade, so a bad token is a plain 401.
#[debug_handler]
pub(crate) async fn socket(
    SocketUser(user): SocketUser,
    State(app_state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |stream| serve(app_state, user, stream))
}

async fn serve(app_state: AppState, user: Claims, stream: WebSocket) {
    let (conn, mut rx) = app_state.outboxes.open().await;
    let (mut sender, mut receiver) = stream.split();
    tracing::info!(%conn, user = user.id, "socket connected");

    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!("dropping unserializable event: {err}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    app_state.outboxes.send(conn, ServerEvent::Connected { id: conn }).await;

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else {
                    break;
                };
                let event = match frame {
                    WsMessage::Text(text) => serde_json::from_str::<ClientEvent>(text.as_str()),
                    WsMessage::Binary(bytes) => serde_json::from_slice::<ClientEvent>(&bytes),
                    WsMessage::Close(_) => break,
                    _ => continue,
                };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::debug!(%conn, "ignoring undecodable frame: {err}");
                        continue;
                    }
                };

                handle(&app_state, conn, &user, event).await;
            }
            _ = &mut writer => break,
        }
    }

    disconnect(&app_state, conn).await;
    writer.abort();
    tracing::info!(%conn, user = user.id, "socket disconnected");
}

/// Runs one client event; a refusal goes back to the sender as an `error` event.
async fn handle(app_state: &AppState, conn: ConnId, user: &Claims, event: ClientEvent) {
    if let Err(err) = dispatch(app_state, conn, user, event).await {
        let message = err.public_message();
        app_state.outboxes.send(conn, ServerEvent::Error { message }).await;
    }
}

async fn disconnect(app_state: &AppState, conn: ConnId) {
    app_state.chat.leave_all(conn).await;
    app_state.signaling.disconnect(conn).await;
    app_state.outboxes.close(conn).await;
}

async fn dispatch(app_state: &AppState, conn: ConnId, user: &Claims, event: ClientEvent) -> AppResult<()> {
    let db_pool = &app_state.db_pool;

    match event {
        ClientEvent::JoinClassroom(classroom_id) => {
            require_participant(app_state, classroom_id, user).await?;
            app_state.chat.join(conn, classroom_id).await;
        }
        ClientEvent::SendMessage { classroom_id, content } => {
            require_participant(app_state, classroom_id, user).await?;
            chat::send_msg(db_pool, &app_state.chat, user, classroom_id, content).await?;
        }
        ClientEvent::JoinRoom { room_id } => {
            require_participant(app_state, room_id, user).await?;
            let participant = Participant {
                id: conn,
                user_id: user.id,
                name: user.name.clone(),
                role: user.role,
            };
            app_state.signaling.join(room_id, participant).await;
        }
        ClientEvent::Whoami { room_id } => {
            require_participant(app_state, room_id, user).await?;
            let peers = app_state.signaling.peers(room_id, conn).await;
            app_state.outboxes.send(conn, ServerEvent::Peers(peers)).await;
        }
        ClientEvent::Offer { room_id, to, offer } => {
            app_state.signaling.relay(room_id, conn, to, Signal::Offer(offer)).await;
        }
        ClientEvent::Answer { room_id, to, answer } => {
            app_state.signaling.relay(room_id, conn, to, Signal::Answer(answer)).await;
        }
        ClientEvent::IceCandidate { room_id, to, candidate } => {
            app_state.signaling.relay(room_id, conn, to, Signal::IceCandidate(candidate)).await;
        }
        ClientEvent::LeaveRoom { room_id } => {
            app_state.signaling.leave(room_id, conn).await;
        }
        ClientEvent::Kick { room_id, target } => {
            require_owner(app_state, room_id, user).await?;
            app_state.signaling.kick(room_id, target).await;
        }
        ClientEvent::EndMeet { room_id } => {
            require_owner(app_state, room_id, user).await?;
            app_state.signaling.end(room_id).await;
        }
    }

    Ok(())
}

async fn require_participant(app_state: &AppState, classroom_id: i64, user: &Claims) -> AppResult<()> {
    if classrooms::is_participant(&app_state.db_pool, classroom_id, user.id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not a member of this classroom".into()))
    }
}

async fn require_owner(app_state: &AppState, classroom_id: i64, user: &Claims) -> AppResult<()> {
    if user.is_teacher() && classrooms::is_owner(&app_state.db_pool, classroom_id, user.id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the classroom's teacher can do that".into()))
    }
}
