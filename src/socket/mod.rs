mod event;
mod outbox;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use event::{ClientEvent, ServerEvent};
pub use outbox::{ConnId, Outboxes};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::socket))
}
