mod history;
mod msg;

use std::{collections::{HashMap, HashSet}, sync::Arc};

use axum::{routing::get, Router};
use tokio::sync::RwLock;

use crate::{socket::{ConnId, Outboxes, ServerEvent}, AppState};

pub use msg::send_msg;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/classrooms/{id}/messages", get(history::history))
}

/// Which sockets listen to which classroom's chat.
#[derive(Clone)]
pub struct ChatRelay {
    outboxes: Outboxes,
    channels: Arc<RwLock<HashMap<i64, HashSet<ConnId>>>>,
}

impl ChatRelay {
    pub fn new(outboxes: Outboxes) -> Self {
        ChatRelay {
            outboxes,
            channels: Arc::default(),
        }
    }

    pub async fn join(&self, conn: ConnId, classroom_id: i64) {
        let added = self
            .channels
            .write()
            .await
            .entry(classroom_id)
            .or_default()
            .insert(conn);

        if added {
            tracing::debug!(%conn, classroom = classroom_id, "joined chat channel");
        }
    }

    pub async fn leave_all(&self, conn: ConnId) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, listeners| {
            listeners.remove(&conn);
            !listeners.is_empty()
        });
    }

    pub async fn listeners(&self, classroom_id: i64) -> Vec<ConnId> {
        self.channels
            .read()
            .await
            .get(&classroom_id)
            .map(|listeners| listeners.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Fan-out to every listener of the channel; returns how many got it.
    pub async fn broadcast(&self, classroom_id: i64, event: ServerEvent) -> usize {
        let listeners = self.listeners(classroom_id).await;
        self.outboxes.send_all(listeners, &event).await
    }
}
