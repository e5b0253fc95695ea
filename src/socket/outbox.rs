use std::{collections::HashMap, sync::Arc};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::ServerEvent;

/// Socket connection id, unique per upgrade.
pub type ConnId = Uuid;

/// Per-connection send queues. Each socket's writer task drains its own.
#[derive(Clone, Default)]
pub struct Outboxes {
    inner: Arc<RwLock<HashMap<ConnId, mpsc::UnboundedSender<ServerEvent>>>>,
}

impl Outboxes {
    pub async fn open(&self) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = Uuid::now_v7();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.insert(id, tx);
        (id, rx)
    }

    /// Dropping the sender ends the writer task once the queue drains.
    pub async fn close(&self, conn: ConnId) {
        self.inner.write().await.remove(&conn);
    }

    pub async fn is_open(&self, conn: ConnId) -> bool {
        self.inner.read().await.contains_key(&conn)
    }

    /// Fire-and-forget; false if the connection is gone.
    pub async fn send(&self, conn: ConnId, event: ServerEvent) -> bool {
        match self.inner.read().await.get(&conn) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Returns how many connections accepted the event.
    pub async fn send_all(&self, conns: impl IntoIterator<Item = ConnId>, event: &ServerEvent) -> usize {
        let outboxes = self.inner.read().await;
        conns
            .into_iter()
            .filter_map(|conn| outboxes.get(&conn))
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }
}
