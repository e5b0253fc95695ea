//! Meeting presence and WebRTC negotiation relay.
//!
//! The server never looks inside offers, answers or candidates: they are
//! forwarded verbatim between two participants of the same room. Rooms are
//! keyed by classroom id.

mod session;

use std::{collections::{BTreeMap, HashMap}, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{db::Role, socket::{ConnId, Outboxes, ServerEvent}};

pub use session::{Action, MeetSession, PeerState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ConnId,
    pub user_id: i64,
    pub name: String,
    pub role: Role,
}

/// Negotiation payloads, relayed untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
}

impl Signal {
    fn into_event(self, from: ConnId) -> ServerEvent {
        match self {
            Signal::Offer(offer) => ServerEvent::Offer { from, offer },
            Signal::Answer(answer) => ServerEvent::Answer { from, answer },
            Signal::IceCandidate(candidate) => ServerEvent::IceCandidate { from, candidate },
        }
    }
}

// uuid v7 ids sort by connect time, so listings come out in a stable order
type Room = BTreeMap<ConnId, Participant>;

#[derive(Clone)]
pub struct SignalingRelay {
    outboxes: Outboxes,
    rooms: Arc<RwLock<HashMap<i64, Room>>>,
}

impl SignalingRelay {
    pub fn new(outboxes: Outboxes) -> Self {
        SignalingRelay {
            outboxes,
            rooms: Arc::default(),
        }
    }

    /// Adds (or refreshes) the participant and announces the new presence list.
    pub async fn join(&self, room_id: i64, participant: Participant) {
        let conn = participant.id;
        let present = {
            let mut rooms = self.rooms.write().await;
            let room = rooms.entry(room_id).or_default();
            room.insert(conn, participant);
            room.values().cloned().collect::<Vec<_>>()
        };

        tracing::info!(room = room_id, %conn, present = present.len(), "joined meeting");
        self.announce(present).await;
    }

    pub async fn participants(&self, room_id: i64) -> Vec<Participant> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Everyone in the room except `conn`.
    pub async fn peers(&self, room_id: i64, conn: ConnId) -> Vec<ConnId> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(|room| room.keys().copied().filter(|id| *id != conn).collect())
            .unwrap_or_default()
    }

    /// Forwards a negotiation message when both ends are in the room.
    /// Anything else is dropped.
    pub async fn relay(&self, room_id: i64, from: ConnId, to: ConnId, signal: Signal) -> bool {
        let both_present = self
            .rooms
            .read()
            .await
            .get(&room_id)
            .is_some_and(|room| room.contains_key(&from) && room.contains_key(&to));

        if !both_present {
            tracing::debug!(room = room_id, %from, %to, "dropping signal outside the room");
            return false;
        }

        self.outboxes.send(to, signal.into_event(from)).await
    }

    /// Removes the participant and tells the rest of the room.
    pub async fn leave(&self, room_id: i64, conn: ConnId) -> bool {
        let remaining = {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(&room_id) else {
                return false;
            };
            if room.remove(&conn).is_none() {
                return false;
            }
            let remaining = room.values().cloned().collect::<Vec<_>>();
            if room.is_empty() {
                rooms.remove(&room_id);
            }
            remaining
        };

        tracing::info!(room = room_id, %conn, remaining = remaining.len(), "left meeting");
        let ids = remaining.iter().map(|p| p.id).collect::<Vec<_>>();
        self.outboxes.send_all(ids, &ServerEvent::PeerLeft { id: conn }).await;
        self.announce(remaining).await;
        true
    }

    /// Removes `target` after telling it so.
    pub async fn kick(&self, room_id: i64, target: ConnId) -> bool {
        let present = self
            .rooms
            .read()
            .await
            .get(&room_id)
            .is_some_and(|room| room.contains_key(&target));
        if !present {
            return false;
        }

        self.outboxes.send(target, ServerEvent::Kicked).await;
        self.leave(room_id, target).await
    }

    /// Tells everyone the meeting is over and forgets the room.
    pub async fn end(&self, room_id: i64) -> usize {
        let Some(room) = self.rooms.write().await.remove(&room_id) else {
            return 0;
        };

        tracing::info!(room = room_id, participants = room.len(), "meeting ended");
        self.outboxes.send_all(room.into_keys(), &ServerEvent::MeetEnded).await
    }

    /// Leaves every room the connection is in.
    pub async fn disconnect(&self, conn: ConnId) {
        let joined = self
            .rooms
            .read()
            .await
            .iter()
            .filter(|(_, room)| room.contains_key(&conn))
            .map(|(room_id, _)| *room_id)
            .collect::<Vec<_>>();

        for room_id in joined {
            self.leave(room_id, conn).await;
        }
    }

    async fn announce(&self, present: Vec<Participant>) {
        let ids = present.iter().map(|p| p.id).collect::<Vec<_>>();
        self.outboxes.send_all(ids, &ServerEvent::RoomUsers(present)).await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    struct Peer {
        id: ConnId,
        rx: UnboundedReceiver<ServerEvent>,
    }

    impl Peer {
        fn drain(&mut self) -> Vec<ServerEvent> {
            std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
        }
    }

    async fn peer(outboxes: &Outboxes) -> Peer {
        let (id, rx) = outboxes.open().await;
        Peer { id, rx }
    }

    fn participant(peer: &Peer, name: &str, role: Role) -> Participant {
        Participant { id: peer.id, user_id: 1, name: name.into(), role }
    }

    #[tokio::test]
    async fn joining_announces_presence_to_the_room() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let mut tess = peer(&outboxes).await;
        let mut sam = peer(&outboxes).await;

        relay.join(7, participant(&tess, "Tess", Role::Teacher)).await;
        relay.join(7, participant(&sam, "Sam", Role::Student)).await;

        let everyone = vec![participant(&tess, "Tess", Role::Teacher), participant(&sam, "Sam", Role::Student)];
        assert_eq!(tess.drain().last(), Some(&ServerEvent::RoomUsers(everyone.clone())));
        assert_eq!(sam.drain(), vec![ServerEvent::RoomUsers(everyone)]);
    }

    #[tokio::test]
    async fn peers_excludes_the_asker() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let a = peer(&outboxes).await;
        let b = peer(&outboxes).await;
        let c = peer(&outboxes).await;
        for p in [&a, &b, &c] {
            relay.join(1, participant(p, "x", Role::Student)).await;
        }

        assert_eq!(relay.peers(1, b.id).await, vec![a.id, c.id]);
        assert!(relay.peers(2, b.id).await.is_empty());
    }

    #[tokio::test]
    async fn signals_are_relayed_verbatim_with_the_sender() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let mut a = peer(&outboxes).await;
        let mut b = peer(&outboxes).await;
        relay.join(1, participant(&a, "A", Role::Teacher)).await;
        relay.join(1, participant(&b, "B", Role::Student)).await;
        a.drain();
        b.drain();

        let offer = json!({ "type": "offer", "sdp": "v=0", "whatever": [1, 2] });
        assert!(relay.relay(1, a.id, b.id, Signal::Offer(offer.clone())).await);
        assert_eq!(b.drain(), vec![ServerEvent::Offer { from: a.id, offer }]);

        let candidate = json!({ "candidate": "candidate:1 1 UDP 1 10.0.0.1 9 typ host" });
        assert!(relay.relay(1, b.id, a.id, Signal::IceCandidate(candidate.clone())).await);
        assert_eq!(a.drain(), vec![ServerEvent::IceCandidate { from: b.id, candidate }]);
    }

    #[tokio::test]
    async fn signals_across_rooms_are_dropped() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let a = peer(&outboxes).await;
        let mut b = peer(&outboxes).await;
        relay.join(1, participant(&a, "A", Role::Student)).await;
        relay.join(2, participant(&b, "B", Role::Student)).await;
        b.drain();

        assert!(!relay.relay(1, a.id, b.id, Signal::Answer(json!({}))).await);
        assert!(!relay.relay(2, a.id, b.id, Signal::Answer(json!({}))).await);
        assert!(b.drain().is_empty());
    }

    #[tokio::test]
    async fn leaving_removes_presence_and_notifies_the_rest() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let mut a = peer(&outboxes).await;
        let b = peer(&outboxes).await;
        relay.join(1, participant(&a, "A", Role::Teacher)).await;
        relay.join(1, participant(&b, "B", Role::Student)).await;
        a.drain();

        assert!(relay.leave(1, b.id).await);
        assert!(!relay.leave(1, b.id).await);
        assert_eq!(relay.participants(1).await, vec![participant(&a, "A", Role::Teacher)]);
        assert_eq!(
            a.drain(),
            vec![
                ServerEvent::PeerLeft { id: b.id },
                ServerEvent::RoomUsers(vec![participant(&a, "A", Role::Teacher)]),
            ]
        );

        assert!(relay.leave(1, a.id).await);
        assert!(relay.rooms.read().await.is_empty());
    }

    #[tokio::test]
    async fn kicked_participant_is_told_and_removed() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let mut a = peer(&outboxes).await;
        let mut b = peer(&outboxes).await;
        relay.join(1, participant(&a, "A", Role::Teacher)).await;
        relay.join(1, participant(&b, "B", Role::Student)).await;
        a.drain();
        b.drain();

        assert!(relay.kick(1, b.id).await);
        assert_eq!(b.drain(), vec![ServerEvent::Kicked]);
        assert!(a.drain().contains(&ServerEvent::PeerLeft { id: b.id }));
        assert!(relay.peers(1, a.id).await.is_empty());
        assert!(!relay.kick(1, b.id).await);
    }

    #[tokio::test]
    async fn ending_a_meeting_reaches_everyone_and_clears_the_room() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let mut a = peer(&outboxes).await;
        let mut b = peer(&outboxes).await;
        relay.join(1, participant(&a, "A", Role::Teacher)).await;
        relay.join(1, participant(&b, "B", Role::Student)).await;
        a.drain();
        b.drain();

        assert_eq!(relay.end(1).await, 2);
        assert_eq!(a.drain(), vec![ServerEvent::MeetEnded]);
        assert_eq!(b.drain(), vec![ServerEvent::MeetEnded]);
        assert!(relay.participants(1).await.is_empty());
        assert_eq!(relay.end(1).await, 0);
    }

    #[tokio::test]
    async fn disconnect_leaves_every_room() {
        let outboxes = Outboxes::default();
        let relay = SignalingRelay::new(outboxes.clone());
        let a = peer(&outboxes).await;
        let mut b = peer(&outboxes).await;
        relay.join(1, participant(&a, "A", Role::Student)).await;
        relay.join(2, participant(&a, "A", Role::Student)).await;
        relay.join(2, participant(&b, "B", Role::Student)).await;
        b.drain();

        relay.disconnect(a.id).await;
        assert!(relay.participants(1).await.is_empty());
        assert_eq!(relay.participants(2).await, vec![participant(&b, "B", Role::Student)]);
        assert!(b.drain().contains(&ServerEvent::PeerLeft { id: a.id }));
    }
}
