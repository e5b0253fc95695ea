use std::collections::BTreeMap;

use serde_json::Value;

use crate::socket::{ClientEvent, ConnId, ServerEvent};

use super::Participant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    Negotiating,
    Connected,
    Closed,
}

/// What the browser side should do in response to a server event.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendOffer(ConnId),
    AnswerOffer(ConnId, Value),
    ApplyAnswer(ConnId, Value),
    AddCandidate(ConnId, Value),
    ClosePeer(ConnId),
    /// Stop local media and drop the meeting view.
    Teardown,
}

/// A participant's local view of one meeting: one connection per peer,
/// full mesh, no renegotiation.
#[derive(Debug)]
pub struct MeetSession {
    room_id: i64,
    me: Option<ConnId>,
    joined: bool,
    peers: BTreeMap<ConnId, PeerState>,
    participants: Vec<Participant>,
}

impl MeetSession {
    pub fn new(room_id: i64) -> Self {
        MeetSession {
            room_id,
            me: None,
            joined: false,
            peers: BTreeMap::new(),
            participants: Vec::new(),
        }
    }

    /// Events to send when entering the meeting.
    pub fn join(&mut self) -> Vec<ClientEvent> {
        self.joined = true;
        vec![
            ClientEvent::JoinRoom { room_id: self.room_id },
            ClientEvent::Whoami { room_id: self.room_id },
        ]
    }

    /// Leaving closes every open peer and tears the view down.
    pub fn leave(&mut self) -> (ClientEvent, Vec<Action>) {
        let actions = self.teardown();
        (ClientEvent::LeaveRoom { room_id: self.room_id }, actions)
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn state(&self, peer: ConnId) -> PeerState {
        self.peers.get(&peer).copied().unwrap_or(PeerState::Idle)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn handle(&mut self, event: ServerEvent) -> Vec<Action> {
        match event {
            ServerEvent::Connected { id } => {
                self.me = Some(id);
                Vec::new()
            }
            ServerEvent::RoomUsers(participants) => {
                self.participants = participants;
                Vec::new()
            }
            ServerEvent::Peers(ids) => {
                let mut actions = Vec::new();
                for id in ids {
                    if Some(id) == self.me || self.state(id) != PeerState::Idle {
                        continue;
                    }
                    self.peers.insert(id, PeerState::Negotiating);
                    actions.push(Action::SendOffer(id));
                }
                actions
            }
            ServerEvent::Offer { from, offer } => match self.state(from) {
                PeerState::Idle => {
                    self.peers.insert(from, PeerState::Negotiating);
                    vec![Action::AnswerOffer(from, offer)]
                }
                _ => Vec::new(),
            },
            ServerEvent::Answer { from, answer } => match self.state(from) {
                PeerState::Negotiating => vec![Action::ApplyAnswer(from, answer)],
                _ => Vec::new(),
            },
            ServerEvent::IceCandidate { from, candidate } => match self.state(from) {
                PeerState::Negotiating | PeerState::Connected => vec![Action::AddCandidate(from, candidate)],
                _ => Vec::new(),
            },
            ServerEvent::PeerLeft { id } => {
                self.participants.retain(|p| p.id != id);
                self.close(id).into_iter().collect()
            }
            ServerEvent::Kicked | ServerEvent::MeetEnded => self.teardown(),
            ServerEvent::NewMessage(_) | ServerEvent::Error { .. } => Vec::new(),
        }
    }

    /// The remote track arrived; negotiation is over.
    pub fn track_received(&mut self, peer: ConnId) -> bool {
        match self.peers.get_mut(&peer) {
            Some(state) if *state == PeerState::Negotiating => {
                *state = PeerState::Connected;
                true
            }
            _ => false,
        }
    }

    /// No retry: the peer stays closed.
    pub fn negotiation_failed(&mut self, peer: ConnId) -> Option<Action> {
        tracing::debug!(room = self.room_id, %peer, "negotiation failed");
        self.close(peer)
    }

    fn close(&mut self, peer: ConnId) -> Option<Action> {
        match self.peers.get_mut(&peer) {
            Some(state) if *state != PeerState::Closed => {
                *state = PeerState::Closed;
                Some(Action::ClosePeer(peer))
            }
            _ => None,
        }
    }

    fn teardown(&mut self) -> Vec<Action> {
        self.joined = false;
        self.participants.clear();
        let open = self
            .peers
            .iter()
            .filter(|(_, state)| **state != PeerState::Closed)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();

        let mut actions = open.into_iter().filter_map(|id| self.close(id)).collect::<Vec<_>>();
        actions.push(Action::Teardown);
        actions
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::db::Role;

    fn joined() -> (MeetSession, ConnId) {
        let me = Uuid::now_v7();
        let mut session = MeetSession::new(3);
        session.handle(ServerEvent::Connected { id: me });
        session.join();
        (session, me)
    }

    #[test]
    fn joining_announces_and_asks_for_peers() {
        let mut session = MeetSession::new(3);
        assert_eq!(
            session.join(),
            vec![ClientEvent::JoinRoom { room_id: 3 }, ClientEvent::Whoami { room_id: 3 }]
        );
        assert!(session.is_joined());
    }

    #[test]
    fn one_offer_per_existing_peer() {
        let (mut session, me) = joined();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        let actions = session.handle(ServerEvent::Peers(vec![a, me, b]));
        assert_eq!(actions, vec![Action::SendOffer(a), Action::SendOffer(b)]);
        assert_eq!(session.state(a), PeerState::Negotiating);

        assert!(session.handle(ServerEvent::Peers(vec![a])).is_empty());
    }

    #[test]
    fn offer_answer_then_track_connects() {
        let (mut session, _) = joined();
        let newcomer = Uuid::now_v7();
        let offer = json!({ "type": "offer", "sdp": "x" });

        let actions = session.handle(ServerEvent::Offer { from: newcomer, offer: offer.clone() });
        assert_eq!(actions, vec![Action::AnswerOffer(newcomer, offer)]);

        let candidate = json!({ "candidate": "c" });
        assert_eq!(
            session.handle(ServerEvent::IceCandidate { from: newcomer, candidate: candidate.clone() }),
            vec![Action::AddCandidate(newcomer, candidate)]
        );

        assert!(session.track_received(newcomer));
        assert_eq!(session.state(newcomer), PeerState::Connected);
        assert!(!session.track_received(newcomer));
    }

    #[test]
    fn answers_only_apply_while_negotiating() {
        let (mut session, _) = joined();
        let stranger = Uuid::now_v7();
        assert!(session.handle(ServerEvent::Answer { from: stranger, answer: json!({}) }).is_empty());

        session.handle(ServerEvent::Peers(vec![stranger]));
        assert_eq!(
            session.handle(ServerEvent::Answer { from: stranger, answer: json!({ "type": "answer" }) }),
            vec![Action::ApplyAnswer(stranger, json!({ "type": "answer" }))]
        );
    }

    #[test]
    fn peer_left_closes_its_connection() {
        let (mut session, me) = joined();
        let other = Uuid::now_v7();
        session.handle(ServerEvent::RoomUsers(vec![
            Participant { id: me, user_id: 1, name: "Me".into(), role: Role::Student },
            Participant { id: other, user_id: 2, name: "Other".into(), role: Role::Student },
        ]));
        session.handle(ServerEvent::Peers(vec![other]));
        session.track_received(other);

        assert_eq!(session.handle(ServerEvent::PeerLeft { id: other }), vec![Action::ClosePeer(other)]);
        assert_eq!(session.state(other), PeerState::Closed);
        assert_eq!(session.participants().len(), 1);

        // no renegotiation with a closed peer
        assert!(session.handle(ServerEvent::Offer { from: other, offer: json!({}) }).is_empty());
    }

    #[test]
    fn failed_negotiation_is_not_retried() {
        let (mut session, _) = joined();
        let peer = Uuid::now_v7();
        session.handle(ServerEvent::Peers(vec![peer]));

        assert_eq!(session.negotiation_failed(peer), Some(Action::ClosePeer(peer)));
        assert_eq!(session.negotiation_failed(peer), None);
        assert!(session.handle(ServerEvent::Peers(vec![peer])).is_empty());
    }

    #[test]
    fn kicked_or_ended_tears_everything_down() {
        for event in [ServerEvent::Kicked, ServerEvent::MeetEnded] {
            let (mut session, _) = joined();
            let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
            session.handle(ServerEvent::Peers(vec![a, b]));
            session.negotiation_failed(b);

            assert_eq!(session.handle(event), vec![Action::ClosePeer(a), Action::Teardown]);
            assert!(!session.is_joined());
        }
    }

    #[test]
    fn leaving_sends_leave_room() {
        let (mut session, _) = joined();
        let a = Uuid::now_v7();
        session.handle(ServerEvent::Peers(vec![a]));

        let (event, actions) = session.leave();
        assert_eq!(event, ClientEvent::LeaveRoom { room_id: 3 });
        assert_eq!(actions, vec![Action::ClosePeer(a), Action::Teardown]);
    }
}
