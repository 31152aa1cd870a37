//! Origin → next-hop table, hop-limited point-to-point forwarding, and
//! dispatch of consensus and search traffic.
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::gossip::GossipEngine;
use crate::messages::{Message, PaxosEnvelope, Payload, PrivateMessage, SearchRequest};
use crate::node::outbox::Outbox;
use crate::node::timers::TimerKind;
use crate::node::{NodeEvent, Origin};
use crate::paxos::PaxosMessage;
use crate::settings::{GossipTimings, HOP_LIMIT};

/// Where an outbound consensus message ended up
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Addressed to ourselves; the caller feeds it back to the coordinator
    Local(PaxosMessage),
    Sent(SocketAddr),
    /// No route to the destination
    Dropped,
}

#[derive(Debug)]
pub struct Router {
    me: Origin,
    routes: BTreeMap<Origin, SocketAddr>,
    announce_interval: Duration,
}

impl Router {
    pub fn new(me: Origin, timings: &GossipTimings) -> Self {
        Self {
            me,
            routes: BTreeMap::new(),
            announce_interval: timings.route_announce_interval,
        }
    }

    /// Remember `sender` as the next hop towards `origin`
    pub fn observe(&mut self, origin: &Origin, sender: SocketAddr) {
        if *origin == self.me {
            return;
        }
        match self.routes.insert(origin.clone(), sender) {
            Some(previous) if previous == sender => {}
            Some(previous) => debug!(
                "[{}] Route to {} moved {} -> {}",
                self.me, origin, previous, sender
            ),
            None => debug!("[{}] Route to {} via {}", self.me, origin, sender),
        }
    }

    /// Originate a route rumor and push it to every neighbor at once.
    /// The announce timer is rearmed only when the rumor was accepted locally.
    pub fn announce(&mut self, gossip: &mut GossipEngine, out: &mut Outbox) -> Result<()> {
        let rumor = gossip.originate(Payload::Route);
        let rumor = gossip.accept_own(rumor, out)?;
        debug!(
            "[{}] Announcing route rumor #{} to {} neighbors",
            self.me,
            rumor.sequence,
            gossip.neighbors().len()
        );
        for peer in gossip.neighbors().iter() {
            out.send(
                *peer,
                Message::Rumor {
                    rumor: rumor.clone(),
                    last_hop: None,
                },
            );
        }
        out.arm(TimerKind::RouteAnnounce, self.announce_interval);
        Ok(())
    }

    /// Send a private chat message. Returns false when no route is known.
    pub fn send_private(&self, dest: Origin, text: String, out: &mut Outbox) -> bool {
        let Some(next_hop) = self.route(&dest) else {
            debug!("[{}] No route to {}, private message dropped", self.me, dest);
            return false;
        };
        out.send(
            next_hop,
            Message::Private(PrivateMessage {
                dest,
                origin: self.me.clone(),
                hop_limit: HOP_LIMIT,
                text: Some(text),
            }),
        );
        true
    }

    pub fn receive_private(&self, private: PrivateMessage, out: &mut Outbox) {
        if private.dest == self.me {
            out.notify(NodeEvent::PrivateReceived {
                origin: private.origin,
                text: private.text,
            });
            return;
        }
        let Some((next_hop, hop_limit)) = self.next_hop(&private.dest, private.hop_limit) else {
            return;
        };
        out.send(
            next_hop,
            Message::Private(PrivateMessage {
                hop_limit,
                ..private
            }),
        );
    }

    /// Wrap an outbound consensus message in its envelope and route it
    pub fn route_paxos(&self, dest: Origin, message: PaxosMessage, out: &mut Outbox) -> Delivery {
        if dest == self.me {
            return Delivery::Local(message);
        }
        let Some(next_hop) = self.route(&dest) else {
            debug!(
                "[{}] No route to {}, dropping {:?}",
                self.me,
                dest,
                message.kind()
            );
            return Delivery::Dropped;
        };
        out.send(
            next_hop,
            Message::Paxos(PaxosEnvelope {
                dest,
                origin: self.me.clone(),
                hop_limit: HOP_LIMIT,
                message,
            }),
        );
        Delivery::Sent(next_hop)
    }

    /// Inbound consensus envelope. Returns the sender and message when it is
    /// addressed to us; otherwise forwards it like a private message.
    pub fn receive_paxos(
        &self,
        envelope: PaxosEnvelope,
        out: &mut Outbox,
    ) -> Option<(Origin, PaxosMessage)> {
        if envelope.dest == self.me {
            return Some((envelope.origin, envelope.message));
        }
        let (next_hop, hop_limit) = self.next_hop(&envelope.dest, envelope.hop_limit)?;
        out.send(
            next_hop,
            Message::Paxos(PaxosEnvelope {
                hop_limit,
                ..envelope
            }),
        );
        None
    }

    pub fn receive_search(&self, request: SearchRequest, out: &mut Outbox) {
        out.notify(NodeEvent::SearchRequest(request));
    }

    fn next_hop(&self, dest: &Origin, hop_limit: u32) -> Option<(SocketAddr, u32)> {
        if hop_limit == 0 {
            debug!("[{}] Hop limit exhausted for {}", self.me, dest);
            return None;
        }
        let Some(next_hop) = self.route(dest) else {
            debug!("[{}] No route to {}, not forwarding", self.me, dest);
            return None;
        };
        Some((next_hop, hop_limit - 1))
    }

    pub fn route(&self, dest: &Origin) -> Option<SocketAddr> {
        self.routes.get(dest).copied()
    }

    pub fn routes(&self) -> &BTreeMap<Origin, SocketAddr> {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Rumor;
    use crate::paxos::ProposalNumber;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn router(name: &str) -> Router {
        Router::new(Origin::from(name), &GossipTimings::default())
    }

    fn private(dest: &str, hop_limit: u32) -> PrivateMessage {
        PrivateMessage {
            dest: Origin::from(dest),
            origin: Origin::from("a"),
            hop_limit,
            text: Some("psst".to_string()),
        }
    }

    #[test]
    fn test_observe_ignores_own_origin_and_refreshes() {
        let mut router = router("me");
        router.observe(&Origin::from("me"), addr(45001));
        assert!(router.routes().is_empty());

        router.observe(&Origin::from("c"), addr(45001));
        router.observe(&Origin::from("c"), addr(45002));
        assert_eq!(router.route(&Origin::from("c")), Some(addr(45002)));
    }

    #[test]
    fn test_send_private_needs_a_route() {
        let mut router = router("me");
        let mut out = Outbox::new();
        assert!(!router.send_private(Origin::from("c"), "hi".to_string(), &mut out));
        assert!(out.is_empty());

        router.observe(&Origin::from("c"), addr(45003));
        assert!(router.send_private(Origin::from("c"), "hi".to_string(), &mut out));
        assert_eq!(
            out.sent(),
            vec![(
                addr(45003),
                &Message::Private(PrivateMessage {
                    dest: Origin::from("c"),
                    origin: Origin::from("me"),
                    hop_limit: HOP_LIMIT,
                    text: Some("hi".to_string()),
                })
            )]
        );
    }

    #[test]
    fn test_forward_decrements_hop_limit() {
        let mut router = router("b");
        router.observe(&Origin::from("c"), addr(45003));
        let mut out = Outbox::new();

        router.receive_private(private("c", 2), &mut out);
        assert_eq!(
            out.sent(),
            vec![(addr(45003), &Message::Private(private("c", 1)))]
        );

        let mut out = Outbox::new();
        router.receive_private(private("c", 0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_private_for_us_is_delivered_not_forwarded() {
        let mut router = router("c");
        router.observe(&Origin::from("a"), addr(45001));
        let mut out = Outbox::new();

        router.receive_private(private("c", 5), &mut out);
        assert!(out.sent().is_empty());
        assert_eq!(
            out.events(),
            vec![&NodeEvent::PrivateReceived {
                origin: Origin::from("a"),
                text: Some("psst".to_string()),
            }]
        );
    }

    #[test]
    fn test_route_paxos() {
        let mut router = router("me");
        let message = PaxosMessage::Phase1 {
            round: 1,
            number: ProposalNumber::new(1, Origin::from("me")),
        };
        let mut out = Outbox::new();

        assert_eq!(
            router.route_paxos(Origin::from("me"), message.clone(), &mut out),
            Delivery::Local(message.clone())
        );
        assert_eq!(
            router.route_paxos(Origin::from("x"), message.clone(), &mut out),
            Delivery::Dropped
        );
        assert!(out.is_empty());

        router.observe(&Origin::from("x"), addr(45004));
        assert_eq!(
            router.route_paxos(Origin::from("x"), message.clone(), &mut out),
            Delivery::Sent(addr(45004))
        );
        match out.sent()[0] {
            (_, Message::Paxos(envelope)) => {
                assert_eq!(envelope.origin, Origin::from("me"));
                assert_eq!(envelope.hop_limit, HOP_LIMIT);
            }
            ref other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_receive_paxos_for_us_or_forward() {
        let mut router = router("b");
        router.observe(&Origin::from("c"), addr(45003));
        let envelope = |dest: &str, hop_limit| PaxosEnvelope {
            dest: Origin::from(dest),
            origin: Origin::from("a"),
            hop_limit,
            message: PaxosMessage::Phase1 {
                round: 2,
                number: ProposalNumber::new(1, Origin::from("a")),
            },
        };
        let mut out = Outbox::new();

        let delivered = router.receive_paxos(envelope("b", 3), &mut out);
        assert_eq!(delivered.map(|(from, _)| from), Some(Origin::from("a")));

        assert!(router.receive_paxos(envelope("c", 3), &mut out).is_none());
        assert_eq!(
            out.sent(),
            vec![(addr(45003), &Message::Paxos(envelope("c", 2)))]
        );
    }

    #[test]
    fn test_announce_reaches_every_neighbor() {
        let mut router = router("me");
        let mut gossip = GossipEngine::new(
            Origin::from("me"),
            addr(45000),
            &GossipTimings::default(),
            false,
        );
        gossip.learn_neighbor(addr(45001));
        gossip.learn_neighbor(addr(45002));
        let mut out = Outbox::new();

        router.announce(&mut gossip, &mut out).unwrap();
        let rumor = Message::Rumor {
            rumor: Rumor::route("me", 1),
            last_hop: None,
        };
        assert_eq!(
            out.sent(),
            vec![(addr(45001), &rumor), (addr(45002), &rumor)]
        );
        assert!(out.armed(TimerKind::RouteAnnounce));
        assert_eq!(gossip.vector_clock().expected("me"), 2);
    }

    #[test]
    fn test_announce_failure_does_not_rearm() {
        let mut router = router("me");
        let mut gossip = GossipEngine::new(
            Origin::from("me"),
            addr(45000),
            &GossipTimings::default(),
            false,
        );
        gossip.learn_neighbor(addr(45001));
        gossip.originate(Payload::Route);
        let mut out = Outbox::new();

        assert!(router.announce(&mut gossip, &mut out).is_err());
        assert!(!out.armed(TimerKind::RouteAnnounce));
        assert!(out.sent().is_empty());
    }

    #[test]
    fn test_search_request_goes_to_dispatcher() {
        let router = router("me");
        let request = SearchRequest {
            origin: Origin::from("a"),
            search: "cats".to_string(),
            budget: 4,
        };
        let mut out = Outbox::new();
        router.receive_search(request.clone(), &mut out);
        assert_eq!(out.events(), vec![&NodeEvent::SearchRequest(request)]);
    }
}
