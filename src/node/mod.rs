//! The node controller.
//!
//! A single task owns the gossip engine, the router and the Paxos
//! coordinator. It processes one event at a time (a front-end command, an
//! inbound datagram or a timer deadline) and applies every effect the event
//! produced before looking at the next one.
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

pub mod commands;
pub mod node_id;
pub mod outbox;
pub mod timers;

use crate::error::Result;
use crate::gossip::GossipEngine;
use crate::messages::Message;
use crate::node_error;
use crate::paxos::{Coordinator, PaxosMessage};
use crate::routing::{Delivery, Router};
use crate::settings::Settings;
use crate::transport::{Datagram, Sender, UdpTransport};
pub use commands::{NodeCommand, NodeEvent, NodeSnapshot};
pub use node_id::Origin;
pub use outbox::{Effect, Outbox};
pub use timers::{TimerKind, Timers};

const COMMAND_CHANNEL_SIZE: usize = 1000;

pub struct Node {
    origin: Origin,
    gossip: GossipEngine,
    router: Router,
    paxos: Coordinator,
    timers: Timers,
    transport: Arc<dyn Sender>,
    inbound: mpsc::UnboundedReceiver<Datagram>,
    commands: mpsc::Receiver<NodeCommand>,
    events: mpsc::UnboundedSender<NodeEvent>,
    /// Consensus messages we addressed to ourselves
    loopback: VecDeque<PaxosMessage>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("origin", &self.origin)
            .field("local_addr", &self.transport.local_addr())
            .field("neighbors", &self.gossip.neighbors().len())
            .field("routes", &self.router.routes().len())
            .finish()
    }
}

impl Node {
    /// Bind the UDP socket and build the node. Failing to bind is fatal.
    pub async fn bind(
        settings: Settings,
    ) -> Result<(Node, NodeHandle, mpsc::UnboundedReceiver<NodeEvent>)> {
        let transport = UdpTransport::bind(settings.listen_socket_addr()?).await?;
        let inbound = transport.receiver().start();
        Self::with_transport(settings, Arc::new(transport), inbound)
    }

    /// Build a node over an already bound transport
    pub fn with_transport(
        settings: Settings,
        transport: Arc<dyn Sender>,
        inbound: mpsc::UnboundedReceiver<Datagram>,
    ) -> Result<(Node, NodeHandle, mpsc::UnboundedReceiver<NodeEvent>)> {
        let local_addr = transport.local_addr();
        let origin = settings.origin(local_addr);
        let participants = settings.participants(&origin);

        let mut gossip = GossipEngine::new(
            origin.clone(),
            local_addr,
            &settings.timings,
            settings.noforward,
        );
        for peer in &settings.peers {
            gossip.learn_neighbor(*peer);
        }
        let router = Router::new(origin.clone(), &settings.timings);
        let paxos = Coordinator::new(
            origin.clone(),
            participants,
            settings.timings.paxos_round_timeout,
        )?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handle = NodeHandle {
            origin: origin.clone(),
            local_addr,
            commands: command_tx,
        };
        let node = Node {
            origin,
            gossip,
            router,
            paxos,
            timers: Timers::new(),
            transport,
            inbound,
            commands: command_rx,
            events: event_tx,
            loopback: VecDeque::new(),
        };
        Ok((node, handle, event_rx))
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Run until every `NodeHandle` is dropped
    pub async fn run(mut self) {
        info!(
            "[{}] Listening on {} with {} neighbors, {} participants{}",
            self.origin,
            self.transport.local_addr(),
            self.gossip.neighbors().len(),
            self.paxos.participants().len(),
            if self.gossip.is_noforward() {
                " (noforward)"
            } else {
                ""
            }
        );

        let mut out = Outbox::new();
        self.gossip.start(&mut out);
        if let Err(e) = self.router.announce(&mut self.gossip, &mut out) {
            error!("[{}] Route announcement failed: {}", self.origin, e);
        }
        self.apply(out).await;

        loop {
            let deadline = self.timers.next_deadline();
            let wake_at = deadline
                .map(|(_, at)| at)
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        info!("[{}] Command channel closed, exiting", self.origin);
                        break;
                    }
                },
                Some((data, from)) = self.inbound.recv() => {
                    self.handle_datagram(data, from).await;
                }
                _ = sleep_until(wake_at), if deadline.is_some() => {
                    self.handle_timers().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: NodeCommand) {
        let mut out = Outbox::new();
        match cmd {
            NodeCommand::SubmitChat { text, resp_chan } => {
                let result = self
                    .gossip
                    .submit_local(text, &mut out)
                    .map(|rumor| rumor.sequence);
                if let Err(e) = &result {
                    error!("[{}] Chat message lost: {}", self.origin, e);
                }
                let _ = resp_chan.send(result);
            }
            NodeCommand::SendPrivate {
                dest,
                text,
                resp_chan,
            } => {
                let sent = self.router.send_private(dest, text, &mut out);
                let _ = resp_chan.send(sent);
            }
            NodeCommand::ProposeValue { text, resp_chan } => {
                let value = self.paxos.client_request(text, &mut out);
                let _ = resp_chan.send(value.id);
            }
            NodeCommand::AddPeer { addr, resp_chan } => {
                let added = self.gossip.learn_neighbor(addr);
                let _ = resp_chan.send(added);
            }
            NodeCommand::Snapshot { resp_chan } => {
                let _ = resp_chan.send(self.snapshot());
            }
        }
        self.apply(out).await;
    }

    async fn handle_datagram(&mut self, data: Vec<u8>, from: SocketAddr) {
        let message = match Message::decode(&data) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("[{}] Unrecognized record from {}, dropped", self.origin, from);
                return;
            }
            Err(e) => {
                debug!("[{}] Malformed datagram from {}: {}", self.origin, from, e);
                return;
            }
        };

        let mut out = Outbox::new();
        self.gossip.learn_neighbor(from);
        match message {
            Message::Rumor { rumor, last_hop } => {
                self.router.observe(&rumor.origin, from);
                self.gossip.receive_rumor(rumor, from, last_hop, &mut out);
            }
            Message::Status(status) => {
                self.gossip.receive_status(status, from, &mut out);
            }
            Message::Private(private) => {
                self.router.observe(&private.origin, from);
                self.router.receive_private(private, &mut out);
            }
            Message::Search(request) => {
                self.router.observe(&request.origin, from);
                self.router.receive_search(request, &mut out);
            }
            Message::Paxos(envelope) => {
                self.router.observe(&envelope.origin, from);
                if let Some((origin, message)) = self.router.receive_paxos(envelope, &mut out) {
                    self.paxos.handle(origin, message, &mut out);
                }
            }
        }
        self.apply(out).await;
    }

    async fn handle_timers(&mut self) {
        let mut out = Outbox::new();
        for timer in self.timers.expire(Instant::now()) {
            match timer {
                TimerKind::Rumor => self.gossip.on_rumor_timeout(&mut out),
                TimerKind::AntiEntropy => self.gossip.on_anti_entropy(&mut out),
                TimerKind::RouteAnnounce => {
                    if let Err(e) = self.router.announce(&mut self.gossip, &mut out) {
                        error!("[{}] Route announcement failed: {}", self.origin, e);
                    }
                }
                TimerKind::PaxosRound => self.paxos.on_round_timeout(&mut out),
            }
        }
        self.apply(out).await;
    }

    /// Apply effects in order. Consensus messages to ourselves are queued and
    /// handled once the current batch is done.
    async fn apply(&mut self, mut out: Outbox) {
        let mut pending: VecDeque<Effect> = out.take().into();
        loop {
            while let Some(effect) = pending.pop_front() {
                match effect {
                    Effect::Send { to, message } => self.send(to, &message).await,
                    Effect::Paxos { dest, message } => {
                        let mut routed = Outbox::new();
                        if let Delivery::Local(message) =
                            self.router.route_paxos(dest, message, &mut routed)
                        {
                            self.loopback.push_back(message);
                        }
                        pending.extend(routed.take());
                    }
                    Effect::Arm { timer, after } => self.timers.arm(timer, after, Instant::now()),
                    Effect::Stop(timer) => self.timers.stop(timer),
                    Effect::Notify(event) => {
                        // front ends may have gone away
                        let _ = self.events.send(event);
                    }
                }
            }
            let Some(message) = self.loopback.pop_front() else {
                break;
            };
            let mut out = Outbox::new();
            self.paxos.handle(self.origin.clone(), message, &mut out);
            pending.extend(out.take());
        }
    }

    async fn send(&self, to: SocketAddr, message: &Message) {
        let data = match message.encode() {
            Ok(data) => data,
            Err(e) => {
                error!("[{}] Failed to encode message for {}: {}", self.origin, to, e);
                return;
            }
        };
        if let Err(e) = self.transport.send_to(to, &data).await {
            debug!("[{}] {}", self.origin, e);
        }
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            origin: self.origin.clone(),
            status: self.gossip.status(),
            messages: self
                .gossip
                .message_log()
                .iter()
                .flat_map(|(_, history)| history.iter().cloned())
                .collect(),
            neighbors: self.gossip.neighbors().iter().copied().collect(),
            routes: self.router.routes().clone(),
            commits: self.paxos.commits().clone(),
            hot: self.gossip.is_hot(),
        }
    }
}

/// Front-end side of a running node
#[derive(Clone, Debug)]
pub struct NodeHandle {
    origin: Origin,
    local_addr: SocketAddr,
    commands: mpsc::Sender<NodeCommand>,
}

impl NodeHandle {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Originate a chat rumor; returns its sequence number
    pub async fn submit_chat(&self, text: impl Into<String>) -> Result<u32> {
        let text = text.into();
        self.request(|resp_chan| NodeCommand::SubmitChat { text, resp_chan })
            .await?
    }

    /// Returns false when there is no route to `dest`
    pub async fn send_private(&self, dest: Origin, text: impl Into<String>) -> Result<bool> {
        let text = text.into();
        self.request(|resp_chan| NodeCommand::SendPrivate {
            dest,
            text,
            resp_chan,
        })
        .await
    }

    /// Submit a value for consensus; returns the value's id
    pub async fn propose(&self, text: impl Into<String>) -> Result<String> {
        let text = text.into();
        self.request(|resp_chan| NodeCommand::ProposeValue { text, resp_chan })
            .await
    }

    pub async fn add_peer(&self, addr: SocketAddr) -> Result<bool> {
        self.request(|resp_chan| NodeCommand::AddPeer { addr, resp_chan })
            .await
    }

    pub async fn snapshot(&self) -> Result<NodeSnapshot> {
        self.request(|resp_chan| NodeCommand::Snapshot { resp_chan })
            .await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> NodeCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| node_error!("node task has stopped"))?;
        rx.await
            .map_err(|_| node_error!("node task dropped the request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{PrivateMessage, Rumor};
    use crate::settings::GossipTimings;

    fn settings(name: &str) -> Settings {
        Settings {
            listen_port: 0,
            node_name: Some(name.to_string()),
            timings: GossipTimings {
                rumor_timeout: Duration::from_millis(100),
                anti_entropy_interval: Duration::from_millis(200),
                route_announce_interval: Duration::from_secs(60),
                paxos_round_timeout: Duration::from_millis(300),
            },
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_bind_uses_configured_name() {
        let (node, handle, _events) = Node::bind(settings("alice")).await.unwrap();
        assert_eq!(node.origin(), &Origin::from("alice"));
        assert_eq!(handle.origin(), &Origin::from("alice"));
        assert_ne!(handle.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_handle_fails_once_node_is_gone() {
        let (node, handle, _events) = Node::bind(settings("alice")).await.unwrap();
        drop(node);
        let err = handle.submit_chat("hi").await.unwrap_err();
        assert_eq!(err.error_type(), "node_error");
    }

    #[tokio::test]
    async fn test_single_node_chat_and_consensus() {
        let (node, handle, mut events) = Node::bind(settings("solo")).await.unwrap();
        tokio::spawn(node.run());

        assert_eq!(handle.submit_chat("hello").await.unwrap(), 2);
        assert_eq!(
            events.recv().await,
            Some(NodeEvent::MessageAccepted {
                origin: Origin::from("solo"),
                sequence: 2,
                text: "hello".to_string(),
            })
        );

        // a lone participant is its own majority
        let id = handle.propose("decide me").await.unwrap();
        match events.recv().await {
            Some(NodeEvent::ValueCommitted { round, value }) => {
                assert_eq!(round, 1);
                assert_eq!(value.id, id);
            }
            other => panic!("Wrong event: {:?}", other),
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.chat_from("solo"), vec!["hello"]);
        // the startup route rumor took sequence 1
        assert_eq!(snapshot.messages[0], Rumor::route("solo", 1));
        assert_eq!(snapshot.commits.len(), 1);
    }

    #[tokio::test]
    async fn test_private_message_without_route() {
        let (node, handle, _events) = Node::bind(settings("alice")).await.unwrap();
        tokio::spawn(node.run());
        assert!(!handle
            .send_private(Origin::from("nobody"), "hi")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_private_datagram_is_delivered() {
        let (node, handle, mut events) = Node::bind(settings("carol")).await.unwrap();
        tokio::spawn(node.run());

        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let data = Message::Private(PrivateMessage {
            dest: Origin::from("carol"),
            origin: Origin::from("alice"),
            hop_limit: 3,
            text: Some("psst".to_string()),
        })
        .encode()
        .unwrap();
        socket.send_to(&data, handle.local_addr()).await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(NodeEvent::PrivateReceived {
                origin: Origin::from("alice"),
                text: Some("psst".to_string()),
            })
        );
        let snapshot = handle.snapshot().await.unwrap();
        let sender = socket.local_addr().unwrap();
        assert_eq!(snapshot.routes.get("alice"), Some(&sender));
        assert!(snapshot.neighbors.contains(&sender));
    }
}
