//! Wire Message Protocol
//!
//! Every datagram is one field-name → value record. There is no type tag:
//! the kind of a record is decided purely by which fields are present, and a
//! record matching no kind is dropped. Records are encoded as JSON objects.
//!
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::Origin;
use crate::paxos::{PaxosKind, PaxosMessage, ProposalNumber, ProposalValue};

/// Content carried by a rumor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Chat(String),
    /// Content-free route announcement
    Route,
}

/// One sequenced unit of per-origin content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rumor {
    pub origin: Origin,
    pub sequence: u32,
    pub payload: Payload,
}

impl Rumor {
    pub fn chat(origin: impl Into<Origin>, sequence: u32, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            sequence,
            payload: Payload::Chat(text.into()),
        }
    }

    pub fn route(origin: impl Into<Origin>, sequence: u32) -> Self {
        Self {
            origin: origin.into(),
            sequence,
            payload: Payload::Route,
        }
    }

    pub fn chat_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Chat(text) => Some(text),
            Payload::Route => None,
        }
    }
}

/// Snapshot of a vector clock: origin → next expected sequence number
pub type StatusVector = BTreeMap<Origin, u32>;

/// Point-to-point chat message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateMessage {
    pub dest: Origin,
    pub origin: Origin,
    pub hop_limit: u32,
    pub text: Option<String>,
}

/// Search request, handed whole to the external dispatcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub origin: Origin,
    pub search: String,
    pub budget: u32,
}

/// Consensus message in its point-to-point envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaxosEnvelope {
    pub dest: Origin,
    pub origin: Origin,
    pub hop_limit: u32,
    pub message: PaxosMessage,
}

/// A classified inbound or outbound record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// `last_hop` names the peer the relaying sender got the rumor from
    Rumor {
        rumor: Rumor,
        last_hop: Option<SocketAddr>,
    },
    Status(StatusVector),
    Private(PrivateMessage),
    Search(SearchRequest),
    Paxos(PaxosEnvelope),
}

/// Raw field-name → value record as it travels on the wire
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Origin", skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(rename = "SeqNo", skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<u32>,
    #[serde(rename = "ChatText", skip_serializing_if = "Option::is_none")]
    pub chat_text: Option<String>,
    #[serde(rename = "Want", skip_serializing_if = "Option::is_none")]
    pub want: Option<StatusVector>,
    #[serde(rename = "Dest", skip_serializing_if = "Option::is_none")]
    pub dest: Option<Origin>,
    #[serde(rename = "HopLimit", skip_serializing_if = "Option::is_none")]
    pub hop_limit: Option<u32>,
    #[serde(rename = "Search", skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(rename = "Budget", skip_serializing_if = "Option::is_none")]
    pub budget: Option<u32>,
    #[serde(rename = "LastIP", skip_serializing_if = "Option::is_none")]
    pub last_ip: Option<IpAddr>,
    #[serde(rename = "LastPort", skip_serializing_if = "Option::is_none")]
    pub last_port: Option<u16>,
    #[serde(rename = "Paxos", skip_serializing_if = "Option::is_none")]
    pub paxos: Option<u8>,
    #[serde(rename = "Round", skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(rename = "ProposalNumber", skip_serializing_if = "Option::is_none")]
    pub proposal_number: Option<ProposalNumber>,
    #[serde(rename = "AcceptedNumber", skip_serializing_if = "Option::is_none")]
    pub accepted_number: Option<ProposalNumber>,
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
    pub value: Option<ProposalValue>,
}

impl Record {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    fn is_status(&self) -> bool {
        self.want.is_some()
            && self.origin.is_none()
            && self.seq_no.is_none()
            && self.chat_text.is_none()
    }

    fn is_paxos(&self) -> bool {
        self.paxos.is_some()
            && self.round.is_some()
            && self.proposal_number.is_some()
            && self.is_private()
    }

    fn is_private(&self) -> bool {
        self.dest.is_some() && self.origin.is_some() && self.hop_limit.is_some()
    }

    fn is_search(&self) -> bool {
        self.origin.is_some() && self.search.is_some() && self.budget.is_some()
    }

    fn is_rumor(&self) -> bool {
        self.origin.is_some() && self.seq_no.is_some() && self.want.is_none()
    }

    fn last_hop(&self) -> Option<SocketAddr> {
        match (self.last_ip, self.last_port) {
            (Some(ip), Some(port)) => Some(SocketAddr::new(ip, port)),
            _ => None,
        }
    }

    fn paxos_message(self) -> Option<PaxosMessage> {
        let kind = PaxosKind::from_code(self.paxos?)?;
        let round = self.round?;
        let number = self.proposal_number?;
        let message = match kind {
            PaxosKind::Phase1 => PaxosMessage::Phase1 { round, number },
            PaxosKind::Phase2 => PaxosMessage::Phase2 {
                round,
                number,
                value: self.value?,
            },
            PaxosKind::Commit => PaxosMessage::Commit {
                round,
                number,
                value: self.value?,
            },
            PaxosKind::Reject => PaxosMessage::Reject { round, number },
            PaxosKind::PromiseValue => PaxosMessage::Promise {
                round,
                number,
                accepted: Some((self.accepted_number?, self.value?)),
            },
            PaxosKind::PromiseNoValue => PaxosMessage::Promise {
                round,
                number,
                accepted: None,
            },
            PaxosKind::Accept => PaxosMessage::Accept { round, number },
            PaxosKind::Lagging => PaxosMessage::Lagging {
                round,
                number,
                value: self.value?,
            },
        };
        Some(message)
    }

    fn with_paxos(mut self, message: PaxosMessage) -> Self {
        self.paxos = Some(message.kind().code());
        self.round = Some(message.round());
        self.proposal_number = Some(message.number().clone());
        match message {
            PaxosMessage::Phase2 { value, .. }
            | PaxosMessage::Commit { value, .. }
            | PaxosMessage::Lagging { value, .. } => self.value = Some(value),
            PaxosMessage::Promise {
                accepted: Some((accepted_number, value)),
                ..
            } => {
                self.accepted_number = Some(accepted_number);
                self.value = Some(value);
            }
            PaxosMessage::Phase1 { .. }
            | PaxosMessage::Reject { .. }
            | PaxosMessage::Promise { accepted: None, .. }
            | PaxosMessage::Accept { .. } => {}
        }
        self
    }
}

impl Message {
    /// Classify a record by field presence. `None` means malformed or unknown.
    pub fn classify(record: Record) -> Option<Message> {
        if record.is_status() {
            return record.want.map(Message::Status);
        }
        if record.paxos.is_some() {
            if !record.is_paxos() {
                return None;
            }
            let dest = record.dest.clone()?;
            let origin = record.origin.clone()?;
            let hop_limit = record.hop_limit?;
            let message = record.paxos_message()?;
            return Some(Message::Paxos(PaxosEnvelope {
                dest,
                origin,
                hop_limit,
                message,
            }));
        }
        if record.is_private() {
            return Some(Message::Private(PrivateMessage {
                dest: record.dest?,
                origin: record.origin?,
                hop_limit: record.hop_limit?,
                text: record.chat_text,
            }));
        }
        if record.is_search() {
            return Some(Message::Search(SearchRequest {
                origin: record.origin?,
                search: record.search?,
                budget: record.budget?,
            }));
        }
        if record.is_rumor() {
            let last_hop = record.last_hop();
            let sequence = record.seq_no.filter(|seq| *seq >= 1)?;
            let origin = record.origin?;
            let payload = match record.chat_text {
                Some(text) => Payload::Chat(text),
                None => Payload::Route,
            };
            return Some(Message::Rumor {
                rumor: Rumor {
                    origin,
                    sequence,
                    payload,
                },
                last_hop,
            });
        }
        None
    }

    /// Decode a datagram. `Ok(None)` is a well-formed record of no known kind.
    pub fn decode(data: &[u8]) -> Result<Option<Message>> {
        Ok(Message::classify(Record::decode(data)?))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Record::from(self.clone()).encode()
    }
}

impl From<Message> for Record {
    fn from(message: Message) -> Self {
        match message {
            Message::Rumor { rumor, last_hop } => Record {
                origin: Some(rumor.origin),
                seq_no: Some(rumor.sequence),
                chat_text: match rumor.payload {
                    Payload::Chat(text) => Some(text),
                    Payload::Route => None,
                },
                last_ip: last_hop.map(|addr| addr.ip()),
                last_port: last_hop.map(|addr| addr.port()),
                ..Record::default()
            },
            Message::Status(want) => Record {
                want: Some(want),
                ..Record::default()
            },
            Message::Private(private) => Record {
                dest: Some(private.dest),
                origin: Some(private.origin),
                hop_limit: Some(private.hop_limit),
                chat_text: private.text,
                ..Record::default()
            },
            Message::Search(search) => Record {
                origin: Some(search.origin),
                search: Some(search.search),
                budget: Some(search.budget),
                ..Record::default()
            },
            Message::Paxos(envelope) => Record {
                dest: Some(envelope.dest),
                origin: Some(envelope.origin),
                hop_limit: Some(envelope.hop_limit),
                ..Record::default()
            }
            .with_paxos(envelope.message),
        }
    }
}
