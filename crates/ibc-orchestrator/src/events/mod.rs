// Event-log decoding and identifier discovery
//
// Identifiers for clients, connections and channels are generated by the host
// module when a create/Init/Try call is mined; they are only observable through
// the logs it emits. Packets sent through the handler are recovered the same way.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::debug;

use crate::abi::{self, ParamType, Token};
use crate::chains::{Address, LedgerHandle, LogEntry};
use crate::error::{CodecError, EntityKind, Error, Result};
use crate::types::{Height, Packet};

/// Canonical event signature, e.g. `GeneratedClientIdentifier(string)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSignature(String);

impl EventSignature {
    pub fn new(name: &str, inputs: &[ParamType]) -> Self {
        let params: Vec<String> = inputs.iter().map(ParamType::canonical).collect();
        EventSignature(format!("{}({})", name, params.join(",")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.split('(').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for EventSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// IBC events the orchestrator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GeneratedClientIdentifier,
    GeneratedConnectionIdentifier,
    GeneratedChannelIdentifier,
    SendPacket,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::GeneratedClientIdentifier,
        EventKind::GeneratedConnectionIdentifier,
        EventKind::GeneratedChannelIdentifier,
        EventKind::SendPacket,
    ];

    fn name(&self) -> &'static str {
        match self {
            EventKind::GeneratedClientIdentifier => "GeneratedClientIdentifier",
            EventKind::GeneratedConnectionIdentifier => "GeneratedConnectionIdentifier",
            EventKind::GeneratedChannelIdentifier => "GeneratedChannelIdentifier",
            EventKind::SendPacket => "SendPacket",
        }
    }
}

/// Contract that emits an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitter {
    Host,
    Handler,
}

/// Layout and origin of one event
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub kind: EventKind,
    pub emitter: Emitter,
    pub inputs: Vec<ParamType>,
    pub signature: EventSignature,
}

/// Read-only table of event layouts, built once per process
#[derive(Debug)]
pub struct EventRegistry {
    specs: HashMap<EventKind, EventSpec>,
}

static REGISTRY: OnceLock<EventRegistry> = OnceLock::new();

/// The process-wide event registry
pub fn registry() -> &'static EventRegistry {
    REGISTRY.get_or_init(EventRegistry::build)
}

fn packet_param() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint64,
        ParamType::String,
        ParamType::String,
        ParamType::String,
        ParamType::String,
        ParamType::Bytes,
        ParamType::Tuple(vec![ParamType::Uint64, ParamType::Uint64]),
        ParamType::Uint64,
    ])
}

impl EventRegistry {
    fn build() -> Self {
        let specs = EventKind::ALL
            .iter()
            .map(|&kind| {
                let (emitter, inputs) = match kind {
                    EventKind::SendPacket => (Emitter::Handler, vec![packet_param()]),
                    _ => (Emitter::Host, vec![ParamType::String]),
                };
                let signature = EventSignature::new(kind.name(), &inputs);
                (kind, EventSpec { kind, emitter, inputs, signature })
            })
            .collect();
        Self { specs }
    }

    pub fn spec(&self, kind: EventKind) -> &EventSpec {
        // every kind is inserted by `build`
        &self.specs[&kind]
    }

    /// Decode the identifier carried by a `Generated*Identifier` log
    pub fn decode_identifier(&self, kind: EventKind, log: &LogEntry) -> Result<String> {
        let spec = self.spec(kind);
        let mut values = abi::decode(&spec.inputs, &log.data)?;
        if values.is_empty() {
            return Err(CodecError::Abi(format!("{} carries no fields", spec.signature)).into());
        }
        values
            .swap_remove(0)
            .into_string()
            .ok_or_else(|| CodecError::Abi(format!("{} field 0 is not a string", spec.signature)).into())
    }

    /// Decode the packet carried by a `SendPacket` log
    pub fn decode_packet(&self, log: &LogEntry) -> Result<Packet> {
        let spec = self.spec(EventKind::SendPacket);
        let values = abi::decode(&spec.inputs, &log.data)?;
        let fields = values
            .into_iter()
            .next()
            .and_then(Token::into_tuple)
            .ok_or_else(|| CodecError::Abi("SendPacket payload is not a tuple".to_string()))?;
        packet_from_tokens(fields).map_err(Error::from)
    }

    /// ABI data of a `Generated*Identifier` log
    pub fn encode_identifier(&self, identifier: &str) -> Vec<u8> {
        abi::encode(&[Token::String(identifier.to_string())])
    }

    /// ABI data of a `SendPacket` log
    pub fn encode_packet(&self, packet: &Packet) -> Vec<u8> {
        abi::encode(&[packet_to_token(packet)])
    }
}

fn packet_to_token(packet: &Packet) -> Token {
    Token::Tuple(vec![
        Token::Uint(packet.sequence),
        Token::String(packet.source_port.clone()),
        Token::String(packet.source_channel.clone()),
        Token::String(packet.destination_port.clone()),
        Token::String(packet.destination_channel.clone()),
        Token::Bytes(packet.data.clone()),
        Token::Tuple(vec![
            Token::Uint(packet.timeout_height.revision_number),
            Token::Uint(packet.timeout_height.revision_height),
        ]),
        Token::Uint(packet.timeout_timestamp),
    ])
}

fn packet_from_tokens(fields: Vec<Token>) -> std::result::Result<Packet, CodecError> {
    let malformed = || CodecError::Abi("malformed SendPacket payload".to_string());
    let mut it = fields.into_iter();
    let mut next = || it.next().ok_or_else(malformed);

    let sequence = next()?.into_uint().ok_or_else(malformed)?;
    let source_port = next()?.into_string().ok_or_else(malformed)?;
    let source_channel = next()?.into_string().ok_or_else(malformed)?;
    let destination_port = next()?.into_string().ok_or_else(malformed)?;
    let destination_channel = next()?.into_string().ok_or_else(malformed)?;
    let data = next()?.into_bytes().ok_or_else(malformed)?;
    let height = next()?.into_tuple().ok_or_else(malformed)?;
    let timeout_timestamp = next()?.into_uint().ok_or_else(malformed)?;

    let mut height = height.into_iter().map(Token::into_uint);
    let revision_number = height.next().flatten().ok_or_else(malformed)?;
    let revision_height = height.next().flatten().ok_or_else(malformed)?;

    Ok(Packet {
        sequence,
        source_port,
        source_channel,
        destination_port,
        destination_channel,
        data,
        timeout_height: Height::new(revision_number, revision_height),
        timeout_timestamp,
    })
}

/// Identifier from the most recent `kind` log emitted by `address`.
///
/// Scans from genesis and takes the last log: the latest create/Init/Try
/// call produced it.
pub async fn discover_last_id(
    ledger: &dyn LedgerHandle,
    registry: &EventRegistry,
    address: &Address,
    kind: EventKind,
) -> Result<String> {
    let spec = registry.spec(kind);
    let logs = ledger
        .filter_logs(address, &spec.signature, 0)
        .await
        .map_err(|e| Error::ledger(format!("filter {}", spec.signature.name()), e))?;

    let log = logs
        .last()
        .ok_or_else(|| Error::not_found(EntityKind::Event, spec.signature.to_string()))?;
    let identifier = registry.decode_identifier(kind, log)?;
    debug!(
        "🔎 Discovered {} from block {} (log {} of {})",
        identifier,
        log.block_number,
        logs.len(),
        spec.signature.name()
    );
    Ok(identifier)
}

/// Packet with the exact (port, channel, sequence) key among the `SendPacket`
/// logs of `address`
pub async fn find_sent_packet(
    ledger: &dyn LedgerHandle,
    registry: &EventRegistry,
    address: &Address,
    source_port: &str,
    source_channel: &str,
    sequence: u64,
) -> Result<Packet> {
    let spec = registry.spec(EventKind::SendPacket);
    let logs = ledger
        .filter_logs(address, &spec.signature, 0)
        .await
        .map_err(|e| Error::ledger("filter SendPacket", e))?;

    for log in &logs {
        let packet = registry.decode_packet(log)?;
        if packet.source_port == source_port
            && packet.source_channel == source_channel
            && packet.sequence == sequence
        {
            return Ok(packet);
        }
    }

    Err(Error::not_found(
        EntityKind::Packet,
        format!(
            "sourcePort={} sourceChannel={} sequence={}",
            source_port, source_channel, sequence
        ),
    ))
}
