// Channel ends and packets

use super::height::Height;

/// Channel handshake state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum State {
    Uninitialized = 0,
    Init = 1,
    TryOpen = 2,
    Open = 3,
    Closed = 4,
}

/// Packet delivery ordering of a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Order {
    NoneUnspecified = 0,
    Unordered = 1,
    Ordered = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Counterparty {
    #[prost(string, tag = "1")]
    pub port_id: String,
    #[prost(string, tag = "2")]
    pub channel_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Channel {
    #[prost(enumeration = "State", tag = "1")]
    pub state: i32,
    #[prost(enumeration = "Order", tag = "2")]
    pub ordering: i32,
    #[prost(message, optional, tag = "3")]
    pub counterparty: Option<Counterparty>,
    #[prost(string, repeated, tag = "4")]
    pub connection_hops: Vec<String>,
    #[prost(string, tag = "5")]
    pub version: String,
}

impl Channel {
    pub fn counterparty_channel_id(&self) -> Option<&str> {
        self.counterparty
            .as_ref()
            .map(|c| c.channel_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// A cross-chain message.
///
/// Identified by (source port, source channel, sequence); sequences start at 1
/// and are allocated by the sending host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence: u64,
    pub source_port: String,
    pub source_channel: String,
    pub destination_port: String,
    pub destination_channel: String,
    pub data: Vec<u8>,
    pub timeout_height: Height,
    pub timeout_timestamp: u64,
}

impl Packet {
    pub fn key(&self) -> PacketKey {
        PacketKey {
            port_id: self.source_port.clone(),
            channel_id: self.source_channel.clone(),
            sequence: self.sequence,
        }
    }
}

/// Unique key for a packet on its sending chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacketKey {
    pub port_id: String,
    pub channel_id: String,
    pub sequence: u64,
}

impl std::fmt::Display for PacketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.port_id, self.channel_id, self.sequence)
    }
}
