// Connection ends as stored by the host module

/// Connection handshake state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum State {
    Uninitialized = 0,
    Init = 1,
    TryOpen = 2,
    Open = 3,
}

/// Commitment prefix under which the counterparty stores its state
#[derive(Clone, PartialEq, prost::Message)]
pub struct MerklePrefix {
    #[prost(bytes = "vec", tag = "1")]
    pub key_prefix: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Counterparty {
    #[prost(string, tag = "1")]
    pub client_id: String,
    #[prost(string, tag = "2")]
    pub connection_id: String,
    #[prost(message, optional, tag = "3")]
    pub prefix: Option<MerklePrefix>,
}

/// Connection version: an identifier plus the channel orderings it allows
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Version {
    #[prost(string, tag = "1")]
    pub identifier: String,
    #[prost(string, repeated, tag = "2")]
    pub features: Vec<String>,
}

impl Version {
    /// The single version offered during the handshake
    pub fn default_version() -> Self {
        Self {
            identifier: "1".to_string(),
            features: vec!["ORDER_ORDERED".to_string(), "ORDER_UNORDERED".to_string()],
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConnectionEnd {
    #[prost(string, tag = "1")]
    pub client_id: String,
    #[prost(message, repeated, tag = "2")]
    pub versions: Vec<Version>,
    #[prost(enumeration = "State", tag = "3")]
    pub state: i32,
    #[prost(message, optional, tag = "4")]
    pub counterparty: Option<Counterparty>,
    /// Minimum time (ns) a consensus state must age before proofs against it verify
    #[prost(uint64, tag = "5")]
    pub delay_period: u64,
}

impl ConnectionEnd {
    pub fn counterparty_connection_id(&self) -> Option<&str> {
        self.counterparty
            .as_ref()
            .map(|c| c.connection_id.as_str())
            .filter(|id| !id.is_empty())
    }
}
