// Light-client types understood by the orchestrator

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::height::Height;

/// Light-client algorithm a chain runs for its counterparty.
///
/// The set is closed: per-type behaviour lives in the capability table in
/// `crate::clients`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    /// Accepts content-hash proofs instead of storage proofs
    #[serde(rename = "mock-client")]
    Mock,
    /// Validator-set based client for IBFT2 (Besu) ledgers
    #[serde(rename = "ibft2")]
    Ibft2,
}

impl ClientType {
    /// Type tag submitted with `createClient`
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Mock => "mock-client",
            ClientType::Ibft2 => "ibft2",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mock-client" => Ok(ClientType::Mock),
            "ibft2" => Ok(ClientType::Ibft2),
            other => Err(format!("unknown client type: '{}'", other)),
        }
    }
}

pub mod mock {
    use super::Height;

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ClientState {
        #[prost(message, optional, tag = "1")]
        pub latest_height: Option<Height>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ConsensusState {
        #[prost(uint64, tag = "1")]
        pub timestamp: u64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Header {
        #[prost(message, optional, tag = "1")]
        pub height: Option<Height>,
        #[prost(uint64, tag = "2")]
        pub timestamp: u64,
    }
}

pub mod ibft2 {
    use super::Height;

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ClientState {
        #[prost(string, tag = "1")]
        pub chain_id: String,
        #[prost(bytes = "vec", tag = "2")]
        pub ibc_store_address: Vec<u8>,
        #[prost(message, optional, tag = "3")]
        pub latest_height: Option<Height>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ConsensusState {
        #[prost(uint64, tag = "1")]
        pub timestamp: u64,
        #[prost(bytes = "vec", tag = "2")]
        pub root: Vec<u8>,
        #[prost(bytes = "vec", repeated, tag = "3")]
        pub validators: Vec<Vec<u8>>,
    }

    /// Header submitted with `updateClient`; the remote client checks the
    /// seals against the validator set of `trusted_height`.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Header {
        #[prost(bytes = "vec", tag = "1")]
        pub besu_header_rlp: Vec<u8>,
        #[prost(bytes = "vec", repeated, tag = "2")]
        pub seals: Vec<Vec<u8>>,
        #[prost(message, optional, tag = "3")]
        pub trusted_height: Option<Height>,
        #[prost(bytes = "vec", tag = "4")]
        pub account_state_proof: Vec<u8>,
    }
}
