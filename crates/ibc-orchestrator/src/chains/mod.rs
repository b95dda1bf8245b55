// Ledger collaborator interface
//
// A `LedgerHandle` wraps the connection to one ledger: it submits handler
// calls, reports receipts, serves historical contract state with storage
// proofs, filters event logs and answers the host's view calls.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::events::EventSignature;
use crate::keystore::SignerKey;
use crate::types::msgs::HandlerMsg;
use crate::types::{Channel, ConnectionEnd};

pub mod wait;

pub use wait::{submit_and_wait, wait_mined, CancelToken, WaitPolicy};

/// Address of a contract on a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| format!("invalid address {}: {}", s, e))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| format!("address {} must be 20 bytes", s))?;
        Ok(Address(array))
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Addresses of the IBC contracts deployed on one ledger
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressBook {
    /// IBC host: stores client, connection and channel state
    pub host: Address,
    /// IBC handler: entry point for every handler call
    pub handler: Address,
    /// Computes commitment storage slots
    pub identifier: Address,
    pub ibft2_client: Address,
    pub mock_client: Address,
}

/// Hex-encoded storage slot, as accepted by `query_state`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn from_slot(slot: [u8; 32]) -> Self {
        StorageKey(format!("0x{}", hex::encode(slot)))
    }

    /// Wrap an already rendered key; validity is checked by the proof subsystem
    pub fn new(key: impl Into<String>) -> Self {
        StorageKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_hex(&self) -> bool {
        self.0.starts_with("0x")
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity whose commitment slot is requested from the identifier contract
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommitmentPath {
    ClientState {
        client_id: String,
    },
    Connection {
        connection_id: String,
    },
    Channel {
        port_id: String,
        channel_id: String,
    },
    Packet {
        port_id: String,
        channel_id: String,
        sequence: u64,
    },
    PacketAcknowledgement {
        port_id: String,
        channel_id: String,
        sequence: u64,
    },
}

impl fmt::Display for CommitmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitmentPath::ClientState { client_id } => write!(f, "clients/{}/clientState", client_id),
            CommitmentPath::Connection { connection_id } => write!(f, "connections/{}", connection_id),
            CommitmentPath::Channel { port_id, channel_id } => {
                write!(f, "channelEnds/ports/{}/channels/{}", port_id, channel_id)
            }
            CommitmentPath::Packet { port_id, channel_id, sequence } => write!(
                f,
                "commitments/ports/{}/channels/{}/sequences/{}",
                port_id, channel_id, sequence
            ),
            CommitmentPath::PacketAcknowledgement { port_id, channel_id, sequence } => write!(
                f,
                "acks/ports/{}/channels/{}/sequences/{}",
                port_id, channel_id, sequence
            ),
        }
    }
}

/// Transaction identifier returned on submission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub revert_reason: Option<String>,
}

/// Ledger block header fields the orchestrator reads
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub number: u64,
    /// Block time in seconds
    pub time: u64,
    pub state_root: Vec<u8>,
}

/// Account and storage proofs returned with a state query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EthProof {
    pub account_proof_rlp: Vec<u8>,
    /// One entry per requested storage key, in request order
    pub storage_proof_rlp: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthContractState {
    pub header: Header,
    pub proof: EthProof,
}

/// State of an IBFT2 ledger, including what its light client needs to
/// verify the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ibft2ContractState {
    pub header: Header,
    pub proof: EthProof,
    pub validators: Vec<Vec<u8>>,
    pub sealing_header_rlp: Vec<u8>,
    pub commit_seals: Vec<Vec<u8>>,
}

/// Contract state at a height
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractState {
    Eth(EthContractState),
    Ibft2(Ibft2ContractState),
}

impl ContractState {
    pub fn header(&self) -> &Header {
        match self {
            ContractState::Eth(s) => &s.header,
            ContractState::Ibft2(s) => &s.header,
        }
    }

    pub fn eth_proof(&self) -> &EthProof {
        match self {
            ContractState::Eth(s) => &s.proof,
            ContractState::Ibft2(s) => &s.proof,
        }
    }

    pub fn ibft2(&self) -> Option<&Ibft2ContractState> {
        match self {
            ContractState::Ibft2(s) => Some(s),
            ContractState::Eth(_) => None,
        }
    }
}

/// A log emitted by a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub event: EventSignature,
    pub block_number: u64,
    pub log_index: u64,
    /// ABI-encoded non-indexed fields
    pub data: Vec<u8>,
}

/// Connection to one ledger
#[async_trait]
pub trait LedgerHandle: Send + Sync {
    /// Sign with `signer` and broadcast a call to the IBC handler
    async fn submit(&self, signer: &SignerKey, msg: &HandlerMsg) -> Result<TxHash, BoxError>;

    /// Receipt of a submitted transaction, `None` while it is pending
    async fn receipt(&self, tx_hash: &TxHash) -> Result<Option<Receipt>, BoxError>;

    /// Header at `height` (latest when `None`) plus proofs for `storage_keys`
    async fn query_state(
        &self,
        address: &Address,
        storage_keys: &[StorageKey],
        height: Option<u64>,
    ) -> Result<ContractState, BoxError>;

    /// All logs of `event` emitted by `address` from `from_height`, in ledger order
    async fn filter_logs(
        &self,
        address: &Address,
        event: &EventSignature,
        from_height: u64,
    ) -> Result<Vec<LogEntry>, BoxError>;

    /// Stored client state bytes (an `Any` envelope)
    async fn client_state(&self, client_id: &str) -> Result<Option<Vec<u8>>, BoxError>;

    async fn connection(&self, connection_id: &str) -> Result<Option<ConnectionEnd>, BoxError>;

    async fn channel(&self, port_id: &str, channel_id: &str) -> Result<Option<Channel>, BoxError>;

    async fn next_sequence_send(&self, port_id: &str, channel_id: &str) -> Result<u64, BoxError>;

    /// Storage slot of an entity's commitment, from the identifier contract
    async fn commitment_slot(&self, path: &CommitmentPath) -> Result<[u8; 32], BoxError>;
}
