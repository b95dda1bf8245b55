// IBC handshake and packet-relay orchestration
// Drives client creation, connection and channel handshakes and packet relay
// between two contract-based ledgers through a `LedgerHandle` per ledger.

pub mod abi;
pub mod chains;
pub mod clients;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod keystore;
pub mod logging;
pub mod relay;
pub mod types;

// Re-export commonly used types for convenience
pub use chains::{
    AddressBook, CancelToken, ContractState, LedgerHandle, Receipt, StorageKey, WaitPolicy,
};
pub use clients::ClientCapabilities;
pub use config::{ChainConfig, OrchestratorConfig};
pub use error::{EntityKind, Error, Result};
pub use events::{EventKind, EventSignature};
pub use keystore::{KeyError, KeyRing, SignerKey};
pub use relay::{Chain, ChainSettings, Proof, TestChannel, TestConnection};
pub use types::{Channel, ClientType, ConnectionEnd, Height, Order, Packet};
