// Handshake and packet relay orchestration between two ledgers
//
// A `Chain` is the relayer-side view of one ledger: its contracts, signer
// keys, light-client type, the last observed contract state and the test
// connections/channels built on top of it. The handshake drivers live in the
// submodules and are all methods on `Chain`.

pub mod channel;
pub mod connection;
pub mod packet;
pub mod proof;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::chains::{
    submit_and_wait, AddressBook, CancelToken, CommitmentPath, ContractState, LedgerHandle,
    Receipt, StorageKey, WaitPolicy,
};
use crate::config::ChainConfig;
use crate::error::{Error, Result};
use crate::events::{self, Emitter, EventKind, EventRegistry};
use crate::keystore::{KeyRing, SignerKey};
use crate::types::connection::MerklePrefix;
use crate::types::msgs::HandlerMsg;
use crate::types::ClientType;

pub use proof::{CommitmentContent, Proof};

/// Channel version proposed for new channels
pub const DEFAULT_CHANNEL_VERSION: &str = "ics20-1";
/// Commitment prefix of every IBC host
pub const DEFAULT_PREFIX: &str = "ibc";
/// Port bound by the token-transfer module
pub const TRANSFER_PORT: &str = "transfer";
/// Block time assumed when deriving the connection delay period
pub const DEFAULT_BLOCK_TIME: Duration = Duration::from_secs(1);

/// Connection delay period, in nanoseconds, covering three blocks
pub fn delay_period_for(block_time: Duration) -> u64 {
    3 * block_time.as_nanos() as u64
}

/// Tunables shared by every operation on a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSettings {
    pub wait: WaitPolicy,
    /// Upper bound for `update_header` to observe a new block
    pub header_refresh_timeout: Duration,
    /// Connection delay period in nanoseconds
    pub delay_period: u64,
    pub commitment_prefix: String,
    pub default_channel_version: String,
    /// Port used by `add_transfer_channel`
    pub transfer_port: String,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            header_refresh_timeout: Duration::from_secs(30),
            delay_period: delay_period_for(DEFAULT_BLOCK_TIME),
            commitment_prefix: DEFAULT_PREFIX.to_string(),
            default_channel_version: DEFAULT_CHANNEL_VERSION.to_string(),
            transfer_port: TRANSFER_PORT.to_string(),
        }
    }
}

fn assign_once(slot: &mut String, id: &str, what: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::violation(format!("cannot assign an empty {} id", what)));
    }
    if slot.is_empty() {
        *slot = id.to_string();
        return Ok(());
    }
    if slot == id {
        return Ok(());
    }
    Err(Error::violation(format!(
        "{} id already assigned as {}, refusing {}",
        what, slot, id
    )))
}

fn require_assigned<'a>(id: &'a str, what: &str, context: &str) -> Result<&'a str> {
    if id.is_empty() {
        return Err(Error::violation(format!(
            "{} on {} has no identifier yet",
            what, context
        )));
    }
    Ok(id)
}

/// A connection being built between two chains, seen from one side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConnection {
    /// Empty until discovered after Init/Try
    pub id: String,
    pub client_id: String,
    pub counterparty_client_id: String,
    pub next_channel_version: String,
    pub channels: Vec<TestChannel>,
}

impl TestConnection {
    pub fn new(
        client_id: impl Into<String>,
        counterparty_client_id: impl Into<String>,
        next_channel_version: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            client_id: client_id.into(),
            counterparty_client_id: counterparty_client_id.into(),
            next_channel_version: next_channel_version.into(),
            channels: Vec::new(),
        }
    }

    /// Record the discovered id; a second, different id is rejected
    pub fn assign_id(&mut self, id: &str) -> Result<()> {
        assign_once(&mut self.id, id, "connection")
    }

    pub fn require_id(&self) -> Result<&str> {
        require_assigned(&self.id, "connection", &format!("client {}", self.client_id))
    }

    pub fn first_channel(&self) -> Option<&TestChannel> {
        self.channels.first()
    }
}

/// A channel being built on top of a `TestConnection`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestChannel {
    pub port_id: String,
    /// Empty until discovered after Init/Try
    pub id: String,
    pub client_id: String,
    pub counterparty_client_id: String,
    pub version: String,
}

impl TestChannel {
    pub fn assign_id(&mut self, id: &str) -> Result<()> {
        assign_once(&mut self.id, id, "channel")
    }

    pub fn require_id(&self) -> Result<&str> {
        require_assigned(&self.id, "channel", &format!("port {}", self.port_id))
    }
}

/// Relayer-side handle to one ledger
pub struct Chain {
    pub chain_id: u64,
    ledger: Arc<dyn LedgerHandle>,
    pub contracts: AddressBook,
    keys: KeyRing,
    pub client_type: ClientType,
    /// Replaced wholesale by `update_header`
    pub last_contract_state: Option<ContractState>,
    pub client_ids: Vec<String>,
    pub connections: Vec<TestConnection>,
    pub ibc_id: u64,
    pub settings: ChainSettings,
    events: &'static EventRegistry,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("chain_id", &self.chain_id)
            .field("client_type", &self.client_type)
            .field("ibc_id", &self.ibc_id)
            .field("client_ids", &self.client_ids)
            .field("connections", &self.connections.len())
            .finish()
    }
}

impl Chain {
    pub fn new(
        chain_id: u64,
        ledger: Arc<dyn LedgerHandle>,
        contracts: AddressBook,
        keys: KeyRing,
        client_type: ClientType,
        ibc_id: u64,
    ) -> Self {
        Self {
            chain_id,
            ledger,
            contracts,
            keys,
            client_type,
            last_contract_state: None,
            client_ids: Vec::new(),
            connections: Vec::new(),
            ibc_id,
            settings: ChainSettings::default(),
            events: events::registry(),
        }
    }

    /// Build a chain from its configuration entry
    pub fn from_config(
        config: &ChainConfig,
        settings: ChainSettings,
        ledger: Arc<dyn LedgerHandle>,
    ) -> Result<Self> {
        let keys = config.key_ring()?;
        info!(
            "🔗 Chain {} ({} client, ibc id {}) with {} signer key(s)",
            config.chain_id,
            config.client_type,
            config.ibc_id,
            keys.len()
        );
        Ok(Self::new(
            config.chain_id,
            ledger,
            config.contracts.clone(),
            keys,
            config.client_type,
            config.ibc_id,
        )
        .with_settings(settings))
    }

    pub fn with_settings(mut self, settings: ChainSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn chain_id_string(&self) -> String {
        self.chain_id.to_string()
    }

    pub fn ledger(&self) -> &dyn LedgerHandle {
        self.ledger.as_ref()
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub(crate) fn events(&self) -> &'static EventRegistry {
        self.events
    }

    fn relayer_key(&self) -> Result<&SignerKey> {
        self.keys
            .relayer()
            .map_err(|e| Error::Config(format!("chain {}: {}", self.chain_id, e)))
    }

    pub fn commitment_prefix(&self) -> MerklePrefix {
        MerklePrefix {
            key_prefix: self.settings.commitment_prefix.as_bytes().to_vec(),
        }
    }

    /// Header number of the cached contract state
    pub fn last_header_number(&self) -> Option<u64> {
        self.last_contract_state.as_ref().map(|s| s.header().number)
    }

    /// Submit `msg` to the handler with the relayer key and wait for success
    pub(crate) async fn submit(&self, msg: HandlerMsg, cancel: &CancelToken) -> Result<Receipt> {
        let signer = self.relayer_key()?;
        let receipt =
            submit_and_wait(self.ledger(), signer, &msg, &self.settings.wait, cancel).await?;
        debug!(
            "✅ Chain {} {} included in block {}",
            self.chain_id,
            msg.method(),
            receipt.block_number
        );
        Ok(receipt)
    }

    /// Storage key of an entity's commitment, as computed by this chain's
    /// identifier contract
    pub async fn commitment_slot(&self, path: &CommitmentPath) -> Result<StorageKey> {
        let slot = self
            .ledger
            .commitment_slot(path)
            .await
            .map_err(|e| Error::ledger(format!("commitment slot for {}", path), e))?;
        Ok(StorageKey::from_slot(slot))
    }

    /// Identifier carried by the most recent `kind` event of this chain's host
    pub async fn discover_last_id(&self, kind: EventKind) -> Result<String> {
        let address = match self.events.spec(kind).emitter {
            Emitter::Host => &self.contracts.host,
            Emitter::Handler => &self.contracts.handler,
        };
        events::discover_last_id(self.ledger(), self.events, address, kind).await
    }

    pub async fn last_generated_client_id(&self) -> Result<String> {
        self.discover_last_id(EventKind::GeneratedClientIdentifier).await
    }

    pub async fn last_generated_connection_id(&self) -> Result<String> {
        self.discover_last_id(EventKind::GeneratedConnectionIdentifier).await
    }

    pub async fn last_generated_channel_id(&self) -> Result<String> {
        self.discover_last_id(EventKind::GeneratedChannelIdentifier).await
    }

    /// Append a connection over (`client_id`, `counterparty_client_id`) and
    /// return its index in `connections`
    pub fn add_test_connection(&mut self, client_id: &str, counterparty_client_id: &str) -> usize {
        let conn = TestConnection::new(
            client_id,
            counterparty_client_id,
            self.settings.default_channel_version.clone(),
        );
        self.connections.push(conn);
        self.connections.len() - 1
    }

    /// The channel `add_test_channel` would create, without recording it
    pub fn next_test_channel(&self, conn: &TestConnection, port_id: &str) -> TestChannel {
        TestChannel {
            port_id: port_id.to_string(),
            id: String::new(),
            client_id: conn.client_id.clone(),
            counterparty_client_id: conn.counterparty_client_id.clone(),
            version: conn.next_channel_version.clone(),
        }
    }

    /// Append a channel on `port_id` to connection `conn_index`; returns its
    /// index in that connection's `channels`
    pub fn add_test_channel(&mut self, conn_index: usize, port_id: &str) -> Result<usize> {
        let channel = {
            let conn = self.test_connection(conn_index)?;
            self.next_test_channel(conn, port_id)
        };
        let conn = self.test_connection_mut(conn_index)?;
        conn.channels.push(channel);
        Ok(conn.channels.len() - 1)
    }

    /// Append a channel on the configured transfer port
    pub fn add_transfer_channel(&mut self, conn_index: usize) -> Result<usize> {
        let port_id = self.settings.transfer_port.clone();
        self.add_test_channel(conn_index, &port_id)
    }

    pub fn test_connection(&self, index: usize) -> Result<&TestConnection> {
        self.connections
            .get(index)
            .ok_or_else(|| Error::violation(format!("no test connection at index {}", index)))
    }

    pub fn test_connection_mut(&mut self, index: usize) -> Result<&mut TestConnection> {
        self.connections
            .get_mut(index)
            .ok_or_else(|| Error::violation(format!("no test connection at index {}", index)))
    }
}
