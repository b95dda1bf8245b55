// Orchestrator configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::chains::{AddressBook, WaitPolicy};
use crate::error::{Error, Result};
use crate::keystore::KeyRing;
use crate::relay::{
    delay_period_for, ChainSettings, DEFAULT_BLOCK_TIME, DEFAULT_CHANNEL_VERSION, DEFAULT_PREFIX,
    TRANSFER_PORT,
};
use crate::types::ClientType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub global: GlobalConfig,
    pub wait: WaitConfig,
    pub handshake: HandshakeConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Receipt polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Give up waiting for a receipt after this many seconds
    pub max_wait_secs: u64,
    /// Give up waiting for a new block in `update_header` after this many seconds
    pub header_refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Expected block time in milliseconds
    pub block_time_ms: u64,
    /// Connection delay period in nanoseconds; three block times when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_period: Option<u64>,
    pub commitment_prefix: String,
    pub default_channel_version: String,
    /// Port new channels are opened on
    pub transfer_port: String,
}

impl HandshakeConfig {
    pub fn delay_period(&self) -> u64 {
        self.delay_period
            .unwrap_or_else(|| delay_period_for(Duration::from_millis(self.block_time_ms)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Numeric ledger chain id
    pub chain_id: u64,
    /// Light client this chain runs for its counterparty
    pub client_type: ClientType,
    pub ibc_id: u64,
    pub contracts: AddressBook,
    /// Hex private keys, indexed by position (index 0 is the relayer)
    #[serde(default)]
    pub signer_keys: Vec<String>,
}

impl ChainConfig {
    pub fn key_ring(&self) -> Result<KeyRing> {
        KeyRing::from_hex_keys(self.signer_keys.as_slice())
            .map_err(|e| Error::Config(format!("chain {} signer keys: {}", self.chain_id, e)))
    }
}

impl OrchestratorConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OrchestratorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Install the tracing subscriber at the configured log level
    pub fn init_logging(&self) -> bool {
        crate::logging::init(&self.global.log_level)
    }

    /// Get chain configuration by name
    pub fn get_chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.get(name)
    }

    /// Settings shared by every chain built from this configuration
    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            wait: WaitPolicy {
                poll_interval: Duration::from_millis(self.wait.poll_interval_ms),
                max_wait: Duration::from_secs(self.wait.max_wait_secs),
            },
            header_refresh_timeout: Duration::from_secs(self.wait.header_refresh_secs),
            delay_period: self.handshake.delay_period(),
            commitment_prefix: self.handshake.commitment_prefix.clone(),
            default_channel_version: self.handshake.default_channel_version.clone(),
            transfer_port: self.handshake.transfer_port.clone(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let mut chains = HashMap::new();

        // Two local development ledgers, one per side of the bridge
        for (name, chain_id, ibc_id) in [("ibc0", 2018, 0), ("ibc1", 3018, 1)] {
            chains.insert(
                name.to_string(),
                ChainConfig {
                    chain_id,
                    client_type: ClientType::Mock,
                    ibc_id,
                    contracts: AddressBook::default(),
                    signer_keys: vec![],
                },
            );
        }

        Self {
            global: GlobalConfig {
                log_level: "info".to_string(),
            },
            wait: WaitConfig {
                poll_interval_ms: 1_000,
                max_wait_secs: 60,
                header_refresh_secs: 30,
            },
            handshake: HandshakeConfig {
                block_time_ms: DEFAULT_BLOCK_TIME.as_millis() as u64,
                delay_period: None,
                commitment_prefix: DEFAULT_PREFIX.to_string(),
                default_channel_version: DEFAULT_CHANNEL_VERSION.to_string(),
                transfer_port: TRANSFER_PORT.to_string(),
            },
            chains,
        }
    }
}
