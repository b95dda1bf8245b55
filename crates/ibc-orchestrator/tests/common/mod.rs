// Shared test utilities: an in-memory IBC host ledger and two-chain setup helpers
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;

use ibc_orchestrator::chains::{
    Address, AddressBook, CancelToken, CommitmentPath, ContractState, EthContractState, EthProof,
    Header, Ibft2ContractState, LedgerHandle, LogEntry, Receipt, StorageKey, TxHash, WaitPolicy,
};
use ibc_orchestrator::codec::{
    commit_acknowledgement, commit_packet, marshal_with_any, sha256, unmarshal_with_any,
};
use ibc_orchestrator::error::BoxError;
use ibc_orchestrator::events::{registry, EventKind, EventSignature};
use ibc_orchestrator::keystore::{KeyRing, SignerKey};
use ibc_orchestrator::types::channel::{self, Channel, Packet};
use ibc_orchestrator::types::client::{ibft2, mock};
use ibc_orchestrator::types::connection::{self, ConnectionEnd, MerklePrefix, Version};
use ibc_orchestrator::types::msgs::HandlerMsg;
use ibc_orchestrator::types::{ClientType, Height, Order};
use ibc_orchestrator::{Chain, ChainSettings};

/// Acknowledgement the simulated application writes for every received packet
pub const ACK: &[u8] = b"{\"result\":\"AQ==\"}";

const GENESIS_TIME: u64 = 1_700_000_000;

type Revert = String;

#[derive(Debug, Clone)]
struct StoredClient {
    client_type: ClientType,
    state_bytes: Vec<u8>,
    latest: Height,
}

#[derive(Default)]
struct SimState {
    block: u64,
    frozen: bool,
    receipt_delay: u32,
    clients: BTreeMap<String, StoredClient>,
    connections: HashMap<String, ConnectionEnd>,
    channels: HashMap<(String, String), Channel>,
    next_sequence_send: HashMap<(String, String), u64>,
    received: HashSet<(String, String, u64)>,
    storage: HashMap<[u8; 32], [u8; 32]>,
    logs: Vec<LogEntry>,
    receipts: HashMap<String, (Receipt, u32)>,
    submitted: Vec<&'static str>,
    tx_count: u64,
    client_counter: u64,
    connection_counter: u64,
    channel_counter: u64,
}

/// In-memory IBC host, handler and identifier contracts on one ledger.
///
/// Every submitted transaction is mined in its own block. A latest-state
/// query also mines an empty block unless the ledger is frozen.
pub struct SimLedger {
    pub chain_id: u64,
    /// Consensus of this ledger, i.e. the client type a counterparty runs for it
    pub consensus: ClientType,
    pub contracts: AddressBook,
    state: Mutex<SimState>,
}

pub fn slot_of(path: &CommitmentPath) -> [u8; 32] {
    sha256(path.to_string().as_bytes())
}

/// Storage proof the simulated ledger hands out for `slot` holding `value`
pub fn storage_proof(slot: &[u8; 32], value: &[u8; 32]) -> Vec<u8> {
    let mut buf = slot.to_vec();
    buf.extend_from_slice(value);
    sha256(&buf).to_vec()
}

fn address(chain_tag: u8, contract: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = chain_tag;
    bytes[19] = contract;
    Address(bytes)
}

fn own_prefix() -> MerklePrefix {
    MerklePrefix {
        key_prefix: b"ibc".to_vec(),
    }
}

impl SimLedger {
    pub fn new(chain_id: u64, chain_tag: u8, consensus: ClientType) -> Self {
        let contracts = AddressBook {
            host: address(chain_tag, 1),
            handler: address(chain_tag, 2),
            identifier: address(chain_tag, 3),
            ibft2_client: address(chain_tag, 4),
            mock_client: address(chain_tag, 5),
        };
        Self {
            chain_id,
            consensus,
            contracts,
            state: Mutex::new(SimState {
                block: 1,
                ..Default::default()
            }),
        }
    }

    /// Stop producing empty blocks on latest-state queries
    pub fn freeze(&self, frozen: bool) {
        self.state.lock().unwrap().frozen = frozen;
    }

    /// Number of receipt polls each following transaction stays pending for
    pub fn set_receipt_delay(&self, polls: u32) {
        self.state.lock().unwrap().receipt_delay = polls;
    }

    pub fn block(&self) -> u64 {
        self.state.lock().unwrap().block
    }

    pub fn submitted(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn connection_end(&self, id: &str) -> Option<ConnectionEnd> {
        self.state.lock().unwrap().connections.get(id).cloned()
    }

    pub fn channel_end(&self, port: &str, channel: &str) -> Option<Channel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .get(&(port.to_string(), channel.to_string()))
            .cloned()
    }

    pub fn client_latest_height(&self, client_id: &str) -> Option<Height> {
        self.state.lock().unwrap().clients.get(client_id).map(|c| c.latest)
    }

    pub fn has_packet_commitment(&self, packet: &Packet) -> bool {
        let slot = slot_of(&CommitmentPath::Packet {
            port_id: packet.source_port.clone(),
            channel_id: packet.source_channel.clone(),
            sequence: packet.sequence,
        });
        self.state.lock().unwrap().storage.contains_key(&slot)
    }

    /// Raw storage value under `path`, if any
    pub fn stored_digest(&self, path: &CommitmentPath) -> Option<[u8; 32]> {
        self.state.lock().unwrap().storage.get(&slot_of(path)).copied()
    }

    fn header_at(&self, number: u64) -> Header {
        Header {
            number,
            time: GENESIS_TIME + number,
            state_root: sha256(&number.to_be_bytes()).to_vec(),
        }
    }
}

impl SimState {
    fn emit(&mut self, address: Address, kind: EventKind, data: Vec<u8>) {
        let log_index = self.logs.len() as u64;
        self.logs.push(LogEntry {
            address,
            event: registry().spec(kind).signature.clone(),
            block_number: self.block,
            log_index,
            data,
        });
    }

    fn put(&mut self, path: CommitmentPath, digest: [u8; 32]) {
        self.storage.insert(slot_of(&path), digest);
    }

    fn client(&self, client_id: &str) -> Result<&StoredClient, Revert> {
        self.clients
            .get(client_id)
            .ok_or_else(|| format!("client {} not found", client_id))
    }

    /// Check a membership proof the way the client `client_id` would
    fn verify(
        &self,
        client_id: &str,
        proof_height: Height,
        proof: &[u8],
        path: CommitmentPath,
        value_digest: [u8; 32],
    ) -> Result<(), Revert> {
        let client = self.client(client_id)?;
        if proof_height > client.latest {
            return Err(format!(
                "proof height {} is newer than client {} height {}",
                proof_height, client_id, client.latest
            ));
        }
        let expected = match client.client_type {
            ClientType::Mock => value_digest.to_vec(),
            ClientType::Ibft2 => storage_proof(&slot_of(&path), &value_digest),
        };
        if proof != expected.as_slice() {
            return Err(format!("failed to verify membership of {}", path));
        }
        Ok(())
    }

    fn connection(&self, id: &str) -> Result<ConnectionEnd, Revert> {
        self.connections
            .get(id)
            .cloned()
            .ok_or_else(|| format!("connection {} not found", id))
    }

    fn channel(&self, port: &str, id: &str) -> Result<Channel, Revert> {
        self.channels
            .get(&(port.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| format!("channel {}/{} not found", port, id))
    }

    fn store_connection(&mut self, id: &str, end: ConnectionEnd) {
        self.put(
            CommitmentPath::Connection {
                connection_id: id.to_string(),
            },
            sha256(&end.encode_to_vec()),
        );
        self.connections.insert(id.to_string(), end);
    }

    fn store_channel(&mut self, port: &str, id: &str, end: Channel) {
        self.put(
            CommitmentPath::Channel {
                port_id: port.to_string(),
                channel_id: id.to_string(),
            },
            sha256(&end.encode_to_vec()),
        );
        self.channels.insert((port.to_string(), id.to_string()), end);
    }

    fn store_client(&mut self, id: &str, client: StoredClient) {
        self.put(
            CommitmentPath::ClientState {
                client_id: id.to_string(),
            },
            sha256(&client.state_bytes),
        );
        self.clients.insert(id.to_string(), client);
    }

    fn connection_client(&self, channel: &Channel) -> Result<(String, ConnectionEnd), Revert> {
        let hop = channel
            .connection_hops
            .first()
            .ok_or_else(|| "channel has no connection hops".to_string())?;
        let conn = self.connection(hop)?;
        Ok((conn.client_id.clone(), conn))
    }

    fn execute(&mut self, host: Address, handler: Address, msg: &HandlerMsg) -> Result<(), Revert> {
        match msg {
            HandlerMsg::CreateClient(m) => {
                let client_type: ClientType = m.client_type.parse()?;
                let latest = match client_type {
                    ClientType::Mock => unmarshal_with_any::<mock::ClientState>(&m.client_state_bytes)
                        .map_err(|e| e.to_string())?
                        .latest_height,
                    ClientType::Ibft2 => {
                        unmarshal_with_any::<ibft2::ClientState>(&m.client_state_bytes)
                            .map_err(|e| e.to_string())?
                            .latest_height
                    }
                }
                .ok_or("client state without height")?;
                let id = format!("{}-{}", client_type, self.client_counter);
                self.client_counter += 1;
                self.store_client(
                    &id,
                    StoredClient {
                        client_type,
                        state_bytes: m.client_state_bytes.clone(),
                        latest,
                    },
                );
                let data = registry().encode_identifier(&id);
                self.emit(host, EventKind::GeneratedClientIdentifier, data);
            }
            HandlerMsg::UpdateClient(m) => {
                let mut client = self.client(&m.client_id)?.clone();
                match client.client_type {
                    ClientType::Mock => {
                        let header = unmarshal_with_any::<mock::Header>(&m.header)
                            .map_err(|e| e.to_string())?;
                        let height = header.height.ok_or("header without height")?;
                        client.latest = client.latest.max(height);
                        client.state_bytes = marshal_with_any(&mock::ClientState {
                            latest_height: Some(client.latest),
                        });
                    }
                    ClientType::Ibft2 => {
                        let header = unmarshal_with_any::<ibft2::Header>(&m.header)
                            .map_err(|e| e.to_string())?;
                        if header.trusted_height != Some(client.latest) {
                            return Err("trusted height does not match client".to_string());
                        }
                        if header.seals.is_empty() {
                            return Err("header has no commit seals".to_string());
                        }
                        let number: [u8; 8] = header
                            .besu_header_rlp
                            .as_slice()
                            .try_into()
                            .map_err(|_| "malformed besu header".to_string())?;
                        let height = Height::from_block_number(u64::from_be_bytes(number));
                        let mut cs = unmarshal_with_any::<ibft2::ClientState>(&client.state_bytes)
                            .map_err(|e| e.to_string())?;
                        client.latest = client.latest.max(height);
                        cs.latest_height = Some(client.latest);
                        client.state_bytes = marshal_with_any(&cs);
                    }
                }
                self.store_client(&m.client_id, client);
            }
            HandlerMsg::ConnectionOpenInit(m) => {
                self.client(&m.client_id)?;
                let id = format!("connection-{}", self.connection_counter);
                self.connection_counter += 1;
                let mut end = ConnectionEnd {
                    client_id: m.client_id.clone(),
                    versions: vec![Version::default_version()],
                    counterparty: Some(m.counterparty.clone()),
                    delay_period: m.delay_period,
                    ..Default::default()
                };
                end.set_state(connection::State::Init);
                self.store_connection(&id, end);
                let data = registry().encode_identifier(&id);
                self.emit(host, EventKind::GeneratedConnectionIdentifier, data);
            }
            HandlerMsg::ConnectionOpenTry(m) => {
                let mut expected = ConnectionEnd {
                    client_id: m.counterparty.client_id.clone(),
                    versions: m.counterparty_versions.clone(),
                    counterparty: Some(connection::Counterparty {
                        client_id: m.client_id.clone(),
                        connection_id: String::new(),
                        prefix: Some(own_prefix()),
                    }),
                    delay_period: m.delay_period,
                    ..Default::default()
                };
                expected.set_state(connection::State::Init);
                self.verify(
                    &m.client_id,
                    m.proof_height,
                    &m.proof_init,
                    CommitmentPath::Connection {
                        connection_id: m.counterparty.connection_id.clone(),
                    },
                    sha256(&expected.encode_to_vec()),
                )?;
                self.verify(
                    &m.client_id,
                    m.proof_height,
                    &m.proof_client,
                    CommitmentPath::ClientState {
                        client_id: m.counterparty.client_id.clone(),
                    },
                    sha256(&m.client_state_bytes),
                )?;

                let id = format!("connection-{}", self.connection_counter);
                self.connection_counter += 1;
                let mut end = ConnectionEnd {
                    client_id: m.client_id.clone(),
                    versions: m.counterparty_versions.clone(),
                    counterparty: Some(m.counterparty.clone()),
                    delay_period: m.delay_period,
                    ..Default::default()
                };
                end.set_state(connection::State::TryOpen);
                self.store_connection(&id, end);
                let data = registry().encode_identifier(&id);
                self.emit(host, EventKind::GeneratedConnectionIdentifier, data);
            }
            HandlerMsg::ConnectionOpenAck(m) => {
                let mut end = self.connection(&m.connection_id)?;
                if end.state() != connection::State::Init {
                    return Err(format!("connection {} is not in INIT", m.connection_id));
                }
                let counterparty = end.counterparty.clone().unwrap_or_default();
                let mut expected = ConnectionEnd {
                    client_id: counterparty.client_id.clone(),
                    versions: vec![m.version.clone()],
                    counterparty: Some(connection::Counterparty {
                        client_id: end.client_id.clone(),
                        connection_id: m.connection_id.clone(),
                        prefix: Some(own_prefix()),
                    }),
                    delay_period: end.delay_period,
                    ..Default::default()
                };
                expected.set_state(connection::State::TryOpen);
                self.verify(
                    &end.client_id,
                    m.proof_height,
                    &m.proof_try,
                    CommitmentPath::Connection {
                        connection_id: m.counterparty_connection_id.clone(),
                    },
                    sha256(&expected.encode_to_vec()),
                )?;
                self.verify(
                    &end.client_id,
                    m.proof_height,
                    &m.proof_client,
                    CommitmentPath::ClientState {
                        client_id: counterparty.client_id.clone(),
                    },
                    sha256(&m.client_state_bytes),
                )?;

                end.set_state(connection::State::Open);
                end.versions = vec![m.version.clone()];
                if let Some(cp) = end.counterparty.as_mut() {
                    cp.connection_id = m.counterparty_connection_id.clone();
                }
                self.store_connection(&m.connection_id, end);
            }
            HandlerMsg::ConnectionOpenConfirm(m) => {
                let mut end = self.connection(&m.connection_id)?;
                if end.state() != connection::State::TryOpen {
                    return Err(format!("connection {} is not in TRYOPEN", m.connection_id));
                }
                let counterparty = end.counterparty.clone().unwrap_or_default();
                let mut expected = ConnectionEnd {
                    client_id: counterparty.client_id.clone(),
                    versions: end.versions.clone(),
                    counterparty: Some(connection::Counterparty {
                        client_id: end.client_id.clone(),
                        connection_id: m.connection_id.clone(),
                        prefix: Some(own_prefix()),
                    }),
                    delay_period: end.delay_period,
                    ..Default::default()
                };
                expected.set_state(connection::State::Open);
                self.verify(
                    &end.client_id,
                    m.proof_height,
                    &m.proof_ack,
                    CommitmentPath::Connection {
                        connection_id: counterparty.connection_id.clone(),
                    },
                    sha256(&expected.encode_to_vec()),
                )?;
                end.set_state(connection::State::Open);
                self.store_connection(&m.connection_id, end);
            }
            HandlerMsg::ChannelOpenInit(m) => {
                self.connection_client(&m.channel)?;
                let id = format!("channel-{}", self.channel_counter);
                self.channel_counter += 1;
                self.store_channel(&m.port_id, &id, m.channel.clone());
                self.next_sequence_send.insert((m.port_id.clone(), id.clone()), 1);
                let data = registry().encode_identifier(&id);
                self.emit(host, EventKind::GeneratedChannelIdentifier, data);
            }
            HandlerMsg::ChannelOpenTry(m) => {
                let (client_id, conn) = self.connection_client(&m.channel)?;
                let counterparty = m.channel.counterparty.clone().unwrap_or_default();
                let expected = expected_channel(
                    channel::State::Init,
                    m.channel.ordering(),
                    &m.port_id,
                    "",
                    &conn,
                    &m.counterparty_version,
                );
                self.verify(
                    &client_id,
                    m.proof_height,
                    &m.proof_init,
                    CommitmentPath::Channel {
                        port_id: counterparty.port_id.clone(),
                        channel_id: counterparty.channel_id.clone(),
                    },
                    sha256(&expected.encode_to_vec()),
                )?;

                let id = format!("channel-{}", self.channel_counter);
                self.channel_counter += 1;
                self.store_channel(&m.port_id, &id, m.channel.clone());
                self.next_sequence_send.insert((m.port_id.clone(), id.clone()), 1);
                let data = registry().encode_identifier(&id);
                self.emit(host, EventKind::GeneratedChannelIdentifier, data);
            }
            HandlerMsg::ChannelOpenAck(m) => {
                let mut end = self.channel(&m.port_id, &m.channel_id)?;
                if end.state() != channel::State::Init {
                    return Err(format!("channel {} is not in INIT", m.channel_id));
                }
                let (client_id, conn) = self.connection_client(&end)?;
                let counterparty = end.counterparty.clone().unwrap_or_default();
                let expected = expected_channel(
                    channel::State::TryOpen,
                    end.ordering(),
                    &m.port_id,
                    &m.channel_id,
                    &conn,
                    &m.counterparty_version,
                );
                self.verify(
                    &client_id,
                    m.proof_height,
                    &m.proof_try,
                    CommitmentPath::Channel {
                        port_id: counterparty.port_id.clone(),
                        channel_id: m.counterparty_channel_id.clone(),
                    },
                    sha256(&expected.encode_to_vec()),
                )?;
                end.set_state(channel::State::Open);
                end.version = m.counterparty_version.clone();
                if let Some(cp) = end.counterparty.as_mut() {
                    cp.channel_id = m.counterparty_channel_id.clone();
                }
                self.store_channel(&m.port_id, &m.channel_id, end);
            }
            HandlerMsg::ChannelOpenConfirm(m) => {
                let mut end = self.channel(&m.port_id, &m.channel_id)?;
                if end.state() != channel::State::TryOpen {
                    return Err(format!("channel {} is not in TRYOPEN", m.channel_id));
                }
                let (client_id, conn) = self.connection_client(&end)?;
                let counterparty = end.counterparty.clone().unwrap_or_default();
                let expected = expected_channel(
                    channel::State::Open,
                    end.ordering(),
                    &m.port_id,
                    &m.channel_id,
                    &conn,
                    &end.version,
                );
                self.verify(
                    &client_id,
                    m.proof_height,
                    &m.proof_ack,
                    CommitmentPath::Channel {
                        port_id: counterparty.port_id.clone(),
                        channel_id: counterparty.channel_id.clone(),
                    },
                    sha256(&expected.encode_to_vec()),
                )?;
                end.set_state(channel::State::Open);
                self.store_channel(&m.port_id, &m.channel_id, end);
            }
            HandlerMsg::ChannelCloseInit(m) => {
                let mut end = self.channel(&m.port_id, &m.channel_id)?;
                if end.state() == channel::State::Closed {
                    return Err(format!("channel {} is already closed", m.channel_id));
                }
                end.set_state(channel::State::Closed);
                self.store_channel(&m.port_id, &m.channel_id, end);
            }
            HandlerMsg::ChannelCloseConfirm(m) => {
                let mut end = self.channel(&m.port_id, &m.channel_id)?;
                if end.state() == channel::State::Closed {
                    return Err(format!("channel {} is already closed", m.channel_id));
                }
                let (client_id, conn) = self.connection_client(&end)?;
                let counterparty = end.counterparty.clone().unwrap_or_default();
                let expected = expected_channel(
                    channel::State::Closed,
                    end.ordering(),
                    &m.port_id,
                    &m.channel_id,
                    &conn,
                    &end.version,
                );
                self.verify(
                    &client_id,
                    m.proof_height,
                    &m.proof_init,
                    CommitmentPath::Channel {
                        port_id: counterparty.port_id.clone(),
                        channel_id: counterparty.channel_id.clone(),
                    },
                    sha256(&expected.encode_to_vec()),
                )?;
                end.set_state(channel::State::Closed);
                self.store_channel(&m.port_id, &m.channel_id, end);
            }
            HandlerMsg::SendPacket(packet) => {
                let end = self.channel(&packet.source_port, &packet.source_channel)?;
                if end.state() != channel::State::Open {
                    return Err(format!("channel {} is not open", packet.source_channel));
                }
                let key = (packet.source_port.clone(), packet.source_channel.clone());
                let next = self.next_sequence_send.get(&key).copied().unwrap_or(1);
                if packet.sequence != next {
                    return Err(format!("packet sequence {} != next sequence send {}", packet.sequence, next));
                }
                self.next_sequence_send.insert(key, next + 1);
                self.put(
                    CommitmentPath::Packet {
                        port_id: packet.source_port.clone(),
                        channel_id: packet.source_channel.clone(),
                        sequence: packet.sequence,
                    },
                    commit_packet(packet),
                );
                let data = registry().encode_packet(packet);
                self.emit(handler, EventKind::SendPacket, data);
            }
            HandlerMsg::RecvPacket(m) => {
                let packet = &m.packet;
                let end = self.channel(&packet.destination_port, &packet.destination_channel)?;
                if end.state() != channel::State::Open {
                    return Err(format!("channel {} is not open", packet.destination_channel));
                }
                let key = (
                    packet.destination_port.clone(),
                    packet.destination_channel.clone(),
                    packet.sequence,
                );
                if self.received.contains(&key) {
                    return Err(format!("packet {} already received", packet.sequence));
                }
                let (client_id, _) = self.connection_client(&end)?;
                self.verify(
                    &client_id,
                    m.proof_height,
                    &m.proof,
                    CommitmentPath::Packet {
                        port_id: packet.source_port.clone(),
                        channel_id: packet.source_channel.clone(),
                        sequence: packet.sequence,
                    },
                    commit_packet(packet),
                )?;
                self.received.insert(key);
                self.put(
                    CommitmentPath::PacketAcknowledgement {
                        port_id: packet.destination_port.clone(),
                        channel_id: packet.destination_channel.clone(),
                        sequence: packet.sequence,
                    },
                    commit_acknowledgement(ACK),
                );
            }
            HandlerMsg::AcknowledgePacket(m) => {
                let packet = &m.packet;
                let end = self.channel(&packet.source_port, &packet.source_channel)?;
                let commitment = slot_of(&CommitmentPath::Packet {
                    port_id: packet.source_port.clone(),
                    channel_id: packet.source_channel.clone(),
                    sequence: packet.sequence,
                });
                if !self.storage.contains_key(&commitment) {
                    return Err(format!("packet {} has no commitment", packet.sequence));
                }
                let (client_id, _) = self.connection_client(&end)?;
                self.verify(
                    &client_id,
                    m.proof_height,
                    &m.proof,
                    CommitmentPath::PacketAcknowledgement {
                        port_id: packet.destination_port.clone(),
                        channel_id: packet.destination_channel.clone(),
                        sequence: packet.sequence,
                    },
                    commit_acknowledgement(&m.acknowledgement),
                )?;
                self.storage.remove(&commitment);
            }
        }
        Ok(())
    }
}

/// Channel end the counterparty is expected to store, seen from this host
fn expected_channel(
    state: channel::State,
    order: Order,
    own_port: &str,
    own_channel: &str,
    conn: &ConnectionEnd,
    version: &str,
) -> Channel {
    let mut end = Channel {
        counterparty: Some(channel::Counterparty {
            port_id: own_port.to_string(),
            channel_id: own_channel.to_string(),
        }),
        connection_hops: vec![conn.counterparty_connection_id().unwrap_or_default().to_string()],
        version: version.to_string(),
        ..Default::default()
    };
    end.set_state(state);
    end.set_ordering(order);
    end
}

#[async_trait]
impl LedgerHandle for SimLedger {
    async fn submit(&self, _signer: &SignerKey, msg: &HandlerMsg) -> Result<TxHash, BoxError> {
        let mut state = self.state.lock().unwrap();
        state.tx_count += 1;
        state.block += 1;
        state.submitted.push(msg.method());

        let tx_hash = TxHash(format!("0x{:064x}", state.tx_count));
        let outcome = state.execute(self.contracts.host, self.contracts.handler, msg);
        let receipt = Receipt {
            tx_hash: tx_hash.clone(),
            block_number: state.block,
            success: outcome.is_ok(),
            revert_reason: outcome.err(),
        };
        let delay = state.receipt_delay;
        state.receipts.insert(tx_hash.0.clone(), (receipt, delay));
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: &TxHash) -> Result<Option<Receipt>, BoxError> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .receipts
            .get_mut(&tx_hash.0)
            .ok_or_else(|| format!("unknown transaction {}", tx_hash))?;
        if entry.1 > 0 {
            entry.1 -= 1;
            return Ok(None);
        }
        Ok(Some(entry.0.clone()))
    }

    async fn query_state(
        &self,
        address: &Address,
        storage_keys: &[StorageKey],
        height: Option<u64>,
    ) -> Result<ContractState, BoxError> {
        if *address != self.contracts.host {
            return Err(format!("{} is not the IBC host", address).into());
        }
        let mut state = self.state.lock().unwrap();
        let number = match height {
            Some(h) if h > state.block => {
                return Err(format!("block {} is in the future (head {})", h, state.block).into())
            }
            Some(h) => h,
            None => {
                if !state.frozen {
                    state.block += 1;
                }
                state.block
            }
        };

        let mut storage_proof_rlp = Vec::with_capacity(storage_keys.len());
        for key in storage_keys {
            let raw = hex::decode(key.as_str().trim_start_matches("0x"))?;
            let slot: [u8; 32] = raw
                .try_into()
                .map_err(|_| format!("storage key {} is not 32 bytes", key))?;
            let value = state.storage.get(&slot).copied().unwrap_or([0u8; 32]);
            storage_proof_rlp.push(storage_proof(&slot, &value));
        }

        let header = self.header_at(number);
        let proof = EthProof {
            account_proof_rlp: sha256(&header.state_root).to_vec(),
            storage_proof_rlp,
        };
        Ok(match self.consensus {
            ClientType::Mock => ContractState::Eth(EthContractState { header, proof }),
            ClientType::Ibft2 => ContractState::Ibft2(Ibft2ContractState {
                header,
                proof,
                validators: vec![vec![self.chain_id as u8; 20]],
                sealing_header_rlp: number.to_be_bytes().to_vec(),
                commit_seals: vec![vec![0x5e; 65]],
            }),
        })
    }

    async fn filter_logs(
        &self,
        address: &Address,
        event: &EventSignature,
        from_height: u64,
    ) -> Result<Vec<LogEntry>, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .filter(|l| l.address == *address && l.event == *event && l.block_number >= from_height)
            .cloned()
            .collect())
    }

    async fn client_state(&self, client_id: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state.clients.get(client_id).map(|c| c.state_bytes.clone()))
    }

    async fn connection(&self, connection_id: &str) -> Result<Option<ConnectionEnd>, BoxError> {
        Ok(self.connection_end(connection_id))
    }

    async fn channel(&self, port_id: &str, channel_id: &str) -> Result<Option<Channel>, BoxError> {
        Ok(self.channel_end(port_id, channel_id))
    }

    async fn next_sequence_send(&self, port_id: &str, channel_id: &str) -> Result<u64, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .next_sequence_send
            .get(&(port_id.to_string(), channel_id.to_string()))
            .copied()
            .unwrap_or(1))
    }

    async fn commitment_slot(&self, path: &CommitmentPath) -> Result<[u8; 32], BoxError> {
        Ok(slot_of(path))
    }
}

/// Settings with short waits for tests
pub fn fast_settings() -> ChainSettings {
    ChainSettings {
        wait: WaitPolicy {
            poll_interval: Duration::from_millis(2),
            max_wait: Duration::from_secs(2),
        },
        header_refresh_timeout: Duration::from_millis(200),
        ..ChainSettings::default()
    }
}

pub struct Pair {
    pub a: Chain,
    pub b: Chain,
    pub ledger_a: Arc<SimLedger>,
    pub ledger_b: Arc<SimLedger>,
    pub cancel: CancelToken,
}

fn chain_on(ledger: &Arc<SimLedger>, client_type: ClientType, ibc_id: u64) -> Chain {
    let keys = KeyRing::from_seed(&format!("sim-{}", ledger.chain_id), 2).unwrap();
    Chain::new(
        ledger.chain_id,
        ledger.clone(),
        ledger.contracts.clone(),
        keys,
        client_type,
        ibc_id,
    )
    .with_settings(fast_settings())
}

/// Two fresh chains, each running a `client_type` client for the other
pub fn new_pair(client_type: ClientType) -> Pair {
    let ledger_a = Arc::new(SimLedger::new(2018, 0xaa, client_type));
    let ledger_b = Arc::new(SimLedger::new(3018, 0xbb, client_type));
    Pair {
        a: chain_on(&ledger_a, client_type, 0),
        b: chain_on(&ledger_b, client_type, 1),
        ledger_a,
        ledger_b,
        cancel: CancelToken::with_timeout(Duration::from_secs(30)),
    }
}

/// Handles of a fully opened connection and channel
pub struct Path {
    pub client_a: String,
    pub client_b: String,
    pub conn_a: usize,
    pub conn_b: usize,
    pub chan_a: usize,
    pub chan_b: usize,
}

impl Pair {
    pub async fn create_clients(&mut self) -> (String, String) {
        self.a.update_header(&self.cancel).await.unwrap();
        self.b.update_header(&self.cancel).await.unwrap();
        let client_a = self.a.create_client(&self.cancel, &self.b).await.unwrap();
        let client_b = self.b.create_client(&self.cancel, &self.a).await.unwrap();
        (client_a, client_b)
    }

    /// Refresh both headers and bring both clients up to date
    pub async fn update_clients(&mut self, client_a: &str, client_b: &str) {
        self.a.update_header(&self.cancel).await.unwrap();
        self.b.update_header(&self.cancel).await.unwrap();
        self.a.update_client(&self.cancel, &self.b, client_a).await.unwrap();
        self.b.update_client(&self.cancel, &self.a, client_b).await.unwrap();
    }

    pub async fn open_connection(&mut self, client_a: &str, client_b: &str) -> (usize, usize) {
        let ia = self.a.add_test_connection(client_a, client_b);
        let ib = self.b.add_test_connection(client_b, client_a);
        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);

        let id = a
            .connection_open_init(cancel, b, &a.connections[ia], &b.connections[ib])
            .await
            .unwrap();
        a.connections[ia].assign_id(&id).unwrap();
        self.update_clients(client_a, client_b).await;

        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);
        let id = b
            .connection_open_try(cancel, a, &b.connections[ib], &a.connections[ia])
            .await
            .unwrap();
        b.connections[ib].assign_id(&id).unwrap();
        self.update_clients(client_a, client_b).await;

        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);
        a.connection_open_ack(cancel, b, &a.connections[ia], &b.connections[ib])
            .await
            .unwrap();
        self.update_clients(client_a, client_b).await;

        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);
        b.connection_open_confirm(cancel, a, &b.connections[ib], &a.connections[ia])
            .await
            .unwrap();
        (ia, ib)
    }

    pub async fn open_channel(
        &mut self,
        client_a: &str,
        client_b: &str,
        conn_a: usize,
        conn_b: usize,
        order: Order,
    ) -> (usize, usize) {
        let ca = self.a.add_transfer_channel(conn_a).unwrap();
        let cb = self.b.add_transfer_channel(conn_b).unwrap();
        let conn_id_a = self.a.connections[conn_a].id.clone();
        let conn_id_b = self.b.connections[conn_b].id.clone();

        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);
        let id = a
            .channel_open_init(
                cancel,
                &a.connections[conn_a].channels[ca],
                &b.connections[conn_b].channels[cb],
                order,
                &conn_id_a,
            )
            .await
            .unwrap();
        a.connections[conn_a].channels[ca].assign_id(&id).unwrap();
        self.update_clients(client_a, client_b).await;

        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);
        let id = b
            .channel_open_try(
                cancel,
                a,
                &b.connections[conn_b].channels[cb],
                &a.connections[conn_a].channels[ca],
                order,
                &conn_id_b,
            )
            .await
            .unwrap();
        b.connections[conn_b].channels[cb].assign_id(&id).unwrap();
        self.update_clients(client_a, client_b).await;

        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);
        a.channel_open_ack(
            cancel,
            b,
            &a.connections[conn_a].channels[ca],
            &b.connections[conn_b].channels[cb],
        )
        .await
        .unwrap();
        self.update_clients(client_a, client_b).await;

        let (a, b, cancel) = (&mut self.a, &mut self.b, &self.cancel);
        b.channel_open_confirm(
            cancel,
            a,
            &b.connections[conn_b].channels[cb],
            &a.connections[conn_a].channels[ca],
        )
        .await
        .unwrap();
        (ca, cb)
    }

    /// Clients, an open connection and an open channel between A and B
    pub async fn open_path(&mut self, order: Order) -> Path {
        let (client_a, client_b) = self.create_clients().await;
        let (conn_a, conn_b) = self.open_connection(&client_a, &client_b).await;
        self.update_clients(&client_a, &client_b).await;
        let (chan_a, chan_b) = self
            .open_channel(&client_a, &client_b, conn_a, conn_b, order)
            .await;
        self.update_clients(&client_a, &client_b).await;
        Path {
            client_a,
            client_b,
            conn_a,
            conn_b,
            chan_a,
            chan_b,
        }
    }

    pub fn channel_a(&self, path: &Path) -> TestChannelRef {
        self.a.connections[path.conn_a].channels[path.chan_a].clone()
    }

    pub fn channel_b(&self, path: &Path) -> TestChannelRef {
        self.b.connections[path.conn_b].channels[path.chan_b].clone()
    }
}

pub type TestChannelRef = ibc_orchestrator::TestChannel;
