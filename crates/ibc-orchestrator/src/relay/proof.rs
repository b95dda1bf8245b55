// Commitment proofs for handshake and packet messages
//
// Proofs are always queried on the chain that holds the state (`self`) for a
// `counterparty` that will verify them with its light client. The proof height
// is the counterparty client's latest trusted height unless given explicitly.

use prost::Message;
use tracing::debug;

use super::{Chain, TestChannel};
use crate::chains::{CommitmentPath, ContractState, StorageKey};
use crate::codec::{commit_acknowledgement, commit_packet, sha256};
use crate::error::{EntityKind, Error, Result};
use crate::types::{Channel, ConnectionEnd, Height, Packet};

/// Proof of a commitment at a height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub height: Height,
    pub data: Vec<u8>,
}

/// The value a proof commits to
#[derive(Debug, Clone, Copy)]
pub enum CommitmentContent<'a> {
    /// `Any`-encoded client state bytes
    ClientState(&'a [u8]),
    Connection(&'a ConnectionEnd),
    Channel(&'a Channel),
    Packet(&'a Packet),
    Acknowledgement(&'a [u8]),
}

impl CommitmentContent<'_> {
    /// Hash a content-hash light client expects in place of a storage proof
    pub fn digest(&self) -> [u8; 32] {
        match self {
            CommitmentContent::ClientState(bz) => sha256(bz),
            CommitmentContent::Connection(conn) => sha256(&conn.encode_to_vec()),
            CommitmentContent::Channel(ch) => sha256(&ch.encode_to_vec()),
            CommitmentContent::Packet(packet) => commit_packet(packet),
            CommitmentContent::Acknowledgement(ack) => commit_acknowledgement(ack),
        }
    }
}

impl Chain {
    /// Contract state of this chain's host at `height`, or at the height
    /// `counterparty` currently trusts through `counterparty_client_id`
    pub async fn contract_state(
        &self,
        counterparty: &Chain,
        counterparty_client_id: &str,
        storage_keys: &[StorageKey],
        height: Option<u64>,
    ) -> Result<ContractState> {
        let height = match height {
            Some(h) => h,
            None => counterparty
                .trusted_height(counterparty_client_id)
                .await?
                .block_number(),
        };
        self.ledger()
            .query_state(&self.contracts.host, storage_keys, Some(height))
            .await
            .map_err(|e| Error::ledger(format!("query state at {}", height), e))
    }

    /// Storage proof for `storage_key` on this chain's host
    pub async fn query_proof(
        &self,
        counterparty: &Chain,
        counterparty_client_id: &str,
        storage_key: &StorageKey,
        height: Option<u64>,
    ) -> Result<Proof> {
        if !storage_key.is_hex() {
            return Err(Error::violation(format!(
                "storage key must be a 0x-prefixed hex string: {}",
                storage_key
            )));
        }

        let state = self
            .contract_state(
                counterparty,
                counterparty_client_id,
                std::slice::from_ref(storage_key),
                height,
            )
            .await?;
        let data = state
            .eth_proof()
            .storage_proof_rlp
            .first()
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::StorageProof, storage_key.to_string()))?;

        Ok(Proof {
            height: Height::from_block_number(state.header().number),
            data,
        })
    }

    /// Apply the verifying chain's proof format
    fn seal_for(counterparty: &Chain, proof: Proof, content: CommitmentContent<'_>) -> Proof {
        (counterparty.client_type.capabilities().seal_proof)(proof, content)
    }

    /// Stored client state `client_id` of this chain, with its proof
    pub async fn query_client_proof(
        &self,
        counterparty: &Chain,
        counterparty_client_id: &str,
        client_id: &str,
        height: Option<u64>,
    ) -> Result<(Vec<u8>, Proof)> {
        let client_state = self
            .ledger()
            .client_state(client_id)
            .await
            .map_err(|e| Error::ledger(format!("get client state {}", client_id), e))?
            .ok_or_else(|| Error::not_found(EntityKind::Client, client_id))?;

        let slot = counterparty
            .commitment_slot(&CommitmentPath::ClientState {
                client_id: client_id.to_string(),
            })
            .await?;
        let proof = self
            .query_proof(counterparty, counterparty_client_id, &slot, height)
            .await?;
        let proof = Self::seal_for(counterparty, proof, CommitmentContent::ClientState(&client_state));

        debug!(
            "🔍 Client proof for {} on chain {} at {}",
            client_id, self.chain_id, proof.height
        );
        Ok((client_state, proof))
    }

    pub async fn query_connection_proof(
        &self,
        counterparty: &Chain,
        counterparty_client_id: &str,
        connection_id: &str,
        height: Option<u64>,
    ) -> Result<Proof> {
        let slot = counterparty
            .commitment_slot(&CommitmentPath::Connection {
                connection_id: connection_id.to_string(),
            })
            .await?;
        let proof = self
            .query_proof(counterparty, counterparty_client_id, &slot, height)
            .await?;

        let connection = self
            .ledger()
            .connection(connection_id)
            .await
            .map_err(|e| Error::ledger(format!("get connection {}", connection_id), e))?
            .ok_or_else(|| Error::not_found(EntityKind::Connection, connection_id))?;
        let proof = Self::seal_for(counterparty, proof, CommitmentContent::Connection(&connection));

        debug!(
            "🔍 Connection proof for {} on chain {} at {}",
            connection_id, self.chain_id, proof.height
        );
        Ok(proof)
    }

    pub async fn query_channel_proof(
        &self,
        counterparty: &Chain,
        counterparty_client_id: &str,
        channel: &TestChannel,
        height: Option<u64>,
    ) -> Result<Proof> {
        let slot = counterparty
            .commitment_slot(&CommitmentPath::Channel {
                port_id: channel.port_id.clone(),
                channel_id: channel.id.clone(),
            })
            .await?;
        let proof = self
            .query_proof(counterparty, counterparty_client_id, &slot, height)
            .await?;

        let stored = self
            .ledger()
            .channel(&channel.port_id, &channel.id)
            .await
            .map_err(|e| Error::ledger(format!("get channel {}/{}", channel.port_id, channel.id), e))?
            .ok_or_else(|| {
                Error::not_found(
                    EntityKind::Channel,
                    format!("{}/{}", channel.port_id, channel.id),
                )
            })?;
        let proof = Self::seal_for(counterparty, proof, CommitmentContent::Channel(&stored));

        debug!(
            "🔍 Channel proof for {}/{} on chain {} at {}",
            channel.port_id, channel.id, self.chain_id, proof.height
        );
        Ok(proof)
    }

    /// Proof of the commitment this chain stored when `packet` was sent
    pub async fn query_packet_commitment_proof(
        &self,
        counterparty: &Chain,
        counterparty_client_id: &str,
        packet: &Packet,
        height: Option<u64>,
    ) -> Result<Proof> {
        let slot = counterparty
            .commitment_slot(&CommitmentPath::Packet {
                port_id: packet.source_port.clone(),
                channel_id: packet.source_channel.clone(),
                sequence: packet.sequence,
            })
            .await?;
        let proof = self
            .query_proof(counterparty, counterparty_client_id, &slot, height)
            .await?;
        Ok(Self::seal_for(counterparty, proof, CommitmentContent::Packet(packet)))
    }

    /// Proof of the acknowledgement this chain wrote on receiving `packet`
    pub async fn query_packet_ack_proof(
        &self,
        counterparty: &Chain,
        counterparty_client_id: &str,
        packet: &Packet,
        acknowledgement: &[u8],
        height: Option<u64>,
    ) -> Result<Proof> {
        let slot = counterparty
            .commitment_slot(&CommitmentPath::PacketAcknowledgement {
                port_id: packet.destination_port.clone(),
                channel_id: packet.destination_channel.clone(),
                sequence: packet.sequence,
            })
            .await?;
        let proof = self
            .query_proof(counterparty, counterparty_client_id, &slot, height)
            .await?;
        Ok(Self::seal_for(
            counterparty,
            proof,
            CommitmentContent::Acknowledgement(acknowledgement),
        ))
    }
}
