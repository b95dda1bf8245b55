// Packet send, receive and acknowledgement relay

use tracing::{debug, info};

use super::{Chain, TestChannel};
use crate::chains::CancelToken;
use crate::error::{EntityKind, Error, Result};
use crate::events;
use crate::types::msgs::{HandlerMsg, MsgPacketAcknowledgement, MsgPacketRecv};
use crate::types::{Height, Packet};

impl Chain {
    /// Next sequence the host will assign on (`port_id`, `channel_id`)
    pub async fn next_sequence_send(&self, port_id: &str, channel_id: &str) -> Result<u64> {
        self.ledger()
            .next_sequence_send(port_id, channel_id)
            .await
            .map_err(|e| Error::ledger(format!("next sequence send {}/{}", port_id, channel_id), e))
    }

    /// Packet to be sent next on (`source_port`, `source_channel`)
    #[allow(clippy::too_many_arguments)]
    pub async fn next_packet(
        &self,
        source_port: &str,
        source_channel: &str,
        destination_port: &str,
        destination_channel: &str,
        data: Vec<u8>,
        timeout_height: Height,
        timeout_timestamp: u64,
    ) -> Result<Packet> {
        let sequence = self.next_sequence_send(source_port, source_channel).await?;
        Ok(Packet {
            sequence,
            source_port: source_port.to_string(),
            source_channel: source_channel.to_string(),
            destination_port: destination_port.to_string(),
            destination_channel: destination_channel.to_string(),
            data,
            timeout_height,
            timeout_timestamp,
        })
    }

    /// Submit `packet`; its sequence must be the one the host assigns next
    pub async fn send_packet(&self, cancel: &CancelToken, packet: &Packet) -> Result<()> {
        let expected = self
            .next_sequence_send(&packet.source_port, &packet.source_channel)
            .await?;
        if packet.sequence != expected {
            return Err(Error::violation(format!(
                "packet {} has sequence {}, host expects {}",
                packet.key(),
                packet.sequence,
                expected
            )));
        }

        self.submit(HandlerMsg::SendPacket(packet.clone()), cancel).await?;
        info!(
            "📤 Sent packet {} on chain {} ({} bytes)",
            packet.key(),
            self.chain_id,
            packet.data.len()
        );
        Ok(())
    }

    /// Deliver `packet`, sent by `counterparty`, to this chain
    pub async fn handle_packet_recv(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        ch: &TestChannel,
        _counterparty_ch: &TestChannel,
        packet: &Packet,
    ) -> Result<()> {
        let proof = counterparty
            .query_packet_commitment_proof(self, &ch.client_id, packet, None)
            .await?;

        let msg = MsgPacketRecv {
            packet: packet.clone(),
            proof: proof.data,
            proof_height: proof.height,
        };
        self.submit(HandlerMsg::RecvPacket(msg), cancel).await?;

        info!(
            "📥 Chain {} received packet {} (proof height {})",
            self.chain_id,
            packet.key(),
            proof.height
        );
        Ok(())
    }

    /// Deliver the acknowledgement `counterparty` wrote for `packet`
    pub async fn handle_packet_acknowledgement(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        ch: &TestChannel,
        _counterparty_ch: &TestChannel,
        packet: &Packet,
        acknowledgement: &[u8],
    ) -> Result<()> {
        let proof = counterparty
            .query_packet_ack_proof(self, &ch.client_id, packet, acknowledgement, None)
            .await?;

        let msg = MsgPacketAcknowledgement {
            packet: packet.clone(),
            acknowledgement: acknowledgement.to_vec(),
            proof: proof.data,
            proof_height: proof.height,
        };
        self.submit(HandlerMsg::AcknowledgePacket(msg), cancel).await?;

        info!(
            "📨 Chain {} acknowledged packet {} (proof height {})",
            self.chain_id,
            packet.key(),
            proof.height
        );
        Ok(())
    }

    /// Packet sent from this chain with exactly this key
    pub async fn find_packet(
        &self,
        source_port: &str,
        source_channel: &str,
        sequence: u64,
    ) -> Result<Packet> {
        let packet = events::find_sent_packet(
            self.ledger(),
            self.events(),
            &self.contracts.handler,
            source_port,
            source_channel,
            sequence,
        )
        .await?;
        debug!("🔎 Found packet {} on chain {}", packet.key(), self.chain_id);
        Ok(packet)
    }

    /// Most recent packet sent on (`source_port`, `source_channel`)
    pub async fn last_sent_packet(&self, source_port: &str, source_channel: &str) -> Result<Packet> {
        let next = self.next_sequence_send(source_port, source_channel).await?;
        if next <= 1 {
            return Err(Error::not_found(
                EntityKind::Packet,
                format!("no packet sent on {}/{}", source_port, source_channel),
            ));
        }
        self.find_packet(source_port, source_channel, next - 1).await
    }
}
