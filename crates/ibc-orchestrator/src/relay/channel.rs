// Channel handshake and closing

use tracing::info;

use super::{Chain, TestChannel};
use crate::chains::CancelToken;
use crate::error::Result;
use crate::types::channel::{Counterparty, State};
use crate::types::msgs::{
    HandlerMsg, MsgChannelCloseConfirm, MsgChannelCloseInit, MsgChannelOpenAck,
    MsgChannelOpenConfirm, MsgChannelOpenInit, MsgChannelOpenTry,
};
use crate::types::{Channel, Order};

fn channel_end(
    state: State,
    order: Order,
    counterparty_port: &str,
    counterparty_channel: &str,
    connection_id: &str,
    version: &str,
) -> Channel {
    let mut channel = Channel {
        counterparty: Some(Counterparty {
            port_id: counterparty_port.to_string(),
            channel_id: counterparty_channel.to_string(),
        }),
        connection_hops: vec![connection_id.to_string()],
        version: version.to_string(),
        ..Default::default()
    };
    channel.set_state(state);
    channel.set_ordering(order);
    channel
}

impl Chain {
    pub async fn channel_open_init(
        &self,
        cancel: &CancelToken,
        ch: &TestChannel,
        counterparty_ch: &TestChannel,
        order: Order,
        connection_id: &str,
    ) -> Result<String> {
        let msg = MsgChannelOpenInit {
            port_id: ch.port_id.clone(),
            channel: channel_end(
                State::Init,
                order,
                &counterparty_ch.port_id,
                "",
                connection_id,
                &ch.version,
            ),
        };
        self.submit(HandlerMsg::ChannelOpenInit(msg), cancel).await?;

        let channel_id = self.last_generated_channel_id().await?;
        info!(
            "📡 ChanOpenInit on chain {}: {}/{} over {}",
            self.chain_id, ch.port_id, channel_id, connection_id
        );
        Ok(channel_id)
    }

    pub async fn channel_open_try(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        ch: &TestChannel,
        counterparty_ch: &TestChannel,
        order: Order,
        connection_id: &str,
    ) -> Result<String> {
        let counterparty_channel_id = counterparty_ch.require_id()?;
        let proof = counterparty
            .query_channel_proof(self, &ch.client_id, counterparty_ch, None)
            .await?;

        let msg = MsgChannelOpenTry {
            port_id: ch.port_id.clone(),
            channel: channel_end(
                State::TryOpen,
                order,
                &counterparty_ch.port_id,
                counterparty_channel_id,
                connection_id,
                &ch.version,
            ),
            counterparty_version: counterparty_ch.version.clone(),
            proof_init: proof.data,
            proof_height: proof.height,
        };
        self.submit(HandlerMsg::ChannelOpenTry(msg), cancel).await?;

        let channel_id = self.last_generated_channel_id().await?;
        info!(
            "📡 ChanOpenTry on chain {}: {}/{} (counterparty {}/{})",
            self.chain_id, ch.port_id, channel_id, counterparty_ch.port_id, counterparty_channel_id
        );
        Ok(channel_id)
    }

    pub async fn channel_open_ack(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        ch: &TestChannel,
        counterparty_ch: &TestChannel,
    ) -> Result<()> {
        let channel_id = ch.require_id()?;
        let counterparty_channel_id = counterparty_ch.require_id()?;
        let proof = counterparty
            .query_channel_proof(self, &ch.client_id, counterparty_ch, None)
            .await?;

        let msg = MsgChannelOpenAck {
            port_id: ch.port_id.clone(),
            channel_id: channel_id.to_string(),
            counterparty_version: counterparty_ch.version.clone(),
            counterparty_channel_id: counterparty_channel_id.to_string(),
            proof_try: proof.data,
            proof_height: proof.height,
        };
        self.submit(HandlerMsg::ChannelOpenAck(msg), cancel).await?;

        info!(
            "📡 ChanOpenAck on chain {}: {}/{}",
            self.chain_id, ch.port_id, channel_id
        );
        Ok(())
    }

    pub async fn channel_open_confirm(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        ch: &TestChannel,
        counterparty_ch: &TestChannel,
    ) -> Result<()> {
        let channel_id = ch.require_id()?;
        counterparty_ch.require_id()?;
        let proof = counterparty
            .query_channel_proof(self, &ch.client_id, counterparty_ch, None)
            .await?;

        let msg = MsgChannelOpenConfirm {
            port_id: ch.port_id.clone(),
            channel_id: channel_id.to_string(),
            proof_ack: proof.data,
            proof_height: proof.height,
        };
        self.submit(HandlerMsg::ChannelOpenConfirm(msg), cancel).await?;

        info!(
            "✅ Channel {}/{} open on chain {}",
            ch.port_id, channel_id, self.chain_id
        );
        Ok(())
    }

    pub async fn channel_close_init(&self, cancel: &CancelToken, ch: &TestChannel) -> Result<()> {
        let channel_id = ch.require_id()?;
        let msg = MsgChannelCloseInit {
            port_id: ch.port_id.clone(),
            channel_id: channel_id.to_string(),
        };
        self.submit(HandlerMsg::ChannelCloseInit(msg), cancel).await?;

        info!("🚪 ChanCloseInit on chain {}: {}/{}", self.chain_id, ch.port_id, channel_id);
        Ok(())
    }

    /// Close `ch` after `counterparty_ch` was closed on `counterparty`
    pub async fn channel_close_confirm(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        ch: &TestChannel,
        counterparty_ch: &TestChannel,
    ) -> Result<()> {
        let channel_id = ch.require_id()?;
        counterparty_ch.require_id()?;
        let proof = counterparty
            .query_channel_proof(self, &ch.client_id, counterparty_ch, None)
            .await?;

        let msg = MsgChannelCloseConfirm {
            port_id: ch.port_id.clone(),
            channel_id: channel_id.to_string(),
            proof_init: proof.data,
            proof_height: proof.height,
        };
        self.submit(HandlerMsg::ChannelCloseConfirm(msg), cancel).await?;

        info!("🚪 Channel {}/{} closed on chain {}", ch.port_id, channel_id, self.chain_id);
        Ok(())
    }
}
