// Payloads of the remote handler methods
//
// Each variant of `HandlerMsg` maps to exactly one remote method; the ledger
// implementation owns the call-data encoding.

use super::channel::{Channel, Packet};
use super::connection::{Counterparty, Version};
use super::height::Height;

#[derive(Debug, Clone, PartialEq)]
pub struct MsgCreateClient {
    pub client_type: String,
    pub height: Height,
    pub client_state_bytes: Vec<u8>,
    pub consensus_state_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgUpdateClient {
    pub client_id: String,
    pub header: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgConnectionOpenInit {
    pub client_id: String,
    pub counterparty: Counterparty,
    pub delay_period: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgConnectionOpenTry {
    pub previous_connection_id: String,
    pub counterparty: Counterparty,
    pub delay_period: u64,
    pub client_id: String,
    pub client_state_bytes: Vec<u8>,
    pub counterparty_versions: Vec<Version>,
    pub proof_init: Vec<u8>,
    pub proof_client: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgConnectionOpenAck {
    pub connection_id: String,
    pub counterparty_connection_id: String,
    pub client_state_bytes: Vec<u8>,
    pub version: Version,
    pub proof_try: Vec<u8>,
    pub proof_client: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgConnectionOpenConfirm {
    pub connection_id: String,
    pub proof_ack: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgChannelOpenInit {
    pub port_id: String,
    pub channel: Channel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgChannelOpenTry {
    pub port_id: String,
    pub channel: Channel,
    pub counterparty_version: String,
    pub proof_init: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgChannelOpenAck {
    pub port_id: String,
    pub channel_id: String,
    pub counterparty_version: String,
    pub counterparty_channel_id: String,
    pub proof_try: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgChannelOpenConfirm {
    pub port_id: String,
    pub channel_id: String,
    pub proof_ack: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgChannelCloseInit {
    pub port_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgChannelCloseConfirm {
    pub port_id: String,
    pub channel_id: String,
    pub proof_init: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgPacketRecv {
    pub packet: Packet,
    pub proof: Vec<u8>,
    pub proof_height: Height,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsgPacketAcknowledgement {
    pub packet: Packet,
    pub acknowledgement: Vec<u8>,
    pub proof: Vec<u8>,
    pub proof_height: Height,
}

/// A call to the remote IBC handler
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerMsg {
    CreateClient(MsgCreateClient),
    UpdateClient(MsgUpdateClient),
    ConnectionOpenInit(MsgConnectionOpenInit),
    ConnectionOpenTry(MsgConnectionOpenTry),
    ConnectionOpenAck(MsgConnectionOpenAck),
    ConnectionOpenConfirm(MsgConnectionOpenConfirm),
    ChannelOpenInit(MsgChannelOpenInit),
    ChannelOpenTry(MsgChannelOpenTry),
    ChannelOpenAck(MsgChannelOpenAck),
    ChannelOpenConfirm(MsgChannelOpenConfirm),
    ChannelCloseInit(MsgChannelCloseInit),
    ChannelCloseConfirm(MsgChannelCloseConfirm),
    SendPacket(Packet),
    RecvPacket(MsgPacketRecv),
    AcknowledgePacket(MsgPacketAcknowledgement),
}

impl HandlerMsg {
    /// Remote method name; these names are the wire contract
    pub fn method(&self) -> &'static str {
        match self {
            HandlerMsg::CreateClient(_) => "createClient",
            HandlerMsg::UpdateClient(_) => "updateClient",
            HandlerMsg::ConnectionOpenInit(_) => "connectionOpenInit",
            HandlerMsg::ConnectionOpenTry(_) => "connectionOpenTry",
            HandlerMsg::ConnectionOpenAck(_) => "connectionOpenAck",
            HandlerMsg::ConnectionOpenConfirm(_) => "connectionOpenConfirm",
            HandlerMsg::ChannelOpenInit(_) => "channelOpenInit",
            HandlerMsg::ChannelOpenTry(_) => "channelOpenTry",
            HandlerMsg::ChannelOpenAck(_) => "channelOpenAck",
            HandlerMsg::ChannelOpenConfirm(_) => "channelOpenConfirm",
            HandlerMsg::ChannelCloseInit(_) => "channelCloseInit",
            HandlerMsg::ChannelCloseConfirm(_) => "channelCloseConfirm",
            HandlerMsg::SendPacket(_) => "sendPacket",
            HandlerMsg::RecvPacket(_) => "recvPacket",
            HandlerMsg::AcknowledgePacket(_) => "acknowledgePacket",
        }
    }
}
