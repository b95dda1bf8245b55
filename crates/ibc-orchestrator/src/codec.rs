// Protobuf envelopes and commitment hashing
//
// Client states, consensus states and headers travel as `google.protobuf.Any`
// so the remote host can route them by type url.

use prost::Message;
use sha2::{Digest, Sha256};

use crate::error::CodecError;
use crate::types::channel::Packet;
use crate::types::client::{ibft2, mock};

/// A protobuf message that can be wrapped in an `Any` envelope
pub trait AnyMessage: Message + Default {
    const TYPE_URL: &'static str;
}

impl AnyMessage for mock::ClientState {
    const TYPE_URL: &'static str = "/ibc.lightclients.mock.v1.ClientState";
}

impl AnyMessage for mock::ConsensusState {
    const TYPE_URL: &'static str = "/ibc.lightclients.mock.v1.ConsensusState";
}

impl AnyMessage for mock::Header {
    const TYPE_URL: &'static str = "/ibc.lightclients.mock.v1.Header";
}

impl AnyMessage for ibft2::ClientState {
    const TYPE_URL: &'static str = "/ibc.lightclients.ibft2.v1.ClientState";
}

impl AnyMessage for ibft2::ConsensusState {
    const TYPE_URL: &'static str = "/ibc.lightclients.ibft2.v1.ConsensusState";
}

impl AnyMessage for ibft2::Header {
    const TYPE_URL: &'static str = "/ibc.lightclients.ibft2.v1.Header";
}

/// Encode `msg` inside an `Any` envelope
pub fn marshal_with_any<M: AnyMessage>(msg: &M) -> Vec<u8> {
    prost_types::Any {
        type_url: M::TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    }
    .encode_to_vec()
}

/// Decode an `Any` envelope, checking that it carries an `M`
pub fn unmarshal_with_any<M: AnyMessage>(bz: &[u8]) -> Result<M, CodecError> {
    let any = prost_types::Any::decode(bz)?;
    if any.type_url != M::TYPE_URL {
        return Err(CodecError::UnexpectedTypeUrl {
            expected: M::TYPE_URL.to_string(),
            actual: any.type_url,
        });
    }
    Ok(M::decode(any.value.as_slice())?)
}

/// Type url of an encoded `Any` envelope
pub fn any_type_url(bz: &[u8]) -> Result<String, CodecError> {
    Ok(prost_types::Any::decode(bz)?.type_url)
}

/// Calculate SHA256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Commitment stored by the sending host for `packet`
pub fn commit_packet(packet: &Packet) -> [u8; 32] {
    let mut buf = Vec::with_capacity(56);
    buf.extend_from_slice(&packet.timeout_timestamp.to_be_bytes());
    buf.extend_from_slice(&packet.timeout_height.revision_number.to_be_bytes());
    buf.extend_from_slice(&packet.timeout_height.revision_height.to_be_bytes());
    buf.extend_from_slice(&sha256(&packet.data));
    sha256(&buf)
}

/// Commitment stored by the receiving host for an acknowledgement
pub fn commit_acknowledgement(acknowledgement: &[u8]) -> [u8; 32] {
    sha256(acknowledgement)
}
