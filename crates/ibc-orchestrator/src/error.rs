// Error taxonomy for handshake and packet orchestration

use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by ledger collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of on-chain entity that was looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Client,
    Connection,
    Channel,
    Packet,
    Event,
    StorageProof,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Client => "client",
            EntityKind::Connection => "connection",
            EntityKind::Channel => "channel",
            EntityKind::Packet => "packet",
            EntityKind::Event => "event",
            EntityKind::StorageProof => "storage proof",
        };
        f.write_str(name)
    }
}

/// Errors raised while encoding or decoding envelopes and event payloads
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("unexpected Any type url: expected {expected}, got {actual}")]
    UnexpectedTypeUrl { expected: String, actual: String },

    #[error("ABI decode error: {0}")]
    Abi(String),
}

/// Errors that can occur while driving a handshake
#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("transaction {method} failed: {}", reason.as_deref().unwrap_or("no revert reason"))]
    TransactionFailed {
        method: String,
        reason: Option<String>,
    },

    #[error("{operation} timed out after {waited:?}")]
    Timeout { operation: String, waited: Duration },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("ledger call {operation} failed: {source}")]
    Ledger {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Wrap a collaborator failure with the operation that issued it
    pub fn ledger(operation: impl Into<String>, source: BoxError) -> Self {
        Error::Ledger {
            operation: operation.into(),
            source,
        }
    }

    pub fn violation(msg: impl Into<String>) -> Self {
        Error::ProtocolViolation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
