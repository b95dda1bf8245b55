// Signer key material for the orchestrated chains
//
// Keys are resolved once when a `KeyRing` is built and never change
// afterwards; the ledger handle signs with whichever key it is handed.

use std::collections::BTreeMap;
use std::fmt;

use secp256k1::{PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use crate::codec::sha256;

/// Account index used for every relayer-submitted transaction
pub const RELAYER_KEY_INDEX: u32 = 0;

/// Errors that can occur while building a key ring
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key not found: {0}")]
    NotFound(u32),

    #[error("Invalid key format: {0}")]
    InvalidFormat(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

/// A secp256k1 signing key bound to an account index
#[derive(Clone)]
pub struct SignerKey {
    pub index: u32,
    secret: SecretKey,
}

impl SignerKey {
    pub fn new(index: u32, secret: SecretKey) -> Self {
        Self { index, secret }
    }

    /// Parse a 32-byte hex private key, with or without `0x`
    pub fn from_hex(index: u32, hex_key: &str) -> Result<Self, KeyError> {
        let raw = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let bytes = hex::decode(raw)
            .map_err(|e| KeyError::InvalidFormat(format!("Invalid hex key: {}", e)))?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidFormat(
                "Private key must be 32 bytes".to_string(),
            ));
        }
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| KeyError::Crypto(format!("Invalid private key: {}", e)))?;
        Ok(Self::new(index, secret))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Compressed public key (33 bytes)
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::signing_only(), &self.secret)
    }
}

impl fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerKey")
            .field("index", &self.index)
            .field("public_key", &hex::encode(self.public_key().serialize()))
            .finish()
    }
}

/// Immutable mapping from account index to signer key
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: BTreeMap<u32, SignerKey>,
}

impl KeyRing {
    pub fn new(keys: impl IntoIterator<Item = SignerKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (k.index, k)).collect(),
        }
    }

    /// Keys given as hex strings, indexed by position
    pub fn from_hex_keys<S: AsRef<str>>(hex_keys: &[S]) -> Result<Self, KeyError> {
        let keys = hex_keys
            .iter()
            .enumerate()
            .map(|(i, k)| SignerKey::from_hex(i as u32, k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(keys))
    }

    /// Derive `count` keys deterministically from `seed`.
    ///
    /// Key `i` is `sha256(seed || "/" || i)`; intended for local test ledgers.
    pub fn from_seed(seed: &str, count: u32) -> Result<Self, KeyError> {
        let keys = (0..count)
            .map(|index| {
                let digest = sha256(format!("{}/{}", seed, index).as_bytes());
                SecretKey::from_slice(&digest)
                    .map(|secret| SignerKey::new(index, secret))
                    .map_err(|e| KeyError::Crypto(format!("Derived key {} invalid: {}", index, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(keys))
    }

    pub fn get(&self, index: u32) -> Result<&SignerKey, KeyError> {
        self.keys.get(&index).ok_or(KeyError::NotFound(index))
    }

    /// Key used for all handshake and relay transactions
    pub fn relayer(&self) -> Result<&SignerKey, KeyError> {
        self.get(RELAYER_KEY_INDEX)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
