// Light-client lifecycle: create, update and read clients of a counterparty
//
// Everything that differs between client types is looked up in a static
// capability table keyed by `ClientType`.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::chains::CancelToken;
use crate::codec::{marshal_with_any, unmarshal_with_any, AnyMessage};
use crate::error::{CodecError, EntityKind, Error, Result};
use crate::events::EventKind;
use crate::relay::{Chain, CommitmentContent, Proof};
use crate::types::client::{ibft2, mock};
use crate::types::msgs::{HandlerMsg, MsgCreateClient, MsgUpdateClient};
use crate::types::{ClientType, Height};

/// Per-client-type behaviour
pub struct ClientCapabilities {
    pub client_type: ClientType,
    /// Build `createClient` from the counterparty's cached contract state
    pub create_msg: fn(&Chain) -> Result<MsgCreateClient>,
    /// Build `updateClient` from the counterparty's cached contract state and
    /// the locally trusted height
    pub update_msg: fn(&Chain, &str, Option<Height>) -> Result<MsgUpdateClient>,
    /// Whether `update_msg` needs the trusted height of the local client
    pub needs_trusted_height: bool,
    /// Latest height recorded in stored client-state bytes
    pub latest_height: fn(&[u8]) -> Result<Height>,
    /// Turn a storage proof into what this client type verifies
    pub seal_proof: fn(Proof, CommitmentContent<'_>) -> Proof,
}

static MOCK: ClientCapabilities = ClientCapabilities {
    client_type: ClientType::Mock,
    create_msg: mock_create_msg,
    update_msg: mock_update_msg,
    needs_trusted_height: false,
    latest_height: mock_latest_height,
    seal_proof: content_hash_proof,
};

static IBFT2: ClientCapabilities = ClientCapabilities {
    client_type: ClientType::Ibft2,
    create_msg: ibft2_create_msg,
    update_msg: ibft2_update_msg,
    needs_trusted_height: true,
    latest_height: ibft2_latest_height,
    seal_proof: storage_proof,
};

impl ClientType {
    pub fn capabilities(&self) -> &'static ClientCapabilities {
        match self {
            ClientType::Mock => &MOCK,
            ClientType::Ibft2 => &IBFT2,
        }
    }
}

fn require_state(counterparty: &Chain) -> Result<&crate::chains::ContractState> {
    counterparty.last_contract_state.as_ref().ok_or_else(|| {
        Error::violation(format!(
            "chain {} has no contract state; call update_header first",
            counterparty.chain_id
        ))
    })
}

fn mock_create_msg(counterparty: &Chain) -> Result<MsgCreateClient> {
    let header = require_state(counterparty)?.header();
    let client_state = mock::ClientState {
        latest_height: Some(Height::from_block_number(header.number)),
    };
    let consensus_state = mock::ConsensusState {
        timestamp: header.time,
    };
    Ok(MsgCreateClient {
        client_type: ClientType::Mock.as_str().to_string(),
        height: Height::from_block_number(header.number),
        client_state_bytes: marshal_with_any(&client_state),
        consensus_state_bytes: marshal_with_any(&consensus_state),
    })
}

fn mock_update_msg(counterparty: &Chain, client_id: &str, _: Option<Height>) -> Result<MsgUpdateClient> {
    let header = require_state(counterparty)?.header();
    let update = mock::Header {
        height: Some(Height::from_block_number(header.number)),
        timestamp: header.time,
    };
    Ok(MsgUpdateClient {
        client_id: client_id.to_string(),
        header: marshal_with_any(&update),
    })
}

fn ibft2_state(counterparty: &Chain) -> Result<&crate::chains::Ibft2ContractState> {
    require_state(counterparty)?.ibft2().ok_or_else(|| {
        Error::violation(format!(
            "chain {} did not report IBFT2 consensus state",
            counterparty.chain_id
        ))
    })
}

fn ibft2_create_msg(counterparty: &Chain) -> Result<MsgCreateClient> {
    let state = ibft2_state(counterparty)?;
    let height = Height::from_block_number(state.header.number);
    let client_state = ibft2::ClientState {
        chain_id: counterparty.chain_id_string(),
        ibc_store_address: counterparty.contracts.host.as_bytes().to_vec(),
        latest_height: Some(height),
    };
    let consensus_state = ibft2::ConsensusState {
        timestamp: state.header.time,
        root: state.header.state_root.clone(),
        validators: state.validators.clone(),
    };
    Ok(MsgCreateClient {
        client_type: ClientType::Ibft2.as_str().to_string(),
        height,
        client_state_bytes: marshal_with_any(&client_state),
        consensus_state_bytes: marshal_with_any(&consensus_state),
    })
}

fn ibft2_update_msg(
    counterparty: &Chain,
    client_id: &str,
    trusted_height: Option<Height>,
) -> Result<MsgUpdateClient> {
    let state = ibft2_state(counterparty)?;
    let trusted_height = trusted_height
        .ok_or_else(|| Error::violation(format!("no trusted height for client {}", client_id)))?;
    let header = ibft2::Header {
        besu_header_rlp: state.sealing_header_rlp.clone(),
        seals: state.commit_seals.clone(),
        trusted_height: Some(trusted_height),
        account_state_proof: state.proof.account_proof_rlp.clone(),
    };
    Ok(MsgUpdateClient {
        client_id: client_id.to_string(),
        header: marshal_with_any(&header),
    })
}

/// Decode stored client-state bytes; an envelope of another type is a
/// protocol violation rather than a codec failure
fn decode_client_state<M: AnyMessage>(bz: &[u8]) -> Result<M> {
    unmarshal_with_any::<M>(bz).map_err(|e| match e {
        CodecError::UnexpectedTypeUrl { expected, actual } => Error::violation(format!(
            "stored client state is {}, expected {}",
            actual, expected
        )),
        other => Error::Codec(other),
    })
}

fn mock_latest_height(bz: &[u8]) -> Result<Height> {
    decode_client_state::<mock::ClientState>(bz)?
        .latest_height
        .ok_or_else(|| Error::violation("mock client state has no latest height"))
}

fn ibft2_latest_height(bz: &[u8]) -> Result<Height> {
    decode_client_state::<ibft2::ClientState>(bz)?
        .latest_height
        .ok_or_else(|| Error::violation("IBFT2 client state has no latest height"))
}

fn content_hash_proof(proof: Proof, content: CommitmentContent<'_>) -> Proof {
    Proof {
        height: proof.height,
        data: content.digest().to_vec(),
    }
}

fn storage_proof(proof: Proof, _: CommitmentContent<'_>) -> Proof {
    proof
}

impl Chain {
    /// Raw `Any` bytes of client `client_id` stored on this chain
    pub async fn client_state_bytes(&self, client_id: &str) -> Result<Vec<u8>> {
        self.ledger()
            .client_state(client_id)
            .await
            .map_err(|e| Error::ledger(format!("get client state {}", client_id), e))?
            .ok_or_else(|| Error::not_found(EntityKind::Client, client_id))
    }

    pub async fn mock_client_state(&self, client_id: &str) -> Result<mock::ClientState> {
        decode_client_state(&self.client_state_bytes(client_id).await?)
    }

    pub async fn ibft2_client_state(&self, client_id: &str) -> Result<ibft2::ClientState> {
        decode_client_state(&self.client_state_bytes(client_id).await?)
    }

    /// Latest height client `client_id` on this chain trusts
    pub async fn trusted_height(&self, client_id: &str) -> Result<Height> {
        let bz = self.client_state_bytes(client_id).await?;
        (self.client_type.capabilities().latest_height)(&bz)
    }

    pub fn construct_create_client_msg(&self, counterparty: &Chain) -> Result<MsgCreateClient> {
        (self.client_type.capabilities().create_msg)(counterparty)
    }

    pub async fn construct_update_client_msg(
        &self,
        counterparty: &Chain,
        client_id: &str,
    ) -> Result<MsgUpdateClient> {
        self.update_msg_with(self.client_type.capabilities(), counterparty, client_id)
            .await
    }

    async fn update_msg_with(
        &self,
        caps: &ClientCapabilities,
        counterparty: &Chain,
        client_id: &str,
    ) -> Result<MsgUpdateClient> {
        let trusted = if caps.needs_trusted_height {
            let bz = self.client_state_bytes(client_id).await?;
            Some((caps.latest_height)(&bz)?)
        } else {
            None
        };
        (caps.update_msg)(counterparty, client_id, trusted)
    }

    async fn create_client_with(
        &mut self,
        caps: &ClientCapabilities,
        cancel: &CancelToken,
        counterparty: &Chain,
    ) -> Result<String> {
        let msg = (caps.create_msg)(counterparty)?;
        let height = msg.height;
        self.submit(HandlerMsg::CreateClient(msg), cancel).await?;

        let client_id = self.discover_last_id(EventKind::GeneratedClientIdentifier).await?;
        if !self.client_ids.contains(&client_id) {
            self.client_ids.push(client_id.clone());
        }
        info!(
            "🆕 Created {} client {} on chain {} tracking chain {} at {}",
            caps.client_type, client_id, self.chain_id, counterparty.chain_id, height
        );
        Ok(client_id)
    }

    async fn update_client_with(
        &self,
        caps: &ClientCapabilities,
        cancel: &CancelToken,
        counterparty: &Chain,
        client_id: &str,
    ) -> Result<()> {
        let msg = self.update_msg_with(caps, counterparty, client_id).await?;
        self.submit(HandlerMsg::UpdateClient(msg), cancel).await?;
        info!(
            "🔄 Updated {} client {} on chain {} to block {}",
            caps.client_type,
            client_id,
            self.chain_id,
            counterparty.last_header_number().unwrap_or_default()
        );
        Ok(())
    }

    /// Create a client of this chain's type tracking `counterparty`; the new id
    /// is appended to `client_ids`
    pub async fn create_client(&mut self, cancel: &CancelToken, counterparty: &Chain) -> Result<String> {
        let caps = self.client_type.capabilities();
        self.create_client_with(caps, cancel, counterparty).await
    }

    pub async fn update_client(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        client_id: &str,
    ) -> Result<()> {
        let caps = self.client_type.capabilities();
        self.update_client_with(caps, cancel, counterparty, client_id).await
    }

    pub async fn create_mock_client(&mut self, cancel: &CancelToken, counterparty: &Chain) -> Result<String> {
        self.create_client_with(ClientType::Mock.capabilities(), cancel, counterparty)
            .await
    }

    pub async fn update_mock_client(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        client_id: &str,
    ) -> Result<()> {
        self.update_client_with(ClientType::Mock.capabilities(), cancel, counterparty, client_id)
            .await
    }

    pub async fn create_ibft2_client(&mut self, cancel: &CancelToken, counterparty: &Chain) -> Result<String> {
        self.create_client_with(ClientType::Ibft2.capabilities(), cancel, counterparty)
            .await
    }

    pub async fn update_ibft2_client(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        client_id: &str,
    ) -> Result<()> {
        self.update_client_with(ClientType::Ibft2.capabilities(), cancel, counterparty, client_id)
            .await
    }

    /// Wait for a block newer than the cached one and cache its contract state.
    ///
    /// With nothing cached the first observed state is taken. Bounded by
    /// `settings.header_refresh_timeout`.
    pub async fn update_header(&mut self, cancel: &CancelToken) -> Result<()> {
        let cancel = cancel.child_with_timeout(self.settings.header_refresh_timeout);
        let started = Instant::now();

        loop {
            let state = self
                .ledger()
                .query_state(&self.contracts.host, &[], None)
                .await
                .map_err(|e| Error::ledger("query latest state", e))?;

            let newer = self
                .last_header_number()
                .map_or(true, |cached| state.header().number > cached);
            if newer {
                debug!("📦 Chain {} header advanced to {}", self.chain_id, state.header().number);
                self.last_contract_state = Some(state);
                return Ok(());
            }

            if cancel.is_cancelled() {
                warn!(
                    "⏰ Chain {} produced no block after {} within {:?}",
                    self.chain_id,
                    state.header().number,
                    started.elapsed()
                );
                return Err(Error::Timeout {
                    operation: format!("refreshing header of chain {}", self.chain_id),
                    waited: started.elapsed(),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.settings.wait.poll_interval) => {}
            }
        }
    }
}
