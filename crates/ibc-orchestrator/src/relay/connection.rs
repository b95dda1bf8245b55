// Connection handshake: Init -> Try -> Ack -> Confirm
//
// Each step runs on `self` with proofs taken from `counterparty`. Steps that
// create a connection end return the identifier the host generated; the
// caller records it with `TestConnection::assign_id`.

use tracing::info;

use super::{Chain, TestConnection};
use crate::chains::CancelToken;
use crate::error::Result;
use crate::types::connection::{Counterparty, Version};
use crate::types::msgs::{
    HandlerMsg, MsgConnectionOpenAck, MsgConnectionOpenConfirm, MsgConnectionOpenInit,
    MsgConnectionOpenTry,
};

impl Chain {
    pub async fn connection_open_init(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        conn: &TestConnection,
        _counterparty_conn: &TestConnection,
    ) -> Result<String> {
        let msg = MsgConnectionOpenInit {
            client_id: conn.client_id.clone(),
            counterparty: Counterparty {
                client_id: conn.counterparty_client_id.clone(),
                connection_id: String::new(),
                prefix: Some(counterparty.commitment_prefix()),
            },
            delay_period: self.settings.delay_period,
        };
        self.submit(HandlerMsg::ConnectionOpenInit(msg), cancel).await?;

        let connection_id = self.last_generated_connection_id().await?;
        info!(
            "🤝 ConnOpenInit on chain {}: {} (client {})",
            self.chain_id, connection_id, conn.client_id
        );
        Ok(connection_id)
    }

    pub async fn connection_open_try(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        conn: &TestConnection,
        counterparty_conn: &TestConnection,
    ) -> Result<String> {
        let counterparty_connection_id = counterparty_conn.require_id()?;

        let proof_connection = counterparty
            .query_connection_proof(self, &conn.client_id, counterparty_connection_id, None)
            .await?;
        let (client_state_bytes, proof_client) = counterparty
            .query_client_proof(
                self,
                &conn.client_id,
                &counterparty_conn.client_id,
                Some(proof_connection.height.block_number()),
            )
            .await?;

        let msg = MsgConnectionOpenTry {
            previous_connection_id: String::new(),
            counterparty: Counterparty {
                client_id: counterparty_conn.client_id.clone(),
                connection_id: counterparty_connection_id.to_string(),
                prefix: Some(counterparty.commitment_prefix()),
            },
            delay_period: self.settings.delay_period,
            client_id: conn.client_id.clone(),
            client_state_bytes,
            counterparty_versions: vec![Version::default_version()],
            proof_init: proof_connection.data,
            proof_client: proof_client.data,
            proof_height: proof_connection.height,
        };
        self.submit(HandlerMsg::ConnectionOpenTry(msg), cancel).await?;

        let connection_id = self.last_generated_connection_id().await?;
        info!(
            "🤝 ConnOpenTry on chain {}: {} (counterparty {})",
            self.chain_id, connection_id, counterparty_connection_id
        );
        Ok(connection_id)
    }

    pub async fn connection_open_ack(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        conn: &TestConnection,
        counterparty_conn: &TestConnection,
    ) -> Result<()> {
        let connection_id = conn.require_id()?;
        let counterparty_connection_id = counterparty_conn.require_id()?;

        let proof_connection = counterparty
            .query_connection_proof(self, &conn.client_id, counterparty_connection_id, None)
            .await?;
        let (client_state_bytes, proof_client) = counterparty
            .query_client_proof(
                self,
                &conn.client_id,
                &counterparty_conn.client_id,
                Some(proof_connection.height.block_number()),
            )
            .await?;

        let msg = MsgConnectionOpenAck {
            connection_id: connection_id.to_string(),
            counterparty_connection_id: counterparty_connection_id.to_string(),
            client_state_bytes,
            version: Version::default_version(),
            proof_try: proof_connection.data,
            proof_client: proof_client.data,
            proof_height: proof_connection.height,
        };
        self.submit(HandlerMsg::ConnectionOpenAck(msg), cancel).await?;

        info!(
            "🤝 ConnOpenAck on chain {}: {} <-> {}",
            self.chain_id, connection_id, counterparty_connection_id
        );
        Ok(())
    }

    pub async fn connection_open_confirm(
        &self,
        cancel: &CancelToken,
        counterparty: &Chain,
        conn: &TestConnection,
        counterparty_conn: &TestConnection,
    ) -> Result<()> {
        let connection_id = conn.require_id()?;
        let counterparty_connection_id = counterparty_conn.require_id()?;

        let proof = counterparty
            .query_connection_proof(self, &conn.client_id, counterparty_connection_id, None)
            .await?;

        let msg = MsgConnectionOpenConfirm {
            connection_id: connection_id.to_string(),
            proof_ack: proof.data,
            proof_height: proof.height,
        };
        self.submit(HandlerMsg::ConnectionOpenConfirm(msg), cancel).await?;

        info!(
            "✅ Connection {} open on chain {} (counterparty {})",
            connection_id, self.chain_id, counterparty_connection_id
        );
        Ok(())
    }
}
