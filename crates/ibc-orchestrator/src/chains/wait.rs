// Bounded waiting for transaction inclusion

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{LedgerHandle, Receipt, TxHash};
use crate::error::{Error, Result};
use crate::keystore::SignerKey;
use crate::types::msgs::HandlerMsg;

/// How often and for how long to poll for a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
        }
    }
}

/// Cooperative cancellation passed through every orchestration call.
///
/// Fires when its deadline passes or when the shutdown signal flips to `true`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    deadline: Option<Instant>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that never fires
    pub fn never() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            shutdown: None,
        }
    }

    pub fn from_shutdown(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            deadline: None,
            shutdown: Some(shutdown),
        }
    }

    /// Same token with a deadline no later than `timeout` from now
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        let expired = self.deadline.map(|d| Instant::now() >= d).unwrap_or(false);
        let shut_down = self.shutdown.as_ref().map(|rx| *rx.borrow()).unwrap_or(false);
        expired || shut_down
    }

    /// Resolves once the token fires; pending forever for `never()`
    pub async fn cancelled(&self) {
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let shutdown = async {
            match self.shutdown.clone() {
                Some(mut rx) => loop {
                    if *rx.borrow_and_update() {
                        return;
                    }
                    if rx.changed().await.is_err() {
                        // sender dropped without signalling
                        std::future::pending::<()>().await;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = deadline => {}
            _ = shutdown => {}
        }
    }
}

/// Poll for the receipt of `tx_hash` until found, `policy.max_wait`
/// elapses, or `cancel` fires
pub async fn wait_mined(
    ledger: &dyn LedgerHandle,
    tx_hash: &TxHash,
    method: &str,
    policy: &WaitPolicy,
    cancel: &CancelToken,
) -> Result<Receipt> {
    let started = Instant::now();
    let give_up_at = started + policy.max_wait;

    loop {
        if let Some(receipt) = ledger
            .receipt(tx_hash)
            .await
            .map_err(|e| Error::ledger(format!("{} receipt {}", method, tx_hash), e))?
        {
            debug!("⛏️ {} mined in block {} ({})", method, receipt.block_number, tx_hash);
            return Ok(receipt);
        }

        if cancel.is_cancelled() || Instant::now() >= give_up_at {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep_until(give_up_at) => break,
            _ = tokio::time::sleep(policy.poll_interval) => {}
        }
    }

    warn!("⏰ Gave up waiting for {} ({}) after {:?}", method, tx_hash, started.elapsed());
    Err(Error::Timeout {
        operation: format!("waiting for {} to be mined", method),
        waited: started.elapsed(),
    })
}

/// Submit `msg`, wait for it to be mined and require a successful status
pub async fn submit_and_wait(
    ledger: &dyn LedgerHandle,
    signer: &SignerKey,
    msg: &HandlerMsg,
    policy: &WaitPolicy,
    cancel: &CancelToken,
) -> Result<Receipt> {
    let method = msg.method();
    let tx_hash = ledger
        .submit(signer, msg)
        .await
        .map_err(|e| Error::ledger(method, e))?;
    debug!("📤 Submitted {} as {}", method, tx_hash);

    let receipt = wait_mined(ledger, &tx_hash, method, policy, cancel).await?;
    if !receipt.success {
        warn!(
            "❌ {} reverted: {}",
            method,
            receipt.revert_reason.as_deref().unwrap_or("no reason")
        );
        return Err(Error::TransactionFailed {
            method: method.to_string(),
            reason: receipt.revert_reason,
        });
    }
    Ok(receipt)
}
