//! Error taxonomy for the dispute roles. Handlers classify failures with [anyhow::Error::downcast_ref] to pick how
//! loudly to log before retrying on the next tick.

use alloy_primitives::B256;
use std::{future::Future, time::Duration};
use thiserror::Error;

/// The [DisputeError] enum classifies the failures a role can hit while polling.
#[derive(Debug, Error)]
pub enum DisputeError {
    /// A collaborator did not answer within the network timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A collaborator answered with an error or an undecodable payload.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// On-chain state or local state contradicts what the protocol guarantees.
    #[error("protocol invariant violated: {0}")]
    ProtocolInvariant(String),

    /// The validator cannot start with the given configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A transaction reverted or was never confirmed.
    #[error("transaction submission failed: {reason}")]
    Submission {
        tx_hash: Option<B256>,
        reason: String,
    },
}

impl DisputeError {
    /// Returns `true` for failures that are expected to clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            DisputeError::Timeout(_) | DisputeError::Rpc(_) | DisputeError::Submission { .. } => {
                true
            }
            DisputeError::ProtocolInvariant(_) | DisputeError::Config(_) => false,
        }
    }
}

/// Returns `true` if the error chain carries a [DisputeError] that is not transient.
pub fn is_critical(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DisputeError>())
        .map(|e| !e.is_transient())
        .unwrap_or(false)
}

/// Bounds a collaborator call by `timeout`, surfacing an elapsed deadline as [DisputeError::Timeout].
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(DisputeError::Timeout(timeout).into()),
    }
}
