use crate::traits::{ProofAndPair, ProofFetcher};
use alloy_primitives::U256;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The [MockProver] answers every request with a fixed proof and records the traces it was asked for.
#[derive(Debug, Clone, Default)]
pub struct MockProver {
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockProver {
    /// Returns the traces received so far.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ProofFetcher for MockProver {
    async fn fetch_proof_and_pair(&self, trace: &str) -> Result<ProofAndPair> {
        self.requests.lock().await.push(trace.to_string());
        Ok(ProofAndPair {
            proof: (1..=8u64).map(U256::from).collect(),
            pair: (1..=6u64).map(U256::from).collect(),
        })
    }
}
