//! This module contains the [ProofFetcher] that requests zkEVM proofs from the prover service.

use super::rpc::JsonRpcClient;
use crate::{
    proof::decode_le_words,
    traits::{ProofAndPair, ProofFetcher},
};
use alloy_primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// The prover's answer to `prove`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProveResponse {
    pub proof: Bytes,
    pub final_pair: Bytes,
}

impl From<ProveResponse> for ProofAndPair {
    fn from(response: ProveResponse) -> Self {
        ProofAndPair {
            proof: decode_le_words(&response.proof),
            pair: decode_le_words(&response.final_pair),
        }
    }
}

/// The [ZkEvmProverClient] is a [ProofFetcher] speaking the prover's JSON-RPC interface.
#[derive(Debug, Clone)]
pub struct ZkEvmProverClient {
    rpc: JsonRpcClient,
}

impl ZkEvmProverClient {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait::async_trait]
impl ProofFetcher for ZkEvmProverClient {
    async fn fetch_proof_and_pair(&self, trace: &str) -> Result<ProofAndPair> {
        let response: ProveResponse = self
            .rpc
            .request("prove", (trace.to_string(),))
            .await
            .context("failed to request prove")?;
        Ok(response.into())
    }
}
