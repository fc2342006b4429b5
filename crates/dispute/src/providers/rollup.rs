//! This module contains the [RollupStatusSource] backed by the rollup node's RPC.

use super::rpc::JsonRpcClient;
use crate::traits::RollupStatusSource;
use alloy_primitives::U64;
use anyhow::Result;
use balin_primitives::{OutputResponse, OutputWithProofResponse, SyncStatus};

/// The [RollupNodeProvider] fetches sync status and output roots from the rollup node.
#[derive(Debug, Clone)]
pub struct RollupNodeProvider {
    rpc: JsonRpcClient,
}

impl RollupNodeProvider {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait::async_trait]
impl RollupStatusSource for RollupNodeProvider {
    async fn sync_status(&self) -> Result<SyncStatus> {
        self.rpc.request("optimism_syncStatus", ()).await
    }

    async fn output_at_block(&self, block_number: u64) -> Result<OutputResponse> {
        self.rpc
            .request("optimism_outputAtBlock", (U64::from(block_number),))
            .await
    }

    async fn output_with_proof_at_block(&self, block_number: u64) -> Result<OutputWithProofResponse> {
        self.rpc
            .request("kroma_outputWithProofAtBlock", (U64::from(block_number),))
            .await
    }
}
