use super::rpc::JsonRpcClient;
use crate::traits::L2TraceSource;
use alloy_primitives::U64;
use anyhow::Result;

/// The [L2TraceProvider] fetches block execution traces from the L2 execution client.
#[derive(Debug, Clone)]
pub struct L2TraceProvider {
    rpc: JsonRpcClient,
}

impl L2TraceProvider {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait::async_trait]
impl L2TraceSource for L2TraceProvider {
    async fn block_trace(&self, block_number: u64) -> Result<serde_json::Value> {
        self.rpc
            .request("kroma_getBlockTraceByNumberOrHash", (U64::from(block_number),))
            .await
    }
}
