//! A [TxManager] for an account unlocked on the L1 node. The node signs through `eth_sendTransaction`; this type fills
//! in fees and waits for the receipt.

use super::rpc::JsonRpcClient;
use crate::{
    traits::{AccessListItem, GasPriceCaps, TxCandidate, TxManager, TxReceipt},
    DisputeError,
};
use alloy_primitives::{Address, Bytes, B256, U256, U64};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    from: Address,
    to: Address,
    data: &'a Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas: Option<U64>,
    max_fee_per_gas: U256,
    max_priority_fee_per_gas: U256,
    access_list: &'a [AccessListItem],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: B256,
    block_number: U64,
    status: U64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlock {
    base_fee_per_gas: Option<U256>,
}

/// The [NodeTxManager] sends from an account managed by the connected L1 node.
#[derive(Debug, Clone)]
pub struct NodeTxManager {
    rpc: JsonRpcClient,
    from: Address,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl NodeTxManager {
    pub fn new(rpc: JsonRpcClient, from: Address) -> Self {
        Self {
            rpc,
            from,
            receipt_poll_interval: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let receipt: Option<RawReceipt> = self
                .rpc
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(TxReceipt {
                    tx_hash: receipt.transaction_hash,
                    block_number: receipt.block_number.to::<u64>(),
                    success: receipt.status == U64::from(1),
                });
            }
            if Instant::now() >= deadline {
                return Err(DisputeError::Submission {
                    tx_hash: Some(tx_hash),
                    reason: format!("not mined within {:?}", self.receipt_timeout),
                }
                .into());
            }
            sleep(self.receipt_poll_interval).await;
        }
    }
}

#[async_trait::async_trait]
impl TxManager for NodeTxManager {
    fn from(&self) -> Address {
        self.from
    }

    async fn send_transaction(&self, candidate: TxCandidate) -> Result<TxReceipt> {
        let caps = self.suggest_gas_price_caps().await?;
        let request = SendRequest {
            from: self.from,
            to: candidate.to,
            data: &candidate.data,
            gas: candidate.gas_limit.map(U64::from),
            max_fee_per_gas: caps.fee_cap(),
            max_priority_fee_per_gas: caps.tip_cap,
            access_list: &candidate.access_list,
        };
        let tx_hash: B256 = self
            .rpc
            .request("eth_sendTransaction", json!([request]))
            .await
            .map_err(|e| DisputeError::Submission {
                tx_hash: None,
                reason: e.to_string(),
            })?;
        debug!(target: "txmgr", %tx_hash, to = %candidate.to, "published transaction");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        info!(
            target: "txmgr",
            %tx_hash,
            block_number = receipt.block_number,
            success = receipt.success,
            "transaction mined"
        );
        Ok(receipt)
    }

    async fn suggest_gas_price_caps(&self) -> Result<GasPriceCaps> {
        let tip_cap: U256 = self.rpc.request("eth_maxPriorityFeePerGas", ()).await?;
        let head: LatestBlock = self
            .rpc
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee = head
            .base_fee_per_gas
            .ok_or_else(|| DisputeError::Rpc("latest block has no base fee".to_string()))?;
        Ok(GasPriceCaps { tip_cap, base_fee })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn send_request_shape() {
        let data = Bytes::from_static(&[0xab]);
        let access_list = vec![AccessListItem {
            address: Address::repeat_byte(0x90),
            storage_keys: vec![B256::from(U256::from(3))],
        }];
        let request = SendRequest {
            from: Address::repeat_byte(0xa1),
            to: Address::repeat_byte(0x10),
            data: &data,
            gas: Some(U64::from(150_000u64)),
            max_fee_per_gas: U256::from(15),
            max_priority_fee_per_gas: U256::from(1),
            access_list: &access_list,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["gas"], "0x249f0");
        assert_eq!(value["maxFeePerGas"], "0xf");
        assert_eq!(
            value["accessList"][0]["storageKeys"][0],
            "0x0000000000000000000000000000000000000000000000000000000000000003"
        );
    }

    #[test]
    fn receipt_status() {
        let raw = r#"{
            "transactionHash": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "blockNumber": "0x10",
            "status": "0x0",
            "gasUsed": "0x5208"
        }"#;
        let receipt: RawReceipt = serde_json::from_str(raw).unwrap();
        assert_eq!(receipt.block_number, U64::from(16));
        assert_ne!(receipt.status, U64::from(1));
    }
}
