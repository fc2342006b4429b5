//! A mock rollup node and L2 execution client. Output roots are derived from the block number, optionally diverging
//! from a given block on to play a faulty asserter.

use crate::traits::{L2TraceSource, RollupStatusSource};
use alloy_primitives::{keccak256, B256, U256, U64};
use anyhow::Result;
use balin_primitives::{
    BlockId, L1BlockRef, L2BlockRef, NextBlockHeader, OutputResponse, OutputWithProofResponse,
    PublicInputProof, SyncStatus,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// L2 blocks per L1 origin.
const L2_BLOCKS_PER_EPOCH: u64 = 6;

fn hash_of(tag: &[u8], n: u64) -> B256 {
    let mut preimage = tag.to_vec();
    preimage.extend_from_slice(&U256::from(n).to_be_bytes::<32>());
    keccak256(preimage)
}

/// The [MockRollup] serves outputs for every block number. Clones share the sync status.
#[derive(Debug, Clone, Default)]
pub struct MockRollup {
    diverge_from: Option<u64>,
    sync_status: Arc<Mutex<SyncStatus>>,
}

impl MockRollup {
    /// A rollup node that agrees with the canonical chain.
    pub fn honest() -> Self {
        Self::default()
    }

    /// A rollup node whose output roots are wrong from `block` on.
    pub fn diverging_from(block: u64) -> Self {
        Self {
            diverge_from: Some(block),
            ..Default::default()
        }
    }

    /// Returns the output root this node computes at `block`.
    pub fn root_at(&self, block: u64) -> B256 {
        match self.diverge_from {
            Some(from) if block >= from => hash_of(b"faulty", block),
            _ => hash_of(b"output", block),
        }
    }

    pub fn block_hash(block: u64) -> B256 {
        hash_of(b"block", block)
    }

    fn block_ref(block: u64) -> L2BlockRef {
        let epoch = block / L2_BLOCKS_PER_EPOCH;
        L2BlockRef {
            hash: Self::block_hash(block),
            number: block,
            parent_hash: Self::block_hash(block.saturating_sub(1)),
            timestamp: block * 2,
            l1_origin: BlockId {
                hash: hash_of(b"l1", epoch),
                number: epoch,
            },
            sequence_number: block % L2_BLOCKS_PER_EPOCH,
        }
    }

    /// Sets the safe and finalized L2 heads, deriving the L1 view from the safe head.
    pub async fn set_heads(&self, safe_l2: u64, finalized_l2: u64) {
        let safe = Self::block_ref(safe_l2);
        let finalized = Self::block_ref(finalized_l2);
        let current_l1 = L1BlockRef {
            hash: safe.l1_origin.hash,
            number: safe.l1_origin.number,
            parent_hash: hash_of(b"l1", safe.l1_origin.number.saturating_sub(1)),
            timestamp: safe.timestamp,
        };
        *self.sync_status.lock().await = SyncStatus {
            current_l1,
            head_l1: current_l1,
            safe_l1: current_l1,
            finalized_l1: current_l1,
            unsafe_l2: safe,
            safe_l2: safe,
            finalized_l2: finalized,
        };
    }
}

#[async_trait::async_trait]
impl RollupStatusSource for MockRollup {
    async fn sync_status(&self) -> Result<SyncStatus> {
        Ok(*self.sync_status.lock().await)
    }

    async fn output_at_block(&self, block_number: u64) -> Result<OutputResponse> {
        Ok(OutputResponse {
            version: B256::ZERO,
            output_root: self.root_at(block_number),
            block_ref: Self::block_ref(block_number),
            withdrawal_storage_root: hash_of(b"withdrawals", block_number),
            state_root: hash_of(b"state", block_number),
            status: *self.sync_status.lock().await,
            next_block_ref: Self::block_ref(block_number + 1),
        })
    }

    async fn output_with_proof_at_block(&self, block_number: u64) -> Result<OutputWithProofResponse> {
        let output = self.output_at_block(block_number).await?;
        let next = &output.next_block_ref;
        let next_block = NextBlockHeader {
            parent_hash: output.block_ref.hash,
            state_root: hash_of(b"state", next.number),
            transactions_root: hash_of(b"transactions", next.number),
            receipts_root: hash_of(b"receipts", next.number),
            number: U64::from(next.number),
            gas_limit: U64::from(30_000_000u64),
            gas_used: U64::from(21_000u64),
            timestamp: U64::from(next.timestamp),
            base_fee: Some(U256::from(7)),
            ..Default::default()
        };
        Ok(OutputWithProofResponse {
            output,
            public_input_proof: PublicInputProof {
                next_block: Some(next_block),
                next_transactions: Vec::new(),
                l2_to_l1_message_passer_balance: U256::ZERO,
                l2_to_l1_message_passer_code_hash: hash_of(b"code", 0),
                merkle_proof: Vec::new(),
            },
        })
    }
}

/// Serves a minimal trace naming the block.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockL2;

#[async_trait::async_trait]
impl L2TraceSource for MockL2 {
    async fn block_trace(&self, block_number: u64) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "blockNumber": block_number }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn divergence_starts_at_the_given_block() {
        let honest = MockRollup::honest();
        let faulty = MockRollup::diverging_from(650);
        assert_eq!(honest.root_at(649), faulty.root_at(649));
        assert_ne!(honest.root_at(650), faulty.root_at(650));
        assert_ne!(honest.root_at(700), faulty.root_at(700));
    }

    #[tokio::test]
    async fn clones_share_sync_status() {
        let rollup = MockRollup::honest();
        rollup.clone().set_heads(120, 100).await;
        let status = rollup.sync_status().await.unwrap();
        assert_eq!(status.current_l2(true), 120);
        assert_eq!(status.current_l2(false), 100);
        assert_eq!(status.current_l1.number, 20);
    }
}
