//! Types describing L2 outputs, both as submitted to the L2OutputOracle and as recomputed by the rollup node.

use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256, U64};
use serde::{Deserialize, Deserializer, Serialize};

/// The output root that marks a deleted output.
pub const DELETED_OUTPUT_ROOT: B256 = B256::ZERO;

/// The only output version the validator knows how to submit.
pub const OUTPUT_VERSION_V0: B256 = B256::ZERO;

/// Returns `true` if the output root is the deletion sentinel.
pub fn is_output_deleted(output_root: B256) -> bool {
    output_root == DELETED_OUTPUT_ROOT
}

/// A `(hash, number)` pair identifying a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId {
    pub hash: B256,
    pub number: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1BlockRef {
    pub hash: B256,
    pub number: u64,
    pub parent_hash: B256,
    pub timestamp: u64,
}

impl L1BlockRef {
    pub fn id(&self) -> BlockId {
        BlockId {
            hash: self.hash,
            number: self.number,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2BlockRef {
    pub hash: B256,
    pub number: u64,
    pub parent_hash: B256,
    pub timestamp: u64,
    #[serde(rename = "l1origin")]
    pub l1_origin: BlockId,
    pub sequence_number: u64,
}

/// The subset of the rollup node's sync status the validator acts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub current_l1: L1BlockRef,
    pub head_l1: L1BlockRef,
    pub safe_l1: L1BlockRef,
    pub finalized_l1: L1BlockRef,
    pub unsafe_l2: L2BlockRef,
    pub safe_l2: L2BlockRef,
    pub finalized_l2: L2BlockRef,
}

impl SyncStatus {
    /// Returns the L2 block the validator treats as canonical.
    pub fn current_l2(&self, allow_non_finalized: bool) -> u64 {
        if allow_non_finalized {
            self.safe_l2.number
        } else {
            self.finalized_l2.number
        }
    }
}

/// An output recomputed by the rollup node at a given L2 block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputResponse {
    pub version: B256,
    pub output_root: B256,
    pub block_ref: L2BlockRef,
    pub withdrawal_storage_root: B256,
    pub state_root: B256,
    #[serde(rename = "syncStatus")]
    pub status: SyncStatus,
    #[serde(default)]
    pub next_block_ref: L2BlockRef,
}

/// The header of the block following the proven block, as returned inside a [PublicInputProof].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBlockHeader {
    pub parent_hash: B256,
    pub miner: Address,
    pub state_root: B256,
    pub transactions_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: U64,
    pub gas_limit: U64,
    pub gas_used: U64,
    pub timestamp: U64,
    pub extra_data: Bytes,
    pub mix_hash: B256,
    #[serde(default)]
    pub nonce: B64,
    #[serde(default, rename = "baseFeePerGas")]
    pub base_fee: Option<U256>,
    #[serde(default)]
    pub withdrawals_root: Option<B256>,
    #[serde(default)]
    pub blob_gas_used: Option<U64>,
    #[serde(default)]
    pub excess_blob_gas: Option<U64>,
    #[serde(default, rename = "parentBeaconBlockRoot")]
    pub parent_beacon_root: Option<B256>,
}

/// Only the hash of each transaction of the next block is needed to build the public input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHash {
    pub hash: B256,
}

/// The proof material the rollup node attaches to an output so the fault proof's public input can be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicInputProof {
    pub next_block: Option<NextBlockHeader>,
    #[serde(default)]
    pub next_transactions: Vec<TransactionHash>,
    #[serde(deserialize_with = "u256_from_number_or_string")]
    pub l2_to_l1_message_passer_balance: U256,
    pub l2_to_l1_message_passer_code_hash: B256,
    #[serde(default)]
    pub merkle_proof: Vec<Bytes>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputWithProofResponse {
    #[serde(flatten)]
    pub output: OutputResponse,
    pub public_input_proof: PublicInputProof,
}

/// An output as stored by the L2OutputOracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointOutput {
    pub submitter: Address,
    pub output_root: B256,
    pub timestamp: u64,
    pub l2_block_number: u64,
}

/// The on-chain output at an index paired with the local recomputation at the same block.
#[derive(Debug, Clone)]
pub struct Outputs {
    pub remote: CheckpointOutput,
    pub local: OutputResponse,
}

impl Outputs {
    /// Returns `true` if the local recomputation agrees with the submitted output root.
    pub fn is_valid(&self) -> bool {
        self.local.output_root == self.remote.output_root
    }
}

/// The block range a challenge is opened over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRange {
    pub output_index: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub l1_origin: BlockId,
}

/// Accepts either a bare JSON number or a decimal/hex string. Go's `*big.Int` marshals as a bare number.
fn u256_from_number_or_string<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawQuantity {
        Number(u64),
        Text(String),
    }

    match RawQuantity::deserialize(deserializer)? {
        RawQuantity::Number(n) => Ok(U256::from(n)),
        RawQuantity::Text(s) => s.parse::<U256>().map_err(D::Error::custom),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deleted_output_predicate() {
        assert!(is_output_deleted(B256::ZERO));
        assert!(!is_output_deleted(B256::repeat_byte(0x01)));
    }

    #[test]
    fn decode_output_response() {
        let raw = r#"{
            "version": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "outputRoot": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockRef": {
                "hash": "0x2222222222222222222222222222222222222222222222222222222222222222",
                "number": 700,
                "parentHash": "0x3333333333333333333333333333333333333333333333333333333333333333",
                "timestamp": 1400,
                "l1origin": {
                    "hash": "0x4444444444444444444444444444444444444444444444444444444444444444",
                    "number": 120
                },
                "sequenceNumber": 3
            },
            "withdrawalStorageRoot": "0x5555555555555555555555555555555555555555555555555555555555555555",
            "stateRoot": "0x6666666666666666666666666666666666666666666666666666666666666666",
            "syncStatus": {
                "current_l1": { "hash": "0x4444444444444444444444444444444444444444444444444444444444444444", "number": 120, "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000", "timestamp": 10 },
                "head_l1": { "hash": "0x4444444444444444444444444444444444444444444444444444444444444444", "number": 130, "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000", "timestamp": 10 },
                "safe_l1": { "hash": "0x4444444444444444444444444444444444444444444444444444444444444444", "number": 110, "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000", "timestamp": 10 },
                "finalized_l1": { "hash": "0x4444444444444444444444444444444444444444444444444444444444444444", "number": 100, "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000", "timestamp": 10 },
                "unsafe_l2": { "hash": "0x2222222222222222222222222222222222222222222222222222222222222222", "number": 720, "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000", "timestamp": 1440, "l1origin": { "hash": "0x4444444444444444444444444444444444444444444444444444444444444444", "number": 120 }, "sequenceNumber": 0 },
                "safe_l2": { "hash": "0x2222222222222222222222222222222222222222222222222222222222222222", "number": 710, "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000", "timestamp": 1420, "l1origin": { "hash": "0x4444444444444444444444444444444444444444444444444444444444444444", "number": 120 }, "sequenceNumber": 0 },
                "finalized_l2": { "hash": "0x2222222222222222222222222222222222222222222222222222222222222222", "number": 705, "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000", "timestamp": 1410, "l1origin": { "hash": "0x4444444444444444444444444444444444444444444444444444444444444444", "number": 120 }, "sequenceNumber": 0 }
            }
        }"#;

        let output: OutputResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(output.block_ref.number, 700);
        assert_eq!(output.block_ref.l1_origin.number, 120);
        assert_eq!(output.status.current_l2(true), 710);
        assert_eq!(output.status.current_l2(false), 705);
        assert_eq!(output.next_block_ref, L2BlockRef::default());
    }

    #[test]
    fn decode_message_passer_balance() {
        let from_number: PublicInputProof = serde_json::from_str(
            r#"{"nextBlock":null,"l2ToL1MessagePasserBalance":42,"l2ToL1MessagePasserCodeHash":"0x0000000000000000000000000000000000000000000000000000000000000000"}"#,
        )
        .unwrap();
        assert_eq!(from_number.l2_to_l1_message_passer_balance, U256::from(42));

        let from_hex: PublicInputProof = serde_json::from_str(
            r#"{"nextBlock":null,"l2ToL1MessagePasserBalance":"0x2a","l2ToL1MessagePasserCodeHash":"0x0000000000000000000000000000000000000000000000000000000000000000"}"#,
        )
        .unwrap();
        assert_eq!(from_hex.l2_to_l1_message_passer_balance, U256::from(42));
    }
}
