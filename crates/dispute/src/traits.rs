//! The collaborator traits the roles are written against. Each one is a narrow view onto an external service: the
//! L1 execution client, the rollup node, the L2 execution client, the zkEVM prover and the transaction manager.

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::Result;
use balin_primitives::{
    Challenge, ChallengeStatus, CheckpointOutput, OutputResponse, OutputWithProofResponse,
    SyncStatus, ValidatorStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A log emitted on L1, as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, with = "quantity_opt")]
    pub block_number: Option<u64>,
}

/// An `eth_getLogs` filter. `topics[i]` lists the values accepted at position `i`; an empty entry matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub from_block: u64,
    pub to_block: u64,
    pub addresses: Vec<Address>,
    pub topics: Vec<Vec<B256>>,
}

impl LogFilter {
    /// Returns `true` if `log` satisfies the address and topic constraints. The block range is not checked.
    pub fn matches(&self, log: &Log) -> bool {
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, accepted)| {
            accepted.is_empty() || log.topics.get(i).map_or(false, |t| accepted.contains(t))
        })
    }
}

/// An EIP-2930 access list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

/// A transaction the roles want sent. Signing, nonce management and fee bumping are the [TxManager]'s job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCandidate {
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
    pub access_list: Vec<AccessListItem>,
}

impl TxCandidate {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            gas_limit: None,
            access_list: Vec::new(),
        }
    }
}

/// The outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
}

/// Suggested EIP-1559 fee parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasPriceCaps {
    pub tip_cap: U256,
    pub base_fee: U256,
}

impl GasPriceCaps {
    /// Returns the fee cap, leaving room for the base fee to double.
    pub fn fee_cap(&self) -> U256 {
        self.tip_cap + self.base_fee * U256::from(2)
    }
}

/// The prover's answer, decoded into field elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofAndPair {
    pub proof: Vec<U256>,
    pub pair: Vec<U256>,
}

/// Typed reads of the L1 contracts plus the handful of raw L1 queries the roles need.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    // L2OutputOracle
    async fn submission_interval(&self) -> Result<u64>;
    async fn l2_block_time(&self) -> Result<u64>;
    async fn finalization_period_seconds(&self) -> Result<u64>;
    async fn next_output_index(&self) -> Result<u64>;
    async fn next_block_number(&self) -> Result<u64>;
    async fn latest_block_number(&self) -> Result<u64>;
    async fn l2_output(&self, output_index: u64) -> Result<CheckpointOutput>;
    async fn l2_output_index_after(&self, l2_block_number: u64) -> Result<u64>;
    async fn is_output_finalized(&self, output_index: u64) -> Result<bool>;

    // Colosseum
    async fn creation_period_seconds(&self) -> Result<u64>;
    async fn segments_length(&self, turn_index: u64) -> Result<u64>;
    async fn challenge(&self, output_index: u64, challenger: Address) -> Result<Challenge>;
    async fn challenge_status(
        &self,
        output_index: u64,
        challenger: Address,
    ) -> Result<ChallengeStatus>;
    async fn is_in_creation_period(&self, output_index: u64) -> Result<bool>;

    // ValidatorPool
    async fn required_bond_amount(&self) -> Result<U256>;
    async fn terminate_output_index(&self) -> Result<u64>;
    async fn pool_balance_of(&self, validator: Address) -> Result<U256>;
    async fn pool_next_validator(&self) -> Result<Address>;

    // ValidatorManager
    async fn manager_next_validator(&self) -> Result<Address>;
    async fn in_jail(&self, validator: Address) -> Result<bool>;
    async fn validator_status(&self, validator: Address) -> Result<ValidatorStatus>;

    // AssetManager
    async fn bond_amount(&self) -> Result<U256>;
    async fn kro_not_bonded(&self, validator: Address) -> Result<U256>;

    // SecurityCouncil
    async fn is_transaction_confirmed(&self, transaction_id: U256) -> Result<bool>;
    async fn is_transaction_executed(&self, transaction_id: U256) -> Result<bool>;

    /// Returns the logs matching `filter`.
    async fn filter_logs(&self, filter: LogFilter) -> Result<Vec<Log>>;

    /// Returns the number of the L1 head block.
    async fn block_number(&self) -> Result<u64>;

    /// Estimates the gas `candidate` would use when sent from `from`.
    async fn estimate_gas(
        &self,
        from: Address,
        candidate: &TxCandidate,
        caps: GasPriceCaps,
    ) -> Result<u64>;
}

/// The rollup node's view of the L2 chain.
#[async_trait::async_trait]
pub trait RollupStatusSource: Send + Sync {
    async fn sync_status(&self) -> Result<SyncStatus>;
    async fn output_at_block(&self, block_number: u64) -> Result<OutputResponse>;
    async fn output_with_proof_at_block(&self, block_number: u64)
        -> Result<OutputWithProofResponse>;
}

/// Source of L2 execution traces fed to the prover.
#[async_trait::async_trait]
pub trait L2TraceSource: Send + Sync {
    async fn block_trace(&self, block_number: u64) -> Result<serde_json::Value>;
}

/// Fetches a zkEVM proof for a block trace.
#[async_trait::async_trait]
pub trait ProofFetcher: Send + Sync {
    async fn fetch_proof_and_pair(&self, trace: &str) -> Result<ProofAndPair>;
}

/// Signs, sends and confirms transactions for the validator's account.
#[async_trait::async_trait]
pub trait TxManager: Send + Sync {
    /// Returns the account transactions are sent from.
    fn from(&self) -> Address;

    /// Sends `candidate` and waits for its receipt.
    async fn send_transaction(&self, candidate: TxCandidate) -> Result<TxReceipt>;

    async fn suggest_gas_price_caps(&self) -> Result<GasPriceCaps>;
}

/// The external services a role is built from. The prover is only needed when this validator opens challenges.
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainReader>,
    pub rollup: Arc<dyn RollupStatusSource>,
    pub l2: Arc<dyn L2TraceSource>,
    pub prover: Option<Arc<dyn ProofFetcher>>,
    pub txmgr: Arc<dyn TxManager>,
}

/// `Option<u64>` as an optional hex quantity.
mod quantity_opt {
    use alloy_primitives::U64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        value.map(U64::from).serialize(s)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(Option::<U64>::deserialize(d)?.map(|v| v.to::<u64>()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn log(address: Address, topics: Vec<B256>) -> Log {
        Log {
            address,
            topics,
            data: Bytes::new(),
            block_number: Some(1),
        }
    }

    #[test]
    fn filter_matches_positional_topics() {
        let colosseum = Address::repeat_byte(0xc0);
        let event = B256::repeat_byte(0x01);
        let index = B256::from(U256::from(7));
        let filter = LogFilter {
            from_block: 1,
            to_block: 10,
            addresses: vec![colosseum],
            topics: vec![vec![event], vec![index]],
        };

        assert!(filter.matches(&log(colosseum, vec![event, index])));
        assert!(!filter.matches(&log(colosseum, vec![event, B256::from(U256::from(8))])));
        assert!(!filter.matches(&log(colosseum, vec![event])));
        assert!(!filter.matches(&log(Address::ZERO, vec![event, index])));
    }

    #[test]
    fn decode_rpc_log() {
        let raw = r#"{
            "address": "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0",
            "topics": ["0x0101010101010101010101010101010101010101010101010101010101010101"],
            "data": "0x",
            "blockNumber": "0x1a",
            "logIndex": "0x0"
        }"#;
        let log: Log = serde_json::from_str(raw).unwrap();
        assert_eq!(log.block_number, Some(26));
        assert_eq!(log.topics.len(), 1);
    }

    #[test]
    fn fee_cap_doubles_base_fee() {
        let caps = GasPriceCaps {
            tip_cap: U256::from(2),
            base_fee: U256::from(10),
        };
        assert_eq!(caps.fee_cap(), U256::from(22));
    }
}
