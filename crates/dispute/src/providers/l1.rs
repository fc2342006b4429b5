//! A [ChainReader] backed by an L1 execution client. Contract reads go through `eth_call` with calldata produced by
//! the typed bindings.

use super::rpc::JsonRpcClient;
use crate::{
    bindings::{
        self, IAssetManager, IColosseum, IL2OutputOracle, ISecurityCouncil, IValidatorManager,
        IValidatorPool,
    },
    config::ContractAddresses,
    traits::{AccessListItem, ChainReader, GasPriceCaps, Log, LogFilter, TxCandidate},
    DisputeError,
};
use alloy_primitives::{Address, Bytes, U256, U64};
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use balin_primitives::{Challenge, ChallengeStatus, CheckpointOutput, ValidatorStatus};
use serde::Serialize;
use serde_json::{json, Value};

/// Converts a contract integer into a `u64`, failing on overflow.
fn to_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| DisputeError::ProtocolInvariant(format!("{what} {value} overflows u64")).into())
}

fn into_challenge(raw: bindings::Challenge) -> Result<Challenge> {
    Ok(Challenge {
        turn: raw.turn,
        timeout_at: raw.timeoutAt,
        asserter: raw.asserter,
        challenger: raw.challenger,
        segments: raw.segments,
        seg_size: to_u64(raw.segSize, "segment size")?,
        seg_start: to_u64(raw.segStart, "segment start")?,
        l1_head: raw.l1Head,
    })
}

fn into_checkpoint_output(raw: bindings::CheckpointOutput) -> Result<CheckpointOutput> {
    Ok(CheckpointOutput {
        submitter: raw.submitter,
        output_root: raw.outputRoot,
        timestamp: u64::try_from(raw.timestamp)?,
        l2_block_number: u64::try_from(raw.l2BlockNumber)?,
    })
}

/// The `eth_call`/`eth_estimateGas` transaction object.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: &'a Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_priority_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "no_access_list")]
    access_list: &'a [AccessListItem],
}

fn no_access_list(items: &&[AccessListItem]) -> bool {
    items.is_empty()
}

/// Renders a [LogFilter] as an `eth_getLogs` filter object. Empty topic positions become wildcards.
fn log_filter_params(filter: &LogFilter) -> Value {
    let topics: Vec<Value> = filter
        .topics
        .iter()
        .map(|accepted| {
            if accepted.is_empty() {
                Value::Null
            } else {
                json!(accepted)
            }
        })
        .collect();
    json!([{
        "fromBlock": U64::from(filter.from_block),
        "toBlock": U64::from(filter.to_block),
        "address": filter.addresses,
        "topics": topics,
    }])
}

/// The [L1Provider] reads the validator's L1 contracts.
#[derive(Debug, Clone)]
pub struct L1Provider {
    rpc: JsonRpcClient,
    contracts: ContractAddresses,
}

impl L1Provider {
    pub fn new(rpc: JsonRpcClient, contracts: ContractAddresses) -> Self {
        Self { rpc, contracts }
    }

    async fn call<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return> {
        let data = Bytes::from(call.abi_encode());
        let request = CallRequest {
            from: None,
            to,
            data: &data,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            access_list: &[],
        };
        let output: Bytes = self
            .rpc
            .request("eth_call", json!([request, "latest"]))
            .await?;
        C::abi_decode_returns(&output, true)
            .map_err(|e| DisputeError::Rpc(format!("failed to decode {} returns: {e}", C::SIGNATURE)).into())
    }

    async fn oracle<C: SolCall>(&self, call: C) -> Result<C::Return> {
        self.call(self.contracts.l2_output_oracle, call).await
    }

    async fn colosseum<C: SolCall>(&self, call: C) -> Result<C::Return> {
        self.call(self.contracts.colosseum, call).await
    }
}

#[async_trait::async_trait]
impl ChainReader for L1Provider {
    async fn submission_interval(&self) -> Result<u64> {
        let ret = self.oracle(IL2OutputOracle::SUBMISSION_INTERVALCall {}).await?;
        to_u64(ret._0, "submission interval")
    }

    async fn l2_block_time(&self) -> Result<u64> {
        let ret = self.oracle(IL2OutputOracle::L2_BLOCK_TIMECall {}).await?;
        to_u64(ret._0, "L2 block time")
    }

    async fn finalization_period_seconds(&self) -> Result<u64> {
        let ret = self.oracle(IL2OutputOracle::FINALIZATION_PERIOD_SECONDSCall {}).await?;
        to_u64(ret._0, "finalization period")
    }

    async fn next_output_index(&self) -> Result<u64> {
        let ret = self.oracle(IL2OutputOracle::nextOutputIndexCall {}).await?;
        to_u64(ret._0, "next output index")
    }

    async fn next_block_number(&self) -> Result<u64> {
        let ret = self.oracle(IL2OutputOracle::nextBlockNumberCall {}).await?;
        to_u64(ret._0, "next block number")
    }

    async fn latest_block_number(&self) -> Result<u64> {
        let ret = self.oracle(IL2OutputOracle::latestBlockNumberCall {}).await?;
        to_u64(ret._0, "latest block number")
    }

    async fn l2_output(&self, output_index: u64) -> Result<CheckpointOutput> {
        let ret = self
            .oracle(IL2OutputOracle::getL2OutputCall {
                l2OutputIndex: U256::from(output_index),
            })
            .await?;
        into_checkpoint_output(ret._0)
    }

    async fn l2_output_index_after(&self, l2_block_number: u64) -> Result<u64> {
        let ret = self
            .oracle(IL2OutputOracle::getL2OutputIndexAfterCall {
                l2BlockNumber: U256::from(l2_block_number),
            })
            .await?;
        to_u64(ret._0, "output index")
    }

    async fn is_output_finalized(&self, output_index: u64) -> Result<bool> {
        let ret = self
            .oracle(IL2OutputOracle::isFinalizedCall {
                outputIndex: U256::from(output_index),
            })
            .await?;
        Ok(ret._0)
    }

    async fn creation_period_seconds(&self) -> Result<u64> {
        let ret = self.colosseum(IColosseum::CREATION_PERIOD_SECONDSCall {}).await?;
        to_u64(ret._0, "creation period")
    }

    async fn segments_length(&self, turn_index: u64) -> Result<u64> {
        let ret = self
            .colosseum(IColosseum::segmentsLengthsCall {
                turnIndex: U256::from(turn_index),
            })
            .await?;
        to_u64(ret._0, "segments length")
    }

    async fn challenge(&self, output_index: u64, challenger: Address) -> Result<Challenge> {
        let ret = self
            .colosseum(IColosseum::getChallengeCall {
                outputIndex: U256::from(output_index),
                challenger,
            })
            .await?;
        into_challenge(ret._0)
    }

    async fn challenge_status(&self, output_index: u64, challenger: Address) -> Result<ChallengeStatus> {
        let ret = self
            .colosseum(IColosseum::getStatusCall {
                outputIndex: U256::from(output_index),
                challenger,
            })
            .await?;
        ChallengeStatus::try_from(ret._0)
    }

    async fn is_in_creation_period(&self, output_index: u64) -> Result<bool> {
        let ret = self
            .colosseum(IColosseum::isInCreationPeriodCall {
                outputIndex: U256::from(output_index),
            })
            .await?;
        Ok(ret._0)
    }

    async fn required_bond_amount(&self) -> Result<U256> {
        let ret = self
            .call(self.contracts.validator_pool, IValidatorPool::REQUIRED_BOND_AMOUNTCall {})
            .await?;
        Ok(ret._0)
    }

    async fn terminate_output_index(&self) -> Result<u64> {
        let ret = self
            .call(self.contracts.validator_pool, IValidatorPool::TERMINATE_OUTPUT_INDEXCall {})
            .await?;
        // Pools that never terminate report `type(uint256).max`.
        Ok(u64::try_from(ret._0).unwrap_or(u64::MAX))
    }

    async fn pool_balance_of(&self, validator: Address) -> Result<U256> {
        let ret = self
            .call(
                self.contracts.validator_pool,
                IValidatorPool::balanceOfCall { account: validator },
            )
            .await?;
        Ok(ret._0)
    }

    async fn pool_next_validator(&self) -> Result<Address> {
        let ret = self
            .call(self.contracts.validator_pool, IValidatorPool::nextValidatorCall {})
            .await?;
        Ok(ret._0)
    }

    async fn manager_next_validator(&self) -> Result<Address> {
        let ret = self
            .call(self.contracts.validator_manager, IValidatorManager::nextValidatorCall {})
            .await?;
        Ok(ret._0)
    }

    async fn in_jail(&self, validator: Address) -> Result<bool> {
        let ret = self
            .call(
                self.contracts.validator_manager,
                IValidatorManager::inJailCall { validator },
            )
            .await?;
        Ok(ret._0)
    }

    async fn validator_status(&self, validator: Address) -> Result<ValidatorStatus> {
        let ret = self
            .call(
                self.contracts.validator_manager,
                IValidatorManager::getStatusCall { validator },
            )
            .await?;
        ValidatorStatus::try_from(ret._0)
    }

    async fn bond_amount(&self) -> Result<U256> {
        let ret = self
            .call(self.contracts.asset_manager, IAssetManager::BOND_AMOUNTCall {})
            .await?;
        Ok(U256::from(ret._0))
    }

    async fn kro_not_bonded(&self, validator: Address) -> Result<U256> {
        let ret = self
            .call(
                self.contracts.asset_manager,
                IAssetManager::totalValidatorKroNotBondedCall { validator },
            )
            .await?;
        Ok(U256::from(ret._0))
    }

    async fn is_transaction_confirmed(&self, transaction_id: U256) -> Result<bool> {
        let ret = self
            .call(
                self.contracts.security_council,
                ISecurityCouncil::isConfirmedCall {
                    transactionId: transaction_id,
                },
            )
            .await?;
        Ok(ret._0)
    }

    async fn is_transaction_executed(&self, transaction_id: U256) -> Result<bool> {
        let ret = self
            .call(
                self.contracts.security_council,
                ISecurityCouncil::transactionsCall {
                    transactionId: transaction_id,
                },
            )
            .await?;
        Ok(ret.executed)
    }

    async fn filter_logs(&self, filter: LogFilter) -> Result<Vec<Log>> {
        self.rpc
            .request("eth_getLogs", log_filter_params(&filter))
            .await
            .with_context(|| format!("failed to get logs in [{}, {}]", filter.from_block, filter.to_block))
    }

    async fn block_number(&self) -> Result<u64> {
        let n: U64 = self.rpc.request("eth_blockNumber", ()).await?;
        Ok(n.to::<u64>())
    }

    async fn estimate_gas(&self, from: Address, candidate: &TxCandidate, caps: GasPriceCaps) -> Result<u64> {
        let request = CallRequest {
            from: Some(from),
            to: candidate.to,
            data: &candidate.data,
            max_fee_per_gas: Some(caps.fee_cap()),
            max_priority_fee_per_gas: Some(caps.tip_cap),
            access_list: &candidate.access_list,
        };
        let gas: U64 = self.rpc.request("eth_estimateGas", json!([request])).await?;
        Ok(gas.to::<u64>())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn log_filter_uses_wildcards() {
        let filter = LogFilter {
            from_block: 10,
            to_block: 26,
            addresses: vec![Address::repeat_byte(0xc0)],
            topics: vec![vec![B256::repeat_byte(1)], vec![]],
        };
        let params = log_filter_params(&filter);
        assert_eq!(params[0]["fromBlock"], "0xa");
        assert_eq!(params[0]["toBlock"], "0x1a");
        assert!(params[0]["topics"][1].is_null());
        assert_eq!(params[0]["topics"][0].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn call_request_omits_empty_fields() {
        let data = Bytes::from_static(&[0x12, 0x34]);
        let request = CallRequest {
            from: None,
            to: Address::repeat_byte(0x10),
            data: &data,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            access_list: &[],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["data"], "0x1234");
        assert!(value.get("from").is_none());
        assert!(value.get("accessList").is_none());
    }

    #[test]
    fn challenge_conversion_checks_ranges() {
        let raw = bindings::Challenge {
            turn: 2,
            timeoutAt: 10,
            asserter: Address::repeat_byte(1),
            challenger: Address::repeat_byte(2),
            segments: vec![B256::ZERO; 4],
            segSize: U256::from(33),
            segStart: U256::from(633),
            l1Head: B256::ZERO,
        };
        let challenge = into_challenge(raw.clone()).unwrap();
        assert_eq!(challenge.seg_start, 633);
        assert_eq!(challenge.segments().block_numbers(), vec![633, 644, 655, 666]);

        let overflowing = bindings::Challenge {
            segStart: U256::MAX,
            ..raw
        };
        assert!(into_challenge(overflowing).is_err());
    }
}
