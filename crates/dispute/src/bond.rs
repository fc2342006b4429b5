//! The bond check shared by the challenger and the output submitter.

use crate::{config::ChainParams, error::with_timeout, metrics, traits::ChainReader};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use balin_primitives::ValidatorStatus;
use std::time::Duration;
use tracing::{info, warn};

/// Returns `true` if `validator` holds enough unbonded deposit to act on `output_index`.
///
/// Up to the pool's termination index the ValidatorPool deposit is compared against `REQUIRED_BOND_AMOUNT`. After
/// it, the validator must also be out of jail and `Active` in the ValidatorManager, and its unbonded KRO in the
/// AssetManager is compared against `BOND_AMOUNT`.
pub async fn has_sufficient_bond(
    chain: &dyn ChainReader,
    params: &ChainParams,
    validator: Address,
    output_index: u64,
    timeout: Duration,
) -> Result<bool> {
    let (balance, required) = if params.is_pool_terminated(output_index) {
        let jailed = with_timeout(timeout, chain.in_jail(validator))
            .await
            .context("failed to fetch the jail status")?;
        if jailed {
            warn!(%validator, "validator is in jail");
            return Ok(false);
        }

        let status = with_timeout(timeout, chain.validator_status(validator))
            .await
            .context("failed to fetch the validator status")?;
        metrics::record_validator_status(status);
        if status != ValidatorStatus::Active {
            warn!(%validator, ?status, "validator is not active");
            return Ok(false);
        }

        let balance = with_timeout(timeout, chain.kro_not_bonded(validator))
            .await
            .context("failed to fetch unbonded kro")?;
        (balance, params.required_bond_amount_v2)
    } else {
        let balance = with_timeout(timeout, chain.pool_balance_of(validator))
            .await
            .context("failed to fetch deposit amount")?;
        (balance, params.required_bond_amount_v1)
    };
    metrics::record_unbonded_deposit(balance);

    if balance < required {
        warn!(%validator, %balance, %required, "unbonded deposit is less than the required bond");
        return Ok(false);
    }
    info!(%validator, %balance, %required, "unbonded deposit covers the required bond");
    Ok(true)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::providers::mocks::SimulatedChain;
    use alloy_primitives::U256;

    const ME: Address = Address::repeat_byte(0xa1);

    fn params() -> ChainParams {
        ChainParams {
            required_bond_amount_v1: U256::from(100),
            required_bond_amount_v2: U256::from(50),
            terminate_output_index: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pool_deposit_before_termination() {
        let chain = SimulatedChain::default();
        let timeout = Duration::from_secs(1);
        assert!(!has_sufficient_bond(&chain, &params(), ME, 10, timeout).await.unwrap());

        chain.set_pool_balance(ME, U256::from(100)).await;
        assert!(has_sufficient_bond(&chain, &params(), ME, 10, timeout).await.unwrap());
    }

    #[tokio::test]
    async fn manager_rules_after_termination() {
        let chain = SimulatedChain::default();
        let timeout = Duration::from_secs(1);
        chain.set_pool_balance(ME, U256::from(1_000)).await;
        chain.set_kro_not_bonded(ME, U256::from(50)).await;

        // Inactive validators cannot act even with enough KRO.
        assert!(!has_sufficient_bond(&chain, &params(), ME, 11, timeout).await.unwrap());

        chain.set_validator_status(ME, ValidatorStatus::Active).await;
        assert!(has_sufficient_bond(&chain, &params(), ME, 11, timeout).await.unwrap());

        chain.jail(ME).await;
        assert!(!has_sufficient_bond(&chain, &params(), ME, 11, timeout).await.unwrap());
    }
}
