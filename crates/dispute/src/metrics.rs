//! Metric names and recorders. No exporter is installed by this crate; the embedding binary decides where the
//! `metrics` facade reports to.

use alloy_primitives::{Address, U256};
use balin_primitives::ValidatorStatus;

/// Gauge: unbonded deposit of this validator, in wei.
pub const UNBONDED_DEPOSIT_WEI: &str = "balin_validator_unbonded_deposit_wei";

/// Gauge: set to 1 for the next priority validator, labelled with `address`.
pub const NEXT_VALIDATOR: &str = "balin_validator_next_validator";

/// Gauge: the last output index the challenger has scheduled for validation.
pub const CHALLENGE_CHECKPOINT: &str = "balin_validator_challenge_checkpoint";

/// Gauge: status of this validator in the ValidatorManager.
pub const VALIDATOR_STATUS: &str = "balin_validator_status";

/// Counter: total number of outputs submitted by this validator.
pub const OUTPUTS_SUBMITTED_TOTAL: &str = "balin_validator_outputs_submitted_total";

/// Gauge: L2 block number of the last output submitted by this validator.
pub const LAST_SUBMITTED_L2_BLOCK: &str = "balin_validator_last_submitted_l2_block";

/// Label key for addresses.
pub const LABEL_ADDRESS: &str = "address";

pub fn record_unbonded_deposit(amount: U256) {
    metrics::gauge!(UNBONDED_DEPOSIT_WEI).set(u256_to_f64(amount));
}

pub fn record_next_validator(next: Address) {
    metrics::gauge!(NEXT_VALIDATOR, LABEL_ADDRESS => next.to_string()).set(1.0);
}

pub fn record_challenge_checkpoint(checkpoint: u64) {
    metrics::gauge!(CHALLENGE_CHECKPOINT).set(checkpoint as f64);
}

pub fn record_validator_status(status: ValidatorStatus) {
    metrics::gauge!(VALIDATOR_STATUS).set(status as u8 as f64);
}

/// Records a successful output submission at `l2_block`.
pub fn record_output_submitted(l2_block: u64) {
    metrics::counter!(OUTPUTS_SUBMITTED_TOTAL).increment(1);
    metrics::gauge!(LAST_SUBMITTED_L2_BLOCK).set(l2_block as f64);
}

/// Lossy conversion for gauges. Values above `u128::MAX` saturate.
fn u256_to_f64(value: U256) -> f64 {
    u128::try_from(value).unwrap_or(u128::MAX) as f64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wei_gauge_conversion() {
        assert_eq!(u256_to_f64(U256::from(10u64).pow(U256::from(18))), 1e18);
        assert_eq!(u256_to_f64(U256::MAX), u128::MAX as f64);
    }
}
