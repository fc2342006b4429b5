//! Configuration types for the validator roles and the chain parameters they read on start.

use crate::{error::with_timeout, traits::ChainReader, DisputeError};
use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use std::time::Duration;

/// Addresses of the L1 contracts the validator talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractAddresses {
    pub l2_output_oracle: Address,
    pub colosseum: Address,
    pub security_council: Address,
    pub validator_pool: Address,
    pub validator_manager: Address,
    pub asset_manager: Address,
}

impl ContractAddresses {
    fn check(&self) -> Result<(), DisputeError> {
        let named = [
            ("l2-output-oracle", self.l2_output_oracle),
            ("colosseum", self.colosseum),
            ("security-council", self.security_council),
            ("validator-pool", self.validator_pool),
            ("validator-manager", self.validator_manager),
            ("asset-manager", self.asset_manager),
        ];
        match named.iter().find(|(_, address)| address.is_zero()) {
            Some((name, _)) => Err(DisputeError::Config(format!("{name} address is not set"))),
            None => Ok(()),
        }
    }
}

/// Storage slots touched by `submitL2Output`, sent as an access list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessListSlots {
    /// `ValidatorPool.nextUnbondOutputIndex`.
    pub pool_next_unbond_output_index: Option<B256>,
    /// `ValidatorPool.nextPriorityValidator`.
    pub pool_next_priority_validator: Option<B256>,
    /// `ValidatorManager._nextPriorityValidator`.
    pub manager_next_priority_validator: Option<B256>,
}

/// The validated configuration shared by every role.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub contracts: ContractAddresses,
    /// Upper bound on every collaborator read.
    pub network_timeout: Duration,
    /// Upper bound on a single prover request.
    pub fetching_proof_timeout: Duration,
    /// How often the challenger polls a challenge it is party to.
    pub challenge_poll_interval: Duration,
    /// How often the guardian's inspector runs.
    pub guardian_poll_interval: Duration,
    /// How often log watchers poll L1 for new events.
    pub l1_poll_interval: Duration,
    /// How often the validator re-checks whether the rollup node caught up before starting the roles.
    pub sync_check_interval: Duration,
    pub output_submitter_retry_interval: Duration,
    /// How many L2 blocks around a round boundary the submitter keeps as slack.
    pub output_submitter_round_buffer: u64,
    pub output_submitter_allow_public_round: bool,
    /// Use the safe L2 head instead of the finalized one.
    pub allow_non_finalized: bool,
    pub output_submitter_enabled: bool,
    pub challenger_enabled: bool,
    pub guardian_enabled: bool,
    pub access_list_slots: AccessListSlots,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            contracts: ContractAddresses::default(),
            network_timeout: Duration::from_secs(10),
            fetching_proof_timeout: Duration::from_secs(3600),
            challenge_poll_interval: Duration::from_secs(12),
            guardian_poll_interval: Duration::from_secs(60),
            l1_poll_interval: Duration::from_secs(12),
            sync_check_interval: Duration::from_secs(60),
            output_submitter_retry_interval: Duration::from_secs(60),
            output_submitter_round_buffer: 30,
            output_submitter_allow_public_round: false,
            allow_non_finalized: false,
            output_submitter_enabled: false,
            challenger_enabled: false,
            guardian_enabled: false,
            access_list_slots: AccessListSlots::default(),
        }
    }
}

impl ValidatorConfig {
    /// Ensures the configuration can run at least one role.
    pub fn check(&self) -> Result<(), DisputeError> {
        if !self.output_submitter_enabled && !self.challenger_enabled && !self.guardian_enabled {
            return Err(DisputeError::Config(
                "at least one of the output submitter, challenger or guardian must be enabled"
                    .to_string(),
            ));
        }
        self.contracts.check()?;

        if self.output_submitter_enabled {
            let slots = &self.access_list_slots;
            if slots.pool_next_unbond_output_index.is_none()
                || slots.pool_next_priority_validator.is_none()
                || slots.manager_next_priority_validator.is_none()
            {
                return Err(DisputeError::Config(
                    "the output submitter needs every access list storage slot".to_string(),
                ));
            }
        }

        let intervals = [
            ("network timeout", self.network_timeout),
            ("challenge poll interval", self.challenge_poll_interval),
            ("guardian poll interval", self.guardian_poll_interval),
            ("l1 poll interval", self.l1_poll_interval),
            ("output submitter retry interval", self.output_submitter_retry_interval),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, d)| d.is_zero()) {
            return Err(DisputeError::Config(format!("{name} must be positive")));
        }

        Ok(())
    }
}

/// Chain parameters read from the L1 contracts when a role starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainParams {
    pub submission_interval: u64,
    pub l2_block_time: u64,
    pub finalization_period_seconds: u64,
    pub creation_period_seconds: u64,
    /// Bond required by the ValidatorPool.
    pub required_bond_amount_v1: U256,
    /// Bond required by the AssetManager once the pool is terminated.
    pub required_bond_amount_v2: U256,
    /// Outputs after this index are governed by the ValidatorManager.
    pub terminate_output_index: u64,
}

/// L1 block time used to turn the finalization period into a block window.
pub const L1_BLOCK_TIME: u64 = 12;

impl ChainParams {
    /// Reads every parameter, each bounded by `timeout`.
    pub async fn fetch(chain: &dyn ChainReader, timeout: Duration) -> Result<Self> {
        let params = Self {
            submission_interval: with_timeout(timeout, chain.submission_interval()).await?,
            l2_block_time: with_timeout(timeout, chain.l2_block_time()).await?,
            finalization_period_seconds: with_timeout(
                timeout,
                chain.finalization_period_seconds(),
            )
            .await?,
            creation_period_seconds: with_timeout(timeout, chain.creation_period_seconds())
                .await?,
            required_bond_amount_v1: with_timeout(timeout, chain.required_bond_amount()).await?,
            required_bond_amount_v2: with_timeout(timeout, chain.bond_amount()).await?,
            terminate_output_index: with_timeout(timeout, chain.terminate_output_index()).await?,
        };
        if params.l2_block_time == 0 {
            return Err(
                DisputeError::ProtocolInvariant("L2 block time must be positive".into()).into(),
            );
        }
        Ok(params)
    }

    /// Returns `true` once `output_index` is governed by the ValidatorManager.
    pub fn is_pool_terminated(&self, output_index: u64) -> bool {
        self.terminate_output_index < output_index
    }

    /// Returns the first L1 block of the finalization window ending at `head_l1`, never below 1.
    pub fn finalization_window_start(&self, head_l1: u64) -> u64 {
        head_l1
            .saturating_sub(self.finalization_period_seconds / L1_BLOCK_TIME)
            .max(1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn addresses() -> ContractAddresses {
        ContractAddresses {
            l2_output_oracle: Address::repeat_byte(0x10),
            colosseum: Address::repeat_byte(0x11),
            security_council: Address::repeat_byte(0x12),
            validator_pool: Address::repeat_byte(0x13),
            validator_manager: Address::repeat_byte(0x14),
            asset_manager: Address::repeat_byte(0x15),
        }
    }

    #[test]
    fn requires_a_role() {
        let config = ValidatorConfig {
            contracts: addresses(),
            ..Default::default()
        };
        assert!(matches!(config.check(), Err(DisputeError::Config(_))));
    }

    #[test]
    fn requires_addresses() {
        let mut contracts = addresses();
        contracts.asset_manager = Address::ZERO;
        let config = ValidatorConfig {
            contracts,
            guardian_enabled: true,
            ..Default::default()
        };
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("asset-manager"));
    }

    #[test]
    fn submitter_requires_access_list_slots() {
        let mut config = ValidatorConfig {
            contracts: addresses(),
            output_submitter_enabled: true,
            ..Default::default()
        };
        assert!(config.check().is_err());

        config.access_list_slots = AccessListSlots {
            pool_next_unbond_output_index: Some(B256::from(U256::from(3))),
            pool_next_priority_validator: Some(B256::from(U256::from(4))),
            manager_next_priority_validator: Some(B256::from(U256::from(5))),
        };
        assert!(config.check().is_ok());
    }

    #[test]
    fn finalization_window_is_clamped() {
        let params = ChainParams {
            finalization_period_seconds: 1200,
            ..Default::default()
        };
        assert_eq!(params.finalization_window_start(1000), 900);
        assert_eq!(params.finalization_window_start(50), 1);
    }

    #[test]
    fn pool_termination_boundary() {
        let params = ChainParams {
            terminate_output_index: 10,
            ..Default::default()
        };
        assert!(!params.is_pool_terminated(10));
        assert!(params.is_pool_terminated(11));
    }
}
