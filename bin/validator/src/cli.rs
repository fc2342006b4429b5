//! Command line arguments. Every option can also be set through a `BALIN_` environment variable.

use alloy_primitives::{Address, B256};
use anyhow::Result;
use balin_dispute::{
    config::{AccessListSlots, ContractAddresses, ValidatorConfig},
    DisputeError,
};
use clap::{ArgAction, Parser};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Submits outputs, challenges invalid ones and guards the SecurityCouncil for a ZK fault proof rollup.
#[derive(Debug, Clone, Parser)]
#[command(name = "balin-validator", version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (0-4). Ignored when `RUST_LOG` is set.
    #[arg(short, long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,

    /// L1 execution client RPC endpoint.
    #[arg(long, env = "BALIN_L1_ETH_RPC", value_parser = parse_url)]
    pub l1_eth_rpc: Url,
    /// L2 execution client RPC endpoint, used for block traces.
    #[arg(long, env = "BALIN_L2_ETH_RPC", value_parser = parse_url)]
    pub l2_eth_rpc: Url,
    /// Rollup node RPC endpoint.
    #[arg(long, env = "BALIN_ROLLUP_RPC", value_parser = parse_url)]
    pub rollup_rpc: Url,
    /// zkEVM prover RPC endpoint. Required with `--challenger-enabled`.
    #[arg(long, env = "BALIN_PROVER_RPC", value_parser = parse_url)]
    pub prover_rpc: Option<Url>,
    /// Account the L1 node signs transactions for.
    #[arg(long, env = "BALIN_FROM", value_parser = parse_address)]
    pub from: Address,

    #[arg(long, env = "BALIN_L2OO_ADDRESS", value_parser = parse_address)]
    pub l2oo_address: Address,
    #[arg(long, env = "BALIN_COLOSSEUM_ADDRESS", value_parser = parse_address)]
    pub colosseum_address: Address,
    #[arg(long, env = "BALIN_SECURITY_COUNCIL_ADDRESS", value_parser = parse_address)]
    pub security_council_address: Address,
    #[arg(long, env = "BALIN_VALPOOL_ADDRESS", value_parser = parse_address)]
    pub valpool_address: Address,
    #[arg(long, env = "BALIN_VALMGR_ADDRESS", value_parser = parse_address)]
    pub valmgr_address: Address,
    #[arg(long, env = "BALIN_ASSET_MANAGER_ADDRESS", value_parser = parse_address)]
    pub asset_manager_address: Address,

    #[arg(long, env = "BALIN_OUTPUT_SUBMITTER_ENABLED")]
    pub output_submitter_enabled: bool,
    #[arg(long, env = "BALIN_CHALLENGER_ENABLED")]
    pub challenger_enabled: bool,
    #[arg(long, env = "BALIN_GUARDIAN_ENABLED")]
    pub guardian_enabled: bool,

    /// Submit outputs in public rounds too.
    #[arg(long, env = "BALIN_OUTPUT_SUBMITTER_ALLOW_PUBLIC_ROUND")]
    pub output_submitter_allow_public_round: bool,
    /// L2 blocks of slack around a round boundary.
    #[arg(long, env = "BALIN_OUTPUT_SUBMITTER_ROUND_BUFFER", default_value_t = 30)]
    pub output_submitter_round_buffer: u64,
    /// Seconds to wait after a failed submission attempt.
    #[arg(long, env = "BALIN_OUTPUT_SUBMITTER_RETRY_INTERVAL", default_value_t = 60)]
    pub output_submitter_retry_interval: u64,
    /// Act on the safe L2 head instead of the finalized one.
    #[arg(long, env = "BALIN_ALLOW_NON_FINALIZED")]
    pub allow_non_finalized: bool,

    /// Seconds between polls of a challenge this validator is party to.
    #[arg(long, env = "BALIN_CHALLENGER_POLL_INTERVAL", default_value_t = 12)]
    pub challenger_poll_interval: u64,
    /// Seconds between guardian inspector passes.
    #[arg(long, env = "BALIN_GUARDIAN_POLL_INTERVAL", default_value_t = 60)]
    pub guardian_poll_interval: u64,
    /// Seconds between L1 log polls.
    #[arg(long, env = "BALIN_L1_POLL_INTERVAL", default_value_t = 12)]
    pub l1_poll_interval: u64,
    /// Seconds allowed for a single RPC request.
    #[arg(long, env = "BALIN_NETWORK_TIMEOUT", default_value_t = 10)]
    pub network_timeout: u64,
    /// Seconds allowed for a single prover request.
    #[arg(long, env = "BALIN_FETCHING_PROOF_TIMEOUT", default_value_t = 3600)]
    pub fetching_proof_timeout: u64,

    /// Storage slot of `ValidatorPool.nextUnbondOutputIndex`.
    #[arg(long, env = "BALIN_SLOT_POOL_NEXT_UNBOND_OUTPUT_INDEX", value_parser = parse_b256)]
    pub slot_pool_next_unbond_output_index: Option<B256>,
    /// Storage slot of `ValidatorPool.nextPriorityValidator`.
    #[arg(long, env = "BALIN_SLOT_POOL_NEXT_PRIORITY_VALIDATOR", value_parser = parse_b256)]
    pub slot_pool_next_priority_validator: Option<B256>,
    /// Storage slot of `ValidatorManager._nextPriorityValidator`.
    #[arg(long, env = "BALIN_SLOT_MANAGER_NEXT_PRIORITY_VALIDATOR", value_parser = parse_b256)]
    pub slot_manager_next_priority_validator: Option<B256>,
}

impl Cli {
    /// Converts the arguments into a checked [ValidatorConfig].
    pub fn validator_config(&self) -> Result<ValidatorConfig, DisputeError> {
        if self.challenger_enabled && self.prover_rpc.is_none() {
            return Err(DisputeError::Config(
                "--prover-rpc is required with --challenger-enabled".to_string(),
            ));
        }
        let config = ValidatorConfig {
            contracts: ContractAddresses {
                l2_output_oracle: self.l2oo_address,
                colosseum: self.colosseum_address,
                security_council: self.security_council_address,
                validator_pool: self.valpool_address,
                validator_manager: self.valmgr_address,
                asset_manager: self.asset_manager_address,
            },
            network_timeout: Duration::from_secs(self.network_timeout),
            fetching_proof_timeout: Duration::from_secs(self.fetching_proof_timeout),
            challenge_poll_interval: Duration::from_secs(self.challenger_poll_interval),
            guardian_poll_interval: Duration::from_secs(self.guardian_poll_interval),
            l1_poll_interval: Duration::from_secs(self.l1_poll_interval),
            output_submitter_retry_interval: Duration::from_secs(self.output_submitter_retry_interval),
            output_submitter_round_buffer: self.output_submitter_round_buffer,
            output_submitter_allow_public_round: self.output_submitter_allow_public_round,
            allow_non_finalized: self.allow_non_finalized,
            output_submitter_enabled: self.output_submitter_enabled,
            challenger_enabled: self.challenger_enabled,
            guardian_enabled: self.guardian_enabled,
            access_list_slots: AccessListSlots {
                pool_next_unbond_output_index: self.slot_pool_next_unbond_output_index,
                pool_next_priority_validator: self.slot_pool_next_priority_validator,
                manager_next_priority_validator: self.slot_manager_next_priority_validator,
            },
            ..Default::default()
        };
        config.check()?;
        Ok(config)
    }

    /// Builds the log filter. `RUST_LOG` wins over `-v`.
    pub fn env_filter(&self) -> EnvFilter {
        let level = match self.verbosity {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    }
}

fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    Url::parse(s)
}

fn parse_address(s: &str) -> Result<Address, alloy_primitives::hex::FromHexError> {
    s.parse()
}

fn parse_b256(s: &str) -> Result<B256, alloy_primitives::hex::FromHexError> {
    s.parse()
}

#[cfg(test)]
mod test {
    use super::*;

    const ADDRESSES: [(&str, &str); 6] = [
        ("--l2oo-address", "0x1010101010101010101010101010101010101010"),
        ("--colosseum-address", "0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0"),
        ("--security-council-address", "0x5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c5c"),
        ("--valpool-address", "0x9090909090909090909090909090909090909090"),
        ("--valmgr-address", "0x9191919191919191919191919191919191919191"),
        ("--asset-manager-address", "0x9292929292929292929292929292929292929292"),
    ];

    fn args(extra: &[&str]) -> Vec<String> {
        let mut args = vec![
            "balin-validator",
            "--l1-eth-rpc",
            "http://localhost:8545",
            "--l2-eth-rpc",
            "http://localhost:9545",
            "--rollup-rpc",
            "http://localhost:7545",
            "--from",
            "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1",
        ];
        for (flag, value) in ADDRESSES {
            args.push(flag);
            args.push(value);
        }
        args.extend_from_slice(extra);
        args.into_iter().map(String::from).collect()
    }

    #[test]
    fn guardian_only_config() {
        let cli = Cli::try_parse_from(args(&["--guardian-enabled", "--guardian-poll-interval", "30", "-vv"])).unwrap();
        assert_eq!(cli.verbosity, 2);

        let config = cli.validator_config().unwrap();
        assert!(config.guardian_enabled);
        assert!(!config.challenger_enabled);
        assert_eq!(config.guardian_poll_interval, Duration::from_secs(30));
        assert_eq!(config.contracts.colosseum, Address::repeat_byte(0xc0));
        assert_eq!(config.network_timeout, Duration::from_secs(10));
    }

    #[test]
    fn challenger_needs_a_prover() {
        let cli = Cli::try_parse_from(args(&["--challenger-enabled"])).unwrap();
        assert!(cli.validator_config().is_err());

        let cli = Cli::try_parse_from(args(&["--challenger-enabled", "--prover-rpc", "http://localhost:6000"])).unwrap();
        assert!(cli.validator_config().is_ok());
    }

    #[test]
    fn submitter_needs_access_list_slots() {
        let cli = Cli::try_parse_from(args(&["--output-submitter-enabled"])).unwrap();
        assert!(cli.validator_config().is_err());

        let slot = "0x0000000000000000000000000000000000000000000000000000000000000001";
        let cli = Cli::try_parse_from(args(&[
            "--output-submitter-enabled",
            "--slot-pool-next-unbond-output-index",
            slot,
            "--slot-pool-next-priority-validator",
            slot,
            "--slot-manager-next-priority-validator",
            slot,
        ]))
        .unwrap();
        assert_eq!(
            cli.validator_config().unwrap().access_list_slots.manager_next_priority_validator,
            Some(B256::with_last_byte(1))
        );
    }

    #[test]
    fn malformed_address_is_rejected() {
        let mut raw = args(&["--guardian-enabled"]);
        let position = raw.iter().position(|a| a == "--from").unwrap();
        raw[position + 1] = "0x1234".to_string();
        assert!(Cli::try_parse_from(raw).is_err());
    }
}
