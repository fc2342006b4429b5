//! The [OutputSubmitter] role. It submits the next checkpoint output to the L2OutputOracle whenever this validator
//! may join the current submission round, and otherwise sleeps until the round it can join comes up.

use crate::{
    bindings::IL2OutputOracle,
    bond::has_sufficient_bond,
    config::{ChainParams, ValidatorConfig},
    error::with_timeout,
    metrics,
    task::{retry_until_ok, send_checked, STARTUP_RETRY_INTERVAL},
    traits::{AccessListItem, ChainReader, Collaborators, RollupStatusSource, TxCandidate, TxManager},
    DisputeError,
};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use balin_primitives::{OutputResponse, RoundInfo, OUTPUT_VERSION_V0};
use std::{sync::Arc, time::Duration};
use tokio::{select, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, info_span, warn, Instrument};

/// Returns how long to wait for the L2 chain to move from `current` to `target`, or [None] if it is already past it.
pub fn wait_for_blocks(target: u64, current: u64, l2_block_time: u64) -> Option<Duration> {
    let blocks = target.checked_sub(current)?;
    Some(Duration::from_secs(blocks.saturating_mul(l2_block_time)))
}

#[derive(Clone)]
struct Inner {
    config: Arc<ValidatorConfig>,
    params: ChainParams,
    chain: Arc<dyn ChainReader>,
    rollup: Arc<dyn RollupStatusSource>,
    txmgr: Arc<dyn TxManager>,
    cancel: CancellationToken,
}

impl Inner {
    fn me(&self) -> Address {
        self.txmgr.from()
    }

    fn timeout(&self) -> Duration {
        self.config.network_timeout
    }

    fn retry_interval(&self) -> Duration {
        self.config.output_submitter_retry_interval
    }

    async fn submission_loop(&self) {
        let mut delay = Duration::ZERO;
        loop {
            select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }
            delay = select! {
                biased;
                _ = self.cancel.cancelled() => return,
                delay = self.try_submit() => delay,
            };
            debug!(?delay, "next submission attempt scheduled");
        }
    }

    /// Makes one submission attempt and returns the delay before the next one.
    async fn try_submit(&self) -> Duration {
        let next = async {
            let block = with_timeout(self.timeout(), self.chain.next_block_number())
                .await
                .context("failed to read the next block number")?;
            let index = with_timeout(self.timeout(), self.chain.next_output_index())
                .await
                .context("failed to read the next output index")?;
            anyhow::Ok((block, index))
        };
        let (next_block, next_index) = match next.await {
            Ok(next) => next,
            Err(err) => {
                warn!("{err:?}");
                return self.retry_interval();
            }
        };

        let wait = self.calculate_wait_time(next_block, next_index).await;
        if !wait.is_zero() {
            info!(next_block, next_index, ?wait, "waiting before submitting output");
            return wait;
        }

        match self.can_submit(next_index).await {
            Ok(true) => {}
            Ok(false) => return self.retry_interval(),
            Err(err) => {
                warn!("{err:?}");
                return self.retry_interval();
            }
        }

        match self
            .submit(next_block, next_index)
            .instrument(info_span!("submission", output_index = next_index, l2_block_number = next_block))
            .await
        {
            Ok(()) => Duration::ZERO,
            Err(err) => {
                warn!("failed to submit output: {err:?}");
                self.retry_interval()
            }
        }
    }

    /// Returns how long to wait before trying to submit the output at `next_block`. Failed reads wait the retry
    /// interval.
    async fn calculate_wait_time(&self, next_block: u64, next_index: u64) -> Duration {
        match has_sufficient_bond(self.chain.as_ref(), &self.params, self.me(), next_index, self.timeout()).await {
            Ok(true) => {}
            Ok(false) => return self.retry_interval(),
            Err(err) => {
                warn!("{err:?}");
                return self.retry_interval();
            }
        }

        let current = match with_timeout(self.timeout(), self.rollup.sync_status()).await {
            Ok(status) => status.current_l2(self.config.allow_non_finalized),
            Err(err) => {
                warn!("failed to read sync status: {err:?}");
                return self.retry_interval();
            }
        };
        let buffer = self.config.output_submitter_round_buffer;

        // The output at `next_block` is only safe to submit once the block after it exists.
        if current < next_block + 1 {
            let target = next_block + buffer.max(1);
            return self.wait_until(target, current);
        }

        let round = match self.fetch_round(next_index).await {
            Ok(round) => round,
            Err(err) => {
                warn!("{err:?}");
                return self.retry_interval();
            }
        };
        if !round.can_join_round() {
            let target = next_block + (self.params.submission_interval / 2).saturating_sub(buffer);
            return self.wait_until(target, current);
        }
        Duration::ZERO
    }

    fn wait_until(&self, target: u64, current: u64) -> Duration {
        wait_for_blocks(target, current, self.params.l2_block_time).unwrap_or_else(|| self.retry_interval())
    }

    /// Reads the priority validator of the round `next_index` belongs to.
    async fn fetch_round(&self, next_index: u64) -> Result<RoundInfo> {
        let next_validator = if self.params.is_pool_terminated(next_index) {
            with_timeout(self.timeout(), self.chain.manager_next_validator())
                .await
                .context("failed to read the next validator from the ValidatorManager")?
        } else {
            with_timeout(self.timeout(), self.chain.pool_next_validator())
                .await
                .context("failed to read the next validator from the ValidatorPool")?
        };
        metrics::record_next_validator(next_validator);
        Ok(RoundInfo::from_slot(
            next_validator,
            self.me(),
            self.config.output_submitter_allow_public_round,
        ))
    }

    async fn can_submit(&self, next_index: u64) -> Result<bool> {
        if !has_sufficient_bond(self.chain.as_ref(), &self.params, self.me(), next_index, self.timeout()).await? {
            return Ok(false);
        }
        let round = self.fetch_round(next_index).await?;
        if !round.can_join_round() {
            info!(?round, "cannot join the current round");
            return Ok(false);
        }
        Ok(true)
    }

    /// Reads the local output at `next_block`, checking it is the one the oracle expects.
    async fn fetch_output(&self, next_block: u64) -> Result<OutputResponse> {
        let output = with_timeout(self.timeout(), self.rollup.output_at_block(next_block))
            .await
            .with_context(|| format!("failed to fetch output at block {next_block}"))?;
        if output.version != OUTPUT_VERSION_V0 {
            return Err(DisputeError::ProtocolInvariant(format!(
                "unsupported output version {}",
                output.version
            ))
            .into());
        }
        if output.block_ref.number != next_block {
            return Err(DisputeError::ProtocolInvariant(format!(
                "rollup node returned block {} for output at block {next_block}",
                output.block_ref.number
            ))
            .into());
        }
        Ok(output)
    }

    async fn submit(&self, next_block: u64, next_index: u64) -> Result<()> {
        let output = self.fetch_output(next_block).await?;
        let mut candidate = submit_l2_output(self.config.contracts.l2_output_oracle, next_block, &output);
        candidate.access_list = access_list(&self.config, &self.params, next_index)?;

        let caps = with_timeout(self.timeout(), self.txmgr.suggest_gas_price_caps())
            .await
            .context("failed to suggest gas price caps")?;
        let estimate = with_timeout(self.timeout(), self.chain.estimate_gas(self.me(), &candidate, caps))
            .await
            .context("failed to estimate gas")?;
        candidate.gas_limit = Some(estimate.saturating_mul(3) / 2);

        let receipt = send_checked(self.txmgr.as_ref(), candidate, "submitL2Output").await?;
        metrics::record_output_submitted(next_block);
        info!(tx_hash = %receipt.tx_hash, output_root = %output.output_root, "submitted output");
        Ok(())
    }
}

/// Builds `L2OutputOracle.submitL2Output` for `output`, anchored to the L1 block the rollup node derived it from.
pub fn submit_l2_output(l2_output_oracle: Address, l2_block_number: u64, output: &OutputResponse) -> TxCandidate {
    let call = IL2OutputOracle::submitL2OutputCall {
        outputRoot: output.output_root,
        l2BlockNumber: U256::from(l2_block_number),
        l1BlockHash: output.status.current_l1.hash,
        l1BlockNumber: U256::from(output.status.current_l1.number),
    };
    TxCandidate::new(l2_output_oracle, call.abi_encode())
}

/// Returns the storage slots `submitL2Output` touches for `next_index`.
pub fn access_list(config: &ValidatorConfig, params: &ChainParams, next_index: u64) -> Result<Vec<AccessListItem>> {
    let slots = &config.access_list_slots;
    let (address, storage_keys) = if params.is_pool_terminated(next_index) {
        (
            config.contracts.validator_manager,
            [slots.manager_next_priority_validator].into_iter().collect::<Option<Vec<_>>>(),
        )
    } else {
        (
            config.contracts.validator_pool,
            [slots.pool_next_unbond_output_index, slots.pool_next_priority_validator]
                .into_iter()
                .collect::<Option<Vec<_>>>(),
        )
    };
    let storage_keys = storage_keys
        .ok_or_else(|| DisputeError::Config("access list storage slot is not set".to_string()))?;
    Ok(vec![AccessListItem {
        address,
        storage_keys,
    }])
}

/// The [OutputSubmitter] keeps the L2OutputOracle fed with this validator's outputs.
pub struct OutputSubmitter {
    ctx: Inner,
    tracker: TaskTracker,
}

impl OutputSubmitter {
    pub async fn new(
        config: Arc<ValidatorConfig>,
        collaborators: Collaborators,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let Collaborators {
            chain,
            rollup,
            txmgr,
            ..
        } = collaborators;
        let params = retry_until_ok(cancel, STARTUP_RETRY_INTERVAL, "reading chain parameters", || {
            ChainParams::fetch(chain.as_ref(), config.network_timeout)
        })
        .await?;
        Ok(Self {
            ctx: Inner {
                config,
                params,
                chain,
                rollup,
                txmgr,
                cancel: cancel.child_token(),
            },
            tracker: TaskTracker::new(),
        })
    }

    pub async fn start(&self) -> Result<()> {
        info!(validator = %self.ctx.me(), "starting output submitter");
        let ctx = self.ctx.clone();
        self.tracker.spawn(async move { ctx.submission_loop().await });
        Ok(())
    }

    pub async fn stop(&self) {
        info!("stopping output submitter");
        self.ctx.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
