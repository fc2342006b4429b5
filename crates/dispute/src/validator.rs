//! The [Validator] owns the enabled roles. It holds them back until the rollup node has caught up with the
//! L2OutputOracle, then starts them together and stops them together.

use crate::{
    challenger::Challenger,
    config::ValidatorConfig,
    error::with_timeout,
    guardian::Guardian,
    submitter::OutputSubmitter,
    traits::{ChainReader, Collaborators, RollupStatusSource},
};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::{
    select,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Validator {
    config: Arc<ValidatorConfig>,
    chain: Arc<dyn ChainReader>,
    rollup: Arc<dyn RollupStatusSource>,
    cancel: CancellationToken,
    challenger: Option<Challenger>,
    submitter: Option<OutputSubmitter>,
    guardian: Option<Guardian>,
}

impl Validator {
    /// Checks `config` and builds every enabled role.
    ///
    /// The challenger runs whenever the submitter or the challenger is enabled, since a submitter has to defend its
    /// own outputs as their asserter.
    pub async fn new(
        config: ValidatorConfig,
        collaborators: Collaborators,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        config.check()?;
        let config = Arc::new(config);
        let cancel = cancel.child_token();

        let challenger = if config.output_submitter_enabled || config.challenger_enabled {
            Some(
                Challenger::new(config.clone(), collaborators.clone(), &cancel)
                    .await
                    .context("failed to create challenger")?,
            )
        } else {
            None
        };
        let submitter = if config.output_submitter_enabled {
            Some(
                OutputSubmitter::new(config.clone(), collaborators.clone(), &cancel)
                    .await
                    .context("failed to create output submitter")?,
            )
        } else {
            None
        };
        let guardian = if config.guardian_enabled {
            Some(
                Guardian::new(config.clone(), collaborators.clone(), &cancel)
                    .await
                    .context("failed to create guardian")?,
            )
        } else {
            None
        };

        Ok(Self {
            config,
            chain: collaborators.chain,
            rollup: collaborators.rollup,
            cancel,
            challenger,
            submitter,
            guardian,
        })
    }

    /// Waits for the rollup node to catch up, then starts every role.
    pub async fn start(&self) -> Result<()> {
        self.wait_sync_completed().await?;
        if let Some(challenger) = &self.challenger {
            challenger.start().await.context("failed to start challenger")?;
        }
        if let Some(submitter) = &self.submitter {
            submitter.start().await.context("failed to start output submitter")?;
        }
        if let Some(guardian) = &self.guardian {
            guardian.start().await.context("failed to start guardian")?;
        }
        info!("validator started");
        Ok(())
    }

    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(submitter) = &self.submitter {
            submitter.stop().await;
        }
        if let Some(challenger) = &self.challenger {
            challenger.stop().await;
        }
        if let Some(guardian) = &self.guardian {
            guardian.stop().await;
        }
        info!("validator stopped");
    }

    /// Blocks until the rollup node's current L2 head reaches the oracle's latest output block.
    async fn wait_sync_completed(&self) -> Result<()> {
        let mut ticker = interval(self.config.sync_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                biased;
                _ = self.cancel.cancelled() => bail!("stopped before the rollup node caught up"),
                _ = ticker.tick() => {}
            }
            match self.sync_gap().await {
                Ok(None) => {
                    info!("rollup node is in sync with the L2OutputOracle");
                    return Ok(());
                }
                Ok(Some((current, latest))) => {
                    info!(current_l2 = current, latest_output_block = latest, "waiting for the rollup node to sync");
                }
                Err(err) => warn!("failed to check sync progress: {err:?}"),
            }
        }
    }

    /// Returns the rollup head and the oracle's latest block while the rollup node is behind.
    async fn sync_gap(&self) -> Result<Option<(u64, u64)>> {
        let timeout = self.config.network_timeout;
        let status = with_timeout(timeout, self.rollup.sync_status())
            .await
            .context("failed to read sync status")?;
        let current = status.current_l2(self.config.allow_non_finalized);
        let latest = with_timeout(timeout, self.chain.latest_block_number())
            .await
            .context("failed to read the latest output block")?;
        Ok((latest > current).then_some((current, latest)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        providers::mocks::{MockL2, MockRollup, SimulatedChain},
        DisputeError,
    };
    use alloy_primitives::Address;
    use std::time::Duration;
    use tokio::time::sleep;

    const ME: Address = Address::repeat_byte(0x6a);

    fn collaborators(chain: &Arc<SimulatedChain>, rollup: &MockRollup) -> Collaborators {
        Collaborators {
            chain: chain.clone(),
            rollup: Arc::new(rollup.clone()),
            l2: Arc::new(MockL2),
            prover: None,
            txmgr: Arc::new(chain.signer(ME)),
        }
    }

    #[tokio::test]
    async fn refuses_to_run_without_roles() {
        let chain = Arc::new(SimulatedChain::default());
        let config = ValidatorConfig {
            contracts: chain.contracts(),
            ..Default::default()
        };
        let err = Validator::new(config, collaborators(&chain, &MockRollup::honest()), &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err.downcast_ref::<DisputeError>(), Some(DisputeError::Config(_))));
    }

    #[tokio::test]
    async fn challenger_requires_a_prover() {
        let chain = Arc::new(SimulatedChain::default());
        let config = ValidatorConfig {
            contracts: chain.contracts(),
            challenger_enabled: true,
            ..Default::default()
        };
        let result = Validator::new(config, collaborators(&chain, &MockRollup::honest()), &CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn roles_start_once_the_rollup_node_caught_up() {
        let chain = Arc::new(SimulatedChain::default());
        chain.submit_output(ME, MockRollup::honest().root_at(0), 0).await.unwrap();
        chain.submit_output(ME, MockRollup::honest().root_at(100), 100).await.unwrap();
        let rollup = MockRollup::honest();
        rollup.set_heads(50, 50).await;

        let config = ValidatorConfig {
            contracts: chain.contracts(),
            guardian_enabled: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let validator = Arc::new(Validator::new(config, collaborators(&chain, &rollup), &cancel).await.unwrap());

        let starting = tokio::spawn({
            let validator = validator.clone();
            async move { validator.start().await }
        });
        sleep(Duration::from_secs(150)).await;
        assert!(!starting.is_finished());

        rollup.set_heads(100, 100).await;
        sleep(Duration::from_secs(60)).await;
        assert!(starting.await.unwrap().is_ok());
        validator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_aborts_the_sync_wait() {
        let chain = Arc::new(SimulatedChain::default());
        chain.submit_output(ME, MockRollup::honest().root_at(0), 0).await.unwrap();
        chain.submit_output(ME, MockRollup::honest().root_at(100), 100).await.unwrap();
        let rollup = MockRollup::honest();

        let config = ValidatorConfig {
            contracts: chain.contracts(),
            guardian_enabled: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let validator = Validator::new(config, collaborators(&chain, &rollup), &cancel).await.unwrap();
        cancel.cancel();
        assert!(validator.start().await.is_err());
    }
}
