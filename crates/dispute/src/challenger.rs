//! The [Challenger] role. It validates every output submitted to the L2OutputOracle, opens a challenge against the
//! invalid ones, and plays its side of every challenge this validator is party to, either as the asserter of the
//! output or as its challenger.

use crate::{
    action::{ChallengeAction, ChallengeRole, ChallengeSnapshot},
    bindings::{IColosseum, IL2OutputOracle},
    bond::has_sufficient_bond,
    config::{ChainParams, ValidatorConfig},
    error::with_timeout,
    metrics,
    resolver::{outputs_at_index, DisputeResolver},
    subscription::{EventQuery, LogWatcher},
    task::{event_u64, poll_until_done, retry_until_ok, send_checked, Step, STARTUP_RETRY_INTERVAL},
    traits::{ChainReader, Collaborators, RollupStatusSource, TxManager},
    DisputeError,
};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use balin_primitives::{is_output_deleted, ChallengeStatus, DisputeSolver, OutputRange, Outputs};
use std::{sync::Arc, time::Duration};
use tokio::select;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, info_span, warn, Instrument};

/// How often an output is re-checked until it is either valid, challenged or out of its creation period.
pub const OUTPUT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Returns the range a challenge against `outputs` covers, or [None] if the output is valid.
pub fn output_range(output_index: u64, outputs: &Outputs, submission_interval: u64) -> Option<OutputRange> {
    if outputs.is_valid() {
        return None;
    }
    let end_block = outputs.remote.l2_block_number;
    Some(OutputRange {
        output_index,
        start_block: end_block.saturating_sub(submission_interval),
        end_block,
        l1_origin: outputs.local.block_ref.l1_origin,
    })
}

/// State shared by every task the challenger spawns.
#[derive(Clone)]
struct Inner {
    config: Arc<ValidatorConfig>,
    params: ChainParams,
    chain: Arc<dyn ChainReader>,
    rollup: Arc<dyn RollupStatusSource>,
    txmgr: Arc<dyn TxManager>,
    resolver: DisputeResolver,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Inner {
    fn me(&self) -> Address {
        self.txmgr.from()
    }

    fn timeout(&self) -> Duration {
        self.config.network_timeout
    }

    fn spawn_output(&self, output_index: u64) {
        let ctx = self.clone();
        self.tracker.spawn(
            async move { ctx.handle_output(output_index).await }
                .instrument(info_span!("output", output_index)),
        );
    }

    fn spawn_challenge(&self, event: &IColosseum::ChallengeCreated) {
        let output_index = match event_u64(event.outputIndex, "output index") {
            Ok(index) => index,
            Err(err) => {
                warn!("ignoring challenge: {err}");
                return;
            }
        };
        let me = self.me();
        if output_index == 0 || (event.asserter != me && event.challenger != me) {
            return;
        }

        let role = if event.asserter == me {
            ChallengeRole::Asserter
        } else if self.config.challenger_enabled {
            ChallengeRole::Challenger
        } else {
            return;
        };
        let challenger = event.challenger;
        let ctx = self.clone();
        self.tracker.spawn(
            async move { ctx.handle_challenge(output_index, challenger, role).await }
                .instrument(info_span!("challenge", output_index, %challenger)),
        );
    }

    async fn handle_output(&self, output_index: u64) {
        debug!("handling output");
        poll_until_done(&self.cancel, OUTPUT_POLL_INTERVAL, || self.check_output(output_index)).await;
    }

    /// One pass over an output. Opens a challenge if the output is invalid and this validator may do so.
    async fn check_output(&self, output_index: u64) -> Result<Step> {
        let in_creation_period =
            with_timeout(self.timeout(), self.chain.is_in_creation_period(output_index))
                .await
                .context("failed to check the challenge creation period")?;
        if !in_creation_period {
            info!("challenge creation period is already past");
            return Ok(Step::Done);
        }

        let outputs =
            outputs_at_index(self.chain.as_ref(), self.rollup.as_ref(), output_index, self.timeout())
                .await?;
        let Some(range) = output_range(output_index, &outputs, self.params.submission_interval) else {
            info!(output_root = %outputs.remote.output_root, "confirmed that the output is valid");
            return Ok(Step::Done);
        };
        info!(
            local = %outputs.local.output_root,
            remote = %outputs.remote.output_root,
            l2_block_number = range.end_block,
            "found invalid output"
        );
        if is_output_deleted(outputs.remote.output_root) {
            info!("invalid output is already deleted");
            return Ok(Step::Done);
        }

        let status = with_timeout(self.timeout(), self.chain.challenge_status(output_index, self.me()))
            .await
            .context("failed to read challenge status")?;
        match status {
            ChallengeStatus::None | ChallengeStatus::ChallengerTimeout => {}
            ChallengeStatus::ChallengerTurn
            | ChallengeStatus::AsserterTurn
            | ChallengeStatus::AsserterTimeout
            | ChallengeStatus::ReadyToProve
            | ChallengeStatus::Proven
            | ChallengeStatus::Approved => {
                info!(?status, "challenge is already in progress");
                return Ok(Step::Done);
            }
        }

        if !has_sufficient_bond(self.chain.as_ref(), &self.params, self.me(), output_index, self.timeout())
            .await?
        {
            return Ok(Step::Again);
        }

        let tx = self
            .resolver
            .create_challenge(&range)
            .await
            .context("failed to build createChallenge tx")?;
        let receipt = send_checked(self.txmgr.as_ref(), tx, "createChallenge").await?;
        info!(tx_hash = %receipt.tx_hash, "challenge created");
        Ok(Step::Done)
    }

    async fn handle_challenge(&self, output_index: u64, challenger: Address, role: ChallengeRole) {
        info!(?role, "handling related challenge");
        poll_until_done(&self.cancel, self.config.challenge_poll_interval, || {
            self.step_challenge(output_index, challenger, role)
        })
        .await;
    }

    async fn snapshot(&self, output_index: u64, challenger: Address) -> Result<ChallengeSnapshot> {
        let status = with_timeout(self.timeout(), self.chain.challenge_status(output_index, challenger))
            .await
            .context("failed to read challenge status")?;
        let output = with_timeout(self.timeout(), self.chain.l2_output(output_index))
            .await
            .context("failed to read output")?;
        let output_finalized = with_timeout(self.timeout(), self.chain.is_output_finalized(output_index))
            .await
            .context("failed to check output finalization")?;
        Ok(ChallengeSnapshot {
            output_index,
            status,
            output_deleted: is_output_deleted(output.output_root),
            output_finalized,
        })
    }

    /// One move of `role` in the challenge against `output_index` opened by `challenger`.
    async fn step_challenge(
        &self,
        output_index: u64,
        challenger: Address,
        role: ChallengeRole,
    ) -> Result<Step> {
        let snapshot = self.snapshot(output_index, challenger).await?;
        let action = role.respond(&snapshot);
        debug!(status = ?snapshot.status, ?action, "challenge polled");

        let (tx, what) = match action {
            ChallengeAction::Stop => {
                info!(status = ?snapshot.status, "stopped handling challenge");
                return Ok(Step::Done);
            }
            ChallengeAction::Wait => return Ok(Step::Again),
            ChallengeAction::Bisect => (
                self.resolver
                    .bisect(output_index, challenger)
                    .await
                    .context("failed to build bisect tx")?,
                "bisect",
            ),
            ChallengeAction::ChallengerTimeout => (
                self.resolver.challenger_timeout(output_index, challenger),
                "challengerTimeout",
            ),
            ChallengeAction::CancelChallenge => {
                (self.resolver.cancel_challenge(output_index), "cancelChallenge")
            }
            ChallengeAction::ProveFault {
                skip_select_position,
            } => (
                self.resolver
                    .prove_fault(output_index, challenger, skip_select_position)
                    .await
                    .context("failed to build proveFaultWithZkEvm tx")?,
                "proveFaultWithZkEvm",
            ),
        };
        let receipt = send_checked(self.txmgr.as_ref(), tx, what).await?;
        info!(tx_hash = %receipt.tx_hash, "submitted {what} tx");
        Ok(Step::Again)
    }
}

/// The [Challenger] validates outputs and drives the challenges this validator is party to.
pub struct Challenger {
    ctx: Inner,
    oracle_logs: LogWatcher,
    colosseum_logs: LogWatcher,
}

impl Challenger {
    /// Builds the challenger and reads the chain parameters it needs.
    ///
    /// ### Takes
    /// - `config`: The validated validator configuration.
    /// - `collaborators`: The external services. A prover is required when `config.challenger_enabled` is set.
    /// - `cancel`: The parent cancellation scope. The challenger stops with it.
    pub async fn new(
        config: Arc<ValidatorConfig>,
        collaborators: Collaborators,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if config.challenger_enabled && collaborators.prover.is_none() {
            return Err(DisputeError::Config(
                "the challenger needs a prover endpoint".to_string(),
            )
            .into());
        }
        let Collaborators {
            chain,
            rollup,
            l2,
            prover,
            txmgr,
        } = collaborators;
        let params = retry_until_ok(cancel, STARTUP_RETRY_INTERVAL, "reading chain parameters", || {
            ChainParams::fetch(chain.as_ref(), config.network_timeout)
        })
        .await?;

        let resolver = DisputeResolver::new(
            chain.clone(),
            rollup.clone(),
            l2,
            prover,
            config.contracts.colosseum,
            config.network_timeout,
            config.fetching_proof_timeout,
        );
        let oracle_logs = LogWatcher::new(
            chain.clone(),
            config.contracts.l2_output_oracle,
            config.l1_poll_interval,
            config.network_timeout,
        );
        let colosseum_logs = LogWatcher::new(
            chain.clone(),
            config.contracts.colosseum,
            config.l1_poll_interval,
            config.network_timeout,
        );

        Ok(Self {
            ctx: Inner {
                config,
                params,
                chain,
                rollup,
                txmgr,
                resolver,
                cancel: cancel.child_token(),
                tracker: TaskTracker::new(),
            },
            oracle_logs,
            colosseum_logs,
        })
    }

    /// Scans the finalization window for outputs and challenges, then follows new ones.
    pub async fn start(&self) -> Result<()> {
        let ctx = &self.ctx;
        info!(challenger_enabled = ctx.config.challenger_enabled, "starting challenger");

        let checkpoint = if ctx.config.challenger_enabled {
            Some(self.retry("reading the initial checkpoint", || self.initial_checkpoint()).await?)
        } else {
            None
        };

        let head = self.retry("reading the L1 head", || self.colosseum_logs.head()).await?;
        let from_block = ctx.params.finalization_window_start(head);

        let created = EventQuery::<IColosseum::ChallengeCreated>::default();
        let challenges = self
            .retry("scanning ChallengeCreated logs", || {
                self.colosseum_logs.history(&created, from_block, head)
            })
            .await?;
        for event in &challenges {
            ctx.spawn_challenge(event);
        }

        if ctx.config.challenger_enabled {
            let submitted = EventQuery::<IL2OutputOracle::OutputSubmitted>::default();
            let outputs = self
                .retry("scanning OutputSubmitted logs", || {
                    self.oracle_logs.history(&submitted, from_block, head)
                })
                .await?;
            for event in &outputs {
                match event_u64(event.l2OutputIndex, "output index") {
                    Ok(output_index) => ctx.spawn_output(output_index),
                    Err(err) => warn!("ignoring output: {err}"),
                }
            }
        }
        info!(from_block, to_block = head, challenges = challenges.len(), "scanned previous logs");

        let mut created = self.colosseum_logs.watch(
            EventQuery::<IColosseum::ChallengeCreated>::default(),
            head + 1,
            &ctx.tracker,
            ctx.cancel.clone(),
        );
        let watch_ctx = ctx.clone();
        ctx.tracker.spawn(async move {
            loop {
                select! {
                    _ = watch_ctx.cancel.cancelled() => return,
                    event = created.recv() => match event {
                        Some(event) => watch_ctx.spawn_challenge(&event),
                        None => return,
                    },
                }
            }
        });

        if let Some(checkpoint) = checkpoint {
            let submitted = self.oracle_logs.watch(
                EventQuery::<IL2OutputOracle::OutputSubmitted>::default(),
                head + 1,
                &ctx.tracker,
                ctx.cancel.clone(),
            );
            ctx.tracker.spawn(follow_outputs(ctx.clone(), submitted, checkpoint));
        }
        Ok(())
    }

    /// Cancels every task and waits for them to finish.
    pub async fn stop(&self) {
        info!("stopping challenger");
        self.ctx.cancel.cancel();
        self.ctx.tracker.close();
        self.ctx.tracker.wait().await;
    }

    async fn retry<T, Fut>(&self, what: &str, attempt: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        retry_until_ok(&self.ctx.cancel, STARTUP_RETRY_INTERVAL, what, attempt).await
    }

    /// The last output index considered handled: one before the next output, or 1 if nothing was submitted.
    async fn initial_checkpoint(&self) -> Result<u64> {
        let next = with_timeout(self.ctx.timeout(), self.ctx.chain.next_output_index())
            .await
            .context("failed to read next output index")?;
        let checkpoint = if next == 0 { 1 } else { next - 1 };
        metrics::record_challenge_checkpoint(checkpoint);
        Ok(checkpoint)
    }
}

/// Schedules a validation task for every newly submitted output. An index at or below the checkpoint means the L1
/// reorged, and only that index is validated again.
async fn follow_outputs(
    ctx: Inner,
    mut submitted: tokio::sync::mpsc::Receiver<IL2OutputOracle::OutputSubmitted>,
    mut checkpoint: u64,
) {
    loop {
        let event = select! {
            _ = ctx.cancel.cancelled() => return,
            event = submitted.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };
        let output_index = match event_u64(event.l2OutputIndex, "output index") {
            Ok(index) => index,
            Err(err) => {
                warn!("ignoring output: {err}");
                continue;
            }
        };

        let first = if output_index <= checkpoint {
            info!(output_index, checkpoint, "output index at or below checkpoint, revalidating");
            output_index
        } else {
            checkpoint + 1
        };
        for index in first..=output_index {
            ctx.spawn_output(index);
        }
        checkpoint = output_index;
        metrics::record_challenge_checkpoint(checkpoint);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::providers::mocks::{ChainSetup, MockL2, MockProver, MockRollup, SimulatedChain};
    use alloy_primitives::{B256, U256};
    use balin_primitives::{BlockId, CheckpointOutput, OutputResponse};
    use tokio::time::sleep;

    const ASSERTER: Address = Address::repeat_byte(0xa1);
    const CHALLENGER: Address = Address::repeat_byte(0xc1);

    fn config(chain: &SimulatedChain, challenger_enabled: bool) -> Arc<ValidatorConfig> {
        Arc::new(ValidatorConfig {
            contracts: chain.contracts(),
            challenger_enabled,
            output_submitter_enabled: !challenger_enabled,
            ..Default::default()
        })
    }

    fn collaborators(chain: &Arc<SimulatedChain>, rollup: MockRollup, from: Address) -> Collaborators {
        Collaborators {
            chain: chain.clone(),
            rollup: Arc::new(rollup),
            l2: Arc::new(MockL2),
            prover: Some(Arc::new(MockProver::default())),
            txmgr: Arc::new(chain.signer(from)),
        }
    }

    /// Submits outputs every 100 blocks up to `last_block`, with the one at `last_block` taken from `asserter_view`.
    async fn submit_outputs(chain: &SimulatedChain, last_block: u64, asserter_view: &MockRollup) {
        let honest = MockRollup::honest();
        for block in (0..last_block).step_by(100) {
            chain.submit_output(ASSERTER, honest.root_at(block), block).await.unwrap();
        }
        chain
            .submit_output(ASSERTER, asserter_view.root_at(last_block), last_block)
            .await
            .unwrap();
    }

    async fn wait_for_status(chain: &SimulatedChain, output_index: u64, status: ChallengeStatus) -> bool {
        for _ in 0..3_600 {
            if chain.challenge_status(output_index, CHALLENGER).await.unwrap() == status {
                return true;
            }
            sleep(Duration::from_secs(1)).await;
        }
        false
    }

    #[test]
    fn range_of_invalid_output() {
        let l1_origin = BlockId {
            hash: B256::repeat_byte(0xee),
            number: 116,
        };
        let mut local = OutputResponse {
            output_root: B256::repeat_byte(1),
            ..Default::default()
        };
        local.block_ref.l1_origin = l1_origin;
        let remote = CheckpointOutput {
            output_root: B256::repeat_byte(1),
            l2_block_number: 700,
            ..Default::default()
        };
        let mut outputs = Outputs { remote, local };
        assert_eq!(output_range(7, &outputs, 100), None);

        outputs.remote.output_root = B256::repeat_byte(2);
        assert_eq!(
            output_range(7, &outputs, 100),
            Some(OutputRange {
                output_index: 7,
                start_block: 600,
                end_block: 700,
                l1_origin,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn valid_output_is_not_challenged() {
        let chain = Arc::new(SimulatedChain::default());
        submit_outputs(&chain, 500, &MockRollup::honest()).await;
        chain.set_pool_balance(CHALLENGER, U256::from(1_000)).await;

        let cancel = CancellationToken::new();
        let challenger = Challenger::new(
            config(&chain, true),
            collaborators(&chain, MockRollup::honest(), CHALLENGER),
            &cancel,
        )
        .await
        .unwrap();
        challenger.start().await.unwrap();
        sleep(Duration::from_secs(300)).await;
        challenger.stop().await;

        assert!(chain.sent().await.is_empty());
        assert_eq!(
            chain.challenge_status(5, CHALLENGER).await.unwrap(),
            ChallengeStatus::None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_output_is_proven_faulty() {
        let chain = Arc::new(SimulatedChain::default());
        let faulty = MockRollup::diverging_from(650);
        submit_outputs(&chain, 700, &faulty).await;
        chain.set_pool_balance(CHALLENGER, U256::from(1_000)).await;

        let cancel = CancellationToken::new();
        let asserter = Challenger::new(
            config(&chain, false),
            collaborators(&chain, faulty, ASSERTER),
            &cancel,
        )
        .await
        .unwrap();
        let prover = MockProver::default();
        let mut challenger_collaborators = collaborators(&chain, MockRollup::honest(), CHALLENGER);
        challenger_collaborators.prover = Some(Arc::new(prover.clone()));
        let challenger = Challenger::new(config(&chain, true), challenger_collaborators, &cancel)
            .await
            .unwrap();

        asserter.start().await.unwrap();
        challenger.start().await.unwrap();
        assert!(wait_for_status(&chain, 7, ChallengeStatus::Proven).await);

        cancel.cancel();
        asserter.stop().await;
        challenger.stop().await;

        assert!(is_output_deleted(chain.output(7).await.unwrap().output_root));
        let requests = prover.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("650"));

        let sent = chain.sent().await;
        assert!(sent.iter().all(|tx| tx.success));
        let senders: Vec<Address> = sent.iter().map(|tx| tx.from).collect();
        assert_eq!(senders, vec![CHALLENGER, ASSERTER, CHALLENGER, ASSERTER, CHALLENGER]);
    }

    #[tokio::test(start_paused = true)]
    async fn fault_at_the_end_block_is_proven() {
        // 10 blocks split into 3 sections leaves the last section 4 blocks wide.
        let chain = Arc::new(SimulatedChain::new(ChainSetup {
            submission_interval: 10,
            segments_lengths: vec![4, 5],
            ..Default::default()
        }));
        let honest = MockRollup::honest();
        let faulty = MockRollup::diverging_from(70);
        for block in (0..70).step_by(10) {
            chain.submit_output(ASSERTER, honest.root_at(block), block).await.unwrap();
        }
        chain.submit_output(ASSERTER, faulty.root_at(70), 70).await.unwrap();
        chain.set_pool_balance(CHALLENGER, U256::from(1_000)).await;

        let cancel = CancellationToken::new();
        let asserter = Challenger::new(
            config(&chain, false),
            collaborators(&chain, faulty, ASSERTER),
            &cancel,
        )
        .await
        .unwrap();
        let prover = MockProver::default();
        let mut challenger_collaborators = collaborators(&chain, honest, CHALLENGER);
        challenger_collaborators.prover = Some(Arc::new(prover.clone()));
        let challenger = Challenger::new(config(&chain, true), challenger_collaborators, &cancel)
            .await
            .unwrap();

        asserter.start().await.unwrap();
        challenger.start().await.unwrap();
        assert!(wait_for_status(&chain, 7, ChallengeStatus::Proven).await);

        cancel.cancel();
        asserter.stop().await;
        challenger.stop().await;

        assert!(is_output_deleted(chain.output(7).await.unwrap().output_root));
        let requests = prover.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("70"));

        let sent = chain.sent().await;
        assert!(sent.iter().all(|tx| tx.success));
        let senders: Vec<Address> = sent.iter().map(|tx| tx.from).collect();
        assert_eq!(senders, vec![CHALLENGER, ASSERTER, CHALLENGER]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_retries_a_failed_log_scan() {
        let chain = Arc::new(SimulatedChain::default());
        submit_outputs(&chain, 700, &MockRollup::diverging_from(650)).await;
        chain.set_pool_balance(CHALLENGER, U256::from(1_000)).await;
        chain.fail_log_queries(1).await;

        let cancel = CancellationToken::new();
        let challenger = Challenger::new(
            config(&chain, true),
            collaborators(&chain, MockRollup::honest(), CHALLENGER),
            &cancel,
        )
        .await
        .unwrap();
        challenger.start().await.unwrap();
        sleep(Duration::from_secs(10)).await;
        challenger.stop().await;

        let sent = chain.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].success);
        assert_eq!(
            chain.challenge_status(7, CHALLENGER).await.unwrap(),
            ChallengeStatus::AsserterTurn
        );
    }
}
