//! The [Guardian] role. A guardian is a member of the SecurityCouncil multisig. It settles challenges whose challenger
//! timed out, asks for the deletion of outputs that survived a challenge although they are wrong, and confirms the
//! council transactions it agrees with.

use crate::{
    bindings::{IColosseum, ISecurityCouncil},
    config::{ChainParams, ValidatorConfig},
    error::with_timeout,
    subscription::{EventQuery, LogWatcher},
    task::{event_u64, poll_until_done, retry_until_ok, send_checked, Step, STARTUP_RETRY_INTERVAL},
    traits::{ChainReader, Collaborators, RollupStatusSource, TxCandidate, TxManager},
};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use balin_primitives::{chain_rules, is_output_deleted, rule::Rule, ChallengeStatus};
use std::{sync::Arc, time::Duration};
use tokio::{
    select,
    sync::mpsc,
    time::{interval, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, info_span, warn, Instrument};

/// How often challenger timeouts and council confirmations are retried.
pub const GUARDIAN_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// L2 block bounds of one inspector pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectionWindow {
    /// Outputs at or before this block are finalized.
    pub finalized_l2: u64,
    /// Outputs at or before this block are out of their creation period.
    pub creation_ended_l2: u64,
}

/// Returns the inspection window at `current_l2`, or [None] while no output can be out of its creation period yet.
pub fn inspection_window(current_l2: u64, params: &ChainParams) -> Option<InspectionWindow> {
    let block_time = params.l2_block_time.max(1);
    let creation_period_l2 = params.creation_period_seconds / block_time;
    if current_l2 <= creation_period_l2 {
        return None;
    }
    Some(InspectionWindow {
        finalized_l2: current_l2
            .saturating_sub(params.finalization_period_seconds / block_time)
            .max(1),
        creation_ended_l2: current_l2 - creation_period_l2,
    })
}

/// Builds `SecurityCouncil.requestDeletion(outputIndex, false)`.
pub fn request_deletion(security_council: Address, output_index: u64) -> TxCandidate {
    let call = ISecurityCouncil::requestDeletionCall {
        outputIndex: U256::from(output_index),
        force: false,
    };
    TxCandidate::new(security_council, call.abi_encode())
}

/// Builds `SecurityCouncil.confirmTransaction(transactionId)`.
pub fn confirm_transaction(security_council: Address, transaction_id: U256) -> TxCandidate {
    let call = ISecurityCouncil::confirmTransactionCall {
        transactionId: transaction_id,
    };
    TxCandidate::new(security_council, call.abi_encode())
}

/// Builds `Colosseum.challengerTimeout(outputIndex, challenger)`.
fn challenger_timeout(colosseum: Address, output_index: u64, challenger: Address) -> TxCandidate {
    let call = IColosseum::challengerTimeoutCall {
        outputIndex: U256::from(output_index),
        challenger,
    };
    TxCandidate::new(colosseum, call.abi_encode())
}

/// The on-chain state deciding whether a council transaction still needs this guardian's confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CouncilTxState {
    output_finalized: bool,
    confirmed: bool,
    executed: bool,
}

fn output_not_finalized() -> Rule<CouncilTxState> {
    Box::new(|state: CouncilTxState| {
        if state.output_finalized {
            anyhow::bail!("output is already finalized")
        }
        Ok(state)
    })
}

fn not_confirmed() -> Rule<CouncilTxState> {
    Box::new(|state: CouncilTxState| {
        if state.confirmed {
            anyhow::bail!("transaction is already confirmed")
        }
        Ok(state)
    })
}

fn not_executed() -> Rule<CouncilTxState> {
    Box::new(|state: CouncilTxState| {
        if state.executed {
            anyhow::bail!("transaction is already executed")
        }
        Ok(state)
    })
}

#[derive(Clone)]
struct Inner {
    config: Arc<ValidatorConfig>,
    params: ChainParams,
    chain: Arc<dyn ChainReader>,
    rollup: Arc<dyn RollupStatusSource>,
    txmgr: Arc<dyn TxManager>,
    colosseum_logs: LogWatcher,
    council_logs: LogWatcher,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Inner {
    fn timeout(&self) -> Duration {
        self.config.network_timeout
    }

    async fn local_root(&self, l2_block_number: u64) -> Result<B256> {
        let output = with_timeout(self.timeout(), self.rollup.output_at_block(l2_block_number))
            .await
            .with_context(|| format!("failed to compute output at block {l2_block_number}"))?;
        Ok(output.output_root)
    }

    async fn send(&self, candidate: TxCandidate, what: &str) -> Result<()> {
        let receipt = send_checked(self.txmgr.as_ref(), candidate, what).await?;
        info!(tx_hash = %receipt.tx_hash, "submitted {what} tx");
        Ok(())
    }

    /// Returns `Some(true)` once the output's creation period is over, `Some(false)` while it still runs, and [None]
    /// once the output is finalized.
    async fn guardian_period(&self, output_index: u64) -> Result<Option<bool>> {
        let finalized = with_timeout(self.timeout(), self.chain.is_output_finalized(output_index))
            .await
            .context("failed to check output finalization")?;
        if finalized {
            info!("output is finalized, nothing left to guard");
            return Ok(None);
        }
        let in_creation_period =
            with_timeout(self.timeout(), self.chain.is_in_creation_period(output_index))
                .await
                .context("failed to check the challenge creation period")?;
        Ok(Some(!in_creation_period))
    }

    fn spawn_challenger_timeout(&self, event: &IColosseum::ChallengeCreated) {
        let output_index = match event_u64(event.outputIndex, "output index") {
            Ok(index) => index,
            Err(err) => {
                warn!("ignoring challenge: {err}");
                return;
            }
        };
        let challenger = event.challenger;
        let ctx = self.clone();
        self.tracker.spawn(
            async move {
                info!("watching challenge for a challenger timeout");
                poll_until_done(&ctx.cancel, GUARDIAN_RETRY_INTERVAL, || {
                    ctx.try_challenger_timeout(output_index, challenger)
                })
                .await
            }
            .instrument(info_span!("challenger_timeout", output_index, %challenger)),
        );
    }

    async fn try_challenger_timeout(&self, output_index: u64, challenger: Address) -> Result<Step> {
        match self.guardian_period(output_index).await? {
            None => return Ok(Step::Done),
            Some(false) => return Ok(Step::Again),
            Some(true) => {}
        }

        let status = with_timeout(self.timeout(), self.chain.challenge_status(output_index, challenger))
            .await
            .context("failed to read challenge status")?;
        match status {
            ChallengeStatus::None => {
                info!("challenge is not in progress");
                Ok(Step::Done)
            }
            ChallengeStatus::ChallengerTimeout => {
                let tx = challenger_timeout(self.config.contracts.colosseum, output_index, challenger);
                self.send(tx, "challengerTimeout").await?;
                Ok(Step::Done)
            }
            ChallengeStatus::ChallengerTurn
            | ChallengeStatus::AsserterTurn
            | ChallengeStatus::AsserterTimeout
            | ChallengeStatus::ReadyToProve
            | ChallengeStatus::Proven
            | ChallengeStatus::Approved => Ok(Step::Again),
        }
    }

    fn spawn_inspection(&self, output_index: u64, from_block: u64, to_block: u64) {
        let ctx = self.clone();
        self.tracker.spawn(
            async move {
                info!("inspecting output for an undeniable bug");
                poll_until_done(&ctx.cancel, ctx.config.guardian_poll_interval, || {
                    ctx.inspect_output(output_index, from_block, to_block)
                })
                .await
            }
            .instrument(info_span!("inspection", output_index)),
        );
    }

    /// Requests deletion of an output that reached `ReadyToProve` without being proven faulty, if the local rollup
    /// node disagrees with it.
    async fn inspect_output(&self, output_index: u64, from_block: u64, to_block: u64) -> Result<Step> {
        match self.guardian_period(output_index).await? {
            None => return Ok(Step::Done),
            Some(false) => return Ok(Step::Again),
            Some(true) => {}
        }

        let query = EventQuery::<IColosseum::ReadyToProve>::default()
            .with_indexed(0, B256::from(U256::from(output_index)));
        let ready = self
            .colosseum_logs
            .history(&query, from_block, to_block)
            .await
            .context("failed to read ReadyToProve logs")?;
        if ready.is_empty() {
            return Ok(Step::Done);
        }

        let output = with_timeout(self.timeout(), self.chain.l2_output(output_index))
            .await
            .context("failed to read output")?;
        if is_output_deleted(output.output_root) {
            info!("output has already been deleted");
            return Ok(Step::Done);
        }
        if self.local_root(output.l2_block_number).await? == output.output_root {
            info!("no need to delete output forcefully");
            return Ok(Step::Done);
        }

        warn!(output_root = %output.output_root, "output survived a challenge but is invalid");
        let tx = request_deletion(self.config.contracts.security_council, output_index);
        self.send(tx, "requestDeletion").await?;
        Ok(Step::Done)
    }

    /// Returns `true` if the council transaction is still open and the output it concerns is not finalized.
    async fn needs_confirmation(&self, transaction_id: U256, output_index: u64) -> Result<bool> {
        let state = CouncilTxState {
            output_finalized: with_timeout(self.timeout(), self.chain.is_output_finalized(output_index))
                .await
                .context("failed to check output finalization")?,
            confirmed: with_timeout(self.timeout(), self.chain.is_transaction_confirmed(transaction_id))
                .await
                .context("failed to read confirmation")?,
            executed: with_timeout(self.timeout(), self.chain.is_transaction_executed(transaction_id))
                .await
                .context("failed to read execution")?,
        };
        match chain_rules!(state, output_not_finalized(), not_confirmed(), not_executed()) {
            Ok(_) => Ok(true),
            Err(reason) => {
                info!("skipping confirmation: {reason}");
                Ok(false)
            }
        }
    }

    fn spawn_validation(&self, event: ISecurityCouncil::ValidationRequested) {
        let ctx = self.clone();
        let transaction_id = event.transactionId;
        self.tracker.spawn(
            async move {
                info!(output_root = %event.outputRoot, l2_block_number = %event.l2BlockNumber, "processing validation request");
                poll_until_done(&ctx.cancel, GUARDIAN_RETRY_INTERVAL, || ctx.try_confirm_validation(&event)).await
            }
            .instrument(info_span!("validation", %transaction_id)),
        );
    }

    async fn try_confirm_validation(&self, event: &ISecurityCouncil::ValidationRequested) -> Result<Step> {
        let l2_block_number = event_u64(event.l2BlockNumber, "l2 block number")?;
        let output_index = with_timeout(self.timeout(), self.chain.l2_output_index_after(l2_block_number))
            .await
            .with_context(|| format!("failed to read output index after block {l2_block_number}"))?;
        if !self.needs_confirmation(event.transactionId, output_index).await? {
            return Ok(Step::Done);
        }

        if self.local_root(l2_block_number).await? != event.outputRoot {
            info!("requested output differs from the local one, not confirming");
            return Ok(Step::Done);
        }
        info!("requested output matches the local one, confirming");
        let tx = confirm_transaction(self.config.contracts.security_council, event.transactionId);
        self.send(tx, "confirmTransaction").await?;
        Ok(Step::Done)
    }

    fn spawn_deletion(&self, event: ISecurityCouncil::DeletionRequested) {
        let ctx = self.clone();
        let transaction_id = event.transactionId;
        self.tracker.spawn(
            async move {
                info!(output_index = %event.outputIndex, "processing deletion request");
                poll_until_done(&ctx.cancel, GUARDIAN_RETRY_INTERVAL, || ctx.try_confirm_deletion(&event)).await
            }
            .instrument(info_span!("deletion", %transaction_id)),
        );
    }

    async fn try_confirm_deletion(&self, event: &ISecurityCouncil::DeletionRequested) -> Result<Step> {
        let output_index = event_u64(event.outputIndex, "output index")?;
        if !self.needs_confirmation(event.transactionId, output_index).await? {
            return Ok(Step::Done);
        }

        let output = with_timeout(self.timeout(), self.chain.l2_output(output_index))
            .await
            .context("failed to read output")?;
        if self.local_root(output.l2_block_number).await? == output.output_root {
            info!("deletion requested for a valid output, not confirming");
            return Ok(Step::Done);
        }
        let tx = confirm_transaction(self.config.contracts.security_council, event.transactionId);
        self.send(tx, "confirmTransaction").await?;
        Ok(Step::Done)
    }

    /// Scans `ChallengeCreated` logs of the finalization window ending at `head`, retrying until the scan succeeds.
    async fn scan_challenges(&self, head: u64) {
        let from_block = self.params.finalization_window_start(head);
        poll_until_done(&self.cancel, self.config.guardian_poll_interval, || async move {
            let events = self
                .colosseum_logs
                .history(&EventQuery::<IColosseum::ChallengeCreated>::default(), from_block, head)
                .await
                .context("failed to scan ChallengeCreated logs")?;
            info!(from_block, to_block = head, challenges = events.len(), "scanned previous challenges");
            for event in &events {
                self.spawn_challenger_timeout(event);
            }
            Ok(Step::Done)
        })
        .await;
    }

    /// Schedules inspections for outputs whose creation period ended since the last pass.
    async fn inspector(&self) {
        let mut ticker = interval(self.config.guardian_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_index = None;
        loop {
            select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            match self.inspection_pass(next_index).await {
                Ok(Some(next)) => next_index = Some(next),
                Ok(None) => {}
                Err(err) => warn!("inspection pass failed: {err:?}"),
            }
        }
    }

    /// Runs one inspector pass starting at `next_index`, or at the first unfinalized output on the first pass.
    /// Returns the index the next pass starts at.
    async fn inspection_pass(&self, next_index: Option<u64>) -> Result<Option<u64>> {
        let status = with_timeout(self.timeout(), self.rollup.sync_status())
            .await
            .context("failed to read sync status")?;
        let current_l2 = status.current_l2(self.config.allow_non_finalized);
        let Some(window) = inspection_window(current_l2, &self.params) else {
            warn!(current_l2, "no output is out of its creation period yet");
            return Ok(None);
        };

        let head = with_timeout(self.timeout(), self.chain.block_number())
            .await
            .context("failed to read the L1 head")?;
        let from_block = self.params.finalization_window_start(head);

        let start = match next_index {
            Some(index) => index,
            None => with_timeout(self.timeout(), self.chain.l2_output_index_after(window.finalized_l2))
                .await
                .with_context(|| format!("failed to read output index after block {}", window.finalized_l2))?,
        };
        let end = with_timeout(self.timeout(), self.chain.l2_output_index_after(window.creation_ended_l2))
            .await
            .with_context(|| format!("failed to read output index after block {}", window.creation_ended_l2))?;
        for output_index in start..end {
            self.spawn_inspection(output_index, from_block, head);
        }
        Ok(Some(end))
    }
}

/// Forwards every event of `rx` to `handle` until the channel closes or `cancel` fires.
async fn forward<E>(cancel: CancellationToken, mut rx: mpsc::Receiver<E>, handle: impl Fn(E)) {
    loop {
        select! {
            biased;
            _ = cancel.cancelled() => return,
            event = rx.recv() => match event {
                Some(event) => handle(event),
                None => return,
            },
        }
    }
}

/// The [Guardian] watches over challenges and council transactions on behalf of a SecurityCouncil member.
pub struct Guardian {
    ctx: Inner,
}

impl Guardian {
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
        let colosseum_logs = LogWatcher::new(
            chain.clone(),
            config.contracts.colosseum,
            config.l1_poll_interval,
            config.network_timeout,
        );
        let council_logs = LogWatcher::new(
            chain.clone(),
            config.contracts.security_council,
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
                colosseum_logs,
                council_logs,
                cancel: cancel.child_token(),
                tracker: TaskTracker::new(),
            },
        })
    }

    pub async fn start(&self) -> Result<()> {
        let ctx = &self.ctx;
        info!("starting guardian");
        let head = retry_until_ok(&ctx.cancel, STARTUP_RETRY_INTERVAL, "reading the L1 head", || {
            ctx.colosseum_logs.head()
        })
        .await?;
        let start_block = head + 1;

        let scan = ctx.clone();
        ctx.tracker.spawn(async move { scan.scan_challenges(head).await });

        let created = ctx.colosseum_logs.watch(
            EventQuery::<IColosseum::ChallengeCreated>::default(),
            start_block,
            &ctx.tracker,
            ctx.cancel.clone(),
        );
        let handler = ctx.clone();
        ctx.tracker.spawn(forward(ctx.cancel.clone(), created, move |event| {
            handler.spawn_challenger_timeout(&event)
        }));

        let validations = ctx.council_logs.watch(
            EventQuery::<ISecurityCouncil::ValidationRequested>::default(),
            start_block,
            &ctx.tracker,
            ctx.cancel.clone(),
        );
        let handler = ctx.clone();
        ctx.tracker.spawn(forward(ctx.cancel.clone(), validations, move |event| {
            handler.spawn_validation(event)
        }));

        let deletions = ctx.council_logs.watch(
            EventQuery::<ISecurityCouncil::DeletionRequested>::default(),
            start_block,
            &ctx.tracker,
            ctx.cancel.clone(),
        );
        let handler = ctx.clone();
        ctx.tracker.spawn(forward(ctx.cancel.clone(), deletions, move |event| {
            handler.spawn_deletion(event)
        }));

        let inspector = ctx.clone();
        ctx.tracker.spawn(async move { inspector.inspector().await });
        Ok(())
    }

    pub async fn stop(&self) {
        info!("stopping guardian");
        self.ctx.cancel.cancel();
        self.ctx.tracker.close();
        self.ctx.tracker.wait().await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        providers::mocks::{MockL2, MockRollup, SimulatedChain},
        resolver::DisputeResolver,
    };
    use balin_primitives::{BlockId, OutputRange};
    use tokio::time::sleep;

    const ASSERTER: Address = Address::repeat_byte(0xa1);
    const CHALLENGER: Address = Address::repeat_byte(0xc1);
    const GUARDIAN: Address = Address::repeat_byte(0x6a);

    fn resolver(chain: &Arc<SimulatedChain>, rollup: MockRollup) -> DisputeResolver {
        DisputeResolver::new(
            chain.clone(),
            Arc::new(rollup),
            Arc::new(MockL2),
            None,
            chain.contracts().colosseum,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    /// Submits outputs 0..=7 with a faulty output 7 and opens a challenge against it. Then plays `bisections`
    /// rounds, asserter first.
    async fn challenged_chain(bisections: usize) -> Arc<SimulatedChain> {
        let chain = Arc::new(SimulatedChain::default());
        let honest = MockRollup::honest();
        let faulty = MockRollup::diverging_from(650);
        for block in (0..700).step_by(100) {
            chain.submit_output(ASSERTER, honest.root_at(block), block).await.unwrap();
        }
        chain.submit_output(ASSERTER, faulty.root_at(700), 700).await.unwrap();

        let range = OutputRange {
            output_index: 7,
            start_block: 600,
            end_block: 700,
            l1_origin: BlockId::default(),
        };
        let create = resolver(&chain, honest.clone()).create_challenge(&range).await.unwrap();
        assert!(chain.signer(CHALLENGER).send_transaction(create).await.unwrap().success);

        for round in 0..bisections {
            let (from, view) = if round % 2 == 0 {
                (ASSERTER, faulty.clone())
            } else {
                (CHALLENGER, honest.clone())
            };
            let tx = resolver(&chain, view).bisect(7, CHALLENGER).await.unwrap();
            assert!(chain.signer(from).send_transaction(tx).await.unwrap().success);
        }
        chain
    }

    async fn guardian(chain: &Arc<SimulatedChain>, rollup: MockRollup, cancel: &CancellationToken) -> Guardian {
        let config = Arc::new(ValidatorConfig {
            contracts: chain.contracts(),
            guardian_enabled: true,
            ..Default::default()
        });
        let collaborators = Collaborators {
            chain: chain.clone(),
            rollup: Arc::new(rollup),
            l2: Arc::new(MockL2),
            prover: None,
            txmgr: Arc::new(chain.signer(GUARDIAN)),
        };
        Guardian::new(config, collaborators, cancel).await.unwrap()
    }

    #[test]
    fn window_waits_for_the_creation_period() {
        let params = ChainParams {
            l2_block_time: 2,
            creation_period_seconds: 86_400,
            finalization_period_seconds: 604_800,
            ..Default::default()
        };
        assert_eq!(inspection_window(43_200, &params), None);
        assert_eq!(
            inspection_window(43_950, &params),
            Some(InspectionWindow {
                finalized_l2: 1,
                creation_ended_l2: 750,
            })
        );
        assert_eq!(
            inspection_window(400_000, &params),
            Some(InspectionWindow {
                finalized_l2: 97_600,
                creation_ended_l2: 356_800,
            })
        );
    }

    #[test]
    fn open_transaction_rules() {
        let open = CouncilTxState {
            output_finalized: false,
            confirmed: false,
            executed: false,
        };
        let check = |state: CouncilTxState| chain_rules!(state, output_not_finalized(), not_confirmed(), not_executed());
        assert_eq!(check(open).unwrap(), open);

        let executed = CouncilTxState {
            executed: true,
            ..open
        };
        assert_eq!(check(executed).unwrap_err().to_string(), "transaction is already executed");

        let finalized_and_confirmed = CouncilTxState {
            output_finalized: true,
            confirmed: true,
            ..open
        };
        assert_eq!(
            check(finalized_and_confirmed).unwrap_err().to_string(),
            "output is already finalized"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn challenger_timeout_is_settled_from_history() {
        let chain = challenged_chain(1).await;
        chain.advance_time(86_400 + 3_601).await;
        assert_eq!(
            chain.challenge_status(7, CHALLENGER).await.unwrap(),
            ChallengeStatus::ChallengerTimeout
        );

        let cancel = CancellationToken::new();
        let guardian = guardian(&chain, MockRollup::honest(), &cancel).await;
        guardian.start().await.unwrap();
        sleep(Duration::from_secs(30)).await;
        guardian.stop().await;

        assert_eq!(chain.challenge_status(7, CHALLENGER).await.unwrap(), ChallengeStatus::None);
        let sent = chain.sent().await;
        let last = sent.last().unwrap();
        assert_eq!(last.from, GUARDIAN);
        assert!(last.success);
    }

    #[tokio::test(start_paused = true)]
    async fn unproven_invalid_output_is_deleted_and_confirmed() {
        let chain = challenged_chain(3).await;
        chain.submit_output(ASSERTER, MockRollup::honest().root_at(800), 800).await.unwrap();
        chain.advance_time(86_400 + 1).await;

        let rollup = MockRollup::honest();
        rollup.set_heads(43_950, 43_950).await;
        let cancel = CancellationToken::new();
        let guardian = guardian(&chain, rollup, &cancel).await;
        guardian.start().await.unwrap();
        sleep(Duration::from_secs(120)).await;
        guardian.stop().await;

        let deletion = chain.council_transaction_data(U256::ZERO).await.unwrap();
        let call = ISecurityCouncil::requestDeletionCall::abi_decode(&deletion, true).unwrap();
        assert_eq!(call.outputIndex, U256::from(7));
        assert!(!call.force);
        assert!(chain.is_transaction_confirmed(U256::ZERO).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn validation_requests_are_confirmed_only_when_matching() {
        let chain = challenged_chain(0).await;
        let honest = MockRollup::honest();
        let matching = chain.request_validation(honest.root_at(700), 700).await;
        let mismatching = chain.request_validation(B256::repeat_byte(0xbb), 700).await;

        let cancel = CancellationToken::new();
        let guardian = guardian(&chain, honest, &cancel).await;
        guardian.start().await.unwrap();
        // Requests made after the guardian started are picked up by the live subscription.
        let late = chain.request_validation(MockRollup::honest().root_at(700), 700).await;
        sleep(Duration::from_secs(60)).await;
        guardian.stop().await;

        assert!(!chain.is_transaction_confirmed(matching).await.unwrap());
        assert!(!chain.is_transaction_confirmed(mismatching).await.unwrap());
        assert!(chain.is_transaction_confirmed(late).await.unwrap());
    }
}
