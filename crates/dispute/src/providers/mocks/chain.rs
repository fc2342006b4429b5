//! An in-memory L1 that executes validator calldata against simplified L2OutputOracle, Colosseum, ValidatorPool,
//! ValidatorManager, AssetManager and SecurityCouncil state. One L1 block is mined per transaction; time only moves
//! through [SimulatedChain::advance_time].

use crate::{
    bindings::{IColosseum, IL2OutputOracle, ISecurityCouncil},
    config::ContractAddresses,
    traits::{ChainReader, GasPriceCaps, Log, LogFilter, TxCandidate, TxManager, TxReceipt},
    DisputeError,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolEvent, SolInterface};
use anyhow::{anyhow, bail, Result};
use balin_primitives::{
    is_output_deleted, Challenge, ChallengeStatus, CheckpointOutput, Segments, ValidatorStatus,
    DELETED_OUTPUT_ROOT,
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Mutex;

/// Gas reported by [SimulatedChain::estimate_gas] for every candidate.
pub const SIMULATED_GAS_ESTIMATE: u64 = 100_000;

/// Contract constants of a [SimulatedChain].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSetup {
    pub submission_interval: u64,
    pub l2_block_time: u64,
    pub finalization_period_seconds: u64,
    pub creation_period_seconds: u64,
    /// Seconds a party has to answer a bisection.
    pub bisection_timeout: u64,
    pub segments_lengths: Vec<u64>,
    pub required_bond_amount: U256,
    pub bond_amount: U256,
    pub terminate_output_index: u64,
}

impl Default for ChainSetup {
    fn default() -> Self {
        Self {
            submission_interval: 100,
            l2_block_time: 2,
            finalization_period_seconds: 604_800,
            creation_period_seconds: 86_400,
            bisection_timeout: 3_600,
            segments_lengths: vec![4, 4, 4, 4],
            required_bond_amount: U256::from(100),
            bond_amount: U256::from(100),
            terminate_output_index: u64::MAX,
        }
    }
}

/// A transaction the chain has seen, reverted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub from: Address,
    pub candidate: TxCandidate,
    pub success: bool,
}

#[derive(Debug, Clone)]
struct ChallengeRecord {
    challenge: Challenge,
    proven: bool,
}

#[derive(Debug, Clone, Default)]
struct CouncilTransaction {
    data: Bytes,
    confirmed: bool,
    executed: bool,
}

#[derive(Debug, Default)]
struct ChainState {
    setup: ChainSetup,
    timestamp: u64,
    head: u64,
    outputs: Vec<CheckpointOutput>,
    challenges: HashMap<(u64, Address), ChallengeRecord>,
    pool_balances: HashMap<Address, U256>,
    pool_next_validator: Address,
    manager_next_validator: Address,
    jailed: HashSet<Address>,
    validator_statuses: HashMap<Address, ValidatorStatus>,
    kro_not_bonded: HashMap<Address, U256>,
    council: Vec<CouncilTransaction>,
    logs: Vec<Log>,
    sent: Vec<SentTransaction>,
    failing_log_queries: u32,
}

fn word(value: u64) -> B256 {
    B256::from(U256::from(value))
}

fn to_u64(value: U256) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{value} does not fit in u64"))
}

impl ChainState {
    fn emit(&mut self, address: Address, topics: Vec<B256>, data: Vec<u8>) {
        let block_number = Some(self.head);
        self.logs.push(Log {
            address,
            topics,
            data: data.into(),
            block_number,
        });
    }

    fn latest_block_number(&self) -> u64 {
        self.outputs.last().map_or(0, |o| o.l2_block_number)
    }

    fn next_block_number(&self) -> u64 {
        if self.outputs.is_empty() {
            0
        } else {
            self.latest_block_number() + self.setup.submission_interval
        }
    }

    fn output(&self, output_index: u64) -> Result<&CheckpointOutput> {
        self.outputs
            .get(output_index as usize)
            .ok_or_else(|| anyhow!("output {output_index} does not exist"))
    }

    fn is_finalized(&self, output_index: u64) -> Result<bool> {
        let output = self.output(output_index)?;
        Ok(output.timestamp + self.setup.finalization_period_seconds <= self.timestamp)
    }

    fn is_in_creation_period(&self, output_index: u64) -> Result<bool> {
        let output = self.output(output_index)?;
        Ok(self.timestamp <= output.timestamp + self.setup.creation_period_seconds)
    }

    fn status(&self, output_index: u64, challenger: Address) -> ChallengeStatus {
        let Some(record) = self.challenges.get(&(output_index, challenger)) else {
            return ChallengeStatus::None;
        };
        if record.proven {
            return ChallengeStatus::Proven;
        }

        let challenge = &record.challenge;
        let asserter_turn = challenge.turn % 2 == 1;
        if self.timestamp > challenge.timeout_at {
            return if asserter_turn {
                ChallengeStatus::AsserterTimeout
            } else {
                ChallengeStatus::ChallengerTimeout
            };
        }
        if (challenge.turn as usize) < self.setup.segments_lengths.len() {
            if asserter_turn {
                ChallengeStatus::AsserterTurn
            } else {
                ChallengeStatus::ChallengerTurn
            }
        } else {
            ChallengeStatus::ReadyToProve
        }
    }

    fn segments_length(&self, turn_index: u64) -> Result<u64> {
        self.setup
            .segments_lengths
            .get(turn_index as usize)
            .copied()
            .ok_or_else(|| anyhow!("no segments length for turn index {turn_index}"))
    }

    fn execute(&mut self, from: Address, contracts: &ContractAddresses, data: &[u8], to: Address) -> Result<()> {
        if to == contracts.l2_output_oracle {
            match IL2OutputOracle::IL2OutputOracleCalls::abi_decode(data, true)? {
                IL2OutputOracle::IL2OutputOracleCalls::submitL2Output(call) => self.submit_l2_output(
                    from,
                    contracts.l2_output_oracle,
                    call.outputRoot,
                    to_u64(call.l2BlockNumber)?,
                ),
                _ => bail!("not a transaction"),
            }
        } else if to == contracts.colosseum {
            let colosseum = contracts.colosseum;
            match IColosseum::IColosseumCalls::abi_decode(data, true)? {
                IColosseum::IColosseumCalls::createChallenge(call) => self.create_challenge(
                    from,
                    colosseum,
                    to_u64(call.outputIndex)?,
                    call.l1BlockHash,
                    call.segments,
                ),
                IColosseum::IColosseumCalls::bisect(call) => self.bisect(
                    from,
                    colosseum,
                    to_u64(call.outputIndex)?,
                    call.challenger,
                    to_u64(call.pos)?,
                    call.segments,
                ),
                IColosseum::IColosseumCalls::proveFaultWithZkEvm(call) => self.prove_fault(
                    from,
                    to_u64(call.outputIndex)?,
                    to_u64(call.pos)?,
                    call.zkEvmProof.publicInputProof.publicInput.number,
                    call.zkEvmProof.pair.len(),
                ),
                IColosseum::IColosseumCalls::challengerTimeout(call) => {
                    self.challenger_timeout(to_u64(call.outputIndex)?, call.challenger)
                }
                IColosseum::IColosseumCalls::cancelChallenge(call) => {
                    self.cancel_challenge(from, to_u64(call.outputIndex)?)
                }
                _ => bail!("not a transaction"),
            }
        } else if to == contracts.security_council {
            match ISecurityCouncil::ISecurityCouncilCalls::abi_decode(data, true)? {
                ISecurityCouncil::ISecurityCouncilCalls::requestDeletion(call) => {
                    let output_index = to_u64(call.outputIndex)?;
                    self.output(output_index)?;
                    let id = self.council.len() as u64;
                    self.council.push(CouncilTransaction {
                        data: Bytes::copy_from_slice(data),
                        ..Default::default()
                    });
                    self.emit(
                        contracts.security_council,
                        vec![
                            ISecurityCouncil::DeletionRequested::SIGNATURE_HASH,
                            word(id),
                            word(output_index),
                        ],
                        Vec::new(),
                    );
                    Ok(())
                }
                ISecurityCouncil::ISecurityCouncilCalls::confirmTransaction(call) => {
                    let id = to_u64(call.transactionId)?;
                    match self.council.get_mut(id as usize) {
                        Some(tx) if !tx.executed => {
                            tx.confirmed = true;
                            Ok(())
                        }
                        Some(_) => bail!("transaction {id} already executed"),
                        None => bail!("transaction {id} does not exist"),
                    }
                }
                _ => bail!("not a transaction"),
            }
        } else {
            bail!("no contract at {to}")
        }
    }

    fn submit_l2_output(
        &mut self,
        submitter: Address,
        oracle: Address,
        output_root: B256,
        l2_block_number: u64,
    ) -> Result<()> {
        let next = self.next_block_number();
        if l2_block_number != next {
            bail!("block number must be equal to next expected block number {next}");
        }
        let index = self.outputs.len() as u64;
        self.outputs.push(CheckpointOutput {
            submitter,
            output_root,
            timestamp: self.timestamp,
            l2_block_number,
        });
        let timestamp = U256::from(self.timestamp).to_be_bytes::<32>().to_vec();
        self.emit(
            oracle,
            vec![
                IL2OutputOracle::OutputSubmitted::SIGNATURE_HASH,
                output_root,
                word(index),
                word(l2_block_number),
            ],
            timestamp,
        );
        Ok(())
    }

    fn create_challenge(
        &mut self,
        challenger: Address,
        colosseum: Address,
        output_index: u64,
        l1_head: B256,
        segments: Vec<B256>,
    ) -> Result<()> {
        if output_index == 0 {
            bail!("the genesis output cannot be challenged");
        }
        let target = *self.output(output_index)?;
        let previous = *self.output(output_index - 1)?;
        if is_output_deleted(target.output_root) {
            bail!("the output has already been deleted");
        }
        if target.submitter == challenger {
            bail!("the asserter cannot challenge its own output");
        }
        if !self.is_in_creation_period(output_index)? {
            bail!("the creation period has ended");
        }
        match self.status(output_index, challenger) {
            ChallengeStatus::None | ChallengeStatus::ChallengerTimeout => {}
            status => bail!("a challenge in status {status:?} already exists"),
        }
        if segments.len() as u64 != self.segments_length(0)? {
            bail!("invalid segments length");
        }
        if segments.first() != Some(&previous.output_root) {
            bail!("the first segment must match the previous output");
        }
        if segments.last() == Some(&target.output_root) {
            bail!("the last segment must differ from the challenged output");
        }

        let challenge = Challenge {
            turn: 1,
            timeout_at: self.timestamp + self.setup.bisection_timeout,
            asserter: target.submitter,
            challenger,
            segments,
            seg_size: target.l2_block_number - previous.l2_block_number,
            seg_start: previous.l2_block_number,
            l1_head,
        };
        self.challenges.insert(
            (output_index, challenger),
            ChallengeRecord {
                challenge,
                proven: false,
            },
        );
        let timestamp = U256::from(self.timestamp).to_be_bytes::<32>().to_vec();
        self.emit(
            colosseum,
            vec![
                IColosseum::ChallengeCreated::SIGNATURE_HASH,
                word(output_index),
                target.submitter.into_word(),
                challenger.into_word(),
            ],
            timestamp,
        );
        Ok(())
    }

    fn bisect(
        &mut self,
        from: Address,
        colosseum: Address,
        output_index: u64,
        challenger: Address,
        position: u64,
        segments: Vec<B256>,
    ) -> Result<()> {
        let status = self.status(output_index, challenger);
        let key = (output_index, challenger);
        let record = self
            .challenges
            .get(&key)
            .ok_or_else(|| anyhow!("no challenge for output {output_index}"))?;
        let previous = record.challenge.clone();
        let expected_sender = match status {
            ChallengeStatus::AsserterTurn => previous.asserter,
            ChallengeStatus::ChallengerTurn => previous.challenger,
            status => bail!("cannot bisect in status {status:?}"),
        };
        if from != expected_sender {
            bail!("not your turn");
        }

        let laid = previous.segments();
        let (start, size) = laid.next_segments_range(position)?;
        if segments.len() as u64 != self.segments_length(previous.turn as u64)? {
            bail!("invalid segments length");
        }
        if segments.first() != laid.hashes.get(position as usize) {
            bail!("the first segment must be matched");
        }
        if segments.last() == laid.hashes.get(position as usize + 1) {
            bail!("the last segment must be disagreed");
        }

        let timeout_at = self.timestamp + self.setup.bisection_timeout;
        if let Some(record) = self.challenges.get_mut(&key) {
            let challenge = &mut record.challenge;
            challenge.turn += 1;
            challenge.timeout_at = timeout_at;
            challenge.seg_start = start;
            challenge.seg_size = size;
            challenge.segments = segments;
        }

        if self.status(output_index, challenger) == ChallengeStatus::ReadyToProve {
            self.emit(
                colosseum,
                vec![
                    IColosseum::ReadyToProve::SIGNATURE_HASH,
                    word(output_index),
                    challenger.into_word(),
                ],
                Vec::new(),
            );
        }
        Ok(())
    }

    fn prove_fault(
        &mut self,
        challenger: Address,
        output_index: u64,
        position: u64,
        proven_block: u64,
        pair_len: usize,
    ) -> Result<()> {
        match self.status(output_index, challenger) {
            ChallengeStatus::ReadyToProve | ChallengeStatus::AsserterTimeout => {}
            status => bail!("cannot prove fault in status {status:?}"),
        }
        let key = (output_index, challenger);
        let record = self
            .challenges
            .get(&key)
            .ok_or_else(|| anyhow!("no challenge for output {output_index}"))?;
        let segments: Segments = record.challenge.segments();
        if position >= segments.sections() {
            bail!("invalid position {position}");
        }
        let (from_block, to_block) = segments.transition(position)?;
        if to_block != from_block + 1 || proven_block != to_block {
            bail!("public input is for block {proven_block}, not the disputed transition");
        }
        if pair_len != 4 {
            bail!("invalid pair length {pair_len}");
        }

        self.outputs[output_index as usize].output_root = DELETED_OUTPUT_ROOT;
        if let Some(record) = self.challenges.get_mut(&key) {
            record.proven = true;
        }
        Ok(())
    }

    fn challenger_timeout(&mut self, output_index: u64, challenger: Address) -> Result<()> {
        match self.status(output_index, challenger) {
            ChallengeStatus::ChallengerTimeout => {
                self.challenges.remove(&(output_index, challenger));
                Ok(())
            }
            status => bail!("cannot settle a challenger timeout in status {status:?}"),
        }
    }

    fn cancel_challenge(&mut self, challenger: Address, output_index: u64) -> Result<()> {
        if !is_output_deleted(self.output(output_index)?.output_root) {
            bail!("the output has not been deleted");
        }
        match self.status(output_index, challenger) {
            ChallengeStatus::None | ChallengeStatus::Proven | ChallengeStatus::Approved => {
                bail!("no challenge to cancel")
            }
            _ => {
                self.challenges.remove(&(output_index, challenger));
                Ok(())
            }
        }
    }
}

/// The [SimulatedChain] is an in-memory [ChainReader] shared by every validator in a test.
#[derive(Debug)]
pub struct SimulatedChain {
    contracts: ContractAddresses,
    state: Mutex<ChainState>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new(ChainSetup::default())
    }
}

impl SimulatedChain {
    pub fn new(setup: ChainSetup) -> Self {
        Self {
            contracts: ContractAddresses {
                l2_output_oracle: Address::repeat_byte(0x10),
                colosseum: Address::repeat_byte(0xc0),
                security_council: Address::repeat_byte(0x5c),
                validator_pool: Address::repeat_byte(0x90),
                validator_manager: Address::repeat_byte(0x91),
                asset_manager: Address::repeat_byte(0x92),
            },
            state: Mutex::new(ChainState {
                setup,
                timestamp: 1_000,
                head: 1,
                ..Default::default()
            }),
        }
    }

    pub fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    /// Returns a [TxManager] sending from `from` on this chain.
    pub fn signer(self: &Arc<Self>, from: Address) -> SimulatedTxManager {
        SimulatedTxManager {
            chain: Arc::clone(self),
            from,
        }
    }

    pub async fn set_segments_lengths(&self, lengths: Vec<u64>) {
        self.state.lock().await.setup.segments_lengths = lengths;
    }

    /// Makes the next `count` log queries fail with an RPC error.
    pub async fn fail_log_queries(&self, count: u32) {
        self.state.lock().await.failing_log_queries = count;
    }

    pub async fn advance_time(&self, seconds: u64) {
        self.state.lock().await.timestamp += seconds;
    }

    pub async fn timestamp(&self) -> u64 {
        self.state.lock().await.timestamp
    }

    /// Appends an output as if `submitter` had sent `submitL2Output`, returning its index.
    pub async fn submit_output(&self, submitter: Address, output_root: B256, l2_block_number: u64) -> Result<u64> {
        let mut state = self.state.lock().await;
        state.head += 1;
        state.submit_l2_output(submitter, self.contracts.l2_output_oracle, output_root, l2_block_number)?;
        Ok(state.outputs.len() as u64 - 1)
    }

    pub async fn output(&self, output_index: u64) -> Result<CheckpointOutput> {
        self.state.lock().await.output(output_index).copied()
    }

    pub async fn set_pool_balance(&self, validator: Address, balance: U256) {
        self.state.lock().await.pool_balances.insert(validator, balance);
    }

    pub async fn set_pool_next_validator(&self, validator: Address) {
        self.state.lock().await.pool_next_validator = validator;
    }

    pub async fn set_manager_next_validator(&self, validator: Address) {
        self.state.lock().await.manager_next_validator = validator;
    }

    pub async fn set_validator_status(&self, validator: Address, status: ValidatorStatus) {
        self.state.lock().await.validator_statuses.insert(validator, status);
    }

    pub async fn set_kro_not_bonded(&self, validator: Address, amount: U256) {
        self.state.lock().await.kro_not_bonded.insert(validator, amount);
    }

    pub async fn jail(&self, validator: Address) {
        self.state.lock().await.jailed.insert(validator);
    }

    /// Opens a council transaction asking to validate `output_root` at `l2_block_number`, returning its id.
    pub async fn request_validation(&self, output_root: B256, l2_block_number: u64) -> U256 {
        let mut state = self.state.lock().await;
        state.head += 1;
        let id = state.council.len() as u64;
        state.council.push(CouncilTransaction::default());
        let mut data = output_root.to_vec();
        data.extend_from_slice(&U256::from(l2_block_number).to_be_bytes::<32>());
        state.emit(
            self.contracts.security_council,
            vec![ISecurityCouncil::ValidationRequested::SIGNATURE_HASH, word(id)],
            data,
        );
        U256::from(id)
    }

    /// Marks council transaction `id` as executed.
    pub async fn execute_council_transaction(&self, id: U256) -> Result<()> {
        let mut state = self.state.lock().await;
        let tx = state
            .council
            .get_mut(to_u64(id)? as usize)
            .ok_or_else(|| anyhow!("transaction {id} does not exist"))?;
        tx.executed = true;
        Ok(())
    }

    /// Returns every transaction sent so far.
    pub async fn sent(&self) -> Vec<SentTransaction> {
        self.state.lock().await.sent.clone()
    }

    /// Returns the calldata of council transaction `id`.
    pub async fn council_transaction_data(&self, id: U256) -> Option<Bytes> {
        let state = self.state.lock().await;
        state.council.get(to_u64(id).ok()? as usize).map(|tx| tx.data.clone())
    }

    async fn send(&self, from: Address, candidate: TxCandidate) -> TxReceipt {
        let mut state = self.state.lock().await;
        state.head += 1;
        let block_number = state.head;
        let mut preimage = block_number.to_be_bytes().to_vec();
        preimage.extend_from_slice(&candidate.data);
        let tx_hash = keccak256(preimage);

        let success = match state.execute(from, &self.contracts, &candidate.data, candidate.to) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(target: "simulated_chain", %from, "transaction reverted: {err}");
                false
            }
        };
        state.sent.push(SentTransaction {
            from,
            candidate,
            success,
        });
        TxReceipt {
            tx_hash,
            block_number,
            success,
        }
    }
}

#[async_trait::async_trait]
impl ChainReader for SimulatedChain {
    async fn submission_interval(&self) -> Result<u64> {
        Ok(self.state.lock().await.setup.submission_interval)
    }

    async fn l2_block_time(&self) -> Result<u64> {
        Ok(self.state.lock().await.setup.l2_block_time)
    }

    async fn finalization_period_seconds(&self) -> Result<u64> {
        Ok(self.state.lock().await.setup.finalization_period_seconds)
    }

    async fn next_output_index(&self) -> Result<u64> {
        Ok(self.state.lock().await.outputs.len() as u64)
    }

    async fn next_block_number(&self) -> Result<u64> {
        Ok(self.state.lock().await.next_block_number())
    }

    async fn latest_block_number(&self) -> Result<u64> {
        Ok(self.state.lock().await.latest_block_number())
    }

    async fn l2_output(&self, output_index: u64) -> Result<CheckpointOutput> {
        self.state.lock().await.output(output_index).copied()
    }

    async fn l2_output_index_after(&self, l2_block_number: u64) -> Result<u64> {
        let state = self.state.lock().await;
        state
            .outputs
            .iter()
            .position(|o| o.l2_block_number >= l2_block_number)
            .map(|i| i as u64)
            .ok_or_else(|| {
                DisputeError::Rpc(format!("no output at or after block {l2_block_number}")).into()
            })
    }

    async fn is_output_finalized(&self, output_index: u64) -> Result<bool> {
        self.state.lock().await.is_finalized(output_index)
    }

    async fn creation_period_seconds(&self) -> Result<u64> {
        Ok(self.state.lock().await.setup.creation_period_seconds)
    }

    async fn segments_length(&self, turn_index: u64) -> Result<u64> {
        self.state.lock().await.segments_length(turn_index)
    }

    async fn challenge(&self, output_index: u64, challenger: Address) -> Result<Challenge> {
        let state = self.state.lock().await;
        Ok(state
            .challenges
            .get(&(output_index, challenger))
            .map(|r| r.challenge.clone())
            .unwrap_or(Challenge {
                turn: 0,
                timeout_at: 0,
                asserter: Address::ZERO,
                challenger: Address::ZERO,
                segments: Vec::new(),
                seg_size: 0,
                seg_start: 0,
                l1_head: B256::ZERO,
            }))
    }

    async fn challenge_status(&self, output_index: u64, challenger: Address) -> Result<ChallengeStatus> {
        Ok(self.state.lock().await.status(output_index, challenger))
    }

    async fn is_in_creation_period(&self, output_index: u64) -> Result<bool> {
        self.state.lock().await.is_in_creation_period(output_index)
    }

    async fn required_bond_amount(&self) -> Result<U256> {
        Ok(self.state.lock().await.setup.required_bond_amount)
    }

    async fn terminate_output_index(&self) -> Result<u64> {
        Ok(self.state.lock().await.setup.terminate_output_index)
    }

    async fn pool_balance_of(&self, validator: Address) -> Result<U256> {
        let state = self.state.lock().await;
        Ok(state.pool_balances.get(&validator).copied().unwrap_or_default())
    }

    async fn pool_next_validator(&self) -> Result<Address> {
        Ok(self.state.lock().await.pool_next_validator)
    }

    async fn manager_next_validator(&self) -> Result<Address> {
        Ok(self.state.lock().await.manager_next_validator)
    }

    async fn in_jail(&self, validator: Address) -> Result<bool> {
        Ok(self.state.lock().await.jailed.contains(&validator))
    }

    async fn validator_status(&self, validator: Address) -> Result<ValidatorStatus> {
        let state = self.state.lock().await;
        Ok(state
            .validator_statuses
            .get(&validator)
            .copied()
            .unwrap_or(ValidatorStatus::None))
    }

    async fn bond_amount(&self) -> Result<U256> {
        Ok(self.state.lock().await.setup.bond_amount)
    }

    async fn kro_not_bonded(&self, validator: Address) -> Result<U256> {
        let state = self.state.lock().await;
        Ok(state.kro_not_bonded.get(&validator).copied().unwrap_or_default())
    }

    async fn is_transaction_confirmed(&self, transaction_id: U256) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .council
            .get(to_u64(transaction_id)? as usize)
            .map_or(false, |tx| tx.confirmed))
    }

    async fn is_transaction_executed(&self, transaction_id: U256) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .council
            .get(to_u64(transaction_id)? as usize)
            .map_or(false, |tx| tx.executed))
    }

    async fn filter_logs(&self, filter: LogFilter) -> Result<Vec<Log>> {
        let mut state = self.state.lock().await;
        if state.failing_log_queries > 0 {
            state.failing_log_queries -= 1;
            return Err(DisputeError::Rpc("log query failed".to_string()).into());
        }
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                block >= filter.from_block && block <= filter.to_block && filter.matches(log)
            })
            .cloned()
            .collect())
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().await.head)
    }

    async fn estimate_gas(&self, _: Address, _: &TxCandidate, _: GasPriceCaps) -> Result<u64> {
        Ok(SIMULATED_GAS_ESTIMATE)
    }
}

/// A [TxManager] bound to one account of a [SimulatedChain]. Reverted transactions are mined and reported through
/// [TxReceipt::success].
#[derive(Debug, Clone)]
pub struct SimulatedTxManager {
    chain: Arc<SimulatedChain>,
    from: Address,
}

#[async_trait::async_trait]
impl TxManager for SimulatedTxManager {
    fn from(&self) -> Address {
        self.from
    }

    async fn send_transaction(&self, candidate: TxCandidate) -> Result<TxReceipt> {
        Ok(self.chain.send(self.from, candidate).await)
    }

    async fn suggest_gas_price_caps(&self) -> Result<GasPriceCaps> {
        Ok(GasPriceCaps {
            tip_cap: U256::from(1),
            base_fee: U256::from(7),
        })
    }
}
