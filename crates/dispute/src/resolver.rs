//! The [DisputeResolver] locates the first faulty segment of a challenge and builds the Colosseum transactions that
//! move it forward.

use crate::{
    bindings::IColosseum,
    error::with_timeout,
    proof,
    traits::{ChainReader, L2TraceSource, ProofFetcher, RollupStatusSource, TxCandidate},
    DisputeError,
};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use futures::future::try_join_all;
use balin_primitives::{OutputRange, Outputs, Segments};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Returns the index of the first slot whose hash differs from the local view, if any.
pub fn first_disagreement(remote: &[B256], local: &[B256]) -> Option<usize> {
    remote.iter().zip(local).position(|(r, l)| r != l)
}

/// Reads the output at `output_index` from the oracle and recomputes it locally at the same block.
pub async fn outputs_at_index(
    chain: &dyn ChainReader,
    rollup: &dyn RollupStatusSource,
    output_index: u64,
    timeout: Duration,
) -> Result<Outputs> {
    let remote = with_timeout(timeout, chain.l2_output(output_index))
        .await
        .with_context(|| format!("failed to read output {output_index}"))?;
    let local = with_timeout(timeout, rollup.output_at_block(remote.l2_block_number))
        .await
        .with_context(|| format!("failed to compute output at block {}", remote.l2_block_number))?;
    Ok(Outputs { remote, local })
}

/// The [DisputeResolver] holds the collaborators needed to play the challenger's and the asserter's side of a
/// challenge.
#[derive(Clone)]
pub struct DisputeResolver {
    chain: Arc<dyn ChainReader>,
    rollup: Arc<dyn RollupStatusSource>,
    l2: Arc<dyn L2TraceSource>,
    prover: Option<Arc<dyn ProofFetcher>>,
    colosseum: Address,
    network_timeout: Duration,
    fetching_proof_timeout: Duration,
}

impl DisputeResolver {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        rollup: Arc<dyn RollupStatusSource>,
        l2: Arc<dyn L2TraceSource>,
        prover: Option<Arc<dyn ProofFetcher>>,
        colosseum: Address,
        network_timeout: Duration,
        fetching_proof_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            rollup,
            l2,
            prover,
            colosseum,
            network_timeout,
            fetching_proof_timeout,
        }
    }

    async fn local_root(&self, block_number: u64) -> Result<B256> {
        let output = with_timeout(self.network_timeout, self.rollup.output_at_block(block_number))
            .await
            .with_context(|| format!("failed to compute output at block {block_number}"))?;
        Ok(output.output_root)
    }

    async fn local_roots(&self, block_numbers: &[u64]) -> Result<Vec<B256>> {
        try_join_all(block_numbers.iter().map(|n| self.local_root(*n))).await
    }

    /// Returns the position of the last slot agreed on before the first disagreement.
    ///
    /// ### Takes
    /// - `segments`: The segments laid by the other party.
    ///
    /// ### Returns
    /// - `u64`: The index of the last matching slot.
    /// - [Err] if every slot matches or the very first slot already differs.
    pub async fn select_fault_position(&self, segments: &Segments) -> Result<u64> {
        let local = self.local_roots(&segments.block_numbers()).await?;
        match first_disagreement(&segments.hashes, &local) {
            None => Err(DisputeError::ProtocolInvariant(
                "failed to select fault position: every segment matches".to_string(),
            )
            .into()),
            Some(0) => Err(DisputeError::ProtocolInvariant(
                "the first segment must be matched when bisecting".to_string(),
            )
            .into()),
            Some(i) => Ok(i as u64 - 1),
        }
    }

    /// Fills a new set of segments over `[start, start + size]` with local output roots. The number of slots is
    /// `segmentsLengths(turn_index)`.
    pub async fn build_segments(&self, turn_index: u64, start: u64, size: u64) -> Result<Segments> {
        let length = with_timeout(self.network_timeout, self.chain.segments_length(turn_index))
            .await
            .with_context(|| format!("failed to read segments length of turn {turn_index}"))?;
        if length < 2 {
            return Err(DisputeError::ProtocolInvariant(format!(
                "segments length {length} of turn {turn_index} is too short"
            ))
            .into());
        }

        let mut segments = Segments::new_empty(start, size, length - 1);
        let roots = self.local_roots(&segments.block_numbers()).await?;
        for (i, root) in roots.into_iter().enumerate() {
            segments.set_hash_value(i, root)?;
        }
        Ok(segments)
    }

    /// Builds the `createChallenge` transaction for `range`.
    pub async fn create_challenge(&self, range: &OutputRange) -> Result<TxCandidate> {
        let size = range.end_block.saturating_sub(range.start_block);
        let segments = self.build_segments(0, range.start_block, size).await?;
        debug!(
            output_index = range.output_index,
            start = range.start_block,
            size,
            "built challenge segments"
        );

        let call = IColosseum::createChallengeCall {
            outputIndex: U256::from(range.output_index),
            l1BlockHash: range.l1_origin.hash,
            l1BlockNumber: U256::from(range.l1_origin.number),
            segments: segments.hashes,
        };
        Ok(TxCandidate::new(self.colosseum, call.abi_encode()))
    }

    /// Builds the `bisect` transaction answering the segments currently laid for `(output_index, challenger)`.
    pub async fn bisect(&self, output_index: u64, challenger: Address) -> Result<TxCandidate> {
        let challenge = with_timeout(
            self.network_timeout,
            self.chain.challenge(output_index, challenger),
        )
        .await
        .context("failed to read challenge")?;
        let laid = challenge.segments();
        let position = self.select_fault_position(&laid).await?;
        let (start, size) = laid.next_segments_range(position)?;
        let next = self
            .build_segments(challenge.turn as u64, start, size)
            .await?;
        debug!(output_index, %challenger, position, start, size, "built bisect segments");

        let call = IColosseum::bisectCall {
            outputIndex: U256::from(output_index),
            challenger,
            pos: U256::from(position),
            segments: next.hashes,
        };
        Ok(TxCandidate::new(self.colosseum, call.abi_encode()))
    }

    /// Builds the `proveFaultWithZkEvm` transaction. With `skip_select_position` the proof covers the first
    /// transition of the stored segments.
    pub async fn prove_fault(
        &self,
        output_index: u64,
        challenger: Address,
        skip_select_position: bool,
    ) -> Result<TxCandidate> {
        let challenge = with_timeout(
            self.network_timeout,
            self.chain.challenge(output_index, challenger),
        )
        .await
        .context("failed to read challenge")?;
        let prover = self
            .prover
            .as_ref()
            .ok_or_else(|| DisputeError::Config("no prover endpoint configured".to_string()))?;

        let segments = challenge.segments();
        let position = if skip_select_position {
            0
        } else {
            self.select_fault_position(&segments).await?
        };
        let (block, target) = segments.transition(position)?;
        if target != block + 1 {
            return Err(DisputeError::ProtocolInvariant(format!(
                "disputed transition {block} -> {target} spans more than one block"
            ))
            .into());
        }

        let src = with_timeout(self.network_timeout, self.rollup.output_with_proof_at_block(block))
            .await
            .with_context(|| format!("failed to fetch output with proof at block {block}"))?;
        let dst = with_timeout(self.network_timeout, self.rollup.output_with_proof_at_block(target))
            .await
            .with_context(|| format!("failed to fetch output with proof at block {target}"))?;
        let public_input_proof = proof::public_input_proof(&src, &dst)?;

        let trace = with_timeout(self.network_timeout, self.l2.block_trace(target))
            .await
            .with_context(|| format!("failed to fetch trace of block {target}"))?;
        let trace = serde_json::to_string(&trace)?;
        let fetched = with_timeout(
            self.fetching_proof_timeout,
            prover.fetch_proof_and_pair(&trace),
        )
        .await
        .with_context(|| format!("failed to fetch proof of block {target}"))?;
        let zk_evm_proof = proof::zk_evm_proof(public_input_proof, fetched)?;
        debug!(output_index, %challenger, position, target, "built fault proof");

        let call = IColosseum::proveFaultWithZkEvmCall {
            outputIndex: U256::from(output_index),
            pos: U256::from(position),
            zkEvmProof: zk_evm_proof,
        };
        Ok(TxCandidate::new(self.colosseum, call.abi_encode()))
    }

    pub fn challenger_timeout(&self, output_index: u64, challenger: Address) -> TxCandidate {
        let call = IColosseum::challengerTimeoutCall {
            outputIndex: U256::from(output_index),
            challenger,
        };
        TxCandidate::new(self.colosseum, call.abi_encode())
    }

    pub fn cancel_challenge(&self, output_index: u64) -> TxCandidate {
        let call = IColosseum::cancelChallengeCall {
            outputIndex: U256::from(output_index),
        };
        TxCandidate::new(self.colosseum, call.abi_encode())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::providers::mocks::{MockL2, MockProver, MockRollup, SimulatedChain};
    use alloy_sol_types::SolInterface;
    use balin_primitives::BlockId;

    fn resolver(chain: Arc<SimulatedChain>, rollup: MockRollup) -> DisputeResolver {
        DisputeResolver::new(
            chain,
            Arc::new(rollup),
            Arc::new(MockL2),
            Some(Arc::new(MockProver::default())),
            Address::repeat_byte(0xc0),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn first_disagreement_index() {
        let a = B256::repeat_byte(1);
        let b = B256::repeat_byte(2);
        assert_eq!(first_disagreement(&[a, a, a], &[a, a, a]), None);
        assert_eq!(first_disagreement(&[a, a, b], &[a, a, a]), Some(2));
        assert_eq!(first_disagreement(&[b, a], &[a, a]), Some(0));
    }

    #[tokio::test]
    async fn select_position_before_first_mismatch() {
        let honest = MockRollup::honest();
        let dishonest = MockRollup::diverging_from(650);
        let resolver = resolver(Arc::new(SimulatedChain::default()), honest.clone());

        let block_numbers = [644, 647, 650, 655];
        let mut segments = Segments::new_empty(644, 11, 3);
        for (i, n) in block_numbers.into_iter().enumerate() {
            segments.set_hash_value(i, dishonest.root_at(n)).unwrap();
        }
        assert_eq!(resolver.select_fault_position(&segments).await.unwrap(), 1);

        for (i, n) in block_numbers.into_iter().enumerate() {
            segments.set_hash_value(i, honest.root_at(n)).unwrap();
        }
        let err = resolver.select_fault_position(&segments).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DisputeError>(),
            Some(DisputeError::ProtocolInvariant(_))
        ));
    }

    #[tokio::test]
    async fn mismatched_anchor_is_rejected() {
        let resolver = resolver(
            Arc::new(SimulatedChain::default()),
            MockRollup::diverging_from(0),
        );
        let honest = MockRollup::honest();
        let mut segments = Segments::new_empty(10, 2, 2);
        for (i, n) in [10, 11, 12].into_iter().enumerate() {
            segments.set_hash_value(i, honest.root_at(n)).unwrap();
        }
        let err = resolver.select_fault_position(&segments).await.unwrap_err();
        assert!(err.to_string().contains("first segment must be matched"));
    }

    #[tokio::test]
    async fn create_challenge_lays_round_one_segments() {
        let chain = Arc::new(SimulatedChain::default());
        chain.set_segments_lengths(vec![4, 4, 4, 4]).await;
        let honest = MockRollup::honest();
        let resolver = resolver(chain, honest.clone());

        let range = OutputRange {
            output_index: 7,
            start_block: 600,
            end_block: 700,
            l1_origin: BlockId {
                hash: B256::repeat_byte(0xee),
                number: 120,
            },
        };
        let tx = resolver.create_challenge(&range).await.unwrap();
        assert_eq!(tx.to, Address::repeat_byte(0xc0));

        match IColosseum::IColosseumCalls::abi_decode(&tx.data, true).unwrap() {
            IColosseum::IColosseumCalls::createChallenge(call) => {
                assert_eq!(call.outputIndex, U256::from(7));
                assert_eq!(call.l1BlockNumber, U256::from(120));
                let expected: Vec<B256> =
                    [600, 633, 666, 700].into_iter().map(|n| honest.root_at(n)).collect();
                assert_eq!(call.segments, expected);
            }
            _ => panic!("expected createChallenge"),
        }
    }
}
