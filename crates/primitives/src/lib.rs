#![doc = include_str!("../README.md")]

//! Primitives for Balin, a validator for a ZK-fault-proof optimistic rollup.

mod challenge;
pub use challenge::{Challenge, ChallengeStatus, ValidatorStatus};

mod segments;
pub use segments::Segments;

mod output;
pub use output::{
    is_output_deleted, BlockId, CheckpointOutput, L1BlockRef, L2BlockRef, NextBlockHeader,
    OutputRange, OutputResponse, OutputWithProofResponse, Outputs, PublicInputProof, SyncStatus,
    TransactionHash, DELETED_OUTPUT_ROOT, OUTPUT_VERSION_V0,
};

mod round;
pub use round::{is_public_round_slot, RoundInfo, PUBLIC_ROUND_ADDRESS};

mod traits;
pub use traits::{DisputeGame, DisputeSolver};

pub mod rule;
