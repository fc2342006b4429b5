//! The decision table for a challenge. Given a snapshot of on-chain state, each side of the challenge has exactly one
//! next action. The table is a pure function so that the same snapshot always yields the same action.

use balin_primitives::{ChallengeStatus, DisputeGame, DisputeSolver};

/// A point-in-time view of one `(outputIndex, challenger)` challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeSnapshot {
    pub output_index: u64,
    pub status: ChallengeStatus,
    pub output_deleted: bool,
    pub output_finalized: bool,
}

impl DisputeGame for ChallengeSnapshot {
    fn output_index(&self) -> u64 {
        self.output_index
    }

    fn status(&self) -> ChallengeStatus {
        self.status
    }

    fn is_output_deleted(&self) -> bool {
        self.output_deleted
    }

    fn is_output_finalized(&self) -> bool {
        self.output_finalized
    }
}

/// The [ChallengeAction] enum describes the move a side of the challenge should make next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeAction {
    /// Nothing left to do for this challenge.
    Stop,
    /// The other side has to move. Poll again later.
    Wait,
    /// Lay the next set of segments.
    Bisect,
    /// Settle a challenge whose challenger missed its turn.
    ChallengerTimeout,
    /// Withdraw a challenge against an output that has already been deleted.
    CancelChallenge,
    /// Submit the fault proof. When `skip_select_position` is set the stored segments are used as is.
    ProveFault { skip_select_position: bool },
}

/// The side of a challenge this validator plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeRole {
    /// Submitted the disputed output.
    Asserter,
    /// Opened the challenge.
    Challenger,
}

impl DisputeSolver<ChallengeSnapshot, ChallengeAction> for ChallengeRole {
    fn respond(&self, game: &ChallengeSnapshot) -> ChallengeAction {
        match self {
            ChallengeRole::Asserter => asserter_action(game),
            ChallengeRole::Challenger => challenger_action(game),
        }
    }
}

fn asserter_action(game: &ChallengeSnapshot) -> ChallengeAction {
    let status = game.status();
    if status.is_terminal() || game.is_output_deleted() {
        return ChallengeAction::Stop;
    }
    if game.is_output_finalized() && status != ChallengeStatus::ChallengerTimeout {
        return ChallengeAction::Stop;
    }

    match status {
        ChallengeStatus::AsserterTurn => ChallengeAction::Bisect,
        ChallengeStatus::ChallengerTimeout => ChallengeAction::ChallengerTimeout,
        ChallengeStatus::ChallengerTurn
        | ChallengeStatus::AsserterTimeout
        | ChallengeStatus::ReadyToProve => ChallengeAction::Wait,
        ChallengeStatus::None | ChallengeStatus::Proven | ChallengeStatus::Approved => {
            ChallengeAction::Stop
        }
    }
}

fn challenger_action(game: &ChallengeSnapshot) -> ChallengeAction {
    let status = game.status();
    if status.is_terminal() {
        return ChallengeAction::Stop;
    }
    if game.is_output_deleted() && status != ChallengeStatus::ChallengerTimeout {
        return ChallengeAction::CancelChallenge;
    }
    if game.is_output_finalized() {
        return ChallengeAction::Stop;
    }

    match status {
        ChallengeStatus::ChallengerTurn => ChallengeAction::Bisect,
        ChallengeStatus::AsserterTimeout => ChallengeAction::ProveFault {
            skip_select_position: true,
        },
        ChallengeStatus::ReadyToProve => ChallengeAction::ProveFault {
            skip_select_position: false,
        },
        ChallengeStatus::AsserterTurn | ChallengeStatus::ChallengerTimeout => {
            ChallengeAction::Wait
        }
        ChallengeStatus::None | ChallengeStatus::Proven | ChallengeStatus::Approved => {
            ChallengeAction::Stop
        }
    }
}
