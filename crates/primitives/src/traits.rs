//! The traits module contains traits used throughout the library.

use crate::ChallengeStatus;

/// The [DisputeGame] trait describes a dispute over a single submitted L2 output. It has several key properties:
///
/// - It is keyed by the index of the disputed output in the L2OutputOracle.
/// - It reports the [ChallengeStatus] of the challenge between the asserter of the output and one challenger.
/// - It knows whether the disputed output has been deleted or finalized, either of which ends the dispute for at
///   least one side.
pub trait DisputeGame {
    /// Returns the index of the disputed output.
    fn output_index(&self) -> u64;

    /// Returns the current status of the challenge.
    fn status(&self) -> ChallengeStatus;

    /// Returns `true` if the disputed output root has been replaced with the deletion sentinel.
    fn is_output_deleted(&self) -> bool;

    /// Returns `true` if the disputed output is past its finalization period.
    fn is_output_finalized(&self) -> bool;
}

/// The [DisputeSolver] trait describes the base functionality of a solver for a [DisputeGame]. A solver represents
/// one side of the dispute and decides the next move for that side.
pub trait DisputeSolver<DG: DisputeGame, R> {
    /// Returns the response of the solver provided a [DisputeGame]. The consumer of the response is responsible for
    /// dispatching the action associated with it.
    fn respond(&self, game: &DG) -> R;
}
