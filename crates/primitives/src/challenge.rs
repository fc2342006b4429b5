//! Types related to a single dispute over an L2 output, as tracked by the Colosseum contract.

use crate::Segments;
use alloy_primitives::{Address, B256};
use anyhow::{bail, Error};
use std::convert::TryFrom;

/// The [ChallengeStatus] enum mirrors the status the Colosseum contract reports for a
/// `(outputIndex, challenger)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeStatus {
    /// No challenge is in progress for the pair.
    None = 0,
    /// The challenger must bisect the asserter's segments.
    ChallengerTurn = 1,
    /// The asserter must bisect the challenger's segments.
    AsserterTurn = 2,
    /// The challenger missed its turn. Anyone may settle the challenge in favor of the asserter.
    ChallengerTimeout = 3,
    /// The asserter missed its turn. The challenger may prove the fault using the stored segments.
    AsserterTimeout = 4,
    /// Bisection reached a single block transition and the challenger may submit a fault proof.
    ReadyToProve = 5,
    /// A fault proof was accepted and the output was deleted.
    Proven = 6,
    /// The security council approved the proven challenge.
    Approved = 7,
}

impl ChallengeStatus {
    /// Returns `true` if no further dispute transaction can change the challenge.
    pub fn is_terminal(&self) -> bool {
        match self {
            ChallengeStatus::None | ChallengeStatus::Proven | ChallengeStatus::Approved => true,
            ChallengeStatus::ChallengerTurn
            | ChallengeStatus::AsserterTurn
            | ChallengeStatus::ChallengerTimeout
            | ChallengeStatus::AsserterTimeout
            | ChallengeStatus::ReadyToProve => false,
        }
    }
}

impl TryFrom<u8> for ChallengeStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChallengeStatus::None),
            1 => Ok(ChallengeStatus::ChallengerTurn),
            2 => Ok(ChallengeStatus::AsserterTurn),
            3 => Ok(ChallengeStatus::ChallengerTimeout),
            4 => Ok(ChallengeStatus::AsserterTimeout),
            5 => Ok(ChallengeStatus::ReadyToProve),
            6 => Ok(ChallengeStatus::Proven),
            7 => Ok(ChallengeStatus::Approved),
            _ => bail!("Invalid challenge status: {value}"),
        }
    }
}

/// The [ValidatorStatus] enum mirrors the status of a validator registered in the ValidatorManager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorStatus {
    None = 0,
    Inactive = 1,
    Active = 2,
    CanStart = 3,
    Started = 4,
    CanSubmitOutput = 5,
}

impl TryFrom<u8> for ValidatorStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValidatorStatus::None),
            1 => Ok(ValidatorStatus::Inactive),
            2 => Ok(ValidatorStatus::Active),
            3 => Ok(ValidatorStatus::CanStart),
            4 => Ok(ValidatorStatus::Started),
            5 => Ok(ValidatorStatus::CanSubmitOutput),
            _ => bail!("Invalid validator status: {value}"),
        }
    }
}

/// The [Challenge] struct is the local view of a challenge record read from the Colosseum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// The number of segment sets laid so far. `0` means no challenge exists.
    pub turn: u8,
    /// The timestamp after which the party to move is considered timed out.
    pub timeout_at: u64,
    pub asserter: Address,
    pub challenger: Address,
    /// The segment hashes laid in the latest turn.
    pub segments: Vec<B256>,
    pub seg_size: u64,
    pub seg_start: u64,
    /// The L1 block hash the challenger committed to when creating the challenge.
    pub l1_head: B256,
}

impl Challenge {
    /// Reconstructs the [Segments] laid in the latest turn.
    pub fn segments(&self) -> Segments {
        Segments::new(self.seg_start, self.seg_size, self.segments.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_from_u8() {
        for raw in 0u8..=7 {
            let status = ChallengeStatus::try_from(raw).unwrap();
            assert_eq!(status as u8, raw);
        }
        assert!(ChallengeStatus::try_from(8).is_err());
    }

    #[test]
    fn terminal_statuses() {
        let terminal = [
            ChallengeStatus::None,
            ChallengeStatus::Proven,
            ChallengeStatus::Approved,
        ];
        for raw in 0u8..=7 {
            let status = ChallengeStatus::try_from(raw).unwrap();
            assert_eq!(status.is_terminal(), terminal.contains(&status));
        }
    }

    #[test]
    fn validator_status_from_u8() {
        assert_eq!(ValidatorStatus::try_from(2).unwrap(), ValidatorStatus::Active);
        assert!(ValidatorStatus::try_from(6).is_err());
    }
}
