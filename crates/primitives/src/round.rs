//! Submission round types. The bonding contract names the validator that holds priority for the next output,
//! or the public-round sentinel when any validator may submit.

use alloy_primitives::{address, Address};

/// The "next validator" slot value that opens a public round.
pub const PUBLIC_ROUND_ADDRESS: Address = address!("ffffffffffffffffffffffffffffffffffffffff");

/// Returns `true` if the next-validator slot holds the public-round sentinel.
pub fn is_public_round_slot(next_validator: Address) -> bool {
    next_validator == PUBLIC_ROUND_ADDRESS
}

/// [RoundInfo] describes the current submission round from this validator's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundInfo {
    pub is_public_round: bool,
    pub is_priority_validator: bool,
    pub can_join_public_round: bool,
}

impl RoundInfo {
    /// Derives the round from the next-validator slot.
    ///
    /// ### Takes
    /// - `next_validator`: The address stored in the bonding contract's next-validator slot.
    /// - `me`: This validator's address.
    /// - `allow_public_round`: Whether this validator is configured to submit in public rounds.
    pub fn from_slot(next_validator: Address, me: Address, allow_public_round: bool) -> Self {
        let is_public_round = is_public_round_slot(next_validator);
        Self {
            is_public_round,
            is_priority_validator: !is_public_round && next_validator == me,
            can_join_public_round: allow_public_round,
        }
    }

    /// Returns `true` if this validator may submit in the current round.
    pub fn can_join_round(&self) -> bool {
        let join_priority = !self.is_public_round && self.is_priority_validator;
        let join_public = self.is_public_round && self.can_join_public_round;
        join_priority || join_public
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn public_round_predicate() {
        assert!(is_public_round_slot(Address::repeat_byte(0xff)));
        assert!(!is_public_round_slot(Address::ZERO));
        assert!(!is_public_round_slot(Address::repeat_byte(0xfe)));
    }

    #[test]
    fn can_join_round_truth_table() {
        let cases = [
            // (public, priority, can_join_public, expected)
            (false, false, false, false),
            (false, false, true, false),
            (false, true, false, true),
            (false, true, true, true),
            (true, false, false, false),
            (true, false, true, true),
            (true, true, false, false),
            (true, true, true, true),
        ];
        for (is_public_round, is_priority_validator, can_join_public_round, expected) in cases {
            let round = RoundInfo {
                is_public_round,
                is_priority_validator,
                can_join_public_round,
            };
            assert_eq!(round.can_join_round(), expected, "{round:?}");
        }
    }

    #[test]
    fn round_from_slot() {
        let me = Address::repeat_byte(0x01);
        let other = Address::repeat_byte(0x02);

        let priority = RoundInfo::from_slot(me, me, false);
        assert!(priority.is_priority_validator && priority.can_join_round());

        let someone_else = RoundInfo::from_slot(other, me, true);
        assert!(!someone_else.can_join_round());

        let public = RoundInfo::from_slot(PUBLIC_ROUND_ADDRESS, me, true);
        assert!(public.is_public_round && public.can_join_round());
        assert!(!RoundInfo::from_slot(PUBLIC_ROUND_ADDRESS, me, false).can_join_round());
    }
}
