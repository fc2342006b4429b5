//! The [Segments] type holds one bisection round's claimed output roots along with the range-splitting arithmetic
//! used to narrow the disputed block range between rounds.

use alloy_primitives::B256;
use anyhow::{bail, Result};

/// [Segments] are the `sections + 1` output roots claimed over the block range `[start, start + size]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segments {
    pub start: u64,
    pub size: u64,
    pub hashes: Vec<B256>,
}

impl Segments {
    /// Wraps hashes already laid on chain.
    pub fn new(start: u64, size: u64, hashes: Vec<B256>) -> Self {
        Self { start, size, hashes }
    }

    /// Creates `sections + 1` zeroed slots spanning `[start, start + size]`.
    pub fn new_empty(start: u64, size: u64, sections: u64) -> Self {
        Self {
            start,
            size,
            hashes: vec![B256::ZERO; sections as usize + 1],
        }
    }

    /// Returns the number of sub-ranges the segments split their range into.
    pub fn sections(&self) -> u64 {
        self.hashes.len().saturating_sub(1) as u64
    }

    /// Returns the distance in blocks between two neighbouring slots.
    pub fn degree(&self) -> u64 {
        match self.sections() {
            0 => 0,
            sections => self.size / sections,
        }
    }

    /// Sets the hash of slot `index`.
    pub fn set_hash_value(&mut self, index: usize, hash: B256) -> Result<()> {
        match self.hashes.get_mut(index) {
            Some(slot) => {
                *slot = hash;
                Ok(())
            }
            None => bail!(
                "segment index {index} out of range for {} slots",
                self.hashes.len()
            ),
        }
    }

    /// Returns the block numbers whose output roots fill the slots. The last slot always sits at `start + size`.
    pub fn block_numbers(&self) -> Vec<u64> {
        let degree = self.degree();
        let last = self.hashes.len().saturating_sub(1);
        (0..self.hashes.len())
            .map(|i| {
                if i == last {
                    self.start + self.size
                } else {
                    self.start + i as u64 * degree
                }
            })
            .collect()
    }

    /// Returns the `(start, size)` of the next round given the index of the last slot both parties agree on. The
    /// last section also carries the blocks left over when `size` does not divide evenly.
    ///
    /// ### Takes
    /// - `position`: The last agreed slot, in `[0, sections - 1]`.
    ///
    /// ### Returns
    /// - `(u64, u64)` or [Err]: The narrower range anchored at the agreed slot.
    pub fn next_segments_range(&self, position: u64) -> Result<(u64, u64)> {
        let sections = self.sections();
        if position >= sections {
            bail!("position {position} out of range for {sections} sections");
        }
        let degree = self.degree();
        let start = self.start + position * degree;
        if position == sections - 1 {
            return Ok((start, self.start + self.size - start));
        }
        Ok((start, degree))
    }

    /// Returns the `(from, to)` blocks of the transition following slot `position`.
    pub fn transition(&self, position: u64) -> Result<(u64, u64)> {
        let (start, size) = self.next_segments_range(position)?;
        Ok((start, start + size))
    }

    /// Returns `true` once every section is a single block transition.
    pub fn is_last_round(&self) -> bool {
        self.sections() > 0 && self.size == self.sections()
    }
}
