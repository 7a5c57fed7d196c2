// src/consensus.rs
use log::debug;
use serde::Serialize;

use crate::types::{Direction, Signal, Strength, Vote};

/// Rise/fall/neutral points accumulated from a set of votes.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub rise_count: u32,
    pub fall_count: u32,
    pub neutral_count: u32,
}

impl Tally {
    /// The vote-weight table. Strong votes count twice; neutral votes only
    /// ever land in `neutral_count`.
    pub fn add(&mut self, vote: Vote) {
        match vote {
            Vote::Rise(Strength::Weak) => self.rise_count += 1,
            Vote::Rise(Strength::Strong) => self.rise_count += 2,
            Vote::Fall(Strength::Weak) => self.fall_count += 1,
            Vote::Fall(Strength::Strong) => self.fall_count += 2,
            Vote::Neutral => self.neutral_count += 1,
        }
    }

    /// Strict plurality; every tie is neutral.
    pub fn verdict(&self) -> Direction {
        let Tally { rise_count, fall_count, neutral_count } = *self;
        if rise_count > fall_count && rise_count > neutral_count {
            Direction::Rise
        } else if fall_count > rise_count && fall_count > neutral_count {
            Direction::Fall
        } else {
            Direction::Neutral
        }
    }
}

impl FromIterator<Vote> for Tally {
    fn from_iter<I: IntoIterator<Item = Vote>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for vote in iter {
            tally.add(vote);
        }
        tally
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusResult {
    pub verdict: Direction,
    #[serde(flatten)]
    pub tally: Tally,
}

pub fn aggregate(signals: &[Signal]) -> ConsensusResult {
    let tally: Tally = signals.iter().map(|s| s.vote).collect();
    let verdict = tally.verdict();
    debug!(
        "Consensus: rise {} fall {} neutral {} -> {}",
        tally.rise_count,
        tally.fall_count,
        tally.neutral_count,
        verdict.as_str()
    );
    ConsensusResult { verdict, tally }
}
