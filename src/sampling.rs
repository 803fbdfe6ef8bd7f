//! Negative sampling.
//!
//! Margin-trained models contrast every observed triplet with one corrupted
//! counterpart. The models only rely on the [`NegativeSampler`] contract;
//! how candidates are drawn is the sampler's business.
//!
//! # Key Types
//!
//! - [`NegativeSampler`] - the contract: true triplet in, corrupted triplet out
//! - [`CorruptingSampler`] - replaces head or tail with a uniformly drawn entity
//! - [`ScriptedSampler`] - replays a fixed sequence of negatives

use crate::error::{Error, Result};
use crate::model::Triplet;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::collections::HashSet;

/// Source of corrupted triplets for margin-based training.
pub trait NegativeSampler {
    /// Produce a negative counterpart of `true_triplet`.
    ///
    /// Failure is reported as [`Error::Sampler`] and is not retried by the
    /// caller.
    fn sample_false_triplet(&mut self, true_triplet: &Triplet) -> Result<Triplet>;
}

impl<F> NegativeSampler for F
where
    F: FnMut(&Triplet) -> Result<Triplet>,
{
    fn sample_false_triplet(&mut self, true_triplet: &Triplet) -> Result<Triplet> {
        self(true_triplet)
    }
}

/// Corrupts the head or the tail (fair coin) with a uniformly drawn entity.
///
/// The relation is always kept and the drawn entity always differs from the
/// one it replaces. When built [`with_known`](Self::with_known), candidates
/// that are known true facts are redrawn up to [`Self::MAX_REDRAWS`] times;
/// after that the last structurally different candidate is returned.
#[derive(Debug, Clone)]
pub struct CorruptingSampler {
    num_entities: usize,
    known: HashSet<Triplet>,
    rng: XorShiftRng,
}

impl CorruptingSampler {
    /// Redraw budget for filtering known facts.
    pub const MAX_REDRAWS: usize = 16;

    /// Create a sampler over `num_entities` entities.
    pub fn new(num_entities: usize, seed: u64) -> Self {
        Self {
            num_entities,
            known: HashSet::new(),
            rng: XorShiftRng::seed_from_u64(seed),
        }
    }

    /// Avoid returning any of `triplets` when possible.
    pub fn with_known(mut self, triplets: &[Triplet]) -> Self {
        self.known.extend(triplets.iter().copied());
        self
    }

    /// Draw an entity uniformly from all entities except `excluded`.
    fn draw_other(&mut self, excluded: usize) -> usize {
        let drawn = self.rng.random_range(0..self.num_entities - 1);
        if drawn >= excluded {
            drawn + 1
        } else {
            drawn
        }
    }

    fn corrupt(&mut self, triplet: &Triplet) -> Triplet {
        if self.rng.random_bool(0.5) {
            triplet.with_head(self.draw_other(triplet.head))
        } else {
            triplet.with_tail(self.draw_other(triplet.tail))
        }
    }
}

impl NegativeSampler for CorruptingSampler {
    fn sample_false_triplet(&mut self, true_triplet: &Triplet) -> Result<Triplet> {
        if self.num_entities < 2 {
            return Err(Error::Sampler(format!(
                "cannot corrupt {:?}: need at least 2 entities, have {}",
                true_triplet, self.num_entities
            )));
        }
        if true_triplet.head >= self.num_entities || true_triplet.tail >= self.num_entities {
            return Err(Error::Sampler(format!(
                "{:?} references an entity outside 0..{}",
                true_triplet, self.num_entities
            )));
        }

        let mut candidate = self.corrupt(true_triplet);
        for _ in 0..Self::MAX_REDRAWS {
            if !self.known.contains(&candidate) {
                break;
            }
            candidate = self.corrupt(true_triplet);
        }
        Ok(candidate)
    }
}

/// Replays a fixed list of negatives in order, wrapping around at the end.
///
/// Useful for reproducing a training run exactly, independent of any RNG.
#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    negatives: Vec<Triplet>,
    cursor: usize,
}

impl ScriptedSampler {
    pub fn new(negatives: Vec<Triplet>) -> Self {
        Self {
            negatives,
            cursor: 0,
        }
    }

    /// Number of negatives handed out so far.
    pub fn served(&self) -> usize {
        self.cursor
    }
}

impl NegativeSampler for ScriptedSampler {
    fn sample_false_triplet(&mut self, true_triplet: &Triplet) -> Result<Triplet> {
        if self.negatives.is_empty() {
            return Err(Error::Sampler(format!(
                "no scripted negative available for {:?}",
                true_triplet
            )));
        }
        let negative = self.negatives[self.cursor % self.negatives.len()];
        self.cursor += 1;
        Ok(negative)
    }
}
