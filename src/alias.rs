//! Walker's alias method: O(1) draws from a fixed discrete distribution.

use crate::error::{WeightError, validate_weights};
use crate::IndexSampler;
use rand::Rng;

/// Classification slack around a threshold of 1. Accumulated rounding can
/// leave an entry oscillating between the underfull and overfull stacks;
/// anything this close to 1 is treated as exactly full.
const SLACK: f64 = 1e-7;

/// Static alias table. Built once from a weight vector, never mutated.
///
/// Entry `i` carries a threshold in `[0, 1]` and an alias index; a draw
/// picks a uniform entry and keeps it or follows the alias. Two random
/// numbers and one comparison per sample.
#[derive(Debug, Clone)]
pub struct AliasTable {
    threshold: Vec<f64>,
    alias: Vec<usize>,
    total: f64,
}

impl AliasTable {
    /// Construct from non-negative weights. O(n).
    ///
    /// # Errors
    /// [`WeightError::Empty`], [`WeightError::NonFinite`],
    /// [`WeightError::Negative`] or [`WeightError::ZeroSum`] if the input
    /// is not a usable distribution.
    pub fn new(weights: &[f64]) -> Result<Self, WeightError> {
        let total = validate_weights(weights)?;
        let n = weights.len();

        // Scale so the average entry holds exactly 1.
        let mut threshold: Vec<f64> = weights.iter().map(|&w| w * n as f64 / total).collect();
        let mut alias: Vec<usize> = (0..n).collect();

        let mut underfull = Vec::with_capacity(n);
        let mut overfull = Vec::with_capacity(n);
        for i in 0..n {
            let t = threshold[i];
            if t < 1.0 - SLACK {
                underfull.push(i);
            } else if t > 1.0 + SLACK {
                overfull.push(i);
            } else {
                threshold[i] = 1.0;
            }
        }

        // Pair one underfull entry with one overfull donor at a time. The
        // underfull entry keeps its pre-update threshold; the donor sheds
        // the mass that tops the entry up to 1 and is reclassified.
        while let (Some(u), Some(o)) = (underfull.pop(), overfull.pop()) {
            alias[u] = o;
            threshold[o] -= 1.0 - threshold[u];
            let t = threshold[o];
            if t < 1.0 - SLACK {
                underfull.push(o);
            } else if t > 1.0 + SLACK {
                overfull.push(o);
            } else {
                threshold[o] = 1.0;
            }
        }

        // Whichever stack survives holds entries within rounding of full.
        for i in underfull.into_iter().chain(overfull) {
            threshold[i] = 1.0;
            alias[i] = i;
        }

        Ok(Self {
            threshold,
            alias,
            total,
        })
    }

    /// Draw a single index in O(1).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let i = rng.random_range(0..self.threshold.len());
        if rng.random::<f64>() < self.threshold[i] {
            i
        } else {
            self.alias[i]
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.threshold.len()
    }

    /// Whether the table is empty. Never true for a constructed table.
    pub fn is_empty(&self) -> bool {
        self.threshold.is_empty()
    }

    /// Total weight the table was built from.
    pub fn total(&self) -> f64 {
        self.total
    }
}

impl IndexSampler for AliasTable {
    #[inline]
    fn len(&self) -> usize {
        AliasTable::len(self)
    }
    #[inline]
    fn total(&self) -> f64 {
        AliasTable::total(self)
    }
    #[inline]
    fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        AliasTable::sample(self, rng)
    }
}
