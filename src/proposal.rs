//! Static proposal array: rejection sampling against a padded index list.

use crate::error::{WeightError, validate_weights};
use crate::IndexSampler;
use rand::Rng;

/// Static rejection sampler with amortized O(1) draws.
///
/// Index `i` appears `⌊w_i/avg⌋` times in the proposal list, where `avg`
/// is the mean weight; the fractional leftover lives in a per-index
/// residual slot and acts as an acceptance probability. A draw lands on a
/// residual slot or a proposal slot with equal probability per slot, so
/// the accepted index is distributed as `w_i / W`.
#[derive(Debug, Clone)]
pub struct ProposalArray {
    residuals: Vec<f64>,
    proposals: Vec<usize>,
    total: f64,
}

impl ProposalArray {
    /// Construct from non-negative weights. O(n) time and space.
    ///
    /// # Errors
    /// Same input contract as [`crate::AliasTable::new`].
    pub fn new(weights: &[f64]) -> Result<Self, WeightError> {
        let total = validate_weights(weights)?;
        let n = weights.len();
        let avg = total / n as f64;

        let mut residuals = vec![0.0f64; n];
        let mut proposals = Vec::with_capacity(n);
        for (i, &w) in weights.iter().enumerate() {
            let q = w / avg;
            let count = q.floor();
            for _ in 0..count as usize {
                proposals.push(i);
            }
            residuals[i] = q - count;
        }

        Ok(Self {
            residuals,
            proposals,
            total,
        })
    }

    /// Draw a single index, amortized O(1).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.residuals.len();
        let slots = n + self.proposals.len();
        loop {
            let k = rng.random_range(0..slots);
            if k < n {
                if rng.random::<f64>() < self.residuals[k] {
                    return k;
                }
            } else {
                return self.proposals[k - n];
            }
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.residuals.len()
    }

    /// Whether the sampler is empty. Never true for a constructed one.
    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty()
    }

    /// Total weight the sampler was built from.
    pub fn total(&self) -> f64 {
        self.total
    }
}

impl IndexSampler for ProposalArray {
    #[inline]
    fn len(&self) -> usize {
        ProposalArray::len(self)
    }
    #[inline]
    fn total(&self) -> f64 {
        ProposalArray::total(self)
    }
    #[inline]
    fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        ProposalArray::sample(self, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(ProposalArray::new(&[]), Err(WeightError::Empty)));
        assert!(matches!(
            ProposalArray::new(&[0.0]),
            Err(WeightError::ZeroSum)
        ));
        assert!(matches!(
            ProposalArray::new(&[1.0, -1.0]),
            Err(WeightError::Negative { .. })
        ));
    }

    #[test]
    fn proposal_counts_match_weights() {
        let weights = [5.0, 1.5, 0.1, 2.0];
        let pa = ProposalArray::new(&weights).unwrap();
        let avg = 8.6 / 4.0;
        for (i, &w) in weights.iter().enumerate() {
            let count = pa.proposals.iter().filter(|&&p| p == i).count();
            assert_eq!(count, (w / avg).floor() as usize);
            let q = w / avg;
            assert!((pa.residuals[i] - (q - q.floor())).abs() < 1e-12);
        }
    }

    #[test]
    fn roughly_matches_distribution() {
        let weights = [5.0, 1.5, 0.1, 2.0];
        let pa = ProposalArray::new(&weights).unwrap();
        let mut rng = StdRng::seed_from_u64(23);
        let draws = 100_000usize;
        let mut counts = vec![0usize; weights.len()];
        for _ in 0..draws {
            counts[pa.sample(&mut rng)] += 1;
        }
        for (i, &c) in counts.iter().enumerate() {
            let p = weights[i] / 8.6;
            let emp = c as f64 / draws as f64;
            assert!((emp - p).abs() < 0.01, "i={i} emp={emp} p={p}");
        }
    }

    #[test]
    fn degenerate_singleton() {
        let pa = ProposalArray::new(&[0.25]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            assert_eq!(pa.sample(&mut rng), 0);
        }
    }
}
