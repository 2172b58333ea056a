//! Dynamic proposal array: point updates, push and pop on top of the
//! rejection scheme of [`crate::ProposalArray`].

use crate::error::{WeightError, check_index, check_weight, validate_weights};
use crate::{DynamicSampler, IndexSampler, ResizableSampler};
use rand::Rng;

/// Dynamic rejection sampler with O(1) amortized updates.
///
/// The proposal list `P` holds index `i` exactly `⌊w_i/avg⌋` times, with
/// the fractional leftover in a residual slot, exactly as in the static
/// sampler. Mutability comes from a reverse index: `slots[i]` lists the
/// positions of `i` in `P`, and `back[p]` records which entry of
/// `slots[P[p]]` points at `p`, so a single occurrence can be
/// swap-removed in O(1).
///
/// `avg` is only re-committed when the running mean leaves the band
/// `[avg/2, 2·avg]`; crossing the band triggers a full O(n) rebuild,
/// everything else is O(1) bookkeeping. The sampling distribution is
/// exact for any committed `avg`; the band only bounds the expected
/// number of rejections.
#[derive(Debug, Clone)]
pub struct DynamicProposalArray {
    weights: Vec<f64>,
    residuals: Vec<f64>,
    proposals: Vec<usize>,
    back: Vec<usize>,
    slots: Vec<Vec<usize>>,
    total: f64,
    avg: f64,
}

impl DynamicProposalArray {
    /// Construct from non-negative weights. O(n).
    ///
    /// # Errors
    /// Same input contract as [`crate::AliasTable::new`].
    pub fn new(weights: &[f64]) -> Result<Self, WeightError> {
        let total = validate_weights(weights)?;
        let n = weights.len();
        let mut pa = Self {
            weights: weights.to_vec(),
            residuals: vec![0.0; n],
            proposals: Vec::with_capacity(3 * n),
            back: Vec::with_capacity(3 * n),
            slots: vec![Vec::new(); n],
            total,
            avg: total / n as f64,
        };
        pa.rebuild();
        Ok(pa)
    }

    /// Draw a single index, amortized O(1).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.weights.len();
        debug_assert!(n > 0);
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

    /// Set the weight of an existing index.
    ///
    /// # Errors
    /// [`WeightError::IndexOutOfRange`] or an invalid weight; the sampler
    /// is unchanged on error.
    pub fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        check_index(index, self.weights.len())?;
        check_weight(index, weight)?;
        self.apply(index, weight);
        Ok(())
    }

    /// Append a new index with the given weight, returning it.
    pub fn push(&mut self, weight: f64) -> Result<usize, WeightError> {
        let index = self.weights.len();
        check_weight(index, weight)?;
        self.weights.push(0.0);
        self.residuals.push(0.0);
        self.slots.push(Vec::new());
        self.apply(index, weight);
        Ok(index)
    }

    /// Remove the last index, returning its weight.
    pub fn pop(&mut self) -> Result<f64, WeightError> {
        let n = self.weights.len();
        if n == 0 {
            return Err(WeightError::PopEmpty);
        }
        let index = n - 1;
        while !self.slots[index].is_empty() {
            self.erase(index);
        }
        let weight = self.weights[index];
        self.total -= weight;
        self.weights.pop();
        self.residuals.pop();
        self.slots.pop();
        if n > 1 {
            let new_avg = self.total / (n - 1) as f64;
            if (new_avg < self.avg / 2.0 || new_avg > 2.0 * self.avg) && new_avg > 0.0 {
                self.avg = new_avg;
                self.rebuild();
            }
        }
        Ok(weight)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the sampler holds no items.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Current total weight.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Weight of a single index.
    pub fn weight(&self, index: usize) -> Option<f64> {
        self.weights.get(index).copied()
    }

    fn apply(&mut self, index: usize, weight: f64) {
        self.total += weight - self.weights[index];
        self.weights[index] = weight;
        let new_avg = self.total / self.weights.len() as f64;
        if (new_avg < self.avg / 2.0 || new_avg > 2.0 * self.avg) && new_avg > 0.0 {
            self.avg = new_avg;
            self.rebuild();
        } else {
            let q = weight / self.avg;
            let count = q.floor();
            let target = count as usize;
            while self.slots[index].len() < target {
                self.insert(index);
            }
            while self.slots[index].len() > target {
                self.erase(index);
            }
            self.residuals[index] = q - count;
        }
    }

    fn rebuild(&mut self) {
        self.proposals.clear();
        self.back.clear();
        for list in &mut self.slots {
            list.clear();
        }
        for i in 0..self.weights.len() {
            let q = self.weights[i] / self.avg;
            let count = q.floor();
            for _ in 0..count as usize {
                self.insert(i);
            }
            self.residuals[i] = q - count;
        }
    }

    /// Append one occurrence of `index` to the proposal list.
    fn insert(&mut self, index: usize) {
        self.back.push(self.slots[index].len());
        self.slots[index].push(self.proposals.len());
        self.proposals.push(index);
    }

    /// Swap-remove the most recent occurrence of `index`. The tail slot
    /// is moved into the hole and its owner's reverse entry is re-aimed.
    fn erase(&mut self, index: usize) {
        debug_assert!(!self.slots[index].is_empty());
        let list = &self.slots[index];
        let hole = list[list.len() - 1];
        let last = self.proposals.len() - 1;
        let moved = self.proposals[last];
        let moved_ref = self.back[last];
        self.proposals[hole] = moved;
        self.back[hole] = moved_ref;
        self.slots[moved][moved_ref] = hole;
        self.slots[index].pop();
        self.proposals.pop();
        self.back.pop();
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let n = self.weights.len();
        assert_eq!(self.residuals.len(), n);
        assert_eq!(self.slots.len(), n);
        assert_eq!(self.back.len(), self.proposals.len());
        let sum: f64 = self.weights.iter().sum();
        assert!((sum - self.total).abs() <= 1e-9 * (1.0 + sum.abs()));
        for (i, list) in self.slots.iter().enumerate() {
            assert_eq!(list.len(), (self.weights[i] / self.avg).floor() as usize);
            assert!((0.0..1.0).contains(&self.residuals[i]));
            for (r, &pos) in list.iter().enumerate() {
                assert_eq!(self.proposals[pos], i);
                assert_eq!(self.back[pos], r);
            }
        }
        for (pos, &item) in self.proposals.iter().enumerate() {
            assert_eq!(self.slots[item][self.back[pos]], pos);
        }
    }
}

impl IndexSampler for DynamicProposalArray {
    #[inline]
    fn len(&self) -> usize {
        DynamicProposalArray::len(self)
    }
    #[inline]
    fn total(&self) -> f64 {
        DynamicProposalArray::total(self)
    }
    #[inline]
    fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        DynamicProposalArray::sample(self, rng)
    }
}

impl DynamicSampler for DynamicProposalArray {
    #[inline]
    fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        DynamicProposalArray::update(self, index, weight)
    }
}

impl ResizableSampler for DynamicProposalArray {
    #[inline]
    fn push(&mut self, weight: f64) -> Result<usize, WeightError> {
        DynamicProposalArray::push(self, weight)
    }
    #[inline]
    fn pop(&mut self) -> Result<f64, WeightError> {
        DynamicProposalArray::pop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng as _, SeedableRng, rngs::StdRng};

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            DynamicProposalArray::new(&[]),
            Err(WeightError::Empty)
        ));
        assert!(matches!(
            DynamicProposalArray::new(&[0.0, 0.0]),
            Err(WeightError::ZeroSum)
        ));
        let mut pa = DynamicProposalArray::new(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            pa.update(2, 1.0),
            Err(WeightError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            pa.update(0, f64::NAN),
            Err(WeightError::NonFinite { .. })
        ));
        assert!(matches!(
            pa.update(0, -1.0),
            Err(WeightError::Negative { .. })
        ));
        assert!(matches!(pa.push(f64::INFINITY), Err(WeightError::NonFinite { .. })));
        // Rejected calls leave the structure untouched.
        assert_eq!(pa.len(), 2);
        assert_eq!(pa.total(), 3.0);
        pa.assert_consistent();
    }

    #[test]
    fn update_keeps_structure_consistent() {
        let mut pa = DynamicProposalArray::new(&[5.0, 1.5, 0.1, 2.0]).unwrap();
        pa.assert_consistent();
        pa.update(0, 2.5).unwrap();
        pa.update(1, 10.0).unwrap();
        pa.update(2, 1.0).unwrap();
        pa.update(3, 0.01).unwrap();
        pa.assert_consistent();
        assert!((pa.total() - 13.51).abs() < 1e-9);
    }

    #[test]
    fn noop_update_preserves_total() {
        let mut pa = DynamicProposalArray::new(&[5.0, 1.5, 0.1, 2.0]).unwrap();
        let before = pa.total();
        pa.update(1, 1.5).unwrap();
        assert_eq!(pa.total(), before);
        pa.assert_consistent();
    }

    #[test]
    fn push_and_pop_round_trip() {
        let mut pa = DynamicProposalArray::new(&[1.0, 2.0, 3.0]).unwrap();
        let i = pa.push(4.0).unwrap();
        assert_eq!(i, 3);
        assert_eq!(pa.len(), 4);
        assert!((pa.total() - 10.0).abs() < 1e-12);
        pa.assert_consistent();
        let w = pa.pop().unwrap();
        assert_eq!(w, 4.0);
        assert_eq!(pa.len(), 3);
        assert!((pa.total() - 6.0).abs() < 1e-12);
        pa.assert_consistent();
    }

    #[test]
    fn pop_to_empty_then_refill() {
        let mut pa = DynamicProposalArray::new(&[2.0]).unwrap();
        assert_eq!(pa.pop().unwrap(), 2.0);
        assert!(pa.is_empty());
        assert!(matches!(pa.pop(), Err(WeightError::PopEmpty)));
        let i = pa.push(7.0).unwrap();
        assert_eq!(i, 0);
        pa.assert_consistent();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pa.sample(&mut rng), 0);
    }

    #[test]
    fn rebuild_triggers_on_average_drift() {
        let mut pa = DynamicProposalArray::new(&[1.0; 64]).unwrap();
        // Blow one weight up far outside the band, then back down.
        pa.update(7, 1_000.0).unwrap();
        pa.assert_consistent();
        pa.update(7, 0.001).unwrap();
        pa.assert_consistent();
    }

    #[test]
    fn random_churn_stays_consistent() {
        let mut rng = StdRng::seed_from_u64(99);
        let weights: Vec<f64> = (0..128).map(|_| rng.random::<f64>() * 10.0).collect();
        let mut pa = DynamicProposalArray::new(&weights).unwrap();
        for step in 0..5_000 {
            match step % 5 {
                0 | 1 | 2 => {
                    let i = rng.random_range(0..pa.len());
                    pa.update(i, rng.random::<f64>() * 10.0).unwrap();
                }
                3 => {
                    pa.push(rng.random::<f64>() * 10.0).unwrap();
                }
                _ => {
                    if pa.len() > 1 {
                        pa.pop().unwrap();
                    }
                }
            }
            let _ = pa.sample(&mut rng);
        }
        pa.assert_consistent();
    }

    #[test]
    fn roughly_matches_distribution_after_updates() {
        let mut pa = DynamicProposalArray::new(&[5.0, 1.5, 0.1, 2.0]).unwrap();
        pa.update(0, 2.5).unwrap();
        pa.update(1, 10.0).unwrap();
        pa.update(2, 1.0).unwrap();
        pa.update(3, 0.01).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let draws = 200_000usize;
        let mut counts = vec![0usize; 4];
        for _ in 0..draws {
            counts[pa.sample(&mut rng)] += 1;
        }
        let expected = [2.5, 10.0, 1.0, 0.01];
        for (i, &c) in counts.iter().enumerate() {
            let p = expected[i] / 13.51;
            let emp = c as f64 / draws as f64;
            assert!((emp - p).abs() < 0.01, "i={i} emp={emp} p={p}");
        }
    }
}
