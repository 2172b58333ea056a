//! Amortized-rebuild dynamic proposal array: the rebuild that
//! [`crate::DynamicProposalArray`] performs in one O(n) burst is spread
//! across updates, one item migration at a time.

use crate::error::{WeightError, check_index, check_weight, validate_weights};
use crate::{DynamicSampler, IndexSampler, ResizableSampler};
use rand::Rng;

/// Migration steps granted per item per doubling of the running average.
/// Any constant of at least 2 guarantees the cursor reaches the far end
/// before the average finishes a factor-2 drift.
const MIGRATION_RATE: f64 = 2.0;

#[derive(Debug, Clone, Default)]
struct Arena {
    proposals: Vec<usize>,
    back: Vec<usize>,
}

/// Dynamic rejection sampler with constant-bounded per-update work.
///
/// Two proposal arenas coexist: the current arena holds items bucketed at
/// the committed average `avg`, the next arena holds items already
/// re-bucketed at `2·avg` (average drifting up) or `avg/2` (drifting
/// down). A signed cursor records how many items have crossed; when it
/// reaches the item count the arenas swap roles and the doubled (or
/// halved) average is committed. Each update funds a migration budget
/// proportional to how far `log₂(W/n)` has moved since budget was last
/// spent, so the O(n) re-bucketing is paid for in O(1) slices.
///
/// Draws treat both arenas plus the residual slots as one space. Slot
/// masses, in units of `avg`, are 1 for current-arena slots and λ for
/// next-arena slots (λ = 2 or ½); dividing every acceptance probability
/// by `max(1, λ)` keeps them in `[0, 1]` while preserving `w_i / W`
/// exactly, whatever the migration state.
#[derive(Debug, Clone)]
pub struct DynamicProposalArrayStar {
    weights: Vec<f64>,
    residuals: Vec<f64>,
    slots: Vec<Vec<usize>>,
    arenas: [Arena; 2],
    cur: usize,
    cursor: i64,
    total: f64,
    avg: f64,
    prev_avg: f64,
}

impl DynamicProposalArrayStar {
    /// Construct from non-negative weights. O(n).
    ///
    /// # Errors
    /// Same input contract as [`crate::AliasTable::new`].
    pub fn new(weights: &[f64]) -> Result<Self, WeightError> {
        let total = validate_weights(weights)?;
        let n = weights.len();
        let avg = total / n as f64;
        let mut pa = Self {
            weights: weights.to_vec(),
            residuals: vec![0.0; n],
            slots: vec![Vec::new(); n],
            arenas: [
                Arena {
                    proposals: Vec::with_capacity(3 * n),
                    back: Vec::with_capacity(3 * n),
                },
                Arena::default(),
            ],
            cur: 0,
            cursor: 0,
            total,
            avg,
            prev_avg: avg,
        };
        for i in 0..n {
            pa.bucket(i);
        }
        Ok(pa)
    }

    /// Draw a single index, amortized O(1).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.weights.len();
        debug_assert!(n > 0);
        let cur_len = self.arenas[self.cur].proposals.len();
        let nxt_len = self.arenas[1 - self.cur].proposals.len();
        let lambda = self.next_scale();
        let boost = lambda.max(1.0);
        let slots = n + cur_len + nxt_len;
        loop {
            let k = rng.random_range(0..slots);
            if k < n {
                let p_acc = self.residuals[k] * self.scale_of(k) / boost;
                if rng.random::<f64>() < p_acc {
                    return k;
                }
            } else if k < n + cur_len {
                if boost <= 1.0 || rng.random::<f64>() < 1.0 / boost {
                    return self.arenas[self.cur].proposals[k - n];
                }
            } else {
                let p_acc = lambda / boost;
                if p_acc >= 1.0 || rng.random::<f64>() < p_acc {
                    return self.arenas[1 - self.cur].proposals[k - n - cur_len];
                }
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
        self.total += weight - self.weights[index];
        self.weights[index] = weight;
        self.bucket(index);
        self.migrate();
        Ok(())
    }

    /// Append a new index with the given weight, returning it.
    pub fn push(&mut self, weight: f64) -> Result<usize, WeightError> {
        let index = self.weights.len();
        check_weight(index, weight)?;
        self.weights.push(0.0);
        self.residuals.push(0.0);
        self.slots.push(Vec::new());
        if index == 0 && weight > 0.0 {
            // growing back from empty: re-seed the scale
            self.avg = weight;
            self.prev_avg = weight;
            self.cursor = 0;
        }
        self.total += weight;
        self.weights[index] = weight;
        self.bucket(index);
        self.migrate();
        Ok(index)
    }

    /// Remove the last index, returning its weight.
    pub fn pop(&mut self) -> Result<f64, WeightError> {
        let n = self.weights.len();
        if n == 0 {
            return Err(WeightError::PopEmpty);
        }
        let index = n - 1;
        // The last index has never crossed the cursor, so its entries are
        // in the current arena.
        while !self.slots[index].is_empty() {
            self.erase(self.cur, index);
        }
        let weight = self.weights[index];
        self.total -= weight;
        self.weights.pop();
        self.residuals.pop();
        self.slots.pop();
        let n = self.weights.len();
        if n == 0 {
            self.cursor = 0;
        } else if self.cursor.unsigned_abs() as usize == n {
            // every remaining item has crossed; the swap is due now
            let factor = if self.cursor > 0 { 2.0 } else { 0.5 };
            self.commit(factor);
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

    /// True if `index` has already crossed the migration cursor.
    fn crossed(&self, index: usize) -> bool {
        (index as u64) < self.cursor.unsigned_abs()
    }

    /// Scale of the next arena relative to the committed average.
    fn next_scale(&self) -> f64 {
        if self.cursor > 0 {
            2.0
        } else if self.cursor < 0 {
            0.5
        } else {
            1.0
        }
    }

    fn scale_of(&self, index: usize) -> f64 {
        if self.crossed(index) { self.next_scale() } else { 1.0 }
    }

    fn arena_of(&self, index: usize) -> usize {
        if self.crossed(index) { 1 - self.cur } else { self.cur }
    }

    /// Re-home `index` in its owning arena at its current bucket size.
    fn bucket(&mut self, index: usize) {
        let arena = self.arena_of(index);
        let q = self.weights[index] / (self.scale_of(index) * self.avg);
        let count = q.floor();
        let target = count as usize;
        while self.slots[index].len() < target {
            self.insert(arena, index);
        }
        while self.slots[index].len() > target {
            self.erase(arena, index);
        }
        self.residuals[index] = q - count;
    }

    /// Spend the migration budget accrued since `prev_avg`.
    fn migrate(&mut self) {
        let n = self.weights.len();
        let cur_avg = self.total / n as f64;
        if cur_avg <= 0.0 || !cur_avg.is_finite() {
            return;
        }
        let drift = (cur_avg / self.prev_avg).log2();
        let mut steps = (MIGRATION_RATE * n as f64 * drift) as i64;
        if steps == 0 {
            // sub-step drift keeps accruing against the old snapshot
            return;
        }
        if steps > 0 {
            steps += 1;
        } else {
            steps -= 1;
        }
        self.prev_avg = cur_avg;
        // Spend the budget only while the committed average actually lags
        // (or a reversed drift has a partial migration to roll back);
        // surplus steps are discarded, otherwise the generous budget
        // constant would commit the average past the running mean.
        while steps > 0 && (self.cursor < 0 || cur_avg > self.avg) {
            self.step_up();
            steps -= 1;
        }
        while steps < 0 && (self.cursor > 0 || cur_avg < self.avg) {
            self.step_down();
            steps += 1;
        }
    }

    /// One cursor step toward the doubled average.
    fn step_up(&mut self) {
        if self.cursor < 0 {
            // drift reversed mid-shrink: take the last halved item back
            let i = (-self.cursor) as usize - 1;
            self.cursor += 1;
            self.move_item(i, 1 - self.cur, self.cur);
        } else {
            let i = self.cursor as usize;
            self.cursor += 1;
            self.move_item(i, self.cur, 1 - self.cur);
            if self.cursor as usize == self.weights.len() {
                self.commit(2.0);
            }
        }
    }

    /// One cursor step toward the halved average.
    fn step_down(&mut self) {
        if self.cursor > 0 {
            let i = self.cursor as usize - 1;
            self.cursor -= 1;
            self.move_item(i, 1 - self.cur, self.cur);
        } else {
            let i = (-self.cursor) as usize;
            self.cursor -= 1;
            self.move_item(i, self.cur, 1 - self.cur);
            if (-self.cursor) as usize == self.weights.len() {
                self.commit(0.5);
            }
        }
    }

    /// Move all of `index`'s entries from one arena to the other,
    /// re-bucketing at the destination scale. The cursor must already
    /// reflect the destination side.
    fn move_item(&mut self, index: usize, from: usize, to: usize) {
        while !self.slots[index].is_empty() {
            self.erase(from, index);
        }
        let q = self.weights[index] / (self.scale_of(index) * self.avg);
        let count = q.floor();
        for _ in 0..count as usize {
            self.insert(to, index);
        }
        self.residuals[index] = q - count;
    }

    /// Swap arena roles and commit the drifted average.
    fn commit(&mut self, factor: f64) {
        debug_assert!(self.arenas[self.cur].proposals.is_empty());
        self.avg *= factor;
        self.cur = 1 - self.cur;
        self.cursor = 0;
    }

    fn insert(&mut self, arena: usize, index: usize) {
        let a = &mut self.arenas[arena];
        a.back.push(self.slots[index].len());
        self.slots[index].push(a.proposals.len());
        a.proposals.push(index);
    }

    fn erase(&mut self, arena: usize, index: usize) {
        debug_assert!(!self.slots[index].is_empty());
        let list = &self.slots[index];
        let hole = list[list.len() - 1];
        let (moved, moved_ref) = {
            let a = &self.arenas[arena];
            let last = a.proposals.len() - 1;
            (a.proposals[last], a.back[last])
        };
        let a = &mut self.arenas[arena];
        a.proposals[hole] = moved;
        a.back[hole] = moved_ref;
        a.proposals.pop();
        a.back.pop();
        self.slots[moved][moved_ref] = hole;
        self.slots[index].pop();
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let n = self.weights.len();
        assert_eq!(self.residuals.len(), n);
        assert_eq!(self.slots.len(), n);
        if n == 0 {
            assert_eq!(self.cursor, 0);
            return;
        }
        assert!((self.cursor.unsigned_abs() as usize) < n);
        let sum: f64 = self.weights.iter().sum();
        assert!((sum - self.total).abs() <= 1e-9 * (1.0 + sum.abs()));
        let mut owned = [0usize; 2];
        for i in 0..n {
            let arena = self.arena_of(i);
            let q = self.weights[i] / (self.scale_of(i) * self.avg);
            assert_eq!(self.slots[i].len(), q.floor() as usize, "item {i}");
            assert!((0.0..1.0).contains(&self.residuals[i]));
            owned[arena] += self.slots[i].len();
            for (r, &pos) in self.slots[i].iter().enumerate() {
                assert_eq!(self.arenas[arena].proposals[pos], i);
                assert_eq!(self.arenas[arena].back[pos], r);
            }
        }
        for (arena, a) in self.arenas.iter().enumerate() {
            assert_eq!(a.back.len(), a.proposals.len());
            assert_eq!(owned[arena], a.proposals.len(), "arena {arena} has orphan slots");
        }
        if self.cursor == 0 {
            assert!(self.arenas[1 - self.cur].proposals.is_empty());
        }
    }
}

impl IndexSampler for DynamicProposalArrayStar {
    #[inline]
    fn len(&self) -> usize {
        DynamicProposalArrayStar::len(self)
    }
    #[inline]
    fn total(&self) -> f64 {
        DynamicProposalArrayStar::total(self)
    }
    #[inline]
    fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        DynamicProposalArrayStar::sample(self, rng)
    }
}

impl DynamicSampler for DynamicProposalArrayStar {
    #[inline]
    fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        DynamicProposalArrayStar::update(self, index, weight)
    }
}

impl ResizableSampler for DynamicProposalArrayStar {
    #[inline]
    fn push(&mut self, weight: f64) -> Result<usize, WeightError> {
        DynamicProposalArrayStar::push(self, weight)
    }
    #[inline]
    fn pop(&mut self) -> Result<f64, WeightError> {
        DynamicProposalArrayStar::pop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng as _, SeedableRng, rngs::StdRng};

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            DynamicProposalArrayStar::new(&[]),
            Err(WeightError::Empty)
        ));
        assert!(matches!(
            DynamicProposalArrayStar::new(&[0.0]),
            Err(WeightError::ZeroSum)
        ));
        let mut pa = DynamicProposalArrayStar::new(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            pa.update(5, 1.0),
            Err(WeightError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert!(matches!(
            pa.update(0, -3.0),
            Err(WeightError::Negative { .. })
        ));
        assert_eq!(pa.total(), 3.0);
        pa.assert_consistent();
    }

    #[test]
    fn update_keeps_structure_consistent() {
        let mut pa = DynamicProposalArrayStar::new(&[5.0, 1.5, 0.1, 2.0]).unwrap();
        pa.assert_consistent();
        pa.update(0, 2.5).unwrap();
        pa.update(1, 10.0).unwrap();
        pa.update(2, 1.0).unwrap();
        pa.update(3, 0.01).unwrap();
        pa.assert_consistent();
        assert!((pa.total() - 13.51).abs() < 1e-9);
    }

    #[test]
    fn growth_crosses_an_arena_swap() {
        let n = 64;
        let mut pa = DynamicProposalArrayStar::new(&vec![1.0; n]).unwrap();
        let avg_before = pa.avg;
        for round in 1..=4u32 {
            let w = (1 << round) as f64;
            for i in 0..n {
                pa.update(i, w).unwrap();
                pa.assert_consistent();
            }
        }
        // The running average moved by 16x; at least three commits happened.
        assert!(pa.avg >= 8.0 * avg_before, "avg {} vs {}", pa.avg, avg_before);
    }

    #[test]
    fn shrink_crosses_an_arena_swap() {
        let n = 64;
        let mut pa = DynamicProposalArrayStar::new(&vec![16.0; n]).unwrap();
        let avg_before = pa.avg;
        for round in 1..=4u32 {
            let w = 16.0 / (1u32 << round) as f64;
            for i in 0..n {
                pa.update(i, w).unwrap();
                pa.assert_consistent();
            }
        }
        assert!(pa.avg <= avg_before / 8.0, "avg {} vs {}", pa.avg, avg_before);
    }

    #[test]
    fn distribution_is_preserved_across_swaps() {
        let n = 16;
        let mut pa = DynamicProposalArrayStar::new(&vec![1.0; n]).unwrap();
        // Drive the average up by 4x with unequal weights, sampling as we go.
        let mut rng = StdRng::seed_from_u64(17);
        for i in 0..n {
            pa.update(i, (i + 1) as f64).unwrap();
        }
        pa.assert_consistent();
        let total: f64 = (1..=n).map(|i| i as f64).sum();
        let draws = 200_000usize;
        let mut counts = vec![0usize; n];
        for _ in 0..draws {
            counts[pa.sample(&mut rng)] += 1;
        }
        for (i, &c) in counts.iter().enumerate() {
            let p = (i + 1) as f64 / total;
            let emp = c as f64 / draws as f64;
            assert!((emp - p).abs() < 0.01, "i={i} emp={emp} p={p}");
        }
    }

    #[test]
    fn push_and_pop_round_trip() {
        let mut pa = DynamicProposalArrayStar::new(&[1.0, 2.0, 3.0]).unwrap();
        let i = pa.push(4.0).unwrap();
        assert_eq!(i, 3);
        pa.assert_consistent();
        assert_eq!(pa.pop().unwrap(), 4.0);
        pa.assert_consistent();
        assert!((pa.total() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn pop_to_empty_then_refill() {
        let mut pa = DynamicProposalArrayStar::new(&[2.0]).unwrap();
        assert_eq!(pa.pop().unwrap(), 2.0);
        assert!(pa.is_empty());
        assert!(matches!(pa.pop(), Err(WeightError::PopEmpty)));
        let i = pa.push(1_000.0).unwrap();
        assert_eq!(i, 0);
        pa.assert_consistent();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(pa.sample(&mut rng), 0);
    }

    #[test]
    fn random_churn_stays_consistent() {
        let mut rng = StdRng::seed_from_u64(1234);
        let weights: Vec<f64> = (0..128).map(|_| 0.1 + rng.random::<f64>() * 10.0).collect();
        let mut pa = DynamicProposalArrayStar::new(&weights).unwrap();
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
    fn single_hot_index_doubling_stays_bounded() {
        // One index doubling every step drags the average with it; the
        // cursor has to keep up without any single update rebuilding the
        // whole structure.
        let n = 256;
        let mut weights = vec![1e-6; n];
        weights[0] = 1.0;
        let mut pa = DynamicProposalArrayStar::new(&weights).unwrap();
        let mut w = 1.0;
        for _ in 0..64 {
            w *= 2.0;
            pa.update(0, w).unwrap();
            pa.assert_consistent();
        }
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            assert_eq!(pa.sample(&mut rng), 0);
        }
    }
}
