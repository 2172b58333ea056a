//! Logarithmic cascade: items bucketed by power-of-two weight class, with
//! the bucket sums themselves re-bucketed for `K` layers.

use crate::error::{WeightError, check_index, check_weight, validate_weights};
use crate::{DynamicSampler, IndexSampler, ResizableSampler};
use rand::Rng;

/// Weights are expected to span at most `n^ALPHA` in magnitude; the
/// partition table is sized for that range at construction.
const ALPHA: u32 = 3;

/// One layer of the cascade: per-partition entry lists with a reverse
/// index, plus the layer's own weight vector (which the layer above
/// partitions in turn).
#[derive(Debug, Clone, Default)]
struct Layer {
    /// `partitions[p]` lists `(child index, acceptance probability)`.
    partitions: Vec<Vec<(usize, f64)>>,
    /// Position of each child's entry inside its partition.
    slots: Vec<usize>,
    weights: Vec<f64>,
}

/// `K`-layer bucketed rejection sampler with O(K) draws and updates.
///
/// Every item of a layer goes into the partition of its power-of-two
/// magnitude class; within a partition all weights lie in
/// `(w_max/2, w_max]`, so rejection against `w/w_max` accepts with
/// probability above one half. The top layer holds `m = O(log n)`
/// partition sums and is walked linearly.
#[derive(Debug, Clone)]
pub struct LogCascade<const K: usize> {
    layers: Vec<Layer>,
    total: f64,
    /// Partition count per layer.
    m: usize,
    /// Partition index of weight 1; classes below it hold sub-unit weights.
    offset: usize,
}

impl<const K: usize> LogCascade<K> {
    /// Construct from non-negative weights. O(n·K).
    ///
    /// The partition range is fixed here from the initial item count;
    /// weights pushed or updated later should stay within `[0, n^3]` of
    /// the construction-time `n` (floored at 2).
    ///
    /// # Errors
    /// Same input contract as [`crate::AliasTable::new`].
    pub fn new(weights: &[f64]) -> Result<Self, WeightError> {
        assert!(K >= 1, "cascade needs at least one layer");
        let total = validate_weights(weights)?;
        let log_n = (weights.len().max(2) as f64).log2();
        let offset = (2.0 * log_n).ceil() as usize;
        let m = offset + (ALPHA as f64 * log_n).ceil() as usize + 1;

        let mut layers = vec![Layer::default(); K + 1];
        layers[K].weights = weights.to_vec();
        for l in (1..=K).rev() {
            layers[l].partitions = vec![Vec::new(); m];
            let mut sums = vec![0.0f64; m];
            for i in 0..layers[l].weights.len() {
                let w = layers[l].weights[i];
                let p = partition_of(offset, w);
                let slot = layers[l].partitions[p].len();
                layers[l].slots.push(slot);
                let cap = partition_cap(offset, p);
                layers[l].partitions[p].push((i, w / cap));
                sums[p] += w;
            }
            layers[l - 1].weights = sums;
        }

        Ok(Self {
            layers,
            total,
            m,
            offset,
        })
    }

    /// Draw a single index in O(K) expected time.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        debug_assert!(!self.layers[K].weights.is_empty());
        // Pick a top-layer partition by linear walk, starting just past
        // the unit class and wrapping.
        let mut x = self.total * rng.random::<f64>();
        let mut p = self.offset;
        let mut chosen = None;
        let mut fallback = self.offset;
        for _ in 0..self.m {
            p = if p + 1 < self.m { p + 1 } else { 0 };
            let w = self.layers[0].weights[p];
            if w > 0.0 {
                fallback = p;
            }
            if x < w {
                chosen = Some(p);
                break;
            }
            x -= w;
        }
        // Rounding can exhaust the walk with a sliver of x left over.
        let mut p = chosen.unwrap_or(fallback);
        // Then descend the cascade, one rejection round per layer.
        for l in 1..=K {
            let bucket = &self.layers[l].partitions[p];
            loop {
                let (child, p_acc) = bucket[rng.random_range(0..bucket.len())];
                if rng.random::<f64>() < p_acc {
                    p = child;
                    break;
                }
            }
        }
        p
    }

    /// Set the weight of an existing index. O(K).
    ///
    /// # Errors
    /// [`WeightError::IndexOutOfRange`] or an invalid weight; the cascade
    /// is unchanged on error.
    pub fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        check_index(index, self.layers[K].weights.len())?;
        check_weight(index, weight)?;
        self.total += weight - self.layers[K].weights[index];
        self.propagate(K, index, weight);
        Ok(())
    }

    /// Append a new index with the given weight, returning it.
    pub fn push(&mut self, weight: f64) -> Result<usize, WeightError> {
        let index = self.layers[K].weights.len();
        check_weight(index, weight)?;
        // Enter the bottom layer at weight zero (class 0), then move to
        // the real weight through the regular update path.
        self.layers[K].weights.push(0.0);
        let slot = self.layers[K].partitions[0].len();
        self.layers[K].slots.push(slot);
        self.layers[K].partitions[0].push((index, 0.0));
        self.total += weight;
        self.propagate(K, index, weight);
        Ok(index)
    }

    /// Remove the last index, returning its weight.
    pub fn pop(&mut self) -> Result<f64, WeightError> {
        let n = self.layers[K].weights.len();
        if n == 0 {
            return Err(WeightError::PopEmpty);
        }
        let index = n - 1;
        let weight = self.layers[K].weights[index];
        // Zero it first so its entry lands in class 0, then swap-remove.
        self.total -= weight;
        self.propagate(K, index, 0.0);
        let bottom = &mut self.layers[K];
        let hole = bottom.slots[index];
        let last = bottom.partitions[0].len() - 1;
        let moved = bottom.partitions[0][last];
        bottom.partitions[0][hole] = moved;
        bottom.slots[moved.0] = hole;
        bottom.partitions[0].pop();
        bottom.slots.pop();
        bottom.weights.pop();
        Ok(weight)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.layers[K].weights.len()
    }

    /// Whether the cascade holds no items.
    pub fn is_empty(&self) -> bool {
        self.layers[K].weights.is_empty()
    }

    /// Current total weight.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Weight of a single index.
    pub fn weight(&self, index: usize) -> Option<f64> {
        self.layers[K].weights.get(index).copied()
    }

    /// Set item `i` of layer `l` to `w_new`, re-homing its partition
    /// entry and carrying the change into the layer above. The entry
    /// layer stores the value verbatim; partition sums above accumulate
    /// the difference.
    fn propagate(&mut self, l: usize, i: usize, w_new: f64) {
        let w = self.layers[l].weights[i];
        self.layers[l].weights[i] = w_new;
        if l == 0 {
            return;
        }
        let p = partition_of(self.offset, w);
        let p_new = partition_of(self.offset, w_new);
        debug_assert!(p_new < self.m, "weight {w_new} outside the partition range");
        let cap = partition_cap(self.offset, p_new);
        if p == p_new {
            let slot = self.layers[l].slots[i];
            self.layers[l].partitions[p][slot].1 = w_new / cap;
            let sum = self.layers[l - 1].weights[p] + (w_new - w);
            self.propagate(l - 1, p, sum);
        } else {
            // Swap-remove from the old class, append to the new one.
            let layer = &mut self.layers[l];
            let slot = layer.slots[i];
            let last = layer.partitions[p].len() - 1;
            let moved = layer.partitions[p][last];
            layer.partitions[p][slot] = moved;
            layer.slots[moved.0] = slot;
            layer.partitions[p].pop();
            layer.slots[i] = layer.partitions[p_new].len();
            layer.partitions[p_new].push((i, w_new / cap));
            let drained = self.layers[l - 1].weights[p] - w;
            self.propagate(l - 1, p, drained);
            let filled = self.layers[l - 1].weights[p_new] + w_new;
            self.propagate(l - 1, p_new, filled);
        }
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let sum: f64 = self.layers[K].weights.iter().sum();
        assert!((sum - self.total).abs() <= 1e-9 * (1.0 + sum.abs()));
        for l in 1..=K {
            let layer = &self.layers[l];
            assert_eq!(layer.slots.len(), layer.weights.len());
            // Every item's entry is where the reverse index says, in the
            // partition of its magnitude class.
            for (i, &w) in layer.weights.iter().enumerate() {
                let p = partition_of(self.offset, w);
                let slot = layer.slots[i];
                let (child, p_acc) = layer.partitions[p][slot];
                assert_eq!(child, i);
                let cap = partition_cap(self.offset, p);
                assert!((p_acc - w / cap).abs() < 1e-12);
                assert!(w <= cap * (1.0 + 1e-12));
            }
            // Partition sums drive the layer above.
            for (p, part) in layer.partitions.iter().enumerate() {
                let s: f64 = part.iter().map(|&(i, _)| layer.weights[i]).sum();
                let above = self.layers[l - 1].weights[p];
                assert!(
                    (s - above).abs() <= 1e-9 * (1.0 + s.abs()),
                    "layer {l} partition {p}: {s} vs {above}"
                );
            }
        }
    }
}

/// Magnitude class of a weight: class `offset` is `(1/2, 1]`, classes
/// above it double, classes below halve, and weight zero joins class 0.
fn partition_of(offset: usize, w: f64) -> usize {
    if w > 1.0 {
        offset + w.log2().ceil() as usize
    } else if w > 0.0 {
        let below = (-w.log2()).floor() as usize;
        offset.saturating_sub(below)
    } else {
        0
    }
}

/// Upper weight bound of a partition: `2^(p - offset)`.
fn partition_cap(offset: usize, p: usize) -> f64 {
    (p as f64 - offset as f64).exp2()
}

impl<const K: usize> IndexSampler for LogCascade<K> {
    #[inline]
    fn len(&self) -> usize {
        LogCascade::len(self)
    }
    #[inline]
    fn total(&self) -> f64 {
        LogCascade::total(self)
    }
    #[inline]
    fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        LogCascade::sample(self, rng)
    }
}

impl<const K: usize> DynamicSampler for LogCascade<K> {
    #[inline]
    fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        LogCascade::update(self, index, weight)
    }
}

impl<const K: usize> ResizableSampler for LogCascade<K> {
    #[inline]
    fn push(&mut self, weight: f64) -> Result<usize, WeightError> {
        LogCascade::push(self, weight)
    }
    #[inline]
    fn pop(&mut self) -> Result<f64, WeightError> {
        LogCascade::pop(self)
    }
}
