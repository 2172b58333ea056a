//! Flat k-ary tree of partial weight sums: O(log n) draws and updates,
//! plus exact prefix sums.

use crate::error::{WeightError, check_index, check_weight, validate_weights};
use crate::{DynamicSampler, IndexSampler};
use rand::Rng;

/// Weighted index sampler backed by a complete k-ary sum tree.
///
/// Leaves sit at `leaf_base..leaf_base + n` where `leaf_base` is the
/// smallest power of `K` at least `n`; node `j` holds the sum of its `K`
/// children at `K*j..K*j + K`. Index 0 is unused so child arithmetic
/// needs no offset; the root at index 1 holds the total weight. Updates
/// propagate a delta along the parent chain, which keeps integer-valued
/// weights exact.
#[derive(Debug, Clone)]
pub struct SumTree<const K: usize = 2> {
    nodes: Vec<f64>,
    len: usize,
    leaf_base: usize,
}

impl<const K: usize> SumTree<K> {
    /// Construct from non-negative weights. O(n).
    ///
    /// # Errors
    /// Same input contract as [`crate::AliasTable::new`].
    pub fn new(weights: &[f64]) -> Result<Self, WeightError> {
        assert!(K >= 2, "branching factor must be at least 2");
        validate_weights(weights)?;
        let n = weights.len();
        let mut leaf_base = 1usize;
        while leaf_base < n {
            leaf_base *= K;
        }
        let mut nodes = vec![0.0f64; leaf_base * K];
        nodes[leaf_base..leaf_base + n].copy_from_slice(weights);
        for j in (1..leaf_base).rev() {
            nodes[j] = nodes[K * j..K * j + K].iter().sum();
        }
        Ok(Self {
            nodes,
            len: n,
            leaf_base,
        })
    }

    /// Draw a single index in O(log n).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let mut x = self.nodes[1] * rng.random::<f64>();
        let mut j = 1;
        while j < self.leaf_base {
            let mut next = None;
            let mut fallback = K * j;
            for k in 0..K {
                let child = K * j + k;
                let w = self.nodes[child];
                if w > 0.0 {
                    fallback = child;
                }
                if x < w {
                    next = Some(child);
                    break;
                }
                x -= w;
            }
            // Rounding can leave x just past the last child; fall back to
            // the rightmost child that still carries weight.
            j = next.unwrap_or(fallback);
        }
        j - self.leaf_base
    }

    /// Set the weight of an existing index. O(log n).
    ///
    /// # Errors
    /// [`WeightError::IndexOutOfRange`] or an invalid weight; the tree is
    /// unchanged on error.
    pub fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        check_index(index, self.len)?;
        check_weight(index, weight)?;
        let mut j = self.leaf_base + index;
        let delta = weight - self.nodes[j];
        while j > 0 {
            self.nodes[j] += delta;
            j /= K;
        }
        Ok(())
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no items. Never true for a constructed tree.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current total weight (the root).
    pub fn total(&self) -> f64 {
        self.nodes[1]
    }

    /// Weight of a single index.
    pub fn weight(&self, index: usize) -> Option<f64> {
        if index < self.len {
            Some(self.nodes[self.leaf_base + index])
        } else {
            None
        }
    }

    /// Sum of the weights of indices `0..index`, in O(log n). `index` may
    /// equal `len`, in which case this is the total.
    ///
    /// # Errors
    /// [`WeightError::IndexOutOfRange`] if `index > len`.
    pub fn prefix_sum(&self, index: usize) -> Result<f64, WeightError> {
        if index > self.len {
            return Err(WeightError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let mut acc = 0.0;
        let mut j = self.leaf_base + index;
        while j > 1 {
            let parent = j / K;
            for sibling in K * parent..j {
                acc += self.nodes[sibling];
            }
            j = parent;
        }
        Ok(acc)
    }
}

impl<const K: usize> IndexSampler for SumTree<K> {
    #[inline]
    fn len(&self) -> usize {
        SumTree::len(self)
    }
    #[inline]
    fn total(&self) -> f64 {
        SumTree::total(self)
    }
    #[inline]
    fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        SumTree::sample(self, rng)
    }
}

impl<const K: usize> DynamicSampler for SumTree<K> {
    #[inline]
    fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        SumTree::update(self, index, weight)
    }
}
