//! Item-carrying wrappers: pair a sampler with the things being sampled.

use crate::alias::AliasTable;
use crate::dynamic::DynamicProposalArray;
use crate::error::WeightError;
use rand::Rng;

/// A static urn: associates items with fixed weights and samples them
/// through an internal [`AliasTable`].
///
/// Build it from any iterator of `(item, weight)` where `weight >= 0`.
#[derive(Debug, Clone)]
pub struct Urn<T> {
    sampler: AliasTable,
    items: Vec<T>,
}

impl<T> Urn<T> {
    /// Build from any `(item, weight)` iterator.
    ///
    /// # Errors
    /// See [`AliasTable::new`]: empty input, negative, non-finite or
    /// all-zero weights are rejected.
    ///
    /// # Complexity
    /// O(n) time / O(n) space.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let mut items = Vec::new();
        let mut weights = Vec::new();
        for (item, w) in pairs {
            items.push(item);
            weights.push(w);
        }
        let sampler = AliasTable::new(&weights)?;
        Ok(Self { sampler, items })
    }

    /// Sample an item **by reference** (no `Clone` bound).
    pub fn sample<'a, R: Rng + ?Sized>(&'a self, rng: &mut R) -> &'a T {
        &self.items[self.sampler.sample(rng)]
    }

    /// Sample an item **by value** (clones the chosen element).
    ///
    /// Prefer [`sample`](Self::sample) if you don't need ownership.
    pub fn sample_owned<R: Rng + ?Sized>(&self, rng: &mut R) -> T
    where
        T: Clone,
    {
        self.items[self.sampler.sample(rng)].clone()
    }

    /// Number of items in the urn.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the urn is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A mutable urn: items keep their weights in a
/// [`DynamicProposalArray`], so re-weighting, adding and removing stay
/// cheap while draws remain amortized O(1).
#[derive(Debug, Clone)]
pub struct DynamicUrn<T> {
    sampler: DynamicProposalArray,
    items: Vec<T>,
}

impl<T> DynamicUrn<T> {
    /// Build from any `(item, weight)` iterator.
    ///
    /// # Errors
    /// Same input contract as [`Urn::from_pairs`].
    pub fn from_pairs<I>(pairs: I) -> Result<Self, WeightError>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let mut items = Vec::new();
        let mut weights = Vec::new();
        for (item, w) in pairs {
            items.push(item);
            weights.push(w);
        }
        let sampler = DynamicProposalArray::new(&weights)?;
        Ok(Self { sampler, items })
    }

    /// Sample an item by reference.
    pub fn sample<'a, R: Rng + ?Sized>(&'a self, rng: &mut R) -> &'a T {
        &self.items[self.sampler.sample(rng)]
    }

    /// Sample an item by value.
    pub fn sample_owned<R: Rng + ?Sized>(&self, rng: &mut R) -> T
    where
        T: Clone,
    {
        self.items[self.sampler.sample(rng)].clone()
    }

    /// Sample and return the item's index alongside the item.
    pub fn sample_indexed<'a, R: Rng + ?Sized>(&'a self, rng: &mut R) -> (usize, &'a T) {
        let i = self.sampler.sample(rng);
        (i, &self.items[i])
    }

    /// Change the weight of the item at `index`.
    ///
    /// # Errors
    /// [`WeightError::IndexOutOfRange`] or an invalid weight.
    pub fn set_weight(&mut self, index: usize, weight: f64) -> Result<(), WeightError> {
        self.sampler.update(index, weight)
    }

    /// Current weight of the item at `index`.
    pub fn weight(&self, index: usize) -> Option<f64> {
        self.sampler.weight(index)
    }

    /// Add an item with the given weight, returning its index.
    pub fn push(&mut self, item: T, weight: f64) -> Result<usize, WeightError> {
        let index = self.sampler.push(weight)?;
        self.items.push(item);
        Ok(index)
    }

    /// Remove the most recently added item and its weight.
    ///
    /// # Errors
    /// [`WeightError::PopEmpty`] if the urn is empty.
    pub fn pop(&mut self) -> Result<(T, f64), WeightError> {
        // The sampler and item vectors always have the same length.
        let item = self.items.pop().ok_or(WeightError::PopEmpty)?;
        let weight = self.sampler.pop()?;
        Ok((item, weight))
    }

    /// Number of items in the urn.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the urn is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current total weight.
    pub fn total(&self) -> f64 {
        self.sampler.total()
    }
}
