//! # urns
//!
//! Weighted random index sampling, static and dynamic.
//!
//! Given `n` items with non-negative weights `w_i`, every sampler in this
//! crate draws index `i` with probability `w_i / Σ w`. They differ in
//! what they cost and what they let you mutate:
//!
//! | Sampler | sample | update | push/pop |
//! |---|---|---|---|
//! | [`AliasTable`] | O(1) | — | — |
//! | [`ProposalArray`] | O(1) amortized | — | — |
//! | [`DynamicProposalArray`] | O(1) amortized | O(1) amortized | ✓ |
//! | [`DynamicProposalArrayStar`] | O(1) amortized | O(1) | ✓ |
//! | [`SumTree`] | O(log n) | O(log n) | — |
//! | [`LogCascade`] | O(K) expected | O(K) | ✓ |
//!
//! All of them are exact: the distribution is `w_i / Σ w` up to the bias
//! of the underlying generator, never an approximation.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use urns::DynamicProposalArray;
//!
//! let mut pa = DynamicProposalArray::new(&[5.0, 1.5, 0.1, 2.0])?;
//! let mut rng = rand::rng();
//! let i = pa.sample(&mut rng);      // 0 with probability 5.0/8.6
//! pa.update(2, 4.0)?;               // re-weight an index
//! let j = pa.push(1.0)?;            // append index 4
//! pa.pop()?;                        // and remove it again
//! ```
//!
//! If you want to sample *items* rather than indices, wrap them in an
//! [`Urn`] (static) or [`DynamicUrn`] (mutable weights):
//!
//! ```rust,ignore
//! use urns::Urn;
//!
//! let urn = Urn::from_pairs([("common", 60.0), ("rare", 9.0)])?;
//! let tier = urn.sample(&mut rand::rng()); // &str
//! ```
//!
//! ## Choosing a sampler
//!
//! * Fixed weights, many draws: [`AliasTable`].
//! * Weights change, throughput matters: [`DynamicProposalArray`], or
//!   [`DynamicProposalArrayStar`] when a rare O(n) rebuild pause is not
//!   acceptable (its rebuild is spread across updates).
//! * You also need prefix sums, or exact integer totals: [`SumTree`].
//! * Weights span many orders of magnitude: [`LogCascade`].
//!
//! ## Gotchas
//!
//! * Weights must be finite and non-negative, with a positive sum;
//!   `NaN`/∞ are rejected up front.
//! * Zero-weight indices are kept but never drawn.
//! * Sampling from a structure whose weights are currently all zero is a
//!   caller bug: rejection samplers would spin. Every mutator keeps the
//!   total consistent so this is easy to check via
//!   [`IndexSampler::total`].
//! * Samplers are not synchronized; clone or shard for parallelism.
//!
//! The generator is any [`rand::Rng`]; it is borrowed per call and never
//! stored.

mod alias;
mod cascade;
mod dynamic;
mod error;
mod proposal;
mod star;
mod tree;
mod urn;

/// A minimal interface for weighted index samplers.
///
/// `len` is the number of items, `total` the current weight sum, and
/// `sample_index` draws from `w_i / total`.
#[allow(clippy::len_without_is_empty)]
pub trait IndexSampler {
    fn len(&self) -> usize;
    fn total(&self) -> f64;
    fn sample_index<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> usize;
}

/// Samplers whose weights can be changed in place.
pub trait DynamicSampler: IndexSampler {
    /// Set the weight of an existing index.
    fn update(&mut self, index: usize, weight: f64) -> Result<(), WeightError>;
}

/// Samplers whose item count can grow and shrink at the back.
pub trait ResizableSampler: DynamicSampler {
    /// Append a new index with the given weight, returning it.
    fn push(&mut self, weight: f64) -> Result<usize, WeightError>;
    /// Remove the last index, returning its weight.
    fn pop(&mut self) -> Result<f64, WeightError>;
}

pub use alias::AliasTable;
pub use cascade::LogCascade;
pub use dynamic::DynamicProposalArray;
pub use error::WeightError;
pub use proposal::ProposalArray;
pub use star::DynamicProposalArrayStar;
pub use tree::SumTree;
pub use urn::{DynamicUrn, Urn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_all_samplers() {
        let weights = [1.0, 3.0];
        let mut rng = rand::rng();
        let _ = AliasTable::new(&weights).unwrap().sample(&mut rng);
        let _ = ProposalArray::new(&weights).unwrap().sample(&mut rng);
        let _ = DynamicProposalArray::new(&weights).unwrap().sample(&mut rng);
        let _ = DynamicProposalArrayStar::new(&weights).unwrap().sample(&mut rng);
        let _ = SumTree::<2>::new(&weights).unwrap().sample(&mut rng);
        let _ = LogCascade::<1>::new(&weights).unwrap().sample(&mut rng);
    }

    #[test]
    fn trait_objects_by_capability() {
        fn draws_from<S: IndexSampler>(s: &S) -> usize {
            let mut rng = rand::rng();
            s.sample_index(&mut rng)
        }
        fn bump<S: DynamicSampler>(s: &mut S) {
            s.update(0, 2.0).unwrap();
        }
        fn grow<S: ResizableSampler>(s: &mut S) {
            let i = s.push(1.0).unwrap();
            assert_eq!(i, s.len() - 1);
            s.pop().unwrap();
        }
        let mut pa = DynamicProposalArray::new(&[1.0, 1.0]).unwrap();
        let _ = draws_from(&pa);
        bump(&mut pa);
        grow(&mut pa);
        let mut tree = SumTree::<2>::new(&[1.0, 1.0]).unwrap();
        bump(&mut tree);
        let mut lc = LogCascade::<2>::new(&[1.0, 1.0]).unwrap();
        grow(&mut lc);
    }
}
