/// Everything that can go wrong when building or mutating a sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightError {
    /// The weight slice was empty.
    Empty,
    /// A weight was NaN or infinite.
    NonFinite { index: usize, value: f64 },
    /// A weight was negative.
    Negative { index: usize, value: f64 },
    /// All weights were zero (or the total overflowed to non-finite).
    ZeroSum,
    /// An index passed to `update` was out of range.
    IndexOutOfRange { index: usize, len: usize },
    /// `pop` was called on an empty sampler.
    PopEmpty,
}

impl std::fmt::Display for WeightError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightError::Empty => write!(f, "weights slice is empty"),
            WeightError::NonFinite { index, value } => {
                write!(f, "weight at index {index} is not finite: {value}")
            }
            WeightError::Negative { index, value } => {
                write!(f, "weight at index {index} is negative: {value}")
            }
            WeightError::ZeroSum => write!(f, "sum of weights is zero or not finite"),
            WeightError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for {len} items")
            }
            WeightError::PopEmpty => write!(f, "pop called on an empty sampler"),
        }
    }
}

impl std::error::Error for WeightError {}

/// Validate a weight vector and return its total.
pub(crate) fn validate_weights(weights: &[f64]) -> Result<f64, WeightError> {
    if weights.is_empty() {
        return Err(WeightError::Empty);
    }
    let mut total = 0.0f64;
    for (i, &w) in weights.iter().enumerate() {
        check_weight(i, w)?;
        total += w;
    }
    if !total.is_finite() || total == 0.0 {
        return Err(WeightError::ZeroSum);
    }
    Ok(total)
}

/// Validate a single weight before it is stored anywhere.
pub(crate) fn check_weight(index: usize, value: f64) -> Result<(), WeightError> {
    if !value.is_finite() {
        return Err(WeightError::NonFinite { index, value });
    }
    if value < 0.0 {
        return Err(WeightError::Negative { index, value });
    }
    Ok(())
}

/// Validate an `update` target against the current length.
pub(crate) fn check_index(index: usize, len: usize) -> Result<(), WeightError> {
    if index >= len {
        return Err(WeightError::IndexOutOfRange { index, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_vectors() {
        assert_eq!(validate_weights(&[]), Err(WeightError::Empty));
        assert_eq!(validate_weights(&[0.0, 0.0]), Err(WeightError::ZeroSum));
        assert!(matches!(
            validate_weights(&[1.0, -0.5]),
            Err(WeightError::Negative { index: 1, .. })
        ));
        assert!(matches!(
            validate_weights(&[f64::NAN]),
            Err(WeightError::NonFinite { index: 0, .. })
        ));
        assert!(matches!(
            validate_weights(&[1.0, f64::INFINITY]),
            Err(WeightError::NonFinite { index: 1, .. })
        ));
    }

    #[test]
    fn validate_accepts_zeros_among_positives() {
        assert_eq!(validate_weights(&[0.0, 2.0, 0.0]), Ok(2.0));
    }
}
