//! # Probability Domain Checks

/// Check that a value is a legal drop probability.
///
/// The upper bound is exclusive; layers which rescale by the complement
/// (dropout, drop path) divide by ``1 - p``.
///
/// # Arguments
///
/// - `p`: the probability to check.
///
/// # Returns
///
/// The probability, or an error describing the violation.
pub fn try_probability(p: f64) -> Result<f64, String> {
    if (0.0..1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("probability must be in [0, 1): {p}"))
    }
}

/// Check that a value is a legal drop probability.
///
/// # Arguments
///
/// - `p`: the probability to check.
///
/// # Returns
///
/// The probability.
///
/// # Panics
///
/// If the probability is outside ``[0, 1)``.
pub fn expect_probability(p: f64) -> f64 {
    match try_probability(p) {
        Ok(p) => p,
        Err(e) => panic!("{}", e),
    }
}
