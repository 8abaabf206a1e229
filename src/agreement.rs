//! Descriptive agreement statistics between a secondary instrument and a reference.
//!
//! - [`bland_altman`]: pair means, differences and the 1.96 standard deviation limits of agreement
//! - [`compare`]: regression of secondary on reference with R², RMSE and MAE
use ndarray::{Array1, Zip};
use num_traits::Float;
use serde::Serialize;

use crate::math::{mean, population_standard_deviation};
use crate::pair::MeasurementPair;
use crate::regression::LinearFit;
use crate::{Error, Result};

/// Standard normal quantile bounding 95 % of the differences
pub const LIMITS_OF_AGREEMENT_Z: f64 = 1.96;

#[derive(Clone, Debug)]
pub struct BlandAltman<E> {
    /// Mean of reference and secondary for each sample
    means: Array1<E>,
    /// Secondary minus reference for each sample
    differences: Array1<E>,
    mean_difference: E,
    /// Population standard deviation of the differences
    standard_deviation: E,
}

impl<E: Float> BlandAltman<E> {
    pub const fn means(&self) -> &Array1<E> {
        &self.means
    }

    pub const fn differences(&self) -> &Array1<E> {
        &self.differences
    }

    /// The bias of the secondary instrument
    pub const fn mean_difference(&self) -> E {
        self.mean_difference
    }

    pub const fn standard_deviation(&self) -> E {
        self.standard_deviation
    }

    fn spread(&self) -> E {
        E::from(LIMITS_OF_AGREEMENT_Z).expect("1.96 must be representable as `E`")
            * self.standard_deviation
    }

    pub fn upper_limit(&self) -> E {
        self.mean_difference + self.spread()
    }

    pub fn lower_limit(&self) -> E {
        self.mean_difference - self.spread()
    }
}

/// Bland-Altman statistics over the valid samples of `pair`
///
/// # Errors
/// Returns [`Error::InsufficientData`] if `pair` has no valid samples.
pub fn bland_altman<E: Float>(pair: &MeasurementPair<E>) -> Result<BlandAltman<E>> {
    if pair.is_empty() {
        return Err(Error::InsufficientData {
            required: 1,
            found: 0,
        });
    }
    let two = E::one() + E::one();
    let means = Zip::from(pair.reference())
        .and(pair.secondary())
        .map_collect(|&x, &y| (x + y) / two);
    let differences = pair.secondary() - pair.reference();

    Ok(BlandAltman {
        mean_difference: mean(&differences),
        standard_deviation: population_standard_deviation(&differences),
        means,
        differences,
    })
}

/// Regression and error metrics of the secondary instrument against the reference
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Comparison<E> {
    pub fit: LinearFit<E>,
    pub r_squared: E,
    /// Root mean squared difference between secondary and reference
    pub rmse: E,
    /// Mean absolute difference between secondary and reference
    pub mae: E,
    pub n: usize,
}

/// Scatter comparison statistics over the valid samples of `pair`
///
/// # Errors
/// - [`Error::InsufficientData`] for fewer than two valid samples
/// - [`Error::NoVariance`] if all valid reference values are identical
pub fn compare<E: Float>(pair: &MeasurementPair<E>) -> Result<Comparison<E>> {
    let fit = LinearFit::ordinary_least_squares(pair.reference(), pair.secondary())?;
    let differences = pair.secondary() - pair.reference();

    Ok(Comparison {
        fit,
        r_squared: fit.r_squared(),
        rmse: mean(&differences.mapv(|d| d * d)).sqrt(),
        mae: mean(&differences.mapv(Float::abs)),
        n: pair.len(),
    })
}
