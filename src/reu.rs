//! Relative Expanded Uncertainty of a secondary instrument against a reference.
//!
//! For each valid paired sample the REU, in percent of the secondary reading, is
//!
//! $$
//!     \mathrm{REU}_i = \frac{100 k}{y_i} \sqrt{\sigma_v^2 - u(x_i)^2 + \left(b_0 + (b_1 - 1) x_i\right)^2}
//! $$
//!
//! where $x$ is the reference, $y$ the secondary, $b_0$ and $b_1$ the ordinary least squares
//! intercept and slope of $y$ on $x$, $\sigma_v^2$ the residual variance of that fit, $u(x_i)$ the
//! random uncertainty of the reference method and $k$ the coverage factor.
use log::{debug, warn};
use ndarray::{Array1, Zip};
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::pair::MeasurementPair;
use crate::regression::LinearFit;
use crate::{Error, Result};

/// How samples with an undefined uncertainty are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Reproduce the plain formula: two samples are accepted even though the residual variance
    /// divides by zero, and undefined samples come out as NaN or infinite.
    Reference,
    /// Require three samples for the residual variance, keep undefined samples as NaN or infinite
    /// and log how many there are.
    #[default]
    Propagate,
    /// Require three samples and fail on the first undefined sample.
    Strict,
}

/// Parameters of the uncertainty estimate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config<E> {
    /// Random uncertainty of the reference method, $u(x_i)$
    pub reference_uncertainty: E,
    /// Coverage factor $k$, 2 gives roughly 95 % coverage
    pub coverage_factor: E,
    pub policy: Policy,
}

impl<E: Float> Default for Config<E> {
    fn default() -> Self {
        Self {
            reference_uncertainty: E::zero(),
            coverage_factor: E::one() + E::one(),
            policy: Policy::default(),
        }
    }
}

impl<E: Float> Config<E> {
    #[must_use]
    pub const fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    fn validate(&self) -> Result<()> {
        let u = self.reference_uncertainty;
        if !u.is_finite() || u < E::zero() {
            return Err(Error::InvalidParameter(
                "reference_uncertainty",
                "a finite value >= 0",
                u.to_f64().unwrap_or(f64::NAN),
            ));
        }
        let k = self.coverage_factor;
        if !k.is_finite() || k <= E::zero() {
            return Err(Error::InvalidParameter(
                "coverage_factor",
                "a finite value > 0",
                k.to_f64().unwrap_or(f64::NAN),
            ));
        }
        Ok(())
    }
}

/// The REU of every valid sample, with the intermediate terms it was built from
#[derive(Clone, Debug)]
pub struct Estimate<E> {
    fit: LinearFit<E>,
    /// Residual variance $\sigma_v^2$
    residual_variance: E,
    /// Squared deviation of the fit from the 1:1 line at each reference value
    deviation: Array1<E>,
    values: Array1<E>,
}

impl<E: Float> Estimate<E> {
    pub const fn fit(&self) -> &LinearFit<E> {
        &self.fit
    }

    pub const fn residual_variance(&self) -> E {
        self.residual_variance
    }

    pub const fn deviation(&self) -> &Array1<E> {
        &self.deviation
    }

    /// REU in percent, one entry per valid sample in the order of the pair
    pub const fn values(&self) -> &Array1<E> {
        &self.values
    }

    pub fn into_values(self) -> Array1<E> {
        self.values
    }

    /// Number of samples whose REU is NaN or infinite
    pub fn undefined_count(&self) -> usize {
        self.values.iter().filter(|value| !value.is_finite()).count()
    }

    /// The REU laid back onto the original index of `pair`
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the estimate was not computed from `pair`.
    pub fn realigned(&self, pair: &MeasurementPair<E>) -> Result<Vec<Option<E>>> {
        pair.realign(&self.values)
    }
}

/// Relative Expanded Uncertainty of `secondary` against `reference`, in percent
///
/// NaN marks a missing reading in either series. The result has one entry per sample where both
/// readings are defined, in input order. It is *not* the length of the input.
///
/// # Errors
/// - [`Error::ShapeMismatch`] if the series differ in length
/// - [`Error::InvalidParameter`] for negative `u_xi` or non-positive `k`
/// - [`Error::InsufficientData`] for fewer than three valid samples
/// - [`Error::NoVariance`] if all valid reference values are identical
/// - [`Error::NonFiniteFit`] if a reading is infinite or the regression sums overflow
///
/// # Examples
///
/// ```
/// let reference = [1., 2., 3., 4., 5.];
/// let secondary = [1.2, 2.1, 3.3, 3.9, 5.2];
///
/// let estimate = reu_margin::reu(&reference, &secondary, 0., 2.).unwrap();
/// assert_eq!(estimate.len(), 5);
/// ```
pub fn reu<E: Float>(reference: &[E], secondary: &[E], u_xi: E, k: E) -> Result<Array1<E>> {
    let config = Config {
        reference_uncertainty: u_xi,
        coverage_factor: k,
        policy: Policy::default(),
    };
    reu_with(reference, secondary, &config)
}

/// As [`reu`], with the full [`Config`]
///
/// # Errors
/// See [`reu`] and [`estimate`].
pub fn reu_with<E: Float>(
    reference: &[E],
    secondary: &[E],
    config: &Config<E>,
) -> Result<Array1<E>> {
    let pair = MeasurementPair::new(reference, secondary)?;
    Ok(estimate(&pair, config)?.into_values())
}

/// Compute the REU over the valid subset of `pair`
///
/// # Errors
/// - [`Error::InvalidParameter`] for negative reference uncertainty or non-positive coverage factor
/// - [`Error::InsufficientData`] for fewer than two valid samples, or fewer than three unless the
///   policy is [`Policy::Reference`]
/// - [`Error::NoVariance`] if all valid reference values are identical
/// - [`Error::NonFiniteFit`] if a reading is infinite or the regression sums overflow
/// - [`Error::NegativeRadicand`], [`Error::ZeroSecondary`] or [`Error::UndefinedEstimate`] under
///   [`Policy::Strict`]
pub fn estimate<E: Float>(pair: &MeasurementPair<E>, config: &Config<E>) -> Result<Estimate<E>> {
    config.validate()?;

    let required = match config.policy {
        Policy::Reference => 2,
        Policy::Propagate | Policy::Strict => 3,
    };
    if pair.len() < required {
        return Err(Error::InsufficientData {
            required,
            found: pair.len(),
        });
    }

    let x = pair.reference();
    let y = pair.secondary();

    let fit = LinearFit::ordinary_least_squares(x, y)?;
    let residual_variance = fit.residual_variance(x, y);
    debug!(
        "fitted secondary = {:?} + {:?} * reference over {} samples, residual variance {:?}",
        fit.intercept().to_f64(),
        fit.slope().to_f64(),
        fit.n(),
        residual_variance.to_f64()
    );

    let deviation = x.mapv(|xi| fit.deviation_from_identity(xi));
    let u_squared = config.reference_uncertainty * config.reference_uncertainty;
    let radicands = deviation.mapv(|ec| residual_variance - u_squared + ec);

    if config.policy == Policy::Strict {
        check_defined(pair, &radicands)?;
    }

    let hundred = E::from(100).expect("100 must be representable as `E`");
    let values = Zip::from(&radicands).and(y).map_collect(|&radicand, &yi| {
        config.coverage_factor * radicand.sqrt() * hundred / yi
    });

    if config.policy == Policy::Strict {
        check_finite(pair, &values)?;
    }

    let estimate = Estimate {
        fit,
        residual_variance,
        deviation,
        values,
    };

    let undefined = estimate.undefined_count();
    if undefined > 0 {
        warn!(
            "{undefined} of {} samples have an undefined relative expanded uncertainty",
            pair.len()
        );
    }

    Ok(estimate)
}

/// Fail on the first sample whose radicand is negative or not finite, or whose secondary reading
/// is zero
fn check_defined<E: Float>(pair: &MeasurementPair<E>, radicands: &Array1<E>) -> Result<()> {
    for ((&index, &radicand), &yi) in pair
        .indices()
        .iter()
        .zip(radicands)
        .zip(pair.secondary())
    {
        if radicand < E::zero() {
            return Err(Error::NegativeRadicand {
                index,
                radicand: radicand.to_f64().unwrap_or(f64::NAN),
            });
        }
        if !radicand.is_finite() {
            return Err(Error::UndefinedEstimate { index });
        }
        if yi == E::zero() {
            return Err(Error::ZeroSecondary { index });
        }
    }
    Ok(())
}

/// Fail on the first sample whose estimate overflowed
fn check_finite<E: Float>(pair: &MeasurementPair<E>, values: &Array1<E>) -> Result<()> {
    pair.indices()
        .iter()
        .zip(values)
        .find(|(_, value)| !value.is_finite())
        .map_or(Ok(()), |(&index, _)| Err(Error::UndefinedEstimate { index }))
}
