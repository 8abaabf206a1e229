use ndarray::{Array1, Zip};
use num_traits::Float;
use serde::Serialize;

use crate::math::{cast, cross_deviation, mean};
use crate::{Error, Result};

/// Straight line fit of `y = b0 + b1 x` by ordinary least squares
///
/// The fit minimises the squared *vertical* residuals. This is not the orthogonal regression
/// proposed for equivalence testing of ambient air methods, where the reference is also assumed to
/// carry error, and the two estimators differ when the reference is noisy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LinearFit<E> {
    slope: E,
    intercept: E,
    /// Pearson correlation coefficient
    r_value: E,
    slope_stderr: E,
    intercept_stderr: E,
    /// Number of samples used in the fit
    n: usize,
}

impl<E: Float> LinearFit<E> {
    /// Regress `y` on `x`
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`] if `x` and `y` differ in length
    /// - [`Error::InsufficientData`] for fewer than two samples
    /// - [`Error::NoVariance`] if every `x` is identical
    /// - [`Error::NonFiniteFit`] if an input is infinite or the sums of squares overflow
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::arr1;
    /// use reu_margin::regression::LinearFit;
    ///
    /// let x = arr1(&[0., 1., 2.]);
    /// let y = arr1(&[1., 3., 5.]);
    /// let fit = LinearFit::ordinary_least_squares(&x, &y).unwrap();
    /// assert_eq!(fit.slope(), 2.);
    /// assert_eq!(fit.intercept(), 1.);
    /// ```
    pub fn ordinary_least_squares(x: &Array1<E>, y: &Array1<E>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::ShapeMismatch {
                reference: x.len(),
                secondary: y.len(),
            });
        }
        let n = x.len();
        if n < 2 {
            return Err(Error::InsufficientData {
                required: 2,
                found: n,
            });
        }

        let x_mean = mean(x);
        let y_mean = mean(y);
        let sxx = cross_deviation(x, x_mean, x, x_mean);
        let sxy = cross_deviation(x, x_mean, y, y_mean);
        let syy = cross_deviation(y, y_mean, y, y_mean);

        if !(sxx.is_finite() && sxy.is_finite() && syy.is_finite()) {
            return Err(Error::NonFiniteFit);
        }
        if sxx == E::zero() {
            return Err(Error::NoVariance);
        }

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let denominator = (sxx * syy).sqrt();
        let r_value = if denominator == E::zero() {
            E::zero()
        } else {
            // Rounding can push |r| a hair past one
            (sxy / denominator).max(-E::one()).min(E::one())
        };

        // Two points always lie on the line, the errors vanish
        let (slope_stderr, intercept_stderr) = if n == 2 {
            (E::zero(), E::zero())
        } else {
            let degrees_of_freedom: E = cast(n - 2);
            let slope_stderr =
                ((E::one() - r_value * r_value) * syy / sxx / degrees_of_freedom).sqrt();
            let intercept_stderr = slope_stderr * (sxx / cast(n) + x_mean * x_mean).sqrt();
            (slope_stderr, intercept_stderr)
        };

        Ok(Self {
            slope,
            intercept,
            r_value,
            slope_stderr,
            intercept_stderr,
            n,
        })
    }

    pub const fn slope(&self) -> E {
        self.slope
    }

    pub const fn intercept(&self) -> E {
        self.intercept
    }

    pub const fn r_value(&self) -> E {
        self.r_value
    }

    pub fn r_squared(&self) -> E {
        self.r_value * self.r_value
    }

    pub const fn slope_stderr(&self) -> E {
        self.slope_stderr
    }

    pub const fn intercept_stderr(&self) -> E {
        self.intercept_stderr
    }

    pub const fn n(&self) -> usize {
        self.n
    }

    /// The fitted value `b0 + b1 x`
    pub fn predict(&self, x: E) -> E {
        self.intercept + self.slope * x
    }

    /// Residuals `y - b0 - b1 x` of each sample
    pub fn residuals(&self, x: &Array1<E>, y: &Array1<E>) -> Array1<E> {
        Zip::from(x)
            .and(y)
            .map_collect(|&xi, &yi| yi - self.intercept - self.slope * xi)
    }

    pub fn residual_sum_of_squares(&self, x: &Array1<E>, y: &Array1<E>) -> E {
        self.residuals(x, y)
            .fold(E::zero(), |acc, &residual| acc + residual * residual)
    }

    /// Equation error variance $\sigma_v^2 = RSS / (n - 2)$ of the model `y = b0 + b1 x + v`
    ///
    /// No guard is applied: with two samples the divisor is zero and the result is NaN or
    /// infinite. Callers wanting an explicit failure must check the sample count.
    pub fn residual_variance(&self, x: &Array1<E>, y: &Array1<E>) -> E {
        let degrees_of_freedom = cast::<E>(x.len()) - cast(2);
        self.residual_sum_of_squares(x, y) / degrees_of_freedom
    }

    /// Squared distance between the fitted line and the 1:1 line at `x`,
    /// $(b_0 + (b_1 - 1) x)^2$
    pub fn deviation_from_identity(&self, x: E) -> E {
        let offset = self.intercept + (self.slope - E::one()) * x;
        offset * offset
    }
}
