use ndarray::{Array1, Zip};
use num_traits::Float;

/// Convert a sample count to the floating point type `E`
///
/// # Panics
///
/// Converting a `usize` to a floating point type cannot fail for `f32` or `f64`, the conversion
/// only rounds. Exotic implementors of [`Float`] which cannot represent the count will panic.
pub fn cast<E: Float>(n: usize) -> E {
    E::from(n).expect("sample count must be representable as `E`")
}

/// Arithmetic mean of `x`
///
/// Returns NaN for an empty array, callers are expected to check the sample count first.
///
/// # Examples
///
/// ```
/// use reu_margin::math::mean;
/// use ndarray::arr1;
///
/// let x = arr1(&[1., 2., 3., 6.]);
/// assert_eq!(mean(&x), 3.);
/// ```
pub fn mean<E: Float>(x: &Array1<E>) -> E {
    x.fold(E::zero(), |acc, &xi| acc + xi) / cast(x.len())
}

/// Sum of the products of deviations of `x` and `y` from their respective means
///
/// With `x == y` this is the sum of squared deviations, $\sum_i (x_i - \bar{x})^2$.
///
/// # Examples
///
/// ```
/// use reu_margin::math::{cross_deviation, mean};
/// use ndarray::arr1;
///
/// let x = arr1(&[1., 2., 3.]);
/// let y = arr1(&[2., 4., 6.]);
/// let sxy = cross_deviation(&x, mean(&x), &y, mean(&y));
/// assert_eq!(sxy, 4.);
/// ```
pub fn cross_deviation<E: Float>(x: &Array1<E>, x_mean: E, y: &Array1<E>, y_mean: E) -> E {
    Zip::from(x)
        .and(y)
        .fold(E::zero(), |acc, &xi, &yi| acc + (xi - x_mean) * (yi - y_mean))
}

/// Population standard deviation of `x` (divisor `n`)
pub fn population_standard_deviation<E: Float>(x: &Array1<E>) -> E {
    let x_mean = mean(x);
    (cross_deviation(x, x_mean, x, x_mean) / cast(x.len())).sqrt()
}
