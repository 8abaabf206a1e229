//! Positional pairing of reference and secondary instrument readings.
//!
//! A [`MeasurementPair`] holds only the *valid subset*: the positions where both instruments
//! report a defined value. It remembers where each valid sample sat in the original series so
//! that per-sample results can be laid back onto the original index.
use ndarray::Array1;
use num_traits::Float;

use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct MeasurementPair<E> {
    /// Length of the series the pair was built from
    original_len: usize,
    /// Original position of each valid sample
    indices: Vec<usize>,
    reference: Array1<E>,
    secondary: Array1<E>,
}

impl<E: Float> MeasurementPair<E> {
    /// Pair two float series, treating NaN as a missing reading
    ///
    /// Infinite readings are defined values and are kept.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the series differ in length.
    ///
    /// # Examples
    ///
    /// ```
    /// use reu_margin::pair::MeasurementPair;
    ///
    /// let pair = MeasurementPair::new(&[1., f64::NAN, 3.], &[1.1, 2.0, f64::NAN]).unwrap();
    /// assert_eq!(pair.len(), 1);
    /// assert_eq!(pair.indices(), &[0]);
    /// ```
    pub fn new(reference: &[E], secondary: &[E]) -> Result<Self> {
        let defined = |value: &E| (!value.is_nan()).then_some(*value);
        let reference = reference.iter().map(defined).collect::<Vec<_>>();
        let secondary = secondary.iter().map(defined).collect::<Vec<_>>();
        Self::from_options(&reference, &secondary)
    }

    /// Pair two series of optional readings
    ///
    /// A `Some(NaN)` is treated the same as `None`.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the series differ in length.
    pub fn from_options(reference: &[Option<E>], secondary: &[Option<E>]) -> Result<Self> {
        if reference.len() != secondary.len() {
            return Err(Error::ShapeMismatch {
                reference: reference.len(),
                secondary: secondary.len(),
            });
        }

        let (indices, (valid_reference, valid_secondary)): (Vec<usize>, (Vec<E>, Vec<E>)) =
            reference
                .iter()
                .zip(secondary)
                .enumerate()
                .filter_map(|(ii, pair)| match pair {
                    (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => Some((ii, (*x, *y))),
                    _ => None,
                })
                .unzip();

        Ok(Self {
            original_len: reference.len(),
            indices,
            reference: Array1::from(valid_reference),
            secondary: Array1::from(valid_secondary),
        })
    }

    /// Number of valid paired samples
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Length of the series the pair was built from
    pub const fn original_len(&self) -> usize {
        self.original_len
    }

    /// Original positions of the valid samples, in increasing order
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub const fn reference(&self) -> &Array1<E> {
        &self.reference
    }

    pub const fn secondary(&self) -> &Array1<E> {
        &self.secondary
    }

    /// Validity mask over the original series, `true` where both readings are defined
    pub fn mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.original_len];
        for &ii in &self.indices {
            mask[ii] = true;
        }
        mask
    }

    /// Place per-sample `values` computed over the valid subset back at their original positions
    ///
    /// Positions that were filtered out hold `None`.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `values` is not the length of the valid subset.
    pub fn realign(&self, values: &Array1<E>) -> Result<Vec<Option<E>>> {
        if values.len() != self.len() {
            return Err(Error::ShapeMismatch {
                reference: self.len(),
                secondary: values.len(),
            });
        }
        let mut aligned = vec![None; self.original_len];
        for (&ii, &value) in self.indices.iter().zip(values) {
            aligned[ii] = Some(value);
        }
        Ok(aligned)
    }
}

#[cfg(test)]
mod test {
    use ndarray::arr1;

    use super::MeasurementPair;
    use crate::{Error, Result};

    #[test]
    fn samples_missing_in_either_series_are_dropped() -> Result<()> {
        let reference = [1., 2., f64::NAN, 4., 5.];
        let secondary = [1.2, f64::NAN, 3.3, 3.9, 5.2];

        let pair = MeasurementPair::new(&reference, &secondary)?;

        assert_eq!(pair.len(), 3);
        assert_eq!(pair.original_len(), 5);
        assert_eq!(pair.indices(), &[0, 3, 4]);
        assert_eq!(pair.reference(), &arr1(&[1., 4., 5.]));
        assert_eq!(pair.secondary(), &arr1(&[1.2, 3.9, 5.2]));
        assert_eq!(pair.mask(), vec![true, false, false, true, true]);
        Ok(())
    }

    #[test]
    fn infinite_readings_are_defined() -> Result<()> {
        let pair = MeasurementPair::new(&[1., f64::INFINITY], &[1., 2.])?;
        assert_eq!(pair.len(), 2);
        Ok(())
    }

    #[test]
    fn optional_readings_treat_nan_as_missing() -> Result<()> {
        let reference = [Some(1.), None, Some(3.), Some(f64::NAN)];
        let secondary = [Some(1.), Some(2.), Some(3.), Some(4.)];

        let pair = MeasurementPair::from_options(&reference, &secondary)?;

        assert_eq!(pair.indices(), &[0, 2]);
        Ok(())
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let reference = [1.; 10];
        let secondary = [1.; 9];

        let result = MeasurementPair::new(&reference, &secondary);

        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                reference: 10,
                secondary: 9
            })
        ));
    }

    #[test]
    fn realigned_values_return_to_original_positions() -> Result<()> {
        let pair = MeasurementPair::new(&[1., f64::NAN, 3.], &[1., 2., 3.])?;

        let aligned = pair.realign(&arr1(&[10., 30.]))?;

        assert_eq!(aligned, vec![Some(10.), None, Some(30.)]);
        Ok(())
    }

    #[test]
    fn realigning_values_of_the_wrong_length_fails() -> Result<()> {
        let pair = MeasurementPair::new(&[1., 2., 3.], &[1., 2., 3.])?;
        assert!(pair.realign(&arr1(&[1., 2.])).is_err());
        Ok(())
    }

    #[test]
    fn empty_series_give_an_empty_pair() -> Result<()> {
        let pair = MeasurementPair::<f64>::new(&[], &[])?;
        assert!(pair.is_empty());
        assert!(pair.mask().is_empty());
        Ok(())
    }
}
