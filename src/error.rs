use thiserror::Error;

/// Errors raised while pairing, fitting or assessing instrument data.
#[derive(Debug, Error)]
pub enum Error {
    /// The reference and secondary series have different lengths.
    #[error("reference has {reference} samples but secondary has {secondary}")]
    ShapeMismatch { reference: usize, secondary: usize },
    /// Too few samples survive the validity filter.
    #[error("at least {required} valid paired samples are required, found {found}")]
    InsufficientData { required: usize, found: usize },
    /// Every valid reference value is identical, so the slope is undefined.
    #[error("all valid reference values are identical, the regression slope is undefined")]
    NoVariance,
    /// The regression sums overflowed or were poisoned by an infinite reading.
    #[error("regression sums are not finite, readings are infinite or too large to fit")]
    NonFiniteFit,
    /// The REU at a sample is NaN or infinite (strict policy only).
    #[error("relative expanded uncertainty at sample {index} is not a finite number")]
    UndefinedEstimate { index: usize },
    /// The REU radicand is negative at a sample (strict policy only).
    #[error("negative radicand {radicand} at sample {index}, the reference uncertainty exceeds the fit error")]
    NegativeRadicand { index: usize, radicand: f64 },
    /// The secondary reading is zero at a sample (strict policy only).
    #[error("secondary reading is zero at sample {index}, the relative uncertainty is undefined")]
    ZeroSecondary { index: usize },
    /// First value is the name of the parameter, second is the constraint, third is what was passed.
    #[error("invalid value for {0}: expected {1} but {2} provided")]
    InvalidParameter(&'static str, &'static str, f64),
    /// A named column is absent from the dataset.
    #[error("column `{0}` not found in dataset")]
    MissingColumn(String),
    /// A field could not be parsed as a number.
    #[error("could not parse `{value}` in column `{column}` at row {row}")]
    ParseValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
