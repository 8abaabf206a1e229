use std::fs;
use std::io::Read;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::pair::MeasurementPair;
use crate::reu::{Config, Policy};
use crate::{Error, Result};

/// Assessment settings for one deployment, read from `settings.toml`
///
/// ```toml
/// reference = "NO2"
/// secondaries = ["LCS1", "LCS2"]
/// index_column = "time"
/// reference_uncertainty = 0.5
/// coverage_factor = 2.0
/// policy = "strict"
/// data_quality_objective = 25.0
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Column holding the reference instrument
    pub reference: String,
    /// Columns holding secondary instruments, all other columns when empty
    #[serde(default)]
    pub secondaries: Vec<String>,
    /// Column holding the time stamps, kept as text
    #[serde(default)]
    pub index_column: Option<String>,
    #[serde(default)]
    pub reference_uncertainty: f64,
    #[serde(default = "default_coverage_factor")]
    pub coverage_factor: f64,
    #[serde(default)]
    pub policy: Policy,
    /// REU threshold in percent
    #[serde(default)]
    pub data_quality_objective: Option<f64>,
}

const fn default_coverage_factor() -> f64 {
    2.0
}

impl Settings {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            secondaries: vec![],
            index_column: None,
            reference_uncertainty: 0.0,
            coverage_factor: default_coverage_factor(),
            policy: Policy::default(),
            data_quality_objective: None,
        }
    }

    /// Read settings from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML for [`Settings`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = fs::read_to_string(path)?;
        Ok(toml::from_str(&settings)?)
    }

    pub const fn config(&self) -> Config<f64> {
        Config {
            reference_uncertainty: self.reference_uncertainty,
            coverage_factor: self.coverage_factor,
            policy: self.policy,
        }
    }

    /// The secondary columns to assess in `dataset`
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] if a named column is absent.
    pub fn secondary_columns(&self, dataset: &Dataset) -> Result<Vec<String>> {
        if self.secondaries.is_empty() {
            return Ok(dataset
                .column_names()
                .filter(|name| *name != self.reference)
                .map(str::to_owned)
                .collect());
        }
        for name in &self.secondaries {
            dataset.column(name)?;
        }
        Ok(self.secondaries.clone())
    }
}

#[derive(Clone, Debug)]
struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

/// Columns of co-located instrument readings sharing one index
#[derive(Clone, Debug)]
pub struct Dataset {
    index: Vec<String>,
    columns: Vec<Column>,
}

/// Whether a field marks a missing reading
fn is_missing(field: &str) -> bool {
    field.is_empty() || field.eq_ignore_ascii_case("nan") || field.eq_ignore_ascii_case("na")
}

impl Dataset {
    /// Read a dataset from a CSV file with a header row
    ///
    /// # Errors
    /// See [`Dataset::from_reader`].
    pub fn from_file(path: &Path, index_column: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("measurement file {} not found", path.display()),
            )
            .into());
        }
        let file = fs::read(path)?;
        Self::from_reader(&file[..], index_column)
    }

    /// Read a dataset from CSV
    ///
    /// The `index_column`, if given, is kept as text. Every other column must be numeric; empty
    /// fields, `NaN` and `NA` are missing readings.
    ///
    /// # Errors
    /// - [`Error::MissingColumn`] if `index_column` is not in the header
    /// - [`Error::ParseValue`] if a field is neither a number nor a missing marker, `row` counts
    ///   data rows from zero
    /// - [`Error::Csv`] for malformed CSV
    pub fn from_reader<R: Read>(reader: R, index_column: Option<&str>) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let index_position = index_column
            .map(|name| {
                headers
                    .iter()
                    .position(|header| header == name)
                    .ok_or_else(|| Error::MissingColumn(name.to_owned()))
            })
            .transpose()?;

        let mut index = vec![];
        let mut columns = headers
            .iter()
            .enumerate()
            .filter(|(ii, _)| Some(*ii) != index_position)
            .map(|(_, name)| Column {
                name: name.to_owned(),
                values: vec![],
            })
            .collect::<Vec<_>>();

        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let mut numeric = columns.iter_mut();
            for (ii, field) in record.iter().enumerate() {
                if Some(ii) == index_position {
                    index.push(field.to_owned());
                    continue;
                }
                // The csv reader rejects rows of unequal length, so every field has a column
                let Some(column) = numeric.next() else {
                    break;
                };
                let value = if is_missing(field) {
                    None
                } else {
                    Some(field.parse::<f64>().map_err(|_| Error::ParseValue {
                        row,
                        column: column.name.clone(),
                        value: field.to_owned(),
                    })?)
                };
                column.values.push(value);
            }
            if index_position.is_none() {
                index.push(row.to_string());
            }
        }

        debug!(
            "read {} rows of {} instrument columns",
            index.len(),
            columns.len()
        );

        Ok(Self { index, columns })
    }

    /// Row labels, the index column or the zero-based row number
    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// # Errors
    /// Returns [`Error::MissingColumn`] if there is no column called `name`.
    pub fn column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.values.as_slice())
            .ok_or_else(|| Error::MissingColumn(name.to_owned()))
    }

    /// Pair the `reference` and `secondary` columns
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] if either column is absent.
    pub fn pair(&self, reference: &str, secondary: &str) -> Result<MeasurementPair<f64>> {
        MeasurementPair::from_options(self.column(reference)?, self.column(secondary)?)
    }
}

#[cfg(test)]
mod test {
    use super::{Dataset, Settings};
    use crate::reu::Policy;
    use crate::{Error, Result};

    const CSV: &str = "\
time,NO2,LCS1,LCS2
2021-10-01 00:00,20.5,24.1,
2021-10-01 01:00,NaN,30.2,18.0
2021-10-01 02:00,25.0,NA,22.5
2021-10-01 03:00,31.2,37.9,29.0
";

    #[test]
    fn index_column_is_kept_as_text() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.index()[1], "2021-10-01 01:00");
        assert_eq!(
            dataset.column_names().collect::<Vec<_>>(),
            vec!["NO2", "LCS1", "LCS2"]
        );
        Ok(())
    }

    #[test]
    fn missing_markers_become_none() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;

        assert_eq!(
            dataset.column("NO2")?,
            &[Some(20.5), None, Some(25.0), Some(31.2)]
        );
        assert_eq!(dataset.column("LCS1")?[2], None);
        assert_eq!(dataset.column("LCS2")?[0], None);
        Ok(())
    }

    #[test]
    fn pairs_keep_only_rows_defined_in_both_columns() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;

        let pair = dataset.pair("NO2", "LCS1")?;

        assert_eq!(pair.indices(), &[0, 3]);
        assert_eq!(pair.original_len(), 4);
        Ok(())
    }

    #[test]
    fn rows_are_numbered_without_an_index_column() -> Result<()> {
        let dataset = Dataset::from_reader("a,b\n1,2\n3,4\n".as_bytes(), None)?;

        assert_eq!(dataset.index(), &["0", "1"]);
        assert_eq!(dataset.column_names().count(), 2);
        Ok(())
    }

    #[test]
    fn unknown_columns_are_reported() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;

        assert!(matches!(
            dataset.column("O3"),
            Err(Error::MissingColumn(name)) if name == "O3"
        ));
        assert!(matches!(
            Dataset::from_reader(CSV.as_bytes(), Some("date")),
            Err(Error::MissingColumn(_))
        ));
        Ok(())
    }

    #[test]
    fn unparseable_fields_are_reported_with_their_position() {
        let result = Dataset::from_reader("ref,lcs\n1,2\n3,oops\n".as_bytes(), None);

        assert!(matches!(
            result,
            Err(Error::ParseValue { row: 1, ref column, ref value }) if column == "lcs" && value == "oops"
        ));
    }

    #[test]
    fn settings_defaults_are_filled_in() -> Result<()> {
        let settings: Settings = toml::from_str(r#"reference = "NO2""#)?;

        assert_eq!(settings, Settings::new("NO2"));
        assert_eq!(settings.coverage_factor, 2.0);
        assert_eq!(settings.policy, Policy::Propagate);
        Ok(())
    }

    #[test]
    fn settings_are_read_in_full() -> Result<()> {
        let settings: Settings = toml::from_str(
            r#"
            reference = "NO2"
            secondaries = ["LCS2"]
            index_column = "time"
            reference_uncertainty = 0.5
            coverage_factor = 3.0
            policy = "strict"
            data_quality_objective = 25.0
            "#,
        )?;

        assert_eq!(settings.secondaries, vec!["LCS2".to_owned()]);
        assert_eq!(settings.policy, Policy::Strict);
        assert_eq!(settings.config().reference_uncertainty, 0.5);
        assert_eq!(settings.config().coverage_factor, 3.0);
        assert_eq!(settings.data_quality_objective, Some(25.0));
        Ok(())
    }

    #[test]
    fn secondaries_default_to_every_other_column() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;

        let mut settings = Settings::new("NO2");
        assert_eq!(settings.secondary_columns(&dataset)?, vec!["LCS1", "LCS2"]);

        settings.secondaries = vec!["LCS3".to_owned()];
        assert!(settings.secondary_columns(&dataset).is_err());
        Ok(())
    }
}
