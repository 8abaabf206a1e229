use std::fs;
use std::io::Write;
use std::path::Path;

use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::agreement::{bland_altman, compare, BlandAltman, Comparison};
use crate::dataset::{Dataset, Settings};
use crate::reu::{estimate, Estimate};
use crate::Result;

/// Agreement of one secondary instrument with the reference over one deployment
#[derive(Clone, Debug)]
pub struct Assessment {
    deployment: String,
    secondary: String,
    index: Vec<String>,
    reference_values: Vec<Option<f64>>,
    secondary_values: Vec<Option<f64>>,
    bland_altman: BlandAltman<f64>,
    comparison: Comparison<f64>,
    estimate: Estimate<f64>,
    /// REU on the dataset index, `None` where either reading is missing
    reu: Vec<Option<f64>>,
    data_quality_objective: Option<f64>,
}

/// Headline figures of an [`Assessment`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub deployment: String,
    pub secondary: String,
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mean_difference: f64,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub residual_variance: f64,
    pub undefined_reu: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within_objective: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance: Option<f64>,
}

#[derive(Serialize)]
struct ExportRow<'a> {
    index: &'a str,
    reference: Option<f64>,
    secondary: Option<f64>,
    reu: Option<f64>,
}

impl Assessment {
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn secondary(&self) -> &str {
        &self.secondary
    }

    pub const fn bland_altman(&self) -> &BlandAltman<f64> {
        &self.bland_altman
    }

    pub const fn comparison(&self) -> &Comparison<f64> {
        &self.comparison
    }

    pub const fn estimate(&self) -> &Estimate<f64> {
        &self.estimate
    }

    /// REU aligned with the dataset index
    pub fn reu(&self) -> &[Option<f64>] {
        &self.reu
    }

    /// Number of defined REU values whose magnitude is at or below the data quality objective
    ///
    /// A negative secondary reading gives a negative REU, its magnitude is what is compared.
    pub fn within_objective(&self) -> Option<usize> {
        let objective = self.data_quality_objective?;
        Some(
            self.estimate
                .values()
                .iter()
                .filter(|value| value.is_finite() && value.abs() <= objective)
                .count(),
        )
    }

    /// Fraction of defined REU values at or below the data quality objective
    #[allow(clippy::cast_precision_loss)]
    pub fn compliance(&self) -> Option<f64> {
        let within = self.within_objective()?;
        let defined = self.estimate.values().len() - self.estimate.undefined_count();
        (defined > 0).then(|| within as f64 / defined as f64)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            deployment: self.deployment.clone(),
            secondary: self.secondary.clone(),
            n: self.comparison.n,
            slope: self.comparison.fit.slope(),
            intercept: self.comparison.fit.intercept(),
            r_squared: self.comparison.r_squared,
            rmse: self.comparison.rmse,
            mae: self.comparison.mae,
            mean_difference: self.bland_altman.mean_difference(),
            lower_limit: self.bland_altman.lower_limit(),
            upper_limit: self.bland_altman.upper_limit(),
            residual_variance: self.estimate.residual_variance(),
            undefined_reu: self.estimate.undefined_count(),
            within_objective: self.within_objective(),
            compliance: self.compliance(),
        }
    }

    /// Write `index,reference,secondary,reu` rows, leaving missing values empty
    ///
    /// # Errors
    /// Returns an error if a row cannot be written.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for (((index, reference), secondary), reu) in self
            .index
            .iter()
            .zip(&self.reference_values)
            .zip(&self.secondary_values)
            .zip(&self.reu)
        {
            wtr.serialize(ExportRow {
                index,
                reference: *reference,
                secondary: *secondary,
                reu: *reu,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Assess every secondary instrument in `dataset` against the reference named in `settings`
///
/// # Errors
/// Returns an error if a column is missing or any statistic cannot be computed.
pub fn evaluate(
    deployment: &str,
    dataset: &Dataset,
    settings: &Settings,
) -> Result<Vec<Assessment>> {
    let config = settings.config();
    let reference_values = dataset.column(&settings.reference)?;

    settings
        .secondary_columns(dataset)?
        .into_iter()
        .map(|secondary| -> Result<Assessment> {
            info!(
                "assessing {secondary} against {} in {deployment}",
                settings.reference
            );
            let pair = dataset.pair(&settings.reference, &secondary)?;
            let estimate = estimate(&pair, &config)?;
            let reu = estimate.realigned(&pair)?;
            Ok(Assessment {
                deployment: deployment.to_owned(),
                index: dataset.index().to_vec(),
                reference_values: reference_values.to_vec(),
                secondary_values: dataset.column(&secondary)?.to_vec(),
                bland_altman: bland_altman(&pair)?,
                comparison: compare(&pair)?,
                estimate,
                reu,
                data_quality_objective: settings.data_quality_objective,
                secondary,
            })
        })
        .collect()
}

/// Assess every deployment under `working_directory/deployments`
///
/// Each deployment is a directory holding `settings.toml` and `measurements.csv`. Deployments are
/// visited in name order.
///
/// # Errors
/// Returns an error if the directory structure or any file is malformed, or if any assessment
/// fails.
pub fn assess(working_directory: &Path) -> Result<Vec<Assessment>> {
    let mut assessments = vec![];
    let deployments = fs::read_dir(working_directory.join("deployments"))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|path| path.is_dir())
        .sorted();

    for path in deployments {
        let deployment = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("working on deployment {deployment}");

        let settings = Settings::from_file(&path.join("settings.toml"))?;
        let dataset = Dataset::from_file(
            &path.join("measurements.csv"),
            settings.index_column.as_deref(),
        )?;
        info!("read {} rows from {deployment}", dataset.len());

        assessments.extend(evaluate(&deployment, &dataset, &settings)?);
    }

    Ok(assessments)
}

#[cfg(test)]
mod test {
    use super::evaluate;
    use crate::dataset::{Dataset, Settings};
    use crate::Result;

    const CSV: &str = "\
time,NO2,LCS1
t0,10.0,12.1
t1,20.0,22.9
t2,,30.0
t3,30.0,37.2
t4,40.0,47.5
t5,50.0,61.0
";

    fn settings() -> Settings {
        let mut settings = Settings::new("NO2");
        settings.index_column = Some("time".to_owned());
        settings
    }

    #[test]
    fn reu_is_realigned_to_the_dataset_index() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;

        let assessments = evaluate("site", &dataset, &settings())?;

        assert_eq!(assessments.len(), 1);
        let assessment = &assessments[0];
        assert_eq!(assessment.secondary(), "LCS1");
        assert_eq!(assessment.reu().len(), 6);
        assert!(assessment.reu()[2].is_none());
        assert_eq!(assessment.reu().iter().flatten().count(), 5);
        assert_eq!(assessment.comparison().n, 5);
        Ok(())
    }

    #[test]
    fn compliance_counts_values_within_objective() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;

        let mut settings = settings();
        assert!(evaluate("site", &dataset, &settings)?[0].compliance().is_none());

        settings.data_quality_objective = Some(f64::MAX);
        let assessment = &evaluate("site", &dataset, &settings)?[0];
        assert_eq!(assessment.within_objective(), Some(5));
        assert_eq!(assessment.compliance(), Some(1.0));

        settings.data_quality_objective = Some(-1.0);
        let assessment = &evaluate("site", &dataset, &settings)?[0];
        assert_eq!(assessment.within_objective(), Some(0));
        assert_eq!(assessment.compliance(), Some(0.0));
        Ok(())
    }

    #[test]
    fn negative_readings_are_judged_by_magnitude() -> Result<()> {
        let csv = "\
time,NO2,LCS1
t0,10.0,12.1
t1,20.0,-0.5
t2,30.0,37.2
t3,40.0,47.5
t4,50.0,61.0
";
        let dataset = Dataset::from_reader(csv.as_bytes(), Some("time"))?;
        let mut settings = settings();

        let values = evaluate("site", &dataset, &settings)?[0]
            .estimate()
            .values()
            .to_vec();
        assert!(values[1] < 0.);
        let objective = values
            .iter()
            .filter(|value| **value > 0.)
            .fold(0f64, |acc, value| acc.max(*value));
        assert!(values[1].abs() > objective);

        settings.data_quality_objective = Some(objective);
        let assessment = &evaluate("site", &dataset, &settings)?[0];
        assert_eq!(assessment.within_objective(), Some(4));
        assert_eq!(assessment.compliance(), Some(0.8));
        Ok(())
    }

    #[test]
    fn export_has_one_row_per_index_entry() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;
        let assessment = &evaluate("site", &dataset, &settings())?[0];

        let mut buffer = vec![];
        assessment.write_csv(&mut buffer)?;
        let exported = String::from_utf8(buffer).unwrap();
        let lines = exported.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "index,reference,secondary,reu");
        assert_eq!(lines[3], "t2,,30.0,");
        Ok(())
    }

    #[test]
    fn summary_serializes_to_toml() -> Result<()> {
        let dataset = Dataset::from_reader(CSV.as_bytes(), Some("time"))?;
        let assessment = &evaluate("site", &dataset, &settings())?[0];

        let summary = toml::to_string(&assessment.summary()).unwrap();

        assert!(summary.contains("deployment = \"site\""));
        assert!(summary.contains("n = 5"));
        assert!(!summary.contains("compliance"));
        Ok(())
    }
}
