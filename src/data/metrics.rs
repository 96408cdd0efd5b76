//! Metric Deriver Module
//! Appends ratio columns computed with zero-safe division.

use crate::config::{DEATH_RATE_COL, VACCINATION_RATE_COL};
use log::{info, warn};
use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' is required to derive '{1}'")]
    MissingColumn(String, &'static str),
}

/// `100 * numerator / denominator`, with undefined results mapped to zero.
pub fn safe_percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let pct = 100.0 * numerator / denominator;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Derives ratio metrics from cleaned counters.
pub struct MetricDeriver;

impl MetricDeriver {
    /// Append `death_rate` (and `vaccination_rate` when its inputs exist).
    pub fn derive_all(df: &mut DataFrame) -> Result<(), MetricsError> {
        Self::add_ratio(df, DEATH_RATE_COL, "total_deaths", "total_cases")?;

        match Self::add_ratio(df, VACCINATION_RATE_COL, "people_vaccinated", "population") {
            Err(MetricsError::MissingColumn(column, _)) => {
                warn!("Skipping '{}': column '{}' not found", VACCINATION_RATE_COL, column);
            }
            other => other?,
        }
        Ok(())
    }

    /// Append `target = 100 * numerator / denominator` row by row.
    pub fn add_ratio(
        df: &mut DataFrame,
        target: &'static str,
        numerator: &str,
        denominator: &str,
    ) -> Result<(), MetricsError> {
        let num = Self::float_values(df, numerator, target)?;
        let den = Self::float_values(df, denominator, target)?;

        let rates: Vec<f64> = num
            .iter()
            .zip(den.iter())
            .map(|(n, d)| safe_percentage(n.unwrap_or(0.0), d.unwrap_or(0.0)))
            .collect();

        let zeroed = den.iter().filter(|d| d.unwrap_or(0.0) == 0.0).count();
        df.with_column(Column::new(target.into(), rates))?;
        info!(
            "Derived '{}' for {} rows ({} with zero '{}')",
            target,
            df.height(),
            zeroed,
            denominator
        );
        Ok(())
    }

    fn float_values(
        df: &DataFrame,
        name: &str,
        target: &'static str,
    ) -> Result<Vec<Option<f64>>, MetricsError> {
        let column = df
            .column(name)
            .map_err(|_| MetricsError::MissingColumn(name.to_string(), target))?;
        let as_f64 = column.cast(&DataType::Float64)?;
        Ok(as_f64.f64()?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn zero_over_zero_is_zero() {
        assert_eq!(safe_percentage(0.0, 0.0), 0.0);
        assert_eq!(safe_percentage(5.0, 0.0), 0.0);
        assert_eq!(safe_percentage(f64::NAN, 10.0), 0.0);
        assert_eq!(safe_percentage(1.0, 4.0), 25.0);
    }

    #[test]
    fn death_rate_is_finite_everywhere() {
        let mut df = df!(
            "total_cases" => &[0.0, 200.0, 1000.0],
            "total_deaths" => &[0.0, 4.0, 1000.0],
        )
        .unwrap();
        MetricDeriver::derive_all(&mut df).unwrap();

        let death_rate = rates(&df, DEATH_RATE_COL);
        assert_eq!(death_rate, vec![0.0, 2.0, 100.0]);
        assert!(death_rate.iter().all(|r| r.is_finite()));
        // No vaccination inputs, so only the death rate is appended
        assert!(df.column(VACCINATION_RATE_COL).is_err());
    }

    #[test]
    fn vaccination_rate_uses_population() {
        let mut df = df!(
            "total_cases" => &[10.0, 10.0],
            "total_deaths" => &[1.0, 1.0],
            "people_vaccinated" => &[50.0, 10.0],
            "population" => &[200.0, 0.0],
        )
        .unwrap();
        MetricDeriver::derive_all(&mut df).unwrap();
        assert_eq!(rates(&df, VACCINATION_RATE_COL), vec![25.0, 0.0]);
    }

    #[test]
    fn missing_case_counts_are_an_error() {
        let mut df = df!("total_deaths" => &[1.0]).unwrap();
        let err = MetricDeriver::derive_all(&mut df).unwrap_err();
        assert!(matches!(err, MetricsError::MissingColumn(c, DEATH_RATE_COL) if c == "total_cases"));
    }
}
