//! Statistics Calculator Module
//! Descriptive statistics, grouped death-rate means and latest-row snapshots.

use crate::config::{DATE_COL, DEATH_RATE_COL, LOCATION_COL};
use crate::data::{days_to_date, entity_ranges, numeric_columns};
use chrono::NaiveDate;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Descriptive statistics for a single numeric column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self {
            column: String::new(),
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            median: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Mean death rate of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRate {
    pub entity: String,
    pub mean_death_rate: f64,
}

/// The chronologically last row of one entity.
#[derive(Debug, Clone, Serialize)]
pub struct LatestRecord {
    pub entity: String,
    pub date: Option<NaiveDate>,
    pub values: BTreeMap<String, f64>,
}

impl LatestRecord {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }
}

/// Handles statistical calculations with multi-threading support.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> ColumnStats {
        let n = values.len();
        if n == 0 {
            return ColumnStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        ColumnStats {
            column: String::new(),
            count: n,
            mean: values.iter().mean(),
            // Sample standard deviation (n - 1); NaN for a single value
            std: values.iter().std_dev(),
            min: sorted[0],
            p25: Self::percentile(&sorted, 25.0),
            median: Self::percentile(&sorted, 50.0),
            p75: Self::percentile(&sorted, 75.0),
            max: sorted[n - 1],
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Get the non-null, finite values of a column as f64.
    pub fn get_column_values(df: &DataFrame, column: &str) -> Vec<f64> {
        df.column(column)
            .ok()
            .and_then(|col| col.cast(&DataType::Float64).ok())
            .map(|col| {
                col.f64()
                    .map(|ca| ca.into_iter().flatten().filter(|v| v.is_finite()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Describe every numeric column in parallel, preserving column order.
    pub fn describe(df: &DataFrame) -> Vec<ColumnStats> {
        numeric_columns(df)
            .par_iter()
            .map(|column| {
                let values = Self::get_column_values(df, column);
                let mut stats = Self::compute_descriptive_stats(&values);
                stats.column = column.clone();
                stats
            })
            .collect()
    }

    /// Mean death rate per entity, highest first.
    ///
    /// Expects a table sorted by entity.
    pub fn death_rate_by_entity(df: &DataFrame) -> PolarsResult<Vec<EntityRate>> {
        let locations = df.column(LOCATION_COL)?.cast(&DataType::String)?;
        let locations = locations.str()?;
        let rates = df.column(DEATH_RATE_COL)?.cast(&DataType::Float64)?;
        let rates: Vec<f64> = rates
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();

        let mut by_entity: Vec<EntityRate> = entity_ranges(df)?
            .into_iter()
            .map(|range| EntityRate {
                entity: locations.get(range.start).unwrap_or_default().to_string(),
                mean_death_rate: rates[range].iter().mean(),
            })
            .collect();

        by_entity.sort_by(|a, b| {
            b.mean_death_rate
                .partial_cmp(&a.mean_death_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(by_entity)
    }

    /// The last row of each entity group, in entity order.
    ///
    /// Expects a table sorted by entity then date.
    pub fn latest_by_entity(df: &DataFrame) -> PolarsResult<Vec<LatestRecord>> {
        let locations = df.column(LOCATION_COL)?.cast(&DataType::String)?;
        let locations = locations.str()?;
        let dates = df.column(DATE_COL)?.cast(&DataType::Int32)?;
        let dates = dates.i32()?;

        let numeric: Vec<(String, Vec<Option<f64>>)> = numeric_columns(df)
            .into_iter()
            .map(|name| {
                let values = df
                    .column(&name)?
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .collect();
                Ok((name, values))
            })
            .collect::<PolarsResult<_>>()?;

        Ok(entity_ranges(df)?
            .into_iter()
            .map(|range| {
                let last = range.end - 1;
                LatestRecord {
                    entity: locations.get(last).unwrap_or_default().to_string(),
                    date: dates.get(last).and_then(days_to_date),
                    values: numeric
                        .iter()
                        .filter_map(|(name, values)| values[last].map(|v| (name.clone(), v)))
                        .collect(),
                }
            })
            .collect())
    }

    /// Entity with the largest latest value of `column`.
    pub fn max_latest<'a>(latest: &'a [LatestRecord], column: &str) -> Option<(&'a LatestRecord, f64)> {
        latest
            .iter()
            .filter_map(|record| record.get(column).map(|v| (record, v)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}
