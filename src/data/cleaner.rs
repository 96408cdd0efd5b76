//! Data Cleaner Module
//! Date parsing, entity filtering and per-entity gap filling.

use crate::config::{FillPolicy, Settings, DATE_COL, LOCATION_COL};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use polars::prelude::*;
use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Required column '{0}' is missing")]
    MissingColumn(String),
}

/// Row and value counts gathered while cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub input_rows: usize,
    pub dropped_invalid_dates: usize,
    pub dropped_other_entities: usize,
    pub filled_values: usize,
    pub output_rows: usize,
    /// Distinct locations left after cleaning.
    pub output_entities: usize,
}

/// Parse a raw date string, returning `None` when no known format matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Days since the Unix epoch, the physical representation of a polars `Date`.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_FROM_CE)
}

/// Replace missing values of a daily metric with zero.
pub fn fill_daily(values: &mut [Option<f64>]) {
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(0.0);
    }
}

/// Fill one entity's cumulative series in place.
///
/// Interior gaps are interpolated linearly against `days`, trailing gaps carry
/// the last known value forward and leading gaps become zero.
pub fn fill_cumulative(values: &mut [Option<f64>], days: &[i32]) {
    debug_assert_eq!(values.len(), days.len());

    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        fill_daily(values);
        return;
    };

    for pair in known.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let (y0, y1) = (values[a].unwrap_or(0.0), values[b].unwrap_or(0.0));
        let (x0, x1) = (days[a] as f64, days[b] as f64);
        for i in a + 1..b {
            // Fall back to position when the neighbours share a date
            let t = if x1 > x0 {
                (days[i] as f64 - x0) / (x1 - x0)
            } else {
                (i - a) as f64 / (b - a) as f64
            };
            values[i] = Some(y0 + (y1 - y0) * t);
        }
    }

    let carry = values[last];
    for v in &mut values[last + 1..] {
        *v = carry;
    }
    for v in &mut values[..first] {
        *v = Some(0.0);
    }
}

/// Split a location-sorted table into contiguous per-entity row ranges.
pub fn entity_ranges(df: &DataFrame) -> PolarsResult<Vec<Range<usize>>> {
    let locations = df.column(LOCATION_COL)?.cast(&DataType::String)?;
    let names: Vec<Option<&str>> = locations.str()?.into_iter().collect();

    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=names.len() {
        if i == names.len() || names[i] != names[start] {
            ranges.push(start..i);
            start = i;
        }
    }
    Ok(ranges)
}

fn location_column(df: &DataFrame) -> Result<Column, CleanError> {
    let locations = df
        .column(LOCATION_COL)
        .map_err(|_| CleanError::MissingColumn(LOCATION_COL.to_string()))?;
    Ok(locations.cast(&DataType::String)?)
}

/// Handles the cleaning stage of the pipeline.
pub struct DataCleaner;

impl DataCleaner {
    /// Run every cleaning step in order.
    pub fn clean(df: DataFrame, settings: &Settings) -> Result<(DataFrame, CleanReport), CleanError> {
        let mut report = CleanReport {
            input_rows: df.height(),
            ..Default::default()
        };

        // Fail early rather than after date parsing
        location_column(&df)?;

        let (df, dropped) = Self::parse_dates(df)?;
        report.dropped_invalid_dates = dropped;
        println!("Dropped {} rows with invalid dates.", dropped);

        let (df, dropped) = Self::filter_entities(df, settings)?;
        report.dropped_other_entities = dropped;

        let df = Self::sort_by_entity_and_date(&df)?;
        let (df, filled) = Self::fill_missing(df, settings)?;
        report.filled_values = filled;
        report.output_rows = df.height();
        report.output_entities = entity_ranges(&df)?.len();

        info!(
            "Cleaned table: {} of {} rows kept, {} values filled",
            report.output_rows, report.input_rows, report.filled_values
        );
        Ok((df, report))
    }

    /// Convert the date column to a polars `Date` and drop rows that fail to parse.
    ///
    /// Returns the cleaned DataFrame and the number of rows dropped.
    pub fn parse_dates(mut df: DataFrame) -> Result<(DataFrame, usize), CleanError> {
        let dates = df
            .column(DATE_COL)
            .map_err(|_| CleanError::MissingColumn(DATE_COL.to_string()))?;

        let days: Vec<Option<i32>> = match dates.dtype() {
            DataType::Date => dates.cast(&DataType::Int32)?.i32()?.into_iter().collect(),
            DataType::Datetime(_, _) => dates
                .cast(&DataType::Date)?
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .collect(),
            _ => dates
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_date).map(date_to_days))
                .collect(),
        };

        let parsed = Column::new(DATE_COL.into(), days).cast(&DataType::Date)?;
        df.with_column(parsed)?;

        let before = df.height();
        let df = df.lazy().filter(col(DATE_COL).is_not_null()).collect()?;
        let dropped = before - df.height();
        if dropped > 0 {
            warn!("{} rows had an unparseable date", dropped);
        }
        Ok((df, dropped))
    }

    /// Keep only rows whose entity is in the configured allow-list.
    pub fn filter_entities(
        df: DataFrame,
        settings: &Settings,
    ) -> Result<(DataFrame, usize), CleanError> {
        let locations = location_column(&df)?;
        let mask: BooleanChunked = locations
            .str()?
            .into_iter()
            .map(|v| v.is_some_and(|name| settings.is_allowed(name)))
            .collect();

        let filtered = df.filter(&mask)?;
        let dropped = df.height() - filtered.height();
        debug!(
            "Entity filter kept {} rows, dropped {}",
            filtered.height(),
            dropped
        );
        Ok((filtered, dropped))
    }

    /// Sort by (entity, date) ascending; fills below depend on this order.
    pub fn sort_by_entity_and_date(df: &DataFrame) -> Result<DataFrame, CleanError> {
        Ok(df.sort(
            [LOCATION_COL, DATE_COL],
            SortMultipleOptions::default().with_maintain_order(true),
        )?)
    }

    /// Fill gaps in every configured numeric column.
    ///
    /// Expects the table sorted by entity then date. Returns the DataFrame and
    /// the number of values that were filled.
    pub fn fill_missing(
        mut df: DataFrame,
        settings: &Settings,
    ) -> Result<(DataFrame, usize), CleanError> {
        let groups = entity_ranges(&df)?;
        let days: Vec<i32> = df
            .column(DATE_COL)
            .map_err(|_| CleanError::MissingColumn(DATE_COL.to_string()))?
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .map(|d| d.unwrap_or_default())
            .collect();

        let mut filled = 0;
        for name in &settings.numeric_columns {
            let Ok(column) = df.column(name) else {
                warn!("Numeric column '{}' not found, skipping", name);
                continue;
            };

            let as_f64 = column.cast(&DataType::Float64)?;
            let mut values: Vec<Option<f64>> = as_f64
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            let missing = values.iter().filter(|v| v.is_none()).count();
            if missing == 0 && column.dtype() == &DataType::Float64 {
                continue;
            }
            filled += missing;

            match FillPolicy::for_column(name) {
                FillPolicy::Daily => fill_daily(&mut values),
                FillPolicy::Cumulative => {
                    for range in &groups {
                        fill_cumulative(&mut values[range.clone()], &days[range.clone()]);
                    }
                }
            }

            let values: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
            df.with_column(Column::new(name.as_str().into(), values))?;
            debug!("Filled {} gaps in '{}'", missing, name);
        }

        Ok((df, filled))
    }
}
