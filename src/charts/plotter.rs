//! Chart Plotter Module
//! Builds chart models from the cleaned table and drives rendering.

use crate::charts::{ChartError, ChartRenderer};
use crate::config::{DATE_COL, LOCATION_COL, VACCINATION_RATE_COL};
use crate::data::{days_to_date, entity_ranges};
use crate::stats::LatestRecord;
use chrono::NaiveDate;
use log::{error, info};
use plotters::style::RGBColor;
use polars::prelude::*;
use std::path::PathBuf;

pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

/// Get color for the entity at `index` in allow-list order.
pub fn entity_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One line per entity over time.
    TimeSeries,
    /// One bar per entity from its latest row.
    LatestBar,
}

/// Static description of one chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSpec {
    pub id: &'static str,
    pub title: &'static str,
    pub column: &'static str,
    pub y_label: &'static str,
    pub kind: ChartKind,
    pub log_scale: bool,
}

pub const CHART_SPECS: [ChartSpec; 6] = [
    ChartSpec {
        id: "total_cases",
        title: "Total COVID-19 Cases Over Time",
        column: "total_cases",
        y_label: "Total cases (log scale)",
        kind: ChartKind::TimeSeries,
        log_scale: true,
    },
    ChartSpec {
        id: "total_deaths",
        title: "Total COVID-19 Deaths Over Time",
        column: "total_deaths",
        y_label: "Total deaths (log scale)",
        kind: ChartKind::TimeSeries,
        log_scale: true,
    },
    ChartSpec {
        id: "latest_total_cases",
        title: "Latest Total Cases by Location",
        column: "total_cases",
        y_label: "Total cases (log scale)",
        kind: ChartKind::LatestBar,
        log_scale: true,
    },
    ChartSpec {
        id: "new_cases",
        title: "Daily New COVID-19 Cases",
        column: "new_cases",
        y_label: "New cases",
        kind: ChartKind::TimeSeries,
        log_scale: false,
    },
    ChartSpec {
        id: "total_vaccinations",
        title: "Total Vaccinations Over Time",
        column: "total_vaccinations",
        y_label: "Total vaccinations (log scale)",
        kind: ChartKind::TimeSeries,
        log_scale: true,
    },
    ChartSpec {
        id: "vaccination_rate",
        title: "Share of Population Vaccinated (Latest)",
        column: VACCINATION_RATE_COL,
        y_label: "Vaccinated (%)",
        kind: ChartKind::LatestBar,
        log_scale: false,
    },
];

/// One entity's series on a time chart.
#[derive(Debug, Clone, PartialEq)]
pub struct LineData {
    pub entity: String,
    pub points: Vec<(NaiveDate, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartSeries {
    Lines(Vec<LineData>),
    Bars(Vec<(String, f64)>),
}

/// Chart data ready for a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub spec: ChartSpec,
    pub series: ChartSeries,
}

impl ChartData {
    /// Values that can be placed on the y axis.
    pub fn plottable_values(&self) -> Vec<f64> {
        let values: Vec<f64> = match &self.series {
            ChartSeries::Lines(lines) => lines
                .iter()
                .flat_map(|line| line.points.iter().map(|(_, v)| *v))
                .collect(),
            ChartSeries::Bars(bars) => bars.iter().map(|(_, v)| *v).collect(),
        };
        values
            .into_iter()
            .filter(|v| v.is_finite() && (!self.spec.log_scale || *v > 0.0))
            .collect()
    }

    /// Earliest and latest date across all lines.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let ChartSeries::Lines(lines) = &self.series else {
            return None;
        };
        let dates = lines.iter().flat_map(|line| line.points.iter().map(|(d, _)| *d));
        let (min, max) = dates.fold((None, None), |(min, max): (Option<NaiveDate>, Option<NaiveDate>), d| {
            (
                Some(min.map_or(d, |m| m.min(d))),
                Some(max.map_or(d, |m| m.max(d))),
            )
        });
        let (min, max) = (min?, max?);
        // plotters needs a non-empty range
        Some((min, max.max(min.succ_opt().unwrap_or(min))))
    }

    /// Y-axis bounds with padding; `None` when nothing can be plotted.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let values = self.plottable_values();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min > max {
            return None;
        }

        if self.spec.log_scale {
            return Some((min / 2.0, max * 2.0));
        }
        let lo = min.min(0.0);
        let hi = max + (max - lo).abs() * 0.05;
        Some((lo, if hi > lo { hi } else { lo + 1.0 }))
    }
}

/// Outcome of rendering every chart.
#[derive(Debug, Default)]
pub struct ChartRun {
    pub rendered: Vec<PathBuf>,
    pub failed: Vec<(&'static str, String)>,
}

/// Creates chart models and hands them to a renderer.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Build the chart model for one spec.
    pub fn build(
        df: &DataFrame,
        latest: &[LatestRecord],
        spec: &ChartSpec,
    ) -> Result<ChartData, ChartError> {
        if df.column(spec.column).is_err() {
            return Err(ChartError::MissingColumn(spec.column.to_string()));
        }

        let series = match spec.kind {
            ChartKind::TimeSeries => ChartSeries::Lines(Self::time_series(df, spec.column)?),
            ChartKind::LatestBar => ChartSeries::Bars(
                latest
                    .iter()
                    .filter_map(|record| record.get(spec.column).map(|v| (record.entity.clone(), v)))
                    .collect(),
            ),
        };

        Ok(ChartData { spec: *spec, series })
    }

    /// Split `column` into one dated series per entity.
    fn time_series(df: &DataFrame, column: &str) -> Result<Vec<LineData>, ChartError> {
        let locations = df.column(LOCATION_COL)?.cast(&DataType::String)?;
        let locations = locations.str()?;
        let dates = df.column(DATE_COL)?.cast(&DataType::Int32)?;
        let dates = dates.i32()?;
        let values = df.column(column)?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        Ok(entity_ranges(df)?
            .into_iter()
            .map(|range| LineData {
                entity: locations.get(range.start).unwrap_or_default().to_string(),
                points: range
                    .filter_map(|i| {
                        let date = dates.get(i).and_then(days_to_date)?;
                        Some((date, values.get(i)?))
                    })
                    .collect(),
            })
            .collect())
    }

    /// Build and render every chart; one failure never stops the rest.
    pub fn render_all(
        df: &DataFrame,
        latest: &[LatestRecord],
        renderer: &mut dyn ChartRenderer,
    ) -> ChartRun {
        let mut run = ChartRun::default();

        for spec in &CHART_SPECS {
            let result = Self::build(df, latest, spec).and_then(|chart| renderer.render(&chart));
            match result {
                Ok(path) => {
                    info!("Rendered '{}' to {}", spec.id, path.display());
                    run.rendered.push(path);
                }
                Err(e) => {
                    error!("Chart '{}' failed: {}", spec.id, e);
                    run.failed.push((spec.id, e.to_string()));
                }
            }
        }

        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(id: &str) -> ChartSpec {
        *CHART_SPECS.iter().find(|s| s.id == id).unwrap()
    }

    fn table() -> DataFrame {
        let dates = Column::new(DATE_COL.into(), &[18_628i32, 18_629, 18_628])
            .cast(&DataType::Date)
            .unwrap();
        let mut df = df!(
            "location" => &["A", "A", "B"],
            "total_cases" => &[0.0, 10.0, 1000.0],
            "new_cases" => &[0.0, 10.0, -5.0],
        )
        .unwrap();
        df.with_column(dates).unwrap();
        df
    }

    fn latest() -> Vec<LatestRecord> {
        ["A", "B"]
            .iter()
            .zip([10.0, 1000.0])
            .map(|(entity, cases)| LatestRecord {
                entity: entity.to_string(),
                date: None,
                values: BTreeMap::from([("total_cases".to_string(), cases)]),
            })
            .collect()
    }

    struct RecordingRenderer {
        fail_on: &'static str,
        seen: Vec<&'static str>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&mut self, chart: &ChartData) -> Result<PathBuf, ChartError> {
            self.seen.push(chart.spec.id);
            if chart.spec.id == self.fail_on {
                return Err(ChartError::NoData(chart.spec.id.to_string()));
            }
            Ok(PathBuf::from(format!("{}.png", chart.spec.id)))
        }
    }

    #[test]
    fn six_chart_specs_with_unique_ids() {
        let mut ids: Vec<&str> = CHART_SPECS.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn time_series_has_one_line_per_entity() {
        let chart = ChartPlotter::build(&table(), &latest(), &spec("total_cases")).unwrap();
        let ChartSeries::Lines(lines) = &chart.series else {
            panic!("expected lines");
        };
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].entity, "A");
        assert_eq!(
            lines[0].points,
            vec![
                (NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), 0.0),
                (NaiveDate::from_ymd_opt(2021, 1, 2).unwrap(), 10.0),
            ]
        );
    }

    #[test]
    fn log_charts_ignore_non_positive_values() {
        let chart = ChartPlotter::build(&table(), &latest(), &spec("total_cases")).unwrap();
        assert_eq!(chart.plottable_values(), vec![10.0, 1000.0]);
        assert_eq!(chart.value_range(), Some((5.0, 2000.0)));
    }

    #[test]
    fn linear_charts_keep_zero_and_negatives() {
        let chart = ChartPlotter::build(&table(), &latest(), &spec("new_cases")).unwrap();
        let (lo, hi) = chart.value_range().unwrap();
        assert_eq!(lo, -5.0);
        assert!(hi > 10.0);
    }

    #[test]
    fn single_day_series_gets_a_non_empty_date_range() {
        let df = table().slice(2, 1);
        let chart = ChartPlotter::build(&df, &latest(), &spec("total_cases")).unwrap();
        let (start, end) = chart.date_range().unwrap();
        assert!(end > start);
    }

    #[test]
    fn bars_come_from_latest_rows() {
        let chart = ChartPlotter::build(&table(), &latest(), &spec("latest_total_cases")).unwrap();
        assert_eq!(
            chart.series,
            ChartSeries::Bars(vec![("A".to_string(), 10.0), ("B".to_string(), 1000.0)])
        );
    }

    #[test]
    fn one_failing_chart_does_not_block_the_rest() {
        let mut renderer = RecordingRenderer {
            fail_on: "latest_total_cases",
            seen: Vec::new(),
        };
        let run = ChartPlotter::render_all(&table(), &latest(), &mut renderer);

        // Charts whose column is absent never reach the renderer
        assert_eq!(renderer.seen, vec!["total_cases", "latest_total_cases", "new_cases"]);
        assert_eq!(
            run.rendered,
            vec![PathBuf::from("total_cases.png"), PathBuf::from("new_cases.png")]
        );
        let failed: Vec<&str> = run.failed.iter().map(|(id, _)| *id).collect();
        assert_eq!(
            failed,
            vec!["total_deaths", "latest_total_cases", "total_vaccinations", "vaccination_rate"]
        );
    }
}
