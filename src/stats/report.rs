//! Console Report Module
//! Prints statistics tables and narrative insights, and writes a JSON summary.

use crate::config::VACCINATION_RATE_COL;
use crate::data::CleanReport;
use crate::stats::{ColumnStats, EntityRate, LatestRecord, StatsCalculator};
use anyhow::Context;
use comfy_table::{
    presets::NOTHING, Attribute, Cell, CellAlignment, ContentArrangement, Table, TableComponent,
};
use log::info;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Everything the reporter derives from the cleaned table.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub cleaning: CleanReport,
    pub descriptive: Vec<ColumnStats>,
    pub death_rate_by_entity: Vec<EntityRate>,
    pub latest: Vec<LatestRecord>,
    pub insights: Vec<String>,
}

/// Read-only summarisation of the cleaned table.
pub struct Reporter;

impl Reporter {
    /// Gather statistics and insights; never mutates the table.
    pub fn summarize(df: &DataFrame, cleaning: &CleanReport) -> PolarsResult<AnalysisSummary> {
        let descriptive = StatsCalculator::describe(df);
        let death_rate_by_entity = StatsCalculator::death_rate_by_entity(df)?;
        let latest = StatsCalculator::latest_by_entity(df)?;
        let insights = Self::insights(&latest, &death_rate_by_entity);

        Ok(AnalysisSummary {
            cleaning: cleaning.clone(),
            descriptive,
            death_rate_by_entity,
            latest,
            insights,
        })
    }

    /// Templated narrative sentences.
    pub fn insights(latest: &[LatestRecord], rates: &[EntityRate]) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some((record, cases)) = StatsCalculator::max_latest(latest, "total_cases") {
            let as_of = record
                .date
                .map(|d| format!(" as of {}", d.format("%Y-%m-%d")))
                .unwrap_or_default();
            lines.push(format!(
                "{} has the highest cumulative case count ({:.0}){}.",
                record.entity, cases, as_of
            ));
        }

        if let Some((record, pct)) = StatsCalculator::max_latest(latest, VACCINATION_RATE_COL) {
            lines.push(format!(
                "{} leads vaccination coverage with {:.2}% of its population vaccinated.",
                record.entity, pct
            ));
        }

        // Rates arrive sorted highest first
        if let (Some(high), Some(low)) = (rates.first(), rates.last()) {
            lines.push(format!(
                "{} has the highest average death rate at {:.2}%.",
                high.entity, high.mean_death_rate
            ));
            if rates.len() > 1 {
                lines.push(format!(
                    "Average death rates range from {:.2}% ({}) to {:.2}% ({}).",
                    low.mean_death_rate, low.entity, high.mean_death_rate, high.entity
                ));
            }
        }

        lines
    }

    /// Print the summary to the console.
    pub fn print(summary: &AnalysisSummary) {
        println!("\nDescriptive statistics");
        println!("{}", Self::describe_table(&summary.descriptive));

        println!("\nMean death rate by location (%)");
        println!("{}", Self::death_rate_table(&summary.death_rate_by_entity));

        println!("\nInsights");
        for line in &summary.insights {
            println!("- {}", line);
        }
    }

    fn describe_table(stats: &[ColumnStats]) -> Table {
        let mut table = Self::new_table(&[
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max",
        ]);
        for s in stats {
            let mut row = vec![Cell::new(&s.column), Cell::new(s.count)];
            row.extend(
                [s.mean, s.std, s.min, s.p25, s.median, s.p75, s.max]
                    .into_iter()
                    .map(|v| Cell::new(format_value(v)).set_alignment(CellAlignment::Right)),
            );
            table.add_row(row);
        }
        table
    }

    fn death_rate_table(rates: &[EntityRate]) -> Table {
        let mut table = Self::new_table(&["location", "death_rate"]);
        for rate in rates {
            table.add_row(vec![
                Cell::new(&rate.entity),
                Cell::new(format_value(rate.mean_death_rate)).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }

    fn new_table(headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_style(TableComponent::TopBorder, '─')
            .set_style(TableComponent::TopBorderIntersections, '─')
            .set_style(TableComponent::HeaderLines, '─')
            .set_style(TableComponent::MiddleHeaderIntersections, '─')
            .set_style(TableComponent::BottomBorder, '─')
            .set_style(TableComponent::BottomBorderIntersections, '─')
            .set_header(
                headers
                    .iter()
                    .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                    .collect::<Vec<_>>(),
            );
        table
    }

    /// Write the summary as pretty-printed JSON.
    pub fn write_json(summary: &AnalysisSummary, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), summary)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Summary written to {}", path.display());
        Ok(())
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.2}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn record(entity: &str, cases: f64, vaccinated: Option<f64>) -> LatestRecord {
        let mut values = BTreeMap::from([("total_cases".to_string(), cases)]);
        if let Some(v) = vaccinated {
            values.insert(VACCINATION_RATE_COL.to_string(), v);
        }
        LatestRecord {
            entity: entity.to_string(),
            date: NaiveDate::from_ymd_opt(2022, 6, 30),
            values,
        }
    }

    fn rate(entity: &str, mean_death_rate: f64) -> EntityRate {
        EntityRate {
            entity: entity.to_string(),
            mean_death_rate,
        }
    }

    #[test]
    fn insights_name_the_leading_entities() {
        let latest = vec![
            record("Kenya", 300.0, Some(40.0)),
            record("India", 9000.0, Some(70.5)),
        ];
        let rates = vec![rate("Kenya", 2.0), rate("India", 1.25)];

        let lines = Reporter::insights(&latest, &rates);

        assert_eq!(
            lines,
            vec![
                "India has the highest cumulative case count (9000) as of 2022-06-30.",
                "India leads vaccination coverage with 70.50% of its population vaccinated.",
                "Kenya has the highest average death rate at 2.00%.",
                "Average death rates range from 1.25% (India) to 2.00% (Kenya).",
            ]
        );
    }

    #[test]
    fn insights_skip_missing_inputs() {
        let latest = vec![record("Kenya", 300.0, None)];
        let lines = Reporter::insights(&latest, &[rate("Kenya", 1.0)]);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.contains("vaccination")));
    }

    #[test]
    fn summary_is_written_as_json() {
        let summary = AnalysisSummary {
            cleaning: CleanReport::default(),
            descriptive: vec![StatsCalculator::compute_descriptive_stats(&[1.0])],
            death_rate_by_entity: vec![rate("Kenya", 1.0)],
            latest: vec![record("Kenya", 3.0, None)],
            insights: vec!["line".to_string()],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        Reporter::write_json(&summary, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(json["latest"][0]["entity"], "Kenya");
        assert_eq!(json["latest"][0]["date"], "2022-06-30");
        // Single-value std is NaN, which JSON renders as null
        assert!(json["descriptive"][0]["std"].is_null());
    }

    #[test]
    fn tables_render_every_row() {
        let table = Reporter::death_rate_table(&[rate("Kenya", 1.0), rate("India", f64::NAN)]);
        let rendered = table.to_string();
        assert!(rendered.contains("Kenya"));
        assert!(rendered.contains("NaN"));
        // Horizontal rules only, no vertical borders
        assert!(rendered.contains('─'));
        assert!(!rendered.contains('│'));
    }
}
