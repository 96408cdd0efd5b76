//! Stats module - Descriptive statistics and console reporting

mod calculator;
mod report;

pub use calculator::{ColumnStats, EntityRate, LatestRecord, StatsCalculator};
pub use report::{AnalysisSummary, Reporter};
