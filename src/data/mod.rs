//! Data module - CSV loading, cleaning and derived metrics

mod cleaner;
mod loader;
mod metrics;

pub use cleaner::{days_to_date, entity_ranges, CleanReport, DataCleaner};
pub use loader::{numeric_columns, DataLoader, LoaderError};
pub use metrics::MetricDeriver;
