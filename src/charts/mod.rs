//! Charts module - Chart models and rendering

mod plotter;
mod renderer;

pub use plotter::{entity_color, ChartData, ChartPlotter, ChartRun, ChartSeries, LineData, CHART_SPECS};
pub use renderer::{ChartError, ChartRenderer, StaticChartRenderer};
