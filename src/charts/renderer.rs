//! Static Chart Renderer
//! Exports chart models as PNG images with plotters.
//!
//! Layout per image:
//! 1. Caption centered at the top
//! 2. Line chart (one colored series per location, legend top-left) or
//!    bar chart (one bar per location, value labels above bars)
//! 3. Log-scaled y-axis for charts flagged `log_scale`

use crate::charts::{entity_color, ChartData, ChartSeries, LineData};
use chrono::NaiveDate;
use plotters::coord::CoordTranslate;
use plotters::prelude::*;
use polars::prelude::PolarsError;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FONT: &str = "sans-serif";

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Column '{0}' is not in the table")]
    MissingColumn(String),
    #[error("No plottable values for chart '{0}'")]
    NoData(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to draw chart '{id}': {message}")]
    Drawing { id: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn drawing_error<E: Display>(id: &str) -> impl Fn(E) -> ChartError + '_ {
    move |e| ChartError::Drawing {
        id: id.to_string(),
        message: e.to_string(),
    }
}

/// Rendering boundary; the statistical core never touches a backend directly.
pub trait ChartRenderer {
    /// Render one chart and return where it was written.
    fn render(&mut self, chart: &ChartData) -> Result<PathBuf, ChartError>;
}

/// Writes each chart as `<output_dir>/<id>.png`.
pub struct StaticChartRenderer {
    output_dir: PathBuf,
    size: (u32, u32),
}

impl StaticChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, size: (u32, u32)) -> Self {
        Self {
            output_dir: output_dir.into(),
            size,
        }
    }

    fn draw_time_series(
        &self,
        path: &Path,
        chart: &ChartData,
        lines: &[LineData],
        (y_min, y_max): (f64, f64),
    ) -> Result<(), ChartError> {
        let id = chart.spec.id;
        let (start, end) = chart
            .date_range()
            .ok_or_else(|| ChartError::NoData(id.to_string()))?;

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(drawing_error(id))?;

        let mut builder = ChartBuilder::on(&root);
        builder
            .caption(chart.spec.title, (FONT, 28))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(90);

        if chart.spec.log_scale {
            let mut ctx = builder
                .build_cartesian_2d(start..end, (y_min..y_max).log_scale())
                .map_err(drawing_error(id))?;
            ctx.configure_mesh()
                .x_desc("Date")
                .y_desc(chart.spec.y_label)
                .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m").to_string())
                .y_label_formatter(&|v: &f64| format_axis_value(*v))
                .draw()
                .map_err(drawing_error(id))?;
            Self::draw_lines(&mut ctx, lines, chart.spec.log_scale, id)?;
        } else {
            let mut ctx = builder
                .build_cartesian_2d(start..end, y_min..y_max)
                .map_err(drawing_error(id))?;
            ctx.configure_mesh()
                .x_desc("Date")
                .y_desc(chart.spec.y_label)
                .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m").to_string())
                .y_label_formatter(&|v: &f64| format_axis_value(*v))
                .draw()
                .map_err(drawing_error(id))?;
            Self::draw_lines(&mut ctx, lines, chart.spec.log_scale, id)?;
        }

        root.present().map_err(drawing_error(id))?;
        Ok(())
    }

    fn draw_lines<'a, CT>(
        ctx: &mut ChartContext<'a, BitMapBackend<'a>, CT>,
        lines: &[LineData],
        log_scale: bool,
        id: &str,
    ) -> Result<(), ChartError>
    where
        CT: CoordTranslate<From = (NaiveDate, f64)>,
    {
        for (idx, line) in lines.iter().enumerate() {
            let color = entity_color(idx);
            // Zero has no position on a log axis
            let points: Vec<(NaiveDate, f64)> = line
                .points
                .iter()
                .copied()
                .filter(|(_, v)| v.is_finite() && (!log_scale || *v > 0.0))
                .collect();

            ctx.draw_series(LineSeries::new(points, color.stroke_width(2)))
                .map_err(drawing_error(id))?
                .label(line.entity.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT, 14))
            .draw()
            .map_err(drawing_error(id))?;
        Ok(())
    }

    fn draw_bar_chart(
        &self,
        path: &Path,
        chart: &ChartData,
        bars: &[(String, f64)],
        (y_min, y_max): (f64, f64),
    ) -> Result<(), ChartError> {
        let id = chart.spec.id;
        let names: Vec<&str> = bars.iter().map(|(name, _)| name.as_str()).collect();
        let label_for = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => names.get(*i).map(|s| s.to_string()).unwrap_or_default(),
            _ => String::new(),
        };

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(drawing_error(id))?;

        let mut builder = ChartBuilder::on(&root);
        builder
            .caption(chart.spec.title, (FONT, 28))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(90);

        let x_range = (0..bars.len()).into_segmented();
        if chart.spec.log_scale {
            let mut ctx = builder
                .build_cartesian_2d(x_range, (y_min..y_max).log_scale())
                .map_err(drawing_error(id))?;
            ctx.configure_mesh()
                .disable_x_mesh()
                .x_labels(bars.len())
                .x_desc("Location")
                .y_desc(chart.spec.y_label)
                .x_label_formatter(&label_for)
                .y_label_formatter(&|v: &f64| format_axis_value(*v))
                .draw()
                .map_err(drawing_error(id))?;
            Self::draw_bars(&mut ctx, bars, y_min, id)?;
        } else {
            let mut ctx = builder
                .build_cartesian_2d(x_range, y_min..y_max)
                .map_err(drawing_error(id))?;
            ctx.configure_mesh()
                .disable_x_mesh()
                .x_labels(bars.len())
                .x_desc("Location")
                .y_desc(chart.spec.y_label)
                .x_label_formatter(&label_for)
                .y_label_formatter(&|v: &f64| format_axis_value(*v))
                .draw()
                .map_err(drawing_error(id))?;
            Self::draw_bars(&mut ctx, bars, y_min.max(0.0), id)?;
        }

        root.present().map_err(drawing_error(id))?;
        Ok(())
    }

    fn draw_bars<'a, CT>(
        ctx: &mut ChartContext<'a, BitMapBackend<'a>, CT>,
        bars: &[(String, f64)],
        base: f64,
        id: &str,
    ) -> Result<(), ChartError>
    where
        CT: CoordTranslate<From = (SegmentValue<usize>, f64)>,
    {
        ctx.draw_series(bars.iter().enumerate().filter(|(_, (_, v))| *v > base).map(
            |(i, (_, v))| {
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(i), base),
                        (SegmentValue::Exact(i + 1), *v),
                    ],
                    entity_color(i).filled(),
                );
                bar.set_margin(0, 0, 20, 20);
                bar
            },
        ))
        .map_err(drawing_error(id))?;

        ctx.draw_series(bars.iter().enumerate().filter(|(_, (_, v))| *v > base).map(
            |(i, (_, v))| {
                Text::new(
                    format_axis_value(*v),
                    (SegmentValue::CenterOf(i), *v),
                    (FONT, 14).into_font().color(&BLACK),
                )
            },
        ))
        .map_err(drawing_error(id))?;
        Ok(())
    }
}

impl ChartRenderer for StaticChartRenderer {
    fn render(&mut self, chart: &ChartData) -> Result<PathBuf, ChartError> {
        let id = chart.spec.id;
        let y_range = chart
            .value_range()
            .ok_or_else(|| ChartError::NoData(id.to_string()))?;

        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.png", id));

        match &chart.series {
            ChartSeries::Lines(lines) => self.draw_time_series(&path, chart, lines, y_range)?,
            ChartSeries::Bars(bars) => self.draw_bar_chart(&path, chart, bars, y_range)?,
        }
        Ok(path)
    }
}

/// Compact axis label: 1.2M, 35K, 0.75.
pub fn format_axis_value(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1e9 {
        format!("{:.1}B", v / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", v / 1e3)
    } else if abs >= 1.0 || abs == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}
