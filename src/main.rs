//! Covid Explorer - COVID-19 CSV Analysis & Chart Export
//!
//! Loads the OWID dataset, cleans it, derives rates, prints a statistical
//! report and writes static charts.

mod app;
mod charts;
mod config;
mod data;
mod stats;

use app::CovidExplorer;
use charts::StaticChartRenderer;
use config::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::default();
    let mut renderer = StaticChartRenderer::new(&settings.output_dir, settings.chart_size);

    match CovidExplorer::new(settings).run(&mut renderer) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
