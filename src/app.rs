//! Covid Explorer Application
//! Runs load, clean, derive, report and chart stages in order.

use crate::charts::{ChartPlotter, ChartRenderer, ChartRun, CHART_SPECS};
use crate::config::Settings;
use crate::data::{DataCleaner, DataLoader, MetricDeriver};
use crate::stats::{AnalysisSummary, Reporter};
use anyhow::Context;
use log::{debug, info, warn};
use std::fs;

/// What a completed run produced.
pub struct AnalysisOutcome {
    pub summary: AnalysisSummary,
    pub charts: ChartRun,
}

/// Main application: owns the settings and the loader.
pub struct CovidExplorer {
    settings: Settings,
    loader: DataLoader,
}

impl CovidExplorer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            loader: DataLoader::new(),
        }
    }

    /// Run the whole pipeline. A load failure stops before any other stage.
    pub fn run(&mut self, renderer: &mut dyn ChartRenderer) -> anyhow::Result<AnalysisOutcome> {
        if let Ok(json) = serde_json::to_string(&self.settings) {
            debug!("Settings: {}", json);
        }
        self.loader.load_csv(&self.settings.input_path)?;
        if let Some(path) = self.loader.get_file_path() {
            println!(
                "Dataset loaded from {}: {} rows, {} columns",
                path.display(),
                self.loader.get_row_count(),
                self.loader.get_columns().len()
            );
        }
        let df = self
            .loader
            .take_dataframe()
            .context("Loader returned no data")?;

        let (mut df, cleaning) = DataCleaner::clean(df, &self.settings)?;
        println!(
            "Cleaned data: {} rows across {} locations",
            cleaning.output_rows,
            cleaning.output_entities
        );

        MetricDeriver::derive_all(&mut df)?;

        let summary = Reporter::summarize(&df, &cleaning)?;
        Reporter::print(&summary);

        // The summary file is a side output; charts still render without it
        let summary_path = self.settings.output_dir.join("summary.json");
        if let Err(e) = fs::create_dir_all(&self.settings.output_dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| Reporter::write_json(&summary, &summary_path))
        {
            warn!("Could not write summary: {:#}", e);
        }

        info!("Rendering {} charts", CHART_SPECS.len());
        let charts = ChartPlotter::render_all(&df, &summary.latest, renderer);
        println!(
            "Rendered {} of {} charts into {}",
            charts.rendered.len(),
            CHART_SPECS.len(),
            self.settings.output_dir.display()
        );

        Ok(AnalysisOutcome { summary, charts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartData, ChartError};
    use crate::data::LoaderError;
    use std::io::Write;
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingRenderer {
        seen: Vec<&'static str>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&mut self, chart: &ChartData) -> Result<PathBuf, ChartError> {
            self.seen.push(chart.spec.id);
            Ok(PathBuf::from(chart.spec.id))
        }
    }

    const CSV: &str = "\
location,date,total_cases,new_cases,total_deaths,new_deaths,total_vaccinations,people_vaccinated,population
Kenya,2021-01-01,,,,,,,100
Kenya,2021-01-02,100,100,2,2,10,10,100
Kenya,2021-01-03,,,,,,,100
Kenya,2021-01-04,300,200,6,4,30,20,100
Kenya,not-a-date,999,1,1,1,1,1,100
India,2021-01-01,1000,1000,10,10,500,400,1000
India,2021-01-02,2000,1000,30,20,800,700,1000
World,2021-01-01,5000,5000,50,50,900,800,9000
";

    fn settings(dir: &tempfile::TempDir, input: PathBuf) -> Settings {
        Settings {
            input_path: input,
            output_dir: dir.path().join("out"),
            entities: vec!["Kenya".to_string(), "India".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn full_run_cleans_reports_and_renders_every_chart() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("covid.csv");
        fs::File::create(&input)
            .unwrap()
            .write_all(CSV.as_bytes())
            .unwrap();

        let mut renderer = RecordingRenderer::default();
        let outcome = CovidExplorer::new(settings(&dir, input))
            .run(&mut renderer)
            .unwrap();

        let cleaning = &outcome.summary.cleaning;
        assert_eq!(cleaning.dropped_invalid_dates, 1);
        assert_eq!(cleaning.dropped_other_entities, 1);
        assert_eq!(cleaning.output_rows, 6);
        assert_eq!(cleaning.output_entities, 2);

        let kenya = outcome
            .summary
            .latest
            .iter()
            .find(|r| r.entity == "Kenya")
            .unwrap();
        assert_eq!(kenya.get("total_cases"), Some(300.0));
        assert_eq!(kenya.get("death_rate"), Some(2.0));
        assert_eq!(kenya.get("vaccination_rate"), Some(20.0));

        assert_eq!(outcome.summary.death_rate_by_entity[0].entity, "Kenya");
        assert!(outcome.summary.insights[0].starts_with("India"));
        assert_eq!(renderer.seen.len(), CHART_SPECS.len());
        assert!(outcome.charts.failed.is_empty());
        assert!(dir.path().join("out").join("summary.json").exists());
    }

    #[test]
    fn missing_file_stops_before_any_other_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = RecordingRenderer::default();
        let err = CovidExplorer::new(settings(&dir, dir.path().join("missing.csv")))
            .run(&mut renderer)
            .err()
            .unwrap();

        assert!(matches!(
            err.downcast_ref::<LoaderError>(),
            Some(LoaderError::NotFound(_))
        ));
        assert!(renderer.seen.is_empty());
        assert!(!dir.path().join("out").exists());
    }
}
