use crate::config::Config;
use crate::controller::{self, ChartHost, Controller};
use crate::figure::Figure;
use crate::overlay::{self, Namespace};
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    path::{Path, PathBuf},
    thread,
};

/// Runs the window-average engine over every chart document in a directory.
pub struct Manager {
    chart_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(chart_dir: P) -> Result<Self> {
        let chart_dir = chart_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(chart_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { chart_dir, cfg })
    }

    /// Draw full-range averages on every chart.
    pub fn render_baselines(&self) -> Result<()> {
        for file in self.chart_files().context("failed to list chart files")? {
            let mut figure =
                Figure::from_file(&file).with_context(|| format!("failed to load {file:?}"))?;

            let warnings = controller::apply_baselines(&mut figure, &self.cfg);
            log::info!("drew baselines on {file:?} ({} series skipped)", warnings.len());

            figure
                .save(&file)
                .with_context(|| format!("failed to save {file:?}"))?;
        }
        Ok(())
    }

    /// Set the view range if given, then trigger a recomputation on every chart.
    pub fn compute_zoom(&self, range: Option<(f64, f64)>) -> Result<()> {
        for file in self.chart_files().context("failed to list chart files")? {
            let mut figure =
                Figure::from_file(&file).with_context(|| format!("failed to load {file:?}"))?;
            if let Some((x_min, x_max)) = range {
                figure.set_x_range(x_min, x_max);
            }

            let mut ctl = Controller::new(self.cfg.clone());
            ctl.setup(&mut figure, thread::sleep)
                .with_context(|| format!("failed to set up controller for {file:?}"))?;

            match ctl.trigger(&mut figure) {
                Ok(report) => log::info!(
                    "updated {file:?} ({} series averaged, {} skipped)",
                    report.points().count(),
                    report.warnings.len()
                ),
                Err(error) => log::warn!("left {file:?} unchanged: {error}"),
            }
            log::debug!("controller phase {:?}", ctl.phase());

            for notice in figure.take_notices() {
                println!("{notice}");
            }

            figure
                .save(&file)
                .with_context(|| format!("failed to save {file:?}"))?;
        }
        Ok(())
    }

    /// Remove every zoom overlay, keeping everything else.
    pub fn clean_zoom(&self) -> Result<()> {
        for file in self.chart_files().context("failed to list chart files")? {
            let mut figure =
                Figure::from_file(&file).with_context(|| format!("failed to load {file:?}"))?;

            let cleaned = overlay::replace_namespace(
                &figure.overlays(),
                Namespace::Zoom,
                &[],
                &self.cfg.overlay,
            );
            log::info!(
                "cleaned {file:?} ({} baseline overlays kept)",
                cleaned.shapes_in(Namespace::Baseline).count()
            );
            figure.apply_overlays(cleaned);

            figure
                .save(&file)
                .with_context(|| format!("failed to save {file:?}"))?;
        }
        Ok(())
    }

    fn chart_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.chart_dir.join("chart-*.json");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<_> = glob(pattern)
            .context("failed to glob chart files")?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if files.is_empty() {
            bail!("no chart files match {pattern:?}");
        }
        files.sort();
        Ok(files)
    }
}
