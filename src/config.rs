use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path, time::Duration};

/// Chart configuration.
///
/// Loaded from a TOML file and validated before use.
/// Every field has a default, so an empty file is a valid configuration.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub overlay: OverlayConfig,
    pub report: ReportConfig,
    pub readiness: ReadinessConfig,
}

/// Appearance of the overlays drawn on the chart.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Line colour of window-average lines.
    pub zoom_color: String,
    /// Line width of window-average lines.
    pub zoom_width: f64,

    /// Line colour of full-range average lines.
    pub baseline_color: String,
    /// Line width of full-range average lines.
    pub baseline_width: f64,
    /// Dash style of full-range average lines.
    pub baseline_dash: String,

    /// Font size of overlay labels.
    pub label_font_size: u32,
    /// Decimal places of the average shown in labels.
    pub label_precision: usize,

    /// Text of the trigger control.
    pub control_label: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            zoom_color: "red".to_owned(),
            zoom_width: 3.0,
            baseline_color: "red".to_owned(),
            baseline_width: 2.0,
            baseline_dash: "dash".to_owned(),
            label_font_size: 12,
            label_precision: 2,
            control_label: "CALC ZOOM AVG".to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Decimal places of the averages listed in the report.
    pub precision: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { precision: 4 }
    }
}

/// Poll-with-backoff contract for waiting on the chart's first layout.
///
/// The first poll is immediate; after each failed poll the delay is slept,
/// then multiplied by `backoff_factor` and capped at `max_delay_ms`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessConfig {
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 50,
            backoff_factor: 2.0,
            max_delay_ms: 800,
            max_attempts: 8,
        }
    }
}

impl ReadinessConfig {
    /// Sleeps between consecutive polls, `max_attempts - 1` of them.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let n_sleeps = self.max_attempts.saturating_sub(1) as usize;
        let max_delay = self.max_delay_ms as f64;
        std::iter::successors(Some(self.initial_delay_ms as f64), move |&delay| {
            Some((delay * self.backoff_factor).min(max_delay))
        })
        .take(n_sleeps)
        .map(move |delay| Duration::from_millis(delay.min(max_delay) as u64))
    }

    /// Longest time setup can spend waiting for the layout.
    pub fn worst_case_latency(&self) -> Duration {
        self.delays().sum()
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let overlay = &self.overlay;
        check_num(overlay.zoom_width, 0.1..=20.0).context("invalid zoom line width")?;
        check_num(overlay.baseline_width, 0.1..=20.0).context("invalid baseline line width")?;
        check_num(overlay.label_font_size, 1..=72).context("invalid label font size")?;
        check_num(overlay.label_precision, 0..=12).context("invalid label precision")?;
        check_str(&overlay.zoom_color).context("invalid zoom line color")?;
        check_str(&overlay.baseline_color).context("invalid baseline line color")?;
        check_str(&overlay.baseline_dash).context("invalid baseline dash style")?;
        check_str(&overlay.control_label).context("invalid control label")?;

        check_num(self.report.precision, 0..=12).context("invalid report precision")?;

        let readiness = &self.readiness;
        check_num(readiness.max_attempts, 1..=64).context("invalid number of poll attempts")?;
        check_num(readiness.backoff_factor, 1.0..=10.0).context("invalid backoff factor")?;
        check_num(readiness.max_delay_ms, 1..=60_000).context("invalid maximum poll delay")?;
        check_num(readiness.initial_delay_ms, 1..=readiness.max_delay_ms)
            .context("invalid initial poll delay")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_str(s: &str) -> Result<()> {
    if s.trim().is_empty() {
        bail!("string must not be empty");
    }
    Ok(())
}
