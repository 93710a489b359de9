//! Trigger handling for window averages.
//!
//! The [`Controller`] owns the lifecycle of the single trigger control on a
//! chart and runs one recomputation per trigger: read the view range, decode
//! every series, average the window, then swap the overlay pair in one call.
//! Taking the host by `&mut` keeps a trigger from starting while another one
//! is still running.

use crate::config::{Config, ReadinessConfig};
use crate::decode::{self, DecodeError};
use crate::overlay::{self, OverlaySet};
use crate::stats::{self, SeriesWindow, WindowBounds, WindowStats};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Identifier of the trigger control.
pub const TRIGGER_CONTROL_ID: &str = "zoomAvgBtn";

pub struct TriggerControl {
    pub id: String,
    pub label: String,
}

/// A plotted series as exposed by the host, still encoded.
#[derive(Debug, Clone, Copy)]
pub struct SeriesRef<'a> {
    pub index: usize,
    pub name: Option<&'a str>,
    pub x: &'a Value,
    pub y: &'a Value,
}

impl SeriesRef<'_> {
    pub fn display_name(&self) -> String {
        match self.name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!("Trace {}", self.index),
        }
    }
}

/// The rendering surface a chart lives on.
pub trait ChartHost {
    /// Whether the initial layout pass has finished.
    fn layout_ready(&self) -> bool;

    fn has_control(&self, id: &str) -> bool;

    fn insert_control(&mut self, control: TriggerControl);

    /// Current horizontal view range, if one is established.
    fn x_range(&self) -> Option<[f64; 2]>;

    fn series(&self) -> Vec<SeriesRef<'_>>;

    fn overlays(&self) -> OverlaySet;

    /// Replace shapes and annotations together.
    fn apply_overlays(&mut self, overlays: OverlaySet);

    /// Show a message to the user.
    fn notify(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    Computing,
    Updated,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("chart layout not ready after {attempts} polls ({waited:?})")]
    LayoutTimeout { attempts: u32, waited: Duration },
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Trigger control not set up")]
    NotReady,

    #[error("Recomputation already in progress")]
    Busy,

    #[error("No x-axis range")]
    RangeUnavailable,

    #[error("No data points in zoom window")]
    EmptySelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coord {
    X,
    Y,
}

/// Why a series was left out of a recomputation.
#[derive(Debug, Error)]
pub enum SeriesWarning {
    #[error("{name} (trace {index}): failed to decode {coord:?} data: {source}")]
    Decode {
        index: usize,
        name: String,
        coord: Coord,
        source: DecodeError,
    },

    #[error("{name} (trace {index}): data length mismatch, x has {x_len} and y has {y_len}")]
    LengthMismatch {
        index: usize,
        name: String,
        x_len: usize,
        y_len: usize,
    },
}

/// Outcome of a successful recomputation.
#[derive(Debug)]
pub struct ZoomReport {
    pub bounds: WindowBounds,
    pub windows: Vec<SeriesWindow>,
    pub warnings: Vec<SeriesWarning>,
}

impl ZoomReport {
    pub fn points(&self) -> impl Iterator<Item = (&SeriesWindow, &WindowStats)> {
        self.windows
            .iter()
            .filter_map(|window| window.average.stats().map(|stats| (window, stats)))
    }

    pub fn render(&self, precision: usize) -> String {
        let mut msg = format!(
            "Zoom Averages ({:.2} to {:.2})\n\n",
            self.bounds.x_min, self.bounds.x_max
        );
        for (window, stats) in self.points() {
            msg.push_str(&format!(
                "{}: {:.prec$} ({} pts)\n",
                window.name,
                stats.avg,
                stats.count,
                prec = precision
            ));
        }
        if !self.warnings.is_empty() {
            msg.push_str("\nSkipped:\n");
            for warning in &self.warnings {
                msg.push_str(&format!("{warning}\n"));
            }
        }
        msg
    }
}

/// Decode a series and average it over `bounds`.
pub fn series_window(
    series: &SeriesRef,
    bounds: WindowBounds,
) -> Result<SeriesWindow, SeriesWarning> {
    let name = series.display_name();
    let decode_coord = |value: &Value, coord| {
        decode::decode(value).map_err(|source| SeriesWarning::Decode {
            index: series.index,
            name: name.clone(),
            coord,
            source,
        })
    };
    let xs = decode_coord(series.x, Coord::X)?;
    let ys = decode_coord(series.y, Coord::Y)?;

    if xs.len() != ys.len() {
        return Err(SeriesWarning::LengthMismatch {
            index: series.index,
            name,
            x_len: xs.len(),
            y_len: ys.len(),
        });
    }

    Ok(SeriesWindow {
        index: series.index,
        name,
        average: stats::compute_window(&xs, &ys, bounds),
    })
}

/// Split every series into a window result or a warning, logging the warnings.
pub fn collect_windows(
    series: &[SeriesRef],
    bounds: WindowBounds,
) -> (Vec<SeriesWindow>, Vec<SeriesWarning>) {
    let mut windows = Vec::with_capacity(series.len());
    let mut warnings = Vec::new();
    for series in series {
        match series_window(series, bounds) {
            Ok(window) => windows.push(window),
            Err(warning) => {
                log::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }
    (windows, warnings)
}

/// Draw the full-range average of every series as `baseline` overlays.
///
/// Returns the warnings of series that could not be decoded.
pub fn apply_baselines<H: ChartHost>(host: &mut H, cfg: &Config) -> Vec<SeriesWarning> {
    let mut baselines = Vec::new();
    let mut warnings = Vec::new();
    for series in host.series() {
        let name = series.display_name();
        match decode::decode(series.y) {
            Ok(ys) => baselines.push(SeriesWindow {
                index: series.index,
                name,
                average: stats::full_range_mean(&ys),
            }),
            Err(source) => {
                let warning = SeriesWarning::Decode {
                    index: series.index,
                    name,
                    coord: Coord::Y,
                    source,
                };
                log::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }

    let overlays = overlay::replace_baseline_overlays(&host.overlays(), &baselines, &cfg.overlay);
    host.apply_overlays(overlays);
    warnings
}

/// Poll `host` until its layout is ready, sleeping between polls with backoff.
///
/// Returns the number of polls made.
pub fn wait_for_layout<H, S>(
    host: &H,
    readiness: &ReadinessConfig,
    mut sleep: S,
) -> Result<u32, SetupError>
where
    H: ChartHost + ?Sized,
    S: FnMut(Duration),
{
    let mut attempts = 1;
    let mut waited = Duration::ZERO;
    if host.layout_ready() {
        return Ok(attempts);
    }
    for delay in readiness.delays() {
        sleep(delay);
        waited += delay;
        attempts += 1;
        if host.layout_ready() {
            return Ok(attempts);
        }
    }
    Err(SetupError::LayoutTimeout { attempts, waited })
}

pub struct Controller {
    cfg: Config,
    phase: Phase,
}

impl Controller {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            phase: Phase::Uninitialized,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Wait for the first layout, then make sure the trigger control exists.
    ///
    /// Calling this again on a set-up controller only re-checks the control.
    pub fn setup<H, S>(&mut self, host: &mut H, sleep: S) -> Result<(), SetupError>
    where
        H: ChartHost,
        S: FnMut(Duration),
    {
        if self.phase == Phase::Uninitialized {
            let attempts = wait_for_layout(host, &self.cfg.readiness, sleep)?;
            log::debug!("layout ready after {attempts} polls");
        }
        self.ensure_control(host);
        if self.phase == Phase::Uninitialized {
            self.transition(Phase::Ready);
        }
        Ok(())
    }

    /// Insert the trigger control unless the host already has one.
    pub fn ensure_control<H: ChartHost>(&self, host: &mut H) -> bool {
        if host.has_control(TRIGGER_CONTROL_ID) {
            return false;
        }
        host.insert_control(TriggerControl {
            id: TRIGGER_CONTROL_ID.to_owned(),
            label: self.cfg.overlay.control_label.clone(),
        });
        log::debug!("inserted control {TRIGGER_CONTROL_ID}");
        true
    }

    /// Recompute the window averages and refresh the zoom overlays.
    ///
    /// Failures leave the overlays untouched and are reported through
    /// [`ChartHost::notify`] as well as returned.
    pub fn trigger<H: ChartHost>(&mut self, host: &mut H) -> Result<ZoomReport, TriggerError> {
        match self.phase {
            Phase::Uninitialized => return Err(TriggerError::NotReady),
            Phase::Computing => return Err(TriggerError::Busy),
            Phase::Updated => self.transition(Phase::Ready),
            Phase::Ready => {}
        }
        self.transition(Phase::Computing);

        match self.recompute(host) {
            Ok(report) => {
                self.transition(Phase::Updated);
                host.notify(&report.render(self.cfg.report.precision));
                Ok(report)
            }
            Err(error) => {
                self.transition(Phase::Ready);
                host.notify(&error.to_string());
                Err(error)
            }
        }
    }

    fn recompute<H: ChartHost>(&self, host: &mut H) -> Result<ZoomReport, TriggerError> {
        let bounds = host
            .x_range()
            .and_then(WindowBounds::from_range)
            .ok_or(TriggerError::RangeUnavailable)?;

        let (windows, warnings) = collect_windows(&host.series(), bounds);
        if windows.iter().all(|window| window.average.stats().is_none()) {
            return Err(TriggerError::EmptySelection);
        }

        let overlays =
            overlay::replace_zoom_overlays(&host.overlays(), &windows, bounds, &self.cfg.overlay);
        host.apply_overlays(overlays);

        Ok(ZoomReport {
            bounds,
            windows,
            warnings,
        })
    }

    fn transition(&mut self, next: Phase) {
        log::debug!("{:?} -> {next:?}", self.phase);
        self.phase = next;
    }
}
