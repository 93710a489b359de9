//! On-chart reference lines and labels.
//!
//! Every overlay we draw carries an identifier `<namespace>_<kind>_<series>`.
//! Replacing a namespace is a pure filter-then-append over the layout's
//! shapes and annotations; objects outside the namespace, including ones we
//! did not create, pass through unchanged and in order.

use crate::config::OverlayConfig;
use crate::stats::{SeriesWindow, WindowBounds};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// A layout shape or annotation, kept as its JSON attributes plus its name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl LayoutObject {
    pub fn new(name: impl Into<String>, attrs: Value) -> Self {
        let attrs = match attrs {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: Some(name.into()),
            attrs,
        }
    }

    pub fn overlay_id(&self) -> Option<OverlayId> {
        self.name.as_deref().and_then(OverlayId::parse)
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.overlay_id().map(|id| id.namespace)
    }
}

/// The (shapes, annotations) pair, always read and replaced together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlaySet {
    pub shapes: Vec<LayoutObject>,
    pub annotations: Vec<LayoutObject>,
}

impl OverlaySet {
    pub fn shapes_in(&self, namespace: Namespace) -> impl Iterator<Item = &LayoutObject> {
        self.shapes
            .iter()
            .filter(move |shape| shape.namespace() == Some(namespace))
    }

    pub fn annotations_in(&self, namespace: Namespace) -> impl Iterator<Item = &LayoutObject> {
        self.annotations
            .iter()
            .filter(move |ann| ann.namespace() == Some(namespace))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Full-range average, drawn once when the chart is rendered.
    Baseline,
    /// Window average, replaced on every recomputation.
    Zoom,
}

impl Namespace {
    fn prefix(self) -> &'static str {
        match self {
            Namespace::Baseline => "baseline",
            Namespace::Zoom => "zoom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Line,
    Label,
}

impl OverlayKind {
    fn tag(self) -> &'static str {
        match self {
            OverlayKind::Line => "avg",
            OverlayKind::Label => "ann",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId {
    pub namespace: Namespace,
    pub kind: OverlayKind,
    pub series: usize,
}

impl OverlayId {
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.splitn(3, '_');
        let namespace = match parts.next()? {
            "baseline" => Namespace::Baseline,
            "zoom" => Namespace::Zoom,
            _ => return None,
        };
        let kind = match parts.next()? {
            "avg" => OverlayKind::Line,
            "ann" => OverlayKind::Label,
            _ => return None,
        };
        let series = parts.next()?;
        if !series.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let series = series.parse().ok()?;
        Some(Self {
            namespace,
            kind,
            series,
        })
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.namespace.prefix(),
            self.kind.tag(),
            self.series
        )
    }
}

/// Horizontal extent of a reference line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XSpan {
    Window(WindowBounds),
    FullWidth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLine {
    pub span: XSpan,
    pub y_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelAnchor {
    /// Data coordinate on the x axis.
    At(f64),
    /// Left edge of the plot area, text above the line.
    TopLeft,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub anchor: LabelAnchor,
    pub y_value: f64,
    pub text: String,
}

/// A reference line and its label for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub namespace: Namespace,
    pub series: usize,
    pub line: ReferenceLine,
    pub label: Label,
}

impl Overlay {
    /// Window-average overlay; `None` when the series had no points in the window.
    pub fn zoom(
        window: &SeriesWindow,
        bounds: WindowBounds,
        style: &OverlayConfig,
    ) -> Option<Self> {
        let avg = window.average.stats()?.avg;
        Some(Self {
            namespace: Namespace::Zoom,
            series: window.index,
            line: ReferenceLine {
                span: XSpan::Window(bounds),
                y_value: avg,
            },
            label: Label {
                anchor: LabelAnchor::At(bounds.midpoint()),
                y_value: avg,
                text: format!(
                    "{} Zoom Avg: {avg:.prec$}",
                    window.name,
                    prec = style.label_precision
                ),
            },
        })
    }

    /// Full-range overlay; `None` when the series has no finite values.
    pub fn baseline(window: &SeriesWindow, style: &OverlayConfig) -> Option<Self> {
        let avg = window.average.stats()?.avg;
        Some(Self {
            namespace: Namespace::Baseline,
            series: window.index,
            line: ReferenceLine {
                span: XSpan::FullWidth,
                y_value: avg,
            },
            label: Label {
                anchor: LabelAnchor::TopLeft,
                y_value: avg,
                text: format!(
                    "{} Avg: {avg:.prec$}",
                    window.name,
                    prec = style.label_precision
                ),
            },
        })
    }

    pub fn id(&self, kind: OverlayKind) -> OverlayId {
        OverlayId {
            namespace: self.namespace,
            kind,
            series: self.series,
        }
    }

    fn shape(&self, style: &OverlayConfig) -> LayoutObject {
        let (color, width, dash) = match self.namespace {
            Namespace::Zoom => (&style.zoom_color, style.zoom_width, "solid"),
            Namespace::Baseline => (
                &style.baseline_color,
                style.baseline_width,
                style.baseline_dash.as_str(),
            ),
        };
        let (xref, x0, x1) = match self.line.span {
            XSpan::Window(bounds) => ("x", bounds.x_min, bounds.x_max),
            XSpan::FullWidth => ("paper", 0.0, 1.0),
        };
        let y = self.line.y_value;
        LayoutObject::new(
            self.id(OverlayKind::Line).to_string(),
            json!({
                "type": "line",
                "xref": xref,
                "yref": "y",
                "x0": x0,
                "x1": x1,
                "y0": y,
                "y1": y,
                "line": { "color": color, "width": width, "dash": dash },
            }),
        )
    }

    fn annotation(&self, style: &OverlayConfig) -> LayoutObject {
        let color = match self.namespace {
            Namespace::Zoom => &style.zoom_color,
            Namespace::Baseline => &style.baseline_color,
        };
        let mut attrs = json!({
            "yref": "y",
            "y": self.label.y_value,
            "text": self.label.text,
            "showarrow": false,
            "font": { "color": color, "size": style.label_font_size },
        });
        let extra = match self.label.anchor {
            LabelAnchor::At(x) => json!({
                "xref": "x",
                "x": x,
                "bgcolor": "white",
                "bordercolor": color,
                "borderwidth": 1,
                "opacity": 0.9,
            }),
            LabelAnchor::TopLeft => json!({
                "xref": "paper",
                "x": 0.0,
                "xanchor": "left",
                "yanchor": "bottom",
            }),
        };
        if let (Value::Object(attrs), Value::Object(extra)) = (&mut attrs, extra) {
            attrs.extend(extra);
        }
        LayoutObject::new(self.id(OverlayKind::Label).to_string(), attrs)
    }
}

/// Drop every object of `namespace` and append `overlays` in its place.
pub fn replace_namespace(
    existing: &OverlaySet,
    namespace: Namespace,
    overlays: &[Overlay],
    style: &OverlayConfig,
) -> OverlaySet {
    let keep = |obj: &&LayoutObject| obj.namespace() != Some(namespace);

    let mut shapes: Vec<_> = existing.shapes.iter().filter(keep).cloned().collect();
    let mut annotations: Vec<_> = existing.annotations.iter().filter(keep).cloned().collect();

    for overlay in overlays {
        debug_assert_eq!(overlay.namespace, namespace);
        shapes.push(overlay.shape(style));
        annotations.push(overlay.annotation(style));
    }

    OverlaySet {
        shapes,
        annotations,
    }
}

/// Replace the zoom overlays with one line and label per point-bearing window.
pub fn replace_zoom_overlays(
    existing: &OverlaySet,
    windows: &[SeriesWindow],
    bounds: WindowBounds,
    style: &OverlayConfig,
) -> OverlaySet {
    let overlays: Vec<_> = windows
        .iter()
        .filter_map(|window| Overlay::zoom(window, bounds, style))
        .collect();
    replace_namespace(existing, Namespace::Zoom, &overlays, style)
}

/// Replace the baseline overlays with one line and label per series with data.
pub fn replace_baseline_overlays(
    existing: &OverlaySet,
    baselines: &[SeriesWindow],
    style: &OverlayConfig,
) -> OverlaySet {
    let overlays: Vec<_> = baselines
        .iter()
        .filter_map(|window| Overlay::baseline(window, style))
        .collect();
    replace_namespace(existing, Namespace::Baseline, &overlays, style)
}
