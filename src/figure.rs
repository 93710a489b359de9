//! Chart documents.
//!
//! A chart document is a Plotly-style figure: a list of traces and a layout
//! holding the x-axis view range, shapes, annotations and controls
//! (`updatemenus`). Fields we do not interpret are kept verbatim.

use crate::controller::{ChartHost, SeriesRef, TriggerControl};
use crate::overlay::{LayoutObject, OverlaySet};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Figure {
    #[serde(default)]
    pub data: Vec<Trace>,

    #[serde(default)]
    pub layout: Layout,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Messages shown to the user since the document was loaded.
    #[serde(skip)]
    notices: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub x: Value,

    #[serde(default)]
    pub y: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default, skip_serializing_if = "Axis::is_empty")]
    pub xaxis: Axis,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shapes: Vec<LayoutObject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<LayoutObject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updatemenus: Vec<LayoutObject>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Axis {
    pub fn is_empty(&self) -> bool {
        self.range.is_none() && self.extra.is_empty()
    }
}

impl Figure {
    /// Load a figure from a JSON file.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);
        let figure = serde_json::from_reader(reader).context("failed to deserialize figure")?;
        Ok(figure)
    }

    /// Save the figure as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("failed to serialize figure")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn set_x_range(&mut self, x_min: f64, x_max: f64) {
        self.layout.xaxis.range = Some(json!([x_min, x_max]));
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

impl ChartHost for Figure {
    /// A stored document has no pending layout pass.
    fn layout_ready(&self) -> bool {
        true
    }

    fn has_control(&self, id: &str) -> bool {
        self.layout
            .updatemenus
            .iter()
            .any(|menu| menu.name.as_deref() == Some(id))
    }

    fn insert_control(&mut self, control: TriggerControl) {
        self.layout.updatemenus.push(LayoutObject::new(
            control.id,
            json!({
                "type": "buttons",
                "showactive": false,
                "x": 1.0,
                "y": 0.0,
                "xanchor": "right",
                "yanchor": "bottom",
                "buttons": [{ "label": control.label, "method": "skip", "args": [] }],
            }),
        ));
    }

    fn x_range(&self) -> Option<[f64; 2]> {
        match self.layout.xaxis.range.as_ref()?.as_array()?.as_slice() {
            [a, b] => Some([a.as_f64()?, b.as_f64()?]),
            _ => None,
        }
    }

    fn series(&self) -> Vec<SeriesRef<'_>> {
        self.data
            .iter()
            .enumerate()
            .map(|(index, trace)| SeriesRef {
                index,
                name: trace.name.as_deref(),
                x: &trace.x,
                y: &trace.y,
            })
            .collect()
    }

    fn overlays(&self) -> OverlaySet {
        OverlaySet {
            shapes: self.layout.shapes.clone(),
            annotations: self.layout.annotations.clone(),
        }
    }

    fn apply_overlays(&mut self, overlays: OverlaySet) {
        self.layout.shapes = overlays.shapes;
        self.layout.annotations = overlays.annotations;
    }

    fn notify(&mut self, message: &str) {
        log::info!("{message}");
        self.notices.push(message.to_owned());
    }
}
