use crate::error::{ViewerError, ViewerResult};
use crate::mesh::{DataArray, MeshDocument, ScalarKind};
use serde::{Deserialize, Serialize};

pub const LABEL_ARRAY: &str = "Label";

/// Scalar range handed to the renderer's color-mapping stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub min: f64,
    pub max: f64,
}

impl ColorRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Position of `value` within the range, clamped to `[0, 1]`. A
    /// single-valued range maps everything to `0`.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

pub fn derive_color_range(mesh: &MeshDocument) -> ViewerResult<ColorRange> {
    let labels = label_array(mesh)?;
    let (min, max) = labels.range().unwrap_or((0.0, 0.0));
    Ok(ColorRange::new(min, max))
}

fn label_array(mesh: &MeshDocument) -> ViewerResult<&DataArray> {
    mesh.point_data()
        .array(LABEL_ARRAY)
        .ok_or_else(|| ViewerError::MissingScalarData {
            array: LABEL_ARRAY.to_string(),
        })
}

/// Re-encodes the label array as whole-number integers and makes it the
/// active point scalars, then derives its range.
pub fn prepare_label_scalars(mesh: &mut MeshDocument) -> ViewerResult<ColorRange> {
    let labels = label_array(mesh)?;
    let values = labels.values().iter().map(|value| value.round()).collect();
    let encoded = DataArray::new(LABEL_ARRAY, labels.components(), ScalarKind::Integer, values);

    let point_data = mesh.point_data_mut();
    point_data.insert(encoded);
    point_data.set_active_scalars(LABEL_ARRAY);
    derive_color_range(mesh)
}

/// Hue ramp from red (range minimum) to blue (range maximum), so every
/// integer region id inside the range gets its own stable color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupTable {
    range: ColorRange,
    hue_range: (f64, f64),
}

impl LookupTable {
    pub fn new(range: ColorRange) -> Self {
        Self {
            range,
            hue_range: (0.0, 2.0 / 3.0),
        }
    }

    pub fn range(&self) -> ColorRange {
        self.range
    }

    pub fn color(&self, value: f64) -> [f64; 3] {
        let t = self.range.normalize(value);
        let hue = self.hue_range.0 + t * (self.hue_range.1 - self.hue_range.0);
        hsv_to_rgb(hue, 1.0, 1.0)
    }
}

fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> [f64; 3] {
    let h = (hue.rem_euclid(1.0)) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));
    match sector as u8 {
        0 => [value, t, p],
        1 => [q, value, p],
        2 => [p, value, t],
        3 => [p, q, value],
        4 => [t, p, value],
        _ => [value, p, q],
    }
}
