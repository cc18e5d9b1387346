pub mod bundle;
pub mod legacy;
pub mod smooth;

use crate::layout::Point3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document content: {0}")]
    InvalidContent(String),
    #[error("document ended inside {0}")]
    UnexpectedEof(&'static str),
    #[error("unsupported document feature: {0}")]
    Unsupported(String),
    #[error("cell references point {index} but only {points} points exist")]
    IndexOutOfRange { index: usize, points: usize },
    #[error("point array `{name}` has {got} values, expected {expected}")]
    ArrayLength {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("archive error: {0}")]
    Archive(String),
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DocumentError::InvalidContent(message.into())
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    LegacyPolyData,
    SceneBundle,
}

impl DocumentFormat {
    const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

    pub fn detect(bytes: &[u8]) -> DocumentResult<Self> {
        if bytes.starts_with(&Self::ZIP_MAGIC) {
            return Ok(DocumentFormat::SceneBundle);
        }
        if legacy::looks_like_legacy(bytes) {
            return Ok(DocumentFormat::LegacyPolyData);
        }
        Err(DocumentError::invalid(
            "neither a legacy polydata file nor a zip bundle",
        ))
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::LegacyPolyData => "vtk",
            DocumentFormat::SceneBundle => "zip",
        }
    }
}

pub fn decode_document(bytes: &[u8]) -> DocumentResult<(DocumentFormat, MeshDocument)> {
    let format = DocumentFormat::detect(bytes)?;
    let mesh = match format {
        DocumentFormat::LegacyPolyData => legacy::parse_legacy(bytes)?,
        DocumentFormat::SceneBundle => bundle::parse_bundle(bytes)?,
    };
    Ok((format, mesh))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    name: String,
    components: usize,
    kind: ScalarKind,
    values: Vec<f64>,
}

impl DataArray {
    pub fn new(name: impl Into<String>, components: usize, kind: ScalarKind, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            components: components.max(1),
            kind,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn tuples(&self) -> usize {
        self.values.len() / self.components
    }

    /// Min and max over every value; `None` for an empty array.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &value| match acc {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
    }
}

/// Named per-point arrays plus the one currently used for scalar coloring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointData {
    arrays: Vec<DataArray>,
    active_scalars: Option<String>,
}

impl PointData {
    pub fn arrays(&self) -> &[DataArray] {
        &self.arrays
    }

    pub fn array(&self, name: &str) -> Option<&DataArray> {
        self.arrays.iter().find(|array| array.name == name)
    }

    /// Inserts `array`, replacing any array with the same name.
    pub fn insert(&mut self, array: DataArray) {
        match self.arrays.iter_mut().find(|existing| existing.name == array.name) {
            Some(existing) => *existing = array,
            None => self.arrays.push(array),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<DataArray> {
        let index = self.arrays.iter().position(|array| array.name == name)?;
        if self.active_scalars.as_deref() == Some(name) {
            self.active_scalars = None;
        }
        Some(self.arrays.remove(index))
    }

    pub fn set_active_scalars(&mut self, name: &str) -> bool {
        if self.array(name).is_none() {
            return false;
        }
        self.active_scalars = Some(name.to_string());
        true
    }

    pub fn active_scalars(&self) -> Option<&DataArray> {
        self.active_scalars
            .as_deref()
            .and_then(|name| self.array(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3,
    pub max: Point3,
}

impl Bounds {
    pub fn center(&self) -> Point3 {
        [0, 1, 2].map(|i| (self.min[i] + self.max[i]) / 2.0)
    }

    pub fn diagonal(&self) -> f64 {
        (0..3)
            .map(|i| (self.max[i] - self.min[i]).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Surface geometry as delivered by the mesh service: points, polygon
/// connectivity and named per-point arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshDocument {
    points: Vec<Point3>,
    polygons: Vec<Vec<u32>>,
    point_data: PointData,
}

impl MeshDocument {
    pub fn new(points: Vec<Point3>, polygons: Vec<Vec<u32>>) -> DocumentResult<Self> {
        let point_count = points.len();
        for polygon in &polygons {
            if let Some(&index) = polygon.iter().find(|&&index| index as usize >= point_count) {
                return Err(DocumentError::IndexOutOfRange {
                    index: index as usize,
                    points: point_count,
                });
            }
        }
        Ok(Self {
            points,
            polygons,
            point_data: PointData::default(),
        })
    }

    pub fn with_point_array(mut self, array: DataArray) -> DocumentResult<Self> {
        self.add_point_array(array)?;
        Ok(self)
    }

    pub fn add_point_array(&mut self, array: DataArray) -> DocumentResult<()> {
        let expected = self.points.len().checked_mul(array.components);
        if expected != Some(array.values.len()) {
            return Err(DocumentError::ArrayLength {
                name: array.name,
                expected: expected.unwrap_or(usize::MAX),
                got: array.values.len(),
            });
        }
        self.point_data.insert(array);
        Ok(())
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [Point3] {
        &mut self.points
    }

    pub fn polygons(&self) -> &[Vec<u32>] {
        &self.polygons
    }

    pub fn point_data(&self) -> &PointData {
        &self.point_data
    }

    pub fn point_data_mut(&mut self) -> &mut PointData {
        &mut self.point_data
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    /// Fan triangulation of every polygon; degenerate cells yield nothing.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.polygons.iter().flat_map(|polygon| {
            let anchor = polygon.first().copied();
            polygon
                .windows(2)
                .skip(1)
                .filter_map(move |pair| anchor.map(|a| [a, pair[0], pair[1]]))
        })
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let first = *self.points.first()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for point in &self.points[1..] {
            for i in 0..3 {
                bounds.min[i] = bounds.min[i].min(point[i]);
                bounds.max[i] = bounds.max[i].max(point[i]);
            }
        }
        Some(bounds)
    }

    /// Concatenates parts into one document. A named point array survives
    /// only when every part carries it with the same component count.
    pub fn merge(parts: Vec<MeshDocument>) -> DocumentResult<Self> {
        let mut shared: Vec<DataArray> = match parts.first() {
            Some(first) => first
                .point_data
                .arrays
                .iter()
                .filter(|array| {
                    parts.iter().all(|part| {
                        part.point_data
                            .array(&array.name)
                            .is_some_and(|other| other.components == array.components)
                    })
                })
                .map(|array| DataArray::new(array.name.clone(), array.components, array.kind, Vec::new()))
                .collect(),
            None => return Err(DocumentError::invalid("bundle contains no mesh parts")),
        };

        let mut points = Vec::new();
        let mut polygons = Vec::new();
        for part in parts {
            let offset = u32::try_from(points.len())
                .map_err(|_| DocumentError::invalid("merged mesh exceeds u32 point indices"))?;
            polygons.extend(
                part.polygons
                    .into_iter()
                    .map(|polygon| polygon.into_iter().map(|index| index + offset).collect()),
            );
            points.extend(part.points);
            for array in &mut shared {
                if let Some(source) = part.point_data.array(&array.name) {
                    array.values.extend_from_slice(&source.values);
                    if source.kind == ScalarKind::Float {
                        array.kind = ScalarKind::Float;
                    }
                }
            }
        }

        let mut merged = MeshDocument::new(points, polygons)?;
        for array in shared {
            merged.add_point_array(array)?;
        }
        Ok(merged)
    }
}
