//! Reader for legacy ASCII polydata documents.
//!
//! ```text
//! # vtk DataFile Version 3.0
//! title
//! ASCII
//! DATASET POLYDATA
//! POINTS n float
//! x y z ...
//! POLYGONS cells size
//! k i0 i1 ... i(k-1)
//! POINT_DATA n
//! SCALARS Label int 1
//! LOOKUP_TABLE default
//! ...
//! ```
//!
//! Cell sections are accepted both in the classic `k i0 ..` layout and the
//! `OFFSETS`/`CONNECTIVITY` layout written by version 5 files. Only point
//! data is kept; vertex, line and cell-data sections are read and dropped.

use super::{DataArray, DocumentError, DocumentResult, MeshDocument, ScalarKind};
use crate::layout::Point3;
use std::iter::Peekable;
use std::str::SplitAsciiWhitespace;

const SIGNATURE: &str = "# vtk DataFile";

pub fn looks_like_legacy(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(64)];
    String::from_utf8_lossy(head)
        .trim_start()
        .to_ascii_lowercase()
        .starts_with(&SIGNATURE.to_ascii_lowercase())
}

pub fn parse_legacy(bytes: &[u8]) -> DocumentResult<MeshDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| DocumentError::Unsupported("binary legacy documents".into()))?;
    let mut lines = text.trim_start().splitn(4, '\n');

    let signature = lines.next().ok_or(DocumentError::UnexpectedEof("header"))?;
    if !signature.trim().to_ascii_lowercase().starts_with(&SIGNATURE.to_ascii_lowercase()) {
        return Err(DocumentError::invalid("missing legacy file signature"));
    }
    let _title = lines.next().ok_or(DocumentError::UnexpectedEof("header"))?;
    let encoding = lines.next().ok_or(DocumentError::UnexpectedEof("header"))?;
    match encoding.trim().to_ascii_uppercase().as_str() {
        "ASCII" => {}
        "BINARY" => return Err(DocumentError::Unsupported("binary legacy documents".into())),
        other => return Err(DocumentError::invalid(format!("unknown encoding {other:?}"))),
    }

    let body = lines.next().unwrap_or_default();
    LegacyParser::new(body).parse()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Point,
    Cell,
}

struct LegacyParser<'a> {
    tokens: Peekable<SplitAsciiWhitespace<'a>>,
    points: Vec<Point3>,
    polygons: Vec<Vec<u32>>,
    arrays: Vec<DataArray>,
    attribute: Option<(Attribute, usize)>,
}

impl<'a> LegacyParser<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            tokens: body.split_ascii_whitespace().peekable(),
            points: Vec::new(),
            polygons: Vec::new(),
            arrays: Vec::new(),
            attribute: None,
        }
    }

    fn parse(mut self) -> DocumentResult<MeshDocument> {
        let mut saw_dataset = false;
        while let Some(keyword) = self.tokens.next() {
            match keyword.to_ascii_uppercase().as_str() {
                "DATASET" => {
                    let kind = self.word("DATASET")?;
                    if !kind.eq_ignore_ascii_case("POLYDATA") {
                        return Err(DocumentError::Unsupported(format!("dataset {kind}")));
                    }
                    saw_dataset = true;
                }
                "POINTS" => self.read_points()?,
                "POLYGONS" => {
                    let cells = self.read_cells("POLYGONS")?;
                    self.polygons.extend(cells);
                }
                "TRIANGLE_STRIPS" => {
                    let strips = self.read_cells("TRIANGLE_STRIPS")?;
                    self.polygons.extend(strips.iter().flat_map(|strip| strip_triangles(strip)));
                }
                "VERTICES" | "LINES" => {
                    self.read_cells("VERTICES/LINES")?;
                }
                "POINT_DATA" => {
                    let count = self.count("POINT_DATA")?;
                    self.attribute = Some((Attribute::Point, count));
                }
                "CELL_DATA" => {
                    let count = self.count("CELL_DATA")?;
                    self.attribute = Some((Attribute::Cell, count));
                }
                "SCALARS" => self.read_scalars()?,
                "LOOKUP_TABLE" => {
                    self.word("LOOKUP_TABLE")?;
                    let size = self.count("LOOKUP_TABLE")?;
                    self.skip_values(product(size, 4, "LOOKUP_TABLE")?, "LOOKUP_TABLE")?;
                }
                "COLOR_SCALARS" => {
                    self.word("COLOR_SCALARS")?;
                    let components = self.count("COLOR_SCALARS")?;
                    let tuples = self.attribute_tuples("COLOR_SCALARS")?;
                    let values = product(tuples, components, "COLOR_SCALARS")?;
                    self.skip_values(values, "COLOR_SCALARS")?;
                }
                "VECTORS" | "NORMALS" => {
                    self.word("VECTORS/NORMALS")?;
                    self.word("VECTORS/NORMALS")?;
                    let tuples = self.attribute_tuples("VECTORS/NORMALS")?;
                    let values = product(tuples, 3, "VECTORS/NORMALS")?;
                    self.skip_values(values, "VECTORS/NORMALS")?;
                }
                "TEXTURE_COORDINATES" => {
                    self.word("TEXTURE_COORDINATES")?;
                    let dimension = self.count("TEXTURE_COORDINATES")?;
                    self.word("TEXTURE_COORDINATES")?;
                    let tuples = self.attribute_tuples("TEXTURE_COORDINATES")?;
                    self.skip_values(
                        product(tuples, dimension, "TEXTURE_COORDINATES")?,
                        "TEXTURE_COORDINATES",
                    )?;
                }
                "FIELD" => self.read_field()?,
                "METADATA" => self.skip_metadata(),
                other => {
                    return Err(DocumentError::invalid(format!("unexpected token {other:?}")));
                }
            }
        }

        if !saw_dataset {
            return Err(DocumentError::invalid("missing DATASET POLYDATA"));
        }

        let mut mesh = MeshDocument::new(self.points, self.polygons)?;
        for array in self.arrays {
            mesh.add_point_array(array)?;
        }
        Ok(mesh)
    }

    fn word(&mut self, section: &'static str) -> DocumentResult<&'a str> {
        self.tokens.next().ok_or(DocumentError::UnexpectedEof(section))
    }

    fn count(&mut self, section: &'static str) -> DocumentResult<usize> {
        let token = self.word(section)?;
        token
            .parse::<usize>()
            .map_err(|_| DocumentError::invalid(format!("{section}: expected a count, got {token:?}")))
    }

    fn number(&mut self, section: &'static str) -> DocumentResult<f64> {
        let token = self.word(section)?;
        token
            .parse::<f64>()
            .map_err(|_| DocumentError::invalid(format!("{section}: expected a number, got {token:?}")))
    }

    fn index(&mut self, section: &'static str) -> DocumentResult<u32> {
        let token = self.word(section)?;
        token
            .parse::<u32>()
            .map_err(|_| DocumentError::invalid(format!("{section}: expected an index, got {token:?}")))
    }

    fn skip_values(&mut self, count: usize, section: &'static str) -> DocumentResult<()> {
        for _ in 0..count {
            self.number(section)?;
        }
        Ok(())
    }

    fn attribute_tuples(&self, section: &'static str) -> DocumentResult<usize> {
        self.attribute
            .map(|(_, count)| count)
            .ok_or_else(|| DocumentError::invalid(format!("{section} outside POINT_DATA/CELL_DATA")))
    }

    fn read_points(&mut self) -> DocumentResult<()> {
        let count = self.count("POINTS")?;
        self.word("POINTS")?;
        let mut points = Vec::new();
        for _ in 0..count {
            points.push([
                self.number("POINTS")?,
                self.number("POINTS")?,
                self.number("POINTS")?,
            ]);
        }
        self.points = points;
        Ok(())
    }

    fn read_cells(&mut self, section: &'static str) -> DocumentResult<Vec<Vec<u32>>> {
        let first = self.count(section)?;
        let size = self.count(section)?;

        if self
            .tokens
            .peek()
            .is_some_and(|token| token.eq_ignore_ascii_case("OFFSETS"))
        {
            return self.read_offset_cells(first, size, section);
        }

        let mut cells = Vec::new();
        let mut consumed = 0usize;
        for _ in 0..first {
            let len = self.count(section)?;
            let mut cell = Vec::new();
            for _ in 0..len {
                cell.push(self.index(section)?);
            }
            consumed = consumed.saturating_add(len).saturating_add(1);
            cells.push(cell);
        }
        if consumed != size {
            return Err(DocumentError::invalid(format!(
                "{section}: declared size {size} but read {consumed} values"
            )));
        }
        Ok(cells)
    }

    fn read_offset_cells(
        &mut self,
        offset_count: usize,
        connectivity_len: usize,
        section: &'static str,
    ) -> DocumentResult<Vec<Vec<u32>>> {
        self.word(section)?;
        self.word(section)?;
        let mut offsets = Vec::new();
        for _ in 0..offset_count {
            offsets.push(self.count(section)?);
        }

        let keyword = self.word(section)?;
        if !keyword.eq_ignore_ascii_case("CONNECTIVITY") {
            return Err(DocumentError::invalid(format!(
                "{section}: expected CONNECTIVITY, got {keyword:?}"
            )));
        }
        self.word(section)?;
        let mut connectivity = Vec::new();
        for _ in 0..connectivity_len {
            connectivity.push(self.index(section)?);
        }

        offsets
            .windows(2)
            .map(|pair| {
                connectivity
                    .get(pair[0]..pair[1])
                    .map(<[u32]>::to_vec)
                    .ok_or_else(|| DocumentError::invalid(format!("{section}: offsets out of range")))
            })
            .collect()
    }

    fn read_scalars(&mut self) -> DocumentResult<()> {
        let name = self.word("SCALARS")?;
        let data_type = self.word("SCALARS")?;
        let has_components = self
            .tokens
            .peek()
            .is_some_and(|token| token.parse::<usize>().is_ok());
        let components = if has_components {
            self.count("SCALARS")?
        } else {
            1
        };
        if self
            .tokens
            .peek()
            .is_some_and(|token| token.eq_ignore_ascii_case("LOOKUP_TABLE"))
        {
            self.tokens.next();
            self.word("SCALARS")?;
        }

        let tuples = self.attribute_tuples("SCALARS")?;
        let mut values = Vec::new();
        for _ in 0..product(tuples, components, "SCALARS")? {
            values.push(self.number("SCALARS")?);
        }
        self.keep_array(DataArray::new(name, components, scalar_kind(data_type), values));
        Ok(())
    }

    fn read_field(&mut self) -> DocumentResult<()> {
        self.word("FIELD")?;
        let array_count = self.count("FIELD")?;
        for _ in 0..array_count {
            let name = self.word("FIELD")?;
            let components = self.count("FIELD")?;
            let tuples = self.count("FIELD")?;
            let data_type = self.word("FIELD")?;
            let mut values = Vec::new();
            for _ in 0..product(components, tuples, "FIELD")? {
                values.push(self.number("FIELD")?);
            }
            self.keep_array(DataArray::new(name, components, scalar_kind(data_type), values));
        }
        Ok(())
    }

    fn keep_array(&mut self, array: DataArray) {
        if matches!(self.attribute, Some((Attribute::Point, _))) {
            self.arrays.push(array);
        }
    }

    fn skip_metadata(&mut self) {
        while let Some(token) = self.tokens.peek() {
            if is_section_keyword(token) {
                break;
            }
            self.tokens.next();
        }
    }
}

fn is_section_keyword(token: &str) -> bool {
    const KEYWORDS: [&str; 16] = [
        "DATASET",
        "POINTS",
        "POLYGONS",
        "TRIANGLE_STRIPS",
        "VERTICES",
        "LINES",
        "POINT_DATA",
        "CELL_DATA",
        "SCALARS",
        "LOOKUP_TABLE",
        "COLOR_SCALARS",
        "VECTORS",
        "NORMALS",
        "TEXTURE_COORDINATES",
        "FIELD",
        "METADATA",
    ];
    KEYWORDS.iter().any(|keyword| token.eq_ignore_ascii_case(keyword))
}

/// Value counts come from the document header, so they are multiplied
/// without trusting them to fit.
fn product(a: usize, b: usize, section: &'static str) -> DocumentResult<usize> {
    a.checked_mul(b)
        .ok_or_else(|| DocumentError::invalid(format!("{section}: value count overflows")))
}

fn scalar_kind(data_type: &str) -> ScalarKind {
    match data_type.to_ascii_lowercase().as_str() {
        "float" | "double" => ScalarKind::Float,
        _ => ScalarKind::Integer,
    }
}

/// Splits a strip into triangles, flipping every other one to keep winding.
fn strip_triangles(strip: &[u32]) -> Vec<Vec<u32>> {
    strip
        .windows(3)
        .enumerate()
        .map(|(i, w)| {
            if i % 2 == 0 {
                vec![w[0], w[1], w[2]]
            } else {
                vec![w[1], w[0], w[2]]
            }
        })
        .collect()
}
