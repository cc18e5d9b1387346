//! Download artifacts for the currently displayed mesh: a static-mesh
//! encoding of the surface plus the raw document the service returned.

use crate::fetch::{FetchedDocument, RequestTag};
use crate::layout::Point3;
use crate::mesh::MeshDocument;
use bytes::{BufMut, Bytes, BytesMut};
use log::info;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher24;
use std::fmt::Write as _;
use std::hash::Hasher;
use url::Url;

const DIGEST_KEY_0: u64 = 0x0ddc_c001_feed_face;
const DIGEST_KEY_1: u64 = 0xabcd_ef01_2345_6789;
const STL_HEADER_LEN: usize = 80;
const STL_TRIANGLE_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StlFormat {
    #[default]
    Binary,
    Ascii,
}

impl StlFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            StlFormat::Binary => "model/stl",
            StlFormat::Ascii => "model/stl; charset=us-ascii",
        }
    }
}

/// Encodes the polygonal surface of `mesh` as STL. Polygons are fan
/// triangulated; the output depends only on the mesh and `name`.
pub fn to_static_mesh_bytes(mesh: &MeshDocument, format: StlFormat, name: &str) -> Bytes {
    match format {
        StlFormat::Binary => binary_stl(mesh, name),
        StlFormat::Ascii => ascii_stl(mesh, name),
    }
}

fn facets(mesh: &MeshDocument) -> impl Iterator<Item = ([f32; 3], [[f32; 3]; 3])> + '_ {
    let points = mesh.points();
    mesh.triangles().map(move |triangle| {
        let corners = triangle.map(|index| to_f32(points[index as usize]));
        (face_normal(&corners), corners)
    })
}

fn to_f32(point: Point3) -> [f32; 3] {
    point.map(|value| value as f32)
}

fn face_normal(corners: &[[f32; 3]; 3]) -> [f32; 3] {
    let [a, b, c] = corners;
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let length = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if length > f32::EPSILON {
        n.map(|value| value / length)
    } else {
        [0.0; 3]
    }
}

fn binary_stl(mesh: &MeshDocument, name: &str) -> Bytes {
    let count = mesh.triangles().count();
    let mut buffer = BytesMut::with_capacity(STL_HEADER_LEN + 4 + count * STL_TRIANGLE_LEN);

    let mut header = [0u8; STL_HEADER_LEN];
    let label = name.as_bytes();
    let used = label.len().min(STL_HEADER_LEN);
    header[..used].copy_from_slice(&label[..used]);
    buffer.put_slice(&header);
    buffer.put_u32_le(u32::try_from(count).unwrap_or(u32::MAX));

    for (normal, corners) in facets(mesh) {
        for value in normal {
            buffer.put_f32_le(value);
        }
        for corner in corners {
            for value in corner {
                buffer.put_f32_le(value);
            }
        }
        buffer.put_u16_le(0);
    }
    buffer.freeze()
}

fn ascii_stl(mesh: &MeshDocument, name: &str) -> Bytes {
    let mut text = String::new();
    let _ = writeln!(text, "solid {name}");
    for (normal, corners) in facets(mesh) {
        let _ = writeln!(text, "  facet normal {} {} {}", normal[0], normal[1], normal[2]);
        text.push_str("    outer loop\n");
        for corner in corners {
            let _ = writeln!(text, "      vertex {} {} {}", corner[0], corner[1], corner[2]);
        }
        text.push_str("    endloop\n  endfacet\n");
    }
    let _ = writeln!(text, "endsolid {name}");
    Bytes::from(text)
}

/// Keyed SipHash of a byte payload; stable across runs and platforms.
pub fn payload_digest(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_keys(DIGEST_KEY_0, DIGEST_KEY_1);
    hasher.write(bytes);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Bytes,
}

/// The document exactly as received, with the URL it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArtifact {
    pub url: Url,
    pub file_name: String,
    pub bytes: Bytes,
    pub digest: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifacts {
    pub tag: RequestTag,
    pub static_mesh: DownloadArtifact,
    pub source: SourceArtifact,
}

#[derive(Debug, Clone)]
pub struct ExportEncoder {
    stem: String,
    format: StlFormat,
}

impl ExportEncoder {
    pub fn new(stem: impl Into<String>, format: StlFormat) -> Self {
        Self {
            stem: stem.into(),
            format,
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn format(&self) -> StlFormat {
        self.format
    }

    /// Builds both artifacts from the decoded response. Display-only
    /// processing such as smoothing never reaches the STL.
    pub fn encode(&self, tag: RequestTag, document: &FetchedDocument) -> ExportArtifacts {
        let static_mesh = DownloadArtifact {
            file_name: format!("{}.stl", self.stem),
            mime_type: self.format.mime_type(),
            bytes: to_static_mesh_bytes(&document.mesh, self.format, &self.stem),
        };
        let source = SourceArtifact {
            url: document.url.clone(),
            file_name: format!("{}.{}", self.stem, document.format.extension()),
            bytes: document.bytes.clone(),
            digest: payload_digest(&document.bytes),
        };
        info!(
            "[export] request {tag}: {} ({} bytes), {} ({} bytes)",
            static_mesh.file_name,
            static_mesh.bytes.len(),
            source.file_name,
            source.bytes.len()
        );
        ExportArtifacts {
            tag,
            static_mesh,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::decode_response;
    use crate::mesh::tests::labelled_square;

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn binary_stl_has_header_count_and_facets() {
        let square = labelled_square([0.0; 4]);
        let bytes = to_static_mesh_bytes(&square, StlFormat::Binary, "Ovary");

        assert_eq!(bytes.len(), 80 + 4 + 2 * 50);
        assert_eq!(&bytes[..5], b"Ovary");
        assert!(bytes[5..80].iter().all(|&b| b == 0));
        assert_eq!(u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]), 2);
        // first facet normal points along +z for the counter-clockwise square
        assert_eq!(read_f32(&bytes, 84 + 8), 1.0);
        // second vertex of the first facet is point 1
        assert_eq!(read_f32(&bytes, 84 + 24), 1.0);
    }

    #[test]
    fn ascii_stl_lists_every_facet() {
        let square = labelled_square([0.0; 4]);
        let bytes = to_static_mesh_bytes(&square, StlFormat::Ascii, "Ovary");
        let text = std::str::from_utf8(&bytes).expect("ascii output");
        assert!(text.starts_with("solid Ovary\n"));
        assert!(text.trim_end().ends_with("endsolid Ovary"));
        assert_eq!(text.matches("facet normal").count(), 2);
        assert_eq!(text.matches("vertex").count(), 6);
    }

    #[test]
    fn encoding_is_deterministic() {
        let square = labelled_square([0.0, 1.0, 2.0, 3.0]);
        assert_eq!(
            to_static_mesh_bytes(&square, StlFormat::Binary, "a"),
            to_static_mesh_bytes(&square.clone(), StlFormat::Binary, "a")
        );
        assert_eq!(payload_digest(b"abc"), payload_digest(b"abc"));
        assert_ne!(payload_digest(b"abc"), payload_digest(b"abd"));
    }

    #[test]
    fn encoder_names_artifacts_after_stem() {
        let text = "# vtk DataFile Version 3.0\nt\nASCII\nDATASET POLYDATA\n\
            POINTS 3 float\n0 0 0 1 0 0 0 1 0\nPOLYGONS 1 4\n3 0 1 2\n";
        let url = Url::parse("http://mesh.test/index.js?ns=2").expect("url");
        let document = decode_response(url.clone(), Bytes::from(text)).expect("decodes");
        let encoder = ExportEncoder::new("Ovary", StlFormat::default());

        let mut tags = crate::fetch::TagAllocator::default();
        let tag = tags.next();
        let artifacts = encoder.encode(tag, &document);

        assert_eq!(artifacts.tag, tag);
        assert_eq!(artifacts.static_mesh.file_name, "Ovary.stl");
        assert_eq!(artifacts.static_mesh.mime_type, "model/stl");
        assert_eq!(artifacts.source.file_name, "Ovary.vtk");
        assert_eq!(artifacts.source.url, url);
        assert_eq!(artifacts.source.bytes, Bytes::from(text));
        assert_eq!(artifacts.source.digest, payload_digest(text.as_bytes()));
    }
}
