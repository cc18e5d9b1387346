//! Scene bundles: a zip archive holding a JSON manifest and one legacy
//! document per mesh part.
//!
//! ```json
//! { "version": 1, "parts": [ { "name": "cortex", "file": "parts/cortex.vtk" } ] }
//! ```

use super::{DocumentError, DocumentResult, MeshDocument, legacy};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

pub const MANIFEST_NAMES: [&str; 2] = ["index.json", "manifest.json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub parts: Vec<BundlePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlePart {
    pub name: String,
    pub file: String,
}

fn default_version() -> u32 {
    1
}

pub fn parse_bundle(bytes: &[u8]) -> DocumentResult<MeshDocument> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| DocumentError::Archive(format!("invalid zip archive: {err}")))?;

    let manifest = read_manifest(&mut archive)?;
    if manifest.parts.is_empty() {
        return Err(DocumentError::invalid("bundle manifest lists no parts"));
    }

    let mut parts = Vec::with_capacity(manifest.parts.len());
    for part in &manifest.parts {
        let bytes = read_entry(&mut archive, &part.file)?;
        let mesh = legacy::parse_legacy(&bytes).map_err(|err| {
            DocumentError::invalid(format!("part {:?} ({}): {err}", part.name, part.file))
        })?;
        debug!(
            "[mesh] bundle part {} with {} points",
            part.name,
            mesh.number_of_points()
        );
        parts.push(mesh);
    }

    MeshDocument::merge(parts)
}

fn read_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> DocumentResult<BundleManifest> {
    for name in MANIFEST_NAMES {
        if archive.file_names().any(|entry| entry == name) {
            let bytes = read_entry(archive, name)?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
    }
    Err(DocumentError::invalid("bundle has no manifest"))
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> DocumentResult<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|err| DocumentError::Archive(format!("missing entry {name:?}: {err}")))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}
