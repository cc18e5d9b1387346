use crate::error::{ViewerError, ViewerResult};
use crate::export::StlFormat;
use crate::mesh::smooth::SmoothingConfig;
use crate::scene::Representation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://192.168.4.23:3000/index.js";
pub const DEFAULT_EXPORT_STEM: &str = "Ovary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub endpoint: String,
    pub export_stem: String,
    pub request_timeout_ms: Option<u64>,
    pub smoothing: SmoothingConfig,
    pub plane_visible: bool,
    pub representation: Representation,
    pub stl_format: StlFormat,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            export_stem: DEFAULT_EXPORT_STEM.to_string(),
            request_timeout_ms: None,
            smoothing: SmoothingConfig::default(),
            plane_visible: true,
            representation: Representation::Surface,
            stl_format: StlFormat::Binary,
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(text: &str) -> ViewerResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|err| ViewerError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> ViewerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| ViewerError::Config(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> ViewerResult<()> {
        url::Url::parse(&self.endpoint)
            .map_err(|err| ViewerError::Config(format!("endpoint {:?}: {err}", self.endpoint)))?;
        if self.export_stem.trim().is_empty() {
            return Err(ViewerError::Config("export_stem must not be empty".into()));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ViewerError::Config(
                "request_timeout_ms must be positive when set".into(),
            ));
        }
        self.smoothing.validate().map_err(ViewerError::Config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json_str(r#"{ "export_stem": "Kidney" }"#)
            .expect("config should parse");
        assert_eq!(config.export_stem, "Kidney");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.smoothing.iterations, 20);
    }

    #[test]
    fn rejects_unparseable_endpoint() {
        let err = ViewerConfig::from_json_str(r#"{ "endpoint": "not a url" }"#)
            .expect_err("endpoint must be a url");
        assert!(matches!(err, ViewerError::Config(_)));
    }

    #[test]
    fn rejects_degenerate_smoothing_pass_band() {
        for band in ["2.0", "0.0", "-0.1"] {
            let json = format!(r#"{{ "smoothing": {{ "pass_band": {band} }} }}"#);
            let err = ViewerConfig::from_json_str(&json).expect_err("pass band out of range");
            assert!(
                matches!(&err, ViewerError::Config(reason) if reason.contains("pass_band")),
                "{band}: {err:?}"
            );
        }
        let config = ViewerConfig::from_json_str(r#"{ "smoothing": { "pass_band": 0.1 } }"#)
            .expect("in range");
        assert_eq!(config.smoothing.pass_band, 0.1);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{ "request_timeout_ms": 1500, "plane_visible": false, "stl_format": "ascii" }}"#
        )
        .expect("write config");

        let config = ViewerConfig::from_json_path(file.path()).expect("load config");
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(1500)));
        assert!(!config.plane_visible);
        assert_eq!(config.stl_format, StlFormat::Ascii);
    }
}
