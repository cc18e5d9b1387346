use crate::fetch::{RequestTag, TransportError};
use crate::mesh::DocumentError;
use crate::scene::SceneError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ViewerError {
    #[error("request to {url} failed: {reason}")]
    NetworkFailure { url: String, reason: String },
    #[error("response is not a mesh document: {0}")]
    MalformedDocument(String),
    #[error("mesh has no point array named `{array}`")]
    MissingScalarData { array: String },
    #[error("response for request {tag} superseded by a newer submission")]
    StaleResponse { tag: RequestTag },
    #[error("invalid value {value:?} for parameter `{field}`")]
    InvalidParameter { field: &'static str, value: String },
    #[error("scene backend error: {0}")]
    Scene(#[from] SceneError),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ViewerError {
    /// Stale responses are dropped silently; everything else reaches the user.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ViewerError::StaleResponse { .. })
    }

    pub fn network(url: impl Into<String>, err: TransportError) -> Self {
        ViewerError::NetworkFailure {
            url: url.into(),
            reason: err.to_string(),
        }
    }
}

impl From<DocumentError> for ViewerError {
    fn from(err: DocumentError) -> Self {
        ViewerError::MalformedDocument(err.to_string())
    }
}

pub type ViewerResult<T> = Result<T, ViewerError>;
