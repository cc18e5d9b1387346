pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod layout;
pub mod mesh;
pub mod params;
pub mod scene;
pub mod viewer;

pub use config::ViewerConfig;
pub use error::{ViewerError, ViewerResult};
pub use fetch::{MeshTransport, RequestTag};
pub use params::{ParameterSet, RawParameters};
pub use scene::{SceneBackend, SceneComposer};
pub use viewer::{LoadSummary, SubmitStatus, ViewerSession};
