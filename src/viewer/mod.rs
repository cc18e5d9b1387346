use crate::color::{self, ColorRange};
use crate::config::ViewerConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::export::{ExportArtifacts, ExportEncoder};
use crate::fetch::{
    FetchMetrics, FetchMetricsSnapshot, FetchOutcome, FetchedDocument, MeshTransport, PendingRequest,
    ProgressSignal, RequestTag, TagAllocator,
};
use crate::layout::{AxisKind, Dimensions};
use crate::mesh::smooth::{self, SmoothingConfig};
use crate::mesh::{DocumentFormat, MeshDocument};
use crate::params::{ParameterGate, ParameterSet, RawParameters};
use crate::scene::{AxisEnd, Representation, SceneBackend, SceneComposer};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

/// Result of a successful load, as shown to the user.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub tag: RequestTag,
    pub params: ParameterSet,
    pub format: DocumentFormat,
    pub points: usize,
    pub polygons: usize,
    pub color_range: Option<ColorRange>,
    /// Set when the mesh is displayed but could not be colored.
    pub warning: Option<ViewerError>,
}

#[derive(Debug, Clone)]
pub enum SubmitStatus {
    /// Same tuple as the last submission; nothing was requested.
    Suppressed,
    Applied(LoadSummary),
    /// A newer submission was issued before this one settled.
    Superseded(RequestTag),
}

/// The mesh currently on screen and the request it came from.
#[derive(Debug, Clone)]
pub struct DisplayedMesh {
    pub tag: RequestTag,
    pub params: ParameterSet,
    pub mesh: MeshDocument,
    pub color_range: Option<ColorRange>,
}

#[derive(Debug, Clone, Copy)]
struct IssuedRequest {
    tag: RequestTag,
    params: ParameterSet,
}

/// Single owner of gate, scene and export state. `begin` and `complete`
/// are synchronous; only the transport future returned between them is
/// awaited, so several requests may be in flight at once.
pub struct ViewerSession {
    endpoint: Url,
    timeout: Option<Duration>,
    smoothing: SmoothingConfig,
    transport: Arc<dyn MeshTransport>,
    gate: ParameterGate,
    scene: SceneComposer,
    exporter: ExportEncoder,
    progress: ProgressSignal,
    tags: TagAllocator,
    metrics: FetchMetrics,
    latest: Option<IssuedRequest>,
    displayed: Option<DisplayedMesh>,
    artifacts: Option<ExportArtifacts>,
    failed: Option<ParameterSet>,
    last_error: Option<ViewerError>,
}

impl ViewerSession {
    pub fn new(
        config: ViewerConfig,
        transport: Arc<dyn MeshTransport>,
        backend: Box<dyn SceneBackend>,
    ) -> ViewerResult<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|err| ViewerError::Config(format!("endpoint {:?}: {err}", config.endpoint)))?;
        config.smoothing.validate().map_err(ViewerError::Config)?;
        let scene = SceneComposer::new(backend, config.representation, config.plane_visible)?;
        info!(
            "[viewer] session on {endpoint} via {} / {}",
            transport.label(),
            scene.backend_label()
        );
        Ok(Self {
            endpoint,
            timeout: config.request_timeout(),
            smoothing: config.smoothing,
            transport,
            gate: ParameterGate::new(),
            scene,
            exporter: ExportEncoder::new(config.export_stem, config.stl_format),
            progress: ProgressSignal::new(),
            tags: TagAllocator::default(),
            metrics: FetchMetrics::default(),
            latest: None,
            displayed: None,
            artifacts: None,
            failed: None,
            last_error: None,
        })
    }

    /// Gates `params`, lays out axes and plane for them, and issues the
    /// request. `None` means the tuple was suppressed as a duplicate.
    pub fn begin(&mut self, params: ParameterSet) -> ViewerResult<Option<PendingRequest>> {
        if !self.gate.admit(&params) {
            self.metrics.record_suppressed();
            return Ok(None);
        }

        if let Err(err) = self.scene.layout(&Dimensions::from(&params)) {
            self.gate.release(&params);
            return Err(err.into());
        }

        let tag = self.tags.next();
        self.latest = Some(IssuedRequest { tag, params });
        self.progress.begin(tag);
        self.metrics.record_issued();
        Ok(Some(PendingRequest::issue(
            self.transport.as_ref(),
            tag,
            params,
            &self.endpoint,
            self.timeout,
        )))
    }

    /// Applies a settled request if it is still the latest one. Responses
    /// for superseded requests are dropped with `StaleResponse` and leave
    /// the scene, the progress flag and the artifacts untouched.
    pub fn complete(&mut self, outcome: FetchOutcome) -> ViewerResult<LoadSummary> {
        let FetchOutcome {
            tag,
            params,
            elapsed,
            result,
            ..
        } = outcome;

        if self.latest.map(|latest| latest.tag) != Some(tag) {
            self.metrics.record_stale();
            debug!("[viewer] discarding stale response {tag} for {params}");
            return Err(ViewerError::StaleResponse { tag });
        }
        self.progress.settle(tag);

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => return Err(self.fail(params, err)),
        };

        let mut mesh = fetched.mesh.clone();
        smooth::smooth(&mut mesh, &self.smoothing);
        let (color_range, warning) = match color::prepare_label_scalars(&mut mesh) {
            Ok(range) => (Some(range), None),
            Err(err) => {
                warn!("[viewer] {err}; showing {params} without coloring");
                (None, Some(err))
            }
        };

        let previous_bounds = self.displayed.as_ref().and_then(|shown| shown.mesh.bounds());
        let generation = self.scene.mesh_generation();
        let applied = self
            .scene
            .frame(mesh.bounds())
            .and_then(|()| self.scene.apply_mesh(&mesh, color_range));
        if let Err(err) = applied {
            if self.scene.mesh_generation() == generation {
                if let Err(restore) = self.scene.frame(previous_bounds) {
                    warn!("[viewer] could not restore camera: {restore}");
                }
                return Err(self.fail(params, err.into()));
            }
            // The backend already holds the new mesh; track it as displayed.
            let err = ViewerError::from(err);
            warn!("[viewer] request {tag} swapped in but did not render: {err}");
            self.metrics.record_failed();
            self.failed = None;
            self.last_error = Some(err.clone());
            self.commit(tag, params, mesh, color_range, &fetched);
            return Err(err);
        }

        self.metrics.record_applied(elapsed);
        self.failed = None;
        self.last_error = warning.clone();

        let summary = LoadSummary {
            tag,
            params,
            format: fetched.format,
            points: mesh.number_of_points(),
            polygons: mesh.polygons().len(),
            color_range,
            warning,
        };
        info!(
            "[viewer] request {tag} displayed: {} points, {} polygons",
            summary.points, summary.polygons
        );
        self.commit(tag, params, mesh, color_range, &fetched);
        Ok(summary)
    }

    /// Records `mesh` as on screen. Artifacts come from the decoded source,
    /// not the smoothed display copy.
    fn commit(
        &mut self,
        tag: RequestTag,
        params: ParameterSet,
        mesh: MeshDocument,
        color_range: Option<ColorRange>,
        fetched: &FetchedDocument,
    ) {
        self.artifacts = Some(self.exporter.encode(tag, fetched));
        self.displayed = Some(DisplayedMesh {
            tag,
            params,
            mesh,
            color_range,
        });
    }

    fn fail(&mut self, params: ParameterSet, err: ViewerError) -> ViewerError {
        warn!("[viewer] load of {params} failed: {err}");
        self.metrics.record_failed();
        self.gate.release(&params);
        self.failed = Some(params);
        self.last_error = Some(err.clone());
        err
    }

    /// Gate, fetch and apply in one call.
    pub async fn submit(&mut self, params: ParameterSet) -> ViewerResult<SubmitStatus> {
        let Some(pending) = self.begin(params)? else {
            return Ok(SubmitStatus::Suppressed);
        };
        let outcome = pending.resolve().await;
        match self.complete(outcome) {
            Ok(summary) => Ok(SubmitStatus::Applied(summary)),
            Err(ViewerError::StaleResponse { tag }) => Ok(SubmitStatus::Superseded(tag)),
            Err(err) => Err(err),
        }
    }

    pub async fn submit_raw(&mut self, raw: &RawParameters) -> ViewerResult<SubmitStatus> {
        let params = match ParameterSet::parse(raw) {
            Ok(params) => params,
            Err(err) => {
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };
        self.submit(params).await
    }

    /// Submits the control-panel defaults, as done once at startup.
    pub async fn load_defaults(&mut self) -> ViewerResult<SubmitStatus> {
        self.submit(ParameterSet::default()).await
    }

    /// Resubmits the last failed tuple, if the most recent load failed.
    pub async fn retry(&mut self) -> ViewerResult<SubmitStatus> {
        match self.failed {
            Some(params) => {
                info!("[viewer] retrying {params}");
                self.submit(params).await
            }
            None => Ok(SubmitStatus::Suppressed),
        }
    }

    pub fn set_representation(&mut self, representation: Representation) -> ViewerResult<()> {
        Ok(self.scene.set_representation(representation)?)
    }

    pub fn set_plane_visible(&mut self, visible: bool) -> ViewerResult<()> {
        Ok(self.scene.set_plane_visible(visible)?)
    }

    pub fn set_axis_label_visible(
        &mut self,
        axis: AxisKind,
        end: AxisEnd,
        visible: bool,
    ) -> ViewerResult<bool> {
        Ok(self.scene.set_axis_label_visible(axis, end, visible)?)
    }

    pub fn reset_view(&mut self) -> ViewerResult<()> {
        let bounds = self.displayed.as_ref().and_then(|shown| shown.mesh.bounds());
        Ok(self.scene.reset_view(bounds)?)
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<bool> {
        self.progress.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.progress.is_in_flight()
    }

    pub fn displayed(&self) -> Option<&DisplayedMesh> {
        self.displayed.as_ref()
    }

    pub fn artifacts(&self) -> Option<&ExportArtifacts> {
        self.artifacts.as_ref()
    }

    pub fn last_error(&self) -> Option<&ViewerError> {
        self.last_error.as_ref()
    }

    pub fn failed_params(&self) -> Option<&ParameterSet> {
        self.failed.as_ref()
    }

    pub fn latest_tag(&self) -> Option<RequestTag> {
        self.latest.map(|latest| latest.tag)
    }

    pub fn metrics(&self) -> FetchMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn scene(&self) -> &SceneComposer {
        &self.scene
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}
