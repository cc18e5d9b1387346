pub mod camera;

pub use camera::Camera;

use crate::color::{ColorRange, LookupTable};
use crate::layout::{self, AxisKind, AxisSpec, Dimensions, PlaneSpec, Point3};
use crate::mesh::{Bounds, MeshDocument};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Points,
    Wireframe,
    #[default]
    Surface,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    UnknownActor(ActorId),
    UnknownLabel(LabelId),
    Backend(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::UnknownActor(id) => write!(f, "no actor with id {}", id.0),
            SceneError::UnknownLabel(id) => write!(f, "no label with id {}", id.0),
            SceneError::Backend(reason) => write!(f, "backend failure: {reason}"),
        }
    }
}

impl std::error::Error for SceneError {}

pub type SceneResult<T> = Result<T, SceneError>;

/// Rendering seam. Implementations own actual actors; the composer only
/// holds ids and decides what to create, update or drop.
pub trait SceneBackend: Send {
    fn label(&self) -> &'static str;
    fn create_mesh_actor(&mut self) -> SceneResult<ActorId>;
    fn set_mesh_data(&mut self, actor: ActorId, mesh: &MeshDocument) -> SceneResult<()>;
    /// Colors the mesh through `table`; `None` draws it uncolored.
    fn set_lookup_table(&mut self, actor: ActorId, table: Option<LookupTable>) -> SceneResult<()>;
    fn set_representation(
        &mut self,
        actor: ActorId,
        representation: Representation,
    ) -> SceneResult<()>;
    fn add_line(&mut self, start: Point3, end: Point3) -> SceneResult<ActorId>;
    fn update_line(&mut self, actor: ActorId, start: Point3, end: Point3) -> SceneResult<()>;
    fn add_plane(&mut self, plane: &PlaneSpec) -> SceneResult<ActorId>;
    fn remove_actor(&mut self, actor: ActorId) -> SceneResult<()>;
    fn set_actor_visible(&mut self, actor: ActorId, visible: bool) -> SceneResult<()>;
    fn add_label(&mut self, text: &str, position: Point3) -> SceneResult<LabelId>;
    fn move_label(&mut self, label: LabelId, position: Point3) -> SceneResult<()>;
    fn set_label_visible(&mut self, label: LabelId, visible: bool) -> SceneResult<()>;
    fn set_camera(&mut self, camera: &Camera) -> SceneResult<()>;
    fn render(&mut self) -> SceneResult<()>;
}

/// Hands out ids and draws nothing.
#[derive(Default)]
pub struct NullSceneBackend {
    next_id: u64,
}

impl NullSceneBackend {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl SceneBackend for NullSceneBackend {
    fn label(&self) -> &'static str {
        "Null Scene Backend"
    }

    fn create_mesh_actor(&mut self) -> SceneResult<ActorId> {
        Ok(ActorId(self.allocate()))
    }

    fn set_mesh_data(&mut self, _actor: ActorId, _mesh: &MeshDocument) -> SceneResult<()> {
        Ok(())
    }

    fn set_lookup_table(&mut self, _actor: ActorId, _table: Option<LookupTable>) -> SceneResult<()> {
        Ok(())
    }

    fn set_representation(
        &mut self,
        _actor: ActorId,
        _representation: Representation,
    ) -> SceneResult<()> {
        Ok(())
    }

    fn add_line(&mut self, _start: Point3, _end: Point3) -> SceneResult<ActorId> {
        Ok(ActorId(self.allocate()))
    }

    fn update_line(&mut self, _actor: ActorId, _start: Point3, _end: Point3) -> SceneResult<()> {
        Ok(())
    }

    fn add_plane(&mut self, _plane: &PlaneSpec) -> SceneResult<ActorId> {
        Ok(ActorId(self.allocate()))
    }

    fn remove_actor(&mut self, _actor: ActorId) -> SceneResult<()> {
        Ok(())
    }

    fn set_actor_visible(&mut self, _actor: ActorId, _visible: bool) -> SceneResult<()> {
        Ok(())
    }

    fn add_label(&mut self, _text: &str, _position: Point3) -> SceneResult<LabelId> {
        Ok(LabelId(self.allocate()))
    }

    fn move_label(&mut self, _label: LabelId, _position: Point3) -> SceneResult<()> {
        Ok(())
    }

    fn set_label_visible(&mut self, _label: LabelId, _visible: bool) -> SceneResult<()> {
        Ok(())
    }

    fn set_camera(&mut self, _camera: &Camera) -> SceneResult<()> {
        Ok(())
    }

    fn render(&mut self) -> SceneResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshSummary {
    pub points: usize,
    pub polygons: usize,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActorKind {
    Mesh {
        data: Option<MeshSummary>,
        lookup_table: Option<LookupTable>,
        representation: Representation,
    },
    Line {
        start: Point3,
        end: Point3,
    },
    Plane(PlaneSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorRecord {
    pub kind: ActorKind,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    pub text: String,
    pub position: Point3,
    pub visible: bool,
}

/// Backend operations in the order they were issued.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    MeshCreated(ActorId),
    MeshData(ActorId),
    LookupTable(ActorId, Option<LookupTable>),
    Representation(ActorId, Representation),
    LineAdded(ActorId),
    LineUpdated(ActorId),
    PlaneAdded(ActorId),
    ActorRemoved(ActorId),
    ActorVisibility(ActorId, bool),
    LabelAdded(LabelId),
    LabelMoved(LabelId),
    LabelVisibility(LabelId, bool),
    Camera,
    Render,
}

/// What a recording backend has been told so far.
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub actors: BTreeMap<ActorId, ActorRecord>,
    pub labels: BTreeMap<LabelId, LabelRecord>,
    pub camera: Option<Camera>,
    pub events: Vec<SceneEvent>,
    pub renders: u64,
    /// When set, `render` fails with this reason.
    pub render_failure: Option<String>,
}

impl SceneSnapshot {
    pub fn lines(&self) -> impl Iterator<Item = (ActorId, Point3, Point3)> + '_ {
        self.actors.iter().filter_map(|(id, record)| match record.kind {
            ActorKind::Line { start, end } => Some((*id, start, end)),
            _ => None,
        })
    }

    pub fn planes(&self) -> impl Iterator<Item = (ActorId, &ActorRecord)> + '_ {
        self.actors
            .iter()
            .filter(|(_, record)| matches!(record.kind, ActorKind::Plane(_)))
            .map(|(id, record)| (*id, record))
    }

    pub fn mesh(&self) -> Option<&ActorRecord> {
        self.actors
            .values()
            .find(|record| matches!(record.kind, ActorKind::Mesh { .. }))
    }

    pub fn label_texts(&self) -> Vec<&str> {
        self.labels.values().map(|label| label.text.as_str()).collect()
    }
}

/// Keeps a model of the scene in shared memory so it can be inspected
/// after the backend has been handed to a composer.
#[derive(Default)]
pub struct RecordingSceneBackend {
    state: Arc<Mutex<SceneSnapshot>>,
    next_id: u64,
}

impl RecordingSceneBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: Arc<Mutex<SceneSnapshot>>) -> Self {
        Self { state, next_id: 0 }
    }

    pub fn state(&self) -> Arc<Mutex<SceneSnapshot>> {
        Arc::clone(&self.state)
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn with_snapshot<T>(
        &self,
        apply: impl FnOnce(&mut SceneSnapshot) -> SceneResult<T>,
    ) -> SceneResult<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| SceneError::Backend("recording state poisoned".into()))?;
        apply(&mut guard)
    }

    fn with_actor(
        &self,
        actor: ActorId,
        event: SceneEvent,
        apply: impl FnOnce(&mut ActorRecord),
    ) -> SceneResult<()> {
        self.with_snapshot(|snapshot| {
            let record = snapshot
                .actors
                .get_mut(&actor)
                .ok_or(SceneError::UnknownActor(actor))?;
            apply(record);
            snapshot.events.push(event);
            Ok(())
        })
    }

    fn with_label(
        &self,
        label: LabelId,
        event: SceneEvent,
        apply: impl FnOnce(&mut LabelRecord),
    ) -> SceneResult<()> {
        self.with_snapshot(|snapshot| {
            let record = snapshot
                .labels
                .get_mut(&label)
                .ok_or(SceneError::UnknownLabel(label))?;
            apply(record);
            snapshot.events.push(event);
            Ok(())
        })
    }

    fn insert_actor(&mut self, kind: ActorKind, event: fn(ActorId) -> SceneEvent) -> SceneResult<ActorId> {
        let id = ActorId(self.allocate());
        self.with_snapshot(|snapshot| {
            snapshot.actors.insert(id, ActorRecord { kind, visible: true });
            snapshot.events.push(event(id));
            Ok(id)
        })
    }
}

impl SceneBackend for RecordingSceneBackend {
    fn label(&self) -> &'static str {
        "Recording Scene Backend"
    }

    fn create_mesh_actor(&mut self) -> SceneResult<ActorId> {
        let kind = ActorKind::Mesh {
            data: None,
            lookup_table: None,
            representation: Representation::default(),
        };
        self.insert_actor(kind, SceneEvent::MeshCreated)
    }

    fn set_mesh_data(&mut self, actor: ActorId, mesh: &MeshDocument) -> SceneResult<()> {
        let summary = MeshSummary {
            points: mesh.number_of_points(),
            polygons: mesh.polygons().len(),
            bounds: mesh.bounds(),
        };
        self.with_actor(actor, SceneEvent::MeshData(actor), |record| {
            if let ActorKind::Mesh { data, .. } = &mut record.kind {
                *data = Some(summary);
            }
        })
    }

    fn set_lookup_table(&mut self, actor: ActorId, table: Option<LookupTable>) -> SceneResult<()> {
        self.with_actor(actor, SceneEvent::LookupTable(actor, table), |record| {
            if let ActorKind::Mesh { lookup_table, .. } = &mut record.kind {
                *lookup_table = table;
            }
        })
    }

    fn set_representation(
        &mut self,
        actor: ActorId,
        representation: Representation,
    ) -> SceneResult<()> {
        let event = SceneEvent::Representation(actor, representation);
        self.with_actor(actor, event, |record| {
            if let ActorKind::Mesh {
                representation: current,
                ..
            } = &mut record.kind
            {
                *current = representation;
            }
        })
    }

    fn add_line(&mut self, start: Point3, end: Point3) -> SceneResult<ActorId> {
        self.insert_actor(ActorKind::Line { start, end }, SceneEvent::LineAdded)
    }

    fn update_line(&mut self, actor: ActorId, start: Point3, end: Point3) -> SceneResult<()> {
        self.with_actor(actor, SceneEvent::LineUpdated(actor), |record| {
            record.kind = ActorKind::Line { start, end };
        })
    }

    fn add_plane(&mut self, plane: &PlaneSpec) -> SceneResult<ActorId> {
        self.insert_actor(ActorKind::Plane(*plane), SceneEvent::PlaneAdded)
    }

    fn remove_actor(&mut self, actor: ActorId) -> SceneResult<()> {
        self.with_snapshot(|snapshot| {
            snapshot
                .actors
                .remove(&actor)
                .ok_or(SceneError::UnknownActor(actor))?;
            snapshot.events.push(SceneEvent::ActorRemoved(actor));
            Ok(())
        })
    }

    fn set_actor_visible(&mut self, actor: ActorId, visible: bool) -> SceneResult<()> {
        self.with_actor(actor, SceneEvent::ActorVisibility(actor, visible), |record| {
            record.visible = visible;
        })
    }

    fn add_label(&mut self, text: &str, position: Point3) -> SceneResult<LabelId> {
        let id = LabelId(self.allocate());
        let record = LabelRecord {
            text: text.to_string(),
            position,
            visible: true,
        };
        self.with_snapshot(|snapshot| {
            snapshot.labels.insert(id, record);
            snapshot.events.push(SceneEvent::LabelAdded(id));
            Ok(id)
        })
    }

    fn move_label(&mut self, label: LabelId, position: Point3) -> SceneResult<()> {
        self.with_label(label, SceneEvent::LabelMoved(label), |record| {
            record.position = position;
        })
    }

    fn set_label_visible(&mut self, label: LabelId, visible: bool) -> SceneResult<()> {
        self.with_label(label, SceneEvent::LabelVisibility(label, visible), |record| {
            record.visible = visible;
        })
    }

    fn set_camera(&mut self, camera: &Camera) -> SceneResult<()> {
        self.with_snapshot(|snapshot| {
            snapshot.camera = Some(*camera);
            snapshot.events.push(SceneEvent::Camera);
            Ok(())
        })
    }

    fn render(&mut self) -> SceneResult<()> {
        self.with_snapshot(|snapshot| {
            if let Some(reason) = &snapshot.render_failure {
                return Err(SceneError::Backend(reason.clone()));
            }
            snapshot.renders += 1;
            snapshot.events.push(SceneEvent::Render);
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisEnd {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LabelHandle {
    id: LabelId,
    visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedAxis {
    spec: AxisSpec,
    line: ActorId,
    start_label: LabelHandle,
    end_label: LabelHandle,
}

#[derive(Debug, Clone, PartialEq)]
enum AxisSlot {
    Uninitialized,
    Placed(PlacedAxis),
}

/// Owns every visible actor: the mesh, three axis lines with their end
/// labels, and the reference plane.
pub struct SceneComposer {
    backend: Box<dyn SceneBackend>,
    mesh_actor: ActorId,
    representation: Representation,
    color_range: Option<ColorRange>,
    mesh_generation: u64,
    axes: [AxisSlot; 3],
    plane: Option<ActorId>,
    plane_visible: bool,
    camera: Camera,
}

impl SceneComposer {
    pub fn new(
        mut backend: Box<dyn SceneBackend>,
        representation: Representation,
        plane_visible: bool,
    ) -> SceneResult<Self> {
        let mesh_actor = backend.create_mesh_actor()?;
        backend.set_representation(mesh_actor, representation)?;
        debug!("[scene] composer ready on {}", backend.label());
        Ok(Self {
            backend,
            mesh_actor,
            representation,
            color_range: None,
            mesh_generation: 0,
            axes: [AxisSlot::Uninitialized, AxisSlot::Uninitialized, AxisSlot::Uninitialized],
            plane: None,
            plane_visible,
            camera: Camera::default(),
        })
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    /// Replaces the displayed mesh and re-renders. `None` shows the geometry
    /// without scalar coloring. Once the backend holds the new data,
    /// `mesh_generation` advances even if coloring or rendering then fails.
    pub fn apply_mesh(&mut self, mesh: &MeshDocument, range: Option<ColorRange>) -> SceneResult<()> {
        self.backend.set_mesh_data(self.mesh_actor, mesh)?;
        self.mesh_generation += 1;
        self.color_range = None;
        self.backend
            .set_lookup_table(self.mesh_actor, range.map(LookupTable::new))?;
        self.color_range = range;
        debug!(
            "[scene] mesh swapped: {} points, range {:?}",
            mesh.number_of_points(),
            range.map(|r| (r.min, r.max))
        );
        self.backend.render()
    }

    /// Places the three axes for `dims`. First use creates each line and its
    /// two labels; later calls move them only when coordinates changed.
    pub fn layout_axes(&mut self, dims: &Dimensions) -> SceneResult<()> {
        for spec in layout::axis_specs(dims) {
            self.place_axis(spec)?;
        }
        Ok(())
    }

    fn place_axis(&mut self, spec: AxisSpec) -> SceneResult<()> {
        let slot = &mut self.axes[spec.kind.index()];
        match slot {
            AxisSlot::Uninitialized => {
                let line = self.backend.add_line(spec.start_point, spec.end_point)?;
                let start = self.backend.add_label(spec.start_label, spec.start_point)?;
                let end = self.backend.add_label(spec.end_label, spec.end_point)?;
                debug!("[scene] axis {:?} created", spec.kind);
                *slot = AxisSlot::Placed(PlacedAxis {
                    spec,
                    line,
                    start_label: LabelHandle {
                        id: start,
                        visible: true,
                    },
                    end_label: LabelHandle {
                        id: end,
                        visible: true,
                    },
                });
            }
            AxisSlot::Placed(placed) => {
                if placed.spec == spec {
                    return Ok(());
                }
                self.backend
                    .update_line(placed.line, spec.start_point, spec.end_point)?;
                self.backend.move_label(placed.start_label.id, spec.start_point)?;
                self.backend.move_label(placed.end_label.id, spec.end_point)?;
                placed.spec = spec;
            }
        }
        Ok(())
    }

    /// Drops the previous plane, if any, and adds a fresh one sized to `dims`
    /// carrying the current visibility toggle.
    pub fn layout_plane(&mut self, dims: &Dimensions) -> SceneResult<()> {
        if let Some(previous) = self.plane.take() {
            self.backend.remove_actor(previous)?;
        }
        let spec = layout::compute_plane_position(dims);
        let plane = self.backend.add_plane(&spec)?;
        self.plane = Some(plane);
        if !self.plane_visible {
            self.backend.set_actor_visible(plane, false)?;
        }
        Ok(())
    }

    /// Axes and plane for a new parameter pass, rendered together.
    pub fn layout(&mut self, dims: &Dimensions) -> SceneResult<()> {
        self.layout_axes(dims)?;
        self.layout_plane(dims)?;
        self.backend.render()
    }

    /// Frames the current mesh from the canonical direction, ignoring any
    /// prior user interaction with the camera.
    pub fn reset_view(&mut self, bounds: Option<Bounds>) -> SceneResult<()> {
        self.frame(bounds)?;
        self.backend.render()
    }

    /// Points the camera at `bounds` without rendering.
    pub fn frame(&mut self, bounds: Option<Bounds>) -> SceneResult<()> {
        self.camera = match bounds {
            Some(bounds) => Camera::framing(&bounds),
            None => Camera::default(),
        };
        self.backend.set_camera(&self.camera)
    }

    pub fn set_representation(&mut self, representation: Representation) -> SceneResult<()> {
        if self.representation == representation {
            return Ok(());
        }
        self.backend
            .set_representation(self.mesh_actor, representation)?;
        self.representation = representation;
        self.backend.render()
    }

    pub fn set_plane_visible(&mut self, visible: bool) -> SceneResult<()> {
        self.plane_visible = visible;
        if let Some(plane) = self.plane {
            self.backend.set_actor_visible(plane, visible)?;
            self.backend.render()?;
        }
        Ok(())
    }

    /// Shows or hides one end label. Returns false when the axis has not
    /// been placed yet.
    pub fn set_axis_label_visible(
        &mut self,
        axis: AxisKind,
        end: AxisEnd,
        visible: bool,
    ) -> SceneResult<bool> {
        let AxisSlot::Placed(placed) = &mut self.axes[axis.index()] else {
            return Ok(false);
        };
        let handle = match end {
            AxisEnd::Start => &mut placed.start_label,
            AxisEnd::End => &mut placed.end_label,
        };
        if handle.visible != visible {
            self.backend.set_label_visible(handle.id, visible)?;
            handle.visible = visible;
            self.backend.render()?;
        }
        Ok(true)
    }

    pub fn axis_label_visible(&self, axis: AxisKind, end: AxisEnd) -> Option<bool> {
        match &self.axes[axis.index()] {
            AxisSlot::Uninitialized => None,
            AxisSlot::Placed(placed) => Some(match end {
                AxisEnd::Start => placed.start_label.visible,
                AxisEnd::End => placed.end_label.visible,
            }),
        }
    }

    pub fn axis(&self, axis: AxisKind) -> Option<&AxisSpec> {
        match &self.axes[axis.index()] {
            AxisSlot::Uninitialized => None,
            AxisSlot::Placed(placed) => Some(&placed.spec),
        }
    }

    pub fn plane_visible(&self) -> bool {
        self.plane_visible
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn color_range(&self) -> Option<ColorRange> {
        self.color_range
    }

    /// Number of meshes the backend has accepted so far.
    pub fn mesh_generation(&self) -> u64 {
        self.mesh_generation
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::labelled_square;

    fn composer() -> (SceneComposer, Arc<Mutex<SceneSnapshot>>) {
        let backend = RecordingSceneBackend::new();
        let state = backend.state();
        let composer = SceneComposer::new(Box::new(backend), Representation::Surface, true)
            .expect("composer");
        (composer, state)
    }

    #[test]
    fn first_layout_creates_three_axes_and_six_labels() {
        let (mut scene, state) = composer();
        scene.layout(&Dimensions::new(40.0, 30.0, 20.0)).expect("layout");

        let snapshot = state.lock().expect("state");
        assert_eq!(snapshot.lines().count(), 3);
        assert_eq!(snapshot.planes().count(), 1);
        let mut texts = snapshot.label_texts();
        texts.sort_unstable();
        assert_eq!(texts, vec!["AI", "AS", "L", "M", "PI", "PS"]);
        assert_eq!(snapshot.renders, 1);
    }

    #[test]
    fn unchanged_dimensions_leave_axes_untouched() {
        let (mut scene, state) = composer();
        let dims = Dimensions::new(40.0, 30.0, 20.0);
        scene.layout_axes(&dims).expect("first");
        let events_before = state.lock().expect("state").events.len();

        scene.layout_axes(&dims).expect("second");
        assert_eq!(state.lock().expect("state").events.len(), events_before);
    }

    #[test]
    fn changed_dimensions_update_in_place_and_keep_label_visibility() {
        let (mut scene, state) = composer();
        scene.layout_axes(&Dimensions::new(40.0, 30.0, 20.0)).expect("first");
        scene
            .set_axis_label_visible(AxisKind::LongAxis, AxisEnd::End, false)
            .expect("hide M");

        scene.layout_axes(&Dimensions::new(60.0, 30.0, 20.0)).expect("second");

        let snapshot = state.lock().expect("state");
        assert_eq!(snapshot.lines().count(), 3);
        assert_eq!(snapshot.labels.len(), 6);
        let (_, start, end) = snapshot
            .lines()
            .find(|(_, start, _)| start[2] != 0.0)
            .expect("long axis");
        assert_eq!(start, [0.0, 0.0, -30.0]);
        assert_eq!(end, [0.0, 0.0, 30.0]);
        assert!(snapshot.events.iter().any(|e| matches!(e, SceneEvent::LineUpdated(_))));
        let m = snapshot
            .labels
            .values()
            .find(|label| label.text == "M")
            .expect("M label");
        assert!(!m.visible);
        assert_eq!(m.position, [0.0, 0.0, 30.0]);
        assert_eq!(
            scene.axis_label_visible(AxisKind::LongAxis, AxisEnd::End),
            Some(false)
        );
    }

    #[test]
    fn plane_is_recreated_with_visibility_toggle() {
        let (mut scene, state) = composer();
        let dims = Dimensions::new(40.0, 30.0, 20.0);
        scene.layout_plane(&dims).expect("first plane");
        scene.set_plane_visible(false).expect("hide plane");
        scene.layout_plane(&dims).expect("second plane");

        let snapshot = state.lock().expect("state");
        let planes: Vec<_> = snapshot.planes().collect();
        assert_eq!(planes.len(), 1);
        assert!(!planes[0].1.visible);
        assert!(snapshot.events.iter().any(|e| matches!(e, SceneEvent::ActorRemoved(_))));
    }

    #[test]
    fn apply_mesh_sets_lookup_table_and_renders() {
        let (mut scene, state) = composer();
        let mesh = labelled_square([0.0, 1.0, 2.0, 3.0]);
        let range = ColorRange::new(0.0, 3.0);
        scene.apply_mesh(&mesh, Some(range)).expect("apply");

        let snapshot = state.lock().expect("state");
        let Some(ActorRecord {
            kind:
                ActorKind::Mesh {
                    data: Some(summary),
                    lookup_table: Some(table),
                    ..
                },
            ..
        }) = snapshot.mesh()
        else {
            panic!("mesh actor should carry data and a lookup table");
        };
        assert_eq!(summary.points, 4);
        assert_eq!(table.range(), range);
        assert_ne!(table.color(0.0), table.color(3.0));
        assert_eq!(snapshot.events.last(), Some(&SceneEvent::Render));
        assert_eq!(scene.mesh_generation(), 1);
    }

    #[test]
    fn distinct_labels_map_to_distinct_recorded_colors() {
        let (mut scene, state) = composer();
        let mesh = labelled_square([0.0, 1.0, 2.0, 3.0]);
        scene
            .apply_mesh(&mesh, Some(ColorRange::new(0.0, 3.0)))
            .expect("apply");

        let snapshot = state.lock().expect("state");
        let Some(ActorKind::Mesh {
            lookup_table: Some(table),
            ..
        }) = snapshot.mesh().map(|record| &record.kind)
        else {
            panic!("lookup table recorded");
        };
        let colors: Vec<[f64; 3]> = (0..4).map(|label| table.color(label as f64)).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn uncolored_mesh_records_no_lookup_table() {
        let (mut scene, state) = composer();
        scene
            .apply_mesh(&labelled_square([0.0; 4]), None)
            .expect("apply");
        let snapshot = state.lock().expect("state");
        assert!(snapshot.events.contains(&SceneEvent::LookupTable(
            ActorId(1),
            None
        )));
        assert_eq!(scene.color_range(), None);
    }

    #[test]
    fn failed_render_after_swap_still_advances_generation() {
        let (mut scene, state) = composer();
        state.lock().expect("state").render_failure = Some("device lost".into());
        let err = scene
            .apply_mesh(&labelled_square([0.0; 4]), None)
            .expect_err("render fails");
        assert_eq!(err, SceneError::Backend("device lost".into()));
        assert_eq!(scene.mesh_generation(), 1);
        assert_eq!(state.lock().expect("state").renders, 0);
    }

    #[test]
    fn reset_view_frames_bounds() {
        let (mut scene, state) = composer();
        let mesh = labelled_square([0.0; 4]);
        scene.reset_view(mesh.bounds()).expect("reset");
        let camera = state.lock().expect("state").camera.expect("camera set");
        assert_eq!(camera.focal_point, [0.5, 0.5, 0.0]);
        assert_eq!(&camera, scene.camera());
    }

    #[test]
    fn frame_moves_camera_without_rendering() {
        let (mut scene, state) = composer();
        scene.frame(labelled_square([0.0; 4]).bounds()).expect("frame");
        let snapshot = state.lock().expect("state");
        assert!(snapshot.camera.is_some());
        assert_eq!(snapshot.renders, 0);
    }

    #[test]
    fn representation_change_skips_refetch_and_noops_when_equal() {
        let (mut scene, state) = composer();
        scene.set_representation(Representation::Surface).expect("same");
        let renders = state.lock().expect("state").renders;
        assert_eq!(renders, 0);

        scene.set_representation(Representation::Wireframe).expect("change");
        let snapshot = state.lock().expect("state");
        assert_eq!(snapshot.renders, 1);
        assert!(matches!(
            snapshot.mesh().map(|record| &record.kind),
            Some(ActorKind::Mesh {
                representation: Representation::Wireframe,
                ..
            })
        ));
    }

    #[test]
    fn label_visibility_before_layout_is_rejected() {
        let (mut scene, _) = composer();
        assert!(!scene
            .set_axis_label_visible(AxisKind::AscendingDiagonal, AxisEnd::Start, false)
            .expect("no backend error"));
    }
}
