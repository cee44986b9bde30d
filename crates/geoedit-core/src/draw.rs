//! Draw surface abstraction and the adapter that owns it.
//!
//! The surface is the interactive map-drawing component. It turns user
//! gestures into [`DrawEvent`]s, which the editor feeds back through
//! [`crate::MapEditor::handle_event`].

use crate::error::{EditorError, EditorResult, RenderError};
use crate::feature::{Feature, FeatureCollection, FeatureId, NodeId, NODE_ID_PROPERTY};
use crate::style::StyleState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Interaction mode of the draw surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SurfaceMode {
    /// Neutral mode; the listed features are selected.
    SimpleSelect {
        #[serde(default)]
        feature_ids: Vec<FeatureId>,
    },
    DrawPoint,
    DrawLineString,
    DrawPolygon,
    /// Features are displayed but not editable.
    #[default]
    Static,
    /// A mode contributed through additional draw options.
    Custom { name: String },
}

impl SurfaceMode {
    /// Neutral selection mode with nothing selected.
    pub fn neutral() -> Self {
        SurfaceMode::SimpleSelect {
            feature_ids: Vec::new(),
        }
    }

    /// The mode name as the drawing library spells it.
    pub fn name(&self) -> &str {
        match self {
            SurfaceMode::SimpleSelect { .. } => "simple_select",
            SurfaceMode::DrawPoint => "draw_point",
            SurfaceMode::DrawLineString => "draw_line_string",
            SurfaceMode::DrawPolygon => "draw_polygon",
            SurfaceMode::Static => "static",
            SurfaceMode::Custom { name } => name.as_str(),
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(
            self,
            SurfaceMode::DrawPoint | SurfaceMode::DrawLineString | SurfaceMode::DrawPolygon
        )
    }
}

/// Events emitted by the draw surface.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    /// `draw.create`: the user finished new features.
    Create { features: Vec<Feature> },
    /// `draw.update`: features were moved or reshaped.
    Update { features: Vec<Feature> },
    /// `draw.delete`: features were removed.
    Delete { features: Vec<Feature> },
    /// `draw.modechange`: the user switched modes on the surface itself.
    ModeChange { mode: SurfaceMode },
    /// `draw.selectionchange`: the set of selected features changed.
    SelectionChange { feature_ids: Vec<FeatureId> },
}

impl DrawEvent {
    /// The map event name.
    pub fn name(&self) -> &'static str {
        match self {
            DrawEvent::Create { .. } => "draw.create",
            DrawEvent::Update { .. } => "draw.update",
            DrawEvent::Delete { .. } => "draw.delete",
            DrawEvent::ModeChange { .. } => "draw.modechange",
            DrawEvent::SelectionChange { .. } => "draw.selectionchange",
        }
    }
}

/// An interactive drawing surface on the map.
pub trait DrawSurface {
    /// Replace every feature on the surface.
    fn set(&mut self, collection: &FeatureCollection) -> Result<(), RenderError>;

    /// Add a feature, assigning an id if it has none. Returns the id.
    fn add(&mut self, feature: Feature) -> FeatureId;

    /// Remove a feature. Returns false if it was not on the surface.
    fn delete(&mut self, id: &str) -> bool;

    /// Snapshot of every finished feature on the surface.
    fn get_all(&self) -> FeatureCollection;

    /// Switch interaction mode.
    fn change_mode(&mut self, mode: &SurfaceMode);

    /// Discard any unfinished geometry.
    fn trash(&mut self);

    /// Set a single property on a feature. Returns false if not found.
    fn set_feature_property(&mut self, id: &str, key: &str, value: Value) -> bool;
}

/// A headless draw surface that keeps features in memory.
///
/// Used for tests and for command-line editing where no map is rendered.
#[derive(Debug, Clone, Default)]
pub struct MemoryDrawSurface {
    features: Vec<Feature>,
    mode: SurfaceMode,
    sketch: Option<Feature>,
    failing_renders: u32,
}

impl MemoryDrawSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &SurfaceMode {
        &self.mode
    }

    /// Make the next `count` calls to `set` fail with a transient error.
    pub fn fail_next_renders(&mut self, count: u32) {
        self.failing_renders = count;
    }

    /// Start an unfinished geometry, as a user mid-gesture would.
    pub fn sketch(&mut self, feature: Feature) {
        self.sketch = Some(feature);
    }

    pub fn has_sketch(&self) -> bool {
        self.sketch.is_some()
    }

    /// Finish the current sketch, returning the `draw.create` event.
    pub fn finish_sketch(&mut self) -> Option<DrawEvent> {
        let feature = self.sketch.take()?;
        let id = self.add(feature);
        let created = self.features.iter().find(|f| f.id.as_deref() == Some(id.as_str()))?;
        Some(DrawEvent::Create {
            features: vec![created.clone()],
        })
    }

    /// How a feature is currently styled.
    pub fn style_state(&self, id: &str) -> Option<StyleState> {
        self.features.iter().find(|f| f.id.as_deref() == Some(id))?;
        Some(match &self.mode {
            SurfaceMode::Static => StyleState::Static,
            SurfaceMode::SimpleSelect { feature_ids } if feature_ids.iter().any(|f| f == id) => {
                StyleState::Active
            }
            _ => StyleState::Inactive,
        })
    }
}

impl DrawSurface for MemoryDrawSurface {
    fn set(&mut self, collection: &FeatureCollection) -> Result<(), RenderError> {
        if self.failing_renders > 0 {
            self.failing_renders -= 1;
            return Err(RenderError::Transient(
                "feature set changed during repaint".to_string(),
            ));
        }
        self.features = collection
            .features
            .iter()
            .cloned()
            .map(|mut f| {
                f.ensure_id();
                f
            })
            .collect();
        Ok(())
    }

    fn add(&mut self, mut feature: Feature) -> FeatureId {
        let id = feature.ensure_id().to_string();
        self.features.retain(|f| f.id.as_deref() != Some(id.as_str()));
        self.features.push(feature);
        id
    }

    fn delete(&mut self, id: &str) -> bool {
        let before = self.features.len();
        self.features.retain(|f| f.id.as_deref() != Some(id));
        self.features.len() != before
    }

    fn get_all(&self) -> FeatureCollection {
        FeatureCollection::new(self.features.clone())
    }

    fn change_mode(&mut self, mode: &SurfaceMode) {
        self.mode = mode.clone();
    }

    fn trash(&mut self) {
        self.sketch = None;
    }

    fn set_feature_property(&mut self, id: &str, key: &str, value: Value) -> bool {
        match self.features.iter_mut().find(|f| f.id.as_deref() == Some(id)) {
            Some(feature) => {
                feature.properties.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }
}

/// Owns the draw surface and guards it.
///
/// The surface can be detached from the map (while the raw GeoJSON editor
/// is open); every operation on a detached surface fails with
/// [`EditorError::SurfaceDetached`].
#[derive(Debug)]
pub struct DrawSurfaceAdapter<S: DrawSurface> {
    surface: S,
    attached: bool,
    mode: SurfaceMode,
    retry_limit: u32,
}

impl<S: DrawSurface> DrawSurfaceAdapter<S> {
    /// Wrap a surface. It starts detached; call [`Self::initialize`].
    pub fn new(surface: S, retry_limit: u32) -> Self {
        Self {
            surface,
            attached: false,
            mode: SurfaceMode::neutral(),
            retry_limit,
        }
    }

    /// Attach the surface and load the initial features.
    pub fn initialize(&mut self, features: Vec<Feature>) -> EditorResult<()> {
        self.attached = true;
        self.surface.change_mode(&self.mode);
        self.render(&FeatureCollection::new(features))
    }

    /// Remove the surface from the map. It comes back in neutral mode.
    pub fn detach(&mut self) {
        if self.attached {
            log::debug!("Detaching draw surface");
            self.surface.trash();
            self.attached = false;
        }
        self.mode = SurfaceMode::neutral();
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Replace the features on the surface.
    ///
    /// Transient render errors are logged and retried up to the retry
    /// limit, then ignored; the previous surface content stays in place.
    pub fn render(&mut self, collection: &FeatureCollection) -> EditorResult<()> {
        self.ensure_attached()?;
        let mut attempt = 0;
        loop {
            match self.surface.set(collection) {
                Ok(()) => return Ok(()),
                Err(RenderError::Transient(msg)) => {
                    attempt += 1;
                    log::warn!("Transient render error (attempt {}): {}", attempt, msg);
                    if attempt > self.retry_limit {
                        log::warn!("Giving up on repaint after {} attempt(s)", attempt);
                        return Ok(());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Switch the surface mode.
    pub fn set_mode(&mut self, mode: SurfaceMode) -> EditorResult<()> {
        self.ensure_attached()?;
        log::debug!("Surface mode -> {}", mode.name());
        self.surface.change_mode(&mode);
        self.mode = mode;
        Ok(())
    }

    /// Record a mode the surface switched to on its own.
    pub(crate) fn note_mode(&mut self, mode: SurfaceMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> &SurfaceMode {
        &self.mode
    }

    pub fn add(&mut self, feature: Feature) -> EditorResult<FeatureId> {
        self.ensure_attached()?;
        Ok(self.surface.add(feature))
    }

    pub fn delete(&mut self, id: &str) -> EditorResult<bool> {
        self.ensure_attached()?;
        Ok(self.surface.delete(id))
    }

    pub fn get_all(&self) -> EditorResult<FeatureCollection> {
        self.ensure_attached()?;
        Ok(self.surface.get_all())
    }

    /// Discard unfinished geometry.
    pub fn trash(&mut self) -> EditorResult<()> {
        self.ensure_attached()?;
        self.surface.trash();
        Ok(())
    }

    /// Tag features with their owning node.
    pub fn stamp_node(&mut self, ids: &[FeatureId], node: &NodeId) -> EditorResult<()> {
        self.ensure_attached()?;
        for id in ids {
            let value = Value::String(node.to_string());
            if !self.surface.set_feature_property(id, NODE_ID_PROPERTY, value) {
                log::warn!("Cannot stamp node on unknown feature {}", id);
            }
        }
        Ok(())
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn ensure_attached(&self) -> EditorResult<()> {
        if self.attached {
            Ok(())
        } else {
            Err(EditorError::SurfaceDetached)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point() -> Feature {
        Feature::new(json!({"type": "Point", "coordinates": [1, 2]}))
    }

    fn adapter() -> DrawSurfaceAdapter<MemoryDrawSurface> {
        let mut adapter = DrawSurfaceAdapter::new(MemoryDrawSurface::new(), 1);
        adapter.initialize(Vec::new()).unwrap();
        adapter
    }

    #[test]
    fn test_add_assigns_id() {
        let mut adapter = adapter();
        let id = adapter.add(point()).unwrap();
        let all = adapter.get_all().unwrap();
        assert_eq!(all.ids(), vec![id]);
    }

    #[test]
    fn test_delete() {
        let mut adapter = adapter();
        let id = adapter.add(point()).unwrap();
        assert!(adapter.delete(&id).unwrap());
        assert!(!adapter.delete(&id).unwrap());
        assert!(adapter.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_stamp_node() {
        let mut adapter = adapter();
        let id = adapter.add(point()).unwrap();
        adapter.stamp_node(&[id], &NodeId::new("n1")).unwrap();
        assert_eq!(adapter.get_all().unwrap().features[0].node_id(), Some("n1"));
    }

    #[test]
    fn test_transient_render_error_is_retried() {
        let mut adapter = adapter();
        adapter.surface_mut().fail_next_renders(1);
        adapter
            .render(&FeatureCollection::new(vec![point()]))
            .unwrap();
        assert_eq!(adapter.get_all().unwrap().features.len(), 1);
    }

    #[test]
    fn test_transient_render_error_is_bounded() {
        let mut adapter = adapter();
        adapter.add(point()).unwrap();
        adapter.surface_mut().fail_next_renders(5);
        // Gives up without error and keeps the previous content.
        adapter.render(&FeatureCollection::default()).unwrap();
        assert_eq!(adapter.get_all().unwrap().features.len(), 1);
    }

    #[test]
    fn test_detached_surface_rejects_operations() {
        let mut adapter = adapter();
        adapter.detach();
        assert!(matches!(adapter.get_all(), Err(EditorError::SurfaceDetached)));
        assert!(matches!(adapter.add(point()), Err(EditorError::SurfaceDetached)));
    }

    #[test]
    fn test_reattach_is_neutral() {
        let mut adapter = adapter();
        adapter.set_mode(SurfaceMode::DrawPolygon).unwrap();
        adapter.detach();
        adapter.initialize(vec![point()]).unwrap();
        assert_eq!(adapter.mode(), &SurfaceMode::neutral());
        assert_eq!(adapter.surface().mode(), &SurfaceMode::neutral());
    }

    #[test]
    fn test_trash_discards_sketch() {
        let mut adapter = adapter();
        adapter.surface_mut().sketch(point());
        adapter.trash().unwrap();
        assert!(!adapter.surface().has_sketch());
        assert!(adapter.surface_mut().finish_sketch().is_none());
    }

    #[test]
    fn test_style_state_follows_mode() {
        let mut adapter = adapter();
        let id = adapter.add(point()).unwrap();
        assert_eq!(adapter.surface().style_state(&id), Some(StyleState::Inactive));

        adapter.set_mode(SurfaceMode::Static).unwrap();
        assert_eq!(adapter.surface().style_state(&id), Some(StyleState::Static));

        adapter
            .set_mode(SurfaceMode::SimpleSelect {
                feature_ids: vec![id.clone()],
            })
            .unwrap();
        assert_eq!(adapter.surface().style_state(&id), Some(StyleState::Active));

        adapter.set_mode(SurfaceMode::DrawPoint).unwrap();
        assert_eq!(adapter.surface().style_state(&id), Some(StyleState::Inactive));
    }
}
