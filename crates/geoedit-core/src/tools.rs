//! Tool system: which node is being edited and how.

use crate::draw::{DrawSurface, DrawSurfaceAdapter, SurfaceMode};
use crate::error::{EditorError, EditorResult};
use crate::feature::{Feature, FeatureCollection, FeatureId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tool value that copies a feature from the selectable layer.
pub const SELECT_FEATURE: &str = "select_feature";

/// Default label of the select-feature tool.
pub const DEFAULT_SELECT_TEXT: &str = "Select drawing";

/// Geometry a node accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    Line,
    Polygon,
}

/// Declaration of a geometry node by the enclosing form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: NodeId,
    #[serde(default)]
    pub geometry_types: Vec<GeometryType>,
}

impl NodeConfig {
    pub fn new(node_id: impl Into<NodeId>, geometry_types: Vec<GeometryType>) -> Self {
        Self {
            node_id: node_id.into(),
            geometry_types,
        }
    }
}

/// An entry in a node's tool menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOption {
    pub value: String,
    pub text: String,
}

impl ToolOption {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// A drawing tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawTool {
    Point,
    Line,
    Polygon,
    /// Pick an existing feature from the selectable layer.
    SelectFeature,
    /// A surface mode contributed through additional draw options.
    Custom(String),
}

impl DrawTool {
    /// Parse a tool menu value. The empty value is the "clear" entry and
    /// yields `None`.
    pub fn from_value(value: &str) -> Option<Self> {
        Some(match value {
            "" => return None,
            "draw_point" => DrawTool::Point,
            "draw_line_string" => DrawTool::Line,
            "draw_polygon" => DrawTool::Polygon,
            SELECT_FEATURE => DrawTool::SelectFeature,
            other => DrawTool::Custom(other.to_string()),
        })
    }

    pub fn value(&self) -> &str {
        match self {
            DrawTool::Point => "draw_point",
            DrawTool::Line => "draw_line_string",
            DrawTool::Polygon => "draw_polygon",
            DrawTool::SelectFeature => SELECT_FEATURE,
            DrawTool::Custom(value) => value.as_str(),
        }
    }

    /// The surface mode that implements this tool.
    pub fn surface_mode(&self) -> SurfaceMode {
        match self {
            DrawTool::Point => SurfaceMode::DrawPoint,
            DrawTool::Line => SurfaceMode::DrawLineString,
            DrawTool::Polygon => SurfaceMode::DrawPolygon,
            DrawTool::SelectFeature => SurfaceMode::neutral(),
            DrawTool::Custom(name) => SurfaceMode::Custom { name: name.clone() },
        }
    }
}

impl From<GeometryType> for DrawTool {
    fn from(geometry: GeometryType) -> Self {
        match geometry {
            GeometryType::Point => DrawTool::Point,
            GeometryType::Line => DrawTool::Line,
            GeometryType::Polygon => DrawTool::Polygon,
        }
    }
}

/// Build the tool menu for a node.
///
/// The menu starts with the empty "clear" entry, lists one drawing tool per
/// accepted geometry, offers the select-feature tool when a select source
/// is configured and ends with any additional options.
pub fn draw_tools(
    node: &NodeConfig,
    select_text: Option<&str>,
    additional: &[ToolOption],
) -> Vec<ToolOption> {
    let mut options = vec![ToolOption::new("", "")];
    options.extend(node.geometry_types.iter().map(|geometry| {
        let text = match geometry {
            GeometryType::Point => "Add point",
            GeometryType::Line => "Add line",
            GeometryType::Polygon => "Add polygon",
        };
        ToolOption::new(DrawTool::from(*geometry).value(), text)
    }));
    if let Some(text) = select_text {
        options.push(ToolOption::new(SELECT_FEATURE, text));
    }
    options.extend(additional.iter().cloned());
    options
}

/// What the editor is doing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditorState {
    #[default]
    Idle,
    Drawing { node: NodeId, tool: DrawTool },
    Selecting { node: NodeId },
    EditingRawText { node: NodeId },
}

impl EditorState {
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            EditorState::Idle => None,
            EditorState::Drawing { node, .. }
            | EditorState::Selecting { node }
            | EditorState::EditingRawText { node } => Some(node),
        }
    }
}

/// Owns the draw surface and enforces that only one node is edited at a time.
#[derive(Debug)]
pub struct ToolController<S: DrawSurface> {
    surface: DrawSurfaceAdapter<S>,
    tools: BTreeMap<NodeId, Option<DrawTool>>,
    state: EditorState,
    /// Node that new features are stamped with.
    pending_node: Option<NodeId>,
    selected_ids: Vec<FeatureId>,
    select_layers_visible: bool,
}

impl<S: DrawSurface> ToolController<S> {
    pub fn new(surface: DrawSurfaceAdapter<S>, nodes: &[NodeId]) -> Self {
        Self {
            surface,
            tools: nodes.iter().map(|n| (n.clone(), None)).collect(),
            state: EditorState::Idle,
            pending_node: None,
            selected_ids: Vec::new(),
            select_layers_visible: false,
        }
    }

    /// Make `node` the only node with a tool. Every transition goes
    /// through here.
    fn enter(&mut self, node: &NodeId, tool: Option<DrawTool>) -> EditorResult<()> {
        if !self.tools.contains_key(node) {
            return Err(EditorError::UnknownNode(node.clone()));
        }
        for (id, selected) in self.tools.iter_mut() {
            *selected = if id == node { tool.clone() } else { None };
        }
        self.pending_node = Some(node.clone());
        Ok(())
    }

    /// Activate a tool for a node.
    pub fn select_tool(&mut self, node: &NodeId, tool: DrawTool) -> EditorResult<()> {
        if !self.surface.is_attached() {
            return Err(EditorError::SurfaceDetached);
        }
        self.enter(node, Some(tool.clone()))?;
        log::debug!("Node {} selected tool {}", node, tool.value());

        if tool == DrawTool::SelectFeature {
            self.surface.set_mode(SurfaceMode::neutral())?;
            self.selected_ids.clear();
            self.select_layers_visible = true;
            self.state = EditorState::Selecting { node: node.clone() };
        } else {
            self.select_layers_visible = false;
            self.surface.set_mode(tool.surface_mode())?;
            self.state = EditorState::Drawing {
                node: node.clone(),
                tool,
            };
        }
        Ok(())
    }

    /// The user picked the empty tool: drop unfinished geometry and return
    /// to neutral selection.
    ///
    /// Clearing a node that holds no active tool leaves the surface and
    /// whichever node is active alone.
    pub fn clear_tool(&mut self, node: &NodeId) -> EditorResult<()> {
        let active = matches!(
            &self.state,
            EditorState::Drawing { node: n, .. } | EditorState::Selecting { node: n } if n == node
        );
        if !active {
            let selected = self
                .tools
                .get_mut(node)
                .ok_or_else(|| EditorError::UnknownNode(node.clone()))?;
            *selected = None;
            return Ok(());
        }
        self.enter(node, None)?;
        self.surface.trash()?;
        self.surface.set_mode(SurfaceMode::neutral())?;
        self.select_layers_visible = false;
        self.state = EditorState::Idle;
        log::debug!("Node {} cleared its tool", node);
        Ok(())
    }

    /// Clear every node's tool without touching the surface.
    ///
    /// Raw text editing is not a tool and survives.
    pub fn reset_tools(&mut self) {
        for selected in self.tools.values_mut() {
            *selected = None;
        }
        if matches!(
            self.state,
            EditorState::Drawing { .. } | EditorState::Selecting { .. }
        ) {
            self.state = EditorState::Idle;
        }
    }

    /// Detach the surface and hand the node over to the raw text editor.
    pub fn begin_raw_text(&mut self, node: &NodeId) -> EditorResult<()> {
        self.enter(node, None)?;
        self.surface.detach();
        self.selected_ids.clear();
        self.select_layers_visible = false;
        self.state = EditorState::EditingRawText { node: node.clone() };
        Ok(())
    }

    /// Reattach the surface with `features` after raw text editing ends.
    pub fn end_raw_text(&mut self, features: Vec<Feature>) -> EditorResult<()> {
        self.surface.initialize(features)?;
        self.select_layers_visible = false;
        if matches!(self.state, EditorState::EditingRawText { .. }) {
            self.state = EditorState::Idle;
        }
        Ok(())
    }

    /// Leave selection with the given features highlighted.
    pub fn show_selection(&mut self, ids: Vec<FeatureId>) -> EditorResult<()> {
        self.surface.set_mode(SurfaceMode::SimpleSelect {
            feature_ids: ids.clone(),
        })?;
        self.selected_ids = ids;
        self.reset_tools();
        Ok(())
    }

    /// Reload the surface from `features`, e.g. after a tile reset.
    pub fn reload(&mut self, features: Vec<Feature>) -> EditorResult<()> {
        self.surface.render(&FeatureCollection::new(features))
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn tool(&self, node: &NodeId) -> Option<&DrawTool> {
        self.tools.get(node).and_then(Option::as_ref)
    }

    /// The active tool of whichever node has one.
    pub fn selected_tool(&self) -> Option<&DrawTool> {
        self.tools.values().find_map(Option::as_ref)
    }

    pub fn pending_node(&self) -> Option<&NodeId> {
        self.pending_node.as_ref()
    }

    pub fn selected_ids(&self) -> &[FeatureId] {
        &self.selected_ids
    }

    pub fn set_selected_ids(&mut self, ids: Vec<FeatureId>) {
        self.selected_ids = ids;
    }

    pub fn select_layers_visible(&self) -> bool {
        self.select_layers_visible
    }

    pub fn set_select_layers_visible(&mut self, visible: bool) {
        self.select_layers_visible = visible;
    }

    pub fn surface(&self) -> &DrawSurfaceAdapter<S> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut DrawSurfaceAdapter<S> {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::MemoryDrawSurface;
    use serde_json::json;

    fn controller() -> ToolController<MemoryDrawSurface> {
        let mut surface = DrawSurfaceAdapter::new(MemoryDrawSurface::new(), 1);
        surface.initialize(Vec::new()).unwrap();
        ToolController::new(surface, &["a".into(), "b".into()])
    }

    /// The surface mode must be the one the controller's state implies.
    fn assert_in_sync(tc: &ToolController<MemoryDrawSurface>) {
        let mode = tc.surface().surface().mode();
        assert_eq!(tc.surface().mode(), mode);
        match tc.state() {
            EditorState::Drawing { tool, .. } => assert_eq!(mode, &tool.surface_mode()),
            EditorState::Idle | EditorState::Selecting { .. } => assert!(!mode.is_drawing()),
            EditorState::EditingRawText { .. } => assert!(!tc.surface().is_attached()),
        }
    }

    #[test]
    fn test_tool_menu() {
        let node = NodeConfig::new("a", vec![GeometryType::Point, GeometryType::Polygon]);
        let extra = [ToolOption::new("draw_circle", "Add circle")];
        let menu = draw_tools(&node, Some(DEFAULT_SELECT_TEXT), &extra);
        let values: Vec<_> = menu.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["", "draw_point", "draw_polygon", "select_feature", "draw_circle"]
        );
        assert_eq!(menu[1].text, "Add point");
        assert_eq!(menu[3].text, "Select drawing");
    }

    #[test]
    fn test_tool_menu_without_select_source() {
        let node = NodeConfig::new("a", vec![GeometryType::Line]);
        let menu = draw_tools(&node, None, &[]);
        assert_eq!(
            menu,
            vec![
                ToolOption::new("", ""),
                ToolOption::new("draw_line_string", "Add line"),
            ]
        );
    }

    #[test]
    fn test_tool_values_round_trip() {
        assert_eq!(DrawTool::from_value(""), None);
        for tool in [DrawTool::Point, DrawTool::Line, DrawTool::Polygon, DrawTool::SelectFeature] {
            assert_eq!(DrawTool::from_value(tool.value()), Some(tool));
        }
        assert_eq!(
            DrawTool::from_value("draw_circle"),
            Some(DrawTool::Custom("draw_circle".into()))
        );
    }

    #[test]
    fn test_select_tool_enters_drawing() {
        let mut tc = controller();
        tc.select_tool(&"a".into(), DrawTool::Point).unwrap();
        assert_eq!(
            tc.state(),
            &EditorState::Drawing {
                node: "a".into(),
                tool: DrawTool::Point
            }
        );
        assert_eq!(tc.surface().mode(), &SurfaceMode::DrawPoint);
        assert_eq!(tc.pending_node(), Some(&"a".into()));
    }

    #[test]
    fn test_tools_are_mutually_exclusive() {
        let mut tc = controller();
        tc.select_tool(&"a".into(), DrawTool::Point).unwrap();
        tc.select_tool(&"b".into(), DrawTool::Polygon).unwrap();
        assert_eq!(tc.tool(&"a".into()), None);
        assert_eq!(tc.tool(&"b".into()), Some(&DrawTool::Polygon));
        assert_eq!(tc.selected_tool(), Some(&DrawTool::Polygon));

        tc.select_tool(&"a".into(), DrawTool::SelectFeature).unwrap();
        assert_eq!(tc.tool(&"b".into()), None);
        assert_eq!(tc.state(), &EditorState::Selecting { node: "a".into() });
        assert!(tc.select_layers_visible());
    }

    #[test]
    fn test_drawing_hides_select_layers() {
        let mut tc = controller();
        tc.select_tool(&"a".into(), DrawTool::SelectFeature).unwrap();
        tc.select_tool(&"a".into(), DrawTool::Line).unwrap();
        assert!(!tc.select_layers_visible());
    }

    #[test]
    fn test_clear_tool_discards_sketch() {
        let mut tc = controller();
        tc.select_tool(&"a".into(), DrawTool::Polygon).unwrap();
        tc.surface_mut()
            .surface_mut()
            .sketch(Feature::new(json!({"type": "Polygon", "coordinates": []})));

        tc.clear_tool(&"a".into()).unwrap();
        assert_eq!(tc.state(), &EditorState::Idle);
        assert!(!tc.surface().surface().has_sketch());
        assert_eq!(tc.surface().mode(), &SurfaceMode::neutral());
    }

    #[test]
    fn test_clearing_another_node_keeps_drawing() {
        let mut tc = controller();
        tc.select_tool(&"a".into(), DrawTool::Point).unwrap();
        tc.surface_mut()
            .surface_mut()
            .sketch(Feature::new(json!({"type": "Point", "coordinates": [0, 0]})));

        tc.clear_tool(&"b".into()).unwrap();
        assert_eq!(
            tc.state(),
            &EditorState::Drawing {
                node: "a".into(),
                tool: DrawTool::Point
            }
        );
        assert_eq!(tc.tool(&"a".into()), Some(&DrawTool::Point));
        assert!(tc.surface().surface().has_sketch());
        assert_in_sync(&tc);

        tc.clear_tool(&"a".into()).unwrap();
        assert_eq!(tc.state(), &EditorState::Idle);
        assert!(!tc.surface().surface().has_sketch());
        assert_in_sync(&tc);

        assert!(matches!(
            tc.clear_tool(&"zzz".into()),
            Err(EditorError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_state_and_surface_agree() {
        let mut tc = controller();
        assert_in_sync(&tc);
        tc.select_tool(&"a".into(), DrawTool::Polygon).unwrap();
        assert_in_sync(&tc);
        tc.select_tool(&"b".into(), DrawTool::SelectFeature).unwrap();
        assert_in_sync(&tc);
        tc.select_tool(&"b".into(), DrawTool::Line).unwrap();
        assert_in_sync(&tc);
        tc.clear_tool(&"a".into()).unwrap();
        assert_in_sync(&tc);
        tc.begin_raw_text(&"a".into()).unwrap();
        assert_in_sync(&tc);
        tc.end_raw_text(Vec::new()).unwrap();
        assert_in_sync(&tc);
        tc.show_selection(vec!["f1".into()]).unwrap();
        assert_in_sync(&tc);
    }

    #[test]
    fn test_raw_text_reattaches_in_neutral_mode() {
        let mut tc = controller();
        tc.select_tool(&"a".into(), DrawTool::Point).unwrap();
        tc.begin_raw_text(&"a".into()).unwrap();
        tc.end_raw_text(Vec::new()).unwrap();

        assert_eq!(tc.state(), &EditorState::Idle);
        assert_eq!(tc.selected_tool(), None);
        assert_eq!(tc.surface().surface().mode(), &SurfaceMode::neutral());
        assert_in_sync(&tc);
    }

    #[test]
    fn test_unknown_node_is_rejected() {
        let mut tc = controller();
        let result = tc.select_tool(&"zzz".into(), DrawTool::Point);
        assert!(matches!(result, Err(EditorError::UnknownNode(_))));
    }

    #[test]
    fn test_raw_text_detaches_surface() {
        let mut tc = controller();
        tc.select_tool(&"b".into(), DrawTool::Point).unwrap();
        tc.begin_raw_text(&"a".into()).unwrap();
        assert!(!tc.surface().is_attached());
        assert_eq!(tc.tool(&"b".into()), None);
        assert_eq!(tc.state(), &EditorState::EditingRawText { node: "a".into() });

        // No drawing while the surface is detached.
        let result = tc.select_tool(&"a".into(), DrawTool::Point);
        assert!(matches!(result, Err(EditorError::SurfaceDetached)));

        // Tool resets do not end raw editing.
        tc.reset_tools();
        assert_eq!(tc.state(), &EditorState::EditingRawText { node: "a".into() });

        tc.end_raw_text(Vec::new()).unwrap();
        assert!(tc.surface().is_attached());
        assert_eq!(tc.state(), &EditorState::Idle);
    }

    #[test]
    fn test_show_selection_resets_tools() {
        let mut tc = controller();
        tc.select_tool(&"a".into(), DrawTool::SelectFeature).unwrap();
        tc.show_selection(vec!["f1".into()]).unwrap();
        assert_eq!(tc.selected_tool(), None);
        assert_eq!(tc.selected_ids(), ["f1".to_string()]);
        assert_eq!(tc.state(), &EditorState::Idle);
    }
}
