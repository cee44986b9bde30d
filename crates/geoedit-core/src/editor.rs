//! The map editor: one draw surface shared by every geometry node of a form.

use crate::config::EditorConfig;
use crate::debounce::Debounce;
use crate::draw::{DrawEvent, DrawSurface, DrawSurfaceAdapter};
use crate::error::{EditorError, EditorResult};
use crate::extent::{InitialView, Padding, extent};
use crate::feature::{Feature, FeatureCollection, FeatureId, NodeId, generate_feature_id};
use crate::hint::Hint;
use crate::raw::RawGeoJsonBridge;
use crate::select::{
    FeatureFetcher, SelectCandidate, SelectSource, SelectableLayers, resolve_candidate,
};
use crate::store::FeatureStore;
use crate::tile::Tile;
use crate::tools::{
    DEFAULT_SELECT_TEXT, DrawTool, EditorState, NodeConfig, ToolController, ToolOption, draw_tools,
};
use serde_json::{Map, Value};
use std::time::Instant;

/// Edits the geometry nodes of one tile on a shared draw surface.
///
/// The tile is the source of truth: every create, update, delete and mode
/// change on the surface is flushed back into it immediately.
pub struct MapEditor<S: DrawSurface> {
    config: EditorConfig,
    nodes: Vec<NodeConfig>,
    store: FeatureStore,
    tools: ToolController<S>,
    raw: RawGeoJsonBridge,
    select_source: Option<SelectSource>,
    known_sources: Vec<String>,
    select_layers: SelectableLayers,
    popup_open: bool,
    provisional: Debounce<()>,
}

impl<S: DrawSurface> MapEditor<S> {
    /// Bind `nodes` to `tile` and load their features onto `surface`.
    pub fn new(
        config: EditorConfig,
        nodes: Vec<NodeConfig>,
        tile: Tile,
        surface: S,
    ) -> EditorResult<Self> {
        let ids: Vec<NodeId> = nodes.iter().map(|n| n.node_id.clone()).collect();
        let store = FeatureStore::bind(tile, &ids)?;

        let mut adapter = DrawSurfaceAdapter::new(surface, config.render_retry_limit);
        adapter.initialize(store.draw_features())?;
        log::info!("Map editor ready with {} node(s)", ids.len());

        Ok(Self {
            raw: RawGeoJsonBridge::new(config.validation_delay(), config.preview_delay()),
            provisional: Debounce::new(config.settle_delay()),
            tools: ToolController::new(adapter, &ids),
            config,
            nodes,
            store,
            select_source: None,
            known_sources: Vec::new(),
            select_layers: SelectableLayers::default(),
            popup_open: false,
        })
    }

    /// Configure the map sources features may be selected from.
    pub fn with_known_sources(mut self, sources: Vec<String>) -> Self {
        self.known_sources = sources;
        self.rebuild_select_layers();
        self
    }

    /// Change the select source, rebuilding the selectable layers.
    pub fn set_select_source(&mut self, source: Option<SelectSource>) {
        self.select_source = source;
        self.rebuild_select_layers();
    }

    fn rebuild_select_layers(&mut self) {
        let resource = self.store.tile().resourceinstance_id.as_deref();
        self.select_layers =
            SelectableLayers::new(resource, self.select_source.as_ref(), &self.known_sources);
    }

    // --- Queries ---------------------------------------------------------

    pub fn state(&self) -> &EditorState {
        self.tools.state()
    }

    pub fn tile(&self) -> &Tile {
        self.store.tile()
    }

    /// Mutable access for the owning form. Follow up with
    /// [`Self::tile_reset`] or [`Self::restore_provisional`].
    pub fn tile_mut(&mut self) -> &mut Tile {
        self.store.tile_mut()
    }

    pub fn into_tile(self) -> Tile {
        self.store.into_tile()
    }

    pub fn features_for_node(&self, node: &NodeId) -> EditorResult<&[Feature]> {
        self.store.features_for_node(node)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn tool(&self, node: &NodeId) -> Option<&DrawTool> {
        self.tools.tool(node)
    }

    pub fn selected_tool(&self) -> Option<&DrawTool> {
        self.tools.selected_tool()
    }

    pub fn selected_feature_ids(&self) -> &[FeatureId] {
        self.tools.selected_ids()
    }

    /// True while features are selected or a tool is active.
    pub fn editing(&self) -> bool {
        !self.tools.selected_ids().is_empty() || self.tools.selected_tool().is_some()
    }

    pub fn select_layers(&self) -> &SelectableLayers {
        &self.select_layers
    }

    pub fn select_layers_visible(&self) -> bool {
        self.tools.select_layers_visible()
    }

    /// Whether a rendered map layer belongs to the selectable set.
    pub fn is_selectable(&self, layer_id: &str) -> bool {
        self.select_layers.contains(layer_id)
    }

    /// Whether clicking a map feature should open its popup.
    pub fn is_feature_clickable(&self, feature: &Feature) -> bool {
        if matches!(self.selected_tool(), Some(tool) if *tool != DrawTool::SelectFeature) {
            return false;
        }
        feature
            .properties
            .get("resourceinstanceid")
            .is_some_and(|v| !v.is_null() && v != &Value::String(String::new()))
    }

    pub fn popup_open(&self) -> bool {
        self.popup_open
    }

    pub fn open_popup(&mut self) {
        self.popup_open = true;
    }

    pub fn surface(&self) -> &S {
        self.tools.surface().surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.tools.surface_mut().surface_mut()
    }

    /// Tool menu for a node.
    pub fn draw_tools(&self, node: &NodeId) -> EditorResult<Vec<ToolOption>> {
        let config = self
            .nodes
            .iter()
            .find(|n| &n.node_id == node)
            .ok_or_else(|| EditorError::UnknownNode(node.clone()))?;
        let select_text = self
            .select_source
            .as_ref()
            .map(|_| self.config.select_text.as_deref().unwrap_or(DEFAULT_SELECT_TEXT));
        Ok(draw_tools(
            config,
            select_text,
            &self.config.additional_draw_options,
        ))
    }

    /// Bounds to open the map on, if there is anything persisted.
    pub fn initial_view(&self) -> Option<InitialView> {
        let bounds = extent(&self.store.draw_features())?;
        let pad = self.config.fit_padding;
        let side = pad + self.config.fit_side_extra;
        Some(InitialView {
            bounds,
            padding: Padding {
                top: pad,
                right: side,
                bottom: pad,
                left: side,
            },
        })
    }

    /// Bounds that frame `features`.
    pub fn fit_features(&self, features: &[Feature]) -> Option<InitialView> {
        Some(InitialView {
            bounds: extent(features)?,
            padding: Padding::uniform(self.config.fit_padding),
        })
    }

    // --- Tools -----------------------------------------------------------

    /// Apply a tool menu choice. `None` is the empty "clear" entry.
    pub fn select_tool(&mut self, node: &NodeId, tool: Option<DrawTool>) -> EditorResult<()> {
        if self.raw.is_active() {
            log::info!("Discarding GeoJSON text to switch back to the map");
            self.cancel_geojson()?;
        }
        match tool {
            Some(tool) => self.tools.select_tool(node, tool),
            None => self.tools.clear_tool(node),
        }
    }

    // --- Surface events --------------------------------------------------

    /// Consume an event from the draw surface.
    pub fn handle_event(&mut self, event: DrawEvent) -> EditorResult<()> {
        log::debug!("Handling {}", event.name());
        if !self.tools.surface().is_attached() {
            return Err(EditorError::SurfaceDetached);
        }
        match event {
            DrawEvent::Create { features } => {
                let node = self
                    .tools
                    .pending_node()
                    .cloned()
                    .ok_or(EditorError::NoPendingNode)?;
                let ids = self.ensure_on_surface(features)?;
                // Stamp before flushing so no untagged feature reaches the tile.
                self.tools.surface_mut().stamp_node(&ids, &node)?;
                self.update_tiles()
            }
            DrawEvent::Update { .. } | DrawEvent::Delete { .. } => self.update_tiles(),
            DrawEvent::ModeChange { mode } => {
                self.tools.surface_mut().note_mode(mode);
                self.update_tiles()?;
                self.tools.set_select_layers_visible(false);
                Ok(())
            }
            DrawEvent::SelectionChange { feature_ids } => {
                let any = !feature_ids.is_empty();
                self.tools.set_selected_ids(feature_ids);
                if any {
                    self.tools.reset_tools();
                }
                self.tools.set_select_layers_visible(false);
                self.flush()
            }
        }
    }

    /// Ids of created features, adding any the surface does not hold yet.
    fn ensure_on_surface(&mut self, features: Vec<Feature>) -> EditorResult<Vec<FeatureId>> {
        let existing = self.tools.surface().get_all()?.ids();
        features
            .into_iter()
            .map(|feature| match &feature.id {
                Some(id) if existing.contains(id) => Ok(id.clone()),
                _ => self.tools.surface_mut().add(feature),
            })
            .collect()
    }

    /// Clear every tool and flush the surface into the tile.
    fn update_tiles(&mut self) -> EditorResult<()> {
        self.tools.reset_tools();
        self.flush()
    }

    fn flush(&mut self) -> EditorResult<()> {
        let collection = self.tools.surface().get_all()?;
        self.store.flush(&collection.features)
    }

    /// The owning form reset the tile: reload everything from it.
    pub fn tile_reset(&mut self) -> EditorResult<()> {
        log::info!("Tile reset, reloading features");
        self.store.rebind()?;
        self.rebuild_select_layers();
        if self.tools.surface().is_attached() {
            self.tools.reload(self.store.draw_features())?;
            for node in self.store.nodes() {
                if self.tools.tool(&node).is_some() {
                    self.tools.clear_tool(&node)?;
                }
            }
        }
        self.tools.reset_tools();
        Ok(())
    }

    // --- Feature list ----------------------------------------------------

    pub fn delete_feature(&mut self, id: &str) -> EditorResult<()> {
        if !self.tools.surface_mut().delete(id)? {
            log::warn!("Delete of unknown feature {}", id);
        }
        self.update_tiles()
    }

    /// Select a single feature for editing.
    pub fn edit_feature(&mut self, id: &str) -> EditorResult<()> {
        self.tools.show_selection(vec![id.to_string()])
    }

    // --- Raw GeoJSON -----------------------------------------------------

    /// Open the raw text editor for `node` with its current features.
    pub fn edit_geojson(&mut self, node: &NodeId, now: Instant) -> EditorResult<()> {
        let features = self.store.features_for_node(node)?.to_vec();
        self.edit_geojson_features(&features, node, now)
    }

    /// Open the raw text editor for `node` with `features` as the text.
    pub fn edit_geojson_features(
        &mut self,
        features: &[Feature],
        node: &NodeId,
        now: Instant,
    ) -> EditorResult<()> {
        let text = FeatureCollection::new(features.to_vec()).to_pretty_string();
        self.tools.begin_raw_text(node)?;
        self.raw.set_buffer(node.clone(), text, now);
        Ok(())
    }

    /// The user typed into the raw text editor.
    pub fn set_geojson_text(&mut self, text: String, now: Instant) -> EditorResult<()> {
        if !self.raw.is_active() {
            return Err(EditorError::NoPendingNode);
        }
        self.raw.edit(text, now);
        Ok(())
    }

    pub fn geojson_text(&self) -> Option<&str> {
        self.raw.buffer()
    }

    /// Debounced lint errors of the raw text.
    pub fn geojson_errors(&self) -> &[Hint] {
        self.raw.errors()
    }

    /// Immediate lint errors of the raw text.
    pub fn validate_geojson(&self) -> Vec<Hint> {
        self.raw.validate()
    }

    /// Current content of the preview source.
    pub fn preview(&self) -> &FeatureCollection {
        self.raw.preview()
    }

    /// Commit the raw text. Returns false if it has errors.
    pub fn update_geojson(&mut self) -> EditorResult<bool> {
        if !self.raw.commit(&mut self.store)? {
            return Ok(false);
        }
        self.tools.end_raw_text(self.store.draw_features())?;
        Ok(true)
    }

    /// Close the raw text editor without committing.
    pub fn cancel_geojson(&mut self) -> EditorResult<()> {
        self.raw.clear();
        self.tools.end_raw_text(self.store.draw_features())
    }

    // --- Selection from the external layer --------------------------------

    /// Copy a picked feature into the pending node.
    pub async fn select_feature<F>(
        &mut self,
        candidate: &SelectCandidate,
        fetcher: &F,
    ) -> EditorResult<Vec<FeatureId>>
    where
        F: FeatureFetcher + ?Sized,
    {
        let base = self.config.select_base_url.clone();
        let features = resolve_candidate(candidate, base.as_ref(), fetcher).await?;
        self.add_select_features(features)
    }

    /// Insert resolved features under the pending node and select them.
    ///
    /// Each feature gets a new id and its properties are replaced by the
    /// node tag alone.
    pub fn add_select_features(&mut self, features: Vec<Feature>) -> EditorResult<Vec<FeatureId>> {
        let node = self
            .tools
            .pending_node()
            .cloned()
            .ok_or(EditorError::NoPendingNode)?;

        let mut ids = Vec::with_capacity(features.len());
        for mut feature in features {
            feature.id = Some(generate_feature_id());
            feature.properties = Map::new();
            feature.set_node_id(&node);
            ids.push(self.tools.surface_mut().add(feature)?);
        }
        log::info!("Copied {} selected feature(s) into node {}", ids.len(), node);

        self.update_tiles()?;
        self.popup_open = false;
        self.tools.show_selection(ids.clone())?;
        self.tools.set_select_layers_visible(false);
        Ok(ids)
    }

    // --- Timers ----------------------------------------------------------

    /// A provisional edit was restored into the tile; redisplay it once the
    /// surface has settled.
    pub fn restore_provisional(&mut self, now: Instant) {
        self.provisional.schedule((), now);
    }

    /// Run due timers.
    pub fn poll(&mut self, now: Instant) -> EditorResult<()> {
        if let Some(preview) = self.raw.poll(now) {
            log::debug!("Preview shows {} feature(s)", preview.features.len());
        }
        if self.provisional.poll(now).is_some() {
            self.store.rebind()?;
            if self.tools.surface().is_attached() {
                self.tools.reload(self.store.draw_features())?;
            }
        }
        Ok(())
    }
}
