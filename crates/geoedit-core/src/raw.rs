//! Raw GeoJSON editing: paste, lint, preview and commit a node's features
//! as text.

use crate::debounce::Debounce;
use crate::error::{EditorError, EditorResult};
use crate::feature::{Feature, FeatureCollection, NodeId, generate_feature_id};
use crate::hint::{self, Hint};
use crate::store::FeatureStore;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Text buffer bridging the raw GeoJSON editor and the feature store.
///
/// Lint errors are recomputed `validation_delay` after the last edit and
/// the preview `preview_delay` after that, so fast typing only pays for
/// the final state.
#[derive(Debug, Clone)]
pub struct RawGeoJsonBridge {
    buffer: Option<String>,
    node: Option<NodeId>,
    errors: Vec<Hint>,
    validation: Debounce<()>,
    preview_timer: Debounce<()>,
    preview: FeatureCollection,
}

impl RawGeoJsonBridge {
    pub fn new(validation_delay: Duration, preview_delay: Duration) -> Self {
        Self {
            buffer: None,
            node: None,
            errors: Vec::new(),
            validation: Debounce::new(validation_delay),
            preview_timer: Debounce::new(preview_delay),
            preview: FeatureCollection::default(),
        }
    }

    /// Open the buffer for `node` with `text`.
    pub fn set_buffer(&mut self, node: NodeId, text: String, now: Instant) {
        self.node = Some(node);
        self.edit(text, now);
    }

    /// Replace the buffer text, keeping the node.
    pub fn edit(&mut self, text: String, now: Instant) {
        self.buffer = Some(text);
        self.validation.schedule((), now);
    }

    /// Close the buffer.
    pub fn clear(&mut self) {
        self.buffer = None;
        self.errors.clear();
        self.validation.cancel();
        self.preview_timer.cancel();
        self.preview = FeatureCollection::default();
    }

    pub fn is_active(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&str> {
        self.buffer.as_deref()
    }

    /// Node that committed features are written to.
    pub fn node(&self) -> Option<&NodeId> {
        self.node.as_ref()
    }

    /// Lint the buffer now, keeping only errors.
    pub fn validate(&self) -> Vec<Hint> {
        match &self.buffer {
            Some(text) => hint::errors(text),
            None => Vec::new(),
        }
    }

    /// Errors as of the last completed validation pass.
    pub fn errors(&self) -> &[Hint] {
        &self.errors
    }

    /// Current preview content.
    pub fn preview(&self) -> &FeatureCollection {
        &self.preview
    }

    /// Run due timers. Returns the new preview when it changes.
    pub fn poll(&mut self, now: Instant) -> Option<FeatureCollection> {
        if self.validation.poll(now).is_some() {
            self.errors = self.validate();
            self.preview_timer.schedule((), now);
        }
        self.preview_timer.poll(now)?;

        self.preview = match (&self.buffer, self.errors.is_empty()) {
            (Some(text), true) => parse_collection(text).unwrap_or_default(),
            _ => FeatureCollection::default(),
        };
        Some(self.preview.clone())
    }

    /// Write the buffer into the store if it lints clean.
    ///
    /// Every feature gets a fresh id and is tagged with the pending node.
    /// Returns false, leaving buffer and store untouched, when there is
    /// nothing to commit or the buffer has errors.
    pub fn commit(&mut self, store: &mut FeatureStore) -> EditorResult<bool> {
        let Some(text) = self.buffer.as_deref() else {
            return Ok(false);
        };
        let errors = self.validate();
        if !errors.is_empty() {
            log::debug!("Not committing GeoJSON with {} error(s)", errors.len());
            return Ok(false);
        }
        let node = self.node.clone().ok_or(EditorError::NoPendingNode)?;

        let mut collection = parse_collection(text)?;
        for feature in &mut collection.features {
            feature.id = Some(generate_feature_id());
            feature.set_node_id(&node);
        }
        log::info!(
            "Committing {} feature(s) from GeoJSON text to node {}",
            collection.features.len(),
            node
        );
        store.replace_node(&node, collection.features)?;
        self.clear();
        Ok(true)
    }
}

/// Parse GeoJSON text into a feature collection.
///
/// A lone feature or bare geometry is wrapped into a collection.
pub fn parse_collection(text: &str) -> EditorResult<FeatureCollection> {
    let value: Value = serde_json::from_str(text)?;
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => Ok(serde_json::from_value(value)?),
        Some("Feature") => Ok(FeatureCollection::new(vec![serde_json::from_value(value)?])),
        Some(_) => Ok(FeatureCollection::new(vec![Feature::new(value)])),
        None => Err(EditorError::InvalidGeoJson(
            "missing type member".to_string(),
        )),
    }
}
