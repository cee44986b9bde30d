//! GeoJSON features tagged with the form node that owns them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Property key stamped on every feature held by the draw surface.
pub const NODE_ID_PROPERTY: &str = "nodeId";

/// Identifier of a feature on the draw surface.
pub type FeatureId = String;

/// Generate a fresh feature id.
pub fn generate_feature_id() -> FeatureId {
    Uuid::new_v4().to_string()
}

/// Identifier of a form field ("node") that owns one feature collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

fn feature_kind() -> String {
    "Feature".to_string()
}

fn collection_kind() -> String {
    "FeatureCollection".to_string()
}

/// `"properties": null` is valid GeoJSON; treat it like an empty object.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Feature ids may be strings or numbers in GeoJSON; the surface keys by string.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<FeatureId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A single GeoJSON feature.
///
/// The geometry is kept as raw JSON so that whatever shape the tile
/// persisted is written back untouched. Unknown members (`bbox`, foreign
/// members) survive a round trip through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    #[serde(default, deserialize_with = "id_as_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    #[serde(default)]
    pub geometry: Value,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// Create a feature with no id and empty properties.
    pub fn new(geometry: Value) -> Self {
        Self {
            kind: feature_kind(),
            id: None,
            geometry,
            properties: Map::new(),
            extra: Map::new(),
        }
    }

    /// The owning node, if the feature has been stamped.
    pub fn node_id(&self) -> Option<&str> {
        self.properties.get(NODE_ID_PROPERTY).and_then(Value::as_str)
    }

    /// Tag the feature with its owning node.
    pub fn set_node_id(&mut self, node: &NodeId) {
        self.properties
            .insert(NODE_ID_PROPERTY.to_string(), Value::String(node.to_string()));
    }

    /// Assign an id if the feature has none. Returns the id.
    pub fn ensure_id(&mut self) -> &str {
        self.id.get_or_insert_with(generate_feature_id)
    }

    /// The GeoJSON geometry type (`"Point"`, `"Polygon"`, ...).
    pub fn geometry_type(&self) -> Option<&str> {
        self.geometry.get("type").and_then(Value::as_str)
    }
}

/// A GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_kind")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: collection_kind(),
            features,
            extra: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Ids of all features that have one.
    pub fn ids(&self) -> Vec<FeatureId> {
        self.features.iter().filter_map(|f| f.id.clone()).collect()
    }

    /// Pretty-print as the raw text shown in the GeoJSON editor.
    pub fn to_pretty_string(&self) -> String {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"   ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        match self.serialize(&mut ser) {
            Ok(()) => String::from_utf8(buf).unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to serialize feature collection: {}", e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_properties_become_empty() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [1, 2]},
            "properties": null
        }))
        .unwrap();
        assert!(feature.properties.is_empty());
        assert_eq!(feature.geometry_type(), Some("Point"));
    }

    #[test]
    fn test_node_stamping() {
        let mut feature = Feature::new(json!({"type": "Point", "coordinates": [0, 0]}));
        assert_eq!(feature.node_id(), None);
        feature.set_node_id(&NodeId::new("a"));
        assert_eq!(feature.node_id(), Some("a"));
    }

    #[test]
    fn test_numeric_id_is_kept_as_string() {
        let feature: Feature =
            serde_json::from_value(json!({"type": "Feature", "id": 7, "geometry": null})).unwrap();
        assert_eq!(feature.id.as_deref(), Some("7"));
    }

    #[test]
    fn test_ensure_id_is_stable() {
        let mut feature = Feature::new(Value::Null);
        let first = feature.ensure_id().to_string();
        let second = feature.ensure_id().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_foreign_members_survive() {
        let value = json!({
            "type": "Feature",
            "id": "f1",
            "bbox": [0, 0, 1, 1],
            "geometry": null,
            "properties": {"name": "x"}
        });
        let feature: Feature = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&feature).unwrap(), value);
    }

    #[test]
    fn test_pretty_string_uses_three_space_indent() {
        let text = FeatureCollection::default().to_pretty_string();
        assert!(text.contains("\n   \"type\""));
    }
}
