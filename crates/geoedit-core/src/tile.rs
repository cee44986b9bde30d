//! Tiles: the persisted per-form records that own each node's features.

use crate::feature::{Feature, FeatureCollection, NodeId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// The value a tile holds for one node.
///
/// A geometry node is either a replaceable value (written by swapping the
/// whole collection) or a collection whose `features` are mutated in place.
/// Non-geometry nodes are carried through untouched as `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum TileField {
    /// Replaceable value. `None` until the first write.
    Observable(Option<FeatureCollection>),
    /// A collection whose feature list is edited in place.
    Collection(FeatureCollection),
    /// Any other tile data.
    Other(Value),
}

/// How a bound geometry field is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Observable,
    Collection,
}

impl TileField {
    /// Classify the field once, at binding time.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            TileField::Observable(_) => Some(FieldKind::Observable),
            TileField::Collection(_) => Some(FieldKind::Collection),
            TileField::Other(_) => None,
        }
    }

    /// The features currently held, empty for an unset value.
    pub fn features(&self) -> &[Feature] {
        match self {
            TileField::Observable(Some(collection)) | TileField::Collection(collection) => {
                &collection.features
            }
            TileField::Observable(None) | TileField::Other(_) => &[],
        }
    }
}

impl Serialize for TileField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TileField::Observable(value) => value.serialize(serializer),
            TileField::Collection(collection) => collection.serialize(serializer),
            TileField::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TileField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(TileField::Observable(None));
        }
        if value.get("features").is_some_and(Value::is_array) {
            if let Ok(collection) = serde_json::from_value::<FeatureCollection>(value.clone()) {
                return Ok(TileField::Collection(collection));
            }
        }
        Ok(TileField::Other(value))
    }
}

/// A persisted form record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tileid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resourceinstance_id: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<NodeId, TileField>,
}

impl Tile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper for setting a node's field.
    pub fn with_field(mut self, node: impl Into<NodeId>, field: TileField) -> Self {
        self.data.insert(node.into(), field);
        self
    }

    pub fn field(&self, node: &NodeId) -> Option<&TileField> {
        self.data.get(node)
    }

    pub fn field_mut(&mut self, node: &NodeId) -> Option<&mut TileField> {
        self.data.get_mut(node)
    }
}
