//! Feature store: the per-node view over a tile's geometry fields.

use crate::error::{EditorError, EditorResult};
use crate::feature::{Feature, FeatureCollection, NodeId};
use crate::tile::{FieldKind, Tile, TileField};
use std::collections::BTreeMap;

/// A geometry node bound to its tile field.
#[derive(Debug, Clone)]
struct Binding {
    node: NodeId,
    kind: FieldKind,
}

fn resolve(tile: &Tile, nodes: &[NodeId]) -> EditorResult<Vec<Binding>> {
    nodes
        .iter()
        .map(|node| {
            let field = tile
                .field(node)
                .ok_or_else(|| EditorError::UnknownNode(node.clone()))?;
            let kind = field
                .kind()
                .ok_or_else(|| EditorError::IncompatibleTileField(node.clone()))?;
            Ok(Binding {
                node: node.clone(),
                kind,
            })
        })
        .collect()
}

/// Owns the tile while it is being edited and maps each node to its
/// feature collection.
///
/// Field shapes are resolved once in [`FeatureStore::bind`]; every later
/// write goes through the resolved [`FieldKind`].
#[derive(Debug, Clone)]
pub struct FeatureStore {
    tile: Tile,
    bindings: Vec<Binding>,
}

impl FeatureStore {
    /// Bind every node to its tile field.
    ///
    /// A node absent from the tile, or whose field is not a feature
    /// collection, is a configuration error.
    pub fn bind(tile: Tile, nodes: &[NodeId]) -> EditorResult<Self> {
        let bindings = resolve(&tile, nodes)?;
        Ok(Self { tile, bindings })
    }

    /// Re-resolve field shapes after the tile was replaced or reset.
    ///
    /// On error the previous bindings are kept.
    pub fn rebind(&mut self) -> EditorResult<()> {
        self.bindings = resolve(&self.tile, &self.nodes())?;
        Ok(())
    }

    /// Bound node ids, in configuration order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.bindings.iter().map(|b| b.node.clone()).collect()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.bindings.iter().any(|b| &b.node == node)
    }

    /// The features currently persisted for a node.
    pub fn features_for_node(&self, node: &NodeId) -> EditorResult<&[Feature]> {
        self.binding(node)?;
        Ok(self
            .tile
            .field(node)
            .map(TileField::features)
            .unwrap_or_default())
    }

    /// Every persisted feature, stamped for the draw surface.
    ///
    /// Features without an id get a fresh one and each carries the id of the
    /// node it was read from.
    pub fn draw_features(&self) -> Vec<Feature> {
        let mut out = Vec::new();
        for binding in &self.bindings {
            let Some(field) = self.tile.field(&binding.node) else {
                continue;
            };
            for feature in field.features() {
                let mut feature = feature.clone();
                feature.ensure_id();
                feature.set_node_id(&binding.node);
                out.push(feature);
            }
        }
        out
    }

    /// Partition `all` by owning node and write each partition to its field.
    ///
    /// Every bound node is written, so a node with no features ends up with
    /// an explicit empty collection. Features tagged with an unbound node
    /// (or untagged) are dropped.
    pub fn flush(&mut self, all: &[Feature]) -> EditorResult<()> {
        let mut partitions: BTreeMap<NodeId, Vec<Feature>> = self
            .bindings
            .iter()
            .map(|b| (b.node.clone(), Vec::new()))
            .collect();

        for feature in all {
            match feature.node_id().and_then(|id| partitions.get_mut(&NodeId::new(id))) {
                Some(partition) => partition.push(feature.clone()),
                None => log::debug!(
                    "Dropping feature {:?} with unbound node {:?}",
                    feature.id,
                    feature.node_id()
                ),
            }
        }

        for (node, features) in partitions {
            log::debug!("Flushing {} feature(s) to node {}", features.len(), node);
            self.write(&node, features)?;
        }
        Ok(())
    }

    /// Replace one node's features, leaving every other node untouched.
    pub fn replace_node(&mut self, node: &NodeId, features: Vec<Feature>) -> EditorResult<()> {
        self.write(node, features)
    }

    fn write(&mut self, node: &NodeId, features: Vec<Feature>) -> EditorResult<()> {
        let kind = self.binding(node)?.kind;
        let field = self
            .tile
            .field_mut(node)
            .ok_or_else(|| EditorError::UnknownNode(node.clone()))?;

        match (kind, field) {
            (FieldKind::Observable, TileField::Observable(value)) => {
                *value = Some(FeatureCollection::new(features));
            }
            (FieldKind::Collection, TileField::Collection(collection)) => {
                collection.features = features;
            }
            _ => return Err(EditorError::FieldShapeChanged(node.clone())),
        }
        Ok(())
    }

    fn binding(&self, node: &NodeId) -> EditorResult<&Binding> {
        self.bindings
            .iter()
            .find(|b| &b.node == node)
            .ok_or_else(|| EditorError::UnknownNode(node.clone()))
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    /// Mutable access for the owning form. Call [`FeatureStore::rebind`]
    /// afterwards if a field's shape may have changed.
    pub fn tile_mut(&mut self) -> &mut Tile {
        &mut self.tile
    }

    pub fn into_tile(self) -> Tile {
        self.tile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(node: &str, x: f64) -> Feature {
        let mut f = Feature::new(json!({"type": "Point", "coordinates": [x, 0.0]}));
        f.ensure_id();
        f.set_node_id(&NodeId::new(node));
        f
    }

    fn store() -> FeatureStore {
        let tile = Tile::new()
            .with_field("a", TileField::Observable(None))
            .with_field("b", TileField::Collection(FeatureCollection::default()))
            .with_field("label", TileField::Other(json!("Site")));
        FeatureStore::bind(tile, &["a".into(), "b".into()]).unwrap()
    }

    #[test]
    fn test_bind_rejects_missing_node() {
        let result = FeatureStore::bind(Tile::new(), &["a".into()]);
        assert!(matches!(result, Err(EditorError::UnknownNode(_))));
    }

    #[test]
    fn test_bind_rejects_non_collection_field() {
        let tile = Tile::new().with_field("a", TileField::Other(json!(3)));
        let result = FeatureStore::bind(tile, &["a".into()]);
        assert!(matches!(result, Err(EditorError::IncompatibleTileField(_))));
    }

    #[test]
    fn test_flush_partitions_by_node() {
        let mut store = store();
        let features = vec![point("a", 1.0), point("b", 2.0), point("a", 3.0)];
        store.flush(&features).unwrap();

        let a = store.features_for_node(&"a".into()).unwrap();
        let b = store.features_for_node(&"b".into()).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert!(a.iter().all(|f| f.node_id() == Some("a")));
        assert_eq!(b[0], features[1]);
    }

    #[test]
    fn test_flush_writes_explicit_empty_collection() {
        let mut store = store();
        store.flush(&[point("b", 1.0)]).unwrap();
        assert_eq!(
            store.tile().field(&"a".into()),
            Some(&TileField::Observable(Some(FeatureCollection::default())))
        );
    }

    #[test]
    fn test_flush_is_idempotent() {
        let mut store = store();
        let features = vec![point("a", 1.0), point("b", 2.0)];
        store.flush(&features).unwrap();
        let first = store.tile().clone();
        store.flush(&features).unwrap();
        assert_eq!(store.tile(), &first);
    }

    #[test]
    fn test_flush_drops_unbound_features() {
        let mut store = store();
        store.flush(&[point("zzz", 1.0)]).unwrap();
        assert!(store.features_for_node(&"a".into()).unwrap().is_empty());
        assert!(store.features_for_node(&"b".into()).unwrap().is_empty());
    }

    #[test]
    fn test_flush_leaves_other_data_alone() {
        let mut store = store();
        store.flush(&[]).unwrap();
        assert_eq!(
            store.tile().field(&"label".into()),
            Some(&TileField::Other(json!("Site")))
        );
    }

    #[test]
    fn test_draw_features_stamps_ids_and_nodes() {
        let mut unstamped = Feature::new(json!({"type": "Point", "coordinates": [0, 0]}));
        unstamped.properties.insert("name".into(), json!("well"));
        let tile = Tile::new().with_field(
            "a",
            TileField::Collection(FeatureCollection::new(vec![unstamped])),
        );
        let store = FeatureStore::bind(tile, &["a".into()]).unwrap();

        let drawn = store.draw_features();
        assert_eq!(drawn.len(), 1);
        assert!(drawn[0].id.is_some());
        assert_eq!(drawn[0].node_id(), Some("a"));
        assert_eq!(drawn[0].properties.get("name"), Some(&json!("well")));
        // The tile itself is not modified.
        assert!(store.features_for_node(&"a".into()).unwrap()[0].id.is_none());
    }

    #[test]
    fn test_write_detects_shape_change() {
        let mut store = store();
        *store.tile_mut().field_mut(&"a".into()).unwrap() = TileField::Other(json!(1));
        let result = store.flush(&[]);
        assert!(matches!(result, Err(EditorError::FieldShapeChanged(_))));
        assert!(store.rebind().is_err());
    }
}
