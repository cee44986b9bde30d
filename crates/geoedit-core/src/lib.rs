//! GeoEdit Core Library
//!
//! Geometry editing for the geometry nodes of a resource tile: a feature
//! store synchronized with a shared draw surface, per-node tools, raw
//! GeoJSON editing and feature selection from an external map layer.

pub mod config;
pub mod debounce;
pub mod draw;
pub mod editor;
pub mod error;
pub mod extent;
pub mod feature;
pub mod hint;
pub mod raw;
pub mod select;
pub mod store;
pub mod style;
pub mod tile;
pub mod tools;

pub use config::EditorConfig;
pub use draw::{DrawEvent, DrawSurface, DrawSurfaceAdapter, MemoryDrawSurface, SurfaceMode};
pub use editor::MapEditor;
pub use error::{EditorError, EditorResult, FetchError, RenderError};
pub use extent::{InitialView, Padding, extent};
pub use feature::{Feature, FeatureCollection, FeatureId, NODE_ID_PROPERTY, NodeId};
pub use hint::{Hint, HintLevel};
pub use raw::{RawGeoJsonBridge, parse_collection};
pub use select::{FeatureFetcher, MemoryFetcher, SelectCandidate, SelectSource, SelectableLayers};
pub use store::FeatureStore;
pub use tile::{Tile, TileField};
pub use tools::{DrawTool, EditorState, GeometryType, NodeConfig, ToolOption};
