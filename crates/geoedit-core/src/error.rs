//! Error types shared across the editor.

use crate::feature::NodeId;
use thiserror::Error;

/// Errors raised by the draw surface while (re)rendering a feature set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A repaint failed against a stale feature set. Safe to ignore.
    #[error("Transient render error: {0}")]
    Transient(String),
    /// The surface is unusable.
    #[error("Render error: {0}")]
    Fatal(String),
}

/// Errors raised while resolving a remote feature collection.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Editor errors.
///
/// Everything except `Fetch` and transient render failures indicates a
/// contract violation by the caller (an unconfigured node, a tile field of
/// the wrong shape, a map event while the surface is detached).
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("Tile field for node {0} is not a feature collection")]
    IncompatibleTileField(NodeId),
    #[error("Tile field for node {0} changed shape after binding")]
    FieldShapeChanged(NodeId),
    #[error("No node is pending for new features")]
    NoPendingNode,
    #[error("Draw surface is detached")]
    SurfaceDetached,
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;
