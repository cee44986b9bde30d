//! Copying features from an external, read-only map layer.

use crate::error::{EditorError, EditorResult, FetchError};
use crate::feature::{Feature, FeatureCollection};
use crate::style::StyleTarget;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use url::{ParseError, Url};

/// Boxed future for fetches (no `Send` bound; the editor is single-threaded).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Resolves a remote GeoJSON feature collection.
pub trait FeatureFetcher {
    fn fetch(&self, url: &Url) -> BoxFuture<'_, Result<FeatureCollection, FetchError>>;
}

/// Fetcher serving collections from memory, for tests and offline use.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    collections: HashMap<String, FeatureCollection>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, collection: FeatureCollection) {
        self.collections.insert(url.to_string(), collection);
    }
}

impl FeatureFetcher for MemoryFetcher {
    fn fetch(&self, url: &Url) -> BoxFuture<'_, Result<FeatureCollection, FetchError>> {
        let url = url.to_string();
        Box::pin(async move {
            self.collections
                .get(&url)
                .cloned()
                .ok_or(FetchError::NotFound(url))
        })
    }
}

/// A feature clicked on the selectable layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectCandidate {
    /// Map layer the feature was picked from.
    #[serde(default)]
    pub layer_id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Where a candidate's geometry lives.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSource {
    /// The `geojson` property holds the geometry itself.
    Inline(Value),
    /// The `geojson` property is a URL to a feature collection.
    Remote(Url),
}

impl SelectCandidate {
    /// Work out where the candidate's geometry comes from.
    ///
    /// An inline JSON geometry wins; anything that does not parse as one is
    /// tried as a URL. Relative URLs are resolved against `base`.
    pub fn source(&self, base: Option<&Url>) -> EditorResult<CandidateSource> {
        let raw = self.properties.get("geojson").ok_or_else(|| {
            EditorError::InvalidGeoJson("candidate has no geojson property".to_string())
        })?;
        let text = match raw {
            Value::Object(_) => return Ok(CandidateSource::Inline(raw.clone())),
            Value::String(text) => text,
            _ => {
                return Err(EditorError::InvalidGeoJson(
                    "candidate geojson property is not a string".to_string(),
                ));
            }
        };
        match serde_json::from_str::<Value>(text) {
            Ok(geometry) if geometry.is_object() => Ok(CandidateSource::Inline(geometry)),
            _ => {
                let url = match (Url::parse(text), base) {
                    (Err(ParseError::RelativeUrlWithoutBase), Some(base)) => base.join(text),
                    (parsed, _) => parsed,
                };
                url.map(CandidateSource::Remote).map_err(|e| {
                    EditorError::InvalidGeoJson(format!("neither GeoJSON nor a URL: {}", e))
                })
            }
        }
    }
}

/// Resolve a candidate into bare features (ids and properties are assigned
/// by the editor).
///
/// Only this future suspends on the network; the editor is not borrowed
/// while it runs.
pub async fn resolve_candidate<F>(
    candidate: &SelectCandidate,
    base: Option<&Url>,
    fetcher: &F,
) -> EditorResult<Vec<Feature>>
where
    F: FeatureFetcher + ?Sized,
{
    match candidate.source(base)? {
        CandidateSource::Inline(geometry) => Ok(vec![Feature::new(geometry)]),
        CandidateSource::Remote(url) => {
            log::info!("Candidate geometry is remote, fetching {}", url);
            let collection = fetcher.fetch(&url).await.inspect_err(|e| {
                log::warn!("Failed to fetch {}: {}", url, e);
            })?;
            Ok(collection.features)
        }
    }
}

/// Map source the selectable layers draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectSource {
    pub source: String,
    #[serde(default)]
    pub source_layer: Option<String>,
}

/// A map layer whose features may be copied into the edited node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectLayer {
    pub id: String,
    pub source: String,
    pub source_layer: Option<String>,
    pub target: StyleTarget,
    /// Features of this resource are hidden; they are already being edited.
    pub exclude_resource: Option<String>,
}

/// The set of selectable layers for one editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectableLayers {
    layers: Vec<SelectLayer>,
}

impl SelectableLayers {
    /// Build the layers for `source`. Sources that are not among the known
    /// map sources yield no layers.
    pub fn new(
        resource_id: Option<&str>,
        source: Option<&SelectSource>,
        known_sources: &[String],
    ) -> Self {
        let Some(source) = source.filter(|s| known_sources.contains(&s.source)) else {
            return Self::default();
        };
        let layers = [
            ("select-feature-polygon-fill", StyleTarget::Polygon),
            ("select-feature-line", StyleTarget::Line),
            ("select-feature-point", StyleTarget::Point),
        ]
        .into_iter()
        .map(|(id, target)| SelectLayer {
            id: id.to_string(),
            source: source.source.clone(),
            source_layer: source.source_layer.clone(),
            target,
            exclude_resource: resource_id.map(str::to_string),
        })
        .collect();
        Self { layers }
    }

    pub fn layers(&self) -> &[SelectLayer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Whether a map layer is one of ours.
    pub fn contains(&self, layer_id: &str) -> bool {
        self.layers.iter().any(|l| l.id == layer_id)
    }
}
