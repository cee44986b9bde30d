//! Fetching candidate geometry from the local filesystem.

use geoedit_core::select::BoxFuture;
use geoedit_core::{FeatureCollection, FeatureFetcher, FetchError, parse_collection};
use std::io::ErrorKind;
use url::Url;

/// Resolves `file://` URLs. Any other scheme is unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl FeatureFetcher for FileFetcher {
    fn fetch(&self, url: &Url) -> BoxFuture<'_, Result<FeatureCollection, FetchError>> {
        let url = url.clone();
        Box::pin(async move {
            if url.scheme() != "file" {
                return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
            }
            let path = url
                .to_file_path()
                .map_err(|()| FetchError::NotFound(url.to_string()))?;
            let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
                _ => FetchError::Io(e.to_string()),
            })?;
            parse_collection(&text).map_err(|e| FetchError::Parse(e.to_string()))
        })
    }
}
