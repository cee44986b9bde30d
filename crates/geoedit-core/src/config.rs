//! Editor configuration.

use crate::error::EditorResult;
use crate::tools::ToolOption;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Tunables for the map editor. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Delay between the last raw-text edit and recomputing lint errors.
    pub validation_debounce_ms: u64,
    /// Delay between a validation pass and refreshing the preview layer.
    pub preview_debounce_ms: u64,
    /// Delay before redisplaying a restored provisional edit.
    pub provisional_settle_ms: u64,
    /// Extra attempts after a transient render error.
    pub render_retry_limit: u32,
    /// Padding around fitted bounds.
    pub fit_padding: f64,
    /// Additional left/right padding for the initial fit (side panels).
    pub fit_side_extra: f64,
    /// Label of the select-feature tool.
    pub select_text: Option<String>,
    /// Extra entries appended to every node's tool menu.
    pub additional_draw_options: Vec<ToolOption>,
    /// Base that relative geometry URLs of selected features resolve against.
    pub select_base_url: Option<Url>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            validation_debounce_ms: 50,
            preview_debounce_ms: 100,
            provisional_settle_ms: 100,
            render_retry_limit: 1,
            fit_padding: 40.0,
            fit_side_extra: 200.0,
            select_text: None,
            additional_draw_options: Vec::new(),
            select_base_url: None,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(text: &str) -> EditorResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> EditorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validation_delay(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }

    pub fn preview_delay(&self) -> Duration {
        Duration::from_millis(self.preview_debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.provisional_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = EditorConfig::from_json_str(r#"{"render_retry_limit": 3}"#).unwrap();
        assert_eq!(config.render_retry_limit, 3);
        assert_eq!(config.validation_delay(), Duration::from_millis(50));
        assert_eq!(config.preview_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"select_text": "Pick a parcel", "additional_draw_options": [{{"value": "draw_circle", "text": "Add circle"}}]}}"#
        )
        .unwrap();

        let config = EditorConfig::from_path(file.path()).unwrap();
        assert_eq!(config.select_text.as_deref(), Some("Pick a parcel"));
        assert_eq!(config.additional_draw_options.len(), 1);
    }

    #[test]
    fn test_select_base_url() {
        let config =
            EditorConfig::from_json_str(r#"{"select_base_url": "https://heritage.example.org/"}"#)
                .unwrap();
        assert_eq!(
            config.select_base_url.map(String::from).as_deref(),
            Some("https://heritage.example.org/")
        );
        assert!(EditorConfig::from_json_str(r#"{"select_base_url": "/relative"}"#).is_err());
    }

    #[test]
    fn test_invalid_config() {
        assert!(EditorConfig::from_json_str("{\"fit_padding\": \"wide\"}").is_err());
    }
}
