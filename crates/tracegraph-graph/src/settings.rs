use crate::edge_router::EdgeRouterConfig;
use crate::layout::LayoutConfig;
use crate::overlay::{EdgeInference, ExecutionOverlay, LayerAdjacentInference, SequenceInference};
use crate::style::StylePreset;
use crate::viewport::ViewportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracegraph_core::DocumentError;

/// How visited edges are derived when a trace lists only node visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMode {
    #[default]
    LayerAdjacent,
    Sequence,
}

impl InferenceMode {
    pub fn strategy(self) -> Box<dyn EdgeInference> {
        match self {
            InferenceMode::LayerAdjacent => Box::new(LayerAdjacentInference),
            InferenceMode::Sequence => Box::new(SequenceInference),
        }
    }
}

/// Engine configuration. Every field falls back to its default, so a
/// settings file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub layout: LayoutConfig,
    pub edges: EdgeRouterConfig,
    pub viewport: ViewportConfig,
    pub style: StylePreset,
    pub inference: InferenceMode,
    /// Maximum pointer distance, in graph units, that still hits an edge.
    pub edge_hit_tolerance: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            edges: EdgeRouterConfig::default(),
            viewport: ViewportConfig::default(),
            style: StylePreset::default(),
            inference: InferenceMode::default(),
            edge_hit_tolerance: 8.0,
        }
    }
}

impl EngineSettings {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(DocumentError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn overlay(&self) -> ExecutionOverlay {
        ExecutionOverlay::new(self.inference.strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let json = r#"{
            "layout": { "row_height": 140.0 },
            "viewport": { "max_scale": 5.0 },
            "style": "monochrome",
            "inference": "sequence"
        }"#;

        let settings = EngineSettings::from_json(json).unwrap();

        assert_eq!(settings.viewport.max_scale, 5.0);
        assert_eq!(settings.viewport.min_scale, ViewportConfig::default().min_scale);
        assert_eq!(settings.layout.row_height, 140.0);
        assert_eq!(settings.layout.node_width, LayoutConfig::default().node_width);
        assert_eq!(settings.style, StylePreset::Monochrome);
        assert_eq!(settings.inference, InferenceMode::Sequence);
        assert_eq!(settings.edge_hit_tolerance, 8.0);
    }

    #[test]
    fn test_empty_object_is_default() {
        let settings = EngineSettings::from_json("{}").unwrap();
        assert_eq!(settings.layout, LayoutConfig::default());
        assert_eq!(settings.edges, EdgeRouterConfig::default());
        assert_eq!(settings.style, StylePreset::Standard);
    }

    #[test]
    fn test_invalid_settings_are_reported() {
        let err = EngineSettings::from_json(r#"{"style": "neon"}"#).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));

        let err = EngineSettings::load("/nonexistent/tracegraph.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tracegraph.json"));
    }
}
