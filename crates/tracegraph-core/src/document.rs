//! Raw graph-structure document as delivered by the agent-execution service.

use crate::error::DocumentError;
use crate::{EdgeKind, NodeKind, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStructure {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_edges: Vec<ConditionalEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Node type; inferred from the id when absent.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
    #[serde(default, rename = "final", alias = "terminal")]
    pub is_final: bool,
}

impl RawNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            kind: None,
            position: None,
            is_final: false,
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Vec2::new(x, y));
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn resolved_kind(&self) -> NodeKind {
        self.kind.unwrap_or_else(|| NodeKind::parse(&self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub conditional: bool,
}

impl RawEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            label: None,
            condition: None,
            conditional: false,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn kind(&self) -> EdgeKind {
        if self.conditional || self.condition.is_some() {
            EdgeKind::Conditional
        } else {
            EdgeKind::Normal
        }
    }
}

/// Branch table of a decision node: branch name -> target node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEdge {
    pub source: String,
    #[serde(default, alias = "mapping")]
    pub branches: BTreeMap<String, String>,
}

impl GraphStructure {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(DocumentError::Parse)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_camel_case_structure() {
        let json = r#"{
            "nodes": [
                {"id": "init", "type": "init"},
                {"id": "agent", "label": "Advisor"},
                {"id": "end", "final": true, "position": {"x": 10, "y": 20}}
            ],
            "edges": [
                {"source": "init", "target": "agent"},
                {"source": "agent", "target": "end", "condition": "done"}
            ],
            "entryPoint": "init",
            "conditionalEdges": [
                {"source": "agent", "mapping": {"continue": "tools", "finish": "end"}}
            ]
        }"#;

        let doc = GraphStructure::from_json(json).unwrap();
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.entry_point.as_deref(), Some("init"));
        assert_eq!(doc.nodes[1].resolved_kind(), NodeKind::Agent);
        assert!(doc.nodes[2].is_final);
        assert_eq!(doc.nodes[2].position, Some(Vec2::new(10.0, 20.0)));
        assert_eq!(doc.edges[1].kind(), EdgeKind::Conditional);
        assert_eq!(doc.conditional_edges[0].branches.len(), 2);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let doc = GraphStructure::from_json("{}").unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.edges.is_empty());
        assert!(doc.entry_point.is_none());
    }

    #[test]
    fn test_explicit_kind_overrides_id() {
        assert_eq!(RawNode::new("agent").resolved_kind(), NodeKind::Agent);
        let node = RawNode::new("agent").with_kind(NodeKind::Tool);
        assert_eq!(node.resolved_kind(), NodeKind::Tool);
        assert_eq!(RawNode::new("summarize").resolved_kind(), NodeKind::Generic);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let err = GraphStructure::from_json("{ nodes: ").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }
}
