//! Execution trace of a single agent run.

use crate::NodeId;
use crate::error::DocumentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    #[serde(default)]
    pub nodes: Vec<VisitedNode>,
    #[serde(default)]
    pub edges: Vec<VisitedEdge>,
    /// The node that will execute next, if the run is paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<Handoff>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitedNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl VisitedNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitedEdge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl VisitedEdge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            timestamp: None,
        }
    }
}

/// Marks that the run was handed off (e.g. to a human advisor).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    #[serde(default)]
    pub occurred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_node: Option<NodeId>,
}

impl ExecutionTrace {
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

    /// Build a trace from visited node ids in execution order.
    pub fn from_visits<I, S>(ids: I, current_node: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self {
            nodes: ids.into_iter().map(VisitedNode::new).collect(),
            edges: Vec::new(),
            current_node: current_node.map(NodeId::from),
            handoff: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.current_node.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_trace_with_optional_fields() {
        let json = r#"{
            "nodes": [
                {"id": "init", "timestamp": "2024-05-01T10:00:00Z", "durationMs": 12},
                {"id": "agent"}
            ],
            "edges": [{"source": "init", "target": "agent"}],
            "currentNode": "tools",
            "handoff": {"occurred": true, "reason": "needs advisor", "atNode": "agent"}
        }"#;

        let trace = ExecutionTrace::from_json(json).unwrap();
        assert_eq!(trace.nodes.len(), 2);
        assert_eq!(trace.nodes[0].duration_ms, Some(12));
        assert!(trace.nodes[0].timestamp.is_some());
        assert!(trace.nodes[1].timestamp.is_none());
        assert_eq!(trace.current_node, Some(NodeId::from("tools")));
        let handoff = trace.handoff.unwrap();
        assert!(handoff.occurred);
        assert_eq!(handoff.at_node, Some(NodeId::from("agent")));
    }

    #[test]
    fn test_from_visits() {
        let trace = ExecutionTrace::from_visits(["init", "agent"], Some("tools"));
        assert_eq!(trace.nodes.len(), 2);
        assert!(!trace.is_empty());
        assert!(ExecutionTrace::default().is_empty());
    }
}
