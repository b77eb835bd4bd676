use serde::{Deserialize, Serialize};
use std::fmt;

pub mod document;
pub mod error;
pub mod trace;

pub use document::{ConditionalEdge, GraphStructure, RawEdge, RawNode};
pub use error::DocumentError;
pub use trace::{ExecutionTrace, Handoff, VisitedEdge, VisitedNode};

/// Id of the synthetic entry boundary node.
pub const START_ID: &str = "START";
/// Id of the synthetic exit boundary node.
pub const END_ID: &str = "END";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn start() -> Self {
        Self(START_ID.to_string())
    }

    pub fn end() -> Self {
        Self(END_ID.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id used for edges that arrive without one.
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        Self(format!("{}->{}", source, target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Role of a processing step in an agent graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum NodeKind {
    Start,
    Init,
    Agent,
    Tool,
    Decision,
    End,
    Generic,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        NodeKind::Start,
        NodeKind::Init,
        NodeKind::Agent,
        NodeKind::Tool,
        NodeKind::Decision,
        NodeKind::End,
        NodeKind::Generic,
    ];

    /// Parse a node type (or a node id when the type is missing).
    ///
    /// Unrecognized names map to `Generic`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "start" | "__start__" => NodeKind::Start,
            "init" | "initialize" | "setup" => NodeKind::Init,
            "agent" | "llm" | "model" => NodeKind::Agent,
            "tool" | "tools" | "action" => NodeKind::Tool,
            "decision" | "router" | "condition" => NodeKind::Decision,
            "end" | "__end__" | "finish" => NodeKind::End,
            _ => NodeKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Init => "init",
            NodeKind::Agent => "agent",
            NodeKind::Tool => "tool",
            NodeKind::Decision => "decision",
            NodeKind::End => "end",
            NodeKind::Generic => "generic",
        }
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        NodeKind::parse(&value)
    }
}

impl From<NodeKind> for &'static str {
    fn from(value: NodeKind) -> Self {
        value.as_str()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Normal,
    Conditional,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    /// Unit vector in the same direction, or zero for a degenerate vector.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    pub fn lerp(&self, other: Vec2, t: f32) -> Vec2 {
        Vec2::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_parse_aliases() {
        assert_eq!(NodeKind::parse("__start__"), NodeKind::Start);
        assert_eq!(NodeKind::parse("Tools"), NodeKind::Tool);
        assert_eq!(NodeKind::parse("router"), NodeKind::Decision);
        assert_eq!(NodeKind::parse("__end__"), NodeKind::End);
        assert_eq!(NodeKind::parse("summarize"), NodeKind::Generic);
    }

    #[test]
    fn test_node_kind_serde_round_trip_uses_lowercase_names() {
        let json = serde_json::to_string(&NodeKind::Agent).unwrap();
        assert_eq!(json, "\"agent\"");
        let parsed: NodeKind = serde_json::from_str("\"ACTION\"").unwrap();
        assert_eq!(parsed, NodeKind::Tool);
    }

    #[test]
    fn test_edge_id_between() {
        let id = EdgeId::between(&NodeId::from("a"), &NodeId::from("b"));
        assert_eq!(id.as_str(), "a->b");
    }

    #[test]
    fn test_vec2_normalized_handles_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        let n = Vec2::new(3.0, 4.0).normalized();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }
}
