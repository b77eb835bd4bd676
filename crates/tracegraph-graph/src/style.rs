//! Node and edge styling.
//!
//! A [`StyleTable`] maps node roles to colors and icons; the
//! [`StyleResolver`] combines it with an execution overlay into per-element
//! visuals. Views pick a preset instead of carrying their own color logic.

use crate::edge_router::EdgePath;
use crate::graph::GraphNode;
use crate::overlay::{NodeStatus, Overlay};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracegraph_core::{EdgeKind, NodeKind};

/// RGBA color, serialized as `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if digits.len() == 8 { channel(6)? } else { 255 },
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color {value:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeColors {
    pub fill: Color,
    pub border: Color,
    pub text: Color,
    pub icon: &'static str,
}

impl NodeColors {
    const fn new(fill: Color, border: Color, text: Color, icon: &'static str) -> Self {
        Self {
            fill,
            border,
            text,
            icon,
        }
    }
}

/// Edge color and style
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub color: Color,
    pub width: f32,
    pub dashed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    #[default]
    Standard,
    Monochrome,
}

const WHITE: Color = Color::rgb(255, 255, 255);
const INK: Color = Color::rgb(30, 30, 30);

#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable {
    nodes: BTreeMap<NodeKind, NodeColors>,
    fallback: NodeColors,
    /// Treatment of the node that will execute next.
    pub pending: NodeColors,
    /// Opacity of elements an active trace did not touch.
    pub muted_opacity: f32,
    pub edge_normal: EdgeStyle,
    pub edge_conditional: EdgeStyle,
    pub edge_visited: EdgeStyle,
    pub edge_loop: EdgeStyle,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl StyleTable {
    pub fn standard() -> Self {
        let nodes = BTreeMap::from([
            (
                NodeKind::Start,
                NodeColors::new(Color::rgb(80, 140, 100), Color::rgb(60, 120, 80), WHITE, "play"),
            ),
            (
                NodeKind::Init,
                NodeColors::new(
                    Color::rgb(80, 150, 150),
                    Color::rgb(60, 130, 130),
                    WHITE,
                    "settings",
                ),
            ),
            (
                NodeKind::Agent,
                NodeColors::new(Color::rgb(80, 130, 180), Color::rgb(60, 110, 160), WHITE, "bot"),
            ),
            (
                NodeKind::Tool,
                NodeColors::new(Color::rgb(200, 160, 80), Color::rgb(170, 130, 60), INK, "wrench"),
            ),
            (
                NodeKind::Decision,
                NodeColors::new(
                    Color::rgb(130, 100, 160),
                    Color::rgb(110, 80, 140),
                    WHITE,
                    "split",
                ),
            ),
            (
                NodeKind::End,
                NodeColors::new(Color::rgb(85, 85, 85), Color::rgb(70, 70, 70), WHITE, "flag"),
            ),
        ]);

        Self {
            nodes,
            fallback: NodeColors::new(
                Color::rgb(100, 100, 100),
                Color::rgb(80, 80, 80),
                WHITE,
                "circle",
            ),
            pending: NodeColors::new(
                Color::rgb(255, 244, 214),
                Color::rgb(200, 120, 80),
                INK,
                "hourglass",
            ),
            muted_opacity: 0.35,
            edge_normal: EdgeStyle {
                color: Color::rgb(150, 150, 150),
                width: 1.5,
                dashed: false,
            },
            edge_conditional: EdgeStyle {
                color: Color::rgb(130, 100, 160),
                width: 1.5,
                dashed: true,
            },
            edge_visited: EdgeStyle {
                color: Color::rgb(60, 110, 160),
                width: 2.5,
                dashed: false,
            },
            edge_loop: EdgeStyle {
                color: Color::rgb(200, 120, 80),
                width: 2.5,
                dashed: false,
            },
        }
    }

    /// Grayscale table for print and low-color output.
    pub fn monochrome() -> Self {
        let gray = |level: u8| Color::rgb(level, level, level);
        let mut table = Self::standard();
        for colors in table.nodes.values_mut() {
            colors.fill = gray(230);
            colors.border = gray(60);
            colors.text = INK;
        }
        table.fallback = NodeColors::new(gray(230), gray(60), INK, "circle");
        table.pending = NodeColors::new(WHITE, gray(0), INK, "hourglass");
        table.edge_normal.color = gray(150);
        table.edge_conditional.color = gray(110);
        table.edge_visited.color = gray(20);
        table.edge_loop = EdgeStyle {
            color: gray(20),
            width: 2.5,
            dashed: true,
        };
        table
    }

    pub fn from_preset(preset: StylePreset) -> Self {
        match preset {
            StylePreset::Standard => Self::standard(),
            StylePreset::Monochrome => Self::monochrome(),
        }
    }

    pub fn node_colors(&self, kind: NodeKind) -> NodeColors {
        self.nodes.get(&kind).copied().unwrap_or(self.fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeVisual {
    pub fill: Color,
    pub border: Color,
    pub text: Color,
    pub icon: &'static str,
    pub opacity: f32,
    pub status: NodeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeVisual {
    #[serde(flatten)]
    pub style: EdgeStyle,
    pub opacity: f32,
    pub visited: bool,
    pub highlighted_loop: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    table: StyleTable,
}

impl StyleResolver {
    pub fn new(table: StyleTable) -> Self {
        Self { table }
    }

    /// Without a trace nothing is muted; with one, untouched nodes fade.
    pub fn node_visual(&self, node: &GraphNode, overlay: &Overlay) -> NodeVisual {
        let status = overlay.node_status(&node.id);
        let colors = match status {
            NodeStatus::Current => self.table.pending,
            _ => self.table.node_colors(node.kind),
        };
        let opacity = if status == NodeStatus::Unvisited && !overlay.is_empty() {
            self.table.muted_opacity
        } else {
            1.0
        };
        NodeVisual {
            fill: colors.fill,
            border: colors.border,
            text: colors.text,
            icon: colors.icon,
            opacity,
            status,
        }
    }

    pub fn edge_visual(&self, edge: &EdgePath, overlay: &Overlay) -> EdgeVisual {
        let visited = overlay.is_edge_visited(&edge.id);
        let highlighted_loop = overlay.is_loop_highlight(&edge.id);
        let style = if highlighted_loop {
            self.table.edge_loop
        } else if visited {
            self.table.edge_visited
        } else if edge.kind == EdgeKind::Conditional {
            self.table.edge_conditional
        } else {
            self.table.edge_normal
        };
        let opacity = if !visited && !overlay.is_empty() {
            self.table.muted_opacity
        } else {
            1.0
        };
        EdgeVisual {
            style,
            opacity,
            visited,
            highlighted_loop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_router::PathSpec;
    use tracegraph_core::{EdgeId, NodeId, Vec2};

    fn node(id: &str, kind: NodeKind) -> GraphNode {
        GraphNode {
            id: id.into(),
            label: id.to_string(),
            kind,
            position: None,
            is_final: false,
            is_decision: false,
            boundary: false,
        }
    }

    fn edge(id: &str, kind: EdgeKind) -> EdgePath {
        EdgePath {
            id: EdgeId::from(id),
            source: "a".into(),
            target: "b".into(),
            kind,
            path: PathSpec::Line {
                start: Vec2::ZERO,
                end: Vec2::new(0.0, 10.0),
            },
            is_loop: false,
            label: None,
            label_anchor: None,
        }
    }

    #[test]
    fn test_color_hex_round_trip() {
        let color = Color::rgba(200, 160, 80, 128);
        assert_eq!(color.to_string(), "#c8a05080");
        assert_eq!(Color::from_hex("#c8a05080"), Some(color));
        assert_eq!(Color::from_hex("#c8a050"), Some(Color::rgb(200, 160, 80)));
        assert_eq!(Color::from_hex("c8a050"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);

        let json = serde_json::to_string(&Color::rgb(255, 0, 0)).unwrap();
        assert_eq!(json, "\"#ff0000ff\"");
    }

    #[test]
    fn test_roles_have_distinct_colors() {
        let table = StyleTable::standard();
        let agent = table.node_colors(NodeKind::Agent);
        let tool = table.node_colors(NodeKind::Tool);
        assert_ne!(agent.fill, tool.fill);
        assert_eq!(table.node_colors(NodeKind::Generic), table.fallback);
    }

    #[test]
    fn test_current_overrides_visited() {
        let resolver = StyleResolver::default();
        let overlay = Overlay {
            visited_nodes: [NodeId::from("agent")].into(),
            current_node: Some("agent".into()),
            ..Overlay::default()
        };

        let visual = resolver.node_visual(&node("agent", NodeKind::Agent), &overlay);
        assert_eq!(visual.status, NodeStatus::Current);
        assert_eq!(visual.fill, resolver.table.pending.fill);
        assert_eq!(visual.opacity, 1.0);
    }

    #[test]
    fn test_unvisited_muted_only_under_trace() {
        let resolver = StyleResolver::default();
        let tool = node("tools", NodeKind::Tool);

        let plain = resolver.node_visual(&tool, &Overlay::default());
        assert_eq!(plain.opacity, 1.0);

        let overlay = Overlay {
            visited_nodes: [NodeId::from("agent")].into(),
            ..Overlay::default()
        };
        let muted = resolver.node_visual(&tool, &overlay);
        assert_eq!(muted.status, NodeStatus::Unvisited);
        assert!(muted.opacity < 1.0);
        assert_eq!(muted.fill, resolver.table.node_colors(NodeKind::Tool).fill);
    }

    #[test]
    fn test_edge_visual_priority() {
        let resolver = StyleResolver::default();
        let table = resolver.table.clone();
        let overlay = Overlay {
            visited_nodes: [NodeId::from("a")].into(),
            visited_edges: [EdgeId::from("loop"), EdgeId::from("seen")].into(),
            loop_highlights: [EdgeId::from("loop")].into(),
            ..Overlay::default()
        };

        let looped = resolver.edge_visual(&edge("loop", EdgeKind::Normal), &overlay);
        assert_eq!(looped.style, table.edge_loop);
        assert!(looped.highlighted_loop);

        let seen = resolver.edge_visual(&edge("seen", EdgeKind::Conditional), &overlay);
        assert_eq!(seen.style, table.edge_visited);

        let branch = resolver.edge_visual(&edge("other", EdgeKind::Conditional), &overlay);
        assert!(branch.style.dashed);
        assert!(branch.opacity < 1.0);
    }

    #[test]
    fn test_monochrome_preset_is_gray() {
        let table = StyleTable::from_preset(StylePreset::Monochrome);
        for kind in NodeKind::ALL {
            let fill = table.node_colors(kind).fill;
            assert!(fill.r == fill.g && fill.g == fill.b);
        }
    }
}
