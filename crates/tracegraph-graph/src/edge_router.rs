use crate::graph::{EdgeIndex, Graph};
use crate::layout::{Layout, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use tracegraph_core::{EdgeId, EdgeKind, NodeId, Vec2};

/// A cubic bezier curve segment defined by four control points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub start: Vec2,
    pub control1: Vec2,
    pub control2: Vec2,
    pub end: Vec2,
}

impl CubicBezier {
    /// Sample the curve at parameter t [0, 1]
    pub fn sample(&self, t: f32) -> Vec2 {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = self.start.x * mt3
            + 3.0 * self.control1.x * mt2 * t
            + 3.0 * self.control2.x * mt * t2
            + self.end.x * t3;
        let y = self.start.y * mt3
            + 3.0 * self.control1.y * mt2 * t
            + 3.0 * self.control2.y * mt * t2
            + self.end.y * t3;

        Vec2::new(x, y)
    }

    /// Minimum distance from `point` to the curve, by uniform sampling.
    pub fn point_distance(&self, point: Vec2, num_samples: usize) -> f32 {
        let samples = num_samples.max(2);
        (0..=samples)
            .map(|i| self.sample(i as f32 / samples as f32).distance(point))
            .fold(f32::INFINITY, f32::min)
    }
}

/// Geometry of a single edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PathSpec {
    Line { start: Vec2, end: Vec2 },
    Curve(CubicBezier),
}

impl PathSpec {
    pub fn start(&self) -> Vec2 {
        match self {
            PathSpec::Line { start, .. } => *start,
            PathSpec::Curve(curve) => curve.start,
        }
    }

    pub fn end(&self) -> Vec2 {
        match self {
            PathSpec::Line { end, .. } => *end,
            PathSpec::Curve(curve) => curve.end,
        }
    }

    pub fn sample(&self, t: f32) -> Vec2 {
        let t = t.clamp(0.0, 1.0);
        match self {
            PathSpec::Line { start, end } => start.lerp(*end, t),
            PathSpec::Curve(curve) => curve.sample(t),
        }
    }

    pub fn distance_to(&self, point: Vec2, samples: usize) -> f32 {
        match self {
            PathSpec::Line { start, end } => segment_distance(point, *start, *end),
            PathSpec::Curve(curve) => curve.point_distance(point, samples),
        }
    }

    /// SVG `d` attribute for this path.
    pub fn svg_path_data(&self) -> String {
        let mut d = String::new();
        match self {
            PathSpec::Line { start, end } => {
                let _ = write!(d, "M {} {} L {} {}", start.x, start.y, end.x, end.y);
            }
            PathSpec::Curve(c) => {
                let _ = write!(
                    d,
                    "M {} {} C {} {}, {} {}, {} {}",
                    c.start.x,
                    c.start.y,
                    c.control1.x,
                    c.control1.y,
                    c.control2.x,
                    c.control2.y,
                    c.end.x,
                    c.end.y
                );
            }
        }
        d
    }
}

fn segment_distance(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let ap = point - a;
    let t = ((ap.x * ab.x + ap.y * ab.y) / len_sq).clamp(0.0, 1.0);
    point.distance(a.lerp(b, t))
}

/// Perpendicular of `direction` pointing down or right.
fn outward_normal(direction: Vec2) -> Vec2 {
    let n = Vec2::new(-direction.y, direction.x).normalized();
    if n == Vec2::ZERO {
        return Vec2::new(0.0, 1.0);
    }
    if n.x + n.y < 0.0 { n * -1.0 } else { n }
}

/// Routed edge, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePath {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub path: PathSpec,
    pub is_loop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_anchor: Option<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeRouterConfig {
    /// Loop bulge as a fraction of the layout row height.
    pub loop_bias: f32,
    /// Perpendicular distance between an edge's midpoint and its label.
    pub label_offset: f32,
}

impl Default for EdgeRouterConfig {
    fn default() -> Self {
        Self {
            loop_bias: 0.35,
            label_offset: 12.0,
        }
    }
}

/// Back-edges: the target sits on the same or an earlier layer than the
/// source, and neither endpoint is a START/END boundary.
pub fn classify_loops(graph: &Graph, layout: &Layout) -> HashSet<EdgeIndex> {
    graph
        .edge_indices()
        .filter(|&idx| {
            let edge = &graph[idx];
            if graph.is_boundary(edge.source_idx) || graph.is_boundary(edge.target_idx) {
                return false;
            }
            match (layout.layer(&edge.source), layout.layer(&edge.target)) {
                (Some(source), Some(target)) => target <= source,
                _ => false,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeRouter {
    pub config: EdgeRouterConfig,
}

impl EdgeRouter {
    pub fn new(config: EdgeRouterConfig) -> Self {
        Self { config }
    }

    /// Route one edge. `None` when either endpoint has no position.
    pub fn path_for(
        &self,
        graph: &Graph,
        index: EdgeIndex,
        layout: &Layout,
        loops: &HashSet<EdgeIndex>,
    ) -> Option<EdgePath> {
        let edge = &graph[index];
        let source_rect = layout.node_rect(&edge.source)?;
        let target_rect = layout.node_rect(&edge.target)?;
        let is_loop = loops.contains(&index);
        let bulge = self.config.loop_bias * layout.row_height;

        let path = if edge.is_self_loop() {
            Self::self_loop(source_rect, bulge)
        } else {
            let start = self.calculate_anchor(source_rect, target_rect.center());
            let end = self.calculate_anchor(target_rect, source_rect.center());
            if is_loop {
                let offset = outward_normal(end - start) * bulge;
                PathSpec::Curve(CubicBezier {
                    start,
                    control1: start + offset,
                    control2: end + offset,
                    end,
                })
            } else {
                PathSpec::Line { start, end }
            }
        };

        let label = edge.display_label().map(str::to_string);
        let label_anchor = label.as_ref().map(|_| self.label_anchor(&path));

        Some(EdgePath {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            kind: edge.kind,
            path,
            is_loop,
            label,
            label_anchor,
        })
    }

    /// Route every edge whose endpoints are laid out, in edge order.
    pub fn route_all(&self, graph: &Graph, layout: &Layout) -> Vec<EdgePath> {
        let loops = classify_loops(graph, layout);
        graph
            .edge_indices()
            .filter_map(|idx| self.path_for(graph, idx, layout, &loops))
            .collect()
    }

    /// Calculate the anchor point on the border of `rect` facing `target_center`.
    pub fn calculate_anchor(&self, rect: Rect, target_center: Vec2) -> Vec2 {
        let center = rect.center();
        let vec = target_center - center;

        if vec.x * vec.x + vec.y * vec.y < 1.0 {
            return center;
        }

        let mut t_min = f32::INFINITY;

        let check_t = |t: f32, start: f32, dir: f32, min: f32, max: f32| -> Option<f32> {
            if t > 0.0 {
                let pos = start + t * dir;
                if pos >= min && pos <= max {
                    return Some(t);
                }
            }
            None
        };

        if vec.x.abs() > 0.001 {
            for side in [rect.min.x, rect.max.x] {
                let t = (side - center.x) / vec.x;
                if let Some(t) = check_t(t, center.y, vec.y, rect.min.y, rect.max.y) {
                    t_min = t_min.min(t);
                }
            }
        }

        if vec.y.abs() > 0.001 {
            for side in [rect.min.y, rect.max.y] {
                let t = (side - center.y) / vec.y;
                if let Some(t) = check_t(t, center.x, vec.x, rect.min.x, rect.max.x) {
                    t_min = t_min.min(t);
                }
            }
        }

        if t_min.is_infinite() {
            return center;
        }

        center + vec * t_min
    }

    fn self_loop(rect: Rect, bulge: f32) -> PathSpec {
        let quarter = rect.width() / 4.0;
        let center = rect.center();
        let start = Vec2::new(center.x - quarter, rect.max.y);
        let end = Vec2::new(center.x + quarter, rect.max.y);
        let down = Vec2::new(0.0, bulge.max(1.0));
        PathSpec::Curve(CubicBezier {
            start,
            control1: start + down,
            control2: end + down,
            end,
        })
    }

    fn label_anchor(&self, path: &PathSpec) -> Vec2 {
        let mid = path.sample(0.5);
        let direction = match path {
            PathSpec::Line { start, end } => *end - *start,
            PathSpec::Curve(curve) => curve.sample(0.55) - curve.sample(0.45),
        };
        mid + outward_normal(direction) * self.config.label_offset
    }
}
