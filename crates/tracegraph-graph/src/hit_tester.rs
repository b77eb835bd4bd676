use crate::edge_router::{EdgePath, PathSpec};
use crate::layout::{Layout, Rect};
use serde::{Deserialize, Serialize};
use tracegraph_core::{EdgeId, NodeId, Vec2};

/// Result of a hit test at a given position.
///
/// Priority order: Node > Edge > None
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum HitResult {
    None,
    Node(NodeId),
    Edge(EdgeId),
}

impl HitResult {
    /// True when nothing interactive was hit, i.e. the pointer is on the canvas.
    pub fn is_background(&self) -> bool {
        matches!(self, HitResult::None)
    }
}

/// Spatial lookup over laid-out nodes and routed edges, in graph coordinates.
#[derive(Debug, Clone)]
pub struct HitTester {
    node_rects: Vec<(NodeId, Rect)>,
    edge_paths: Vec<(EdgeId, PathSpec)>,
    /// Maximum distance (graph units) at which an edge still counts as hit.
    edge_tolerance: f32,
    bezier_samples: usize,
}

impl Default for HitTester {
    fn default() -> Self {
        Self::new()
    }
}

impl HitTester {
    pub fn new() -> Self {
        Self {
            node_rects: Vec::new(),
            edge_paths: Vec::new(),
            edge_tolerance: 8.0,
            bezier_samples: 48,
        }
    }

    pub fn with_tolerance(tolerance: f32) -> Self {
        Self {
            edge_tolerance: tolerance,
            ..Self::new()
        }
    }

    pub fn edge_tolerance(&self) -> f32 {
        self.edge_tolerance
    }

    pub fn set_edge_tolerance(&mut self, tolerance: f32) {
        self.edge_tolerance = tolerance;
    }

    /// Refresh hit regions. Call after every layout change.
    pub fn update(&mut self, layout: &Layout, edges: &[EdgePath]) {
        self.node_rects = layout
            .positions
            .keys()
            .filter_map(|id| layout.node_rect(id).map(|rect| (id.clone(), rect)))
            .collect();
        // Stable order so overlapping nodes resolve the same way every time.
        self.node_rects.sort_by(|a, b| a.0.cmp(&b.0));

        self.edge_paths = edges.iter().map(|e| (e.id.clone(), e.path)).collect();
    }

    pub fn hit(&self, point: Vec2) -> HitResult {
        if let Some((id, _)) = self.node_rects.iter().find(|(_, rect)| rect.contains(point)) {
            return HitResult::Node(id.clone());
        }

        let mut best: Option<(&EdgeId, f32)> = None;
        for (id, path) in &self.edge_paths {
            let distance = path.distance_to(point, self.bezier_samples);
            if distance <= self.edge_tolerance && best.is_none_or(|(_, d)| distance < d) {
                best = Some((id, distance));
            }
        }

        match best {
            Some((id, _)) => HitResult::Edge(id.clone()),
            None => HitResult::None,
        }
    }
}
