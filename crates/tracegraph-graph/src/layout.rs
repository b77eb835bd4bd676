use crate::graph::{Graph, NodeIndex};
use crate::memo::IdentityMemo;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracegraph_core::{NodeId, NodeKind, Vec2};

/// Geometry knobs for the layered layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Vertical distance between the tops of consecutive layers.
    pub row_height: f32,
    /// Horizontal gap between nodes of the same layer.
    pub column_gap: f32,
    /// Nominal width the layers are centered on.
    pub canvas_width: f32,
    pub padding: f32,
    pub min_width: f32,
    pub min_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 160.0,
            node_height: 48.0,
            row_height: 120.0,
            column_gap: 60.0,
            canvas_width: 800.0,
            padding: 40.0,
            min_width: 400.0,
            min_height: 300.0,
        }
    }
}

/// Node positions plus the bounding box of the whole graph.
///
/// Positions are the top-left corners of node boxes in graph space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub positions: HashMap<NodeId, Vec2>,
    pub layers: HashMap<NodeId, i32>,
    pub node_size: Vec2,
    pub row_height: f32,
    pub bounding_width: f32,
    pub bounding_height: f32,
}

impl Layout {
    pub fn position(&self, id: &NodeId) -> Option<Vec2> {
        self.positions.get(id).copied()
    }

    pub fn layer(&self, id: &NodeId) -> Option<i32> {
        self.layers.get(id).copied()
    }

    pub fn center(&self, id: &NodeId) -> Option<Vec2> {
        self.position(id)
            .map(|p| Vec2::new(p.x + self.node_size.x / 2.0, p.y + self.node_size.y / 2.0))
    }

    pub fn node_rect(&self, id: &NodeId) -> Option<Rect> {
        self.position(id).map(|p| Rect::from_pos_size(p, self.node_size))
    }

    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.bounding_width, self.bounding_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: Vec2::new(pos.x + size.x, pos.y + size.y),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.min.x + self.width() * 0.5,
            self.min.y + self.height() * 0.5,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

pub trait Layouter {
    fn execute(&self, graph: &Graph) -> Layout;
}

/// Canonical rank of well-known agent roles, if the node has one.
pub fn canonical_rank(graph: &Graph, index: NodeIndex) -> Option<i32> {
    let node = &graph[index];
    match node.kind {
        NodeKind::Start => Some(0),
        NodeKind::Init => Some(1),
        NodeKind::Agent => Some(2),
        NodeKind::Tool => Some(3),
        NodeKind::End if node.boundary => Some(5),
        NodeKind::End => Some(4),
        NodeKind::Decision | NodeKind::Generic => None,
    }
}

/// Layer of every node, compressed so that no layer is empty.
///
/// Pure function of the graph; the overlay uses it to reason about
/// adjacency without needing positions.
pub fn assign_layers(graph: &Graph) -> HashMap<NodeIndex, i32> {
    let mut ranks: HashMap<NodeIndex, i32> = HashMap::with_capacity(graph.node_count());
    for idx in graph.node_indices() {
        if let Some(rank) = canonical_rank(graph, idx) {
            ranks.insert(idx, rank);
        }
    }

    let mut seeds: Vec<NodeIndex> = Vec::new();
    if let Some(root) = graph.root() {
        seeds.push(root);
    } else {
        // Without an entry point, fall back to insertion order.
        seeds.extend(
            graph
                .node_indices()
                .filter(|&idx| graph.incoming(idx).is_empty()),
        );
        if seeds.is_empty() {
            seeds.extend(graph.node_indices().next());
        }
    }
    // Canonical nodes the seeds cannot reach still anchor their successors.
    let mut canonical: Vec<NodeIndex> = ranks.keys().copied().collect();
    canonical.sort_by_key(|idx| (ranks[idx], *idx));
    seeds.extend(canonical);

    let mut expanded = vec![false; graph.node_count()];
    for seed in seeds {
        if expanded[seed.0] {
            continue;
        }
        ranks.entry(seed).or_insert(0);
        let mut queue = VecDeque::from([seed]);
        while let Some(idx) = queue.pop_front() {
            if expanded[idx.0] {
                continue;
            }
            expanded[idx.0] = true;
            let rank = ranks[&idx];
            for &edge_idx in graph.outgoing(idx) {
                let target = graph[edge_idx].target_idx;
                ranks.entry(target).or_insert(rank + 1);
                if !expanded[target.0] {
                    queue.push_back(target);
                }
            }
        }
    }

    let overflow = ranks.values().copied().max().map_or(0, |max| max + 1);
    for idx in graph.node_indices() {
        if !ranks.contains_key(&idx) {
            tracing::debug!(
                "node {} is unreachable, placing it in the overflow layer",
                graph[idx].id
            );
            ranks.insert(idx, overflow);
        }
    }

    compress_ranks(&mut ranks);
    ranks
}

fn compress_ranks(ranks: &mut HashMap<NodeIndex, i32>) {
    if ranks.is_empty() {
        return;
    }

    let mut unique_ranks: Vec<i32> = ranks.values().copied().collect();
    unique_ranks.sort_unstable();
    unique_ranks.dedup();

    let remap: HashMap<i32, i32> = unique_ranks
        .iter()
        .enumerate()
        .map(|(i, rank)| (*rank, i as i32))
        .collect();

    for rank in ranks.values_mut() {
        if let Some(new_rank) = remap.get(rank) {
            *rank = *new_rank;
        }
    }
}

/// Rank-based top-to-bottom layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayouter {
    pub config: LayoutConfig,
}

impl LayeredLayouter {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    fn build_layers(graph: &Graph, ranks: &HashMap<NodeIndex, i32>) -> Vec<Vec<NodeIndex>> {
        let layer_count = ranks.values().copied().max().map_or(0, |max| max as usize + 1);
        let mut layers = vec![Vec::new(); layer_count];
        // Node indices ascend, so each layer starts in insertion order.
        for idx in graph.node_indices() {
            if let Some(&rank) = ranks.get(&idx) {
                layers[rank as usize].push(idx);
            }
        }
        layers
    }

    /// One downward barycenter pass: order each layer by the mean slot of its
    /// parents in the layer above. Stable, so ties keep insertion order.
    fn order_layers_by_barycenter(
        graph: &Graph,
        layers: &mut [Vec<NodeIndex>],
        ranks: &HashMap<NodeIndex, i32>,
    ) {
        let mut slots: HashMap<NodeIndex, f32> = HashMap::new();
        for layer in layers.iter_mut() {
            let mut barycenters: HashMap<NodeIndex, f32> = HashMap::with_capacity(layer.len());
            for (j, &idx) in layer.iter().enumerate() {
                let rank = ranks[&idx];
                let mut sum = 0.0;
                let mut count = 0;
                for &edge_idx in graph.incoming(idx) {
                    let source = graph[edge_idx].source_idx;
                    if ranks.get(&source).is_some_and(|&r| r < rank)
                        && let Some(&slot) = slots.get(&source)
                    {
                        sum += slot;
                        count += 1;
                    }
                }
                let barycenter = if count > 0 { sum / count as f32 } else { j as f32 };
                barycenters.insert(idx, barycenter);
            }

            layer.sort_by(|a, b| barycenters[a].total_cmp(&barycenters[b]));
            for (j, &idx) in layer.iter().enumerate() {
                slots.insert(idx, j as f32);
            }
        }
    }

    fn layer_extent(&self, count: usize) -> f32 {
        let c = &self.config;
        count as f32 * c.node_width + count.saturating_sub(1) as f32 * c.column_gap
    }
}

impl Layouter for LayeredLayouter {
    fn execute(&self, graph: &Graph) -> Layout {
        let c = self.config;
        let node_size = Vec2::new(c.node_width, c.node_height);
        let ranks = assign_layers(graph);
        let mut layers = Self::build_layers(graph, &ranks);
        Self::order_layers_by_barycenter(graph, &mut layers, &ranks);

        let mut placed: Vec<(NodeIndex, Vec2)> = Vec::with_capacity(graph.node_count());
        for (rank, layer) in layers.iter().enumerate() {
            let extent = self.layer_extent(layer.len());
            let start_x = (c.canvas_width - extent) / 2.0;
            let y = c.padding + rank as f32 * c.row_height;
            for (j, &idx) in layer.iter().enumerate() {
                let position = graph[idx].position.unwrap_or_else(|| {
                    Vec2::new(start_x + j as f32 * (c.node_width + c.column_gap), y)
                });
                placed.push((idx, position));
            }
        }

        // Keep everything inside the padded positive quadrant.
        let min_x = placed.iter().map(|(_, p)| p.x).fold(f32::INFINITY, f32::min);
        let min_y = placed.iter().map(|(_, p)| p.y).fold(f32::INFINITY, f32::min);
        let shift = Vec2::new(
            if min_x < c.padding { c.padding - min_x } else { 0.0 },
            if min_y < c.padding { c.padding - min_y } else { 0.0 },
        );

        let mut positions = HashMap::with_capacity(placed.len());
        let mut max_x: f32 = 0.0;
        let mut max_y: f32 = 0.0;
        for (idx, p) in placed {
            let p = p + shift;
            max_x = max_x.max(p.x + c.node_width);
            max_y = max_y.max(p.y + c.node_height);
            positions.insert(graph[idx].id.clone(), p);
        }

        let layers = ranks
            .into_iter()
            .map(|(idx, rank)| (graph[idx].id.clone(), rank))
            .collect();

        Layout {
            positions,
            layers,
            node_size,
            row_height: c.row_height,
            bounding_width: (max_x + c.padding).max(c.min_width),
            bounding_height: (max_y + c.padding).max(c.min_height),
        }
    }
}

/// Layout memoized per graph instance.
#[derive(Debug, Default)]
pub struct LayoutCache {
    layouter: LayeredLayouter,
    memo: IdentityMemo<Graph, Layout>,
}

impl LayoutCache {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            layouter: LayeredLayouter::new(config),
            memo: IdentityMemo::default(),
        }
    }

    pub fn layout(&mut self, graph: &Arc<Graph>) -> Arc<Layout> {
        let layouter = self.layouter;
        self.memo.get_or_compute(graph, |g| {
            tracing::debug!("computing layout for {} nodes", g.node_count());
            layouter.execute(g)
        })
    }
}
