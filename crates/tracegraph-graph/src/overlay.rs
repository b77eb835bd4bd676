//! Execution overlay: which parts of the graph a trace touched.
//!
//! Every reference in the trace is resolved against the graph; ids the graph
//! does not know are silently excluded.

use crate::edge_router::classify_loops;
use crate::graph::{EdgeIndex, Graph, NodeIndex, canonical_id};
use crate::layout::Layout;
use crate::memo::Memo;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tracegraph_core::{EdgeId, ExecutionTrace, Handoff, NodeId};

/// Trace data resolved against a graph, handed to an [`EdgeInference`].
pub struct InferenceContext<'a> {
    pub graph: &'a Graph,
    pub layout: &'a Layout,
    pub trace: &'a ExecutionTrace,
    /// Resolved trace visits in execution order.
    pub visits: &'a [NodeIndex],
    pub visited: &'a HashSet<NodeIndex>,
    pub current: Option<NodeIndex>,
}

impl InferenceContext<'_> {
    fn layer(&self, index: NodeIndex) -> Option<i32> {
        self.layout.layer(&self.graph[index].id)
    }

    /// The most recently visited node.
    pub fn last_visit(&self) -> Option<NodeIndex> {
        self.visits.last().copied()
    }
}

/// Strategy deciding which edges were traversed when the trace carries only
/// node visits.
pub trait EdgeInference: fmt::Debug + Send + Sync {
    fn infer(&self, ctx: &InferenceContext<'_>) -> Vec<EdgeIndex>;
}

/// Edges between visited nodes on adjacent layers. The most recent visit may
/// also reach the pending node; if so, those edges win over its others.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerAdjacentInference;

impl EdgeInference for LayerAdjacentInference {
    fn infer(&self, ctx: &InferenceContext<'_>) -> Vec<EdgeIndex> {
        let last = ctx.last_visit();
        let mut inferred = Vec::new();
        let mut from_last = Vec::new();

        for idx in ctx.graph.edge_indices() {
            let edge = &ctx.graph[idx];
            if !ctx.visited.contains(&edge.source_idx) {
                continue;
            }
            let adjacent = match (ctx.layer(edge.source_idx), ctx.layer(edge.target_idx)) {
                (Some(s), Some(t)) => (t - s).abs() == 1,
                _ => false,
            };
            if !adjacent {
                continue;
            }

            let reaches_current =
                Some(edge.source_idx) == last && Some(edge.target_idx) == ctx.current;
            if Some(edge.source_idx) == last {
                if ctx.visited.contains(&edge.target_idx) || reaches_current {
                    from_last.push((idx, reaches_current));
                }
            } else if ctx.visited.contains(&edge.target_idx) {
                inferred.push(idx);
            }
        }

        if from_last.len() > 1 && from_last.iter().any(|(_, current)| *current) {
            from_last.retain(|(_, current)| *current);
        }
        inferred.extend(from_last.into_iter().map(|(idx, _)| idx));
        inferred.sort_unstable();
        inferred
    }
}

/// Edges between consecutive trace records, plus last visit to pending node.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceInference;

impl EdgeInference for SequenceInference {
    fn infer(&self, ctx: &InferenceContext<'_>) -> Vec<EdgeIndex> {
        let mut steps: Vec<(NodeIndex, NodeIndex)> =
            ctx.visits.windows(2).map(|w| (w[0], w[1])).collect();
        if let (Some(last), Some(current)) = (ctx.last_visit(), ctx.current) {
            steps.push((last, current));
        }

        let mut inferred: Vec<EdgeIndex> = steps
            .into_iter()
            .flat_map(|(source, target)| {
                ctx.graph
                    .outgoing(source)
                    .iter()
                    .copied()
                    .filter(move |&e| ctx.graph[e].target_idx == target)
            })
            .collect();
        inferred.sort_unstable();
        inferred.dedup();
        inferred
    }
}

/// Display state of a node under an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Unvisited,
    Visited,
    /// Pending execution; overrides `Visited`.
    Current,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub visited_nodes: BTreeSet<NodeId>,
    pub visited_edges: BTreeSet<EdgeId>,
    pub current_node: Option<NodeId>,
    pub loop_highlights: BTreeSet<EdgeId>,
    pub visit_counts: BTreeMap<NodeId, u32>,
    pub durations_ms: BTreeMap<NodeId, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<Handoff>,
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        self.visited_nodes.is_empty()
            && self.visited_edges.is_empty()
            && self.current_node.is_none()
    }

    pub fn node_status(&self, id: &NodeId) -> NodeStatus {
        if self.current_node.as_ref() == Some(id) {
            NodeStatus::Current
        } else if self.visited_nodes.contains(id) {
            NodeStatus::Visited
        } else {
            NodeStatus::Unvisited
        }
    }

    pub fn is_edge_visited(&self, id: &EdgeId) -> bool {
        self.visited_edges.contains(id)
    }

    pub fn is_loop_highlight(&self, id: &EdgeId) -> bool {
        self.loop_highlights.contains(id)
    }
}

/// Computes overlays with a configurable edge inference strategy.
#[derive(Debug)]
pub struct ExecutionOverlay {
    inference: Box<dyn EdgeInference>,
}

impl Default for ExecutionOverlay {
    fn default() -> Self {
        Self::new(Box::new(LayerAdjacentInference))
    }
}

fn resolve(graph: &Graph, id: &NodeId) -> Option<NodeIndex> {
    graph.index_of(&NodeId::new(canonical_id(id.as_str())))
}

impl ExecutionOverlay {
    pub fn new(inference: Box<dyn EdgeInference>) -> Self {
        Self { inference }
    }

    pub fn compute(
        &self,
        graph: &Graph,
        layout: &Layout,
        trace: Option<&ExecutionTrace>,
    ) -> Overlay {
        let Some(trace) = trace else {
            return Overlay::default();
        };

        let visits: Vec<NodeIndex> = trace
            .nodes
            .iter()
            .filter_map(|visit| resolve(graph, &visit.id))
            .collect();

        let mut visited: HashSet<NodeIndex> = visits.iter().copied().collect();
        if let Some(entry) = graph.entry_point().and_then(|id| graph.index_of(id)) {
            visited.insert(entry);
        }

        let current = trace
            .current_node
            .as_ref()
            .and_then(|id| resolve(graph, id));

        let edge_indices: Vec<EdgeIndex> = if trace.edges.is_empty() {
            let ctx = InferenceContext {
                graph,
                layout,
                trace,
                visits: &visits,
                visited: &visited,
                current,
            };
            self.inference.infer(&ctx)
        } else {
            trace
                .edges
                .iter()
                .filter_map(|e| Some((resolve(graph, &e.source)?, resolve(graph, &e.target)?)))
                .flat_map(|(source, target)| {
                    graph
                        .outgoing(source)
                        .iter()
                        .copied()
                        .filter(move |&e| graph[e].target_idx == target)
                })
                .collect()
        };

        let loops = classify_loops(graph, layout);
        let mut overlay = Overlay {
            visited_nodes: visited.iter().map(|&idx| graph[idx].id.clone()).collect(),
            current_node: current.map(|idx| graph[idx].id.clone()),
            ..Overlay::default()
        };
        for idx in edge_indices {
            let id = graph[idx].id.clone();
            if loops.contains(&idx) {
                overlay.loop_highlights.insert(id.clone());
            }
            overlay.visited_edges.insert(id);
        }

        for visit in &trace.nodes {
            let Some(idx) = resolve(graph, &visit.id) else {
                continue;
            };
            let id = &graph[idx].id;
            let count = overlay.visit_counts.entry(id.clone()).or_default();
            *count = count.saturating_add(1);
            if let Some(duration) = visit.duration_ms {
                let total = overlay.durations_ms.entry(id.clone()).or_default();
                *total = total.saturating_add(duration);
            }
        }

        overlay.handoff = trace.handoff.as_ref().filter(|h| h.occurred).map(|h| Handoff {
            occurred: true,
            reason: h.reason.clone(),
            at_node: h
                .at_node
                .as_ref()
                .and_then(|id| resolve(graph, id))
                .or(visits.last().copied())
                .map(|idx| graph[idx].id.clone()),
        });

        overlay
    }
}

type OverlayKey = ((Arc<Graph>, Arc<Layout>), Option<Arc<ExecutionTrace>>);

/// Overlay memoized on the identity of its graph, layout and trace.
#[derive(Debug, Default)]
pub struct OverlayCache {
    overlay: ExecutionOverlay,
    memo: Memo<OverlayKey, Overlay>,
}

impl OverlayCache {
    pub fn new(overlay: ExecutionOverlay) -> Self {
        Self {
            overlay,
            memo: Memo::default(),
        }
    }

    pub fn overlay(
        &mut self,
        graph: &Arc<Graph>,
        layout: &Arc<Layout>,
        trace: Option<&Arc<ExecutionTrace>>,
    ) -> Arc<Overlay> {
        let key = ((Arc::clone(graph), Arc::clone(layout)), trace.cloned());
        let overlay = &self.overlay;
        self.memo.get_or_compute(&key, |((g, l), t)| {
            tracing::debug!("computing execution overlay");
            overlay.compute(g, l, t.as_deref())
        })
    }
}
