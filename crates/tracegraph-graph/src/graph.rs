use crate::memo::IdentityMemo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use tracegraph_core::{
    EdgeId, EdgeKind, END_ID, GraphStructure, NodeId, NodeKind, RawEdge, RawNode, START_ID, Vec2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub usize);

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeIndex(pub usize);

impl fmt::Display for EdgeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    /// Explicit position from the structure document; overrides layering.
    pub position: Option<Vec2>,
    pub is_final: bool,
    /// Source of at least one conditional branch table.
    pub is_decision: bool,
    /// Synthetic START/END node.
    pub boundary: bool,
}

impl GraphNode {
    fn from_raw(raw: &RawNode) -> Self {
        let id = NodeId::new(canonical_id(&raw.id));
        let boundary = is_boundary_id(id.as_str());
        Self {
            label: raw.label.clone().unwrap_or_else(|| raw.id.clone()),
            kind: raw.resolved_kind(),
            position: raw.position,
            is_final: raw.is_final,
            is_decision: false,
            boundary,
            id,
        }
    }

    fn start() -> Self {
        Self {
            id: NodeId::start(),
            label: START_ID.to_string(),
            kind: NodeKind::Start,
            position: None,
            is_final: false,
            is_decision: false,
            boundary: true,
        }
    }

    fn end() -> Self {
        Self {
            id: NodeId::end(),
            label: END_ID.to_string(),
            kind: NodeKind::End,
            position: None,
            is_final: false,
            is_decision: false,
            boundary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub label: Option<String>,
    pub condition: Option<String>,
    pub kind: EdgeKind,
    pub source_idx: NodeIndex,
    pub target_idx: NodeIndex,
}

impl GraphEdge {
    /// Text to draw next to the edge, if any.
    pub fn display_label(&self) -> Option<&str> {
        self.label.as_deref().or(self.condition.as_deref())
    }

    pub fn is_self_loop(&self) -> bool {
        self.source_idx == self.target_idx
    }
}

/// Canonical, immutable execution graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    node_map: HashMap<NodeId, NodeIndex>,
    outgoing: Vec<Vec<EdgeIndex>>,
    incoming: Vec<Vec<EdgeIndex>>,
    entry_point: Option<NodeId>,
    dropped_edges: usize,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> {
        (0..self.edges.len()).map(EdgeIndex)
    }

    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_map.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.index_of(id).map(|idx| &self.nodes[idx.0])
    }

    /// Outgoing edges of a node, in edge insertion order.
    pub fn outgoing(&self, index: NodeIndex) -> &[EdgeIndex] {
        self.outgoing.get(index.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn incoming(&self, index: NodeIndex) -> &[EdgeIndex] {
        self.incoming.get(index.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All edges running from `source` to `target`.
    pub fn edges_between<'a>(
        &'a self,
        source: &NodeId,
        target: &NodeId,
    ) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        let target_idx = self.index_of(target);
        self.index_of(source)
            .into_iter()
            .flat_map(move |idx| self.outgoing(idx).iter())
            .map(move |&edge_idx| &self.edges[edge_idx.0])
            .filter(move |edge| Some(edge.target_idx) == target_idx)
    }

    pub fn entry_point(&self) -> Option<&NodeId> {
        self.entry_point.as_ref()
    }

    /// Where traversal starts: the START boundary if present, else the entry point.
    pub fn root(&self) -> Option<NodeIndex> {
        self.index_of(&NodeId::start())
            .or_else(|| self.entry_point.as_ref().and_then(|id| self.index_of(id)))
    }

    pub fn is_boundary(&self, index: NodeIndex) -> bool {
        self.nodes.get(index.0).is_some_and(|n| n.boundary)
    }

    /// Edges dropped during normalization because an endpoint was unknown.
    pub fn dropped_edge_count(&self) -> usize {
        self.dropped_edges
    }
}

impl Index<NodeIndex> for Graph {
    type Output = GraphNode;
    fn index(&self, index: NodeIndex) -> &Self::Output {
        &self.nodes[index.0]
    }
}

impl Index<EdgeIndex> for Graph {
    type Output = GraphEdge;
    fn index(&self, index: EdgeIndex) -> &Self::Output {
        &self.edges[index.0]
    }
}

/// Map external boundary aliases onto START/END.
pub(crate) fn canonical_id(id: &str) -> &str {
    match id {
        "__start__" => START_ID,
        "__end__" => END_ID,
        other => other,
    }
}

fn is_boundary_id(id: &str) -> bool {
    id == START_ID || id == END_ID
}

struct PendingEdge {
    id: EdgeId,
    source: NodeId,
    target: NodeId,
    label: Option<String>,
    condition: Option<String>,
    kind: EdgeKind,
}

impl PendingEdge {
    fn from_raw(raw: &RawEdge) -> Self {
        let source = NodeId::new(canonical_id(&raw.source));
        let target = NodeId::new(canonical_id(&raw.target));
        Self {
            id: raw
                .id
                .clone()
                .map(EdgeId::new)
                .unwrap_or_else(|| EdgeId::between(&source, &target)),
            kind: raw.kind(),
            label: raw.label.clone(),
            condition: raw.condition.clone(),
            source,
            target,
        }
    }

    fn plain(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::between(&source, &target),
            source,
            target,
            label: None,
            condition: None,
            kind: EdgeKind::Normal,
        }
    }
}

#[derive(Default)]
struct GraphBuilder {
    start: Option<GraphNode>,
    body: Vec<GraphNode>,
    body_map: HashMap<NodeId, usize>,
    end: Option<GraphNode>,
    edges: Vec<PendingEdge>,
    edge_slots: HashMap<EdgeId, usize>,
}

impl GraphBuilder {
    fn upsert_node(&mut self, node: GraphNode) {
        match self.body_map.get(&node.id) {
            Some(&slot) => self.body[slot] = node,
            None => {
                self.body_map.insert(node.id.clone(), self.body.len());
                self.body.push(node);
            }
        }
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.body_map.contains_key(id)
            || (self.start.is_some() && id.as_str() == START_ID)
            || (self.end.is_some() && id.as_str() == END_ID)
    }

    fn ensure_start(&mut self) {
        if !self.contains(&NodeId::start()) {
            self.start = Some(GraphNode::start());
        }
    }

    fn ensure_end(&mut self) {
        if !self.contains(&NodeId::end()) {
            self.end = Some(GraphNode::end());
        }
    }

    fn has_pair(&self, source: &NodeId, target: &NodeId) -> bool {
        self.edges
            .iter()
            .any(|e| &e.source == source && &e.target == target)
    }

    /// Insert an edge; a repeated id replaces the earlier edge in place.
    fn push_edge(&mut self, edge: PendingEdge) {
        if let Some(&slot) = self.edge_slots.get(&edge.id) {
            self.edges[slot] = edge;
            return;
        }
        self.edge_slots.insert(edge.id.clone(), self.edges.len());
        self.edges.push(edge);
    }

    /// Synthesized ids never replace caller-supplied edges.
    fn push_synthetic_edge(&mut self, mut edge: PendingEdge) {
        let mut suffix = 1;
        let base = edge.id.clone();
        while self.edge_slots.contains_key(&edge.id) {
            suffix += 1;
            edge.id = EdgeId::new(format!("{}#{}", base, suffix));
        }
        self.push_edge(edge);
    }

    fn body_node_mut(&mut self, id: &NodeId) -> Option<&mut GraphNode> {
        self.body_map.get(id).map(|&slot| &mut self.body[slot])
    }

    fn finish(self, entry_point: Option<NodeId>) -> Graph {
        let mut nodes = Vec::with_capacity(self.body.len() + 2);
        nodes.extend(self.start);
        nodes.extend(self.body);
        nodes.extend(self.end);

        let node_map: HashMap<NodeId, NodeIndex> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), NodeIndex(i)))
            .collect();

        let mut edges = Vec::with_capacity(self.edges.len());
        let mut dropped_edges = 0;
        for pending in self.edges {
            let source_idx = node_map.get(&pending.source).copied();
            let target_idx = node_map.get(&pending.target).copied();
            let (Some(source_idx), Some(target_idx)) = (source_idx, target_idx) else {
                tracing::warn!(
                    "Dropping edge {} because {} is missing from the graph",
                    pending.id,
                    if source_idx.is_none() {
                        &pending.source
                    } else {
                        &pending.target
                    }
                );
                dropped_edges += 1;
                continue;
            };
            edges.push(GraphEdge {
                id: pending.id,
                source: pending.source,
                target: pending.target,
                label: pending.label,
                condition: pending.condition,
                kind: pending.kind,
                source_idx,
                target_idx,
            });
        }

        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (i, edge) in edges.iter().enumerate() {
            outgoing[edge.source_idx.0].push(EdgeIndex(i));
            incoming[edge.target_idx.0].push(EdgeIndex(i));
        }

        Graph {
            nodes,
            edges,
            node_map,
            outgoing,
            incoming,
            entry_point,
            dropped_edges,
        }
    }
}

/// Normalizes structure documents into canonical graphs.
///
/// Holds a one-entry cache keyed by the identity of the last document, so
/// re-rendering the same `Arc<GraphStructure>` never re-normalizes it.
#[derive(Debug, Default)]
pub struct GraphModel {
    cache: IdentityMemo<GraphStructure, Graph>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure normalization of a structure document.
    pub fn normalize(structure: &GraphStructure) -> Graph {
        let mut builder = GraphBuilder::default();
        for raw in &structure.nodes {
            builder.upsert_node(GraphNode::from_raw(raw));
        }

        let raw_edges: Vec<PendingEdge> =
            structure.edges.iter().map(PendingEdge::from_raw).collect();

        // Edges pointing at the exit alias pull in the END boundary.
        let end_id = NodeId::end();
        let start_id = NodeId::start();
        if raw_edges.iter().any(|e| e.target == end_id) {
            builder.ensure_end();
        }
        if raw_edges.iter().any(|e| e.source == start_id) {
            builder.ensure_start();
        }

        let entry_point = structure
            .entry_point
            .as_deref()
            .map(|id| NodeId::new(canonical_id(id)))
            .filter(|id| {
                let known = builder.contains(id);
                if !known {
                    tracing::warn!("Ignoring entry point {} that is not a graph node", id);
                }
                known
            });

        if let Some(entry) = entry_point.as_ref().filter(|id| **id != start_id) {
            builder.ensure_start();
            let already_linked = raw_edges
                .iter()
                .any(|e| e.source == start_id && &e.target == entry);
            if !already_linked {
                builder.push_synthetic_edge(PendingEdge::plain(start_id.clone(), entry.clone()));
            }
        }

        for edge in raw_edges {
            builder.push_edge(edge);
        }

        for conditional in &structure.conditional_edges {
            let source = NodeId::new(canonical_id(&conditional.source));
            let Some(node) = builder.body_node_mut(&source) else {
                tracing::warn!(
                    "Ignoring conditional edges of unknown node {}",
                    conditional.source
                );
                continue;
            };
            node.is_decision = true;
            if node.kind == NodeKind::Generic {
                node.kind = NodeKind::Decision;
            }

            for (branch, target) in &conditional.branches {
                let target = NodeId::new(canonical_id(target));
                if target == end_id {
                    builder.ensure_end();
                }
                let mut annotated = false;
                for edge in builder
                    .edges
                    .iter_mut()
                    .filter(|e| e.source == source && e.target == target)
                {
                    edge.kind = EdgeKind::Conditional;
                    if edge.label.is_none() {
                        edge.label = Some(branch.clone());
                    }
                    annotated = true;
                }
                if !annotated {
                    let mut edge = PendingEdge::plain(source.clone(), target);
                    edge.kind = EdgeKind::Conditional;
                    edge.label = Some(branch.clone());
                    edge.condition = Some(branch.clone());
                    builder.push_synthetic_edge(edge);
                }
            }
        }

        let finals: Vec<NodeId> = builder
            .body
            .iter()
            .filter(|n| n.is_final && n.id != end_id)
            .map(|n| n.id.clone())
            .collect();
        if !finals.is_empty() {
            builder.ensure_end();
        }
        for id in finals {
            if !builder.has_pair(&id, &end_id) {
                builder.push_synthetic_edge(PendingEdge::plain(id, end_id.clone()));
            }
        }

        builder.finish(entry_point)
    }

    /// Normalize, reusing the previous result when `structure` is the same allocation.
    pub fn normalize_cached(&mut self, structure: &Arc<GraphStructure>) -> Arc<Graph> {
        self.cache.get_or_compute(structure, |s| {
            tracing::debug!("normalizing graph structure ({} nodes)", s.nodes.len());
            Self::normalize(s)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegraph_core::ConditionalEdge;

    fn structure(nodes: &[&str], edges: &[(&str, &str)]) -> GraphStructure {
        GraphStructure {
            nodes: nodes.iter().map(|id| RawNode::new(*id)).collect(),
            edges: edges.iter().map(|(s, t)| RawEdge::new(*s, *t)).collect(),
            entry_point: None,
            conditional_edges: Vec::new(),
        }
    }

    #[test]
    fn test_duplicate_nodes_last_write_wins() {
        let mut doc = structure(&["a", "b"], &[]);
        doc.nodes.push(RawNode::new("a").with_label("Second"));

        let graph = GraphModel::normalize(&doc);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.nodes()[0].id.as_str(), "a");
        assert_eq!(graph.nodes()[0].label, "Second");
    }

    #[test]
    fn test_edges_to_unknown_nodes_are_dropped() {
        let doc = structure(&["a", "b"], &[("a", "b"), ("a", "ghost"), ("ghost", "b")]);

        let graph = GraphModel::normalize(&doc);

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dropped_edge_count(), 2);
    }

    #[test]
    fn test_entry_point_injects_start_boundary() {
        let mut doc = structure(&["init", "agent"], &[("init", "agent")]);
        doc.entry_point = Some("init".to_string());

        let graph = GraphModel::normalize(&doc);

        let start = graph.index_of(&NodeId::start()).unwrap();
        assert_eq!(start, NodeIndex(0));
        assert!(graph.is_boundary(start));
        assert_eq!(graph.edges_between(&NodeId::start(), &"init".into()).count(), 1);
        assert_eq!(graph.root(), Some(start));
    }

    #[test]
    fn test_existing_start_edge_is_not_duplicated() {
        let mut doc = structure(&["START", "init"], &[("START", "init")]);
        doc.entry_point = Some("init".to_string());

        let graph = GraphModel::normalize(&doc);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_missing_entry_point_skips_start() {
        let doc = structure(&["a", "b"], &[("a", "b")]);
        let graph = GraphModel::normalize(&doc);
        assert!(graph.index_of(&NodeId::start()).is_none());
        assert!(graph.root().is_none());
    }

    #[test]
    fn test_final_nodes_link_to_end() {
        let mut doc = structure(&["agent", "report"], &[("agent", "report")]);
        doc.nodes[1].is_final = true;

        let graph = GraphModel::normalize(&doc);

        let end = graph.index_of(&NodeId::end()).unwrap();
        assert_eq!(end.0, graph.node_count() - 1);
        assert_eq!(graph.edges_between(&"report".into(), &NodeId::end()).count(), 1);
    }

    #[test]
    fn test_langgraph_aliases_map_to_boundaries() {
        let doc = structure(&["agent"], &[("__start__", "agent"), ("agent", "__end__")]);

        let graph = GraphModel::normalize(&doc);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.contains(&NodeId::start()));
        assert!(graph.contains(&NodeId::end()));
    }

    #[test]
    fn test_conditional_edges_mark_decision_and_label_edges() {
        let mut doc = structure(&["route", "tools", "answer"], &[("route", "tools")]);
        doc.conditional_edges.push(ConditionalEdge {
            source: "route".to_string(),
            branches: [
                ("call_tool".to_string(), "tools".to_string()),
                ("respond".to_string(), "answer".to_string()),
                ("stop".to_string(), "__end__".to_string()),
            ]
            .into_iter()
            .collect(),
        });

        let graph = GraphModel::normalize(&doc);

        let route = graph.node(&"route".into()).unwrap();
        assert!(route.is_decision);
        assert_eq!(route.kind, NodeKind::Decision);

        let existing = graph.edges_between(&"route".into(), &"tools".into()).next().unwrap();
        assert_eq!(existing.kind, EdgeKind::Conditional);
        assert_eq!(existing.label.as_deref(), Some("call_tool"));

        let synthesized = graph.edges_between(&"route".into(), &"answer".into()).next().unwrap();
        assert_eq!(synthesized.kind, EdgeKind::Conditional);
        assert_eq!(synthesized.display_label(), Some("respond"));

        assert_eq!(graph.edges_between(&"route".into(), &NodeId::end()).count(), 1);
    }

    #[test]
    fn test_adjacency_index() {
        let doc = structure(&["a", "b", "c"], &[("a", "b"), ("a", "c"), ("b", "c")]);
        let graph = GraphModel::normalize(&doc);

        let a = graph.index_of(&"a".into()).unwrap();
        let c = graph.index_of(&"c".into()).unwrap();
        assert_eq!(graph.outgoing(a).len(), 2);
        assert_eq!(graph.incoming(c).len(), 2);
        let targets: Vec<&str> = graph
            .outgoing(a)
            .iter()
            .map(|&e| graph[graph[e].target_idx].id.as_str())
            .collect();
        assert_eq!(targets, vec!["b", "c"]);
    }

    #[test]
    fn test_normalize_cached_reuses_same_allocation() {
        let mut model = GraphModel::new();
        let doc = Arc::new(structure(&["a", "b"], &[("a", "b")]));

        let first = model.normalize_cached(&doc);
        let second = model.normalize_cached(&doc);
        assert!(Arc::ptr_eq(&first, &second));

        let copy = Arc::new((*doc).clone());
        let third = model.normalize_cached(&copy);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }
}
