use proptest::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracegraph_core::{
    EdgeKind, ExecutionTrace, GraphStructure, NodeId, NodeKind, RawEdge, RawNode,
};
use tracegraph_graph::{
    EdgeRouter, ExecutionOverlay, GraphModel, GraphViewer, LayeredLayouter, Layouter, NodeStatus,
    ViewportController, assign_layers, classify_loops,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn loop_ids(structure: &GraphStructure) -> Vec<String> {
    let graph = GraphModel::normalize(structure);
    let layout = LayeredLayouter::default().execute(&graph);
    let mut ids: Vec<String> = classify_loops(&graph, &layout)
        .into_iter()
        .map(|idx| graph[idx].id.to_string())
        .collect();
    ids.sort();
    ids
}

#[test]
fn test_agent_loop_layers_and_back_edge() -> anyhow::Result<()> {
    let structure = GraphStructure::from_path(fixture("agent_loop.json"))?;
    let graph = GraphModel::normalize(&structure);
    let layout = LayeredLayouter::default().execute(&graph);

    for (id, layer) in [
        ("START", 0),
        ("init", 1),
        ("agent", 2),
        ("tools", 3),
        ("end", 4),
        ("END", 5),
    ] {
        assert_eq!(layout.layer(&NodeId::from(id)), Some(layer), "layer of {id}");
    }
    assert_eq!(loop_ids(&structure), vec!["tools->agent"]);

    let paths = EdgeRouter::default().route_all(&graph, &layout);
    let forward = paths
        .iter()
        .find(|p| p.id.as_str() == "agent->tools")
        .expect("forward edge is routed");
    assert!(!forward.is_loop);
    Ok(())
}

#[test]
fn test_paused_trace_marks_pending_node() -> anyhow::Result<()> {
    let structure = GraphStructure::from_path(fixture("agent_loop.json"))?;
    let trace = ExecutionTrace::from_path(fixture("paused_trace.json"))?;
    let graph = GraphModel::normalize(&structure);
    let layout = LayeredLayouter::default().execute(&graph);

    let overlay = ExecutionOverlay::default().compute(&graph, &layout, Some(&trace));

    let visited: Vec<&str> = overlay.visited_nodes.iter().map(NodeId::as_str).collect();
    assert_eq!(visited, vec!["agent", "init"]);
    assert_eq!(overlay.current_node, Some(NodeId::from("tools")));
    assert_eq!(overlay.node_status(&"tools".into()), NodeStatus::Current);
    assert_eq!(overlay.durations_ms[&NodeId::from("agent")], 840);
    Ok(())
}

#[test]
fn test_langgraph_document_normalizes() -> anyhow::Result<()> {
    let structure = GraphStructure::from_path(fixture("langgraph_router.json"))?;
    let graph = GraphModel::normalize(&structure);

    assert_eq!(graph.dropped_edge_count(), 1);
    assert_eq!(graph.node_count(), 6);
    let router = graph.node(&"risk_check".into()).expect("router node");
    assert!(router.is_decision);
    assert_eq!(router.kind, NodeKind::Decision);

    let escalate = graph
        .edges_between(&"risk_check".into(), &"advisor".into())
        .next()
        .expect("synthesized branch edge");
    assert_eq!(escalate.kind, EdgeKind::Conditional);
    assert_eq!(escalate.display_label(), Some("escalate"));
    assert_eq!(graph.edges_between(&"advisor".into(), &NodeId::end()).count(), 1);
    assert_eq!(graph.edges_between(&"risk_check".into(), &NodeId::end()).count(), 1);

    assert_eq!(loop_ids(&structure), vec!["risk_check->tools", "tools->agent"]);
    Ok(())
}

#[test]
fn test_fit_large_graph_into_small_container() {
    let mut controller = ViewportController::default();
    controller.set_container(800.0, 600.0);
    controller.set_bounds(1200.0, 900.0);

    let v = controller.viewport();
    assert!((v.scale - 0.6333).abs() < 1e-3);
    let bottom_right = v.graph_to_screen(tracegraph_graph::Vec2::new(1200.0, 900.0));
    let top_left = v.graph_to_screen(tracegraph_graph::Vec2::ZERO);
    assert!((top_left.x - (800.0 - bottom_right.x)).abs() < 1e-3);
    assert!((top_left.y - (600.0 - bottom_right.y)).abs() < 1e-3);
}

#[test]
fn test_reset_twice_after_pan_and_zoom() {
    let mut controller = ViewportController::default();
    controller.set_container(800.0, 600.0);
    controller.set_bounds(1200.0, 900.0);
    let fitted = controller.viewport();

    controller.pointer_down(400.0, 300.0, true);
    controller.pointer_move(250.0, 120.0);
    controller.pointer_up();
    controller.wheel(-1.0, 100.0, 100.0);
    controller.zoom_in();

    controller.reset();
    let first = controller.viewport();
    controller.reset();
    assert_eq!(first, fitted);
    assert_eq!(controller.viewport(), fitted);
}

#[test]
fn test_viewer_renders_fixture_with_trace() -> anyhow::Result<()> {
    let structure = Arc::new(GraphStructure::from_path(fixture("agent_loop.json"))?);
    let trace = Arc::new(ExecutionTrace::from_path(fixture("paused_trace.json"))?);

    let mut viewer = GraphViewer::default();
    viewer.set_container(800.0, 600.0);
    viewer.load_graph(structure);
    viewer.load_trace(Some(trace));
    let frame = viewer.frame().expect("frame after graph load");

    let tools = frame
        .nodes
        .iter()
        .find(|n| n.id.as_str() == "tools")
        .expect("tools node");
    assert_eq!(tools.visual.status, NodeStatus::Current);
    let end = frame.nodes.iter().find(|n| n.id.as_str() == "end").expect("end node");
    assert!(end.visual.opacity < 1.0);

    let looped = frame
        .edges
        .iter()
        .find(|e| e.route.id.as_str() == "tools->agent")
        .expect("loop edge");
    assert!(looped.route.is_loop);
    assert!(looped.svg_path.contains(" C "));
    Ok(())
}

#[test]
fn test_settings_file_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tracegraph.json");
    std::fs::write(&path, r#"{"style": "monochrome", "viewport": {"min_scale": 0.5}}"#)?;

    let settings = tracegraph_graph::EngineSettings::load(&path)?;
    assert_eq!(settings.style, tracegraph_graph::StylePreset::Monochrome);
    assert_eq!(settings.viewport.min_scale, 0.5);
    Ok(())
}

fn structure_strategy() -> impl Strategy<Value = GraphStructure> {
    (1usize..12).prop_flat_map(|count| {
        let edges = proptest::collection::vec((0..count + 2, 0..count + 2), 0..count * 2);
        let finals = proptest::collection::vec(any::<bool>(), count);
        (Just(count), edges, finals, proptest::option::of(0..count))
    })
    .prop_map(|(count, edges, finals, entry)| {
        let names: Vec<String> = (0..count).map(|i| format!("n{i}")).collect();
        let name = |i: usize| names.get(i).cloned().unwrap_or_else(|| format!("missing{i}"));
        GraphStructure {
            nodes: names
                .iter()
                .zip(&finals)
                .map(|(id, &is_final)| {
                    let node = RawNode::new(id.clone());
                    if is_final { node.terminal() } else { node }
                })
                .collect(),
            edges: edges.into_iter().map(|(s, t)| RawEdge::new(name(s), name(t))).collect(),
            entry_point: entry.map(name),
            conditional_edges: Vec::new(),
        }
    })
}

proptest! {
    #[test]
    fn prop_layout_is_deterministic(structure in structure_strategy()) {
        let first = LayeredLayouter::default().execute(&GraphModel::normalize(&structure));
        let second = LayeredLayouter::default().execute(&GraphModel::normalize(&structure.clone()));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_normalized_edges_reference_known_nodes(structure in structure_strategy()) {
        let graph = GraphModel::normalize(&structure);
        for edge in graph.edges() {
            prop_assert!(graph.contains(&edge.source));
            prop_assert!(graph.contains(&edge.target));
            prop_assert_eq!(&graph[edge.source_idx].id, &edge.source);
            prop_assert_eq!(&graph[edge.target_idx].id, &edge.target);
        }
        let layers = assign_layers(&graph);
        prop_assert_eq!(layers.len(), graph.node_count());
    }

    #[test]
    fn prop_every_node_is_laid_out_inside_bounds(structure in structure_strategy()) {
        let graph = GraphModel::normalize(&structure);
        let layout = LayeredLayouter::default().execute(&graph);
        prop_assert_eq!(layout.positions.len(), graph.node_count());
        for p in layout.positions.values() {
            prop_assert!(p.x >= 0.0 && p.y >= 0.0);
            prop_assert!(p.x + layout.node_size.x <= layout.bounding_width);
            prop_assert!(p.y + layout.node_size.y <= layout.bounding_height);
        }
    }
}
