use crate::edge_router::{EdgePath, EdgeRouter};
use crate::graph::{Graph, GraphModel};
use crate::hit_tester::{HitResult, HitTester};
use crate::layout::{Layout, LayoutCache};
use crate::memo::Memo;
use crate::overlay::{Overlay, OverlayCache};
use crate::settings::EngineSettings;
use crate::style::{EdgeVisual, NodeVisual, StyleResolver, StyleTable};
use crate::viewport::{Viewport, ViewportController};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracegraph_core::{ExecutionTrace, GraphStructure, NodeId, NodeKind, Vec2};
use tracegraph_events::{Event, EventListener};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFrame {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub layer: i32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub visual: NodeVisual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeFrame {
    #[serde(flatten)]
    pub route: EdgePath,
    pub svg_path: String,
    pub visual: EdgeVisual,
}

/// Everything a renderer needs to draw one frame, in graph coordinates plus
/// the viewport transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    pub width: f32,
    pub height: f32,
    pub viewport: Viewport,
    pub nodes: Vec<NodeFrame>,
    pub edges: Vec<EdgeFrame>,
    pub overlay: Overlay,
    pub dropped_edges: usize,
}

#[derive(Debug, Clone)]
struct Scene {
    graph: Arc<Graph>,
    layout: Arc<Layout>,
    routes: Arc<Vec<EdgePath>>,
}

/// Stateful view over one graph and, optionally, one execution trace.
#[derive(Debug)]
pub struct GraphViewer {
    model: GraphModel,
    layouts: LayoutCache,
    overlays: OverlayCache,
    router: EdgeRouter,
    routes: Memo<(Arc<Graph>, Arc<Layout>), Vec<EdgePath>>,
    hit_tester: HitTester,
    controller: ViewportController,
    style: StyleResolver,
    structure: Option<Arc<GraphStructure>>,
    trace: Option<Arc<ExecutionTrace>>,
    scene: Option<Scene>,
}

impl Default for GraphViewer {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl GraphViewer {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            model: GraphModel::new(),
            layouts: LayoutCache::new(settings.layout),
            overlays: OverlayCache::new(settings.overlay()),
            router: EdgeRouter::new(settings.edges),
            routes: Memo::new(),
            hit_tester: HitTester::with_tolerance(settings.edge_hit_tolerance),
            controller: ViewportController::new(settings.viewport),
            style: StyleResolver::new(StyleTable::from_preset(settings.style)),
            structure: None,
            trace: None,
            scene: None,
        }
    }

    pub fn controller(&self) -> &ViewportController {
        &self.controller
    }

    pub fn viewport(&self) -> Viewport {
        self.controller.viewport()
    }

    pub fn structure(&self) -> Option<&Arc<GraphStructure>> {
        self.structure.as_ref()
    }

    pub fn graph(&self) -> Option<&Arc<Graph>> {
        self.scene.as_ref().map(|s| &s.graph)
    }

    pub fn layout(&self) -> Option<&Arc<Layout>> {
        self.scene.as_ref().map(|s| &s.layout)
    }

    /// Set the container size immediately, bypassing the resize debounce.
    pub fn set_container(&mut self, width: f32, height: f32) {
        self.controller.set_container(width, height);
        self.controller.reset();
    }

    /// Replace the graph. Layout, routes and hit regions are rebuilt before
    /// the viewport refits.
    pub fn load_graph(&mut self, structure: Arc<GraphStructure>) {
        let graph = self.model.normalize_cached(&structure);
        if graph.dropped_edge_count() > 0 {
            tracing::warn!(
                "{} edge(s) referenced unknown nodes and were dropped",
                graph.dropped_edge_count()
            );
        }
        let layout = self.layouts.layout(&graph);
        let router = self.router;
        let routes = self
            .routes
            .get_or_compute(&(Arc::clone(&graph), Arc::clone(&layout)), |(g, l)| {
                router.route_all(g, l)
            });
        self.hit_tester.update(&layout, &routes);
        self.controller
            .set_bounds(layout.bounding_width, layout.bounding_height);
        tracing::debug!(
            "loaded graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        self.structure = Some(structure);
        self.scene = Some(Scene {
            graph,
            layout,
            routes,
        });
    }

    pub fn load_trace(&mut self, trace: Option<Arc<ExecutionTrace>>) {
        self.trace = trace;
    }

    /// Zoom by `factor` around the container center.
    pub fn zoom(&mut self, factor: f32) {
        let center = self.controller.container() * 0.5;
        self.controller.zoom(factor, center.x, center.y);
    }

    /// What lies under a container-relative point.
    pub fn hit(&self, x: f32, y: f32) -> HitResult {
        let point = self.controller.viewport().screen_to_graph(Vec2::new(x, y));
        self.hit_tester.hit(point)
    }

    pub fn handle_event_at(&mut self, event: &Event, now: Instant) {
        match event {
            Event::PointerDown { x, y } => {
                let on_background = self.hit(*x, *y).is_background();
                self.controller.pointer_down(*x, *y, on_background);
            }
            Event::PointerMove { x, y } => self.controller.pointer_move(*x, *y),
            Event::PointerUp => self.controller.pointer_up(),
            Event::PointerLeave => self.controller.pointer_leave(),
            Event::Wheel { delta_y, x, y } => self.controller.wheel(*delta_y, *x, *y),
            Event::ZoomIn => self.controller.zoom_in(),
            Event::ZoomOut => self.controller.zoom_out(),
            Event::ResetView => {
                self.controller.reset();
            }
            Event::ContainerResized { width, height } => {
                self.controller.on_resize(*width, *height, now)
            }
            Event::GraphLoaded(structure) => self.load_graph(Arc::clone(structure)),
            Event::TraceLoaded(trace) => self.load_trace(trace.clone()),
            Event::Unmount => {
                tracing::debug!("viewer detached");
                self.controller.detach();
            }
        }
    }

    /// Fire timers that are due. Returns true when the viewport changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.controller.poll(now)
    }

    pub fn frame(&mut self) -> Option<RenderFrame> {
        let scene = self.scene.clone()?;
        let overlay = self
            .overlays
            .overlay(&scene.graph, &scene.layout, self.trace.as_ref());

        let nodes = scene
            .graph
            .nodes()
            .iter()
            .filter_map(|node| {
                let position = scene.layout.position(&node.id)?;
                Some(NodeFrame {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    kind: node.kind,
                    layer: scene.layout.layer(&node.id).unwrap_or_default(),
                    x: position.x,
                    y: position.y,
                    width: scene.layout.node_size.x,
                    height: scene.layout.node_size.y,
                    visual: self.style.node_visual(node, &overlay),
                })
            })
            .collect();

        let edges = scene
            .routes
            .iter()
            .map(|route| EdgeFrame {
                svg_path: route.path.svg_path_data(),
                visual: self.style.edge_visual(route, &overlay),
                route: route.clone(),
            })
            .collect();

        Some(RenderFrame {
            width: scene.layout.bounding_width,
            height: scene.layout.bounding_height,
            viewport: self.controller.viewport(),
            nodes,
            edges,
            overlay: (*overlay).clone(),
            dropped_edges: scene.graph.dropped_edge_count(),
        })
    }
}

impl EventListener for GraphViewer {
    fn handle_event(&mut self, event: &Event) {
        self.handle_event_at(event, Instant::now());
    }
}
