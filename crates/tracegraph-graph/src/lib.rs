//! Layout, routing and interaction engine for agent execution graphs.
//!
//! The pipeline is a chain of pure steps, each memoized on the identity of
//! its inputs: structure document -> [`Graph`] -> [`Layout`] -> routed
//! [`EdgePath`]s, with an [`Overlay`] derived from an optional execution
//! trace. [`GraphViewer`] wires the steps to viewer events.

pub mod edge_router;
pub mod graph;
pub mod hit_tester;
pub mod layout;
pub mod memo;
pub mod overlay;
pub mod settings;
pub mod style;
pub mod viewer;
pub mod viewport;

pub use edge_router::{
    CubicBezier, EdgePath, EdgeRouter, EdgeRouterConfig, PathSpec, classify_loops,
};
pub use graph::{
    EdgeIndex, Graph, GraphEdge, GraphModel, GraphNode, NodeIndex,
};
pub use hit_tester::{HitResult, HitTester};
pub use layout::{
    LayeredLayouter, Layout, LayoutCache, LayoutConfig, Layouter, Rect, assign_layers,
};
pub use overlay::{
    EdgeInference, ExecutionOverlay, InferenceContext, LayerAdjacentInference, NodeStatus,
    Overlay, OverlayCache, SequenceInference,
};
pub use settings::{EngineSettings, InferenceMode};
pub use style::{
    Color, EdgeStyle, EdgeVisual, NodeColors, NodeVisual, StylePreset, StyleResolver, StyleTable,
};
pub use tracegraph_core::Vec2;
pub use viewer::{EdgeFrame, GraphViewer, NodeFrame, RenderFrame};
pub use viewport::{InteractionState, Viewport, ViewportConfig, ViewportController, fit_viewport};
