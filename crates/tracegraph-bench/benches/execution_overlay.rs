use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use tracegraph_bench::{synthetic_agent_graph, synthetic_trace};
use tracegraph_graph::{
    ExecutionOverlay, GraphModel, GraphViewer, LayeredLayouter, Layouter, SequenceInference,
};

fn bench_overlay_strategies(c: &mut Criterion) {
    let graph = GraphModel::normalize(&synthetic_agent_graph(200));
    let layout = LayeredLayouter::default().execute(&graph);
    let trace = synthetic_trace(200);

    let layered = ExecutionOverlay::default();
    c.bench_function("overlay_layer_adjacent_200", |b| {
        b.iter(|| black_box(layered.compute(&graph, &layout, Some(black_box(&trace)))))
    });

    let sequence = ExecutionOverlay::new(Box::new(SequenceInference));
    c.bench_function("overlay_sequence_200", |b| {
        b.iter(|| black_box(sequence.compute(&graph, &layout, Some(black_box(&trace)))))
    });
}

fn bench_render_frame(c: &mut Criterion) {
    let structure = Arc::new(synthetic_agent_graph(100));
    let trace = Arc::new(synthetic_trace(100));
    let mut viewer = GraphViewer::default();
    viewer.set_container(1280.0, 800.0);
    viewer.load_graph(structure);
    viewer.load_trace(Some(trace));

    c.bench_function("render_frame_100_stages", |b| {
        b.iter(|| black_box(viewer.frame()))
    });
}

criterion_group!(benches, bench_overlay_strategies, bench_render_frame);
criterion_main!(benches);
