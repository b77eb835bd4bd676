use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracegraph_core::{ExecutionTrace, GraphStructure};
use tracegraph_events::{Event, EventBus};
use tracegraph_graph::{
    EngineSettings, GraphModel, GraphViewer, LayeredLayouter, Layouter, classify_loops,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Lay out and render agent execution graphs", long_about = None)]
struct Args {
    /// Log debug diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the render frame of a graph (and optional trace) as JSON
    Render {
        /// Graph structure document
        #[arg(short, long)]
        graph: PathBuf,

        /// Execution trace document
        #[arg(short, long)]
        trace: Option<PathBuf>,

        /// Container width in pixels
        #[arg(long, default_value_t = 800.0)]
        width: f32,

        /// Container height in pixels
        #[arg(long, default_value_t = 600.0)]
        height: f32,

        /// Engine settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra zoom applied after fitting, around the container center
        #[arg(long)]
        zoom: Option<f32>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the layers and loop edges of a graph
    Inspect {
        /// Graph structure document
        #[arg(short, long)]
        graph: PathBuf,

        /// Engine settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    match path {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(EngineSettings::default()),
    }
}

struct RenderRequest<'a> {
    graph: &'a Path,
    trace: Option<&'a Path>,
    width: f32,
    height: f32,
    config: Option<&'a Path>,
    zoom: Option<f32>,
    pretty: bool,
}

fn render(request: &RenderRequest<'_>) -> Result<String> {
    if request.width <= 0.0 || request.height <= 0.0 {
        bail!(
            "container size must be positive, got {}x{}",
            request.width,
            request.height
        );
    }

    let settings = load_settings(request.config)?;
    let structure = GraphStructure::from_path(request.graph)
        .with_context(|| format!("loading graph {}", request.graph.display()))?;
    let trace = request
        .trace
        .map(|path| {
            ExecutionTrace::from_path(path)
                .with_context(|| format!("loading trace {}", path.display()))
        })
        .transpose()?;

    let mut viewer = GraphViewer::new(settings);
    viewer.set_container(request.width, request.height);

    let bus = EventBus::new();
    bus.publish(Event::GraphLoaded(Arc::new(structure)));
    bus.publish(Event::TraceLoaded(trace.map(Arc::new)));
    let handled = bus.dispatch_to(&mut viewer);
    tracing::debug!("dispatched {} events", handled);

    if let Some(factor) = request.zoom {
        viewer.zoom(factor);
    }

    let frame = viewer
        .frame()
        .context("graph produced no render frame")?;
    let json = if request.pretty {
        serde_json::to_string_pretty(&frame)?
    } else {
        serde_json::to_string(&frame)?
    };
    Ok(json)
}

fn inspect(graph_path: &Path, config: Option<&Path>) -> Result<String> {
    let settings = load_settings(config)?;
    let structure = GraphStructure::from_path(graph_path)
        .with_context(|| format!("loading graph {}", graph_path.display()))?;
    let graph = GraphModel::normalize(&structure);
    let layout = LayeredLayouter::new(settings.layout).execute(&graph);

    let mut by_layer: Vec<(i32, &str)> = graph
        .nodes()
        .iter()
        .map(|node| {
            let layer = layout.layer(&node.id).unwrap_or_default();
            (layer, node.id.as_str())
        })
        .collect();
    by_layer.sort();

    let mut out = String::new();
    writeln!(
        out,
        "{} nodes, {} edges ({} dropped)",
        graph.node_count(),
        graph.edge_count(),
        graph.dropped_edge_count()
    )?;
    let mut current = None;
    for (layer, id) in by_layer {
        if current != Some(layer) {
            if current.is_some() {
                writeln!(out)?;
            }
            write!(out, "layer {layer}:")?;
            current = Some(layer);
        }
        write!(out, " {id}")?;
    }
    writeln!(out)?;

    let mut loops: Vec<&str> = classify_loops(&graph, &layout)
        .into_iter()
        .map(|idx| graph[idx].id.as_str())
        .collect();
    loops.sort_unstable();
    if loops.is_empty() {
        writeln!(out, "loops: none")?;
    } else {
        writeln!(out, "loops: {}", loops.join(", "))?;
    }
    Ok(out)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let output = match &args.command {
        Command::Render {
            graph,
            trace,
            width,
            height,
            config,
            zoom,
            pretty,
        } => render(&RenderRequest {
            graph,
            trace: trace.as_deref(),
            width: *width,
            height: *height,
            config: config.as_deref(),
            zoom: *zoom,
            pretty: *pretty,
        })?,
        Command::Inspect { graph, config } => inspect(graph, config.as_deref())?,
    };
    println!("{}", output.trim_end());
    Ok(())
}
