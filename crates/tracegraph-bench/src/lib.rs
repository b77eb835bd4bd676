use tracegraph_core::{ConditionalEdge, ExecutionTrace, GraphStructure, RawEdge, RawNode};

/// Agent graph with `stages` chained agent/tool pairs, each tool looping back
/// to its agent and each agent routing conditionally to the next stage.
pub fn synthetic_agent_graph(stages: usize) -> GraphStructure {
    let mut structure = GraphStructure {
        entry_point: Some("init".to_string()),
        ..GraphStructure::default()
    };
    structure.nodes.push(RawNode::new("init"));

    let mut previous = "init".to_string();
    for i in 0..stages {
        let agent = format!("agent_{i}");
        let tool = format!("tool_{i}");
        structure.nodes.push(RawNode::new(agent.clone()));
        structure.nodes.push(RawNode::new(tool.clone()));
        structure.edges.push(RawEdge::new(previous.clone(), agent.clone()));
        structure.edges.push(RawEdge::new(agent.clone(), tool.clone()));
        structure.edges.push(RawEdge::new(tool, agent.clone()));
        if i + 1 < stages {
            structure.conditional_edges.push(ConditionalEdge {
                source: agent.clone(),
                branches: [
                    ("next".to_string(), format!("agent_{}", i + 1)),
                    ("stop".to_string(), "__end__".to_string()),
                ]
                .into_iter()
                .collect(),
            });
        }
        previous = agent;
    }
    structure.nodes.push(RawNode::new("report").terminal());
    structure.edges.push(RawEdge::new(previous, "report"));
    structure
}

/// Trace that walks every stage once, paused before the final report.
pub fn synthetic_trace(stages: usize) -> ExecutionTrace {
    let mut visits = vec!["init".to_string()];
    for i in 0..stages {
        visits.push(format!("agent_{i}"));
        visits.push(format!("tool_{i}"));
        visits.push(format!("agent_{i}"));
    }
    ExecutionTrace::from_visits(visits, Some("report"))
}
