use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use wirecore::{FlowGraph, GraphError};

/// Structural validation run before anything executes: the graph must have
/// nodes, node ids must be unique, and every connection endpoint must exist.
pub fn validate(graph: &FlowGraph) -> Result<(), GraphError> {
    if graph.nodes.is_empty() {
        return Err(GraphError::Invalid("graph has no nodes".to_string()));
    }

    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(GraphError::Invalid(format!(
                "duplicate node id: {}",
                node.id
            )));
        }
    }

    for conn in &graph.connections {
        for endpoint in [&conn.from_node, &conn.to_node] {
            if !seen.contains(endpoint.as_str()) {
                return Err(GraphError::NodeNotFound(endpoint.clone()));
            }
        }
    }

    Ok(())
}

/// Compute a total execution order consistent with connection dependencies.
///
/// Kahn's algorithm over the dependency graph: in-degree counts incoming
/// connections (parallel edges each count), zero-in-degree nodes seed a FIFO
/// queue in declaration order, and successors are relaxed in connection
/// declaration order. The resulting tie-break is deterministic for a fixed
/// node/connection list but carries no semantic meaning.
///
/// Nodes left with positive in-degree when the queue drains are part of a
/// cycle; the sort fails with `CycleDetected` naming them instead of silently
/// dropping them from the order.
pub fn execution_order(graph: &FlowGraph) -> Result<Vec<String>, GraphError> {
    let mut dag: DiGraph<String, ()> = DiGraph::new();
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &graph.nodes {
        let idx = dag.add_node(node.id.clone());
        index_of.insert(node.id.as_str(), idx);
    }

    for conn in &graph.connections {
        let from = *index_of
            .get(conn.from_node.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(conn.from_node.clone()))?;
        let to = *index_of
            .get(conn.to_node.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(conn.to_node.clone()))?;
        dag.add_edge(from, to, ());
    }

    let mut in_degree: Vec<usize> = dag
        .node_indices()
        .map(|idx| dag.edges_directed(idx, Direction::Incoming).count())
        .collect();

    // node_indices iterates in insertion order, i.e. declaration order.
    let mut queue: VecDeque<NodeIndex> = dag
        .node_indices()
        .filter(|idx| in_degree[idx.index()] == 0)
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    while let Some(idx) = queue.pop_front() {
        order.push(dag[idx].clone());

        // petgraph iterates edges most-recent-first; restore declaration order
        let mut successors: Vec<NodeIndex> = dag
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| edge.target())
            .collect();
        successors.reverse();

        for succ in successors {
            let degree = &mut in_degree[succ.index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(succ);
            }
        }
    }

    if order.len() < graph.nodes.len() {
        let nodes: Vec<String> = dag
            .node_indices()
            .filter(|idx| in_degree[idx.index()] > 0)
            .map(|idx| dag[idx].clone())
            .collect();
        return Err(GraphError::CycleDetected { nodes });
    }

    Ok(order)
}
