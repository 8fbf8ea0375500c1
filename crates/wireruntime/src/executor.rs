use crate::{registry::BehaviorRegistry, resolver, scheduler};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use wirecore::{
    CustomNodeDefinition, FlowError, FlowGraph, GraphError, LogLevel, NodeContext, NodeLogger,
    NodeSpec, RunLog, Value,
};

/// Sentinel node types marking a graph's external entry and exit points.
pub const INPUT_NODE_TYPE: &str = "input";
pub const OUTPUT_NODE_TYPE: &str = "output";

/// Drives a full flow run: seeds input nodes, schedules, resolves inputs,
/// invokes behaviors strictly sequentially, and collects output-node results.
///
/// Sequential execution is deliberate: log ordering, registry state, and
/// result-map writes never race, and a result becomes visible to downstream
/// consumers only after the producing node's future has fully resolved.
pub struct FlowExecutor;

/// Result of a completed flow run.
#[derive(Debug, Clone)]
pub struct FlowOutputs {
    /// Results of `output`-typed nodes, keyed by node id
    pub outputs: HashMap<String, Value>,
    /// Every node's result, keyed by node id
    pub results: HashMap<String, Value>,
    pub duration_ms: u64,
}

impl FlowExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        graph: &FlowGraph,
        registry: &BehaviorRegistry,
        initial_inputs: &HashMap<String, Value>,
        custom_nodes: &[CustomNodeDefinition],
        log: Arc<RunLog>,
        cancellation: CancellationToken,
    ) -> Result<FlowOutputs, FlowError> {
        let run_start = Instant::now();
        log.clear();

        for definition in custom_nodes {
            registry.register_custom(definition);
        }

        scheduler::validate(graph)?;

        tracing::info!("Starting flow execution: {}", graph.name);
        log.emit(
            LogLevel::Info,
            format!("Starting flow execution with {} nodes", graph.nodes.len()),
        );

        let mut results: HashMap<String, Value> = HashMap::new();
        let mut executed: HashSet<String> = HashSet::new();

        // Input nodes have no upstream dependencies by construction; they are
        // seeded and marked executed before the scheduler loop runs.
        for node in graph.nodes.iter().filter(|n| n.node_type == INPUT_NODE_TYPE) {
            let logger = log.for_node(&node.id, node.display_name());
            let value = seed_input_value(node, initial_inputs, &logger);
            logger.entry(LogLevel::Info, "Seeded input value", None, Some(0));
            results.insert(node.id.clone(), value);
            executed.insert(node.id.clone());
        }

        let order = scheduler::execution_order(graph)?;

        for node_id in order {
            if executed.contains(&node_id) {
                continue;
            }
            if cancellation.is_cancelled() {
                log.emit(LogLevel::Error, "Flow execution cancelled");
                return Err(FlowError::Cancelled);
            }

            let node = graph
                .find_node(&node_id)
                .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;

            let inputs = resolver::resolve_inputs(node, &graph.connections, &results);
            let logger = log.for_node(&node.id, node.display_name());
            logger.info(format!("Executing ({})", node.node_type));

            let ctx = NodeContext {
                node_id: node.id.clone(),
                node_name: node.display_name().to_string(),
                config: node.config.clone(),
                inputs,
                logger: logger.clone(),
                cancellation: cancellation.clone(),
            };

            let start = Instant::now();
            match registry.execute(node, ctx).await {
                Ok(value) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    tracing::info!("Node {} completed in {}ms", node.id, elapsed);
                    logger.entry(LogLevel::Success, "Completed", None, Some(elapsed));
                    results.insert(node.id.clone(), value);
                    executed.insert(node.id.clone());
                }
                Err(err) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    tracing::error!("Node {} failed: {}", node.id, err);
                    logger.entry(
                        LogLevel::Error,
                        format!("Failed: {}", err),
                        None,
                        Some(elapsed),
                    );
                    log.emit_with_duration(
                        LogLevel::Error,
                        "Flow execution aborted",
                        run_start.elapsed().as_millis() as u64,
                    );
                    return Err(err);
                }
            }
        }

        let mut outputs = HashMap::new();
        for node in graph
            .nodes
            .iter()
            .filter(|n| n.node_type == OUTPUT_NODE_TYPE)
        {
            outputs.insert(
                node.id.clone(),
                results.get(&node.id).cloned().unwrap_or(Value::Null),
            );
        }

        let duration_ms = run_start.elapsed().as_millis() as u64;
        log.emit_with_duration(LogLevel::Success, "Flow execution completed", duration_ms);

        Ok(FlowOutputs {
            outputs,
            results,
            duration_ms,
        })
    }
}

impl Default for FlowExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve an input node's literal: the initial-inputs entry keyed by the
/// node's name, else by its id, else the node's own configured default,
/// then coerce per the declared input type.
fn seed_input_value(
    node: &NodeSpec,
    initial_inputs: &HashMap<String, Value>,
    logger: &NodeLogger,
) -> Value {
    let raw = node
        .name
        .as_ref()
        .and_then(|name| initial_inputs.get(name))
        .or_else(|| initial_inputs.get(&node.id))
        .cloned()
        .or_else(|| node.config.get("value").cloned())
        .unwrap_or(Value::Null);

    let declared = node
        .config
        .get("input_type")
        .and_then(|v| v.as_str())
        .unwrap_or("text")
        .to_string();

    coerce_input_value(raw, &declared, logger)
}

/// Coerce a literal per a declared input type (`text` / `number` / `json`).
/// Unparseable numbers and invalid JSON fall back to the raw text with a
/// logged warning.
pub fn coerce_input_value(raw: Value, input_type: &str, logger: &NodeLogger) -> Value {
    match input_type {
        "number" => {
            if raw.as_f64().is_some() {
                return raw;
            }
            let Some(text) = raw.as_str().map(str::to_string) else {
                return raw;
            };
            match text.trim().parse::<f64>() {
                Ok(n) => Value::Number(n),
                Err(_) => {
                    logger.warn(format!(
                        "Could not parse '{}' as a number, passing raw text",
                        text
                    ));
                    raw
                }
            }
        }
        "json" => {
            let Some(text) = raw.as_str().map(str::to_string) else {
                return raw;
            };
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(json) => Value::Json(json),
                Err(err) => {
                    logger.warn(format!("Invalid JSON ({}), passing raw text", err));
                    raw
                }
            }
        }
        _ => raw,
    }
}
