use crate::{executor::FlowExecutor, registry::BehaviorRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wirecore::{CustomNodeDefinition, FlowError, FlowGraph, LogEntry, LogObserver, RunLog, Value};

/// Main runtime for executing flow graphs.
///
/// Owns the behavior registry. The registry is shared by every run through
/// this runtime; construct separate runtimes (or registries) for isolation.
pub struct FlowRuntime {
    registry: Arc<BehaviorRegistry>,
    executor: FlowExecutor,
}

impl FlowRuntime {
    /// Create a runtime with an empty registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(BehaviorRegistry::new()))
    }

    /// Create a runtime around a pre-configured registry.
    pub fn with_registry(registry: Arc<BehaviorRegistry>) -> Self {
        Self {
            registry,
            executor: FlowExecutor::new(),
        }
    }

    /// Access the registry for registering node types.
    pub fn registry(&self) -> &Arc<BehaviorRegistry> {
        &self.registry
    }

    /// Execute a graph with default options.
    pub async fn execute(
        &self,
        graph: &FlowGraph,
        inputs: HashMap<String, Value>,
    ) -> Result<RunReport, FlowError> {
        self.execute_with(graph, inputs, &[], RunOptions::default())
            .await
    }

    /// Execute a graph with custom node definitions and run options.
    ///
    /// When the caller supplies `options.log`, the same `RunLog` instance
    /// keeps the full history even if the run fails; otherwise a fresh
    /// run-scoped log is constructed (wired to `options.observer` when set).
    pub async fn execute_with(
        &self,
        graph: &FlowGraph,
        inputs: HashMap<String, Value>,
        custom_nodes: &[CustomNodeDefinition],
        options: RunOptions,
    ) -> Result<RunReport, FlowError> {
        let log = match options.log {
            Some(log) => log,
            None => match options.observer {
                Some(observer) => Arc::new(RunLog::with_observer(observer)),
                None => Arc::new(RunLog::new()),
            },
        };

        let outcome = self
            .executor
            .execute(
                graph,
                &self.registry,
                &inputs,
                custom_nodes,
                Arc::clone(&log),
                options.cancellation,
            )
            .await?;

        Ok(RunReport {
            outputs: outcome.outputs,
            results: outcome.results,
            log: log.entries(),
            duration_ms: outcome.duration_ms,
        })
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run options.
#[derive(Default)]
pub struct RunOptions {
    /// Live observer invoked synchronously for every log entry. Ignored when
    /// `log` is supplied (attach the observer there instead).
    pub observer: Option<LogObserver>,
    /// Run-wide cancellation; checked before each node executes.
    pub cancellation: CancellationToken,
    /// Caller-owned run log, useful for reading history after a failed run.
    pub log: Option<Arc<RunLog>>,
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Output-node results keyed by node id
    pub outputs: HashMap<String, Value>,
    /// All node results keyed by node id
    pub results: HashMap<String, Value>,
    /// Full execution log in append order
    pub log: Vec<LogEntry>,
    pub duration_ms: u64,
}
