use crate::{log::NodeLogger, NodeError, Value};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

/// Core trait every executable behavior implements.
///
/// A behavior is the logic bound to a node type in the registry. It receives
/// the node's resolved inputs and static configuration through the context
/// and returns the node's result value: an object keyed by output-port ids
/// for multi-port nodes, or a plain value for simple ones.
#[async_trait]
pub trait Behavior: Send + Sync {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError>;
}

/// Execution context scoped to a single node invocation.
///
/// This is the sandbox boundary for behaviors: it exposes the node's own
/// configuration, its resolved inputs, a node-attributed logger, and the
/// run-wide cancellation token. Nothing else: no other node's state, no
/// graph mutation.
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: String,
    pub node_name: String,

    /// Static configuration for this node
    pub config: HashMap<String, Value>,

    /// Input values resolved from connected nodes. Ordered map so that
    /// "first available input" is deterministic.
    pub inputs: BTreeMap<String, Value>,

    /// Node-attributed execution log handle
    pub logger: NodeLogger,

    /// Cancellation token for aborting a run mid-flight
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl NodeContext {
    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Get required string input or return error
    pub fn require_input_str(&self, name: &str) -> Result<&str, NodeError> {
        self.require_input(name)?
            .as_str()
            .ok_or_else(|| NodeError::InvalidInputType {
                field: name.to_string(),
                expected: "string".to_string(),
                actual: "other".to_string(),
            })
    }

    /// First input matching any of the given names.
    pub fn input_any(&self, names: &[&str]) -> Option<&Value> {
        names.iter().find_map(|name| self.inputs.get(*name))
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing config: {}", name)))
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }

    /// Get string config with default
    pub fn config_str(&self, name: &str, default: &str) -> String {
        self.config
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }

    /// Get numeric config with default
    pub fn config_f64(&self, name: &str, default: f64) -> f64 {
        self.config.get(name).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    /// Get boolean config with default
    pub fn config_bool(&self, name: &str, default: bool) -> bool {
        self.config
            .get(name)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }
}

/// User-authored custom node: a type identifier plus JavaScript source text
/// defining an `execute(inputs, properties, context)` function. Registration
/// stores the source; compilation errors surface at first invocation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CustomNodeDefinition {
    pub node_type: String,
    pub execution_code: String,
}
