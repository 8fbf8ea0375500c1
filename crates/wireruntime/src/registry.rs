use crate::script::ScriptBehavior;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use wirecore::{
    Behavior, CustomNodeDefinition, FlowError, GraphError, NodeContext, NodeError, NodeSpec, Value,
};

struct RegistryEntry {
    behavior: Arc<dyn Behavior>,
    custom: bool,
}

/// Registry mapping node-type identifiers to executable behaviors.
///
/// The registry is an explicit, shareable object: the runtime owns one and
/// concurrent runs against the same runtime share it, so registering a
/// custom node affects all of them. Callers needing isolation construct
/// their own. Interior locking lets `register_custom` run against a shared
/// reference mid-flow.
pub struct BehaviorRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a behavior under a type key. No constraint on the key
    /// format; re-registration overwrites silently (last write wins), which
    /// is what permits hot-reloading custom node logic.
    pub fn register(&self, node_type: impl Into<String>, behavior: Arc<dyn Behavior>) {
        self.insert(node_type.into(), behavior, false);
    }

    /// Register an async closure as a behavior, the callback variant of the
    /// plugin interface.
    pub fn register_fn<F, Fut>(&self, node_type: impl Into<String>, behavior: F)
    where
        F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, NodeError>> + Send + 'static,
    {
        let wrapped = move |ctx: NodeContext| -> BoxFuture<'static, Result<Value, NodeError>> {
            Box::pin(behavior(ctx))
        };
        self.register(node_type, Arc::new(FnBehavior(Box::new(wrapped))));
    }

    /// Register a user-authored custom node. The source is wrapped, not
    /// validated: compile errors surface at the first invocation.
    pub fn register_custom(&self, definition: &CustomNodeDefinition) {
        self.insert(
            definition.node_type.clone(),
            Arc::new(ScriptBehavior::new(definition.execution_code.clone())),
            true,
        );
    }

    fn insert(&self, node_type: String, behavior: Arc<dyn Behavior>, custom: bool) {
        tracing::info!("Registering node type: {}", node_type);
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(node_type, RegistryEntry { behavior, custom });
    }

    /// Look up and invoke the behavior for a node.
    ///
    /// An absent type fails with `UnknownNodeType`. A behavior failure is
    /// logged through the node's context with the original error, then
    /// propagated. Failures are never swallowed at this layer.
    pub async fn execute(&self, node: &NodeSpec, ctx: NodeContext) -> Result<Value, FlowError> {
        let behavior = {
            let entries = self.entries.read().expect("registry lock poisoned");
            entries
                .get(&node.node_type)
                .map(|entry| Arc::clone(&entry.behavior))
        }
        .ok_or_else(|| GraphError::UnknownNodeType(node.node_type.clone()))?;

        let logger = ctx.logger.clone();
        match behavior.execute(ctx).await {
            Ok(value) => Ok(value),
            Err(err) => {
                logger.error_with_data(
                    format!("Execution failed: {}", err),
                    serde_json::json!({ "error": err.to_string() }),
                );
                Err(FlowError::Node(err))
            }
        }
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(node_type)
    }

    /// All registered type keys, sorted for stable tooling output.
    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    pub fn is_custom(&self, node_type: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(node_type)
            .map(|entry| entry.custom)
            .unwrap_or(false)
    }

    pub fn list_custom(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .iter()
            .filter(|(_, entry)| entry.custom)
            .map(|(ty, _)| ty.clone())
            .collect();
        types.sort();
        types
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct FnBehavior(
    Box<dyn Fn(NodeContext) -> BoxFuture<'static, Result<Value, NodeError>> + Send + Sync>,
);

#[async_trait::async_trait]
impl Behavior for FnBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        (self.0)(ctx).await
    }
}
