//! Thin adapters over external higher-level services. The engine's job here
//! is limited to input validation, invocation, and result shaping.

use async_trait::async_trait;
use serde_json::json;
use wirecore::{Behavior, NodeContext, NodeError, Value};

async fn post_service(
    client: &reqwest::Client,
    ctx: &NodeContext,
    endpoint: &str,
    payload: serde_json::Value,
) -> Result<Value, NodeError> {
    let response = tokio::select! {
        _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        result = client.post(endpoint).json(&payload).send() => result
            .map_err(|err| NodeError::ExecutionFailed(format!("Service request failed: {}", err)))?,
    };

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|err| NodeError::ExecutionFailed(format!("Invalid service response: {}", err)))?;

    if !status.is_success() {
        return Err(NodeError::ExecutionFailed(format!(
            "Service returned {}: {}",
            status,
            body["error"].as_str().unwrap_or("no detail")
        )));
    }

    Ok(Value::Json(body))
}

/// Delegates a task to an external autonomous agent service.
pub struct AgentExecutorBehavior {
    client: reqwest::Client,
}

impl AgentExecutorBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for AgentExecutorBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for AgentExecutorBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let instructions = ctx
            .input_any(&["task", "instructions", "input"])
            .map(|v| v.to_text())
            .unwrap_or_default();
        if instructions.trim().is_empty() {
            return Err(NodeError::MissingInput("task".to_string()));
        }

        let endpoint = ctx.config_str("endpoint", "http://localhost:8091/agent/execute");
        ctx.logger.info("Delegating task to agent service");

        post_service(
            &self.client,
            &ctx,
            &endpoint,
            json!({
                "instructions": instructions,
                "context": ctx.inputs.get("context").map(|v| v.to_json()),
                "agent_id": ctx.config_str("agent_id", ""),
            }),
        )
        .await
    }
}

/// Writes content into an external notebook/knowledge-base service.
pub struct NotebookWriteBehavior {
    client: reqwest::Client,
}

impl NotebookWriteBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for NotebookWriteBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for NotebookWriteBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let content = ctx
            .input_any(&["content", "input", "text"])
            .map(|v| v.to_text())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(NodeError::MissingInput("content".to_string()));
        }

        let endpoint = ctx.config_str("endpoint", "http://localhost:8092/notebooks/documents");
        ctx.logger.info("Writing content to notebook service");

        post_service(
            &self.client,
            &ctx,
            &endpoint,
            json!({
                "notebook_id": ctx.config_str("notebook_id", ""),
                "content": content,
                "title": ctx.config_str("title", ""),
            }),
        )
        .await
    }
}

/// Asks a question against an external notebook/knowledge-base service.
pub struct NotebookChatBehavior {
    client: reqwest::Client,
}

impl NotebookChatBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for NotebookChatBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for NotebookChatBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let question = ctx
            .input_any(&["question", "input", "message"])
            .map(|v| v.to_text())
            .unwrap_or_default();
        if question.trim().is_empty() {
            return Err(NodeError::MissingInput("question".to_string()));
        }

        let endpoint = ctx.config_str("endpoint", "http://localhost:8092/notebooks/chat");
        ctx.logger.info("Querying notebook service");

        post_service(
            &self.client,
            &ctx,
            &endpoint,
            json!({
                "notebook_id": ctx.config_str("notebook_id", ""),
                "question": question,
            }),
        )
        .await
    }
}
