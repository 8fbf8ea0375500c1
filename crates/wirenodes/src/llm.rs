use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::collections::HashMap;
use wirecore::{Behavior, NodeContext, NodeError, Value};

/// Chat-completion node against an OpenAI-compatible endpoint.
///
/// Composes system prompt + optional conversation history + optional image
/// attachment + user message. The Authorization header is attached only when
/// a key is configured, so unauthenticated local endpoints work out of the
/// box.
pub struct LlmChatBehavior {
    client: reqwest::Client,
}

impl LlmChatBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for LlmChatBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for LlmChatBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let body = chat_request_body(&ctx)?;
        let response = post_chat_completion(&self.client, &ctx, body).await?;
        let content = completion_content(&response)?;

        let mut outputs = HashMap::new();
        outputs.insert("response".to_string(), Value::String(content));
        outputs.insert("raw".to_string(), Value::Json(response));
        Ok(Value::Object(outputs))
    }
}

/// Chat-completion node with schema-constrained output.
///
/// Derives a JSON Schema from a user-provided example payload, requests
/// structured output, and parses the response strictly: a reply that is not
/// valid JSON fails the node.
pub struct StructuredLlmBehavior {
    client: reqwest::Client,
}

impl StructuredLlmBehavior {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for StructuredLlmBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for StructuredLlmBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let example = ctx
            .inputs
            .get("example")
            .cloned()
            .or_else(|| ctx.config.get("example").cloned())
            .ok_or_else(|| NodeError::MissingInput("example".to_string()))?;

        let example_json = match example.as_str() {
            Some(text) => serde_json::from_str(text).map_err(|err| {
                NodeError::Configuration(format!("example is not valid JSON: {}", err))
            })?,
            None => example.to_json(),
        };

        let mut body = chat_request_body(&ctx)?;
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "structured_response",
                "strict": true,
                "schema": schema_from_example(&example_json),
            }
        });

        let response = post_chat_completion(&self.client, &ctx, body).await?;
        let content = completion_content(&response)?;

        let parsed: serde_json::Value = serde_json::from_str(&content).map_err(|err| {
            NodeError::ExecutionFailed(format!(
                "Structured response is not valid JSON: {}",
                err
            ))
        })?;

        Ok(Value::Json(parsed))
    }
}

fn chat_request_body(ctx: &NodeContext) -> Result<serde_json::Value, NodeError> {
    let mut messages: Vec<serde_json::Value> = Vec::new();

    let system = ctx
        .inputs
        .get("system")
        .map(|v| v.to_text())
        .unwrap_or_else(|| ctx.config_str("system_prompt", ""));
    if !system.is_empty() {
        messages.push(json!({"role": "system", "content": system}));
    }

    if let Some(history) = ctx.input_any(&["history", "context"]) {
        if let serde_json::Value::Array(turns) = history.to_json() {
            messages.extend(turns);
        }
    }

    let user = ctx
        .input_any(&["user", "input", "message"])
        .map(|v| v.to_text())
        .ok_or_else(|| NodeError::MissingInput("user".to_string()))?;

    let user_message = match ctx.inputs.get("image") {
        Some(image) => {
            let encoded = match image {
                Value::Bytes(bytes) => STANDARD.encode(bytes),
                other => other.to_text(),
            };
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": user},
                    {"type": "image_url", "image_url": {
                        "url": format!("data:image/png;base64,{}", encoded)
                    }},
                ]
            })
        }
        None => json!({"role": "user", "content": user}),
    };
    messages.push(user_message);

    let mut body = json!({
        "model": ctx.config_str("model", "gpt-4"),
        "messages": messages,
    });
    if let Some(temperature) = ctx.config.get("temperature").and_then(|v| v.as_f64()) {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = ctx.config.get("max_tokens").and_then(|v| v.as_f64()) {
        body["max_tokens"] = json!(max_tokens as u64);
    }

    Ok(body)
}

async fn post_chat_completion(
    client: &reqwest::Client,
    ctx: &NodeContext,
    body: serde_json::Value,
) -> Result<serde_json::Value, NodeError> {
    let base_url = ctx.config_str("base_url", "http://localhost:8080/v1");
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    ctx.logger.info(format!(
        "Requesting completion from {} (model {})",
        url,
        body["model"].as_str().unwrap_or("?")
    ));

    let mut request = client.post(&url).json(&body);
    let api_key = ctx.config_str("api_key", "");
    if !api_key.is_empty() {
        request = request.bearer_auth(api_key);
    }

    let response = tokio::select! {
        _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        result = request.send() => result.map_err(|err| {
            NodeError::ExecutionFailed(format!("Completion request failed: {}", err))
        })?,
    };

    let status = response.status();
    let payload: serde_json::Value = response.json().await.map_err(|err| {
        NodeError::ExecutionFailed(format!("Invalid completion response: {}", err))
    })?;

    if !status.is_success() {
        let detail = payload["error"]["message"]
            .as_str()
            .unwrap_or("no detail")
            .to_string();
        return Err(NodeError::ExecutionFailed(format!(
            "Completion endpoint returned {}: {}",
            status, detail
        )));
    }

    Ok(payload)
}

fn completion_content(response: &serde_json::Value) -> Result<String, NodeError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            NodeError::ExecutionFailed("Completion response carried no content".to_string())
        })
}

/// Derive a JSON Schema from an example payload: objects become closed
/// property sets with every key required, arrays take their item shape from
/// the first element.
fn schema_from_example(example: &serde_json::Value) -> serde_json::Value {
    match example {
        serde_json::Value::Object(map) => {
            let properties: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .map(|(key, value)| (key.clone(), schema_from_example(value)))
                .collect();
            let required: Vec<&String> = map.keys().collect();
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            })
        }
        serde_json::Value::Array(items) => match items.first() {
            Some(first) => json!({"type": "array", "items": schema_from_example(first)}),
            None => json!({"type": "array"}),
        },
        serde_json::Value::String(_) => json!({"type": "string"}),
        serde_json::Value::Number(_) => json!({"type": "number"}),
        serde_json::Value::Bool(_) => json!({"type": "boolean"}),
        serde_json::Value::Null => json!({"type": ["string", "null"]}),
    }
}
