use async_trait::async_trait;
use wirecore::{Behavior, NodeContext, NodeError, Value};

/// Parse an upstream string as JSON, with optional dot-path field extraction
/// (`a.b.0.c`, object keys and array indices). Behavior on failure is
/// configurable: `fail_on_error` true throws, otherwise the node degrades to
/// a null result with a warning.
pub struct JsonParseBehavior;

#[async_trait]
impl Behavior for JsonParseBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let fail_on_error = ctx.config_bool("fail_on_error", false);
        let path = ctx.config_str("path", "");

        let source = ctx
            .input_any(&["input", "json"])
            .cloned()
            .unwrap_or(Value::Null);

        let parsed = match &source {
            Value::Json(json) => Ok(json.clone()),
            Value::Object(_) | Value::Array(_) => Ok(source.to_json()),
            other => match other.as_str() {
                Some(text) => serde_json::from_str::<serde_json::Value>(text)
                    .map_err(|err| format!("JSON parse error: {}", err)),
                None => Err("input is not a string or JSON value".to_string()),
            },
        };

        let extracted = parsed.and_then(|json| {
            if path.is_empty() {
                Ok(json)
            } else {
                extract_path(&json, &path)
                    .ok_or_else(|| format!("path '{}' not found in parsed value", path))
            }
        });

        match extracted {
            Ok(json) => Ok(Value::Json(json)),
            Err(message) if fail_on_error => Err(NodeError::ExecutionFailed(message)),
            Err(message) => {
                ctx.logger.warn(format!("{}, emitting null", message));
                Ok(Value::Null)
            }
        }
    }
}

fn extract_path(json: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
    let mut current = json;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Concatenate text inputs in port order. Modes: `concat` (bare join),
/// `separator` (joined with the configured separator), `wrap` (separator
/// join surrounded by prefix/suffix).
pub struct CombineTextBehavior;

#[async_trait]
impl Behavior for CombineTextBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let mode = ctx.config_str("mode", "separator");
        let separator = ctx.config_str("separator", "\n");
        let prefix = ctx.config_str("prefix", "");
        let suffix = ctx.config_str("suffix", "");

        // Fixed input ports, read by raw id: dual-keying guarantees the id
        // key exists whatever display name the port declares.
        let mut parts: Vec<String> = Vec::new();
        for key in ["input", "text"]
            .into_iter()
            .map(String::from)
            .chain((1..=8).map(|i| format!("text{}", i)))
        {
            if let Some(value) = ctx.inputs.get(&key) {
                if !value.is_null() {
                    let text = value.to_text();
                    if !text.is_empty() {
                        parts.push(text);
                    }
                }
            }
        }

        let combined = match mode.as_str() {
            "concat" => parts.concat(),
            "wrap" => format!("{}{}{}", prefix, parts.join(&separator), suffix),
            _ => parts.join(&separator),
        };

        Ok(Value::String(combined))
    }
}
