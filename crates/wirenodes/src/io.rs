use async_trait::async_trait;
use wirecore::{Behavior, NodeContext, NodeError, Value};
use wireruntime::coerce_input_value;

/// Entry-point node: emits its configured literal, coerced per the declared
/// input type. Input nodes are normally seeded by the orchestrator before the
/// execution loop runs; this behavior covers direct invocation.
pub struct InputBehavior;

#[async_trait]
impl Behavior for InputBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let raw = ctx.get_config_or("value", Value::Null);
        let input_type = ctx.config_str("input_type", "text");
        Ok(coerce_input_value(raw, &input_type, &ctx.logger))
    }
}

/// Exit-point node: passes through whichever single upstream value it
/// received, preferring a generically-named `input` port.
pub struct OutputBehavior;

#[async_trait]
impl Behavior for OutputBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        Ok(ctx
            .inputs
            .get("input")
            .cloned()
            .or_else(|| ctx.inputs.values().next().cloned())
            .unwrap_or(Value::Null))
    }
}

/// Emits a configured literal string, optionally parsed as JSON. A parse
/// failure falls back to the raw text with a warning; it never throws.
pub struct StaticTextBehavior;

#[async_trait]
impl Behavior for StaticTextBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let text = ctx.config_str("text", "");

        if ctx.config_bool("parse_json", false) {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(json) => return Ok(Value::Json(json)),
                Err(err) => {
                    ctx.logger
                        .warn(format!("Invalid JSON ({}), emitting raw text", err));
                }
            }
        }

        Ok(Value::String(text))
    }
}
