use async_trait::async_trait;
use std::collections::HashMap;
use wirecore::{Behavior, NodeContext, NodeError, Value};
use wireruntime::script::eval_condition;

/// Conditional routing node.
///
/// Evaluates the configured boolean expression against the `input` value in
/// the embedded sandbox and routes the input (or the configured substitute)
/// to exactly one of the `true` / `false` outputs, leaving the other absent.
/// An evaluation failure is logged and treated as the false branch; it never
/// aborts the run.
pub struct IfElseBehavior;

#[async_trait]
impl Behavior for IfElseBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let expression = ctx
            .require_config("expression")?
            .as_str()
            .ok_or_else(|| NodeError::Configuration("expression must be a string".to_string()))?
            .to_string();

        let input = ctx
            .inputs
            .get("input")
            .cloned()
            .or_else(|| ctx.inputs.values().next().cloned())
            .unwrap_or(Value::Null);

        let branch = match eval_condition(&expression, &input.to_json()) {
            Ok(result) => result,
            Err(err) => {
                ctx.logger.error(format!(
                    "Condition evaluation failed ({}), taking false branch",
                    err
                ));
                false
            }
        };

        let substitute = if branch {
            ctx.config.get("true_value")
        } else {
            ctx.config.get("false_value")
        };
        let routed = substitute.cloned().unwrap_or(input);

        let key = if branch { "true" } else { "false" };
        ctx.logger.info(format!("Condition took the {} branch", key));

        let mut outputs = HashMap::new();
        outputs.insert(key.to_string(), routed);
        Ok(Value::Object(outputs))
    }
}
