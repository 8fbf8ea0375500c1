//! Embedded QuickJS bridge for user-supplied code.
//!
//! Custom node sources and conditional expressions run inside a fresh
//! QuickJS runtime per invocation. The sandbox exposes exactly three things
//! to user code: the resolved `inputs`, the node `properties`, and a
//! `context` object whose log/warn/error calls are buffered and replayed
//! through the node logger afterwards. There are no host bindings, no
//! filesystem, no network.

use async_trait::async_trait;
use rquickjs::{Context as JsContext, Ctx, FromJs, Runtime as JsRuntime};
use wirecore::{Behavior, NodeContext, NodeError, Value};

/// Behavior compiled from user-supplied source text defining
/// `execute(inputs, properties, context)`.
///
/// The source is stored verbatim at registration time; evaluation (and any
/// compile error in it) happens at invocation, so a broken definition only
/// fails the runs that reach it.
pub struct ScriptBehavior {
    source: String,
}

impl ScriptBehavior {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl Behavior for ScriptBehavior {
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let inputs = serde_json::Value::Object(
            ctx.inputs
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        );
        let properties = serde_json::Value::Object(
            ctx.config
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        );

        let outcome = run_execute(&self.source, &inputs, &properties)?;

        for (level, message) in &outcome.logs {
            match level.as_str() {
                "warning" => ctx.logger.warn(message),
                "error" => ctx.logger.error(message),
                _ => ctx.logger.info(message),
            }
        }

        match outcome.error {
            Some(message) => Err(NodeError::Script(message)),
            None => Ok(Value::from_json(outcome.value)),
        }
    }
}

#[derive(Debug)]
struct ScriptOutcome {
    value: serde_json::Value,
    logs: Vec<(String, String)>,
    error: Option<String>,
}

/// Extract the pending exception message from the context.
fn js_exception(ctx: &Ctx<'_>) -> String {
    rquickjs::Exception::from_js(ctx, ctx.catch())
        .ok()
        .and_then(|exception| exception.message())
        .unwrap_or_else(|| "unknown script exception".to_string())
}

fn eval_in<'js, T: FromJs<'js>>(ctx: &Ctx<'js>, code: &str) -> Result<T, NodeError> {
    match ctx.eval::<T, _>(code) {
        Ok(value) => Ok(value),
        Err(rquickjs::Error::Exception) => Err(NodeError::Script(js_exception(ctx))),
        Err(err) => Err(NodeError::Script(err.to_string())),
    }
}

const GLUE: &str = r#"
globalThis.__wf_done = false;
globalThis.__wf_value = null;
globalThis.__wf_error = null;
globalThis.__wf_logs = [];
(function () {
    const record = (level) => (...args) =>
        __wf_logs.push([level, args.map((a) =>
            typeof a === "string" ? a : JSON.stringify(a)).join(" ")]);
    const context = {
        log: record("info"),
        warn: record("warning"),
        error: record("error"),
    };
    const finish = (value) => {
        globalThis.__wf_value = JSON.stringify(value === undefined ? null : value);
        globalThis.__wf_done = true;
    };
    const fail = (err) => {
        globalThis.__wf_error = String(err && err.message ? err.message : err);
        globalThis.__wf_done = true;
    };
    if (typeof execute !== "function") {
        fail(new Error("custom node source does not define execute()"));
        return;
    }
    let out;
    try {
        out = execute(globalThis.__wf_inputs, globalThis.__wf_properties, context);
    } catch (err) {
        fail(err);
        return;
    }
    if (out && typeof out.then === "function") {
        out.then(finish, fail);
    } else {
        finish(out);
    }
})();
"#;

/// Evaluate a custom node source and call its `execute` function.
///
/// `execute` may return a plain value or a promise; the microtask queue is
/// drained so promise chains settle. A promise held open by anything other
/// than microtasks (there are no timers in the sandbox) is reported as never
/// settling.
fn run_execute(
    source: &str,
    inputs: &serde_json::Value,
    properties: &serde_json::Value,
) -> Result<ScriptOutcome, NodeError> {
    let runtime = JsRuntime::new().map_err(|e| NodeError::Script(e.to_string()))?;
    let context = JsContext::full(&runtime).map_err(|e| NodeError::Script(e.to_string()))?;

    context.with(|ctx| -> Result<(), NodeError> {
        if let Err(err) = eval_in::<()>(&ctx, source) {
            let detail = match err {
                NodeError::Script(message) => message,
                other => other.to_string(),
            };
            return Err(NodeError::Script(format!(
                "failed to evaluate custom node source: {}",
                detail
            )));
        }
        let seed = format!(
            "globalThis.__wf_inputs = {}; globalThis.__wf_properties = {};",
            inputs, properties
        );
        eval_in::<()>(&ctx, &seed)?;
        eval_in::<()>(&ctx, GLUE)
    })?;

    while runtime.is_job_pending() {
        if runtime.execute_pending_job().is_err() {
            return Err(NodeError::Script(
                "unhandled exception in a pending script job".to_string(),
            ));
        }
    }

    context.with(|ctx| -> Result<ScriptOutcome, NodeError> {
        let done: bool = eval_in(&ctx, "globalThis.__wf_done")?;
        let logs_json: String = eval_in(&ctx, "JSON.stringify(globalThis.__wf_logs)")?;
        let logs: Vec<(String, String)> = serde_json::from_str(&logs_json).unwrap_or_default();

        if !done {
            return Err(NodeError::Script(
                "execute() returned a promise that never settled".to_string(),
            ));
        }

        let error: Option<String> = eval_in(&ctx, "globalThis.__wf_error")?;
        if let Some(message) = error {
            return Ok(ScriptOutcome {
                value: serde_json::Value::Null,
                logs,
                error: Some(message),
            });
        }

        let value_json: Option<String> = eval_in(&ctx, "globalThis.__wf_value")?;
        let value = value_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::Value::Null);

        Ok(ScriptOutcome {
            value,
            logs,
            error: None,
        })
    })
}

/// Evaluate a boolean expression against an input value.
///
/// The expression sees the value as `input` and is coerced through
/// `Boolean(...)`, so truthiness follows JavaScript rules. Used by the
/// conditional behavior.
pub fn eval_condition(expression: &str, input: &serde_json::Value) -> Result<bool, NodeError> {
    let runtime = JsRuntime::new().map_err(|e| NodeError::Script(e.to_string()))?;
    let context = JsContext::full(&runtime).map_err(|e| NodeError::Script(e.to_string()))?;

    context.with(|ctx| {
        eval_in::<()>(&ctx, &format!("globalThis.input = {};", input))?;
        eval_in::<bool>(&ctx, &format!("Boolean(( {} ))", expression))
    })
}
