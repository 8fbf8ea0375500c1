use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wirecore::{
    CustomNodeDefinition, FlowError, FlowGraph, GraphError, LogLevel, NodeSpec, RunLog, Value,
};
use wireruntime::{BehaviorRegistry, FlowRuntime, RunOptions};

fn pass_through_output(registry: &BehaviorRegistry) {
    registry.register_fn("output", |ctx| async move {
        let value = ctx
            .inputs
            .get("input")
            .cloned()
            .or_else(|| ctx.inputs.values().next().cloned())
            .unwrap_or(Value::Null);
        Ok(value)
    });
}

fn linear_chain(upper_type: &str) -> FlowGraph {
    let mut graph = FlowGraph::new("linear");
    graph.add_node(NodeSpec::new("in", "input").with_config("value", "hello"));
    graph.add_node(NodeSpec::new("up", upper_type));
    graph.add_node(NodeSpec::new("out", "output"));
    graph.connect("in", "output", "up", "input");
    graph.connect("up", "output", "out", "input");
    graph
}

#[tokio::test]
async fn linear_chain_produces_upper_cased_output() {
    let runtime = FlowRuntime::new();
    pass_through_output(runtime.registry());
    runtime.registry().register_fn("custom-upper", |ctx| async move {
        let text = ctx.require_input_str("input")?.to_uppercase();
        let mut object = HashMap::new();
        object.insert("output".to_string(), Value::String(text));
        Ok(Value::Object(object))
    });

    let report = runtime
        .execute(&linear_chain("custom-upper"), HashMap::new())
        .await
        .unwrap();

    assert_eq!(report.outputs.get("out"), Some(&Value::String("HELLO".into())));
}

#[tokio::test]
async fn linear_chain_with_a_javascript_custom_node() {
    let runtime = FlowRuntime::new();
    pass_through_output(runtime.registry());

    let custom = CustomNodeDefinition {
        node_type: "custom-upper".to_string(),
        execution_code: r#"
            function execute(inputs, properties, context) {
                context.log("upper-casing", inputs.input);
                return { output: inputs.input.toUpperCase() };
            }
        "#
        .to_string(),
    };

    let report = runtime
        .execute_with(
            &linear_chain("custom-upper"),
            HashMap::new(),
            &[custom],
            RunOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.outputs.get("out"), Some(&Value::String("HELLO".into())));
    assert!(report
        .log
        .iter()
        .any(|entry| entry.message.contains("upper-casing")));
}

#[tokio::test]
async fn initial_inputs_prefer_name_then_id_then_default() {
    let runtime = FlowRuntime::new();

    let mut graph = FlowGraph::new("seeding");
    graph.add_node(
        NodeSpec::new("n1", "input")
            .with_name("Prompt")
            .with_config("value", "default"),
    );

    // keyed by name
    let mut by_name = HashMap::new();
    by_name.insert("Prompt".to_string(), Value::String("from-name".into()));
    let report = runtime.execute(&graph, by_name).await.unwrap();
    assert_eq!(report.results.get("n1"), Some(&Value::String("from-name".into())));

    // keyed by id
    let mut by_id = HashMap::new();
    by_id.insert("n1".to_string(), Value::String("from-id".into()));
    let report = runtime.execute(&graph, by_id).await.unwrap();
    assert_eq!(report.results.get("n1"), Some(&Value::String("from-id".into())));

    // config default
    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    assert_eq!(report.results.get("n1"), Some(&Value::String("default".into())));
}

#[tokio::test]
async fn number_and_json_input_types_are_coerced() {
    let runtime = FlowRuntime::new();

    let mut graph = FlowGraph::new("coerce");
    graph.add_node(
        NodeSpec::new("n", "input")
            .with_config("value", "42")
            .with_config("input_type", "number"),
    );
    graph.add_node(
        NodeSpec::new("j", "input")
            .with_config("value", r#"{"a": 1}"#)
            .with_config("input_type", "json"),
    );
    graph.add_node(
        NodeSpec::new("bad", "input")
            .with_config("value", "not json {")
            .with_config("input_type", "json"),
    );

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    assert_eq!(report.results.get("n"), Some(&Value::Number(42.0)));
    assert_eq!(
        report.results.get("j"),
        Some(&Value::Json(serde_json::json!({"a": 1})))
    );
    // bad JSON falls back to the raw text and logs a warning
    assert_eq!(report.results.get("bad"), Some(&Value::String("not json {".into())));
    assert!(report
        .log
        .iter()
        .any(|entry| entry.level == LogLevel::Warning));
}

#[tokio::test]
async fn a_failing_node_aborts_the_run_before_downstream_nodes() {
    let runtime = FlowRuntime::new();
    let downstream_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&downstream_runs);

    runtime.registry().register_fn("boom", |_ctx| async move {
        Err(wirecore::NodeError::ExecutionFailed("intentional".into()))
    });
    runtime.registry().register_fn("counter", move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    });

    let mut graph = FlowGraph::new("fatal");
    graph.add_node(NodeSpec::new("a", "boom"));
    graph.add_node(NodeSpec::new("b", "counter"));
    graph.connect("a", "output", "b", "input");

    let log = Arc::new(RunLog::new());
    let err = runtime
        .execute_with(
            &graph,
            HashMap::new(),
            &[],
            RunOptions {
                log: Some(Arc::clone(&log)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Node(_)));
    assert_eq!(downstream_runs.load(Ordering::SeqCst), 0);

    // the full history, terminal error entry included, survives the failure
    let entries = log.entries();
    assert!(entries
        .iter()
        .any(|entry| entry.level == LogLevel::Error && entry.node_id.as_deref() == Some("a")));
    assert!(entries
        .iter()
        .any(|entry| entry.level == LogLevel::Error && entry.message.contains("aborted")));
}

#[tokio::test]
async fn unknown_node_type_fails_naming_the_type() {
    let runtime = FlowRuntime::new();
    let mut graph = FlowGraph::new("unknown");
    graph.add_node(NodeSpec::new("a", "never-registered"));

    let err = runtime.execute(&graph, HashMap::new()).await.unwrap_err();
    match err {
        FlowError::Graph(GraphError::UnknownNodeType(ty)) => {
            assert_eq!(ty, "never-registered");
        }
        other => panic!("expected unknown-type error, got {other}"),
    }
}

#[tokio::test]
async fn re_registering_a_custom_type_keeps_only_the_second_behavior() {
    let runtime = FlowRuntime::new();
    pass_through_output(runtime.registry());

    let first = CustomNodeDefinition {
        node_type: "greeter".to_string(),
        execution_code: r#"function execute() { return { output: "first" }; }"#.to_string(),
    };
    let second = CustomNodeDefinition {
        node_type: "greeter".to_string(),
        execution_code: r#"function execute() { return { output: "second" }; }"#.to_string(),
    };

    let mut graph = FlowGraph::new("overwrite");
    graph.add_node(NodeSpec::new("g", "greeter"));
    graph.add_node(NodeSpec::new("out", "output"));
    graph.connect("g", "output", "out", "input");

    let report = runtime
        .execute_with(
            &graph,
            HashMap::new(),
            &[first, second],
            RunOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.outputs.get("out"), Some(&Value::String("second".into())));
    assert!(runtime.registry().is_custom("greeter"));
    assert_eq!(runtime.registry().list_custom(), vec!["greeter".to_string()]);
}

#[tokio::test]
async fn log_covers_every_node_in_order_with_durations() {
    let runtime = FlowRuntime::new();
    pass_through_output(runtime.registry());
    runtime.registry().register_fn("echo", |ctx| async move {
        Ok(ctx.inputs.values().next().cloned().unwrap_or(Value::Null))
    });

    let mut graph = FlowGraph::new("chain");
    graph.add_node(NodeSpec::new("in", "input").with_config("value", "x"));
    graph.add_node(NodeSpec::new("mid", "echo"));
    graph.add_node(NodeSpec::new("out", "output"));
    graph.connect("in", "output", "mid", "input");
    graph.connect("mid", "output", "out", "input");

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();

    let first_entry_for = |id: &str| {
        report
            .log
            .iter()
            .position(|entry| entry.node_id.as_deref() == Some(id))
            .unwrap_or_else(|| panic!("no log entry for node {id}"))
    };
    assert!(first_entry_for("in") < first_entry_for("mid"));
    assert!(first_entry_for("mid") < first_entry_for("out"));

    // every node-attributed completion entry carries a duration
    for id in ["in", "mid", "out"] {
        assert!(report.log.iter().any(|entry| {
            entry.node_id.as_deref() == Some(id) && entry.duration_ms.is_some()
        }));
    }

    let last = report.log.last().unwrap();
    assert_eq!(last.level, LogLevel::Success);
    assert!(last.duration_ms.is_some());
}

#[tokio::test]
async fn cancellation_stops_the_run_before_the_next_node() {
    let runtime = FlowRuntime::new();
    runtime
        .registry()
        .register_fn("echo", |_ctx| async move { Ok(Value::Null) });

    let mut graph = FlowGraph::new("cancel");
    graph.add_node(NodeSpec::new("a", "echo"));

    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let err = runtime
        .execute_with(
            &graph,
            HashMap::new(),
            &[],
            RunOptions {
                cancellation,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Cancelled));
}

#[tokio::test]
async fn cycle_in_the_graph_is_a_structural_failure() {
    let runtime = FlowRuntime::new();
    runtime
        .registry()
        .register_fn("echo", |_ctx| async move { Ok(Value::Null) });

    let mut graph = FlowGraph::new("cyclic");
    graph.add_node(NodeSpec::new("a", "echo"));
    graph.add_node(NodeSpec::new("b", "echo"));
    graph.connect("a", "output", "b", "input");
    graph.connect("b", "output", "a", "input");

    let err = runtime.execute(&graph, HashMap::new()).await.unwrap_err();
    match err {
        FlowError::Graph(GraphError::CycleDetected { nodes }) => {
            assert_eq!(nodes.len(), 2);
        }
        other => panic!("expected cycle error, got {other}"),
    }
}
