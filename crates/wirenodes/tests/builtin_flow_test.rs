use std::collections::HashMap;
use wirecore::{FlowGraph, NodeSpec, Value};
use wireruntime::FlowRuntime;

fn runtime_with_builtins() -> FlowRuntime {
    let runtime = FlowRuntime::new();
    wirenodes::register_all(runtime.registry());
    runtime
}

#[tokio::test]
async fn conditional_false_branch_carries_the_configured_value() {
    let runtime = runtime_with_builtins();

    let mut graph = FlowGraph::new("conditional");
    graph.add_node(
        NodeSpec::new("in", "input")
            .with_config("value", "5")
            .with_config("input_type", "number"),
    );
    graph.add_node(
        NodeSpec::new("cond", "if-else")
            .with_config("expression", "input > 10")
            .with_config("false_value", "fallback"),
    );
    graph.connect("in", "output", "cond", "input");

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    let result = report.results.get("cond").unwrap();

    assert_eq!(
        result.get_member("false"),
        Some(Value::String("fallback".into()))
    );
    assert_eq!(result.get_member("true"), None);
}

#[tokio::test]
async fn conditional_true_branch_routes_the_input() {
    let runtime = runtime_with_builtins();

    let mut graph = FlowGraph::new("conditional");
    graph.add_node(
        NodeSpec::new("in", "input")
            .with_config("value", "42")
            .with_config("input_type", "number"),
    );
    graph.add_node(NodeSpec::new("cond", "if-else").with_config("expression", "input > 10"));
    graph.connect("in", "output", "cond", "input");

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    let result = report.results.get("cond").unwrap();

    assert_eq!(result.get_member("true"), Some(Value::Number(42.0)));
    assert_eq!(result.get_member("false"), None);
}

#[tokio::test]
async fn broken_condition_takes_the_false_branch_without_aborting() {
    let runtime = runtime_with_builtins();

    let mut graph = FlowGraph::new("broken-cond");
    graph.add_node(NodeSpec::new("in", "input").with_config("value", "x"));
    graph.add_node(
        NodeSpec::new("cond", "if-else")
            .with_config("expression", "totally.undefined.path")
            .with_config("false_value", "safe"),
    );
    graph.connect("in", "output", "cond", "input");

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    let result = report.results.get("cond").unwrap();
    assert_eq!(result.get_member("false"), Some(Value::String("safe".into())));
    assert!(report
        .log
        .iter()
        .any(|entry| entry.message.contains("Condition evaluation failed")));
}

#[tokio::test]
async fn static_text_falls_back_to_raw_text_on_bad_json() {
    let runtime = runtime_with_builtins();

    let mut graph = FlowGraph::new("static");
    graph.add_node(
        NodeSpec::new("good", "static-text")
            .with_config("text", r#"{"k": 1}"#)
            .with_config("parse_json", true),
    );
    graph.add_node(
        NodeSpec::new("bad", "static-text")
            .with_config("text", "{ nope")
            .with_config("parse_json", true),
    );

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    assert_eq!(
        report.results.get("good"),
        Some(&Value::Json(serde_json::json!({"k": 1})))
    );
    assert_eq!(report.results.get("bad"), Some(&Value::String("{ nope".into())));
}

#[tokio::test]
async fn json_parse_extracts_dot_paths_through_a_flow() {
    let runtime = runtime_with_builtins();

    let mut graph = FlowGraph::new("parse");
    graph.add_node(
        NodeSpec::new("in", "input")
            .with_config("value", r#"{"user": {"names": ["ada", "grace"]}}"#),
    );
    graph.add_node(
        NodeSpec::new("parse", "json-parse").with_config("path", "user.names.1"),
    );
    graph.add_node(NodeSpec::new("out", "output"));
    graph.connect("in", "output", "parse", "input");
    graph.connect("parse", "output", "out", "input");

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    assert_eq!(
        report.outputs.get("out"),
        Some(&Value::Json(serde_json::json!("grace")))
    );
}

#[tokio::test]
async fn json_parse_failure_modes_follow_configuration() {
    let runtime = runtime_with_builtins();

    // soft mode: warning + null
    let mut soft = FlowGraph::new("soft");
    soft.add_node(NodeSpec::new("in", "input").with_config("value", "not json"));
    soft.add_node(NodeSpec::new("parse", "json-parse"));
    soft.connect("in", "output", "parse", "input");

    let report = runtime.execute(&soft, HashMap::new()).await.unwrap();
    assert!(report.results.get("parse").unwrap().is_null());

    // strict mode: the run aborts
    let mut strict = FlowGraph::new("strict");
    strict.add_node(NodeSpec::new("in", "input").with_config("value", "not json"));
    strict.add_node(NodeSpec::new("parse", "json-parse").with_config("fail_on_error", true));
    strict.connect("in", "output", "parse", "input");

    assert!(runtime.execute(&strict, HashMap::new()).await.is_err());
}

#[tokio::test]
async fn combine_text_joins_ports_in_order() {
    let runtime = runtime_with_builtins();

    let mut graph = FlowGraph::new("combine");
    graph.add_node(NodeSpec::new("a", "static-text").with_config("text", "first"));
    graph.add_node(NodeSpec::new("b", "static-text").with_config("text", "second"));
    graph.add_node(
        NodeSpec::new("combine", "combine-text")
            .with_config("mode", "separator")
            .with_config("separator", " | "),
    );
    graph.add_node(NodeSpec::new("out", "output"));
    graph.connect("a", "output", "combine", "text1");
    graph.connect("b", "output", "combine", "text2");
    graph.connect("combine", "output", "out", "input");

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    assert_eq!(
        report.outputs.get("out"),
        Some(&Value::String("first | second".into()))
    );
}

#[tokio::test]
async fn output_node_prefers_the_input_port() {
    let runtime = runtime_with_builtins();

    let mut graph = FlowGraph::new("outputs");
    graph.add_node(NodeSpec::new("a", "static-text").with_config("text", "aside"));
    graph.add_node(NodeSpec::new("b", "static-text").with_config("text", "main"));
    graph.add_node(NodeSpec::new("out", "output"));
    graph.connect("a", "output", "out", "aux");
    graph.connect("b", "output", "out", "input");

    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    assert_eq!(report.outputs.get("out"), Some(&Value::String("main".into())));
}
