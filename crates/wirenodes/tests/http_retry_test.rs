use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wirecore::{FlowGraph, NodeSpec, Value};
use wireruntime::FlowRuntime;

async fn read_request(socket: &mut TcpStream) {
    let mut buf = vec![0u8; 4096];
    let mut filled = 0;
    loop {
        match socket.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                if buf[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
                if filled == buf.len() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

/// Serve canned responses, one per connection, counting hits.
async fn serve_script(listener: TcpListener, hits: Arc<AtomicUsize>, script: Vec<&'static str>) {
    loop {
        let Ok((mut socket, _)) = listener.accept().await else {
            break;
        };
        let attempt = hits.fetch_add(1, Ordering::SeqCst);
        let response = *script.get(attempt).unwrap_or(script.last().expect("script"));
        tokio::spawn(async move {
            read_request(&mut socket).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}

const SERVER_ERROR: &str =
    "HTTP/1.1 500 Internal Server Error\r\ncontent-type: text/plain\r\ncontent-length: 4\r\nconnection: close\r\n\r\noops";
const OK_JSON: &str =
    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 11\r\nconnection: close\r\n\r\n{\"ok\":true}";
const NOT_FOUND: &str =
    "HTTP/1.1 404 Not Found\r\ncontent-type: text/plain\r\ncontent-length: 7\r\nconnection: close\r\n\r\nmissing";

fn runtime_with_builtins() -> FlowRuntime {
    let runtime = FlowRuntime::new();
    wirenodes::register_all(runtime.registry());
    runtime
}

fn request_graph(url: String) -> FlowGraph {
    let mut graph = FlowGraph::new("http");
    graph.add_node(
        NodeSpec::new("req", "http-request")
            .with_config("url", url)
            .with_config("max_attempts", 3.0)
            .with_config("retry_delay_ms", 50.0),
    );
    graph
}

#[tokio::test]
async fn server_errors_are_retried_with_backoff_until_success() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let server = tokio::spawn(serve_script(
        listener,
        Arc::clone(&hits),
        vec![SERVER_ERROR, SERVER_ERROR, OK_JSON],
    ));

    let runtime = runtime_with_builtins();
    let graph = request_graph(format!("http://{}/", addr));

    let started = Instant::now();
    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();
    let elapsed = started.elapsed();

    // two failures then success: exactly 3 attempts
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let result = report.results.get("req").unwrap();
    assert_eq!(result.get_member("status"), Some(Value::Number(200.0)));
    assert_eq!(
        result.get_member("body"),
        Some(Value::Json(serde_json::json!({"ok": true})))
    );

    // backoff delays: 50ms after the first failure, 100ms after the second
    assert!(
        elapsed.as_millis() >= 150,
        "expected backoff delays, finished in {}ms",
        elapsed.as_millis()
    );

    server.abort();
}

#[tokio::test]
async fn client_errors_are_never_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let server = tokio::spawn(serve_script(
        listener,
        Arc::clone(&hits),
        vec![NOT_FOUND],
    ));

    let runtime = runtime_with_builtins();
    let graph = request_graph(format!("http://{}/", addr));
    let report = runtime.execute(&graph, HashMap::new()).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let result = report.results.get("req").unwrap();
    assert_eq!(result.get_member("status"), Some(Value::Number(404.0)));
    assert_eq!(
        result.get_member("body"),
        Some(Value::String("missing".into()))
    );

    server.abort();
}
