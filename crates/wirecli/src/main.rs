use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use wirecore::{CustomNodeDefinition, FlowGraph, LogEntry, LogLevel, NodeSpec, Value};
use wireruntime::{scheduler, BehaviorRegistry, FlowRuntime, RunOptions};

#[derive(Parser)]
#[command(name = "wire")]
#[command(about = "Wireflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flow graph file
    Run {
        /// Path to flow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Path to a JSON file with custom node definitions
        #[arg(short, long)]
        custom: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flow graph file
    Validate {
        /// Path to flow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example flow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            custom,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::WARN)
                    .init();
            }

            run_flow(file, input, custom).await?;
        }

        Commands::Validate { file } => {
            validate_flow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_flow(output)?;
        }
    }

    Ok(())
}

fn parse_inputs(input: Option<String>) -> Result<HashMap<String, Value>> {
    let Some(input_str) = input else {
        return Ok(HashMap::new());
    };
    let json: serde_json::Value = serde_json::from_str(&input_str)?;
    let serde_json::Value::Object(obj) = json else {
        return Err(anyhow::anyhow!("Input must be a JSON object"));
    };
    Ok(obj
        .into_iter()
        .map(|(key, value)| (key, Value::from_json(value)))
        .collect())
}

fn print_entry(entry: &LogEntry) {
    let icon = match entry.level {
        LogLevel::Info => "ℹ️ ",
        LogLevel::Success => "✅",
        LogLevel::Warning => "⚠️ ",
        LogLevel::Error => "❌",
    };
    match entry.duration_ms {
        Some(ms) => println!("  {} {} ({}ms)", icon, entry.message, ms),
        None => println!("  {} {}", icon, entry.message),
    }
}

async fn run_flow(
    file: PathBuf,
    input: Option<String>,
    custom: Option<PathBuf>,
) -> Result<()> {
    println!("🚀 Loading flow from: {}", file.display());

    let graph_json = std::fs::read_to_string(&file)?;
    let graph: FlowGraph = serde_json::from_str(&graph_json)?;

    println!("📋 Flow: {}", graph.name);
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Connections: {}", graph.connections.len());
    println!();

    let inputs = parse_inputs(input)?;

    let custom_nodes: Vec<CustomNodeDefinition> = match custom {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        None => Vec::new(),
    };

    let runtime = FlowRuntime::new();
    wirenodes::register_all(runtime.registry());

    let options = RunOptions {
        observer: Some(Arc::new(print_entry)),
        ..Default::default()
    };

    match runtime.execute_with(&graph, inputs, &custom_nodes, options).await {
        Ok(report) => {
            println!();
            println!("✨ Flow completed in {}ms", report.duration_ms);
            if !report.outputs.is_empty() {
                println!();
                println!("📤 Outputs:");
                for (node_id, value) in &report.outputs {
                    println!("   {}: {}", node_id, value.to_json());
                }
            }
            Ok(())
        }
        Err(err) => {
            println!();
            println!("💥 Flow failed: {}", err);
            Err(err.into())
        }
    }
}

fn validate_flow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating flow: {}", file.display());

    let graph_json = std::fs::read_to_string(&file)?;
    let graph: FlowGraph = serde_json::from_str(&graph_json)?;

    scheduler::validate(&graph)?;
    scheduler::execution_order(&graph)?;

    let registry = BehaviorRegistry::new();
    wirenodes::register_all(&registry);
    let unknown: Vec<&str> = graph
        .nodes
        .iter()
        .filter(|node| !registry.contains(&node.node_type))
        .map(|node| node.node_type.as_str())
        .collect();
    if !unknown.is_empty() {
        println!(
            "⚠️  Unknown node types (must be registered as custom nodes): {}",
            unknown.join(", ")
        );
    }

    println!("✅ Flow is valid:");
    println!("   Name: {}", graph.name);
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Connections: {}", graph.connections.len());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available node types:");
    println!();

    let registry = BehaviorRegistry::new();
    wirenodes::register_all(&registry);

    for node_type in registry.list_types() {
        if registry.is_custom(&node_type) {
            println!("  • {} (custom)", node_type);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_flow(output: PathBuf) -> Result<()> {
    let mut graph = FlowGraph::new("Example combine flow");

    graph.add_node(
        NodeSpec::new("greeting", "input")
            .with_name("Greeting")
            .with_config("value", "hello"),
    );
    graph.add_node(
        NodeSpec::new("subject", "input")
            .with_name("Subject")
            .with_config("value", "world"),
    );
    graph.add_node(
        NodeSpec::new("combine", "combine-text")
            .with_config("mode", "separator")
            .with_config("separator", ", "),
    );
    graph.add_node(NodeSpec::new("result", "output").with_name("Result"));

    graph.connect("greeting", "output", "combine", "text1");
    graph.connect("subject", "output", "combine", "text2");
    graph.connect("combine", "output", "result", "input");

    let json = serde_json::to_string_pretty(&graph)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example flow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  wire run --file {} --input '{{\"Greeting\": \"hi\"}}'",
        output.display()
    );

    Ok(())
}
