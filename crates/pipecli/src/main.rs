// crates/pipecli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipecore::{GraphDocument, GraphEvent, NodeId, OperationKind, PathTree, Payload};
use piperuntime::{Command, EngineConfig, GraphEngine, OperationRegistry};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pipe")]
#[command(about = "Pipeline graph consistency tool", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore a graph document and report node readiness
    Check {
        /// Path to graph JSON file
        file: PathBuf,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List available operation kinds
    Kinds,

    /// Create a new example graph
    Init {
        /// Output file path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },

    /// Apply a JSON array of commands to a graph document
    Apply {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Path to command script JSON file
        #[arg(short, long)]
        commands: PathBuf,

        /// Where to write the resulting graph (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the upstream path tree of a node
    Path {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Node id
        #[arg(short, long)]
        node: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Check { file, config } => check_graph(&file, config.as_deref())?,
        Commands::Kinds => list_kinds(),
        Commands::Init { output } => create_example_graph(&output)?,
        Commands::Apply {
            file,
            commands,
            output,
        } => apply_commands(&file, &commands, output.as_deref())?,
        Commands::Path { file, node } => print_path(&file, NodeId(node))?,
    }

    Ok(())
}

fn registry() -> Arc<OperationRegistry> {
    Arc::new(pipenodes::standard_registry())
}

fn read_document(file: &Path) -> Result<GraphDocument> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading graph file {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing graph file {}", file.display()))
}

fn load_engine(file: &Path, config: EngineConfig) -> Result<GraphEngine> {
    let document = read_document(file)?;
    let engine = GraphEngine::restore(document, registry(), config)
        .with_context(|| format!("restoring graph from {}", file.display()))?;
    Ok(engine)
}

fn check_graph(file: &Path, config: Option<&Path>) -> Result<()> {
    println!("🔍 Checking graph: {}", file.display());

    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)?
        }
        None => EngineConfig::default(),
    };

    let persisted: HashMap<NodeId, _> = read_document(file)?
        .nodes
        .into_iter()
        .map(|node| (node.id, node.readiness))
        .collect();
    let engine = load_engine(file, config)?;
    let graph = engine.graph();

    println!("   Nodes: {}", graph.node_ids().count());
    println!("   Edges: {}", graph.edges().len());
    println!();

    let mut stale = 0;
    for node in graph.nodes() {
        let marker = if node.readiness.is_ok() { "✅" } else { "⏸️ " };
        print!("  {} {}{}: {}", marker, node.kind, node.id, node.readiness);
        match persisted.get(&node.id) {
            Some(saved) if *saved != node.readiness => {
                stale += 1;
                println!(" (stored as {})", saved);
            }
            _ => println!(),
        }
    }

    if stale > 0 {
        println!();
        println!("⚠️  {} node(s) had stale readiness on disk", stale);
    }
    Ok(())
}

fn list_kinds() {
    println!("📦 Available Operation Kinds:");
    println!();

    let registry = registry();
    for kind in registry.kinds() {
        let Some(operation) = registry.get(kind) else {
            continue;
        };
        let contract = operation.contract();
        println!(
            "  • {} ({:?} -> {:?})",
            kind, contract.inputs, contract.outputs
        );
        if !operation.description().is_empty() {
            println!("    {}", operation.description());
        }
    }
}

fn create_example_graph(output: &Path) -> Result<()> {
    let mut engine = GraphEngine::new(registry());

    let load = engine.add_node(
        OperationKind::Load,
        Some(json!({"path": "data.csv", "isAvailable": true})),
    )?;
    let cleanse = engine.add_node(OperationKind::Cleanse, None)?;
    let plot = engine.add_node(OperationKind::Visualize, None)?;
    engine.connect(load, cleanse, 0)?;
    engine.connect(cleanse, plot, 0)?;

    let json = serde_json::to_string_pretty(&engine.document())?;
    std::fs::write(output, json)?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Check it with:");
    println!("  pipe check {}", output.display());

    Ok(())
}

fn apply_commands(file: &Path, script: &Path, output: Option<&Path>) -> Result<()> {
    let mut engine = load_engine(file, EngineConfig::default())?;

    let text = std::fs::read_to_string(script)
        .with_context(|| format!("reading command script {}", script.display()))?;
    let commands: Vec<Command> = serde_json::from_str(&text)?;

    let mut events = engine.subscribe_events();
    for (index, command) in commands.into_iter().enumerate() {
        let name = command.name();
        engine
            .dispatch(command)
            .with_context(|| format!("command #{} ({}) rejected", index, name))?;
        tracing::info!("Applied command #{} ({})", index, name);

        while let Ok(event) = events.try_recv() {
            if let GraphEvent::ReadinessChanged {
                node_id, from, to, ..
            } = event
            {
                eprintln!("  {} -> {} on node {}", from, to, node_id);
            }
        }
    }

    let json = serde_json::to_string_pretty(&engine.document())?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!("✨ Wrote graph to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn print_path(file: &Path, node: NodeId) -> Result<()> {
    let engine = load_engine(file, EngineConfig::default())?;
    let tree = engine.resolve_path(node, 0)?;
    print_tree(&tree, 0);
    Ok(())
}

fn print_tree(tree: &PathTree, depth: usize) {
    let port = tree
        .dest_port
        .map(|p| format!("[{}] ", p))
        .unwrap_or_default();
    let output = match tree.output() {
        Some(Payload::Dataset(d)) => format!(" {} {:?}", d.name, d.columns),
        Some(payload) => format!(" {}", payload.port_type()),
        None => String::new(),
    };
    println!(
        "{}{}{}{} ({}){}",
        "  ".repeat(depth),
        port,
        tree.node.kind,
        tree.id(),
        tree.node.readiness,
        output
    );
    for child in &tree.children {
        print_tree(child, depth + 1);
    }
}
