use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hubtree::{Path, StatusMap, Tree, TreeConfig, snapshot};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hubtree", about = "Inspect and edit hubtree snapshot files")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a snapshot holding only a root node
    Init {
        file: String,
        #[arg(long)]
        root: Option<String>,
    },
    /// Merge a JSON object into a node's status, creating the node if needed
    SetStatus {
        file: String,
        path: String,
        values: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        bubble_up: bool,
    },
    /// Print a node's status
    Status { file: String, path: String },
    /// Add a node named `id` beneath `path`
    Add {
        file: String,
        path: String,
        id: String,
    },
    /// Set a node's value from JSON
    SetValue {
        file: String,
        path: String,
        value: String,
    },
    /// Delete the node at `path`
    Delete { file: String, path: String },
    /// Print a node and its subtree
    Show {
        file: String,
        #[arg(default_value = "")]
        path: String,
    },
    /// Print the tree's version counter
    Version { file: String },
}

fn open(file: &str, config: TreeConfig) -> Result<Tree> {
    snapshot::load(file, config).with_context(|| format!("Failed to open snapshot: {}", file))
}

fn parse_path(raw: &str) -> Result<Path> {
    Path::parse(raw).with_context(|| format!("Invalid path: {}", raw))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hubtree=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(file) => TreeConfig::load(file)
            .with_context(|| format!("Failed to read config: {}", file))?,
        None => TreeConfig::default(),
    };

    match cli.command {
        Commands::Init { file, root } => {
            if snapshot::exists(&file) {
                println!("File already exists: {}", file);
                return Ok(());
            }

            let mut config = config;
            if let Some(root) = root {
                config.root_id = root;
            }
            let tree = Tree::with_config(config);
            snapshot::save(&file, &tree)?;
            println!("Initialized tree '{}' at {}", tree.root().id(), file);
        }
        Commands::SetStatus {
            file,
            path,
            values,
            recursive,
            bubble_up,
        } => {
            let tree = open(&file, config)?;
            let path = parse_path(&path)?;
            let values: StatusMap = serde_json::from_str(&values)
                .context("Status values must be a JSON object")?;

            tree.set_node_status(&values, recursive, bubble_up, path.segments());
            snapshot::save(&file, &tree)?;
            println!("Set status of {} (version {})", path, tree.version());
        }
        Commands::Status { file, path } => {
            let tree = open(&file, config)?;
            let path = parse_path(&path)?;
            let status = tree.node_status(path.segments())?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Add { file, path, id } => {
            let tree = open(&file, config)?;
            let path = parse_path(&path)?;
            let node = tree.new_node(id, path.segments());
            snapshot::save(&file, &tree)?;
            println!("Added node '{}' under {}", node.id(), path);
        }
        Commands::SetValue { file, path, value } => {
            let tree = open(&file, config)?;
            let path = parse_path(&path)?;
            let value: serde_json::Value =
                serde_json::from_str(&value).context("Value must be JSON")?;
            tree.set_node_value(value, path.segments())?;
            snapshot::save(&file, &tree)?;
            println!("Set value of {}", path);
        }
        Commands::Delete { file, path } => {
            let tree = open(&file, config)?;
            let path = parse_path(&path)?;
            match tree.delete_node(path.segments())? {
                Some(node) => println!("Deleted node '{}' at {}", node.id(), path),
                None => println!("Nothing to delete at {}", path),
            }
            snapshot::save(&file, &tree)?;
        }
        Commands::Show { file, path } => {
            let tree = open(&file, config)?;
            let path = parse_path(&path)?;
            let node = tree.node(path.segments())?;
            println!("{}", node);
        }
        Commands::Version { file } => {
            let tree = open(&file, config)?;
            println!("{}", tree.version());
        }
    }

    Ok(())
}
