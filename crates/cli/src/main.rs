//! `workflow-editor` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`          start the editor API server.
//! - `migrate`        run pending database migrations.
//! - `create-project` insert an empty project.
//! - `import`         store a workflow JSON file as a new workflow.
//! - `list`           list a project's workflows.
//! - `validate`       lint a workflow JSON file.
//! - `replay`         run a list of editor actions over a workflow offline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use engine::{reduce, validate_document, EditCommand, EditorState, PgWorkflowStore, WorkflowDocument};
use queue::QueueConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "workflow-editor",
    about = "Undoable multi-agent workflow editor with debounced persistence",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        /// Quiet period before an edit is saved.
        #[arg(long, env = "EDITOR_DEBOUNCE_MS", default_value_t = 2000)]
        debounce_ms: u64,
        #[arg(long, default_value_t = 10)]
        max_connections: u32,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Create an empty project and print its ID.
    CreateProject {
        name: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Store a workflow JSON file as a new workflow of its `projectId`.
    Import {
        path: PathBuf,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// List the workflows of a project.
    List {
        project_id: Uuid,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Apply a JSON array of actions to a workflow and print the result.
    Replay {
        document: PathBuf,
        actions: PathBuf,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<db::DbPool> {
    db::pool::create_pool(database_url, max_connections)
        .await
        .context("failed to connect to database")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url, debounce_ms, max_connections } => {
            info!("Starting API server on {bind}");
            let pool = connect(&database_url, max_connections).await?;
            let store = Arc::new(PgWorkflowStore::new(pool));
            let state = api::AppState::new(store, QueueConfig::with_debounce_ms(debounce_ms));
            api::serve(&bind, state).await?;
        }
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = connect(&database_url, 2).await?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::CreateProject { name, database_url } => {
            let pool = connect(&database_url, 2).await?;
            let project = db::repository::projects::create_project(&pool, &name).await?;
            println!("{}", project.id);
        }
        Command::Import { path, database_url } => {
            let document: WorkflowDocument = read_json(&path)?;
            let issues = validate_document(&document);
            if !issues.is_empty() {
                for issue in &issues {
                    eprintln!("  - {issue}");
                }
                bail!("{} has {} issue(s), not imported", path.display(), issues.len());
            }
            let pool = connect(&database_url, 2).await?;
            PgWorkflowStore::new(pool).import(&document).await?;
            println!("{}", document.id);
        }
        Command::List { project_id, database_url } => {
            let pool = connect(&database_url, 2).await?;
            for doc in PgWorkflowStore::new(pool).list(project_id).await? {
                println!("{}\t{}\t{}", doc.id, doc.last_updated_at.to_rfc3339(), doc.name);
            }
        }
        Command::Validate { path } => {
            let document: WorkflowDocument = read_json(&path)?;
            let issues = validate_document(&document);
            if issues.is_empty() {
                println!(
                    "Workflow is valid: {} agent(s), {} tool(s), {} prompt(s)",
                    document.agents.len(),
                    document.tools.len(),
                    document.prompts.len()
                );
            } else {
                for issue in &issues {
                    eprintln!("  - {issue}");
                }
                bail!("validation failed with {} issue(s)", issues.len());
            }
        }
        Command::Replay { document, actions } => {
            let document: WorkflowDocument = read_json(&document)?;
            let commands: Vec<EditCommand> = read_json(&actions)?;
            let count = commands.len();

            let state = commands
                .into_iter()
                .fold(EditorState::new(document, None), |state, command| {
                    reduce(state, command.into())
                });
            info!(actions = count, generation = state.generation, "Replay finished");
            println!("{}", serde_json::to_string_pretty(&state.view())?);
        }
    }

    Ok(())
}
