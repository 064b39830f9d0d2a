//! Operator control surface for the Alder workflow engine.
//!
//! Definitions and media items are plain JSON files; instances persist as
//! JSON under the data directory, so a paused workflow can be resumed by a
//! later invocation. Exit codes follow the engine's error taxonomy.

mod store;

use alder_workflow_engine::WorkflowEngine;
use alder_workflow_types::{
    MediaItem, WorkflowDefinition, WorkflowError, WorkflowInstanceId, WorkflowState,
    WorkflowStatus,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::FileStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "alder-workflow",
    version,
    about = "Operator control for the Alder workflow engine"
)]
struct Cli {
    /// Directory holding persisted workflow instances
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Instantiate a definition against a media item and dispatch it
    Start {
        /// Workflow definition JSON file
        #[arg(long)]
        definition: PathBuf,
        /// Media item JSON file
        #[arg(long)]
        media: PathBuf,
        /// Initial instance variable, as key=value (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
    /// Resume a paused instance
    Resume {
        instance: String,
        /// Redirect execution to this operation index (retry from step N)
        #[arg(long)]
        from: Option<usize>,
        /// Resume data handed to the next operation's resume entry point
        #[arg(long)]
        data: Option<String>,
    },
    /// Suspend an instance between operations
    Pause { instance: String },
    /// Stop an instance, abandoning its remaining operations
    Stop { instance: String },
    /// Show the status of one instance
    Status { instance: String },
    /// List every stored instance
    List,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(error_code(&error));
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let store = FileStore::open(&data_dir)
        .with_context(|| format!("opening data directory '{}'", data_dir.display()))?;
    let engine = WorkflowEngine::new(Arc::new(store));
    alder_workflow_handlers::install(engine.handlers());

    match cli.command {
        Command::Start {
            definition,
            media,
            vars,
        } => {
            let definition: WorkflowDefinition = read_json(&definition)?;
            let media: MediaItem = read_json(&media)?;
            let definition_id = engine.definitions().register(definition)?;
            let variables = parse_vars(&vars)?;
            let (id, _) = engine.run(&definition_id, media, variables)?;
            finish(engine.status(&id)?)
        }
        Command::Resume {
            instance,
            from,
            data,
        } => {
            let id = WorkflowInstanceId::new(instance);
            engine.resume(&id, from, data)?;
            finish(engine.status(&id)?)
        }
        Command::Pause { instance } => {
            let id = WorkflowInstanceId::new(instance);
            engine.pause(&id)?;
            finish(engine.status(&id)?)
        }
        Command::Stop { instance } => {
            let id = WorkflowInstanceId::new(instance);
            engine.stop(&id)?;
            finish(engine.status(&id)?)
        }
        Command::Status { instance } => {
            let status = engine.status(&WorkflowInstanceId::new(instance))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(0)
        }
        Command::List => {
            let mut statuses = engine.list()?;
            statuses.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            Ok(0)
        }
    }
}

/// Print the final status and derive the exit code from the instance state.
fn finish(status: WorkflowStatus) -> Result<i32> {
    println!("{}", serde_json::to_string_pretty(&status)?);
    let code = match status.state {
        WorkflowState::Failed => status
            .failure
            .as_ref()
            .map(|failure| kind_code(&failure.kind))
            .unwrap_or(1),
        _ => 0,
    };
    Ok(code)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading '{}'", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing '{}'", path.display()))
}

fn parse_vars(vars: &[String]) -> Result<HashMap<String, String>> {
    let mut variables = HashMap::new();
    for var in vars {
        let Some((key, value)) = var.split_once('=') else {
            bail!("variable '{var}' is not of the form key=value");
        };
        variables.insert(key.to_string(), value.to_string());
    }
    Ok(variables)
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("alder-workflow"))
        .unwrap_or_else(|| PathBuf::from(".alder-workflow"))
}

fn kind_code(kind: &str) -> i32 {
    match kind {
        "invalid-definition" => 2,
        "unresolved-variable" => 3,
        "handler-not-found" => 4,
        "handler-execution" => 5,
        "concurrent-modification" => 6,
        "definition-not-found" | "instance-not-found" => 7,
        _ => 1,
    }
}

fn error_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<WorkflowError>() {
        Some(workflow_error) => kind_code(workflow_error.kind()),
        None => 1,
    }
}
