use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use tf_postgresql::framework::{Json, Severity};
use tf_postgresql::provider::config_file::load_provider_config;
use tf_postgresql::{new_server, Diagnostics, PostgresqlProvider, ProviderServer};

#[derive(Parser)]
#[command(name = "tf-postgresql")]
#[command(about = "Drive the PostgreSQL provider's resources and data sources from the command line", long_about = None)]
#[command(version)]
struct Cli {
    /// Provider block as HCL or JSON; unset attributes fall back to POSTGRES_* variables
    #[arg(long, global = true)]
    provider: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider, resource and data source schemas
    Schema {},
    /// Check a resource configuration against its schema
    Validate {
        /// Resource type, e.g. postgresql_event_trigger
        #[arg(long = "type")]
        type_name: String,
        /// JSON file with the resource configuration
        #[arg(long)]
        config: PathBuf,
    },
    /// Compute the planned state for a resource
    Plan {
        #[arg(long = "type")]
        type_name: String,
        /// JSON file with the current state; omit for a new resource
        #[arg(long)]
        state: Option<PathBuf>,
        /// JSON file with the desired configuration; omit to plan destruction
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Plan and apply a change, replacing the object when the plan requires it
    Apply {
        #[arg(long = "type")]
        type_name: String,
        #[arg(long)]
        state: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Refresh a resource's state from the database
    Read {
        #[arg(long = "type")]
        type_name: String,
        #[arg(long)]
        state: PathBuf,
    },
    /// Import an existing object by id and read its state
    Import {
        #[arg(long = "type")]
        type_name: String,
        /// Identifier, e.g. `database.name`
        #[arg(long)]
        id: String,
    },
    /// Read a data source
    Data {
        #[arg(long = "type")]
        type_name: String,
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Serialize)]
struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    planned_state: Option<Json>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    requires_replace: Vec<String>,
    diagnostics: Diagnostics,
}

impl Output {
    fn state(state: Json, diagnostics: Diagnostics) -> Self {
        Output {
            state: Some(state),
            planned_state: None,
            requires_replace: Vec::new(),
            diagnostics,
        }
    }

    fn diagnostics(diagnostics: Diagnostics) -> Self {
        Output {
            state: None,
            planned_state: None,
            requires_replace: Vec::new(),
            diagnostics,
        }
    }
}

fn init_logging() {
    // TF_LOG follows the host's convention and wins over RUST_LOG.
    match std::env::var("TF_LOG").ok().filter(|v| !v.is_empty()) {
        Some(level) => {
            let level = match level.to_lowercase().as_str() {
                "json" => "trace".to_string(),
                other => other.to_string(),
            };
            env_logger::Builder::new().parse_filters(&level).init();
        }
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
        }
    }
}

fn read_json(path: &Path) -> Result<Json> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing JSON from {}", path.display()))
}

fn read_optional_json(path: Option<&Path>) -> Result<Option<Json>> {
    path.map(read_json).transpose()
}

async fn configured_server(provider: Option<&Path>) -> Result<(ProviderServer<PostgresqlProvider>, Diagnostics)> {
    let config = match provider {
        Some(path) => load_provider_config(path)?,
        None => json!({}),
    };
    let mut server = new_server(env!("CARGO_PKG_VERSION"));
    let diags = server.configure(config).await;
    Ok((server, diags))
}

async fn apply(
    server: &ProviderServer<PostgresqlProvider>,
    type_name: &str,
    state: Option<Json>,
    config: Option<Json>,
) -> Output {
    let plan = server.plan_resource_change(type_name, state.as_ref(), config.as_ref());
    if plan.diagnostics.has_error() {
        return Output::diagnostics(plan.diagnostics);
    }
    let mut diagnostics = plan.diagnostics;
    let mut prior = state;
    let mut planned = plan.planned_state;

    if !plan.requires_replace.is_empty() {
        info!("{} must be replaced: {:?}", type_name, plan.requires_replace);
        let destroyed = server
            .apply_resource_change(type_name, prior.as_ref(), None, None)
            .await;
        diagnostics.append(destroyed.diagnostics);
        if diagnostics.has_error() {
            return Output::state(destroyed.new_state, diagnostics);
        }
        prior = None;
        let replan = server.plan_resource_change(type_name, None, config.as_ref());
        diagnostics.append(replan.diagnostics);
        planned = replan.planned_state;
    }

    let applied = server
        .apply_resource_change(type_name, prior.as_ref(), Some(&planned), config.as_ref())
        .await;
    diagnostics.append(applied.diagnostics);
    Output {
        state: Some(applied.new_state),
        planned_state: None,
        requires_replace: plan.requires_replace,
        diagnostics,
    }
}

async fn run(cli: Cli) -> Result<Output> {
    let provider = cli.provider.as_deref();
    let output = match cli.command {
        Commands::Schema {} => {
            let schema = new_server(env!("CARGO_PKG_VERSION")).get_schema();
            let diagnostics = schema.diagnostics.clone();
            Output::state(serde_json::to_value(&schema)?, diagnostics)
        }
        Commands::Validate { type_name, config } => {
            let server = new_server(env!("CARGO_PKG_VERSION"));
            Output::diagnostics(server.validate_resource_config(&type_name, &read_json(&config)?))
        }
        Commands::Plan {
            type_name,
            state,
            config,
        } => {
            let server = new_server(env!("CARGO_PKG_VERSION"));
            let state = read_optional_json(state.as_deref())?;
            let config = read_optional_json(config.as_deref())?;
            let plan = server.plan_resource_change(&type_name, state.as_ref(), config.as_ref());
            Output {
                state: None,
                planned_state: Some(plan.planned_state),
                requires_replace: plan.requires_replace,
                diagnostics: plan.diagnostics,
            }
        }
        Commands::Apply {
            type_name,
            state,
            config,
        } => {
            let state = read_optional_json(state.as_deref())?;
            let config = read_optional_json(config.as_deref())?;
            let (server, diags) = configured_server(provider).await?;
            if diags.has_error() {
                return Ok(Output::diagnostics(diags));
            }
            apply(&server, &type_name, state, config).await
        }
        Commands::Read { type_name, state } => {
            let state = read_json(&state)?;
            let (server, diags) = configured_server(provider).await?;
            if diags.has_error() {
                return Ok(Output::diagnostics(diags));
            }
            let resp = server.read_resource(&type_name, &state).await;
            Output::state(resp.new_state, resp.diagnostics)
        }
        Commands::Import { type_name, id } => {
            let (server, diags) = configured_server(provider).await?;
            if diags.has_error() {
                return Ok(Output::diagnostics(diags));
            }
            let imported = server.import_resource(&type_name, &id).await;
            let mut diagnostics = imported.diagnostics;
            match imported.imported_resources.into_iter().next() {
                Some(resource) => {
                    let resp = server.read_resource(&resource.type_name, &resource.state).await;
                    diagnostics.append(resp.diagnostics);
                    Output::state(resp.new_state, diagnostics)
                }
                None => Output::diagnostics(diagnostics),
            }
        }
        Commands::Data { type_name, config } => {
            let config = read_json(&config)?;
            let (server, diags) = configured_server(provider).await?;
            if diags.has_error() {
                return Ok(Output::diagnostics(diags));
            }
            let resp = server.read_data_source(&type_name, &config).await;
            Output::state(resp.state, resp.diagnostics)
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let output = run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    for diag in output.diagnostics.iter().filter(|d| d.severity == Severity::Error) {
        error!("{}", diag);
    }
    if output.diagnostics.has_error() {
        std::process::exit(1);
    }
    Ok(())
}
