use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sentry_iac::config::{Config, ProviderConfig};
use sentry_iac::engine::{LocalEngine, StateSnapshot};
use sentry_iac::provider::{projects, SentryProvider};
use sentry_iac::sentry::{format_api_error, SentryClient};
use sentry_iac::{Context, ContextConfig, CustomResource, Project, ProjectArgs, ResourceOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declare and inspect Sentry projects
#[derive(Parser, Debug)]
#[command(name = "sentry-iac", version = sentry_iac::VERSION, about, long_about = None)]
struct Args {
    /// Sentry auth token
    #[arg(long, env = "SENTRY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Sentry API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Stack whose state file is used
    #[arg(short, long)]
    stack: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Declare the desired state of a project
    Declare {
        /// Logical name of the resource in the stack
        logical_name: String,
        #[arg(long)]
        name: String,
        /// Organization slug (defaults to the configured organization)
        #[arg(long)]
        organization: Option<String>,
        #[arg(long)]
        slug: String,
        /// Team slug (defaults to the configured team)
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        default_environment: Option<String>,
        #[arg(long)]
        subject_prefix: Option<String>,
        #[arg(long)]
        subject_template: Option<String>,
        /// Delete the old project before creating its replacement
        #[arg(long)]
        delete_before_replace: bool,
        /// Refuse to delete or replace the project
        #[arg(long)]
        protect: bool,
    },
    /// Attach to an existing project by id (`<organization>/<slug>`)
    Get { logical_name: String, id: String },
    /// Delete a project recorded in the stack state
    Delete { logical_name: String },
    /// Print the stack state
    State,
    /// Verify the token against the API
    Check,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Could not open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("sentry-iac {} started with log level: {:?}", sentry_iac::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = Config::config_dir() {
        return config_dir.join("sentry-iac.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".sentry-iac").join("sentry-iac.log");
    }
    PathBuf::from("sentry-iac.log")
}

fn print<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn open_engine(provider: &ProviderConfig, state_path: &Path) -> Result<Arc<LocalEngine>> {
    let snapshot = StateSnapshot::load(state_path)?;
    let provider = SentryProvider::from_config(provider)?;
    Ok(Arc::new(
        LocalEngine::new()
            .with_provider(Arc::new(provider))
            .with_snapshot(snapshot),
    ))
}

async fn save_engine(engine: &LocalEngine, state_path: &Path) -> Result<()> {
    engine.snapshot().await.save(state_path)?;
    for line in engine.operation_summaries().await.iter().rev() {
        eprintln!("{}", line);
    }
    Ok(())
}

#[derive(Serialize)]
struct ResourceView {
    urn: String,
    id: String,
    outputs: serde_json::Map<String, serde_json::Value>,
}

/// Wait for a project handle, persist state, and show the result.
async fn settle_project(
    project: &Project,
    ctx: &Context,
    engine: &LocalEngine,
    state_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    ctx.drain().await;
    let outcome = project.id().zip(&project.registered().outputs).value().await;
    save_engine(engine, state_path).await?;

    let (id, outputs) = outcome?;
    print(
        format,
        &ResourceView {
            urn: project.urn().to_string(),
            id,
            outputs,
        },
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = Config::load();
    let stack = config.effective_stack(args.stack.as_deref());
    let state_path = Config::state_path(&stack);
    let context_config = ContextConfig::new(&stack, config.effective_project());

    match args.command {
        Command::State => print(args.output, &StateSnapshot::load(&state_path)?),
        Command::Check => {
            let provider =
                ProviderConfig::resolve(&config, args.token.as_deref(), args.api_url.as_deref())?;
            let client = SentryClient::new(&provider)?;
            if let Err(e) = client.check().await {
                tracing::debug!("Check failed: {:#}", e);
                anyhow::bail!("Sentry API at {}: {}", provider.api_url, format_api_error(&e));
            }
            println!("OK {}", provider.api_url);
            Ok(())
        }
        Command::Declare {
            logical_name,
            name,
            organization,
            slug,
            team,
            default_environment,
            subject_prefix,
            subject_template,
            delete_before_replace,
            protect,
        } => {
            let provider =
                ProviderConfig::resolve(&config, args.token.as_deref(), args.api_url.as_deref())?;
            let engine = open_engine(&provider, &state_path)?;
            let ctx = Context::new(engine.clone(), context_config)?;

            let organization = organization
                .or_else(|| config.organization.clone())
                .context("No organization given. Use --organization or set it in the config file")?;
            let team = team
                .or_else(|| config.team.clone())
                .context("No team given. Use --team or set it in the config file")?;

            let mut project_args = ProjectArgs::new()
                .name(name)
                .organization_slug(organization)
                .slug(slug)
                .team_slug(team);
            if let Some(env) = default_environment {
                project_args = project_args.default_environment(env);
            }
            if let Some(prefix) = subject_prefix {
                project_args = project_args.subject_prefix(prefix);
            }
            if let Some(template) = subject_template {
                project_args = project_args.subject_template(template);
            }

            let mut options = ResourceOptions::new();
            if delete_before_replace {
                options = options.delete_before_replace();
            }
            if protect {
                options = options.protected();
            }

            let project = Project::new(&ctx, &logical_name, project_args, options)?;
            settle_project(&project, &ctx, &engine, &state_path, args.output).await
        }
        Command::Get { logical_name, id } => {
            let provider =
                ProviderConfig::resolve(&config, args.token.as_deref(), args.api_url.as_deref())?;
            let engine = open_engine(&provider, &state_path)?;
            let ctx = Context::new(engine.clone(), context_config)?;

            let project = Project::get(&ctx, &logical_name, id, ResourceOptions::new())?;
            settle_project(&project, &ctx, &engine, &state_path, args.output).await
        }
        Command::Delete { logical_name } => {
            let provider =
                ProviderConfig::resolve(&config, args.token.as_deref(), args.api_url.as_deref())?;
            let snapshot = StateSnapshot::load(&state_path)?;
            let urn = snapshot
                .find_by_name(&logical_name)
                .into_iter()
                .find(|r| r.type_token == projects::TYPE_TOKEN)
                .map(|r| r.urn.clone())
                .with_context(|| {
                    format!("No project named '{}' in stack '{}'", logical_name, stack)
                })?;

            let engine = open_engine(&provider, &state_path)?;
            let outcome = engine.destroy(&urn).await;
            save_engine(&engine, &state_path).await?;
            outcome?;
            println!("Deleted {}", urn);
            Ok(())
        }
    }
}
