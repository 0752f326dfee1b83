//! `stm`: command-line client for the ST Manager backend and the host's
//! resource API.
//!
//! This binary is the composition root. It:
//!
//! 1. **Loads settings** from `config.toml`, then applies `--flag` / `STM_*`
//!    overrides.
//! 2. **Wires observability**: `tracing-subscriber` on stderr (pretty or JSON)
//!    plus an optional OpenTelemetry OTLP exporter.
//! 3. **Builds one [`ClientContext`]** and runs a single command against it,
//!    printing the result as pretty JSON on stdout.
//!
//! Resource commands first wait for the host with bounded backoff; backend
//! commands pick up a host session when one is available, then go to
//! transport detection.

mod context;
mod lifecycle;
mod observability;
mod settings;

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use model::{
    ApiName, BackupId, BackupOptions, BackupSchedule, CharacterId, HostCapabilities, PresetName,
    RegexScriptId, ResourceKind, ScheduleKind, WorldbookName,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::context::ClientContext;
use crate::lifecycle::{wait_for_host, Backoff};
use crate::settings::{CliSettings, LogFormat, Overrides};

#[derive(Parser)]
#[command(name = "stm")]
#[command(about = "Manage SillyTavern resources and ST Manager backups")]
#[command(version)]
struct Cli {
    /// Path to the settings file
    #[arg(long, env = "STM_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Standalone backend URL (overrides the saved one)
    #[arg(long, env = "STM_BACKEND_URL", global = true)]
    backend_url: Option<String>,

    /// Host (SillyTavern) URL
    #[arg(long, env = "STM_HOST_URL", global = true)]
    host_url: Option<String>,

    /// Log output format
    #[arg(long, env = "STM_LOG_FORMAT", value_enum, global = true)]
    log_format: Option<LogFormat>,

    /// OTLP collector endpoint for trace export
    #[arg(long, env = "STM_OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the backend transport and show the connection state
    Status,

    /// Save a new standalone backend URL and re-detect
    SetUrl {
        url: String,
    },

    /// Show backend statistics
    Stats,

    /// Backup management
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Move resources between the host and the backend
    #[command(subcommand)]
    Sync(SyncCommand),

    /// Backend configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Character cards
    #[command(subcommand)]
    Characters(CharacterCommand),

    /// Worldbooks
    #[command(subcommand)]
    Worldbooks(WorldbookCommand),

    /// Generation presets
    #[command(subcommand)]
    Presets(PresetCommand),

    /// Regex scripts
    #[command(subcommand)]
    Regex(RegexCommand),
}

impl Command {
    /// Commands served by the ST Manager backend rather than the host.
    fn uses_backend(&self) -> bool {
        matches!(
            self,
            Self::Stats | Self::Backup(_) | Self::Sync(_) | Self::Config(_)
        )
    }
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Start a manual backup
    Trigger {
        /// Resource types to include (repeatable; default: all)
        #[arg(long = "resource")]
        resources: Vec<String>,

        /// Destination path on the backend
        #[arg(long)]
        path: Option<String>,

        /// Only back up resources changed since the last backup
        #[arg(long)]
        incremental: bool,
    },

    /// List existing backups
    List,

    /// Restore a backup
    Restore { id: String },

    /// Delete a backup
    Delete { id: String },

    /// Show the backup schedule
    ScheduleShow,

    /// Replace the backup schedule
    ScheduleSet {
        /// disabled, daily, weekly or manual
        #[arg(long, value_parser = parse_schedule_kind)]
        kind: ScheduleKind,

        /// Hour of day (0-23)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
        hour: Option<u8>,

        /// Day of week for weekly schedules (0 = Sunday)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..7))]
        day_of_week: Option<u8>,

        /// Days to keep old backups
        #[arg(long)]
        retention_days: Option<u32>,

        /// Keep the schedule but turn it off
        #[arg(long)]
        disable: bool,
    },
}

#[derive(Subcommand)]
enum SyncCommand {
    /// Push one resource from the backend into the host
    ToSt { kind: ResourceKind, id: String },

    /// Pull every resource of a kind from the host into the backend
    FromSt { kind: ResourceKind },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the backend configuration
    Show,

    /// Set one configuration key. The value is parsed as JSON, falling back to
    /// a plain string.
    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum CharacterCommand {
    List,
    Show { id: String },
}

#[derive(Subcommand)]
enum WorldbookCommand {
    List,
    Show { name: String },
}

#[derive(Subcommand)]
enum PresetCommand {
    List,
    Show {
        name: String,

        /// API family the preset belongs to
        #[arg(long, default_value = "openai")]
        api: String,
    },
}

#[derive(Subcommand)]
enum RegexCommand {
    List,
    Show { id: String },
}

fn parse_schedule_kind(raw: &str) -> std::result::Result<ScheduleKind, String> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| format!("unknown schedule kind '{raw}'"))
}

/// Parses a `config set` value: JSON when it parses, a string otherwise.
fn parse_config_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn non_empty<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| anyhow!("{what} must not be empty"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = match cli.config.clone() {
        Some(path) => path,
        None => settings::default_path().context("could not determine the config directory")?,
    };
    let mut settings = CliSettings::load(&path)?;
    settings.apply(Overrides {
        backend_url: cli.backend_url.clone(),
        host_url: cli.host_url.clone(),
        log_format: cli.log_format,
        otlp_endpoint: cli.otlp_endpoint.clone(),
    });

    let telemetry = observability::init(&settings.logging)?;
    let result = run(cli.command, &settings, &path).await;
    telemetry.shutdown();
    result
}

async fn run(command: Command, settings: &CliSettings, path: &Path) -> Result<()> {
    // The embedding host would hand over its native APIs here; a standalone
    // CLI has none, so every family is served over REST.
    let capabilities = HostCapabilities::default();
    let ctx = ClientContext::new(&settings.effective_transport(), &capabilities)?;

    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler could be installed; run to completion.
            std::future::pending::<()>().await;
        }
    };
    until_interrupted(&ctx, dispatch(command, &ctx, settings, path), interrupt).await
}

/// Runs `work` unless `interrupt` fires first. An interrupt cancels in-flight
/// requests and drops `work`, which also ends any backoff it is sleeping in.
async fn until_interrupted(
    ctx: &ClientContext,
    work: impl Future<Output = Result<()>>,
    interrupt: impl Future<Output = ()>,
) -> Result<()> {
    tokio::select! {
        result = work => result,
        () = interrupt => {
            warn!("Interrupted; cancelling pending requests");
            ctx.abort_pending();
            bail!("interrupted")
        }
    }
}

async fn dispatch(
    command: Command,
    ctx: &ClientContext,
    settings: &CliSettings,
    path: &Path,
) -> Result<()> {
    let backoff = Backoff::from(&settings.host_ready);
    if command.uses_backend() {
        ctx.ensure_session().await;
    }

    match command {
        Command::Status => {
            ctx.connect().await;
            print_json(&json!({
                "connected": ctx.is_connected(),
                "connection": ctx.status(),
                "host_session": ctx.session().is_ready(),
                "strategies": ctx.resources().capabilities(),
            }))
        }
        Command::SetUrl { url } => {
            ctx.set_base_url(&url)?;
            // Re-read the file so command-line overrides are not persisted.
            let mut stored = CliSettings::load(path)?;
            stored.backend_url_override = Some(ctx.status().base_url);
            stored.save(path)?;
            info!(path = %path.display(), "Saved backend URL");
            ctx.connect().await;
            print_json(&ctx.status())
        }
        Command::Stats => print_json(&ctx.backups().stats().await?),
        Command::Backup(command) => run_backup(ctx, command).await,
        Command::Sync(SyncCommand::ToSt { kind, id }) => {
            print_json(&ctx.backups().sync_to_st(kind, &id).await?)
        }
        Command::Sync(SyncCommand::FromSt { kind }) => {
            print_json(&ctx.backups().sync_from_st(kind).await?)
        }
        Command::Config(ConfigCommand::Show) => print_json(&ctx.backups().get_config().await?),
        Command::Config(ConfigCommand::Set { key, value }) => {
            let mut patch = Map::new();
            patch.insert(key, parse_config_value(&value));
            print_json(&ctx.backups().update_config(&patch).await?)
        }
        Command::Characters(command) => {
            wait_for_host(ctx.session(), backoff).await?;
            let characters = ctx.resources().characters();
            match command {
                CharacterCommand::List => print_json(&characters.list().await?),
                CharacterCommand::Show { id } => {
                    let id = non_empty(CharacterId::new(id), "character id")?;
                    match characters.get(&id).await? {
                        Some(card) => print_json(&card),
                        None => bail!("character '{id}' not found"),
                    }
                }
            }
        }
        Command::Worldbooks(command) => {
            wait_for_host(ctx.session(), backoff).await?;
            let worldbooks = ctx.resources().worldbooks();
            match command {
                WorldbookCommand::List => print_json(&worldbooks.list().await?),
                WorldbookCommand::Show { name } => {
                    let name = non_empty(WorldbookName::new(name), "worldbook name")?;
                    match worldbooks.get(&name).await? {
                        Some(book) => print_json(&book),
                        None => bail!("worldbook '{name}' not found"),
                    }
                }
            }
        }
        Command::Presets(command) => {
            wait_for_host(ctx.session(), backoff).await?;
            let presets = ctx.resources().presets();
            match command {
                PresetCommand::List => print_json(&presets.list().await?),
                PresetCommand::Show { name, api } => {
                    let name = non_empty(PresetName::new(name), "preset name")?;
                    let api = non_empty(ApiName::new(api), "api")?;
                    match presets.get(&name, &api).await? {
                        Some(preset) => print_json(&preset),
                        None => bail!("preset '{name}' ({api}) not found"),
                    }
                }
            }
        }
        Command::Regex(command) => {
            wait_for_host(ctx.session(), backoff).await?;
            let scripts = ctx.resources().regex_scripts();
            match command {
                RegexCommand::List => print_json(&scripts.list().await?),
                RegexCommand::Show { id } => {
                    let id = non_empty(RegexScriptId::new(id), "regex script id")?;
                    match scripts.get(&id).await? {
                        Some(script) => print_json(&script),
                        None => bail!("regex script '{id}' not found"),
                    }
                }
            }
        }
    }
}

async fn run_backup(ctx: &ClientContext, command: BackupCommand) -> Result<()> {
    let backups = ctx.backups();
    match command {
        BackupCommand::Trigger {
            resources,
            path,
            incremental,
        } => {
            let options = BackupOptions {
                resources: (!resources.is_empty()).then_some(resources),
                path,
                incremental: incremental.then_some(true),
            };
            print_json(&backups.trigger(Some(&options)).await?)
        }
        BackupCommand::List => print_json(&backups.list().await?),
        BackupCommand::Restore { id } => {
            let id = non_empty(BackupId::new(id), "backup id")?;
            let accepted = ctx.restore_backup(&id).await?;
            print_json(&json!({ "success": accepted }))
        }
        BackupCommand::Delete { id } => {
            let id = non_empty(BackupId::new(id), "backup id")?;
            print_json(&backups.delete(&id).await?)
        }
        BackupCommand::ScheduleShow => print_json(&backups.get_schedule().await?),
        BackupCommand::ScheduleSet {
            kind,
            hour,
            day_of_week,
            retention_days,
            disable,
        } => {
            let schedule = BackupSchedule {
                enabled: !disable && kind != ScheduleKind::Disabled,
                kind,
                hour,
                day_of_week,
                retention_days,
            };
            let accepted = ctx.set_schedule(&schedule).await?;
            print_json(&json!({ "success": accepted }))
        }
    }
}
