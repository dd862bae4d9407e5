//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use serde_json::{Value, json};
use thiserror::Error;

use bundle_janitor::core::config::Config;
use bundle_janitor::core::errors::JanitorError;
use bundle_janitor::core::paths::resolve_absolute_path;
use bundle_janitor::daemon::loop_main::{JanitorDaemon, build_janitor};
use bundle_janitor::janitor::{FreeSpaceOutcome, RunReport};
use bundle_janitor::logger::activity::{ActivityEvent, spawn_logger};
use bundle_janitor::logger::jsonl::JsonlConfig;

/// Bundle janitor: keeps a bundle directory within its disk budget.
#[derive(Debug, Parser)]
#[command(
    name = "bundle-janitor",
    author,
    version,
    about = "Bundle Janitor - stale upload, dead dump and free space cleanup",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the janitor periodically until SIGTERM/SIGINT.
    Daemon,
    /// Perform a single janitor run and print its report.
    Run(RunArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Bundle directory to clean instead of the configured one.
    #[arg(long, value_name = "PATH")]
    bundle_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration (default).
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// A janitor run or the daemon failed.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<JanitorError> for CliError {
    fn from(error: JanitorError) -> Self {
        match error {
            JanitorError::InvalidConfig { .. }
            | JanitorError::MissingConfig { .. }
            | JanitorError::ConfigParse { .. } => Self::User(error.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Daemon => run_daemon(cli),
        Command::Run(args) => run_once(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_daemon(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mut daemon = JanitorDaemon::init(config)?;
    daemon.run()?;
    Ok(())
}

fn run_once(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bundle_dir) = &args.bundle_dir {
        config.janitor.bundle_dir = resolve_absolute_path(bundle_dir);
    }

    let (logger, logger_join) = spawn_logger(JsonlConfig::at(config.paths.jsonl_log.clone()))?;
    let outcome = build_janitor(&config, logger.clone()).and_then(|mut janitor| janitor.run());
    match &outcome {
        Ok(report) => logger.send(ActivityEvent::RunCompleted {
            report: report.clone(),
        }),
        Err(e) => logger.send(ActivityEvent::RunFailed {
            code: e.code().to_string(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        }),
    }
    logger.shutdown();
    let _ = logger_join.join();

    let report = outcome?;
    match output_mode(cli) {
        OutputMode::Human => print_run_report(&config, &report),
        OutputMode::Json => {
            let payload = json!({
                "command": "run",
                "bundle_dir": config.janitor.bundle_dir.to_string_lossy(),
                "report": serde_json::to_value(&report)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_run_report(config: &Config, report: &RunReport) {
    println!("Janitor run on {}", config.janitor.bundle_dir.display());
    println!("  Stale uploads removed: {}", report.uploads_removed);
    println!("  Dead dumps removed:    {}", report.dead_dumps_removed);
    println!(
        "  Dumps evicted:         {} ({})",
        report.dumps_evicted,
        format_bytes(report.bytes_evicted)
    );
    if report.unparsable_dump_names > 0 {
        println!(
            "  Unparsable dump names: {} (left in place)",
            report.unparsable_dump_names
        );
    }
    let free_space = match report.free_space {
        FreeSpaceOutcome::NotChecked => "not checked".to_string(),
        FreeSpaceOutcome::AlreadySatisfied => "target already met".to_string(),
        FreeSpaceOutcome::TargetReached => "target reached".to_string(),
        FreeSpaceOutcome::NothingPrunable { bytes_short } => {
            format!("nothing left to prune, {} short", format_bytes(bytes_short))
        }
    };
    println!("  Free space:            {free_space}");
    println!("  Duration:              {}ms", report.duration_ms);
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        None | Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            let hash = config.stable_hash()?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config).map_err(JanitorError::from)?;
                    println!("# hash: {hash}");
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "hash": hash,
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("BUNDLE_JANITOR_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
