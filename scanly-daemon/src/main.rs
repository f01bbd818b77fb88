//! # Scanly
//!
//! Watches download folders, matches new arrivals against reference title
//! lists and links them into an organized library. Without a subcommand the
//! binary runs as a daemon until interrupted.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scanly_config::{ConfigLoad, ConfigLoader, ScanlyConfig};
use scanly_core::collaborators::{
    Collaborators, KeywordClassifier, LogNotifier, NoopResolver, Notifier,
    RegexTitleExtractor, SymlinkLinkCreator, WebhookNotifier,
};
use scanly_core::context::ScanlyContext;
use scanly_core::model::ids::MonitoredRootId;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "scanly")]
#[command(about = "Media library organizer: watch, match and link")]
struct Cli {
    /// Path to scanly.toml
    #[arg(long, global = true, env = "SCANLY_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daemon until Ctrl-C (default)
    Run,
    /// Manage monitored roots
    #[command(subcommand)]
    Roots(RootsCommand),
    /// Process every pending item once and exit
    Process,
    /// Process the given directories and report progress
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Run one link repair pass and print the report
    Repair,
    /// Refetch remote reference lists that are out of date
    RefreshLists,
}

#[derive(Debug, Subcommand)]
enum RootsCommand {
    /// Register a directory for monitoring
    Add {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        /// Register without starting to watch
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
    /// Stop monitoring and forget a root
    Remove { id: MonitoredRootId },
    /// Show every registered root
    List,
    Activate { id: MonitoredRootId },
    Deactivate { id: MonitoredRootId },
    /// Show pending items for one root, or for all of them
    Pending { id: Option<MonitoredRootId> },
    /// Drop every pending item of a root
    ClearPending { id: MonitoredRootId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing();
    let config = load_config(&cli)?;

    let needs_linker = match &cli.command {
        None | Some(Command::Run) => config.processing.auto_process,
        Some(Command::Process) | Some(Command::Scan { .. }) => true,
        _ => false,
    };
    if needs_linker && config.links.destination.is_none() {
        anyhow::bail!(
            "no link destination configured; set links.destination or DESTINATION_DIRECTORY"
        );
    }

    let ctx = ScanlyContext::build(config.context_settings(), collaborators(&config))
        .await
        .context("failed to initialize scanly")?;

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => commands::run_daemon(&ctx, &config).await,
        Command::Roots(command) => commands::roots(&ctx, command).await,
        Command::Process => commands::process_pending(&ctx).await,
        Command::Scan { paths } => commands::scan(&ctx, paths).await,
        Command::Repair => commands::repair(&ctx).await,
        Command::RefreshLists => commands::refresh_lists(&ctx).await,
    };

    ctx.shutdown().await;
    result
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scanly_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ScanlyConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path);
    }

    let ConfigLoad {
        config,
        warnings,
        metadata,
    } = loader.load().context("failed to load configuration")?;

    if metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    info!(
        watch.debounce_ms = config.watch.debounce_window_ms,
        watch.poll_interval_secs = config.watch.poll_interval_secs,
        matching.workers = config.matching.workers,
        processing.directory_workers = config.processing.directory_workers,
        processing.auto_process = config.processing.auto_process,
        repair.enabled = config.repair.enabled,
        "configuration in effect"
    );

    Ok(config)
}

fn collaborators(config: &ScanlyConfig) -> Collaborators {
    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };
    // Commands that link refuse to start without a destination, so the
    // fallback is never written to.
    let destination = config
        .links
        .destination
        .clone()
        .unwrap_or_else(|| PathBuf::from("library"));

    Collaborators {
        extractor: Arc::new(RegexTitleExtractor),
        classifier: Arc::new(KeywordClassifier),
        resolver: Arc::new(NoopResolver),
        linker: Arc::new(SymlinkLinkCreator::new(destination, config.links.relative)),
        notifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_runs_the_daemon() {
        let cli = Cli::try_parse_from(["scanly"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn roots_add_parses_flags() {
        let cli = Cli::try_parse_from([
            "scanly",
            "roots",
            "add",
            "/downloads",
            "--name",
            "Downloads",
            "--inactive",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Roots(RootsCommand::Add {
                path,
                name,
                inactive,
            })) => {
                assert_eq!(path, PathBuf::from("/downloads"));
                assert_eq!(name.as_deref(), Some("Downloads"));
                assert!(inactive);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn root_ids_must_be_uuids() {
        assert!(Cli::try_parse_from(["scanly", "roots", "remove", "nope"]).is_err());
    }

    #[test]
    fn scan_requires_paths() {
        assert!(Cli::try_parse_from(["scanly", "scan"]).is_err());
    }
}
