use std::path::PathBuf;

use anyhow::Context;
use scanly_config::ScanlyConfig;
use scanly_core::context::ScanlyContext;
use scanly_core::model::outcome::{DirectoryOutcome, ItemStatus};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::RootsCommand;

pub async fn run_daemon(ctx: &ScanlyContext, config: &ScanlyConfig) -> anyhow::Result<()> {
    let rearm = ctx.monitors().rearm_active().await;
    for (id, mode) in &rearm.armed {
        info!(root = %id, mode = ?mode, "monitoring resumed");
    }
    for id in &rearm.deactivated {
        warn!(root = %id, "root could not be re-armed and was deactivated");
    }

    let refreshed = ctx.refresh_remote_lists().await;
    if refreshed > 0 {
        info!(lists = refreshed, "reference lists refreshed");
    }

    let cancel = CancellationToken::new();
    let dispatcher = config
        .processing
        .auto_process
        .then(|| ctx.spawn_dispatcher(cancel.clone()));

    if config.repair.background {
        match ctx.repair_monitor() {
            Some(monitor) => {
                monitor.start().await;
            }
            None => warn!("background repair requested but repair is not configured"),
        }
    }

    info!(
        roots = rearm.armed.len(),
        auto_process = dispatcher.is_some(),
        "scanly daemon running; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    cancel.cancel();
    if let Some(handle) = dispatcher
        && let Err(err) = handle.await
    {
        warn!(error = %err, "dispatcher task ended abnormally");
    }
    Ok(())
}

pub async fn roots(ctx: &ScanlyContext, command: RootsCommand) -> anyhow::Result<()> {
    let monitors = ctx.monitors();
    let store = ctx.store();

    match command {
        RootsCommand::Add {
            path,
            name,
            inactive,
        } => {
            let id = monitors
                .add_root(&path, name, !inactive)
                .await
                .with_context(|| format!("failed to add {}", path.display()))?;
            println!("{id}");
        }
        RootsCommand::Remove { id } => {
            let root = monitors.remove_root(id).await?;
            println!("removed {} ({})", root.name, root.path.display());
        }
        RootsCommand::List => {
            for root in store.roots().await {
                let state = if root.active { "active" } else { "inactive" };
                let mode = root
                    .discovery_mode
                    .map(|mode| format!("{mode:?}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<8}  {:<11}  pending={:<4} processed={} errors={}  {}  {}",
                    root.id,
                    state,
                    mode,
                    root.pending.len(),
                    root.stats.total_processed,
                    root.stats.total_errors,
                    root.name,
                    root.path.display(),
                );
            }
        }
        RootsCommand::Activate { id } => {
            monitors.set_active(id, true).await?;
            println!("{id} active");
        }
        RootsCommand::Deactivate { id } => {
            monitors.set_active(id, false).await?;
            println!("{id} inactive");
        }
        RootsCommand::Pending { id: Some(id) } => {
            for path in store.list_pending(id).await? {
                println!("{}", path.display());
            }
        }
        RootsCommand::Pending { id: None } => {
            for item in store.list_all_pending().await {
                println!("{}  {}", item.root_id, item.path.display());
            }
        }
        RootsCommand::ClearPending { id } => {
            let cleared = store.clear_pending(id).await?;
            println!("cleared {cleared} pending item(s)");
        }
    }
    Ok(())
}

pub async fn process_pending(ctx: &ScanlyContext) -> anyhow::Result<()> {
    let summary = ctx
        .dispatcher()
        .run_once()
        .await
        .context("processing pending items failed")?;
    println!(
        "claimed {}  completed {}  left pending {}  dropped {}",
        summary.claimed, summary.completed, summary.released, summary.dropped
    );
    Ok(())
}

pub async fn scan(ctx: &ScanlyContext, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let pool = ctx.directories();
    let submitted = pool.submit_all(paths).await?;
    info!(directories = submitted, "scan started");

    let outcomes = pool
        .collect_results(|progress| {
            println!(
                "[{}/{}] {:.1}%  {}",
                progress.completed,
                progress.total,
                progress.percentage(),
                progress.latest.path.display()
            );
        })
        .await;

    for outcome in &outcomes {
        print_outcome(outcome);
    }
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    println!("{} directories, {} with failures", outcomes.len(), failed);
    Ok(())
}

fn print_outcome(outcome: &DirectoryOutcome) {
    if let Some(error) = &outcome.error {
        println!("{}: {error}", outcome.path.display());
        return;
    }
    for item in &outcome.items {
        let title = item.title.as_deref().unwrap_or("?");
        match &item.status {
            ItemStatus::Linked { external_id } => println!(
                "  linked   {title} [{}]",
                external_id.as_deref().unwrap_or("no id")
            ),
            ItemStatus::Skipped { reason } => println!("  skipped  {title}: {reason}"),
            ItemStatus::Failed { reason } => {
                println!("  failed   {}: {reason}", item.path.display())
            }
        }
    }
}

pub async fn repair(ctx: &ScanlyContext) -> anyhow::Result<()> {
    let Some(engine) = ctx.repair() else {
        anyhow::bail!("link repair is not configured; enable [repair] and set links.destination");
    };
    let report = engine.check_and_repair().await?;
    println!(
        "scanned {}  broken {}  repaired {}  failed {}  ({}s)",
        report.scanned,
        report.found,
        report.repaired,
        report.failed,
        (report.finished_at - report.started_at).num_seconds()
    );
    Ok(())
}

pub async fn refresh_lists(ctx: &ScanlyContext) -> anyhow::Result<()> {
    let sources = &ctx.settings().remote_lists;
    if sources.is_empty() {
        println!("no remote reference lists configured");
        return Ok(());
    }
    let refreshed = ctx.refresh_remote_lists().await;
    println!("{refreshed} of {} list(s) refreshed", sources.len());
    Ok(())
}
