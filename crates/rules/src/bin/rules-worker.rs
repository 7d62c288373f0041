//! rules-worker: notification routing worker.
//!
//! Loads notification rules from the rules directory (hot-reloaded), arms the
//! schedules of digest rules, and reads newline-delimited JSON events from
//! stdin, dispatching each to the rules it matches.
//!
//! Runs until Ctrl-C or stdin EOF, then cancels all schedules and waits
//! (bounded) for in-flight digest runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use vigil_core::config::{load_dotenv, Config};
use vigil_core::{Event, LevelMatching};
use vigil_notify::{Dispatcher, PublisherRegistry};
use vigil_rules::{Catalog, MemoryStore, NotificationEngine, RuleLoader};

// ── CLI ─────────────────────────────────────────────────────────────

/// Notification rules worker: event routing and scheduled digests.
#[derive(Parser, Debug)]
#[command(name = "rules-worker", version, about)]
struct Cli {
    /// Directory with NotificationRule YAML files.
    #[arg(long, env = "RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// JSON project catalog (hierarchy, findings, policy violations).
    #[arg(long, env = "CATALOG_PATH")]
    catalog: Option<PathBuf>,

    /// Level matching mode: `legacy` or `at-or-above`.
    #[arg(long, env = "VIGIL_LEVEL_MATCHING")]
    level_matching: Option<LevelMatching>,

    /// Seconds to wait for in-flight scheduled runs at shutdown.
    #[arg(long, env = "SCHEDULER_SHUTDOWN_TIMEOUT_SECS")]
    shutdown_timeout: Option<u64>,

    /// Disable hot-reload of the rules directory.
    #[arg(long)]
    no_watch: bool,

    /// Run these scheduled rules once right after startup.
    #[arg(long = "force-run", value_name = "RULE_ID")]
    force_run: Vec<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.rules_dir {
            config.rules.rules_dir = dir.clone();
        }
        if let Some(path) = &self.catalog {
            config.rules.catalog_path = Some(path.clone());
        }
        if let Some(matching) = self.level_matching {
            config.rules.level_matching = matching;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.scheduler.shutdown_timeout_secs = secs;
        }
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);
    config.log_summary();

    let catalog = match &config.rules.catalog_path {
        Some(path) => Arc::new(Catalog::from_file(path)?),
        None => {
            warn!("no project catalog configured, project limits resolve to placeholders");
            Arc::new(Catalog::default())
        }
    };

    let mut loader = RuleLoader::new(config.rules.rules_dir.clone());
    let failed = loader.load_all()?.iter().filter(|r| r.is_failed()).count();
    if failed > 0 {
        warn!(failed, "some rule files could not be loaded");
    }
    if !cli.no_watch {
        loader.watch()?;
    }

    let store = Arc::new(MemoryStore::new(catalog.clone()));
    store.sync_documents(&loader.documents());
    info!(rules = store.len(), projects = catalog.project_count(), "rule store ready");

    let registry = PublisherRegistry::with_defaults(&config.publisher)?;
    info!(publishers = ?registry.keys(), "publishers registered");
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)));

    let engine = NotificationEngine::new(
        store.clone(),
        catalog,
        dispatcher,
        config.rules.level_matching,
    )?;
    let report = engine.sync_schedules().await?;
    info!(armed = report.armed, invalid = report.invalid, "schedules armed");

    for rule_id in &cli.force_run {
        if let Err(e) = engine.force_run(rule_id).await {
            error!(rule_id = %rule_id, error = %e, "forced run failed");
        }
    }

    let changes = loader.changes();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("rules-worker reading events from stdin");
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("received Ctrl-C, shutting down");
                break;
            }
            _ = changes.notified() => {
                store.sync_documents(&loader.documents());
                match engine.sync_schedules().await {
                    Ok(report) => info!(
                        rules = store.len(),
                        armed = report.armed,
                        rearmed = report.rearmed,
                        cancelled = report.cancelled,
                        invalid = report.invalid,
                        "rules reloaded"
                    ),
                    Err(e) => error!(error = %e, "failed to re-sync schedules after reload"),
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(&engine, &line).await,
                Ok(None) => {
                    info!("stdin closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read stdin, shutting down");
                    break;
                }
            },
        }
    }

    let timeout = Duration::from_secs(config.scheduler.shutdown_timeout_secs);
    if !engine.shutdown(timeout).await {
        warn!("exiting with scheduled runs still in flight");
    }
    info!("rules-worker exited cleanly");
    Ok(())
}

async fn handle_line(engine: &NotificationEngine, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let event: Event = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "skipping malformed event line");
            return;
        }
    };

    match engine.handle_event(&event).await {
        Ok(results) => {
            let delivered = results.iter().filter(|r| r.success).count();
            debug!(
                group = %event.group,
                level = %event.level,
                matched = results.len(),
                delivered,
                "event handled"
            );
        }
        Err(e) => error!(group = %event.group, error = %e, "failed to resolve event"),
    }
}
