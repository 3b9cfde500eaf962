use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use procurement_committee::domain::User;
use procurement_committee::{
    config, create_router, init_config, init_telemetry, shutdown_telemetry, AppState, BlobReconciler,
    CommitteeConfig, InMemoryStore, LocalObjectStore, ObjectStore, OutboxRelay, Principal, PrincipalResolver,
    ShutdownCoordinator, WorkflowContext, WorkflowOrchestrator, WorkflowStore,
};

#[derive(Parser)]
#[command(name = "procurement-committee")]
#[command(about = "Procurement committee workflow service")]
#[command(long_about = "Tracks acquisition requests from draft through justification, budget sufficiency \
                       and supporting documents to committee agendas and signed minutes. \
                       Run 'procurement-committee serve' to start the HTTP API.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API with the outbox relay and blob reconciler (default)
    Serve {
        #[arg(long, help = "Override the configured bind address")]
        bind: Option<String>,
    },
    /// Complete agendas left provisional by an interrupted creation
    Recover,
    /// Show the notification outbox backlog
    Relay,
    /// Run one pass of pending blob deletions
    Reconcile,
    /// Print the effective configuration
    Config {
        #[arg(long, help = "Write the configuration to this file instead of printing it")]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config()?;
    init_telemetry(&config.observability.log_level)?;
    init_config()?;

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            None => serve_command(config, None).await,
            Some(Commands::Serve { bind }) => serve_command(config, bind).await,
            Some(Commands::Recover) => recover_command(config).await,
            Some(Commands::Relay) => relay_command(config).await,
            Some(Commands::Reconcile) => reconcile_command(config).await,
            Some(Commands::Config { write }) => config_command(config, write),
        }
    });

    shutdown_telemetry();
    result
}

#[cfg(feature = "database")]
async fn open_database(config: &CommitteeConfig) -> Result<Option<Arc<dyn WorkflowStore>>> {
    let db = procurement_committee::database::init_database(config).await?;
    Ok(db.map(|db| Arc::new(db) as Arc<dyn WorkflowStore>))
}

#[cfg(not(feature = "database"))]
async fn open_database(config: &CommitteeConfig) -> Result<Option<Arc<dyn WorkflowStore>>> {
    if config.database.is_some() {
        warn!("Database configured but the 'database' feature is disabled; state will not persist");
    }
    Ok(None)
}

/// The configured SQLite store, or an in-memory one
async fn open_store(config: &CommitteeConfig) -> Result<Arc<dyn WorkflowStore>> {
    let store = match open_database(config).await? {
        Some(store) => store,
        None => Arc::new(InMemoryStore::new()),
    };
    load_users(&store, config).await?;
    Ok(store)
}

/// Seed the user directory from the configured JSON file
async fn load_users(store: &Arc<dyn WorkflowStore>, config: &CommitteeConfig) -> Result<()> {
    let Some(path) = &config.storage.users_file else {
        warn!("No users file configured; every caller will be rejected as unknown");
        return Ok(());
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading users file {}", path.display()))?;
    let users: Vec<User> = serde_json::from_str(&raw).with_context(|| format!("parsing users file {}", path.display()))?;

    let count = users.len();
    for user in users {
        store.upsert_user(user).await?;
    }
    info!(count, path = %path.display(), "User directory loaded");
    Ok(())
}

fn object_store(config: &CommitteeConfig) -> Arc<dyn ObjectStore> {
    Arc::new(LocalObjectStore::new(&config.storage.blob_root))
}

fn orchestrator(config: &CommitteeConfig, store: Arc<dyn WorkflowStore>, objects: Arc<dyn ObjectStore>) -> WorkflowOrchestrator {
    let roles: BTreeSet<_> = config.notifications.sufficiency_roles.iter().copied().collect();
    WorkflowOrchestrator::new(WorkflowContext::new(store, objects), roles)
}

async fn serve_command(config: &CommitteeConfig, bind: Option<String>) -> Result<()> {
    let store = open_store(config).await?;
    let objects = object_store(config);
    let orchestrator = Arc::new(orchestrator(config, store.clone(), objects.clone()));

    let recovered = orchestrator.recover_agendas(&Principal::system()).await?;
    if recovered.completed + recovered.failed > 0 {
        info!(completed = recovered.completed, failed = recovered.failed, "Provisional agendas recovered");
    }

    let (events, _) = broadcast::channel(config.notifications.channel_capacity);
    let mut shutdown = ShutdownCoordinator::new();

    let relay = OutboxRelay::new(
        store.clone(),
        events.clone(),
        config.notifications.max_attempts,
        config.notifications.batch_size,
        config.notifications.relay_interval(),
    );
    shutdown.track("outbox_relay", tokio::spawn(relay.run(shutdown.subscribe())));

    let reconciler = BlobReconciler::new(
        store.clone(),
        objects,
        config.reconciliation.batch_size,
        config.reconciliation.interval(),
    );
    shutdown.track("blob_reconciler", tokio::spawn(reconciler.run(shutdown.subscribe())));

    let resolver = PrincipalResolver::new(store, config.auth.cache_ttl(), config.auth.cache_capacity);
    let state = AppState::new(orchestrator, resolver, events, shutdown.sender());
    let app = create_router(state);

    let address = bind.unwrap_or_else(|| config.server.bind_address.clone());
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(address = %address, "Procurement committee API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.wait_for_shutdown())
        .await?;

    shutdown.drain(Duration::from_secs(10)).await
}

async fn recover_command(config: &CommitteeConfig) -> Result<()> {
    let store = open_store(config).await?;
    let orchestrator = orchestrator(config, store, object_store(config));
    let report = orchestrator.recover_agendas(&Principal::system()).await?;

    println!("Provisional agendas completed: {}", report.completed);
    println!("Provisional agendas still failing: {}", report.failed);
    Ok(())
}

async fn relay_command(config: &CommitteeConfig) -> Result<()> {
    let store = open_store(config).await?;
    let max_attempts = config.notifications.max_attempts;
    let notifications = store.list_notifications().await?;

    let pending = notifications
        .iter()
        .filter(|n| n.delivered_at.is_none() && n.attempts < max_attempts)
        .count();
    let exhausted: Vec<_> = notifications
        .iter()
        .filter(|n| n.delivered_at.is_none() && n.attempts >= max_attempts)
        .collect();

    println!("Notifications stored: {}", notifications.len());
    println!("Awaiting delivery: {pending}");
    println!("Given up after {max_attempts} attempts: {}", exhausted.len());
    for n in exhausted {
        println!(
            "  #{} '{}' ({})",
            n.id,
            n.title,
            n.last_error.as_deref().unwrap_or("no error recorded")
        );
    }
    Ok(())
}

async fn reconcile_command(config: &CommitteeConfig) -> Result<()> {
    let store = open_store(config).await?;
    let reconciler = BlobReconciler::new(
        store,
        object_store(config),
        config.reconciliation.batch_size,
        config.reconciliation.interval(),
    );
    let report = reconciler.run_once().await?;

    println!("Blobs deleted: {}", report.deleted);
    println!("Deletes still failing: {}", report.failed);
    Ok(())
}

fn config_command(config: &CommitteeConfig, write: Option<PathBuf>) -> Result<()> {
    match write {
        Some(path) => {
            config.save_to_file(&path)?;
            println!("Configuration written to {}", path.display());
        }
        None => print!("{}", toml::to_string_pretty(config)?),
    }
    Ok(())
}
