/*
newsbot - single-binary main.rs
This binary starts the Rocket HTTP server and runs the posting scheduler inside the same process.
*/

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use common::{init_db_pool, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use newsbot::llm::ollama::OllamaBackend;
use newsbot::llm::summarizer::LlmSummarizer;
use newsbot::llm::LlmBackend;
use newsbot::logstream::LogStream;
use newsbot::scheduler::PostScheduler;
use newsbot::server::{launch_rocket, AppState};
use newsbot::settings::SettingsStore;
use newsbot::storage;
use newsbot::twitter::TwitterPublisher;

#[derive(Parser, Debug)]
#[command(name = "newsbot", about = "Newsbot single-binary server + posting scheduler")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable the posting scheduler (run server only)
    #[arg(long)]
    no_worker: bool,

    /// Run the scheduler only (do not bind HTTP server)
    #[arg(long)]
    worker_only: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging: terminal output plus the dashboard broadcast layer
    let logs = LogStream::new();
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(logs.layer())
        .init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    // Database pool and schema
    let db_pool = match init_db_pool(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %config.database.path, "failed to initialize database pool");
            return Err(e);
        }
    };
    storage::ensure_schema(&db_pool).await?;

    // Mutable runtime settings document
    let settings = Arc::new(SettingsStore::load_or_default(&config.settings.path).await?);

    // Wire up the collaborators behind their trait seams
    let snapshot = settings.snapshot();
    let llm: Arc<dyn LlmBackend> = Arc::new(OllamaBackend::new(snapshot.ollama_host.clone()));
    info!(host = %snapshot.ollama_host, model = %snapshot.model_name, "LLM backend initialized");

    let summarizer = Arc::new(LlmSummarizer::new(llm.clone()));
    let news = newsbot::news::from_config(config.news.as_ref())?;
    let publisher = Arc::new(TwitterPublisher::new(settings.clone(), db_pool)?);

    let scheduler = Arc::new(PostScheduler::new(
        settings.clone(),
        news.clone(),
        summarizer.clone(),
        publisher.clone(),
    ));

    let shutdown_notify = Arc::new(Notify::new());

    // If worker_only, run the scheduler (without HTTP) until ctrl-c
    if args.worker_only {
        info!("Starting in worker-only mode");
        let worker = scheduler.run(shutdown_notify.clone());

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, notifying scheduler to shutdown");
                shutdown_notify.notify_waiters();
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            _ = worker => {}
        }
        info!("worker-only run finished");
        return Ok(());
    }

    // Otherwise, start the scheduler (unless disabled) and then the HTTP server
    let mut worker_handle = None;
    if !args.no_worker {
        info!("Spawning posting scheduler task");
        let w_scheduler = scheduler.clone();
        let w_shutdown = shutdown_notify.clone();
        worker_handle = Some(tokio::spawn(async move {
            w_scheduler.run(w_shutdown).await;
        }));
    } else {
        info!("Posting scheduler disabled via CLI (--no-worker)");
    }

    let state = AppState {
        started_at: Utc::now(),
        settings,
        news,
        llm,
        summarizer,
        publisher,
        logs,
    };

    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(state, config.server.as_ref()).await {
        error!(%e, "Rocket server failed");
        shutdown_notify.notify_waiters();
    }

    // When the server shuts down, notify the scheduler and wait for it
    info!("HTTP server stopped; notifying scheduler to shutdown");
    shutdown_notify.notify_waiters();

    if let Some(handle) = worker_handle {
        match tokio::time::timeout(Duration::from_secs(20), handle).await {
            Ok(join_res) => match join_res {
                Ok(()) => info!("scheduler exited cleanly"),
                Err(join_err) => error!(%join_err, "scheduler task panicked"),
            },
            Err(_) => {
                info!("Timed out waiting for scheduler to exit; continuing shutdown");
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}
