use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use conduit_backend::HttpBackend;
use conduit_engine::scheduler::SyncContext;
use conduit_engine::{
    ActivityLocks, ActivityService, ActivityStore, CompletionHandler, Orchestrator, SyncScheduler,
    TracingNotifier,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;

use config::Config;
use repository::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "conduit_orchestrator=info,conduit_engine=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;

    tracing::info!("Starting Conduit Orchestrator...");
    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Backend client
    let client = reqwest::Client::builder()
        .timeout(config.backend_timeout())
        .build()
        .context("Failed to build backend HTTP client")?;
    let backend = Arc::new(HttpBackend::with_client(&config.backend_url, client));
    tracing::info!("Using job backend at {}", backend.base_url());

    // Engine
    let engine_config = config.engine_config();
    let store: Arc<dyn ActivityStore> = Arc::new(PgStore::new(pool));
    let locks = ActivityLocks::new();
    let orchestrator = Arc::new(
        Orchestrator::new(backend.clone(), store.clone(), &engine_config).with_locks(locks.clone()),
    );
    let completion = Arc::new(CompletionHandler::new(backend, Arc::new(TracingNotifier)));

    let (scheduler, _dispatcher) = SyncScheduler::start(SyncContext {
        orchestrator: orchestrator.clone(),
        store: store.clone(),
        locks: locks.clone(),
        completion,
        idle_timeout: engine_config.worker_idle_timeout,
    });
    let _ticker = scheduler.spawn_ticker(store.clone(), config.poll_interval());
    tracing::info!(
        "Polling unfinished activities every {}s",
        config.poll_interval_secs
    );

    // Build router with all API endpoints
    let service = ActivityService::new(orchestrator, store, locks, scheduler);
    let app = api::create_router(service);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
