//! Service runtime.
//!
//! [`ServiceHandle`] owns the full lifecycle: metrics, database and
//! migrations, destination seeding, the pipeline and the scheduler, and
//! graceful shutdown. The `once` and `destinations` commands reuse the same
//! building blocks without starting the scheduler.

use std::net::SocketAddr;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::application::services::{Scheduler, TariffPipeline};
use crate::config::AppConfig;
use crate::domain::destination::extract_spreadsheet_id;
use crate::domain::{DomainError, RepositoryProvider};
use crate::infrastructure::{
    init_database, run_migrations, GoogleSheetsClient, SeaOrmRepositoryProvider, WildberriesClient,
};
use crate::shared::shutdown::{listen_for_shutdown_signals, ShutdownSignal};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Options ────────────────────────────────────────────────────────

pub struct ServiceOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServiceHandle ──────────────────────────────────────────────────

/// Handle to the running mirror service.
pub struct ServiceHandle {
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    pub pipeline: Arc<TariffPipeline>,
    /// The configuration the service was started with.
    pub config: AppConfig,

    db: DatabaseConnection,
    shutdown: ShutdownSignal,
    scheduler_task: tokio::task::JoinHandle<()>,
}

impl ServiceHandle {
    /// Start the service:
    /// 1. Install the Prometheus exporter (if enabled)
    /// 2. Connect to the database and run migrations
    /// 3. Register seed destinations
    /// 4. Start the scheduler
    pub async fn start(opts: ServiceOptions) -> Result<Self, BoxError> {
        let config = opts.config;
        info!("Starting tariff mirror...");

        init_metrics(&config)?;

        let (db, repos) = connect(&config, opts.auto_migrate).await?;
        seed_destinations(repos.as_ref(), &config.sheets.seed_destinations).await;

        let pipeline = Arc::new(build_pipeline(&config, repos.clone())?);

        let shutdown = ShutdownSignal::new();
        let scheduler_task =
            Scheduler::new(pipeline.clone(), config.scheduler.clone()).start(shutdown.clone());

        info!("🚀 Tariff mirror started");

        Ok(Self {
            repos,
            pipeline,
            config,
            db,
            shutdown,
            scheduler_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        tokio::spawn(listen_for_shutdown_signals(self.shutdown.clone()));
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the scheduler and its in-flight cycles to stop, then close
    /// the pool.
    pub async fn wait(self) {
        info!("⏳ Waiting for running cycles to complete...");

        if let Err(e) = self.scheduler_task.await {
            error!("Scheduler task panicked: {}", e);
        }

        if let Err(e) = self.db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Tariff mirror shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down tariff mirror...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.scheduler_task.is_finished()
    }
}

// ── Building blocks ────────────────────────────────────────────────

/// Open the pool, optionally migrate, and wrap it in a repository provider.
pub async fn connect(
    config: &AppConfig,
    migrate: bool,
) -> Result<(DatabaseConnection, Arc<dyn RepositoryProvider>), BoxError> {
    let db = init_database(&config.database).await?;
    if migrate {
        info!("Running database migrations...");
        run_migrations(&db).await?;
    }
    let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
    Ok((db, repos))
}

/// Wire the HTTP clients and engines into a pipeline.
pub fn build_pipeline(
    config: &AppConfig,
    repos: Arc<dyn RepositoryProvider>,
) -> Result<TariffPipeline, BoxError> {
    if config.source.api_key.is_empty() {
        warn!("No Wildberries API key configured, tariff fetches will be rejected");
    }
    if config.sheets.access_token.is_empty() {
        warn!("No Google Sheets access token configured, exports will be rejected");
    }

    let source = Arc::new(WildberriesClient::new(&config.source)?);
    let publisher = Arc::new(GoogleSheetsClient::new(&config.sheets)?);

    Ok(TariffPipeline::new(
        source,
        repos,
        publisher,
        config.export_config(),
        config.retry_config(),
    ))
}

/// Register configured spreadsheets that are not yet known. Invalid
/// entries are logged and skipped.
pub async fn seed_destinations(repos: &dyn RepositoryProvider, seeds: &[String]) {
    for seed in seeds {
        let Some(id) = extract_spreadsheet_id(seed) else {
            warn!(seed = %seed, "Ignoring invalid seed spreadsheet");
            continue;
        };
        match repos.destinations().add(&id).await {
            Ok(_) => info!(destination = %id, "Seed spreadsheet registered"),
            Err(DomainError::Conflict(_)) => {}
            Err(e) => warn!(destination = %id, error = %e, "Failed to register seed spreadsheet"),
        }
    }
}

/// Install the Prometheus exporter with its HTTP listener. Without it the
/// `metrics` macros are no-ops.
pub fn init_metrics(config: &AppConfig) -> Result<(), BoxError> {
    if !config.metrics.enabled {
        return Ok(());
    }
    let addr: SocketAddr = config.metrics.listen.parse()?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(listen = %addr, "📊 Prometheus exporter listening");
    Ok(())
}

pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
