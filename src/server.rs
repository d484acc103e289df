//! Billing service runtime.
//!
//! [`ServerHandle`] owns the daemon lifecycle: metrics exporter, database
//! and migrations, service wiring, the monthly scheduler and graceful
//! shutdown. The operator CLI reuses [`BillingServices`] without starting
//! the scheduler.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::billing::{BillingJob, MonthlyScheduler, WorkerPool};
use crate::application::pricing::StrategyRegistry;
use crate::application::services::{
    InvoiceService, MeterReadingService, PricingService, TariffManagementService,
};
use crate::config::{AppConfig, MetricsSettings};
use crate::domain::RepositoryProvider;
use crate::shared::errors::InfraError;
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the billing service.
pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
    /// Start the monthly scheduler (default: true).
    pub enable_scheduler: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            enable_scheduler: true,
        }
    }
}

// ── Services ───────────────────────────────────────────────────────

/// Application services wired over one repository provider.
#[derive(Clone)]
pub struct BillingServices {
    pub repos: Arc<dyn RepositoryProvider>,
    pub pricing: Arc<PricingService>,
    pub invoices: Arc<InvoiceService>,
    pub metering: Arc<MeterReadingService>,
    pub tariffs: Arc<TariffManagementService>,
    pub job: Arc<BillingJob>,
}

impl BillingServices {
    pub fn new(repos: Arc<dyn RepositoryProvider>, config: &AppConfig) -> Result<Self, InfraError> {
        let billing = &config.billing;

        let registry = Arc::new(StrategyRegistry::with_default_strategies());
        let pricing = Arc::new(PricingService::new(repos.clone(), registry));
        let invoices = Arc::new(InvoiceService::new(
            repos.clone(),
            pricing.clone(),
            billing.payment_terms_days,
        ));
        let metering = Arc::new(MeterReadingService::new(repos.clone()));
        let tariffs = Arc::new(TariffManagementService::new(repos.clone()));

        let job = Arc::new(BillingJob::new(
            repos.clone(),
            invoices.clone(),
            WorkerPool::shared(billing.worker_pool_size),
            billing.job_config()?,
        ));

        Ok(Self {
            repos,
            pricing,
            invoices,
            metering,
            tariffs,
            job,
        })
    }

    /// Connect to the configured database and wire the services over it
    pub async fn connect(
        config: &AppConfig,
        auto_migrate: bool,
    ) -> Result<(Self, DatabaseConnection), Box<dyn std::error::Error>> {
        let db_config = DatabaseConfig::from(&config.database);
        let db = init_database(&db_config).await?;

        if auto_migrate {
            info!("Running database migrations...");
            run_migrations(&db).await?;
        }

        let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let services = Self::new(repos, config)?;
        Ok((services, db))
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running billing service.
///
/// ```rust,no_run
/// use energy_billing::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub services: BillingServices,
    /// The configuration the service was started with.
    pub config: AppConfig,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    scheduler_task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Install metrics, connect and migrate, wire services, start the scheduler.
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let config = opts.config;
        config.validate()?;

        info!("Starting energy billing service...");
        install_metrics(&config.metrics);

        let (services, db) = BillingServices::connect(&config, opts.auto_migrate).await?;

        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);

        let scheduler_task = if opts.enable_scheduler {
            let scheduler = MonthlyScheduler::new(
                services.job.clone(),
                config.billing.run_day,
                config.billing.run_hour,
            );
            Some(scheduler.start(shutdown.signal()))
        } else {
            info!("Monthly scheduler disabled");
            None
        };

        info!(
            workers = config.billing.worker_pool_size,
            page_size = config.billing.page_size,
            timezone = %config.billing.reference_timezone,
            "Billing service started"
        );

        Ok(Self {
            services,
            config,
            db,
            shutdown,
            scheduler_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Block until shutdown is triggered, let an in-flight run finish
    /// within the configured timeout, then close the database.
    pub async fn wait(self) {
        let scheduler_task = self.scheduler_task;
        let finished = self
            .shutdown
            .shutdown_with_cleanup(|| async move {
                if let Some(task) = scheduler_task {
                    if let Err(e) = task.await {
                        error!(error = %e, "Scheduler task panicked");
                    }
                }
            })
            .await;
        if !finished {
            warn!("Billing run still in progress at shutdown; abandoning it");
        }

        if let Err(e) = self.db.close().await {
            warn!(error = %e, "Error closing database connection");
        } else {
            info!("Database connection closed");
        }

        info!("Energy billing service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("Shutting down energy billing service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        self.scheduler_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Install the Prometheus recorder once per process. With metrics disabled
/// only the in-process recorder is installed, without the HTTP listener.
fn install_metrics(settings: &MetricsSettings) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        if !settings.enabled {
            if let Err(e) = builder.install_recorder() {
                warn!(error = %e, "Failed to install Prometheus metrics recorder");
            }
            return;
        }

        let addr: SocketAddr = match settings.listen_addr.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(addr = %settings.listen_addr, error = %e, "Invalid metrics listen address");
                return;
            }
        };
        match builder.with_http_listener(addr).install() {
            Ok(()) => info!(%addr, "Prometheus exporter listening"),
            Err(e) => warn!(error = %e, "Failed to install Prometheus exporter"),
        }
    });
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
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
