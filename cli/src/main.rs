//! Energy billing operator CLI
//!
//! ```sh
//! # Run the scheduler daemon with the default config
//! billing-cli run
//!
//! # Bill last month for every customer now
//! billing-cli bill-monthly
//!
//! # One customer, explicit period
//! billing-cli bill-customer --customer <uuid> \
//!     --from 2026-01-01T00:00:00Z --to 2026-02-01T00:00:00Z
//!
//! # Price a site without persisting anything
//! billing-cli draft --site <uuid> --from 2026-01-01T00:00:00Z --to 2026-02-01T00:00:00Z
//!
//! # Validate config without touching the database
//! billing-cli check
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use uuid::Uuid;

use energy_billing::application::services::{NewTariffPlan, ReadingInput};
use energy_billing::config::AppConfig;
use energy_billing::server::{init_tracing, BillingServices, ServerHandle, ServerOptions};

/// Energy billing: tariff pricing and monthly invoicing.
#[derive(Parser, Debug)]
#[command(
    name = "billing-cli",
    version,
    about = "Energy billing service and operator tools",
    long_about = "Prices metered consumption against site tariffs and issues \
                  monthly invoices.\n\n\
                  Default config: ~/.config/energy-billing/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "BILLING_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Skip database migrations on startup.
    #[arg(long, global = true)]
    no_migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monthly scheduler until SIGTERM/SIGINT.
    Run {
        /// Override the concurrent invoice task limit.
        #[arg(long)]
        workers: Option<usize>,
    },
    #[command(flatten)]
    Operation(Operation),
    /// Validate the configuration file and exit.
    Check,
}

/// One-shot commands that run against the database and exit.
#[derive(Subcommand, Debug)]
enum Operation {
    /// Bill every customer for last month (reference timezone).
    BillMonthly,
    /// Generate one customer's invoice for an explicit period.
    BillCustomer {
        #[arg(long)]
        customer: Uuid,
        #[arg(long)]
        from: DateTime<Utc>,
        #[arg(long)]
        to: DateTime<Utc>,
    },
    /// Price a site for a period and print the draft as JSON.
    Draft {
        #[arg(long)]
        site: Uuid,
        #[arg(long)]
        from: DateTime<Utc>,
        #[arg(long)]
        to: DateTime<Utc>,
    },
    /// Void an issued or draft invoice.
    Void {
        #[arg(long)]
        invoice: Uuid,
    },
    /// Bulk-load meter readings from a JSON array of {site_id, read_at, kwh}.
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// Create a tariff plan from a JSON document.
    CreatePlan {
        #[arg(long)]
        file: PathBuf,
    },
    /// Assign a plan to a site from `from` (open-ended unless `to` is set).
    Assign {
        #[arg(long)]
        site: Uuid,
        #[arg(long)]
        plan: Uuid,
        #[arg(long)]
        from: DateTime<Utc>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(energy_billing::default_config_path);
    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);

    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            if matches!(cli.command, Command::Check) {
                error!("Configuration at {} is invalid: {}", config_path.display(), e);
                return Err(e.into());
            }
            warn!("Failed to load config from {}: {}. Using defaults.", config_path.display(), e);
        }
    }

    let operation = match cli.command {
        Command::Check => {
            config.validate()?;
            print_config_summary(&config_path, &config);
            return Ok(());
        }
        Command::Run { workers } => {
            if let Some(workers) = workers {
                info!("CLI override: worker_pool_size = {}", workers);
                config.billing.worker_pool_size = workers;
            }
            let handle = ServerHandle::start(ServerOptions {
                config,
                auto_migrate: !cli.no_migrate,
                enable_scheduler: true,
            })
            .await?;
            handle.install_signal_handler();
            info!("Press Ctrl+C to shutdown gracefully.");
            handle.wait().await;
            return Ok(());
        }
        Command::Operation(operation) => operation,
    };

    config.validate()?;
    let (services, db) = BillingServices::connect(&config, !cli.no_migrate).await?;
    let result = execute(operation, &services).await;
    if let Err(e) = db.close().await {
        warn!("Error closing database connection: {}", e);
    }
    result
}

fn print_config_summary(config_path: &Path, config: &AppConfig) {
    println!("Configuration is valid");
    println!("   Config file : {}", config_path.display());
    println!("   Database    : {}", config.database.url);
    println!("   Timezone    : {}", config.billing.reference_timezone);
    println!("   Schedule    : day {} at {:02}:00", config.billing.run_day, config.billing.run_hour);
    println!("   Workers     : {}", config.billing.worker_pool_size);
    println!("   Page size   : {}", config.billing.page_size);
    println!("   Log level   : {}", config.logging.level);
}

async fn execute(operation: Operation, services: &BillingServices) -> Result<(), Box<dyn std::error::Error>> {
    match operation {
        Operation::BillMonthly => {
            let period = services.job.period_for(Utc::now())?;
            let summary = services.job.run_for_period(period).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Operation::BillCustomer { customer, from, to } => {
            let invoice = services
                .invoices
                .generate_invoice_for_customer(customer, from, to)
                .await?;
            println!("{}", serde_json::to_string_pretty(&invoice)?);
        }
        Operation::Draft { site, from, to } => {
            let draft = services.pricing.calculate_draft_invoice(site, from, to).await?;
            println!("{}", serde_json::to_string_pretty(&draft)?);
        }
        Operation::Void { invoice } => {
            let voided = services.invoices.void_invoice(invoice).await?;
            println!("Invoice {} is now {}", voided.id, voided.status.as_str());
        }
        Operation::Ingest { file } => {
            let content = std::fs::read_to_string(&file)?;
            let readings: Vec<ReadingInput> = serde_json::from_str(&content)?;
            let inserted = services.metering.ingest_bulk(readings).await?;
            println!("Inserted {} readings", inserted);
        }
        Operation::CreatePlan { file } => {
            let content = std::fs::read_to_string(&file)?;
            let plan: NewTariffPlan = serde_json::from_str(&content)?;
            let plan = services.tariffs.create_plan(plan).await?;
            println!("Created plan {} ({}) with {} rates", plan.id, plan.code, plan.rates.len());
        }
        Operation::Assign { site, plan, from, to } => {
            let assignment = services.tariffs.assign_plan(site, plan, from, to).await?;
            println!("Assignment {} created", assignment.id);
        }
    }
    Ok(())
}
