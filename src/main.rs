use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vending_coordinator::application::VendingService;
use vending_coordinator::config::SettingsArgs;
use vending_coordinator::domain::clock::SystemClock;
use vending_coordinator::domain::ids::MachineId;
use vending_coordinator::domain::ports::Stores;
use vending_coordinator::infrastructure::notifier::LogNotifier;
use vending_coordinator::interfaces::csv::carrier_writer::CarrierWriter;
use vending_coordinator::interfaces::csv::catalog_reader::{CatalogReport, import_catalog};
use vending_coordinator::interfaces::http::create_router;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: SettingsArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP coordinator.
    Serve {
        /// Address to listen on
        #[arg(long, env = "VENDING_BIND", default_value = "0.0.0.0:3000")]
        bind: SocketAddr,

        /// Catalog CSV to seed products and carriers from
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Machine ids to register at startup
        #[arg(long = "machine")]
        machines: Vec<String>,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long, env = "VENDING_DB_PATH")]
        db_path: Option<PathBuf>,
    },
    /// Load a catalog CSV and print the resulting carrier inventory.
    Inventory {
        /// Input catalog CSV file
        catalog: PathBuf,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings.into_settings().into_diagnostic()?;

    let default_level = match cli.command {
        Command::Serve { .. } => "info",
        Command::Inventory { .. } => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            bind,
            catalog,
            machines,
            db_path,
        } => {
            let stores = open_stores(db_path.as_deref())?;
            let service = VendingService::new(stores, Arc::new(LogNotifier), Arc::new(SystemClock), settings);

            if let Some(path) = catalog {
                let report = import_catalog(&service, File::open(path).into_diagnostic()?).await;
                report_rejections(&report);
                info!(loaded = report.loaded, "catalog imported");
            }
            for id in machines {
                let machine = service
                    .machines
                    .register(MachineId::new(id.clone()), &id, "")
                    .await
                    .into_diagnostic()?;
                info!(machine = %machine.id, "machine registered");
            }

            let shutdown = CancellationToken::new();
            let sweeper = tokio::spawn(service.expiry_sweeper(shutdown.clone()).run());

            let listener = tokio::net::TcpListener::bind(bind).await.into_diagnostic()?;
            info!(%bind, "coordinator listening");
            let signal = shutdown.clone();
            axum::serve(listener, create_router(service))
                .with_graceful_shutdown(async move {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!(error = %err, "failed to listen for shutdown signal");
                    }
                    signal.cancel();
                })
                .await
                .into_diagnostic()?;

            shutdown.cancel();
            sweeper.await.into_diagnostic()?;
            info!("coordinator stopped");
        }
        Command::Inventory { catalog, db_path } => {
            let stores = open_stores(db_path.as_deref())?;
            let service = VendingService::new(stores, Arc::new(LogNotifier), Arc::new(SystemClock), settings);

            let report = import_catalog(&service, File::open(catalog).into_diagnostic()?).await;
            report_rejections(&report);

            let carriers = service.carriers.list().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = CarrierWriter::new(stdout.lock());
            writer.write_carriers(&carriers).into_diagnostic()?;
        }
    }

    Ok(())
}

fn report_rejections(report: &CatalogReport) {
    for rejected in &report.rejected {
        eprintln!("Rejected row {}: {}", rejected.line, rejected.error);
    }
}

fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            use vending_coordinator::infrastructure::rocksdb::RocksDbStore;
            let store = RocksDbStore::open(path).into_diagnostic()?;
            Ok(store.stores())
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Stores::in_memory())
        }
        None => Ok(Stores::in_memory()),
    }
}
