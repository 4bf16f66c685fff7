//! search-sync
//!
//! Maintenance binary for the search core: deploys stored procedures,
//! reconciles search parameter statuses and edits them by hand.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use helios_search_core::backends::sqlite::{SqliteBackend, SqliteDistributedLock};
use helios_search_core::config::SearchCoreConfig;
use helios_search_core::core::SearchParameterStatusDataStore;
use helios_search_core::procedures::{UpgradeManager, UpgradeOutcome, builtin_procedures};
use helios_search_core::query::QueryGeneratorRegistry;
use helios_search_core::search::{
    BroadcastChangePublisher, QueryGeneratorSupportResolver, SearchParameterCatalog,
    SearchParameterLoader, SearchParameterStatus, SearchParameterStatusManager,
};

#[derive(Debug, Parser)]
#[command(name = "search-sync", version, about = "Search parameter maintenance")]
struct Cli {
    /// SQLite database path
    #[arg(long, env = "SEARCH_SYNC_DATABASE", default_value = "fhir.db")]
    database: String,

    /// Optional JSON configuration file
    #[arg(long, env = "SEARCH_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Additional SearchParameter definitions (resource, array or Bundle)
    #[arg(long, env = "SEARCH_SYNC_DEFINITIONS")]
    definitions: Vec<PathBuf>,

    /// Log level
    #[arg(long, env = "SEARCH_SYNC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run schema migrations and install missing procedures
    Deploy,
    /// Reconcile the catalog with the persisted statuses
    Sync,
    /// Inspect or change persisted statuses
    #[command(subcommand)]
    Status(StatusCommand),
}

#[derive(Debug, Subcommand)]
enum StatusCommand {
    /// List persisted statuses
    List,
    /// Set the status of one or more parameters
    Set {
        /// supported, enabled or disabled
        status: SearchParameterStatus,
        /// Canonical URLs of the parameters
        #[arg(required = true)]
        uris: Vec<String>,
    },
}

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_search_core={},search_sync={}", level, level)));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn open_backend(cli: &Cli, config: &SearchCoreConfig) -> anyhow::Result<SqliteBackend> {
    info!(database = %cli.database, "Opening SQLite backend");
    let backend = SqliteBackend::with_config(&cli.database, config.sqlite.clone())?;
    backend.init_schema()?;
    Ok(backend)
}

fn status_manager(
    cli: &Cli,
    backend: &SqliteBackend,
) -> anyhow::Result<SearchParameterStatusManager> {
    let loader = SearchParameterLoader::new();
    let mut definitions = loader.load_embedded();
    for path in &cli.definitions {
        let loaded = loader.load_file(path)?;
        info!(path = %path.display(), count = loaded.len(), "Loaded search parameter definitions");
        definitions.extend(loaded);
    }

    let registry = Arc::new(QueryGeneratorRegistry::new());
    Ok(SearchParameterStatusManager::new(
        Arc::new(backend.clone()),
        Arc::new(SearchParameterCatalog::new(definitions)?),
        Arc::new(QueryGeneratorSupportResolver::new(registry)),
        Arc::new(BroadcastChangePublisher::default()),
    ))
}

async fn deploy(backend: SqliteBackend, config: &SearchCoreConfig) -> anyhow::Result<()> {
    let manager = UpgradeManager::new(
        Arc::new(SqliteDistributedLock::new(backend.clone())),
        Arc::new(backend.clone()),
        Arc::new(backend),
        builtin_procedures()?,
    )
    .with_lock_config(config.lock.clone());

    match manager.setup().await? {
        UpgradeOutcome::Applied {
            schema_version,
            installed,
            took_over,
        } => {
            println!("schema version {}", schema_version);
            for name in &installed {
                println!("installed {}", name);
            }
            if took_over {
                println!("took over an expired upgrade lease");
            }
        }
        UpgradeOutcome::AlreadyApplied => println!("already applied by another instance"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = match &cli.config {
        Some(path) => SearchCoreConfig::from_file(path)?,
        None => SearchCoreConfig::default(),
    };
    let backend = open_backend(&cli, &config)?;

    match &cli.command {
        Command::Deploy => deploy(backend, &config).await?,
        Command::Sync => {
            let manager = status_manager(&cli, &backend)?;
            let updated = manager.ensure_initialized().await?;
            for param in &updated {
                let (searchable, supported, partial) = param.flags();
                println!(
                    "{} searchable={} supported={} partial={}",
                    param.url, searchable, supported, partial
                );
            }
            println!("{} parameters updated", updated.len());
        }
        Command::Status(StatusCommand::List) => {
            let mut statuses = backend.get_search_parameter_statuses().await?;
            statuses.sort_by(|a, b| a.uri.cmp(&b.uri));
            for status in &statuses {
                println!(
                    "{}\t{}\t{}",
                    status.status,
                    status.last_updated.to_rfc3339(),
                    status.uri
                );
            }
        }
        Command::Status(StatusCommand::Set { status, uris }) => {
            let manager = status_manager(&cli, &backend)?;
            let updated = manager.set_status(uris, *status).await?;
            println!("{} parameters set to {}", updated.len(), status);
        }
    }

    Ok(())
}
