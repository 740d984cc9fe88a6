use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aurum::application::handlers::companies_handler::ApiState;
use aurum::application::server::{build_router, serve};
use aurum::application::{BatchRunner, ListingCache};
use aurum::config::{parse_sources, AppConfig, StorageBackend};
use aurum::domain::entities::source::SourceId;
use aurum::domain::repositories::{CompanyRepository, ProvenanceLog};
use aurum::domain::services::gold_equivalent::GoldEquivalence;
use aurum::domain::services::listing::{
    filter_listings, render_table, sort_listings, CompanyListing, SortKey, SortOrder,
};
use aurum::domain::services::reading_assembly::ReadingAssembler;
use aurum::domain::services::reconciliation::Reconciler;
use aurum::domain::value_objects::currency::Currency;
use aurum::infrastructure::csv_loader::load_companies;
use aurum::infrastructure::exchange_rates::{ExchangeRateService, RateProvider, DEFAULT_RATE_TTL};
use aurum::infrastructure::source_factory::SourceFactory;
use aurum::persistence::{
    init_database, FileProvenanceLog, JsonCompanyStore, SqliteCompanyRepository,
    SqliteProvenanceLog,
};

#[derive(Parser)]
#[command(name = "aurum", version, about = "Mining company metrics reconciler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every company from all sources, reconcile and store
    Run {
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Comma separated source list, e.g. yahoo,tradingview
        #[arg(long)]
        sources: Option<String>,
        /// Prompt for figures on stdin
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        backend: Option<StorageBackend>,
    },
    /// Create company records without fetching
    Seed {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        backend: Option<StorageBackend>,
    },
    /// Serve the read API and static frontend
    Serve {
        #[arg(long)]
        addr: Option<SocketAddr>,
        #[arg(long)]
        backend: Option<StorageBackend>,
    },
    /// Print the comparison table
    List {
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        backend: Option<StorageBackend>,
    },
}

/// Record store plus provenance sinks for the selected backend
struct Storage {
    repository: Arc<dyn CompanyRepository>,
    provenance: Vec<Arc<dyn ProvenanceLog>>,
}

async fn open_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    let file_log: Arc<dyn ProvenanceLog> =
        Arc::new(FileProvenanceLog::new(&config.provenance_log_path));

    match config.storage_backend {
        StorageBackend::Sqlite => {
            let pool = init_database(&config.database_url)
                .await
                .context("failed to open the database")?;
            Ok(Storage {
                repository: Arc::new(SqliteCompanyRepository::new(pool.clone())),
                provenance: vec![Arc::new(SqliteProvenanceLog::new(pool)), file_log],
            })
        }
        StorageBackend::Json => {
            let dir = config.json_store_dir();
            info!("✓ JSON store at {}", dir.display());
            Ok(Storage {
                repository: Arc::new(JsonCompanyStore::new(dir)),
                provenance: vec![file_log],
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aurum=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    match cli.command {
        Command::Run {
            csv,
            sources,
            interactive,
            backend,
        } => {
            if let Some(csv) = csv {
                config.companies_csv = csv;
            }
            if let Some(sources) = sources {
                config.enabled_sources = parse_sources(&sources).map_err(anyhow::Error::msg)?;
            }
            if interactive && !config.enabled_sources.contains(&SourceId::Manual) {
                config.enabled_sources.push(SourceId::Manual);
            }
            if let Some(backend) = backend {
                config.storage_backend = backend;
            }
            run_batch(&config, interactive).await
        }
        Command::Seed { csv, backend } => {
            if let Some(csv) = csv {
                config.companies_csv = csv;
            }
            if let Some(backend) = backend {
                config.storage_backend = backend;
            }
            seed(&config).await
        }
        Command::Serve { addr, backend } => {
            if let Some(addr) = addr {
                config.api_bind_addr = addr;
            }
            if let Some(backend) = backend {
                config.storage_backend = backend;
            }
            serve_api(&config).await
        }
        Command::List {
            sort,
            desc,
            search,
            backend,
        } => {
            if let Some(backend) = backend {
                config.storage_backend = backend;
            }
            list(&config, sort.as_deref(), desc, search.as_deref()).await
        }
    }
}

async fn run_batch(config: &AppConfig, interactive: bool) -> anyhow::Result<()> {
    let companies = load_companies(&config.companies_csv)
        .await
        .with_context(|| format!("failed to load {}", config.companies_csv.display()))?;
    info!(
        "Loaded {} companies from {}",
        companies.len(),
        config.companies_csv.display()
    );

    let registry = SourceFactory::create_all(config, interactive);
    if registry.sources.is_empty() {
        anyhow::bail!("no sources enabled");
    }

    let provider = registry
        .alpha_vantage
        .clone()
        .map(|api| api as Arc<dyn RateProvider>);
    let rates = ExchangeRateService::new(provider, DEFAULT_RATE_TTL);
    let live = rates.refresh(&[Currency::usd(), Currency::aud()]).await;
    info!("{} live exchange rates", live);

    let equivalence = GoldEquivalence::new(config.silver_gold_ratio)?;
    let storage = open_storage(config).await?;

    let mut runner = BatchRunner::new(
        registry.sources,
        Reconciler::new(rates.converter()),
        storage.repository,
    )
    .with_assembler(ReadingAssembler::new(equivalence))
    .with_max_concurrent(config.max_concurrent_tickers)
    .with_source_timeout(config.source_timeout);
    for log in storage.provenance {
        runner = runner.with_provenance(log);
    }

    let summary = runner.run(&companies).await;
    if summary.persistence_failures > 0 {
        warn!(
            "{} of {} companies could not be stored",
            summary.persistence_failures, summary.companies
        );
    }
    info!(
        "✓ Batch complete: {} companies, {} facts written, {} flagged",
        summary.companies, summary.facts_written, summary.flagged
    );
    Ok(())
}

async fn seed(config: &AppConfig) -> anyhow::Result<()> {
    let companies = load_companies(&config.companies_csv)
        .await
        .with_context(|| format!("failed to load {}", config.companies_csv.display()))?;
    let storage = open_storage(config).await?;

    let mut seeded = 0;
    for company in &companies {
        match storage.repository.ensure_company(company).await {
            Ok(()) => seeded += 1,
            Err(e) => error!("✗ Failed to seed {}: {}", company.ticker, e),
        }
    }
    info!("✓ Seeded {} of {} companies", seeded, companies.len());
    Ok(())
}

async fn serve_api(config: &AppConfig) -> anyhow::Result<()> {
    let storage = open_storage(config).await?;
    let state = ApiState::new(
        storage.repository,
        Arc::new(ListingCache::new(config.api_cache_ttl)),
    );
    let app = build_router(state, &config.public_dir, config.api_requests_per_minute);

    info!(
        "Serving {} on {}",
        config.public_dir.display(),
        config.api_bind_addr
    );
    serve(app, config.api_bind_addr).await?;
    info!("Shutdown complete");
    Ok(())
}

async fn list(
    config: &AppConfig,
    sort: Option<&str>,
    descending: bool,
    search: Option<&str>,
) -> anyhow::Result<()> {
    let sort = sort.map(str::parse::<SortKey>).transpose()?;
    let storage = open_storage(config).await?;
    let records = storage.repository.list_all().await?;

    let listings: Vec<CompanyListing> = records.iter().map(CompanyListing::from_record).collect();
    let mut listings = filter_listings(listings, search.unwrap_or(""));
    if let Some(sort) = sort {
        sort_listings(&mut listings, sort, SortOrder::from_flag(descending));
    }
    println!("{}", render_table(&listings));
    Ok(())
}
