use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, prelude::*};

use price_watch::config::LoggingConfig;
use price_watch::models::{MonitorConfig, NewProduct, ProductKey};
use price_watch::web::{AppState, create_router};
use price_watch::{AppConfig, ConfigStore, HistoryStore, MonitorEngine, NotifierSet, PriceExtractor};

/// Watches retail product pages and alerts when a price drops to its target
#[derive(Parser)]
#[command(name = "price-watch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve {
        /// Start the monitoring loop immediately
        #[arg(long)]
        autostart: bool,
    },
    /// Run one check cycle and print the results
    Check,
    /// Manage tracked products
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// List tracked products
    List,
    /// Track a new product
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        url: String,

        /// Alert when the price is at or below this amount
        #[arg(short, long)]
        target: Decimal,
    },
    /// Stop tracking a product, by id or list position
    Remove { key: String },
}

struct Services {
    config_store: Arc<ConfigStore>,
    history: Arc<HistoryStore>,
    engine: Arc<MonitorEngine>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging)?;

    if config.metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exported on {}", addr);
    }

    let services = build_services(&config).await?;

    match cli.command.unwrap_or(Commands::Serve { autostart: false }) {
        Commands::Serve { autostart } => serve(&config, services, autostart).await,
        Commands::Check => check(services).await,
        Commands::Products { command } => products(services, command).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.directory)
        .with_context(|| format!("Failed to create log directory {}", logging.directory.display()))?;

    let file_appender = tracing_appender::rolling::daily(&logging.directory, &logging.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("price_watch=info,tower_http=info"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}

async fn build_services(config: &AppConfig) -> Result<Services> {
    let defaults = MonitorConfig::new(config.monitor.check_interval_minutes);
    let config_store = Arc::new(ConfigStore::open(config.storage.config_path(), defaults).await?);
    let history = Arc::new(HistoryStore::open(config.storage.history_path(), config.storage.history_limit).await?);

    let notifiers = NotifierSet::from_config(&config.notifications);
    if notifiers.is_empty() {
        tracing::warn!("No notification channel configured, alerts will not be delivered");
    } else {
        info!("Notification channels: {}", notifiers.names().join(", "));
    }

    let engine = Arc::new(MonitorEngine::new(
        Arc::clone(&config_store),
        Arc::clone(&history),
        Arc::new(PriceExtractor::with_chrome(config.scraper.clone())),
        Arc::new(notifiers),
        Duration::from_secs(config.scraper.product_timeout_secs),
    ));

    Ok(Services {
        config_store,
        history,
        engine,
    })
}

async fn serve(config: &AppConfig, services: Services, autostart: bool) -> Result<()> {
    let engine = Arc::clone(&services.engine);
    let app = create_router(AppState {
        engine: services.engine,
        config_store: services.config_store,
        history: services.history,
    });

    if autostart || config.server.autostart {
        engine.start().await;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Price Watch listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    engine.stop().await;
    Ok(())
}

async fn check(services: Services) -> Result<()> {
    let results = services.engine.run_cycle_now().await?;

    for result in &results {
        match (&result.error, result.current_price) {
            (Some(error), _) => println!("{:<30} error: {}", result.name, error),
            (None, Some(price)) => println!(
                "{:<30} {} {} (target {}){}",
                result.name,
                price,
                result.currency.as_deref().unwrap_or(""),
                result.target_price,
                if result.price_met { "  TARGET MET" } else { "" }
            ),
            (None, None) => println!("{:<30} no price", result.name),
        }
    }

    println!("Checked {} products", results.len());
    Ok(())
}

async fn products(services: Services, command: ProductCommands) -> Result<()> {
    let store = services.config_store;

    match command {
        ProductCommands::List => {
            for (index, product) in store.get_products().await.iter().enumerate() {
                println!(
                    "[{}] {}  {}  target {}  {}",
                    index, product.id, product.name, product.target_price, product.url
                );
            }
        }
        ProductCommands::Add { name, url, target } => {
            let product = store
                .add_product(NewProduct {
                    name,
                    url,
                    target_price: target,
                })
                .await?;
            println!("Added {} ({})", product.name, product.id);
        }
        ProductCommands::Remove { key } => {
            let product = store.delete_product(&parse_key(&key)).await?;
            println!("Removed {} ({})", product.name, product.id);
        }
    }

    Ok(())
}

// Short numeric keys are list positions, anything else is an id
fn parse_key(raw: &str) -> ProductKey {
    match raw.parse::<usize>() {
        Ok(index) if raw.len() < 32 => ProductKey::Index(index),
        _ => ProductKey::Id(raw.to_string()),
    }
}
