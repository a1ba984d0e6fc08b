mod accounts;
mod config;
mod dashboard;
mod db;
mod documents;
mod errors;
mod ledger;
mod memory;
mod models;
mod orders;
mod pipeline;
mod routes;
mod state;
mod submission;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::accounts::{AccountStore, PgAccountStore};
use crate::config::{Config, StorageBackend};
use crate::dashboard::{DashboardAggregator, DashboardStore, PgDashboardStore};
use crate::db::create_pool;
use crate::documents::service::run_abandoned_sweeper;
use crate::documents::{DocumentStore, PgDocumentStore};
use crate::ledger::{Ledger, LedgerStore, PgLedgerStore};
use crate::memory::MemoryStore;
use crate::orders::reconciler::run_sweeper;
use crate::orders::{OrderStore, PgOrderStore, Reconciler};
use crate::pipeline::WebhookPipeline;
use crate::routes::build_router;
use crate::state::AppState;
use crate::submission::SubmissionService;

struct Stores {
    ledger: Arc<dyn LedgerStore>,
    accounts: Arc<dyn AccountStore>,
    orders: Arc<dyn OrderStore>,
    documents: Arc<dyn DocumentStore>,
    dashboard: Arc<dyn DashboardStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Fixer API v{}", env!("CARGO_PKG_VERSION"));

    let stores = build_stores(&config).await?;

    let pipeline = Arc::new(WebhookPipeline::new(
        config.pipeline_webhook_url.clone(),
        config.pipeline_timeout,
    )?);
    info!(
        "Processing pipeline at {} (timeout {:?})",
        config.pipeline_webhook_url, config.pipeline_timeout
    );

    let ledger = Ledger::new(stores.ledger);
    let reconciler = Reconciler::new(stores.orders, ledger.clone());
    let submissions = SubmissionService::new(
        ledger.clone(),
        stores.documents.clone(),
        pipeline,
        config.pipeline_timeout,
    );
    let dashboard = DashboardAggregator::new(stores.dashboard);

    // Picks up completed orders whose credit never landed
    tokio::spawn(run_sweeper(reconciler.clone(), config.reconcile_interval));
    // Settles documents whose submission died before a terminal status write
    tokio::spawn(run_abandoned_sweeper(
        stores.documents.clone(),
        config.reconcile_interval,
        config.pipeline_timeout * 2,
    ));

    let state = AppState {
        config: config.clone(),
        ledger,
        accounts: stores.accounts,
        documents: stores.documents,
        reconciler,
        submissions,
        dashboard,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web client's domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_stores(config: &Config) -> Result<Stores> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when STORAGE_BACKEND=postgres")?;
            let pool = create_pool(url).await?;
            info!("PostgreSQL pool ready, migrations applied");
            Ok(Stores {
                ledger: Arc::new(PgLedgerStore::new(pool.clone())),
                accounts: Arc::new(PgAccountStore::new(pool.clone())),
                orders: Arc::new(PgOrderStore::new(pool.clone())),
                documents: Arc::new(PgDocumentStore::new(pool.clone())),
                dashboard: Arc::new(PgDashboardStore::new(pool)),
            })
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok(Stores {
                ledger: store.clone(),
                accounts: store.clone(),
                orders: store.clone(),
                documents: store.clone(),
                dashboard: store,
            })
        }
    }
}
