use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use snapfeed::blobs::{BlobStore, LocalBlobStore, UploadPolicy};
use snapfeed::config::{Cli, Config};
use snapfeed::social::counters;
use snapfeed::state::{AppState, DbPool};
use snapfeed::{db, graphql, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    check_counters(&pool, config.database.reconcile_counters)?;

    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        config.uploads_path(),
        pool.clone(),
        config.public_url(),
    ));
    let uploads = UploadPolicy {
        public_url: config.public_url(),
        ticket_minutes: config.storage.upload_ticket_minutes,
    };

    // Build app state
    let state = AppState {
        db: pool.clone(),
        config: config.clone(),
        blobs: blobs.clone(),
        graphql_schema: graphql::build_schema(pool, blobs, uploads),
    };

    let app = routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Public URL: {}", config.public_url());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Compare stored like/comment/follow/post counters with the rows they count.
fn check_counters(pool: &DbPool, reconcile: bool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    let drift = counters::audit(&conn)?;

    if drift.is_empty() {
        return Ok(());
    }

    for d in &drift {
        tracing::warn!(
            counter = ?d.counter,
            id = %d.id,
            stored = d.stored,
            actual = d.actual,
            "Counter drift detected"
        );
    }

    if reconcile {
        let fixed = counters::reconcile(&mut conn)?;
        tracing::info!("Reconciled {} counters", fixed);
    } else {
        tracing::warn!(
            "{} counters drifted; set database.reconcile_counters = true to repair",
            drift.len()
        );
    }

    Ok(())
}
