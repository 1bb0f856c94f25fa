use std::sync::Arc;

use anyhow::Context;
use chess_puzzler::{FileRepository, ProgressStore, PuzzleCatalog, PuzzleEngine};
use server::clients::stockfish::StockfishEngine;
use server::config::Config;
use server::db;
use server::db::progress::ProgressBackend;
use server::routes;
use server::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let catalog = match &config.catalog_path {
        Some(path) => PuzzleCatalog::load(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => PuzzleCatalog::bundled().context("Bundled catalog is invalid")?,
    };
    tracing::info!(
        levels = catalog.levels().len(),
        puzzles = catalog.puzzle_count(),
        "Catalog ready"
    );

    let backend = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::pool::create_pool(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Running migrations...");
            db::pool::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            ProgressBackend::Postgres(pool)
        }
        None => {
            tracing::info!(dir = %config.progress_dir.display(), "DATABASE_URL not set - storing progress locally");
            ProgressBackend::Local(Arc::new(FileRepository::new(&config.progress_dir)))
        }
    };

    let stored = backend
        .load(&config.progress_key)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load progress: {e}"))?;
    let progress = ProgressStore::restore(stored.as_deref());
    tracing::info!(
        rating = progress.rating(),
        solved = progress.progress().solved.len(),
        "Progress restored"
    );

    let stockfish = match &config.stockfish_path {
        Some(path) => match StockfishEngine::new(path).await {
            Ok(engine) => {
                tracing::info!("Stockfish ready at {path}");
                Some(engine)
            }
            Err(e) => {
                tracing::warn!("Stockfish unavailable - computer moves disabled: {e}");
                None
            }
        },
        None => {
            tracing::info!("STOCKFISH_PATH not set - computer moves disabled");
            None
        }
    };

    let trainer: PuzzleEngine =
        PuzzleEngine::new(Arc::new(catalog), progress).with_pacing(config.pacing);
    let state = AppState::new(trainer, backend, &config.progress_key, stockfish);
    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
