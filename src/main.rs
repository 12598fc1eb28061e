use std::sync::Arc;

use tokio::net::TcpListener;

use scatterfs::config::{generate_config_template, Config};
use scatterfs::db;
use scatterfs::routes;
use scatterfs::state::AppState;
use scatterfs::storage::backend::BackendPool;
use scatterfs::storage::engine::StorageEngine;
use scatterfs::storage::range::DEFAULT_RANGE_WINDOW;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "scatterfs=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "scatterfs=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("scatterfs v{} starting", env!("CARGO_PKG_VERSION"));

    // The endpoint list is immutable for the life of the process.
    let endpoints = config.endpoint_list();
    if endpoints.is_empty() {
        return Err(
            "no blob endpoints configured; set --endpoints or SCATTERFS_ENDPOINTS".into(),
        );
    }
    tracing::info!(
        "rotating uploads across {} blob endpoint(s), block size {} bytes",
        endpoints.len(),
        config.block_size
    );

    // Initialize the SQLite metadata database
    let db = db::init_db(&config.data_dir)?;

    // Chunk/cipher/backend pipeline
    let engine = Arc::new(StorageEngine::new(
        BackendPool::new(endpoints),
        config.block_size,
    ));

    let app_state = AppState {
        db,
        engine,
        range_window: DEFAULT_RANGE_WINDOW,
    };

    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
