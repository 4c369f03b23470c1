//! Process entry point for the wargame turn-resolution engine.
//!
//! Wires together configuration, the `PostgreSQL` store, and the HTTP
//! trigger/query surface, then serves until the process is terminated.
//! Turn resolution itself is not run on a timer here: every call to
//! `POST /guilds/:guild_id/turns/resolve` runs exactly one turn
//! (spec.md §6 "Inputs from outside the core: a tick/trigger").
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `wargame-config.yaml`
//! 3. Connect to `PostgreSQL` and run pending migrations
//! 4. Build the store and application state
//! 5. Serve the HTTP trigger/query surface until terminated

mod error;

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wargame_api::state::AppState;
use wargame_api::ServerConfig;
use wargame_core::EngineConfig;
use wargame_store::{PgStore, PostgresConfig, PostgresPool, Store};

use crate::error::EngineError;

/// Application entry point for the engine binary.
///
/// # Errors
///
/// Returns an error if configuration loading, database connection,
/// migration, or serving fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("wargame-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        combat_max_rounds = config.resolution.combat_max_rounds,
        "configuration loaded"
    );

    // 3. Connect to PostgreSQL and run migrations.
    let pg_config = PostgresConfig::new(&config.database.url)
        .with_max_connections(config.database.max_connections)
        .with_connect_timeout(std::time::Duration::from_secs(config.database.connect_timeout_secs))
        .with_idle_timeout(std::time::Duration::from_secs(config.database.idle_timeout_secs));
    let pool = PostgresPool::connect(&pg_config).await.map_err(EngineError::from)?;
    pool.run_migrations().await.map_err(EngineError::from)?;
    info!("database connected and migrated");

    // 4. Build the store and application state.
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let state = Arc::new(AppState::new(store));

    // 5. Serve the HTTP trigger/query surface.
    let server_config = ServerConfig {
        host: config.server.host,
        port: config.server.port,
    };
    wargame_api::start_server(&server_config, state).await.map_err(EngineError::from)?;

    info!("wargame-engine shutdown complete");
    Ok(())
}

/// Load the engine configuration from `wargame-config.yaml`, falling
/// back to defaults (plus environment overrides) if the file is
/// missing.
fn load_config() -> Result<EngineConfig, EngineError> {
    let config_path = Path::new("wargame-config.yaml");
    let mut config = if config_path.exists() {
        EngineConfig::from_file(config_path)?
    } else {
        info!("config file not found, using defaults");
        EngineConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}
