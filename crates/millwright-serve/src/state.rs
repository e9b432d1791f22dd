//! Application state and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use millwright_ingest::{BatchPipeline, EventStore, MemoryStore, SqliteStore};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Path to the SQLite event store. When unset, events are held in an
    /// in-process store and lost on restart (development mode).
    pub db_path: Option<PathBuf>,

    /// Prometheus metrics port (0 disables the exporter).
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `MILLWRIGHT_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `MILLWRIGHT_DB_PATH`: SQLite database path (default: in-memory store)
    /// - `MILLWRIGHT_METRICS_PORT`: Metrics exporter port (default: 0, disabled)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("MILLWRIGHT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let db_path = std::env::var("MILLWRIGHT_DB_PATH").ok().map(PathBuf::from);

        let metrics_port = match std::env::var("MILLWRIGHT_METRICS_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("MILLWRIGHT_METRICS_PORT must be a port number"))?,
            Err(_) => 0,
        };

        tracing::info!(
            bind_addr = %bind_addr,
            db_path = ?db_path,
            metrics_port,
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            db_path,
            metrics_port,
        })
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event store backing both the write and read paths.
    pub store: Arc<dyn EventStore>,

    /// Batch reconciliation pipeline.
    pub pipeline: Arc<BatchPipeline>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state from configuration, opening the store.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn EventStore> = match &config.db_path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => {
                tracing::warn!("MILLWRIGHT_DB_PATH not set, events will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let pipeline = Arc::new(BatchPipeline::new(Arc::clone(&store)));

        Ok(Self {
            store,
            pipeline,
            config: Arc::new(config),
        })
    }
}
