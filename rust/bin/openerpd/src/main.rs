//! `openerpd`, the OpenERP receiving server.
//!
//! Usage:
//!   openerpd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/openerp/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use openerp_core::Module;
use tracing::info;

use config::ServerConfig;

/// OpenERP server.
#[derive(Parser, Debug)]
#[command(name = "openerpd", about = "OpenERP receiving server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    // Initialize storage.
    std::fs::create_dir_all(&server_config.storage.data_dir)?;
    let core_config = server_config.service_config(&cli.listen);

    let sql: Arc<dyn openerp_sql::SQLStore> = Arc::new(
        openerp_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    let receiving_module =
        receiving::ReceivingModule::with_config(Arc::clone(&sql), &server_config.receiving)
            .map_err(|e| anyhow::anyhow!("receiving module init failed [{}]: {}", e.error_code(), e))?;
    info!(
        "Receiving module initialized (pack prefix {})",
        receiving_module.engine().prefix()
    );

    let module_routes = vec![(receiving_module.name(), receiving_module.routes())];
    let app = routes::build_router(module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("OpenERP server listening on {}", core_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
