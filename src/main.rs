//! Stockkeeper - Inventory Management Service
//!
//! Products, stock movements and low-stock alerts for a single organization,
//! served as a web application.
//!
//! ## Architecture
//!
//! - **Products**: catalogue entries, soft-deleted, grouped by category
//! - **Movements**: append-only ledger; the only way stock changes
//! - **Users**: administrators manage the catalogue and accounts, regular
//!   users record movements

use clap::Parser;
use inventory::{AppState, Config, Database, seed};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "stockkeeper", version)]
#[command(about = "Inventory management web service")]
struct Cli {
    /// SQLite database URL
    #[arg(long, env = "ESTOQUE_DATABASE_URL", default_value = "sqlite://estoque.db")]
    database_url: String,

    #[arg(long, env = "ESTOQUE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "ESTOQUE_PORT", default_value_t = 5000)]
    port: u16,

    /// Verbose logging
    #[arg(long, env = "ESTOQUE_DEBUG")]
    debug: bool,

    /// Load the sample categories, products and users
    #[arg(long, env = "ESTOQUE_SEED")]
    seed: bool,

    /// Administrator created at startup when there is none
    #[arg(long, env = "ESTOQUE_ADMIN_NAME", default_value = "Administrador")]
    admin_name: String,

    #[arg(long, env = "ESTOQUE_ADMIN_EMAIL", default_value = "admin@estoque.com")]
    admin_email: String,

    #[arg(long, env = "ESTOQUE_ADMIN_PASSWORD", default_value = "admin123", hide_env_values = true)]
    admin_password: String,

    /// Lifetime of "remember me" sessions
    #[arg(long, env = "ESTOQUE_SESSION_TTL_DAYS", default_value_t = 30)]
    session_ttl_days: i64,

    /// Also write daily log files to this directory
    #[arg(long, env = "ESTOQUE_LOG_DIR")]
    log_dir: Option<String>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            database_url: cli.database_url,
            host: cli.host,
            port: cli.port,
            debug: cli.debug,
            seed: cli.seed,
            admin_name: cli.admin_name,
            admin_email: cli.admin_email,
            admin_password: cli.admin_password,
            session_ttl_days: cli.session_ttl_days,
            log_dir: cli.log_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from(Cli::parse());

    // Keeps the file writer flushing until main returns
    let (file_writer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "stockkeeper.log"));
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter())),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    info!(
        database = config.database_url.as_str(),
        bind_address = config.bind_address().as_str(),
        debug = config.debug,
        "Starting Stockkeeper"
    );

    let db = Database::new(&config.database_url).await?;
    let state = AppState::new(db, &config);

    seed::ensure_admin(&state, &config).await?;
    if config.seed {
        seed::load_sample_data(&state).await?;
    }

    let app = inventory::app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(bind_address = config.bind_address().as_str(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, terminating..."),
        Err(e) => {
            error!(error = %e, "Failed to install CTRL+C handler, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
