use anyhow::Result;
use tracing::info;

use loquela::config::Config;
use loquela::db::Db;
use loquela::routes::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loquela=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("Starting loquela");

    // Load configuration from environment
    let config = Config::from_env()?;

    // Connect to the database and apply the schema
    let db = Db::connect(&config.database_url).await?;
    info!("Connected to {}", config.database_url);

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Listening on {}", address);

    let app = routes::router(AppState { db, config });
    axum::serve(listener, app).await?;

    Ok(())
}
