use anyhow::{bail, Context, Result};
use tracing::info;

use loquela::config::Config;
use loquela::db::Db;
use loquela::models::user;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("create_superuser=info".parse()?),
        )
        .init();

    let email = std::env::args()
        .nth(1)
        .context("usage: create-superuser <email>")?;

    let config = Config::from_env()?;
    let db = Db::connect(&config.database_url).await?;

    let mut conn = db.pool().acquire().await?;
    match user::promote(&mut conn, &email).await? {
        Some(promoted) => {
            info!("✓ '{}' (id {}) is now a superuser", promoted.email, promoted.id);
            Ok(())
        }
        None => bail!("no user registered under '{}'", email),
    }
}
