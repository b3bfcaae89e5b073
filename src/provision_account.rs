// provision_account.rs
// Utility to add a GitHub identity to the login allow-list

#[path = "common/migrations.rs"]
mod migrations;

use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::str::FromStr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (provider_id, display_name) = match args.as_slice() {
        [provider_id, display_name] => (provider_id.trim(), display_name.trim()),
        _ => {
            eprintln!("Usage: provision_account <github_user_id> <github_login>");
            std::process::exit(2);
        }
    };
    if provider_id.is_empty() || display_name.is_empty() {
        anyhow::bail!("github_user_id and github_login must not be empty");
    }

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://dashboard.db".to_string());
    let connect_options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await?;

    migrations::run_migrations(&pool).await?;

    match migrations::provision_account(&pool, provider_id, display_name).await? {
        Some(id) => println!("✅ Account {} created for GitHub user {} ({})", id, display_name, provider_id),
        None => println!("ℹ️  GitHub user {} is already allow-listed", provider_id),
    }

    Ok(())
}
