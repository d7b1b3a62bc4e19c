//! Command line and environment configuration.
//!
//! Every flag falls back to an environment variable; `.env` is loaded
//! before parsing so local setups need no exports.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use recipebox::{PoolSettings, RecipeId};

/// Shortest accepted HS256 secret.
pub const MIN_SECRET_LEN: usize = 32;

/// recipebox - recipe sharing backend
#[derive(Parser, Debug, Clone)]
#[command(name = "recipebox", version)]
#[command(about = "Recipe catalog and sharing API")]
pub struct Cli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Apply migrations and serve the HTTP API
    Serve(ServeArgs),
    /// Apply pending migrations and exit
    Migrate,
    /// Approve a recipe for the public catalog
    Approve { id: RecipeId },
    /// Withdraw a recipe's approval
    Revoke { id: RecipeId },
}

/// Database connection settings.
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 10)]
    pub pool_size: usize,

    /// Seconds allowed for opening a connection
    #[arg(long, env = "DB_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Seconds a request waits for a free connection
    #[arg(long, env = "DB_WAIT_TIMEOUT_SECS", default_value_t = 10)]
    pub wait_timeout_secs: u64,

    /// Server-side statement timeout in milliseconds
    #[arg(long, env = "DB_STATEMENT_TIMEOUT_MS", default_value_t = 60_000)]
    pub statement_timeout_ms: u64,
}

impl DbArgs {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.pool_size,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
            statement_timeout: Duration::from_millis(self.statement_timeout_ms),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "RECIPEBOX_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// HS256 secret used to verify auth tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true, value_parser = parse_secret)]
    pub jwt_secret: String,
}

fn parse_secret(value: &str) -> Result<String, String> {
    if value.len() < MIN_SECRET_LEN {
        return Err(format!(
            "JWT_SECRET must be at least {MIN_SECRET_LEN} characters"
        ));
    }
    Ok(value.to_owned())
}
