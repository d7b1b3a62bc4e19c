use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use recipebox::{PgStore, RecipeId, RecipeStore, mask_password};
use recipebox_server::auth::JwtVerifier;
use recipebox_server::config::{Cli, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,recipebox=debug")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!(url = %mask_password(&cli.db.database_url), "Connecting to database");
    let store = PgStore::connect(&cli.db.database_url, &cli.db.pool_settings())?;

    let applied = store.migrate().await?;
    if applied.is_empty() {
        info!("Schema up to date");
    } else {
        info!(count = applied.len(), "Applied migrations");
    }

    match cli.command {
        Command::Migrate => store.close(),
        Command::Approve { id } => set_approval(&store, id, true).await?,
        Command::Revoke { id } => set_approval(&store, id, false).await?,
        Command::Serve(args) => {
            let verifier = Arc::new(JwtVerifier::new(&args.jwt_secret));
            recipebox_server::serve(Arc::new(store), verifier, args.bind).await?;
        }
    }
    Ok(())
}

async fn set_approval(store: &PgStore, id: RecipeId, approved: bool) -> recipebox::Result<()> {
    let recipe = store.set_approval(id, approved).await?;
    info!(recipe = recipe.id, title = %recipe.title, approved, "Updated approval");
    store.close();
    Ok(())
}
