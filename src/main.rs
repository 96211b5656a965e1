use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use courier::app::AppContext;
use courier::cli::{commands, Cli, Commands};
use courier::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.check.workers = workers;
    }

    let dry_run = matches!(cli.command, Commands::Check { dry_run: true });
    let ctx = AppContext::new(config, cli.db, dry_run)?;

    match cli.command {
        Commands::Check { .. } => {
            commands::check(&ctx).await?;
        }
        Commands::Serve => {
            commands::serve(&ctx).await?;
        }
        Commands::Add { url } => {
            commands::add_feed(&ctx, &url, None)?;
        }
        Commands::Remove { url } => {
            commands::remove_feed(&ctx, &url)?;
        }
        Commands::Import { path } => {
            commands::import_opml(&ctx, &path)?;
        }
        Commands::List => {
            commands::list_feeds(&ctx)?;
        }
        Commands::State { reset } => {
            commands::show_state(&ctx, reset)?;
        }
    }

    Ok(())
}
