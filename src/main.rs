use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(
    name = "feedmill",
    version,
    about = "News feed ingestion and reconciliation pipeline",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk all configured sources and reconcile their entries
    Run {
        /// Config file (defaults to $CONFIG_PATH)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Read one page per source, drain the queue and exit
        #[arg(long, default_value = "false")]
        once: bool,
    },

    /// Split an article body into fragments
    Split {
        /// File holding the article markup
        #[arg(short, long)]
        input: PathBuf,

        /// Optimal fragment size in runes
        #[arg(long, default_value = "1800")]
        opt: usize,

        /// Maximum fragment size in runes
        #[arg(long, default_value = "3600")]
        max: usize,

        /// Print fragments as a JSON array
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, once } => {
            let config = feedmill::config::Config::load(config.as_deref())?;
            let format = cli
                .log_format
                .clone()
                .unwrap_or_else(|| config.logging.format.clone());
            setup_tracing(&format, &config.logging.level, cli.verbose)?;

            tracing::info!(
                environment = %config.app.environment,
                sources = config.sources.len(),
                workers = config.pipeline.workers,
                once = %once,
                "Starting run command"
            );
            commands::run(config, once).await?;
        }

        Commands::Split {
            input,
            opt,
            max,
            json,
        } => {
            let format = cli.log_format.as_deref().unwrap_or("text");
            setup_tracing(format, "warn", cli.verbose)?;
            commands::split(&input, opt, max, json)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("feedmill=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("feedmill={level},warn"))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("feedmill=info,warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
