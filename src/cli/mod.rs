//! Command-line host for the query engine.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::core::{Engine, Item};
use crate::services::currency::{provider_from_config, CurrencyService, RateRefresher};

#[derive(Parser)]
#[command(name = "anycalc")]
#[command(about = "Calculate anything: math, percentages, bases, time, units and currencies", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file (default: ~/.config/anycalc/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not fetch currency rates
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print items as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a single query, e.g. `anycalc query = 10 km to mi`
    Query {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        input: Vec<String>,
    },

    /// Read queries from stdin, one per line
    Repl,

    /// Write the current configuration (or the defaults) to the config path
    InitConfig,
}

/// Install the global tracing subscriber. Logs go to stderr.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "anycalc=debug" } else { "anycalc=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };

    if let Commands::InitConfig = cli.command {
        let path = cli.config.clone().unwrap_or_else(Config::config_path);
        config.save_to(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let provider = (!cli.offline).then(|| provider_from_config(&config.currency));
    let interval = Duration::from_secs(config.currency.cache_interval);
    let currency = CurrencyService::new(provider);
    let engine = Engine::new(config, currency.clone());
    engine.start()?;

    match cli.command {
        Commands::Query { input } => {
            if !cli.offline {
                if let Err(e) = currency.refresh().await {
                    warn!("Currency rates unavailable: {:#}", e);
                }
            }
            print_items(&engine.query(&input.join(" ")), cli.json)?;
        }
        Commands::Repl => {
            let mut refresher =
                (!cli.offline).then(|| RateRefresher::spawn(currency.clone(), interval));
            repl(&engine, cli.json)?;
            if let Some(refresher) = refresher.as_mut() {
                refresher.shutdown().await;
            }
        }
        Commands::InitConfig => {}
    }

    engine.shutdown();
    Ok(())
}

fn repl(engine: &Engine, json: bool) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        print_items(&engine.query(&line), json)?;
        write!(stdout, "> ")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_items(items: &[Item], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }
    for item in items {
        if item.subtext.is_empty() {
            println!("{}", item.text);
        } else {
            println!("{}\t{}", item.text, item.subtext);
        }
    }
    Ok(())
}
