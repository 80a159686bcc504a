//! rat-catalog — router catalog cache CLI
//!
//! Inspect, refresh and flush the local catalog cache.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ratatoskr_catalog::config::Config;
use ratatoskr_catalog::{Catalog, Catalogs, FlushMode, Provider, WarmupScheduler};

/// Router catalog cache CLI
#[derive(Parser)]
#[command(name = "rat-catalog")]
#[command(version)]
#[command(about = "Inspect and maintain the router catalog cache")]
struct Args {
    /// Config file (default: ~/.ratatoskr/catalog.toml, then /etc/ratatoskr/catalog.toml)
    #[arg(short, long, env = "RAT_CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Print catalogs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a provider's catalog, fetching only on a cache miss
    Get {
        /// Provider name (e.g. "openrouter")
        provider: Provider,
        /// Item id that must survive an incomplete listing (repeatable)
        #[arg(long)]
        pin: Vec<String>,
    },

    /// Fetch a provider's catalog unconditionally
    Refresh {
        /// Provider name
        provider: Provider,
    },

    /// Drop the in-memory copy of a provider's catalog
    Flush {
        /// Provider name
        provider: Provider,
        /// Refresh in place instead of evicting
        #[arg(long)]
        refresh: bool,
    },

    /// Fetch several providers at once, isolating failures
    Aggregate {
        /// Provider names (default: every configured provider)
        providers: Vec<Provider>,
        /// Only fetch this provider; the rest stay empty
        #[arg(long)]
        active: Option<Provider>,
    },

    /// Show the endpoints serving one model
    Endpoints {
        /// Model identifier (e.g. "anthropic/claude-sonnet-4")
        model: String,
        /// Provider name
        #[arg(short, long, default_value = "openrouter")]
        provider: Provider,
    },

    /// Run the configured warmup once, without the initial delay
    Warmup,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let catalogs = config.builder()?.build()?;

    match args.command {
        Command::Get { provider, pin } => {
            let mut options = config.fetch_options(provider);
            for id in pin {
                options = options.pin(id);
            }
            let catalog = catalogs.catalog.get_catalog(&options).await?;
            print_catalog(&catalog, args.json)?;
        }

        Command::Refresh { provider } => {
            let options = config.fetch_options(provider);
            let catalog = catalogs.catalog.refresh_catalog(&options).await;
            println!("{provider}: {} models", catalog.len());
        }

        Command::Flush { provider, refresh } => {
            let options = config.fetch_options(provider);
            let mode = if refresh {
                FlushMode::Refresh
            } else {
                FlushMode::Evict
            };
            // The process exits right after, so wait for the refresh here.
            if let Some(handle) = catalogs.catalog.flush_catalog(&options, mode) {
                let catalog = handle.await?;
                println!("{provider}: refreshed, {} models", catalog.len());
            } else {
                println!("{provider}: flushed");
            }
        }

        Command::Aggregate { providers, active } => {
            let providers = if providers.is_empty() {
                catalogs.catalog.fetchers().providers()
            } else {
                providers
            };
            let requests: Vec<_> = providers
                .iter()
                .map(|&p| config.fetch_options(p))
                .collect();
            let result = catalogs.aggregator().aggregate(&requests, active).await;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for (provider, catalog) in &result.catalogs {
                    println!("{provider}: {} models", catalog.len());
                }
                for failure in &result.errors {
                    eprintln!("{}: {}", failure.provider, failure.message);
                }
            }
        }

        Command::Endpoints { model, provider } => {
            let options = config.fetch_options(provider);
            let catalog = catalogs
                .endpoints
                .get_endpoint_catalog(provider, &model, &options)
                .await?;
            if catalog.is_empty() && !args.json {
                println!("no endpoints for {model}");
            } else {
                print_catalog(&catalog, args.json)?;
            }
        }

        Command::Warmup => match config.warmup_config()? {
            Some(warmup) => {
                let warmup = warmup.initial_delay(std::time::Duration::ZERO);
                WarmupScheduler::run(&catalogs.catalog, &warmup).await;
                for provider in &warmup.providers {
                    let cached = catalogs
                        .catalog
                        .cached(&config.fetch_options(*provider))
                        .await;
                    let count = cached.map(|c| c.len()).unwrap_or(0);
                    println!("{provider}: {count} models");
                }
            }
            None => println!("warmup disabled in config"),
        },
    }

    Ok(())
}

/// Display a catalog, one model per line.
fn print_catalog(catalog: &Catalog, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }
    for (id, record) in catalog {
        let mut line = format!("{id}  ctx={}", record.context_window);
        if let Some(max) = record.max_tokens {
            line.push_str(&format!("  max={max}"));
        }
        if let (Some(input), Some(output)) = (record.input_price, record.output_price) {
            line.push_str(&format!("  ${input}/${output} per Mtok"));
        }
        println!("{line}");
    }
    Ok(())
}
