//! chainwatch command line
//!
//! Manage the network registry and check RPC endpoints:
//!
//! - **Registry**: list, add, rename, remove and select networks
//! - **Import/export**: JSON files in the persisted format
//! - **Probe**: one-shot liveness check of a network's RPC URLs
//! - **Watch**: periodic probing with optional Prometheus metrics

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{anyhow, bail, Context, Result};
use chainwatch::config::Config;
use chainwatch::defaults::default_networks;
use chainwatch::format::{format_block_age, format_block_number, format_latency};
use chainwatch::guid::Guid;
use chainwatch::registry::{normalize, NetworkRegistry};
use chainwatch::rpc_probe::{servers_for_network, Prober};
use chainwatch::store::SledStore;
use chainwatch::structured_logging::ProbeLogger;
use chainwatch::types::{Currency, NetworkDraft, NetworkRecord, RpcServerStatus};
use chainwatch::endpoints;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "chainwatch.toml")]
    config: String,

    /// Registry database directory (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all networks; `*` marks the selected one
    List,
    /// Show one network (default: the selected one)
    Show { name: Option<String> },
    /// Add a network
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        chain_id: u64,
        #[arg(long, default_value = "")]
        symbol: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        explorer: Option<String>,
        /// RPC URL (repeatable)
        #[arg(long = "rpc", required = true)]
        rpc_urls: Vec<String>,
        #[arg(long)]
        testnet: bool,
    },
    /// Remove a network
    Remove { name: String },
    /// Rename a network
    Rename { name: String, new_name: String },
    /// Make a network the selected one
    Select { name: String },
    /// Pin the RPC URL used for a network
    UseRpc { name: String, url: String },
    /// Add the built-in networks that are not present yet
    InitDefaults,
    /// Import networks from a JSON file
    Import {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = ImportMode::Skip)]
        mode: ImportMode,
    },
    /// Export all networks as JSON (stdout when no file is given)
    Export { file: Option<PathBuf> },
    /// Probe RPC endpoints once
    Probe {
        /// Network to probe (default: the selected one)
        name: Option<String>,
        /// Probe these URLs instead of a network's list (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,
    },
    /// Probe a network's endpoints periodically until interrupted
    Watch {
        name: Option<String>,
        /// Seconds between rounds (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// How imported networks are merged with existing ones of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ImportMode {
    /// Replace the whole registry
    Replace,
    /// Keep existing networks, skip conflicting imports
    Skip,
    /// Import conflicting networks under a "Name (n)" name
    Rename,
    /// Overwrite existing networks with the imported data
    Overwrite,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = load_config(&args.config)?;
    if let Some(db) = args.db {
        config.storage.db_path = db;
    }

    let store = SledStore::open(&config.storage.db_path).with_context(|| {
        format!(
            "Failed to open registry database at {}",
            config.storage.db_path.display()
        )
    })?;
    let registry =
        NetworkRegistry::open(Arc::new(store)).context("Failed to open network registry")?;

    let result = run(args.command, &registry, &config).await;
    registry.close().context("Failed to flush registry")?;
    result
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "chainwatch=debug,info"
    } else {
        "chainwatch=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config
            .apply_env_overrides()
            .context("Invalid environment override")?;
        Ok(config)
    }
}

async fn run(command: Command, registry: &NetworkRegistry, config: &Config) -> Result<()> {
    match command {
        Command::List => {
            let selected = registry.selected_id();
            for network in registry.networks().iter() {
                let marker = if Some(&network.id) == selected.as_ref() { "*" } else { " " };
                println!(
                    "{} {:<24} chain {:<10} {:<6} {} RPC{}{}",
                    marker,
                    network.name,
                    network.chain_id,
                    network.currency.symbol,
                    network.rpc_urls.len(),
                    if network.rpc_urls.len() == 1 { "" } else { "s" },
                    if network.testnet { "  (testnet)" } else { "" },
                );
            }
        }
        Command::Show { name } => {
            let network = resolve_network(registry, name.as_deref())?;
            print_network(&network);
        }
        Command::Add {
            name,
            chain_id,
            symbol,
            icon,
            explorer,
            rpc_urls,
            testnet,
        } => {
            let mut draft = NetworkDraft::new(name.clone(), chain_id)
                .with_rpc_urls(rpc_urls)
                .testnet(testnet);
            draft.currency = Currency {
                symbol,
                icon_url: icon,
            };
            draft.explorer_url = explorer;
            if !registry.add(draft)? {
                bail!("A network named '{}' already exists", name);
            }
            println!("Added {}", name);
        }
        Command::Remove { name } => {
            let network = find_by_name(registry, &name)?;
            registry.delete(&network.id)?;
            println!("Removed {}", name);
        }
        Command::Rename { name, new_name } => {
            let mut network = (*find_by_name(registry, &name)?).clone();
            network.name = new_name.clone();
            if !registry.edit(network)? {
                bail!("A network named '{}' already exists", new_name);
            }
            println!("Renamed {} to {}", name, new_name);
        }
        Command::Select { name } => {
            let network = find_by_name(registry, &name)?;
            registry.select(&network.id)?;
            println!("Selected {}", name);
        }
        Command::UseRpc { name, url } => {
            let network = find_by_name(registry, &name)?;
            if !registry.set_selected_rpc_url(&network.id, &url)? {
                bail!("{} is not one of the RPC URLs of {}", url, name);
            }
            println!("{} now uses {}", name, url);
        }
        Command::InitDefaults => {
            let mut added = 0;
            for network in default_networks() {
                if registry.add_network_if_not_exists(network)? {
                    added += 1;
                }
            }
            println!("Added {} default network(s)", added);
        }
        Command::Import { file, mode } => import(registry, &file, mode)?,
        Command::Export { file } => {
            let snapshot = registry.networks();
            let records: Vec<&NetworkRecord> = snapshot.iter().map(Arc::as_ref).collect();
            let json = serde_json::to_string_pretty(&records)?;
            match file {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), networks = records.len(), "Exported networks");
                }
                None => println!("{}", json),
            }
        }
        Command::Probe { name, urls } => {
            let servers = if urls.is_empty() {
                let network = resolve_network(registry, name.as_deref())?;
                servers_for_network(&network)
            } else {
                urls.into_iter().map(RpcServerStatus::new).collect()
            };
            if servers.is_empty() {
                bail!("No RPC URLs to probe");
            }
            let prober = Prober::new(&config.probe).context("Failed to build HTTP client")?;
            print_statuses(&prober.probe_all(servers).await);
        }
        Command::Watch { name, interval } => watch(registry, config, name, interval).await?,
    }
    Ok(())
}

fn import(registry: &NetworkRegistry, file: &Path, mode: ImportMode) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("{} is not JSON", file.display()))?;
    let (networks, dropped) = normalize::parse_stored(value);
    if dropped > 0 {
        warn!(dropped, "Skipped unreadable entries in import file");
    }

    let total = networks.len();
    if mode == ImportMode::Replace {
        registry.replace_all(networks)?;
        println!("Imported {} network(s), replacing the registry", total);
        return Ok(());
    }

    let mut imported = 0;
    for network in networks {
        let exists = network
            .name
            .as_deref()
            .is_some_and(|name| registry.has_network_with_name(name));
        let accepted = match (mode, exists) {
            (ImportMode::Overwrite, true) => registry.replace_existing_network(network)?,
            (ImportMode::Rename, true) => {
                registry.add_network_with_unique_name(network)?;
                true
            }
            _ => registry.add_network_if_not_exists(network)?,
        };
        if accepted {
            imported += 1;
        }
    }
    println!("Imported {} of {} network(s)", imported, total);
    Ok(())
}

async fn watch(
    registry: &NetworkRegistry,
    config: &Config,
    name: Option<String>,
    interval: Option<u64>,
) -> Result<()> {
    let interval_secs = interval.unwrap_or(config.watch.interval_secs).max(1);

    if config.monitoring.enable_metrics {
        let port = config.monitoring.metrics_port;
        info!("Starting metrics server on port {}", port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::metrics_server(port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let prober = Prober::new(&config.probe).context("Failed to build HTTP client")?;
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    info!(interval_secs, "Watching endpoints, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Resolved every round so registry edits are picked up
                let network = resolve_network(registry, name.as_deref())?;
                let run = prober.clone().with_logger(ProbeLogger::new(Guid::new()));
                let statuses = run.probe_network(&network).await;
                println!("== {} ({})", network.name, chrono::Local::now().format("%H:%M:%S"));
                print_statuses(&statuses);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

fn find_by_name(registry: &NetworkRegistry, name: &str) -> Result<Arc<NetworkRecord>> {
    registry
        .find_network_by_name(name)
        .ok_or_else(|| anyhow!("No network named '{}'", name))
}

/// Named network, or the selected one
fn resolve_network(registry: &NetworkRegistry, name: Option<&str>) -> Result<Arc<NetworkRecord>> {
    match name {
        Some(name) => find_by_name(registry, name),
        None => registry
            .current_network()
            .ok_or_else(|| anyhow!("No network selected; run `chainwatch init-defaults` or `chainwatch add`")),
    }
}

fn print_network(network: &NetworkRecord) {
    println!("{}", network.name);
    println!("  id:        {}", network.id);
    println!("  chain id:  {}", network.chain_id);
    println!("  currency:  {}", network.currency.symbol);
    if let Some(explorer) = &network.explorer_url {
        println!("  explorer:  {}", explorer);
    }
    println!("  testnet:   {}", network.testnet);

    let active = network.active_rpc_url();
    println!("  RPC URLs:");
    for url in &network.rpc_urls {
        let marker = if Some(url.as_str()) == active { "*" } else { " " };
        println!("   {} {}", marker, url);
    }

    if !network.tokens.is_empty() {
        println!("  tokens:");
        for token in &network.tokens {
            println!("    {}", token.item.contract_address);
        }
    }
    if !network.nfts.is_empty() {
        println!("  NFTs:");
        for nft in &network.nfts {
            let label = nft.item.name.as_deref().unwrap_or("");
            println!("    {} #{} {}", nft.item.contract_address, nft.item.token_id, label);
        }
    }
}

fn print_statuses(statuses: &[RpcServerStatus]) {
    for status in statuses {
        println!(
            "{:<5} {:>8} {:>14} {:>12}  {}",
            if status.is_alive { "UP" } else { "DOWN" },
            format_latency(status.latency_ms),
            format_block_number(status.last_block),
            format_block_age(status.block_age_secs),
            status.url,
        );
    }
}
