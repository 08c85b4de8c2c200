//! LLRPC - Link-Level RPC Router
//!
//! A single-endpoint request/response protocol carried directly over raw
//! IPv4 (protocol 0xFC): periodic ECHO_REQ heartbeats to a configured
//! remote, plus decoding and reporting of inbound messages.

mod config;
mod network;
mod protocol;

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use network::{Link, ShutdownHandle};

/// LLRPC - Link-level RPC router
#[derive(Parser)]
#[command(name = "llrpc")]
#[command(author = "LLRPC Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Raw-socket heartbeat endpoint", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the endpoint until terminated
    Run {
        /// Local address to bind to
        #[arg(short, long)]
        local: Option<Ipv4Addr>,

        /// Remote address heartbeats are sent to
        #[arg(short, long)]
        remote: Option<Ipv4Addr>,

        /// Heartbeat interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    match cli.command {
        Commands::Run {
            local,
            remote,
            interval_ms,
        } => {
            run_endpoint(config, local, remote, interval_ms).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config();
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Run the endpoint until terminated
async fn run_endpoint(
    config: Config,
    local: Option<Ipv4Addr>,
    remote: Option<Ipv4Addr>,
    interval_ms: Option<u64>,
) -> anyhow::Result<()> {
    let mut link_config = config.link_config();
    if let Some(local) = local {
        link_config.local_addr = local;
    }
    if let Some(remote) = remote {
        link_config.remote_addr = remote;
    }
    if let Some(interval_ms) = interval_ms {
        link_config.heartbeat_interval_ms = interval_ms;
    }

    tracing::info!(
        "starting LLRPC endpoint '{}': {} -> {}",
        config.general.name,
        link_config.local_addr,
        link_config.remote_addr
    );

    let shutdown = ShutdownHandle::new();
    let mut link = Link::open(&link_config, shutdown.clone())?;

    // Raise the termination flag on Ctrl+C; the loop observes it on its
    // next iteration.
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("termination requested");
            signal_shutdown.raise();
        }
    });

    println!("\n========================================");
    println!("  LLRPC Endpoint Running");
    println!("========================================");
    println!("  Host:     {}", config.general.name);
    println!("  Local:    {}", link.local_addr());
    println!("  Remote:   {}", link.remote_addr());
    println!("  Interval: {} ms", link_config.heartbeat_interval_ms);
    println!("========================================");
    println!("\nPress Ctrl+C to stop.\n");

    link.run().await?;

    let stats = link.stats();
    tracing::info!(
        "endpoint stopped: {} sent, {} received, {} malformed",
        stats.messages_sent,
        stats.messages_received,
        stats.decode_failures
    );

    Ok(())
}

/// Print protocol information
fn print_protocol_info() {
    println!("LLRPC Protocol Information");
    println!("==========================\n");

    println!("IP protocol number: {:#04x}", protocol::TRANSPORT_PROTOCOL);
    println!("Header size:        {} bytes", protocol::HEADER_SIZE);
    println!("Byte order:         network (big-endian)");
    println!("Message types:      ECHO_REQ(0) ECHO_RESP(1) COMMAND_REQ(2) COMMAND_RESP(3)");

    println!("\nRequirements:");
    println!("  - Raw sockets need CAP_NET_RAW:");
    println!("    sudo setcap cap_net_raw+ep $(which llrpc)   (or run as root)");
}
