//! EDID Vault RPC Server - JSON-RPC backend for the web UI.
//!
//! This binary provides a JSON-RPC 2.0 server that wraps the edidvault-core
//! library for the browser-based operator panel.

mod handler;
mod i2cdev;
mod server;

use anyhow::Result;
use clap::Parser;
use edidvault_core::{EdidVault, SysfsDrmView};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "edidvault-rpc")]
#[command(about = "JSON-RPC server for EDID Vault")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Vault root directory (dumps land in <root>/edid_files)
    #[arg(long, default_value = "/var/lib/edidvault")]
    vault_root: PathBuf,

    /// Removable-media mount root
    #[arg(long)]
    media_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting EDID Vault RPC Server");
    info!("Vault root: {}", args.vault_root.display());

    let transport = Arc::new(i2cdev::I2cDevTransport::new());
    let kernel = Arc::new(SysfsDrmView::new());
    let mut vault = EdidVault::new(&args.vault_root, transport, kernel)?;
    if let Some(media_root) = args.media_root {
        vault = vault.with_media_root(media_root);
    }

    let addr = server::start_server(vault, &args.host, args.port).await?;

    // Print port for the panel supervisor to read (intentional stdout)
    println!("RPC_PORT={}", addr.port());
    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
