//! # Beacon Server
//!
//! HTTP front for [`beacon_core`]: accepts analytics beacons on any path, prints a report for
//! each one to stdout and mails an alert when required parameters are missing.

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use std::net::IpAddr;
use std::sync::Arc;

pub mod adapter;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod notify;

pub use collector::{Beacon, BeaconOutcome, Collector};
pub use config::{NotifierKind, ServerConfig, SmtpSettings};
pub use error::{ConfigError, NotifyError};
pub use http::{router, serve, MAX_FORM_BODY_BYTES, PIXEL_GIF};
pub use notify::{dispatch, LogNotifier, Notifier, SmtpNotifier};

#[derive(Parser)]
#[command(name = "beacon-server")]
#[command(about = "Passive analytics beacon collector", long_about = None)]
#[command(version)]
struct Cli {
    /// Listener port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Listener address
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Alert channel (overrides BEACON_NOTIFIER)
    #[arg(long, value_enum)]
    notifier: Option<NotifierKind>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long)]
    quiet: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // stdout carries the beacon reports
    builder.target(env_logger::Target::Stderr).init();

    let mut config = ServerConfig::from_env().context("Invalid configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_ip = bind;
    }
    if let Some(notifier) = cli.notifier {
        config.notifier = notifier;
    }

    let collector = Arc::new(Collector::from_config(&config));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind beacon listener on {addr}"))?;

    log::info!(
        "Collecting beacons on http://{} (alerts via {}, cooldown {}s)",
        listener.local_addr().unwrap_or(addr),
        collector.notifier_name(),
        config.alert_cooldown.as_secs()
    );
    serve(listener, collector).await
}
