// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use hub_config::{load_config, validate_config};
use hub_server::{build_app, build_state};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hub-server", version, about = "Encrypted data-hub storage server")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address override.
    #[arg(long)]
    bind: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("load config")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let filter = if args.debug {
        EnvFilter::new("hub=debug,hub_server=debug,tower_http=info")
    } else {
        let level = config.log_level.as_deref().unwrap_or("info");
        EnvFilter::new(format!("hub={level},hub_server={level}"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let warnings = validate_config(&config).context("validate config")?;
    for warning in &warnings {
        warn!(%warning, "configuration warning");
    }

    let bind = config.bind.clone();
    let base_url = config.base_url.clone();
    let state = build_state(config);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(bind = %bind, base_url = %base_url, "hub-server listening");

    axum::serve(listener, app).await.context("serve")
}
