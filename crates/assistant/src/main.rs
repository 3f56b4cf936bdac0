// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use clap::Parser;
use tracing::error;

use assistant::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("error: {e:#}");
        std::process::exit(2);
    }

    let _ = rustls::crypto::ring::default_provider().install_default();

    if let Err(e) = assistant::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use anyhow::Context;
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let file = match &config.log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?,
        ),
        None => None,
    };

    let builder = fmt::fmt().with_env_filter(filter);
    match (config.log_format.as_str(), file) {
        ("json", Some(file)) => builder.json().with_writer(Mutex::new(file)).init(),
        ("json", None) => builder.json().init(),
        (_, Some(file)) => builder.with_ansi(false).with_writer(Mutex::<File>::new(file)).init(),
        (_, None) => builder.init(),
    }
    Ok(())
}
