// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wardend: a small init and process supervisor.

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use warden_daemon::{env, lifecycle};

#[derive(Parser)]
#[command(name = "wardend", version, about = "a small init and process supervisor")]
struct Cli {
    /// Service directory (default: /etc/warden). As true init, `S` or
    /// `single` selects the single-user catalog.
    service_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match lifecycle::startup(cli.service_dir.clone()) {
        Err(e) => {
            error!("{e}");
            let base =
                cli.service_dir.unwrap_or_else(|| PathBuf::from(env::DEFAULT_SERVICE_DIR));
            lifecycle::fatal_hook(&base);
        }
        Ok(mut engine) => {
            engine.run();
            lifecycle::finale(engine);
        }
    }
}
