//! library — command-line front end for the library catalog.
//!
//! Storage: in-memory (default) or SQLite (file) when the `sqlite` feature is
//! enabled and selected via `LIBRARY_STORAGE=sqlite` or `--db <PATH>`.
//!
//! Run:
//! ```bash
//! library init-db library.db
//! library --db library.db load-csv books.csv
//! library --db library.db list-books --available
//!
//! # structured logs on stderr
//! RUST_LOG=debug LOG_FORMAT=json library --db library.db loans
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod commands;
mod config;
mod error;
mod output;
mod store;

use std::io;
use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::Cli;
use crate::config::{Config, LogFormat};

fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c.with_db_override(cli.db),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    init_tracing(&cfg);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = commands::run(cli.command, &cfg, cli.json, &mut out) {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_tracing(cfg: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(io::stderr),
                )
                .init();
        }
    }
}
