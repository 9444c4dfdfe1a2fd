// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kestrel - an always-on personal assistant.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod cron_cmd;
mod runtime;
mod serve;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cron_cmd::CronCommand;

/// Kestrel - an always-on personal assistant.
#[derive(Parser, Debug)]
#[command(name = "kestrel", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the standard search path.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the agent with all enabled channels and the scheduler.
    Serve,
    /// Talk to the agent directly from the terminal.
    Agent {
        /// Send one message and exit instead of starting a REPL.
        #[arg(short, long)]
        message: Option<String>,
        /// Session key to continue.
        #[arg(short, long, default_value = "cli:direct")]
        session: String,
    },
    /// Manage scheduled jobs.
    Cron {
        #[command(subcommand)]
        command: CronCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => kestrel_config::load_and_validate_path(path),
        None => kestrel_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            kestrel_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            init_tracing(&config.agent.log_level);
            serve::run_serve(config).await
        }
        Some(Commands::Agent { message, session }) => {
            init_tracing("warn");
            shell::run_agent(config, message, session).await
        }
        Some(Commands::Cron { command }) => {
            init_tracing("warn");
            cron_cmd::run_cron(config, command).await
        }
        None => {
            println!("kestrel: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kestrel={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
