//! RingKV - An Event-Driven In-Memory Key-Value Server
//!
//! This is the main entry point for the RingKV server.
//! It parses the command line, sets up logging, binds the listener, and runs
//! the dispatcher until Ctrl+C.

use anyhow::Context;
use ringkv::config::{CliAction, Config};
use ringkv::server::Dispatcher;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
RingKV - An Event-Driven In-Memory Key-Value Server

USAGE:
    ringkv-server [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Address to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 1234)
    -b, --backlog <N>          Listen backlog (default: 20)
    -l, --log-level <LEVEL>    trace, debug, info, warn or error (default: info)
    -v, --version              Print version information
        --help                 Print this help message

    RUST_LOG overrides --log-level when set.

EXAMPLES:
    ringkv-server                      # Start on 127.0.0.1:1234
    ringkv-server --port 4000          # Start on port 4000
    ringkv-server --host 0.0.0.0       # Listen on all interfaces

CONNECTING:
    $ ringkv-cli set name ringkv
    [OK] new name to ringkv
    $ ringkv-cli get name
    [OK] get ringkv
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
RingKV v{} - Event-Driven In-Memory Key-Value Server
──────────────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown.
"#,
        ringkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match Config::from_args() {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("RingKV version {}", ringkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Bind the listener before announcing anything
    let mut dispatcher = Dispatcher::bind(&config)
        .with_context(|| format!("failed to listen on {}", config.bind_address()))?;

    print_banner(&config);
    info!(addr = %config.bind_address(), backlog = config.backlog, "Listening");

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = dispatcher.run() => {}
        _ = shutdown => {}
    }

    let stats = dispatcher.stats();
    let storage = dispatcher.store().stats();
    info!(
        connections = stats.connections_accepted,
        commands = stats.commands_processed,
        bytes_read = stats.bytes_read,
        bytes_written = stats.bytes_written,
        keys = storage.keys,
        "Server shutdown complete"
    );
    Ok(())
}
