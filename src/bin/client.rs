//! RingKV command-line client.
//!
//! Sends its arguments as a single request and prints the response:
//!
//! ```text
//! $ ringkv-cli set foo bar
//! [OK] new foo to bar
//! ```
//!
//! The server address comes from `RINGKV_ADDR` (default `127.0.0.1:1234`).

use anyhow::{bail, Context};
use ringkv::client::Client;
use ringkv::{ADDR_ENV, DEFAULT_HOST, DEFAULT_PORT};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: ringkv-cli <command> [args...]");
    }

    let addr = std::env::var(ADDR_ENV)
        .unwrap_or_else(|_| format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT));
    let mut client = Client::connect(addr.as_str())
        .await
        .with_context(|| format!("connect to {} failed", addr))?;

    let response = client.send(&args).await.context("request failed")?;
    println!("{}", response);
    Ok(())
}
