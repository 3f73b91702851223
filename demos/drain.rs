//! drain: wait for in-flight requests to finish before shutting down
//!
//! Spawns a batch of simulated requests, each holding a count on a shared
//! countdown event, then waits for the event to open before exiting.
//!
//! ```text
//! cargo run --example drain -- --requests 50 -vv
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use countdown_event::CountdownEvent;
use std::time::Duration;
use tracing::{info, Level};

/// Drain simulated in-flight requests before shutdown
#[derive(Parser, Debug)]
#[command(name = "drain", version, about)]
struct Args {
    /// Number of simulated requests to spawn
    #[arg(short, long, default_value_t = 20)]
    requests: u64,

    /// Longest simulated request duration in milliseconds
    #[arg(long, default_value_t = 50)]
    max_latency_ms: u64,

    /// Give up draining after this many milliseconds
    #[arg(long, default_value_t = 5_000)]
    shutdown_timeout_ms: u64,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[compio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    if args.max_latency_ms == 0 {
        bail!("--max-latency-ms must be at least 1");
    }

    let inflight = CountdownEvent::new();

    for id in 0..args.requests {
        let guard = inflight.guard();
        let latency = Duration::from_millis((id * 7919) % args.max_latency_ms);
        compio::runtime::spawn(async move {
            let _guard = guard;
            compio::time::sleep(latency).await;
            info!("Request {} finished after {:?}", id, latency);
        })
        .detach();
    }

    info!("Spawned {} requests, draining", inflight.count());

    let drained = compio::time::timeout(
        Duration::from_millis(args.shutdown_timeout_ms),
        inflight.wait(),
    )
    .await;
    if drained.is_err() {
        bail!("{} requests still in flight at shutdown", inflight.count());
    }

    println!("Drained {} requests", args.requests);
    Ok(())
}
