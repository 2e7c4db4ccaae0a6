//! Batch example: run the same show commands against a fleet of switches.
//!
//! This is the replacement for the classic "loop over IPs with telnetlib
//! and sleep" script: every device gets its own concurrent session, and
//! command boundaries are detected by prompt, not by waiting.
//!
//! # Usage
//!
//! ```bash
//! TELPOOL_HOSTS=10.0.0.1,10.0.0.2 \
//! TELPOOL_USER=pyclass \
//! TELPOOL_PASS=88newclass \
//! cargo run --example batch_show
//! ```

use std::env;

use telpool::{DeviceEndpoint, SessionConfig, SessionPool};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for state transitions)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let hosts = env::var("TELPOOL_HOSTS")?;
    let user = env::var("TELPOOL_USER")?;
    let pass = env::var("TELPOOL_PASS")?;

    let endpoints: Vec<DeviceEndpoint> = hosts
        .split(',')
        .map(|host| DeviceEndpoint::new(host.trim(), &user, &pass))
        .collect();

    println!("Opening {} session(s)...", endpoints.len());
    let mut pool = SessionPool::open_all(endpoints, SessionConfig::default()).await;
    println!("{}/{} session(s) ready", pool.ready_count(), pool.len());

    let report = pool
        .run_batch(&["term len 0", "show ip inter bri", "show run"])
        .await;

    for (device, result) in report.iter() {
        println!("\n=== {} ===", device);
        if let Some(failure) = &result.failure {
            println!("  session failed: {}", failure);
        }
        for record in &result.records {
            println!("--- {} ({:?}) ---", record.command, record.elapsed);
            println!("{}", record.output);
        }
    }

    if let Err(errors) = pool.close_all().await {
        eprintln!("close: {}", errors);
    }

    Ok(())
}
