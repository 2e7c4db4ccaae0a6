//! Single-session example: drive one device step by step.
//!
//! Shows the session state machine directly: open (connect +
//! authenticate), run commands one at a time, inspect the result log,
//! and close.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example single_session -- 10.0.0.1 admin secret
//! ```

use std::env;
use std::time::Duration;

use telpool::{DeviceEndpoint, Session, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let mut args = env::args().skip(1);
    let (Some(host), Some(user), Some(pass)) = (args.next(), args.next(), args.next()) else {
        eprintln!("usage: single_session <host> <user> <password>");
        std::process::exit(1);
    };

    let config = SessionConfig::default().with_timeout(Duration::from_secs(5));
    let mut session = Session::new(DeviceEndpoint::new(host, user, pass), config)?;

    println!("Opening session to {}...", session.endpoint());
    session.open().await?;
    println!("State: {}", session.state());

    for command in ["term len 0", "show ip inter bri"] {
        println!("\nExecuting: {}", command);
        println!("{}", "-".repeat(50));
        let record = session.run(command).await?;
        println!("{}", record.output);
        println!("{}", "-".repeat(50));
        println!("Completed in {:?}", record.elapsed);
    }

    session.close().await?;
    println!("\nState: {} ({} log entries)", session.state(), session.log().len());

    Ok(())
}
