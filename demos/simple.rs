//! Simple daemon showing basic usage.
//!
//! Run with `cargo run --example simple -- -interval-ms=250` and stop it
//! with Ctrl-C: the worker finishes its current iteration before exiting.

use std::time::Duration;
use styx_daemon::{logging, Arguments, Daemon, Properties, Result};
use tracing::info;

fn main() -> Result<()> {
    logging::activate()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    Properties::system().load_args(&args);
    let arguments = Arguments::new("simple", args);
    let interval = Duration::from_millis(
        arguments
            .get_parsed::<u64>("interval-ms")?
            .unwrap_or(1000),
    );

    let exit = Daemon::main_with_arg(interval, |interval, stop| {
        let mut counter = 0u64;
        while !stop.wait_timeout(interval) {
            counter += 1;
            info!("Worker iteration {counter}");
        }
        info!("Worker shutting down after {counter} iterations");
    })?;

    info!(%exit, "Exiting");
    logging::shutdown();
    Ok(())
}
