#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
//! # styx-daemon: Service Bootstrap Utilities
//!
//! Small building blocks for the `main` of a long-running service:
//!
//! - **Graceful termination**: [`Daemon`] runs the application's entry point
//!   and turns SIGINT/SIGTERM/SIGHUP into a stop request followed by a wait
//!   for the entry point to actually return.
//! - **Layered arguments**: [`Arguments`] resolves named settings from
//!   `-name=value` command-line arguments, process properties and
//!   environment variables, in that order.
//! - **Logging activation**: [`logging::activate`] installs a `tracing`
//!   subscriber configured from the packaged `/styx.logging.properties`
//!   resource.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use styx_daemon::{logging, Arguments, Daemon, Result};
//!
//! fn main() -> Result<()> {
//!     logging::activate()?;
//!     let args = Arguments::new("styx", std::env::args().skip(1));
//!     let port = args.get_integer("port")?.unwrap_or(8080);
//!
//!     Daemon::main_with_arg(port, |port, stop| {
//!         tracing::info!(port, "Serving");
//!         while !stop.wait_timeout(Duration::from_secs(1)) {
//!             // accept connections...
//!         }
//!     })?;
//!     Ok(())
//! }
//! ```

mod callback;
mod config;
mod daemon;
mod error;

pub mod arguments;
pub mod logging;
pub mod resources;
pub mod shutdown;
pub mod signal;

pub use arguments::{Arguments, ProcessEnv, Properties, Source};
pub use callback::{BoxError, IntoOutcome, Outcome};
pub use config::{LogConfig, LogFormat, LogLevel, PropertiesProvider, LOG_ENV_PREFIX};
pub use daemon::{Daemon, DaemonBuilder, TerminationHandle, DEFAULT_DAEMON_NAME};
pub use error::{Error, ErrorCode, Result};
pub use logging::{LogHandle, TeardownGuard, DEFAULT_LOGGING_RESOURCE};
pub use resources::Resources;
pub use shutdown::{Exit, StopSignal, STOP_POLL_INTERVAL};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
