//! Error handling for styx-daemon.
//!
//! Every variant carries an [`ErrorCode`] for programmatic handling, a
//! human-readable message and an optional source error.
//!
//! Note that failures raised by the application callbacks handed to
//! [`Daemon`](crate::Daemon) never show up here: they are caught and logged
//! where they occur so that the termination handshake always completes.
//!
//! # Usage
//!
//! ```no_run
//! use styx_daemon::{Arguments, Error, Result};
//!
//! fn port(args: &Arguments) -> Result<i32> {
//!     args.get_integer("port")?
//!         .ok_or_else(|| Error::config_missing("port"))
//! }
//! ```

/// Result type alias for styx-daemon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error code enum for categorizing and identifying errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum ErrorCode {
    // Configuration errors: 1000-1999
    /// Invalid configuration or builder usage
    ConfigInvalid = 1000,
    /// A configuration document could not be parsed
    ConfigParse = 1001,
    /// A required option was not set
    ConfigMissing = 1002,
    /// An option value could not be converted to the requested type
    ConfigTypeMismatch = 1003,

    // Signal handling errors: 2000-2999
    /// The process termination hook could not be registered
    SignalRegisterFailed = 2000,

    // Initialization errors: 3000-3999
    /// The logging subsystem could not be initialized
    LoggingInit = 3000,
    /// A packaged resource does not exist
    ResourceNotFound = 3001,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.as_str(), *self as i32)
    }
}

impl ErrorCode {
    /// Convert error code to string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::ConfigParse => "CONFIG_PARSE",
            Self::ConfigMissing => "CONFIG_MISSING",
            Self::ConfigTypeMismatch => "CONFIG_TYPE_MISMATCH",

            Self::SignalRegisterFailed => "SIGNAL_REGISTER_FAILED",

            Self::LoggingInit => "LOGGING_INIT",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
        }
    }
}

/// Error type for all styx-daemon operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration and argument errors
    #[error("Configuration error [{code}]: {message}")]
    Config {
        /// Error code for structured error handling
        code: ErrorCode,
        /// Human-readable error message
        message: String,
        /// Optional source error for better context
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Termination hook registration errors
    #[error("Signal handling error [{code}]: {message}")]
    Signal {
        /// Error code for structured error handling
        code: ErrorCode,
        /// Human-readable error message
        message: String,
        /// Optional source error for better context
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Initialization errors (logging activation)
    #[error("Initialization error [{code}]: {message}")]
    Init {
        /// Error code for structured error handling
        code: ErrorCode,
        /// Human-readable error message
        message: String,
        /// Optional source error for better context
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl Error {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            code: ErrorCode::ConfigInvalid,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error for an option that was not set.
    pub fn config_missing<S: AsRef<str>>(name: S) -> Self {
        Self::Config {
            code: ErrorCode::ConfigMissing,
            message: format!("Missing required option '{}'", name.as_ref()),
            source: None,
        }
    }

    /// Create a configuration error with specific code and source error.
    pub fn config_with_source<S, E>(code: ErrorCode, message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new initialization error.
    pub fn init<S: Into<String>>(message: S) -> Self {
        Self::Init {
            code: ErrorCode::LoggingInit,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new initialization error wrapping the underlying failure.
    pub fn init_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Init {
            code: ErrorCode::LoggingInit,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an initialization error for a resource that does not exist.
    pub fn resource_not_found<S: AsRef<str>>(name: S) -> Self {
        Self::Init {
            code: ErrorCode::ResourceNotFound,
            message: format!("Resource not found: {}", name.as_ref()),
            source: None,
        }
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Config { code, .. }
            | Self::Signal { code, .. }
            | Self::Init { code, .. } => *code,
        }
    }

    /// Check if this error is configuration-related.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Check if this error is an initialization failure.
    #[must_use]
    pub const fn is_init_error(&self) -> bool {
        matches!(self, Self::Init { .. })
    }

    /// Get the error category for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Signal { .. } => "signal",
            Self::Init { .. } => "init",
        }
    }
}

impl From<ctrlc::Error> for Error {
    fn from(err: ctrlc::Error) -> Self {
        Self::Signal {
            code: ErrorCode::SignalRegisterFailed,
            message: format!("Failed to register termination hook: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::config_with_source(
            ErrorCode::ConfigParse,
            format!("Configuration loading failed: {err}"),
            err,
        )
    }
}
