//! Logging configuration.
//!
//! The configuration is read from a packaged resource in Java-properties
//! style (`key=value`, `#` comments) or, with the `toml` feature, from a
//! `.toml` resource. Sources are layered with figment:
//!
//! 1. Default values
//! 2. The resource
//! 3. Environment variables prefixed with `STYX_LOG_`

use figment::providers::{Env, Serialized};
use figment::value::{Dict, Map, Value};
use figment::{Figment, Metadata, Profile, Provider};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::resources::Resources;

/// Prefix of environment variables overriding the logging resource.
pub const LOG_ENV_PREFIX: &str = "STYX_LOG_";

/// Log level configuration.
///
/// Accepts the usual lowercase names and, for resources carried over from
/// `java.util.logging` setups, the uppercase and JUL level names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level logging (most verbose)
    #[serde(alias = "TRACE", alias = "FINER", alias = "FINEST", alias = "ALL")]
    Trace,
    /// Debug level logging
    #[serde(alias = "DEBUG", alias = "FINE")]
    Debug,
    /// Info level logging (default)
    #[default]
    #[serde(alias = "INFO", alias = "CONFIG")]
    Info,
    /// Warning level logging
    #[serde(alias = "WARN", alias = "WARNING")]
    Warn,
    /// Error level logging
    #[serde(alias = "ERROR", alias = "SEVERE")]
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Output format of log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line compact records
    #[default]
    Compact,
    /// Full records including span context
    Full,
    /// Newline-delimited JSON (requires the `json-logs` feature)
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level
    pub level: LogLevel,
    /// Record format
    pub format: LogFormat,
    /// Colored output (ignored for JSON)
    pub ansi: bool,
    /// Include the record target
    pub target: bool,
    /// Include thread ids
    pub thread_ids: bool,
    /// Extra comma-separated filter directives, e.g. `hyper=warn,app=debug`
    pub directives: Option<String>,
    /// Log file path; records go to stderr when unset
    pub file: Option<PathBuf>,
    /// Maximum log file size in bytes before rotation
    pub max_file_size: Option<u64>,
    /// Number of rotated log files to keep
    pub max_files: Option<u32>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            ansi: false,
            target: true,
            thread_ids: false,
            directives: None,
            file: None,
            max_file_size: Some(100 * 1024 * 1024), // 100MB
            max_files: Some(5),
        }
    }
}

impl LogConfig {
    /// Load the configuration from a named resource.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Init` if the resource does not exist or cannot be
    /// read, and an `Error::Config` if its contents are invalid.
    pub fn from_resource(resources: &Resources, name: &str) -> Result<Self> {
        let contents = resources.read(name)?;
        let figment = Figment::from(Serialized::defaults(Self::default()));

        #[cfg(feature = "toml")]
        let figment = if name.ends_with(".toml") {
            use figment::providers::Format;
            figment.merge(figment::providers::Toml::string(&contents))
        } else {
            figment.merge(PropertiesProvider::new(name, &contents))
        };

        #[cfg(not(feature = "toml"))]
        let figment = figment.merge(PropertiesProvider::new(name, &contents));

        figment
            .merge(Env::prefixed(LOG_ENV_PREFIX))
            .extract::<Self>()
            .map_err(Error::from)?
            .validated()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Config` if the rotation settings are inconsistent.
    pub fn validated(self) -> Result<Self> {
        if self.max_file_size == Some(0) {
            return Err(Error::config("Maximum log file size must be greater than 0"));
        }
        if let Some(file) = &self.file {
            if file.as_os_str().is_empty() {
                return Err(Error::config("Log file path cannot be empty"));
            }
        }
        Ok(self)
    }

    /// Filter directives configured in addition to the level.
    pub fn extra_directives(&self) -> impl Iterator<Item = &str> {
        self.directives
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Figment provider for Java-properties style documents.
///
/// Supports `key=value`, `key: value` and `key value` entries, `#` and `!`
/// comment lines, and lines continued with a trailing backslash. Entries
/// with an empty value are skipped.
#[derive(Debug, Clone)]
pub struct PropertiesProvider {
    name: String,
    entries: Vec<(String, String)>,
}

impl PropertiesProvider {
    /// Parse `contents`, naming the source `name` in error messages.
    #[must_use]
    pub fn new(name: &str, contents: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: parse_properties(contents),
        }
    }

    /// Parsed entries in document order.
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl Provider for PropertiesProvider {
    fn metadata(&self) -> Metadata {
        Metadata::named(format!("properties resource {}", self.name))
    }

    fn data(&self) -> std::result::Result<Map<Profile, Dict>, figment::Error> {
        let mut dict = Dict::new();
        for (key, value) in &self.entries {
            if value.is_empty() {
                continue;
            }
            let parsed = value
                .parse::<Value>()
                .unwrap_or_else(|_| Value::from(value.clone()));
            dict.insert(key.clone(), parsed);
        }
        Ok(Profile::Default.collect(dict))
    }
}

fn parse_properties(contents: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut lines = contents.lines();

    while let Some(line) = lines.next() {
        let mut logical = line.trim_start().to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }
        while logical.ends_with('\\') {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let split = logical
            .find(['=', ':'])
            .or_else(|| logical.find(char::is_whitespace));
        let (key, value) = match split {
            Some(at) => (&logical[..at], &logical[at + 1..]),
            None => (logical.as_str(), ""),
        };
        entries.push((key.trim().to_string(), value.trim().to_string()));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.ansi);
        assert!(config.target);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(tracing::Level::from(LogLevel::Info), tracing::Level::INFO);
        assert_eq!(tracing::Level::from(LogLevel::Error), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_properties() {
        let entries = parse_properties(
            "# comment\n\
             ! also a comment\n\
             level = debug\n\
             format: json\n\
             file /var/log/app.log\n\
             directives=hyper=warn,\\\n    app=trace\n\
             flag\n",
        );
        assert_eq!(
            entries,
            vec![
                ("level".to_string(), "debug".to_string()),
                ("format".to_string(), "json".to_string()),
                ("file".to_string(), "/var/log/app.log".to_string()),
                ("directives".to_string(), "hyper=warn,app=trace".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_from_properties_resource() {
        let resources = Resources::empty().with_resource(
            "/app.logging.properties",
            "level=WARNING\nansi=true\nmax_files=3\ndirectives=app=debug, hyper=warn\nfile=\n",
        );
        let config = LogConfig::from_resource(&resources, "/app.logging.properties").unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(config.ansi);
        assert_eq!(config.max_files, Some(3));
        assert!(config.file.is_none());
        assert_eq!(
            config.extra_directives().collect::<Vec<_>>(),
            vec!["app=debug", "hyper=warn"]
        );
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let resources =
            Resources::empty().with_resource("/bad.properties", "level=loudest\n");
        let err = LogConfig::from_resource(&resources, "/bad.properties").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_file_size_rejected() {
        let config = LogConfig {
            max_file_size: Some(0),
            ..LogConfig::default()
        };
        assert!(config.validated().is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_from_toml_resource() {
        let resources = Resources::empty().with_resource(
            "/app.logging.toml",
            "level = \"debug\"\nformat = \"full\"\nthread_ids = true\n",
        );
        let config = LogConfig::from_resource(&resources, "/app.logging.toml").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Full);
        assert!(config.thread_ids);
    }
}
