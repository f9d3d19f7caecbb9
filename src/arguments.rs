//! Layered option lookup: command line, then properties, then environment.
//!
//! For prefix `app` and option `some-argument`:
//!
//! * command line argument: `-some-argument=value`
//! * property: `app.some.argument=value`
//! * environment variable: `APP_SOME_ARGUMENT=value`
//!
//! ```no_run
//! use styx_daemon::Arguments;
//!
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let arguments = Arguments::new("app", args);
//! let host = arguments.get_string("host").unwrap_or_else(|| "localhost".into());
//! let port = arguments.get_integer("port")?.unwrap_or(8080);
//! # Ok::<(), styx_daemon::Error>(())
//! ```
//!
//! Properties stand in for host system properties: a process-wide
//! [`Properties::system`] registry, filled programmatically or from
//! `-Dkey=value` arguments.

use figment::value::{Dict, Map, Value};
use figment::{Figment, Metadata, Profile, Provider};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tracing::warn;

use crate::error::{Error, ErrorCode, Result};

/// A key/value lookup backing one layer of [`Arguments`].
pub trait Source: Send + Sync {
    /// Look up a single key.
    fn get(&self, key: &str) -> Option<String>;

    /// All entries of this source.
    fn entries(&self) -> Vec<(String, String)>;
}

/// The environment of the current process.
///
/// Variables whose name or value is not valid UTF-8 are skipped with a
/// warning, so lookup falls through to the next layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Source for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        let value = std::env::var_os(key)?;
        utf8_or_warn(key, value)
    }

    fn entries(&self) -> Vec<(String, String)> {
        std::env::vars_os()
            .filter_map(|(key, value)| match key.into_string() {
                Ok(key) => utf8_or_warn(&key, value).map(|value| (key, value)),
                Err(key) => {
                    warn!(variable = ?key, "Ignoring environment variable with non-UTF-8 name");
                    None
                }
            })
            .collect()
    }
}

fn utf8_or_warn(key: &str, value: OsString) -> Option<String> {
    value
        .into_string()
        .map_err(|value| {
            warn!(variable = key, value = ?value, "Ignoring non-UTF-8 environment value");
        })
        .ok()
}

impl Source for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// A thread-safe property map.
#[derive(Debug, Default)]
pub struct Properties {
    values: RwLock<HashMap<String, String>>,
}

static SYSTEM_PROPERTIES: LazyLock<Properties> = LazyLock::new(Properties::new);

impl Properties {
    /// Create an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide properties.
    #[must_use]
    pub fn system() -> &'static Self {
        &SYSTEM_PROPERTIES
    }

    /// Get a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Set a property, returning the previous value.
    pub fn set<K: Into<String>, V: Into<String>>(&self, key: K, value: V) -> Option<String> {
        self.values.write().insert(key.into(), value.into())
    }

    /// Remove a property, returning its value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }

    /// Absorb `-Dkey=value` arguments. A bare `-Dkey` sets an empty value.
    ///
    /// Returns the number of properties set.
    pub fn load_args<I, S>(&self, args: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = self.values.write();
        let mut count = 0;
        for arg in args {
            let Some(definition) = arg.as_ref().strip_prefix("-D") else {
                continue;
            };
            let (key, value) = definition.split_once('=').unwrap_or((definition, ""));
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), value.to_string());
            count += 1;
        }
        count
    }
}

impl Source for Properties {
    fn get(&self, key: &str) -> Option<String> {
        Self::get(self, key)
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Source for &'static Properties {
    fn get(&self, key: &str) -> Option<String> {
        Properties::get(self, key)
    }

    fn entries(&self) -> Vec<(String, String)> {
        Source::entries(*self)
    }
}

/// Resolves named options from arguments, properties and environment.
#[derive(Clone)]
pub struct Arguments {
    prefix: String,
    args: Vec<String>,
    properties: Arc<dyn Source>,
    env: Arc<dyn Source>,
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("prefix", &self.prefix)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl Arguments {
    /// Create a resolver over `args`, the system properties and the process
    /// environment.
    pub fn new<P, I, S>(prefix: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            args: args.into_iter().map(Into::into).collect(),
            properties: Arc::new(Properties::system()),
            env: Arc::new(ProcessEnv),
        }
    }

    /// Use `properties` instead of the system properties.
    #[must_use]
    pub fn with_properties<S: Source + 'static>(mut self, properties: S) -> Self {
        self.properties = Arc::new(properties);
        self
    }

    /// Use `env` instead of the process environment.
    #[must_use]
    pub fn with_env<S: Source + 'static>(mut self, env: S) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// The prefix used for properties and environment variables.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Property key for `name`: `<prefix>.<name>` with dashes as dots.
    #[must_use]
    pub fn property_key(&self, name: &str) -> String {
        format!("{}-{name}", self.prefix).replace('-', ".")
    }

    /// Environment variable for `name`: `<PREFIX>_<NAME>` with dashes as
    /// underscores.
    #[must_use]
    pub fn env_key(&self, name: &str) -> String {
        format!("{}-{name}", self.prefix)
            .replace('-', "_")
            .to_uppercase()
    }

    /// Resolve `name` as a raw string.
    #[must_use]
    pub fn get_string(&self, name: &str) -> Option<String> {
        let flag = format!("-{name}=");
        if let Some(value) = self.args.iter().find_map(|arg| arg.strip_prefix(&flag)) {
            return Some(value.to_string());
        }
        self.properties
            .get(&self.property_key(name))
            .or_else(|| self.env.get(&self.env_key(name)))
    }

    /// Resolve `name` as a boolean: `true` iff the value is `true` in any case.
    #[must_use]
    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        self.get_string(name)
            .map(|value| value.eq_ignore_ascii_case("true"))
    }

    /// Resolve `name` as a 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Config` with code `ConfigTypeMismatch` if the
    /// resolved value is not a valid integer.
    pub fn get_integer(&self, name: &str) -> Result<Option<i32>> {
        self.get_parsed(name)
    }

    /// Resolve `name` as a path.
    #[must_use]
    pub fn get_path(&self, name: &str) -> Option<PathBuf> {
        self.get_string(name).map(PathBuf::from)
    }

    /// Resolve `name` and parse it with [`FromStr`].
    ///
    /// # Errors
    ///
    /// Returns an `Error::Config` with code `ConfigTypeMismatch` if parsing
    /// fails.
    pub fn get_parsed<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get_string(name)
            .map(|value| {
                value.parse::<T>().map_err(|e| {
                    Error::config_with_source(
                        ErrorCode::ConfigTypeMismatch,
                        format!(
                            "Invalid value '{value}' for option '{name}' (expected {})",
                            std::any::type_name::<T>()
                        ),
                        e,
                    )
                })
            })
            .transpose()
    }

    /// Extract a settings struct from all layers.
    ///
    /// Field names are the dashed option names, so structs usually carry
    /// `#[serde(rename_all = "kebab-case")]`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Config` if a required field is missing or a value
    /// has the wrong type.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        Figment::from(self.clone()).extract().map_err(Error::from)
    }

    fn collect(&self) -> Dict {
        let mut dict = Dict::new();

        let env_prefix = self.env_key("");
        for (key, value) in self.env.entries() {
            if let Some(name) = key.strip_prefix(&env_prefix) {
                if !name.is_empty() {
                    dict.insert(name.to_lowercase().replace('_', "-"), parse_value(&value));
                }
            }
        }

        let property_prefix = format!("{}.", self.prefix.replace('-', "."));
        for (key, value) in self.properties.entries() {
            if let Some(name) = key.strip_prefix(&property_prefix) {
                if !name.is_empty() {
                    dict.insert(name.replace('.', "-"), parse_value(&value));
                }
            }
        }

        // First occurrence on the command line wins
        for arg in self.args.iter().rev() {
            let Some((name, value)) = arg.strip_prefix('-').and_then(|a| a.split_once('=')) else {
                continue;
            };
            if !name.is_empty() {
                dict.insert(name.to_string(), parse_value(value));
            }
        }

        dict
    }
}

fn parse_value(raw: &str) -> Value {
    raw.parse::<Value>()
        .unwrap_or_else(|_| Value::from(raw.to_string()))
}

impl Provider for Arguments {
    fn metadata(&self) -> Metadata {
        Metadata::named(format!("arguments (prefix '{}')", self.prefix))
    }

    fn data(&self) -> std::result::Result<Map<Profile, Dict>, figment::Error> {
        Ok(Profile::Default.collect(self.collect()))
    }
}
