//! Named configuration resources.
//!
//! Resources are looked up by absolute names such as
//! `/styx.logging.properties`. A [`Resources`] set holds documents embedded
//! in the binary and, optionally, directories searched on the filesystem.
//! Filesystem roots take precedence over embedded documents, in the order
//! they were added.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::logging::DEFAULT_LOGGING_RESOURCE;

const PACKAGED: &[(&str, &str)] = &[(
    DEFAULT_LOGGING_RESOURCE,
    include_str!("../resources/styx.logging.properties"),
)];

/// A set of named resources.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    embedded: BTreeMap<String, Cow<'static, str>>,
    roots: Vec<PathBuf>,
}

impl Resources {
    /// Resources packaged with this crate.
    #[must_use]
    pub fn packaged() -> Self {
        let embedded = PACKAGED
            .iter()
            .map(|(name, contents)| ((*name).to_string(), Cow::Borrowed(*contents)))
            .collect();
        Self {
            embedded,
            roots: Vec::new(),
        }
    }

    /// An empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Search `dir` before the embedded documents.
    #[must_use]
    pub fn with_root<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.roots.push(dir.into());
        self
    }

    /// Embed a document under `name`, replacing any existing one.
    #[must_use]
    pub fn with_resource<N, C>(mut self, name: N, contents: C) -> Self
    where
        N: AsRef<str>,
        C: Into<Cow<'static, str>>,
    {
        self.embedded
            .insert(normalize(name.as_ref()), contents.into());
        self
    }

    /// Whether `name` resolves to a document.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.locate(name).is_some() || self.embedded.contains_key(&normalize(name))
    }

    /// Read the document named `name`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Init` with code `ResourceNotFound` if no root and
    /// no embedded document provides `name`, or with code `LoggingInit` if
    /// the file exists but cannot be read.
    pub fn read(&self, name: &str) -> Result<Cow<'static, str>> {
        if let Some(path) = self.locate(name) {
            debug!(resource = name, path = %path.display(), "Reading resource from filesystem");
            return std::fs::read_to_string(&path).map(Cow::Owned).map_err(|e| {
                Error::init_with_source(
                    format!("Failed to read resource {name} from {}", path.display()),
                    e,
                )
            });
        }

        self.embedded
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| Error::resource_not_found(name))
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || relative.as_os_str().is_empty() {
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(relative))
            .find(|path| path.is_file())
    }
}

fn normalize(name: &str) -> String {
    format!("/{}", name.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_packaged_contains_default_logging() {
        let resources = Resources::packaged();
        assert!(resources.contains(DEFAULT_LOGGING_RESOURCE));
        assert!(resources.contains("styx.logging.properties"));
        let text = resources.read(DEFAULT_LOGGING_RESOURCE).unwrap();
        assert!(text.contains("level=info"));
    }

    #[test]
    fn test_missing_resource() {
        let err = Resources::packaged().read("/nope.properties").unwrap_err();
        assert!(err.is_init_error());
        assert_eq!(err.code(), ErrorCode::ResourceNotFound);
    }

    #[test]
    fn test_root_overrides_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("styx.logging.properties"), "level=debug\n").unwrap();

        let resources = Resources::packaged().with_root(dir.path());
        let text = resources.read(DEFAULT_LOGGING_RESOURCE).unwrap();
        assert_eq!(text, "level=debug\n");
    }

    #[test]
    fn test_names_cannot_escape_roots() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("conf");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("secret.properties"), "x=1\n").unwrap();

        let resources = Resources::empty().with_root(&nested);
        assert!(!resources.contains("/../secret.properties"));
        assert!(resources.read("/../secret.properties").is_err());
    }
}
