//! Configuration sources read by the [`Engine`](crate::Engine).

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use arc_swap::{ArcSwap, ArcSwapOption};

use super::error::SourceError;
use super::rule::Dialect;

/// Raw configuration document plus the metadata needed to decide when
/// it has to be recompiled.
pub trait ConfSource: fmt::Debug + Send + Sync {
    /// Human readable identifier, e.g. a file path
    fn identifier(&self) -> &str;

    /// Last modification time, if known
    fn last_modified(&self) -> Option<SystemTime>;

    /// Read the entire document
    fn read(&self) -> Result<String, SourceError>;
}

/// Guess the dialect of a document from its file extension.
///
/// `.yaml` and `.yml` are declarative, everything else is directive.
pub fn dialect_for(path: &Path) -> Dialect {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Dialect::Declarative,
        _ => Dialect::Directive,
    }
}

/// Configuration stored in a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    identifier: String,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let identifier = path.display().to_string();
        Self { path, identifier }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfSource for FileSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn last_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    fn read(&self) -> Result<String, SourceError> {
        let bytes =
            std::fs::read(&self.path).map_err(|e| SourceError::Io(self.identifier.clone(), e))?;
        String::from_utf8(bytes).map_err(|_| SourceError::Encoding(self.identifier.clone()))
    }
}

/// Configuration held in memory.
///
/// The document and its modification time can be replaced at runtime,
/// which makes it usable for inline rules and for exercising reloads.
#[derive(Debug)]
pub struct MemorySource {
    identifier: String,
    text: ArcSwap<String>,
    modified: ArcSwapOption<SystemTime>,
}

impl MemorySource {
    pub fn new(identifier: &str, text: &str) -> Self {
        Self {
            identifier: identifier.to_owned(),
            text: ArcSwap::from_pointee(text.to_owned()),
            modified: ArcSwapOption::from_pointee(SystemTime::now()),
        }
    }

    /// Pin the reported modification time.
    pub fn modified(self, modified: SystemTime) -> Self {
        self.modified.store(Some(Arc::new(modified)));
        self
    }

    /// Replace the document and bump its modification time.
    pub fn update(&self, text: &str, modified: SystemTime) {
        self.text.store(Arc::new(text.to_owned()));
        self.modified.store(Some(Arc::new(modified)));
    }
}

impl ConfSource for MemorySource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.modified.load().as_deref().copied()
    }

    fn read(&self) -> Result<String, SourceError> {
        Ok(String::clone(&self.text.load()))
    }
}

impl<S: ConfSource + ?Sized> ConfSource for Arc<S> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn last_modified(&self) -> Option<SystemTime> {
        (**self).last_modified()
    }

    fn read(&self) -> Result<String, SourceError> {
        (**self).read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source() {
        let source = FileSource::new("Cargo.toml");
        assert_eq!(source.identifier(), "Cargo.toml");
        assert!(source.last_modified().is_some());
        assert!(source.read().unwrap().contains("url_rewrite"));

        let missing = FileSource::new("does-not-exist.conf");
        assert_eq!(missing.last_modified(), None);
        assert!(matches!(missing.read(), Err(SourceError::Io(..))));
    }

    #[test]
    fn test_memory_source() {
        let then = SystemTime::UNIX_EPOCH;
        let source = MemorySource::new("inline", "RewriteEngine on").modified(then);
        assert_eq!(source.last_modified(), Some(then));
        assert_eq!(source.read().unwrap(), "RewriteEngine on");

        let later = then + std::time::Duration::from_secs(5);
        source.update("RewriteEngine off", later);
        assert_eq!(source.last_modified(), Some(later));
        assert_eq!(source.read().unwrap(), "RewriteEngine off");
    }

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for(Path::new("rules.yaml")), Dialect::Declarative);
        assert_eq!(dialect_for(Path::new("rules.yml")), Dialect::Declarative);
        assert_eq!(dialect_for(Path::new(".htaccess")), Dialect::Directive);
    }
}
