use std::{path::Path, str::FromStr, sync::Arc};

use crate::{
    core::{
        cli,
        configuration::{self, Configuration, RewriteConfiguration},
    },
    net::http_adapter::HttpAdapter,
};
use clap::Parser;
use url_rewrite::{Dialect, FileSource, MemorySource, ReloadInterval, Status};

const DEFAULT_CONFIGURATION: &str = "config.yaml";

/// boot up the application kernel
/// ``` rust,ignore
/// let krn = kernel::boot().await?;
/// ```
pub async fn boot() -> std::io::Result<Kernel> {
    let cli = cli::Cli::parse();
    let path = cli
        .configuration_path
        .unwrap_or_else(|| DEFAULT_CONFIGURATION.to_string());

    let conf = configuration::load_configuration(&path)
        .await
        .map_err(std::io::Error::other)?;
    tracing::info!(%path, "configuration loaded");

    Ok(Kernel::new(conf).check_only_mode(cli.check))
}

/// The application kernel, responsible for managing the application's lifecycle and providing access to its core components.
pub struct Kernel {
    configuration: Configuration,
    check: bool,
}

impl Kernel {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            check: false,
        }
    }

    fn check_only_mode(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    #[inline]
    pub fn check_only(&self) -> bool {
        self.check
    }

    /// Compile the configured rewrite source once and report on it.
    pub fn check(&self) -> std::io::Result<Status> {
        let engine = self.rewrite_engine()?;
        let status = engine.status();
        engine.shutdown();
        Ok(status)
    }

    pub fn setup_http_adapter(&self) -> std::io::Result<HttpAdapter<'_>> {
        let engine = actix_rewrite::Engine::new(Arc::new(self.rewrite_engine()?));
        let engine = match self.document_root() {
            Some(root) => engine.document_root(root),
            None => engine,
        };
        Ok(HttpAdapter::new(&self.configuration, engine))
    }

    fn document_root(&self) -> Option<&str> {
        self.configuration
            .rewrite
            .as_ref()
            .and_then(|r| r.document_root.as_deref())
            .or_else(|| {
                self.configuration
                    .static_files
                    .as_ref()
                    .and_then(|s| s.get_path())
            })
    }

    /// Build the rewrite engine described by the `rewrite` section.
    ///
    /// Without a section the engine serves an empty rule-set.
    pub fn rewrite_engine(&self) -> std::io::Result<url_rewrite::Engine> {
        let conf = self.configuration.rewrite.clone().unwrap_or_default();
        let dialect = resolve_dialect(&conf)?;
        let interval = conf
            .reload_interval
            .map(ReloadInterval::from_secs)
            .unwrap_or(ReloadInterval::Disabled);

        let engine = match (conf.path.as_ref(), conf.rules.as_ref()) {
            (Some(path), _) => url_rewrite::Engine::new(FileSource::new(path), dialect, interval),
            (None, rules) => url_rewrite::Engine::new(
                MemorySource::new("inline", rules.map(String::as_str).unwrap_or_default()),
                dialect,
                ReloadInterval::Disabled,
            ),
        };
        Ok(engine.init())
    }
}

fn resolve_dialect(conf: &RewriteConfiguration) -> std::io::Result<Dialect> {
    match (conf.dialect.as_deref(), conf.path.as_deref()) {
        (Some(name), _) => Dialect::from_str(name)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err)),
        (None, Some(path)) => Ok(url_rewrite::dialect_for(Path::new(path))),
        (None, None) => Ok(Dialect::Directive),
    }
}

#[cfg(test)]
pub mod test {
    use assertables::*;

    use super::*;
    use crate::core::configuration::parse_configuration;

    fn kernel(yaml: &str) -> Kernel {
        Kernel::new(parse_configuration(Path::new("hub.yaml"), yaml).unwrap())
    }

    #[test]
    fn test_inline_rules() {
        let krn = kernel("rewrite:\n  rules: \"RewriteRule ^/a$ /b [L]\"\n");
        let status = krn.check().unwrap();
        assert!(status.ok);
        assert_eq!(status.rules, 1);
        assert_eq!(status.interval, ReloadInterval::Disabled);
    }

    #[test]
    fn test_invalid_rules() {
        let krn = kernel("rewrite:\n  rules: \"RewriteRule\"\n");
        let status = krn.check().unwrap();
        assert!(!status.ok);
        assert_not_empty!(status.errors);
    }

    #[test]
    fn test_dialect() {
        let conf = RewriteConfiguration {
            path: Some("rules.yml".into()),
            ..Default::default()
        };
        assert_eq!(resolve_dialect(&conf).unwrap(), Dialect::Declarative);

        let conf = RewriteConfiguration {
            dialect: Some("mod_rewrite".into()),
            ..conf
        };
        assert_eq!(resolve_dialect(&conf).unwrap(), Dialect::Directive);

        let conf = RewriteConfiguration {
            dialect: Some("xml".into()),
            ..conf
        };
        assert_err!(resolve_dialect(&conf));
    }

    #[test]
    fn test_sample_rules() {
        let krn = kernel("rewrite:\n  path: rewrite.conf\n  reload_interval: 10\n");
        let status = krn.check().unwrap();
        assert!(status.ok, "{status}");
        assert_gt!(status.rules, 0);
    }
}
