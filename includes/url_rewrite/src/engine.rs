use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Local, TimeZone};

use super::chain::RewrittenUrl;
use super::conditions::context::RequestView;
use super::conf::Configuration;
use super::error::ConfError;
use super::rule::Dialect;
use super::source::{ConfSource, MemorySource};

#[inline]
fn millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// How often the engine checks its source for changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReloadInterval {
    #[default]
    Disabled,
    EveryRequest,
    Every(Duration),
}

impl ReloadInterval {
    /// Negative values disable reloading, zero checks on every request
    /// and positive values check at most once every `secs` seconds.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s < 0 => Self::Disabled,
            0 => Self::EveryRequest,
            s => Self::Every(Duration::from_secs(s as u64)),
        }
    }

    /// Interval in milliseconds, `None` when disabled.
    #[inline]
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Self::Disabled => None,
            Self::EveryRequest => Some(0),
            Self::Every(d) => Some(d.as_millis() as u64),
        }
    }
}

impl fmt::Display for ReloadInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::EveryRequest => f.write_str("every request"),
            Self::Every(d) => write!(f, "every {}s", d.as_secs()),
        }
    }
}

/// Configuration lifecycle manager.
///
/// Owns the active [`Configuration`] and swaps in a freshly compiled one
/// when its [`ConfSource`] changes. Requests only ever load the current
/// snapshot, so evaluation never waits on a reload.
///
/// # Example
///
/// ```
/// use url_rewrite::{Dialect, Engine, MemorySource, ReloadInterval, RequestCtx};
///
/// let source = MemorySource::new("inline", r#"
///   RewriteRule ^/file/(.*)$     /tmp/$1      [L]
///   RewriteRule ^/redirect/(.*)$ /location/$1 [R=302]
///   RewriteRule ^/blocked/(.*)$  -            [F]
/// "#);
/// let engine = Engine::new(source, Dialect::Directive, ReloadInterval::Disabled).init();
///
/// let request = RequestCtx::new("/file/my/document.txt");
/// let result = engine.process(&request).expect("rule matched");
/// assert_eq!(result.target(), "/tmp/my/document.txt");
/// ```
#[derive(Debug)]
pub struct Engine {
    source: Box<dyn ConfSource>,
    dialect: Dialect,
    interval: ReloadInterval,
    active: ArcSwapOption<Configuration>,
    last_loaded: ArcSwapOption<Configuration>,
    last_check: AtomicU64,
    last_load: AtomicU64,
    in_progress: AtomicBool,
}

impl Engine {
    /// Build an engine without loading anything yet.
    pub fn new<S: ConfSource + 'static>(
        source: S,
        dialect: Dialect,
        interval: ReloadInterval,
    ) -> Self {
        Self {
            source: Box::new(source),
            dialect,
            interval,
            active: ArcSwapOption::empty(),
            last_loaded: ArcSwapOption::empty(),
            last_check: AtomicU64::new(0),
            last_load: AtomicU64::new(0),
            in_progress: AtomicBool::new(false),
        }
    }

    /// Build an engine serving a fixed in-memory document.
    pub fn from_rules(rules: &str, dialect: Dialect) -> Self {
        Self::new(
            MemorySource::new("inline", rules),
            dialect,
            ReloadInterval::Disabled,
        )
        .init()
    }

    /// Perform the initial load.
    pub fn init(self) -> Self {
        self.reload(SystemTime::now());
        self
    }

    #[inline]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[inline]
    pub fn interval(&self) -> ReloadInterval {
        self.interval
    }

    /// Currently active configuration, if any
    #[inline]
    pub fn active(&self) -> Option<Arc<Configuration>> {
        self.active.load_full()
    }

    /// Most recently compiled configuration, even if it was rejected
    #[inline]
    pub fn last_loaded(&self) -> Option<Arc<Configuration>> {
        self.last_loaded.load_full()
    }

    #[inline]
    fn check_due(&self, now: u64) -> bool {
        match self.interval.as_millis() {
            None => false,
            Some(interval) => now.saturating_sub(self.last_check.load(Ordering::Acquire)) >= interval,
        }
    }

    /// Decide whether the source has to be recompiled.
    ///
    /// Returns false when reloading is disabled, a reload is already
    /// running, the interval has not elapsed yet or the source has not
    /// been modified since the last load.
    pub fn should_reload(&self, now: SystemTime) -> bool {
        self.check_due(millis(now)) && self.source_changed()
    }

    fn source_changed(&self) -> bool {
        if self.in_progress.load(Ordering::Acquire) {
            return false;
        }
        match self.source.last_modified() {
            Some(modified) => millis(modified) > self.last_load.load(Ordering::Acquire),
            None => false,
        }
    }

    /// Check the source and reload it when required.
    ///
    /// Returns true when a new configuration was activated.
    pub fn poll(&self, now: SystemTime) -> bool {
        let Some(interval) = self.interval.as_millis() else {
            return false;
        };
        let stamp = millis(now);
        let previous = self.last_check.load(Ordering::Acquire);
        if stamp.saturating_sub(previous) < interval {
            return false;
        }
        // only the caller claiming this check slot inspects the source
        if self
            .last_check
            .compare_exchange(previous, stamp, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
            || !self.source_changed()
        {
            return false;
        }
        tracing::debug!(source = self.source.identifier(), "configuration changed");
        self.reload(now)
    }

    /// Recompile the source and swap the result in.
    ///
    /// Does nothing when another reload is in progress. A configuration
    /// that is not ok is kept for diagnostics but not activated, and the
    /// engine stops rewriting until a good configuration is loaded.
    /// Returns true when a new configuration was activated.
    pub fn reload(&self, now: SystemTime) -> bool {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("reload already in progress");
            return false;
        }
        let activated = self.load(now);
        self.in_progress.store(false, Ordering::Release);
        activated
    }

    fn load(&self, now: SystemTime) -> bool {
        let identifier = self.source.identifier();
        let modified = self.source.last_modified();
        let conf = match self.source.read() {
            Ok(text) => {
                self.last_load.store(millis(now), Ordering::Release);
                Configuration::compile(&text, self.dialect)
            }
            Err(err) => {
                tracing::error!(source = identifier, "{err}");
                Configuration::new(Vec::new(), false, vec![ConfError::Source(err)])
            }
        };
        let conf = Arc::new(conf.with_source(identifier, modified));
        self.last_loaded.store(Some(Arc::clone(&conf)));

        if !conf.is_ok() {
            tracing::error!(
                source = identifier,
                errors = conf.errors().len(),
                "configuration rejected, rewriting disabled"
            );
            self.active.store(None);
            return false;
        }
        tracing::info!(
            source = identifier,
            rules = conf.rules().len(),
            "loaded rewrite configuration"
        );
        self.active.store(Some(conf));
        true
    }

    /// Evaluate a request against the active configuration.
    ///
    /// Polls the source first. Returns `None` when nothing is loaded or
    /// no rule matched.
    pub fn process(&self, view: &dyn RequestView) -> Option<RewrittenUrl> {
        self.poll(SystemTime::now());
        let active = self.active.load();
        let result = active.as_ref()?.process(view);
        if let Some(result) = result.as_ref() {
            tracing::debug!(path = view.path(), "rewrite: {result}");
        }
        result
    }

    /// Drop every loaded configuration.
    pub fn shutdown(&self) {
        self.active.store(None);
        self.last_loaded.store(None);
        tracing::info!(source = self.source.identifier(), "rewrite engine shut down");
    }

    /// Snapshot of the engine state for operators.
    pub fn status(&self) -> Status {
        let time = |stamp: u64| match stamp {
            0 => None,
            ms => Local.timestamp_millis_opt(ms as i64).single(),
        };
        let last = self.last_loaded.load_full();
        Status {
            source: self.source.identifier().to_owned(),
            dialect: self.dialect,
            interval: self.interval,
            active: self.active.load().is_some(),
            ok: last.as_ref().is_some_and(|c| c.is_ok()),
            enabled: last.as_ref().is_some_and(|c| c.is_enabled()),
            rules: last.as_ref().map(|c| c.rules().len()).unwrap_or_default(),
            errors: last
                .as_ref()
                .map(|c| c.errors().iter().map(|e| report(e)).collect())
                .unwrap_or_default(),
            last_check: time(self.last_check.load(Ordering::Acquire)),
            last_load: time(self.last_load.load(Ordering::Acquire)),
        }
    }
}

/// Render an error along with its chain of causes.
fn report(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Operator facing report produced by [`Engine::status`].
#[derive(Clone, Debug)]
pub struct Status {
    pub source: String,
    pub dialect: Dialect,
    pub interval: ReloadInterval,
    pub active: bool,
    pub ok: bool,
    pub enabled: bool,
    pub rules: usize,
    pub errors: Vec<String>,
    pub last_check: Option<DateTime<Local>>,
    pub last_load: Option<DateTime<Local>>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = |t: &Option<DateTime<Local>>| match t {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "never".to_owned(),
        };
        writeln!(f, "source:      {} ({})", self.source, self.dialect)?;
        writeln!(f, "active:      {}", self.active)?;
        writeln!(f, "ok:          {}", self.ok)?;
        writeln!(f, "enabled:     {}", self.enabled)?;
        writeln!(f, "rules:       {}", self.rules)?;
        writeln!(f, "reload:      {}", self.interval)?;
        writeln!(f, "last check:  {}", time(&self.last_check))?;
        writeln!(f, "last load:   {}", time(&self.last_load))?;
        for err in self.errors.iter() {
            writeln!(f, "error:       {err}")?;
        }
        Ok(())
    }
}
