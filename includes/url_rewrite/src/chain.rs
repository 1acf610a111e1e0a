//! Rule chain evaluation.
//!
//! Rules are attempted in declared order. A matching forward rule
//! hands its rewritten url to the next rule unless it is terminal,
//! while a redirect or status decision always ends the chain.

use std::fmt;

use super::conditions::context::RequestView;
use super::conf::Configuration;

/// Resolved action of a [`RewrittenUrl`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Internally dispatch the request to the new target.
    Forward,
    /// Send a redirect with the given status code.
    Redirect(u16),
    /// Respond immediately with the given status code.
    Status(u16),
}

impl Action {
    /// Status code attached to the action, if any
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Forward => None,
            Self::Redirect(status) | Self::Status(status) => Some(*status),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Redirect(status) => write!(f, "redirect {status}"),
            Self::Status(status) => write!(f, "status {status}"),
        }
    }
}

/// Rewrite decision produced for a single request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewrittenUrl {
    target: String,
    action: Action,
    terminal: bool,
}

impl RewrittenUrl {
    pub(crate) fn new(target: String, action: Action, terminal: bool) -> Self {
        Self {
            target,
            action,
            terminal,
        }
    }

    /// Fully substituted destination including its query string
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns true when the rule that produced the decision was terminal
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Returns true when the request should continue down the pipeline
    /// using [`RewrittenUrl::target`] rather than being answered here.
    #[inline]
    pub fn continues_pipeline(&self) -> bool {
        matches!(self.action, Action::Forward)
    }

    #[inline]
    pub fn into_target(self) -> String {
        self.target
    }
}

impl fmt::Display for RewrittenUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.target)
    }
}

/// Walk the configured rules for one request.
///
/// Returns `None` when the configuration is disabled or no rule matched.
pub fn process(conf: &Configuration, view: &dyn RequestView) -> Option<RewrittenUrl> {
    if !conf.is_enabled() {
        return None;
    }
    let mut url = match view.query_string().filter(|q| !q.is_empty()) {
        Some(query) => format!("{}?{query}", view.path()),
        None => view.path().to_owned(),
    };
    let mut result = None;
    for (index, rule) in conf.rules().iter().enumerate() {
        let Some(rewritten) = rule.try_match(view, &url) else {
            continue;
        };
        tracing::trace!(rule = index, %url, decision = %rewritten, "rule matched");
        if rewritten.is_terminal() || !rewritten.continues_pipeline() {
            return Some(rewritten);
        }
        url = rewritten.target().to_owned();
        result = Some(rewritten);
    }
    result
}
