//! Compiled match patterns shared by [`Rule`](crate::Rule) and
//! [`Condition`](crate::Condition) definitions.
//!
//! Patterns are compiled once when a [`Configuration`](crate::Configuration)
//! is built and only ever borrowed afterwards. Matching allocates its own
//! capture slots so the same pattern can be evaluated from any number of
//! threads at once.

use regex_automata::{
    MatchKind,
    meta::{self, Regex},
    util,
};

use super::error::PatternError;

/// Characters escaped when translating a wildcard into a regular expression.
const META: &[char] = &[
    '\\', '.', '+', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

/// Translate a wildcard expression into an anchored regular expression.
///
/// `**` matches anything (including `/`), `*` matches anything up to the
/// next `/`. Every wildcard becomes a capture group so back-references
/// work the same way as with regular expression rules.
pub fn wildcard_to_regex(wildcard: &str) -> String {
    let mut regex = String::with_capacity(wildcard.len() + 8);
    regex.push('^');
    let mut chars = wildcard.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                regex.push_str("(.*)");
            }
            '*' => regex.push_str("([^/]*)"),
            c if META.contains(&c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }
    regex.push('$');
    regex
}

/// Result of a successful [`Pattern::captures`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    whole: String,
    groups: Vec<String>,
}

impl MatchResult {
    /// Entire matched text (group zero).
    #[inline]
    pub fn whole(&self) -> &str {
        &self.whole
    }

    /// Captured groups in order, starting with group one.
    ///
    /// Groups that did not participate in the match are empty strings.
    #[inline]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    #[inline]
    pub(crate) fn into_parts(self) -> (String, Vec<String>) {
        (self.whole, self.groups)
    }
}

/// A single compiled regular expression.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a regular expression.
    pub fn compile(pattern: &str, case_sensitive: bool) -> Result<Self, PatternError> {
        Self::build(pattern, pattern, case_sensitive)
    }

    /// Compile a wildcard expression.
    ///
    /// See [`wildcard_to_regex`] for the translation rules.
    pub fn wildcard(pattern: &str, case_sensitive: bool) -> Result<Self, PatternError> {
        Self::build(pattern, &wildcard_to_regex(pattern), case_sensitive)
    }

    fn build(source: &str, regex: &str, case_sensitive: bool) -> Result<Self, PatternError> {
        let regex = Regex::builder()
            .configure(
                meta::Config::new()
                    .nfa_size_limit(Some(10 * (1 << 20)))
                    .hybrid_cache_capacity(2 * (1 << 20))
                    .match_kind(MatchKind::LeftmostFirst)
                    .utf8_empty(true),
            )
            .syntax(util::syntax::Config::new().case_insensitive(!case_sensitive))
            .build(regex)
            .map_err(|err| PatternError::InvalidRegex(format!("{source}: {err}")))?;
        Ok(Self {
            source: source.to_owned(),
            regex,
        })
    }

    /// Pattern text as it was written in the configuration.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether the pattern matches anywhere in `input`.
    #[inline]
    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    /// Match `input` and collect the captured groups.
    pub fn captures(&self, input: &str) -> Option<MatchResult> {
        let mut caps = self.regex.create_captures();
        self.regex.captures(input, &mut caps);
        if !caps.is_match() {
            return None;
        }
        let whole = caps
            .get_group(0)
            .map(|span| input[span].to_owned())
            .unwrap_or_default();
        let groups = (1..caps.group_len())
            .map(|index| {
                caps.get_group(index)
                    .map(|span| input[span].to_owned())
                    .unwrap_or_default()
            })
            .collect();
        Some(MatchResult { whole, groups })
    }
}
