use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use super::chain::{Action, RewrittenUrl};
use super::conditions::{Condition, ConditionType, context::RequestView, tokenize};
use super::error::RuleError;
use super::extra::{join_query, split_query, strip_query};
use super::pattern::Pattern;

// https://url.spec.whatwg.org/#percent-encoded-bytes
const ESCAPE: &AsciiSet = &CONTROLS
    .add(b'~')
    .add(b' ') // fragment encoding
    .add(b'\'')
    .add(b'"')
    .add(b'`')
    .add(b'#') // query encoding
    .add(b'<')
    .add(b'>')
    .add(b'?') // path encoding
    .add(b'^')
    .add(b'{')
    .add(b'}')
    .add(b'/') // user-info encoding
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b'$') // component encoding
    .add(b'&')
    .add(b'+')
    .add(b',');

// characters that can never appear unescaped in a request target
const UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'#');

/// Configuration format a [`Rule`] was compiled from.
///
/// Directive rules match the path only and pass the request query
/// string through when the target carries none.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    Directive,
    Declarative,
}

/// Outcome type of a matching [`Rule`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RuleType {
    #[default]
    Forward,
    Redirect(u16),
    Status(u16),
}

impl RuleType {
    pub const TEMPORARY: Self = Self::Redirect(302);
    pub const PERMANENT: Self = Self::Redirect(301);

    #[inline]
    fn action(&self) -> Action {
        match self {
            Self::Forward => Action::Forward,
            Self::Redirect(status) => Action::Redirect(*status),
            Self::Status(status) => Action::Status(*status),
        }
    }
}

/// Piece of a compiled rule target.
#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Literal(String),
    Capture(usize),
    Variable(ConditionType),
}

/// Split a target template into literals, back-references and
/// `%{VARIABLE}` expansions.
fn compile_target(target: &str) -> Result<Vec<Segment>, RuleError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = target.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|(_, n)| *n);
        match (c, next) {
            ('\\', Some(n @ ('$' | '%'))) => {
                chars.next();
                literal.push(n);
            }
            ('$' | '%', Some(n)) if n.is_ascii_digit() => {
                chars.next();
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Capture(n as usize - '0' as usize));
            }
            ('%', Some('{')) => match target[i..].find('}') {
                Some(end) => {
                    let kind = ConditionType::from_variable(&target[i + 2..i + end])?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(kind));
                    while chars.next_if(|(j, _)| *j <= i + end).is_some() {}
                }
                None => literal.push(c),
            },
            (c, _) => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Singular rewrite rule.
///
/// It contains a pattern to match against the request url, a target
/// template that expands into the new url, the conditions guarding it
/// and additional flags that define how the rule behaves within the
/// rule chain.
///
/// Supports a subset of [offical](https://httpd.apache.org/docs/current/mod/mod_rewrite.html#rewriterule)
/// mod_rewrite rules.
#[derive(Clone, Debug)]
pub struct Rule {
    name: Option<String>,
    note: Option<String>,
    pattern: Pattern,
    target: String,
    segments: Vec<Segment>,
    rule_type: RuleType,
    conditions: Vec<Condition>,
    dialect: Dialect,
    match_query: bool,
    terminal: bool,
    qs_append: bool,
    qs_discard: bool,
    escape_backrefs: bool,
    no_escape: bool,
    enabled: bool,
}

impl Rule {
    /// Build a new forward rule from a compiled pattern and target.
    pub fn new(pattern: Pattern, target: &str, dialect: Dialect) -> Result<Self, RuleError> {
        if target.is_empty() {
            return Err(RuleError::MissingTarget);
        }
        Ok(Self {
            name: None,
            note: None,
            pattern,
            target: target.to_owned(),
            segments: compile_target(target)?,
            rule_type: RuleType::Forward,
            conditions: Vec::new(),
            dialect,
            match_query: matches!(dialect, Dialect::Declarative),
            terminal: false,
            qs_append: false,
            qs_discard: false,
            escape_backrefs: false,
            no_escape: false,
            enabled: true,
        })
    }

    pub fn name<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.name = name.map(Into::into);
        self
    }

    pub fn note<S: Into<String>>(mut self, note: Option<S>) -> Self {
        self.note = note.map(Into::into);
        self
    }

    pub fn rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = rule_type;
        self
    }

    pub fn conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Match the pattern against the url including its query string.
    pub fn match_query(mut self, match_query: bool) -> Self {
        self.match_query = match_query;
        self
    }

    pub fn terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn qs_append(mut self, qs_append: bool) -> Self {
        self.qs_append = qs_append;
        self
    }

    pub fn qs_discard(mut self, qs_discard: bool) -> Self {
        self.qs_discard = qs_discard;
        self
    }

    pub fn escape_backrefs(mut self, escape: bool) -> Self {
        self.escape_backrefs = escape;
        self
    }

    /// Keep expanded back-references and variables unescaped.
    pub fn no_escape(mut self, no_escape: bool) -> Self {
        self.no_escape = no_escape;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn get_note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    #[inline]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    pub fn get_type(&self) -> RuleType {
        self.rule_type
    }

    #[inline]
    pub fn get_conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[inline]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Evaluate the rule conditions left to right.
    ///
    /// A run of OR-chained conditions is satisfied by its first match and
    /// the remainder of the run is skipped. Captures of every satisfied
    /// regex condition are appended to `captures` in evaluation order.
    fn match_conditions(&self, view: &dyn RequestView, captures: &mut Vec<String>) -> bool {
        let mut conditions = self.conditions.iter();
        while let Some(cond) = conditions.next() {
            if cond.evaluate(view, captures) {
                // skip the rest of the OR run
                let mut chained = cond.is_or();
                while chained {
                    chained = conditions.next().is_some_and(|c| c.is_or());
                }
                continue;
            }
            if !cond.is_or() || conditions.as_slice().is_empty() {
                return false;
            }
        }
        true
    }

    /// Try to match the rule against the current effective url.
    ///
    /// `url` is the path plus query string produced by earlier rules of
    /// the chain. Conditions always observe the original request.
    pub fn try_match(&self, view: &dyn RequestView, url: &str) -> Option<RewrittenUrl> {
        if !self.enabled {
            return None;
        }
        let mut captures = Vec::new();
        if !self.match_conditions(view, &mut captures) {
            return None;
        }

        let subject = match self.match_query {
            true => url,
            false => split_query(url).0,
        };
        let (whole, groups) = self.pattern.captures(subject)?.into_parts();
        captures.extend(groups);

        let target = match self.target.as_str() {
            "-" => url.to_owned(),
            _ => self.expand(view, &whole, &captures),
        };
        let target = self.apply_query(view, target);
        Some(RewrittenUrl::new(
            target,
            self.rule_type.action(),
            self.terminal,
        ))
    }

    /// Substitute back-references and variables into the target.
    ///
    /// Expanded values are percent-escaped unless `[NE]` is set, `[B]`
    /// escapes back-references as a whole path component.
    fn expand(&self, view: &dyn RequestView, whole: &str, captures: &[String]) -> String {
        let mut dst = String::with_capacity(self.target.len());
        for segment in self.segments.iter() {
            match segment {
                Segment::Literal(s) => dst.push_str(s),
                Segment::Capture(index) => {
                    let value = match index {
                        0 => whole,
                        n => captures.get(n - 1).map(String::as_str).unwrap_or_default(),
                    };
                    match self.escape_backrefs {
                        true => dst.extend(utf8_percent_encode(value, ESCAPE)),
                        false => self.push_value(&mut dst, value),
                    }
                }
                Segment::Variable(kind) => {
                    if let Some(value) = kind.value(view) {
                        self.push_value(&mut dst, &value);
                    }
                }
            }
        }
        dst
    }

    #[inline]
    fn push_value(&self, dst: &mut String, value: &str) {
        match self.no_escape {
            true => dst.push_str(value),
            false => dst.extend(utf8_percent_encode(value, UNSAFE)),
        }
    }

    /// Apply query-string append, discard and pass-through.
    fn apply_query(&self, view: &dyn RequestView, target: String) -> String {
        if self.qs_discard {
            return strip_query(target);
        }
        let query = view.query_string().unwrap_or_default();
        let passthrough = self.dialect == Dialect::Directive && !target.contains('?');
        match self.qs_append || passthrough {
            true => join_query(target, query),
            false => target,
        }
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut items = tokenize(s)?.into_iter();
        let pattern = items.next().ok_or(RuleError::MissingPattern)?;
        let target = items.next().ok_or(RuleError::MissingTarget)?;
        let flags = match items.next() {
            Some(flags) => RuleFlagList::from_str(&flags)?.0,
            None => Vec::new(),
        };
        if let Some(next) = items.next() {
            return Err(RuleError::InvalidSuffix(next));
        }

        let has = |flag: RuleFlag| flags.contains(&flag);
        let rule_type = flags
            .iter()
            .find_map(|f| match f {
                RuleFlag::Resolve(rule_type) => Some(*rule_type),
                _ => None,
            })
            .unwrap_or_default();
        let pattern = Pattern::compile(&pattern, !has(RuleFlag::NoCase))?;
        Ok(Self::new(pattern, &target, Dialect::Directive)?
            .rule_type(rule_type)
            .terminal(has(RuleFlag::Last))
            .qs_append(has(RuleFlag::QsAppend))
            .qs_discard(has(RuleFlag::QsDiscard))
            .escape_backrefs(has(RuleFlag::EscapeBackrefs))
            .no_escape(has(RuleFlag::NoEscape)))
    }
}

struct RuleFlagList(Vec<RuleFlag>);

impl FromStr for RuleFlagList {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('[') || !s.ends_with(']') {
            return Err(RuleError::FlagsMissingBrackets(s.to_owned()));
        }
        let flags = s[1..s.len() - 1]
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(RuleFlag::from_str)
            .collect::<Result<Vec<RuleFlag>, _>>()?;
        if flags.is_empty() {
            return Err(RuleError::FlagsEmpty);
        }
        let num_response = flags
            .iter()
            .filter(|f| matches!(f, RuleFlag::Resolve(_)))
            .count();
        let query = flags.contains(&RuleFlag::QsAppend) && flags.contains(&RuleFlag::QsDiscard);
        if num_response > 1 || query {
            return Err(RuleError::FlagsMutuallyExclusive);
        }
        Ok(Self(flags))
    }
}

/// Parse the value of an `R` flag.
///
/// A 3xx status redirects. A 4xx or 5xx status answers the request with
/// that status and drops the substitution, like `F` and `G` do.
#[inline]
fn parse_redirect(s: &str) -> Result<RuleType, RuleError> {
    let status = match s.to_lowercase().as_str() {
        "" | "temp" => return Ok(RuleType::TEMPORARY),
        "permanent" => return Ok(RuleType::PERMANENT),
        "seeother" => return Ok(RuleType::Redirect(303)),
        _ => u16::from_str(s)?,
    };
    match status {
        300..400 => Ok(RuleType::Redirect(status)),
        400..600 => Ok(RuleType::Status(status)),
        _ => Err(RuleError::InvalidFlagStatus(s.to_owned())),
    }
}

/// Flag modifiers to a [`Rule`] expression.
///
/// Supports a subset of [official](https://httpd.apache.org/docs/current/rewrite/flags.html)
/// `mod_rewrite` flags.
#[derive(Clone, Debug, PartialEq)]
enum RuleFlag {
    Last,
    NoCase,
    NoEscape,
    EscapeBackrefs,
    QsAppend,
    QsDiscard,
    Resolve(RuleType),
}

impl FromStr for RuleFlag {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (p, v) = s.split_once('=').unwrap_or((s, ""));
        match p.to_lowercase().as_str() {
            "l" | "last" | "end" => Ok(Self::Last),
            "nc" | "nocase" => Ok(Self::NoCase),
            "ne" | "noescape" => Ok(Self::NoEscape),
            "b" => Ok(Self::EscapeBackrefs),
            "qsa" | "qsappend" => Ok(Self::QsAppend),
            "qsd" | "qsdiscard" => Ok(Self::QsDiscard),
            "r" | "redirect" => Ok(Self::Resolve(parse_redirect(v)?)),
            "f" | "forbidden" => Ok(Self::Resolve(RuleType::Status(403))),
            "g" | "gone" => Ok(Self::Resolve(RuleType::Status(410))),
            _ => Err(RuleError::InvalidFlag(s.to_owned())),
        }
    }
}
