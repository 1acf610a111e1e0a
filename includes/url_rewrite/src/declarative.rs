//! Compiler for the declarative yaml rule-set dialect.
//!
//! ```yaml
//! engine: true
//! use_query_string: true
//! rules:
//!   - name: legacy docs
//!     from: ^/docs/(.*)$
//!     to: /manual/$1
//!     type: permanent-redirect
//!     conditions:
//!       - type: header
//!         name: user-agent
//!         operator: notmatches
//!         value: bot
//! ```
//!
//! A rule that can not be deserialized or compiled is dropped on its
//! own and recorded as an error. Only a document that can not be parsed
//! at all marks the configuration not-ok.

use std::str::FromStr;

use serde::Deserialize;

use super::conditions::{Condition, ConditionType, Operator};
use super::conf::Configuration;
use super::error::{ConfError, RuleError};
use super::pattern::Pattern;
use super::rule::{Dialect, Rule, RuleType};

#[inline]
fn default_true() -> bool {
    true
}

#[inline]
fn default_operator() -> String {
    Operator::Matches.as_str().to_owned()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default = "default_true")]
    engine: bool,
    #[serde(default = "default_true")]
    use_query_string: bool,
    #[serde(default)]
    rules: Vec<serde_yaml::Value>,
}

/// How the `from` field of a rule is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Regex,
    Wildcard,
}

/// Outcome declared by the `type` field of a rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToType {
    #[default]
    Forward,
    Redirect,
    TemporaryRedirect,
    PermanentRedirect,
    Forbidden,
    Gone,
}

impl ToType {
    fn resolve(&self, status: Option<u16>) -> Result<RuleType, RuleError> {
        let redirect = |default: u16| match status.unwrap_or(default) {
            status if (300..400).contains(&status) => Ok(RuleType::Redirect(status)),
            status => Err(RuleError::InvalidFlagStatus(status.to_string())),
        };
        match self {
            Self::Forward => Ok(RuleType::Forward),
            Self::Redirect | Self::TemporaryRedirect => redirect(302),
            Self::PermanentRedirect => redirect(301),
            Self::Forbidden => Ok(RuleType::Status(403)),
            Self::Gone => Ok(RuleType::Status(410)),
        }
    }
}

/// Boolean join between a condition and the one after it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Next {
    #[default]
    And,
    Or,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionDef {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    #[serde(default = "default_operator")]
    operator: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(default)]
    next: Next,
    #[serde(default)]
    negate: bool,
}

impl ConditionDef {
    fn compile(self) -> Result<Condition, RuleError> {
        let kind = ConditionType::new(&self.kind, self.name.as_deref())?;
        let operator = Operator::from_str(&self.operator)?;
        Ok(Condition::new(kind, operator, &self.value, self.case_sensitive)?
            .or_next(self.next == Next::Or)
            .negated(self.negate))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDef {
    name: Option<String>,
    note: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    from: String,
    to: String,
    #[serde(default, rename = "type")]
    to_type: ToType,
    status: Option<u16>,
    #[serde(default)]
    last: bool,
    #[serde(default)]
    match_type: MatchType,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(default)]
    qsappend: bool,
    #[serde(default)]
    qsdiscard: bool,
    #[serde(default)]
    conditions: Vec<ConditionDef>,
}

impl RuleDef {
    fn compile(self, use_query_string: bool) -> Result<Rule, RuleError> {
        if self.qsappend && self.qsdiscard {
            return Err(RuleError::FlagsMutuallyExclusive);
        }
        let pattern = match self.match_type {
            MatchType::Regex => Pattern::compile(&self.from, self.case_sensitive)?,
            MatchType::Wildcard => Pattern::wildcard(&self.from, self.case_sensitive)?,
        };
        let conditions = self
            .conditions
            .into_iter()
            .map(ConditionDef::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rule::new(pattern, &self.to, Dialect::Declarative)?
            .name(self.name)
            .note(self.note)
            .enabled(self.enabled)
            .rule_type(self.to_type.resolve(self.status)?)
            .terminal(self.last)
            .match_query(use_query_string)
            .qs_append(self.qsappend)
            .qs_discard(self.qsdiscard)
            .conditions(conditions))
    }
}

/// Compile a declarative document into a [`Configuration`].
pub(crate) fn compile(text: &str) -> Configuration {
    let document: Document = match serde_yaml::from_str(text) {
        Ok(document) => document,
        Err(err) => {
            tracing::error!("declarative document is malformed: {err}");
            return Configuration::new(Vec::new(), false, vec![ConfError::Document(err)]);
        }
    };

    let mut rules = Vec::new();
    let mut errors = Vec::new();
    for (index, value) in document.rules.into_iter().enumerate() {
        let def = match serde_yaml::from_value::<RuleDef>(value) {
            Ok(def) => def,
            Err(source) => {
                tracing::warn!(rule = index, "dropping malformed rule: {source}");
                errors.push(ConfError::MalformedRule { index, source });
                continue;
            }
        };
        match def.compile(document.use_query_string) {
            Ok(rule) => rules.push(rule),
            Err(source) => {
                tracing::warn!(rule = index, "dropping invalid rule: {source}");
                errors.push(ConfError::Rule { index, source });
            }
        }
    }
    Configuration::new(rules, document.engine, errors)
}
