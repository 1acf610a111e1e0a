use std::num::ParseIntError;

use thiserror::Error;

pub use super::conditions::CondError;

/// Errors when compiling a match pattern
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatternError {
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),
}

/// Errors when parsing a single directive line
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("Missing expression identifier")]
    MissingIdentifier,

    #[error("Invalid directive identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid RewriteEngine state: {0}")]
    InvalidStateRule(String),

    #[error("Error when parsing condition")]
    ConditionError(#[from] CondError),

    #[error("Error when parsing rewrite rule")]
    RuleError(#[from] RuleError),
}

/// Errors when parsing rewrite rules
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Rule is missing a pattern")]
    MissingPattern,

    #[error("Invalid pattern in rule")]
    InvalidPattern(#[from] PatternError),

    #[error("Rule is missing a target")]
    MissingTarget,

    #[error("Invalid suffix to rule expression: {0}")]
    InvalidSuffix(String),

    #[error("Rule flag definitions missing brackets: {0}")]
    FlagsMissingBrackets(String),

    #[error("Rule flags empty")]
    FlagsEmpty,

    #[error("Rule flags used are mutually exclusive")]
    FlagsMutuallyExclusive,

    #[error("Invalid flag in rule definition: {0}")]
    InvalidFlag(String),

    #[error("Invalid number in rule definition")]
    InvalidFlagNumber(#[from] ParseIntError),

    #[error("Invalid redirect status in rule definition: {0}")]
    InvalidFlagStatus(String),

    #[error("Invalid rule condition")]
    Condition(#[from] CondError),
}

/// Compile failure recorded on a [`Configuration`](crate::Configuration).
///
/// These never abort compilation. They are collected so operators can
/// inspect why a configuration was rejected or why a rule is missing.
#[derive(Debug, Error)]
pub enum ConfError {
    #[error("line {line}: {source}")]
    Directive {
        line: usize,
        #[source]
        source: ExpressionError,
    },

    #[error("rule {index}: {source}")]
    Rule {
        index: usize,
        #[source]
        source: RuleError,
    },

    #[error("rule {index} is malformed: {source}")]
    MalformedRule {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("document is malformed: {0}")]
    Document(#[from] serde_yaml::Error),

    #[error("unable to read configuration source")]
    Source(#[from] SourceError),
}

impl ConfError {
    /// Returns false for errors that only dropped a single declarative rule.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Rule { .. } | Self::MalformedRule { .. })
    }
}

/// Errors when reading a configuration source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("configuration source {0} could not be read")]
    Io(String, #[source] std::io::Error),

    #[error("configuration source {0} is not valid utf-8")]
    Encoding(String),
}
