use thiserror::Error;

use crate::error::PatternError;

/// Error when parsing rule condition expression
#[derive(Debug, Error, PartialEq)]
pub enum CondError {
    #[error("Invalid condition pattern")]
    InvalidPattern(#[from] PatternError),

    #[error("Unsupported condition variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown condition type: {0}")]
    UnknownType(String),

    #[error("Condition type {0} requires a name")]
    MissingName(String),

    #[error("Unknown condition operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid comparison expression: {0}")]
    InvalidComparison(String),

    #[error("Invalid filetest expression: {0}")]
    InvalidFileTest(String),

    #[error("Quotation never closed in expression: {0}")]
    UnclosedQuotation(String),

    #[error("Rule condition expression is empty")]
    EmptyExpression,

    #[error("Rule condition is missing a pattern")]
    MissingPattern,

    #[error("Invalid expression suffix: {0}")]
    InvalidSuffix(String),

    #[error("Condition flags missing brackets: {0}")]
    FlagsMissingBrackets(String),

    #[error("Condition flags are empty")]
    FlagsEmpty,

    #[error("Invalid condition flag: {0}")]
    InvalidFlag(String),
}
