use std::str::FromStr;

pub mod context;
mod error;
mod matcher;
mod parse;

use crate::pattern::Pattern;
use context::RequestView;

pub use error::CondError;
pub use matcher::{ConditionType, Operator};
pub(crate) use parse::{matches_start, tokenize};

/// Singular predicate over one request attribute.
///
/// Built either from a `RewriteCond` directive or from a declarative
/// condition entry. Once built it is never mutated, so the same
/// condition can be evaluated by many requests at once.
///
/// Supports a subset of [offical](https://httpd.apache.org/docs/current/mod/mod_rewrite.html#rewritecond)
/// mod_rewrite conditions.
#[derive(Clone, Debug)]
pub struct Condition {
    kind: ConditionType,
    operator: Operator,
    value: String,
    pattern: Option<Pattern>,
    case_sensitive: bool,
    or_next: bool,
    negated: bool,
}

impl Condition {
    /// Build a new condition, compiling `value` as a regex when the
    /// operator requires one.
    pub fn new(
        kind: ConditionType,
        operator: Operator,
        value: &str,
        case_sensitive: bool,
    ) -> Result<Self, CondError> {
        let pattern = match operator.uses_pattern() {
            true => Some(Pattern::compile(value, case_sensitive)?),
            false => None,
        };
        Ok(Self {
            kind,
            operator,
            value: value.to_owned(),
            pattern,
            case_sensitive,
            or_next: false,
            negated: false,
        })
    }

    /// Combine this condition with the following one using OR.
    pub fn or_next(mut self, or_next: bool) -> Self {
        self.or_next = or_next;
        self
    }

    /// Invert the outcome of the condition.
    pub fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    #[inline]
    pub fn kind(&self) -> &ConditionType {
        &self.kind
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.kind.name()
    }

    #[inline]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[inline]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Returns true if the condition uses OR operator rather
    /// than the default AND.
    #[inline]
    pub fn is_or(&self) -> bool {
        self.or_next
    }

    #[inline]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Evaluate the condition against the request.
    ///
    /// Capture groups of a successful regex match are appended to
    /// `captures`. File tests whose path can not be resolved are never
    /// satisfied, regardless of negation.
    pub fn evaluate(&self, view: &dyn RequestView, captures: &mut Vec<String>) -> bool {
        if self.operator.is_file_test() {
            return match self.kind.path(view) {
                Some(path) => self.operator.test_path(&path) != self.negated,
                None => false,
            };
        }

        let value = self.kind.value(view);
        let value = value.as_deref().unwrap_or_default();
        let satisfied = match self.operator {
            Operator::Matches => match self.pattern.as_ref().and_then(|p| p.captures(value)) {
                Some(found) if !self.negated => {
                    captures.extend(found.into_parts().1);
                    return true;
                }
                found => found.is_some(),
            },
            Operator::NotMatches => !self.pattern.as_ref().is_some_and(|p| p.is_match(value)),
            op => op.compare(value, &self.value, self.case_sensitive),
        };
        satisfied != self.negated
    }
}

impl FromStr for Condition {
    type Err = CondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = tokenize(s)?.into_iter();
        let variable = tokens.next().ok_or(CondError::EmptyExpression)?;
        let expr = tokens.next().ok_or(CondError::MissingPattern)?;

        let name = variable
            .strip_prefix("%{")
            .and_then(|v| v.strip_suffix('}'))
            .ok_or_else(|| CondError::UnknownVariable(variable.clone()))?;
        let kind = ConditionType::from_variable(name)?;

        let mut next = tokens.next();
        let (operator, value, negated) = match Operator::from_compare(&expr) {
            Some(op) => {
                let operand = next
                    .take()
                    .filter(|t| !t.starts_with('['))
                    .ok_or_else(|| CondError::InvalidComparison(expr.clone()))?;
                (op, operand, false)
            }
            None if name == "HTTPS" => (Operator::Matches, https_pattern(&expr)?, false),
            None => parse_expr(&expr)?,
        };

        let flags = match next.or_else(|| tokens.next()) {
            Some(flags) => CondFlagList::from_str(&flags)?.0,
            None => Vec::new(),
        };
        if let Some(extra) = tokens.next() {
            return Err(CondError::InvalidSuffix(extra));
        }

        let nocase = flags.iter().any(|f| matches!(f, CondFlag::NoCase));
        let or_next = flags.iter().any(|f| matches!(f, CondFlag::Or));
        Ok(Self::new(kind, operator, &value, !nocase)?
            .or_next(or_next)
            .negated(negated))
    }
}

/// Translate the boolean `HTTPS` pseudo-variable into a scheme regex.
fn https_pattern(expr: &str) -> Result<String, CondError> {
    let (negate, test) = match expr.strip_prefix('!') {
        Some(test) => (true, test),
        None => (false, expr),
    };
    let on = match test.to_lowercase().as_str() {
        "on" | "=on" | "^on$" => true,
        "off" | "=off" | "^off$" => false,
        _ => return Err(CondError::InvalidComparison(expr.to_owned())),
    };
    Ok(match on != negate {
        true => "^https$".to_owned(),
        false => "^http$".to_owned(),
    })
}

/// Parse a condition pattern into operator, operand and negation.
fn parse_expr(expr: &str) -> Result<(Operator, String, bool), CondError> {
    let (negate, test) = match expr.strip_prefix('!') {
        Some(test) => (true, test),
        None => (false, expr),
    };
    if test.starts_with('-') && test.len() == 2 {
        return Ok((Operator::from_file_test(test, negate)?, String::new(), false));
    }
    if let Some(prefix) = matches_start(test, &["<=", ">=", "<", ">", "="]) {
        let operand = test[prefix.len()..].to_owned();
        return match Operator::from_prefix(prefix) {
            Some(Operator::Equal) if negate => Ok((Operator::NotEqual, operand, false)),
            Some(op) => Ok((op, operand, negate)),
            None => Err(CondError::InvalidComparison(expr.to_owned())),
        };
    }
    match negate {
        true => Ok((Operator::NotMatches, test.to_owned(), false)),
        false => Ok((Operator::Matches, test.to_owned(), false)),
    }
}

struct CondFlagList(Vec<CondFlag>);

impl FromStr for CondFlagList {
    type Err = CondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('[') || !s.ends_with(']') {
            return Err(CondError::FlagsMissingBrackets(s.to_owned()));
        }
        let flags = s[1..s.len() - 1]
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(CondFlag::from_str)
            .collect::<Result<Vec<CondFlag>, _>>()?;
        if flags.is_empty() {
            return Err(CondError::FlagsEmpty);
        }
        Ok(Self(flags))
    }
}

/// Supported `mod_rewrite` [`Condition`] flags that modify
/// the conditions behavior.
#[derive(Clone, Debug)]
enum CondFlag {
    NoCase,
    Or,
}

impl FromStr for CondFlag {
    type Err = CondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "i" | "insensitive" | "nc" | "nocase" => Ok(Self::NoCase),
            "or" | "ornext" => Ok(Self::Or),
            _ => Err(CondError::InvalidFlag(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use context::RequestCtx;

    fn eval(cond: &Condition, req: &RequestCtx) -> (bool, Vec<String>) {
        let mut caps = Vec::new();
        let ok = cond.evaluate(req, &mut caps);
        (ok, caps)
    }

    #[test]
    fn test_equals() {
        let cond = Condition::from_str(r#"%{REQUEST_URI} "=/Test" [NC,OR]"#).unwrap();
        assert_eq!(cond.kind(), &ConditionType::RequestUri);
        assert_eq!(cond.operator(), Operator::Equal);
        assert_eq!(cond.value(), "/Test");
        assert!(!cond.is_case_sensitive());
        assert!(cond.is_or());

        assert!(eval(&cond, &RequestCtx::new("/test")).0);
        assert!(!eval(&cond, &RequestCtx::new("/Not")).0);
    }

    #[test]
    fn test_host_nocase() {
        let nocase = Condition::from_str(r"%{HTTP_HOST} ^(.*)from\.com$ [NC]").unwrap();
        let exact = Condition::from_str(r"%{HTTP_HOST} ^(.*)from\.com$").unwrap();
        assert_eq!(nocase.kind().as_str(), "server-name");

        let upper = RequestCtx::new("/").server_name("From.com");
        let upper1 = RequestCtx::new("/").server_name("From1.com");
        let lower = RequestCtx::new("/").server_name("xfrom.com");
        assert!(eval(&nocase, &upper).0);
        assert!(!eval(&exact, &upper).0);
        assert!(!eval(&exact, &upper1).0);
        assert!(eval(&exact, &lower).0);

        let www = RequestCtx::new("/").server_name("www.from.com");
        assert_eq!(eval(&exact, &www), (true, vec!["www.".to_owned()]));
    }

    #[test]
    fn test_negated_regex() {
        let cond = Condition::from_str(r"%{HTTP_HOST} !^www\.from\.com$").unwrap();
        assert_eq!(cond.operator(), Operator::NotMatches);
        assert_eq!(cond.value(), r"^www\.from\.com$");

        let bare = RequestCtx::new("/").server_name("from.com");
        let www = RequestCtx::new("/").server_name("www.from.com");
        assert_eq!(eval(&cond, &bare), (true, vec![]));
        assert!(!eval(&cond, &www).0);
    }

    #[test]
    fn test_https() {
        let cond = Condition::from_str("%{HTTPS} !=on").unwrap();
        assert_eq!(cond.kind(), &ConditionType::Scheme);
        assert_eq!(cond.operator(), Operator::Matches);
        assert_eq!(cond.value(), "^http$");

        assert!(eval(&cond, &RequestCtx::new("/").scheme("http")).0);
        assert!(!eval(&cond, &RequestCtx::new("/").scheme("https")).0);

        let on = Condition::from_str("%{HTTPS} on").unwrap();
        assert_eq!(on.value(), "^https$");
        assert!(Condition::from_str("%{HTTPS} maybe").is_err());
    }

    #[test]
    fn test_compare() {
        let cond = Condition::from_str("%{SERVER_PORT} -ge 4000").unwrap();
        assert_eq!(cond.operator(), Operator::GreaterOrEqual);
        assert_eq!(cond.value(), "4000");

        assert!(eval(&cond, &RequestCtx::new("/").server_port(4001)).0);
        assert!(!eval(&cond, &RequestCtx::new("/").server_port(3999)).0);

        let lexical = Condition::from_str("%{TIME_HOUR} !<07 [OR]").unwrap();
        assert_eq!(lexical.operator(), Operator::Less);
        assert!(lexical.is_negated());
        assert!(lexical.is_or());

        let unequal = Condition::from_str("%{REQUEST_METHOD} !=POST").unwrap();
        assert_eq!(unequal.operator(), Operator::NotEqual);
        assert!(eval(&unequal, &RequestCtx::new("/")).0);

        assert!(matches!(
            Condition::from_str("%{SERVER_PORT} -lt [OR]"),
            Err(CondError::InvalidComparison(_))
        ));
    }

    #[test]
    fn test_filetest() {
        let cond = Condition::from_str("%{REQUEST_FILENAME} !-f").unwrap();
        assert_eq!(cond.operator(), Operator::NotFile);

        let root = std::env::current_dir().unwrap();
        let present = RequestCtx::new("/src/lib.rs").document_root(&root);
        let missing = RequestCtx::new("/invalid").document_root(&root);
        assert!(!eval(&cond, &present).0);
        assert!(eval(&cond, &missing).0);

        // unresolvable paths never satisfy a file test
        assert!(!eval(&cond, &RequestCtx::new("/invalid")).0);
        let escape = RequestCtx::new("/../etc").document_root(&root);
        assert!(!eval(&cond, &escape).0);

        let dir = Condition::from_str("%{REQUEST_FILENAME} -d").unwrap();
        let src = RequestCtx::new("/src").document_root(&root);
        assert!(eval(&dir, &src).0);
        assert!(Condition::from_str("%{REQUEST_FILENAME} -x").is_err());
    }

    #[test]
    fn test_header_captures() {
        let cond = Condition::from_str(r"%{HTTP_USER_AGENT} ^(\w+)/([\d.]+)").unwrap();
        let req = RequestCtx::new("/").header("User-Agent", "Mozilla/5.0 (X11)");
        assert_eq!(
            eval(&cond, &req),
            (true, vec!["Mozilla".to_owned(), "5.0".to_owned()])
        );
        // missing attributes compare as empty strings
        assert!(!eval(&cond, &RequestCtx::new("/")).0);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            Condition::from_str("%{API_VERSION} ^2$"),
            Err(CondError::UnknownVariable(_))
        ));
        assert!(matches!(
            Condition::from_str("REQUEST_URI ^/a"),
            Err(CondError::UnknownVariable(_))
        ));
        assert!(matches!(
            Condition::from_str("%{REQUEST_URI}"),
            Err(CondError::MissingPattern)
        ));
        assert!(matches!(
            Condition::from_str("%{REQUEST_URI} ^/a [NC] extra"),
            Err(CondError::InvalidSuffix(_))
        ));
        assert!(matches!(
            Condition::from_str("%{REQUEST_URI} ^/a NC"),
            Err(CondError::FlagsMissingBrackets(_))
        ));
        assert!(matches!(
            Condition::from_str("%{REQUEST_URI} ^/a [NV]"),
            Err(CondError::InvalidFlag(_))
        ));
        assert!(matches!(
            Condition::from_str("%{REQUEST_URI} ^/(a"),
            Err(CondError::InvalidPattern(_))
        ));
    }
}
