//! Compiler for the line oriented `mod_rewrite` directive dialect.

use std::str::FromStr;

use super::conditions::Condition;
use super::conf::Configuration;
use super::error::{ConfError, ExpressionError};
use super::extra::State;
use super::rule::Rule;

/// Directives understood by `mod_rewrite` that have no meaning for
/// this engine and are skipped.
const UNSUPPORTED: &[&str] = &[
    "rewritebase",
    "rewriteoptions",
    "rewritemap",
    "rewritelog",
    "rewriteloglevel",
    "rewritelock",
];

/// All possible expression types allowed within a directive document.
#[derive(Clone, Debug)]
pub enum Expression {
    Condition(Condition),
    Rule(Rule),
    State(State),
    Unsupported(String),
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ExpressionError::MissingIdentifier);
        }
        let (ident, expr) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
        match ident.to_lowercase().as_str() {
            "rewriterule" => Ok(Self::Rule(Rule::from_str(expr)?)),
            "rewritecond" => Ok(Self::Condition(Condition::from_str(expr)?)),
            "rewriteengine" => Ok(Self::State(State::from_str(expr.trim())?)),
            name if UNSUPPORTED.contains(&name) => Ok(Self::Unsupported(ident.to_owned())),
            _ => Err(ExpressionError::InvalidIdentifier(ident.to_owned())),
        }
    }
}

/// Compile a directive document into a [`Configuration`].
///
/// Parsing never stops at the first error. Every failing line is
/// recorded and leaves the resulting configuration not-ok.
pub(crate) fn compile(text: &str) -> Configuration {
    let mut rules = Vec::new();
    let mut errors = Vec::new();
    let mut state = State::On;
    let mut note: Option<String> = None;
    let mut conditions: Vec<Condition> = Vec::new();

    for (index, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l.trim())) {
        if line.is_empty() {
            note = None;
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            let comment = comment.trim();
            note = match note.take() {
                Some(prev) if !comment.is_empty() => Some(format!("{prev} {comment}")),
                Some(prev) => Some(prev),
                None if !comment.is_empty() => Some(comment.to_owned()),
                None => None,
            };
            continue;
        }
        match Expression::from_str(line) {
            Ok(Expression::State(s)) => state = s,
            Ok(Expression::Condition(cond)) => conditions.push(cond),
            Ok(Expression::Rule(rule)) => {
                let rule = rule
                    .conditions(std::mem::take(&mut conditions))
                    .note(note.take());
                rules.push(rule);
            }
            Ok(Expression::Unsupported(ident)) => {
                tracing::warn!(line = index, "skipping unsupported directive {ident}");
            }
            Err(err) => {
                tracing::error!(line = index, "invalid directive: {err}");
                if matches!(err, ExpressionError::RuleError(_)) {
                    conditions.clear();
                    note = None;
                }
                errors.push(ConfError::Directive {
                    line: index,
                    source: err,
                });
            }
        }
    }
    if !conditions.is_empty() {
        tracing::warn!(
            "discarding {} orphaned condition(s) without a rule",
            conditions.len()
        );
    }
    Configuration::new(rules, state.is_on(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::chain::Action;
    use crate::conditions::context::RequestCtx;
    use crate::rule::RuleType;

    #[test]
    fn test_groups() {
        let conf = compile(
            r#"
            # files that exist
            # are served as is
            RewriteCond %{REQUEST_FILENAME} !-f
            RewriteRule ^/file/(.*)$ /file2/$1  [R=303]

            RewriteRule /rewrite/[A-Z]+ /redirect/$1 [NC,R]
            RewriteCond %{SERVER_PORT} -eq 4000
            RewriteRule /(.*) /index.php?path=$1
            RewriteBase /
            RewriteEngine off
            RewriteRule / - [F]
        "#,
        );

        assert!(conf.is_ok());
        assert!(!conf.is_enabled());
        let rules = conf.rules();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].get_conditions().len(), 1);
        assert_eq!(rules[0].get_note(), Some("files that exist are served as is"));
        assert_eq!(rules[0].get_type(), RuleType::Redirect(303));
        assert_eq!(rules[1].get_conditions().len(), 0);
        assert_eq!(rules[1].get_note(), None);
        assert_eq!(rules[2].get_conditions().len(), 1);
        assert_eq!(rules[3].get_type(), RuleType::Status(403));
    }

    #[test]
    fn test_errors_collected() {
        let conf = compile(
            r#"
            RewriteCond %{API_VERSION} ^2$
            RewriteRule ^/a$ /b
            RewriteRule ^/(c$ /d
            RewriteEngine maybe
            RewriteRedirect /x /y
            RewriteRule ^/e$ /f
        "#,
        );
        assert!(!conf.is_ok());
        assert_eq!(conf.errors().len(), 4);
        assert!(matches!(
            conf.errors()[0],
            ConfError::Directive { line: 2, .. }
        ));
        assert!(matches!(
            conf.errors()[3],
            ConfError::Directive {
                line: 6,
                source: ExpressionError::InvalidIdentifier(_)
            }
        ));
        assert_eq!(conf.rules().len(), 2);
    }

    #[test]
    fn test_orphaned_condition() {
        let conf = compile(
            r#"
            RewriteRule ^/a$ /b [L]
            RewriteCond %{HTTP_HOST} ^example\.com$
        "#,
        );
        assert!(conf.is_ok());
        assert_eq!(conf.rules().len(), 1);
        assert!(conf.rules()[0].get_conditions().is_empty());
    }

    #[test]
    fn test_not_condition() {
        let conf = compile(
            r#"
            RewriteEngine on
            RewriteCond %{HTTP_HOST} !^www\.from\.com$
            RewriteRule ^/(.*)$ http://www.to.com/$1 [R=301,L]
        "#,
        );
        let req = RequestCtx::new("/?testParam=false").server_name("from.com");
        let result = conf.process(&req).unwrap();
        assert_eq!(result.target(), "http://www.to.com/?testParam=false");
        assert_eq!(result.action(), Action::Redirect(301));

        let req = RequestCtx::new("/").server_name("www.from.com");
        assert_eq!(conf.process(&req), None);
    }

    #[test]
    fn test_https_redirect() {
        let conf = compile(
            r#"
            RewriteCond %{HTTPS} !=on
            RewriteRule ^(.*)$ https://%{SERVER_NAME}$1 [R=301,L]
        "#,
        );
        let http = RequestCtx::new("/login").server_name("example.com");
        assert_eq!(
            conf.process(&http).unwrap().target(),
            "https://example.com/login"
        );
        assert_eq!(conf.process(&http.clone().scheme("https")), None);
    }
}
