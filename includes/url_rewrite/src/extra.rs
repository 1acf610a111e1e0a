use std::str::FromStr;

use super::error::ExpressionError;

#[inline]
pub(crate) fn split_query(uri: &str) -> (&str, &str) {
    uri.split_once('?').unwrap_or((uri, ""))
}

/// Append `query` onto `uri` unless it is empty or already present.
#[inline]
pub(crate) fn join_query(mut uri: String, query: &str) -> String {
    if query.is_empty() || has_query(&uri, query) {
        return uri;
    }
    match uri.contains('?') {
        true => uri.push('&'),
        false => uri.push('?'),
    }
    uri.push_str(query);
    uri
}

#[inline]
fn has_query(uri: &str, query: &str) -> bool {
    match uri.split_once('?') {
        Some((_, existing)) => existing == query || existing.ends_with(&format!("&{query}")),
        None => false,
    }
}

/// Drop the query string from `uri`.
#[inline]
pub(crate) fn strip_query(mut uri: String) -> String {
    if let Some(index) = uri.find('?') {
        uri.truncate(index);
    }
    uri
}

/// Singular `RewriteEngine` expression definition.
///
/// Enables or disables the whole [`Configuration`](super::Configuration).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    On,
    Off,
}

impl State {
    #[inline]
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl FromStr for State {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(ExpressionError::InvalidStateRule(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_query() {
        assert_eq!(join_query("/a".to_owned(), "x=1"), "/a?x=1");
        assert_eq!(join_query("/a?y=2".to_owned(), "x=1"), "/a?y=2&x=1");
        assert_eq!(join_query("/a?x=1".to_owned(), "x=1"), "/a?x=1");
        assert_eq!(join_query("/a?y=2&x=1".to_owned(), "x=1"), "/a?y=2&x=1");
        assert_eq!(join_query("/a".to_owned(), ""), "/a");
        assert_eq!(strip_query("/a?x=1".to_owned()), "/a");
        assert_eq!(split_query("/a?x=1"), ("/a", "x=1"));
    }

    #[test]
    fn test_state() {
        assert_eq!(State::from_str("Off").unwrap(), State::Off);
        assert!(State::from_str("maybe").is_err());
    }
}
