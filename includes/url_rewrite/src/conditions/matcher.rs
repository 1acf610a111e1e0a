use std::{borrow::Cow, cmp::Ordering, fmt, path::PathBuf, str::FromStr};

use unicase::UniCase;

use super::context::RequestView;
use super::error::CondError;

/// Request attribute inspected by a [`Condition`](super::Condition).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionType {
    Header(String),
    Cookie(String),
    Parameter(String),
    RequestUri,
    RequestFilename,
    QueryString,
    Scheme,
    Method,
    Protocol,
    ServerName,
    Port,
    RemoteAddr,
    RemoteHost,
    RemoteUser,
    Time,
    Year,
    Month,
    DayOfMonth,
    DayOfWeek,
    HourOfDay,
    Minute,
    Second,
}

impl ConditionType {
    /// Build a condition type from its declarative name and optional
    /// attribute name.
    pub fn new(kind: &str, name: Option<&str>) -> Result<Self, CondError> {
        let named = |f: fn(String) -> Self| match name {
            Some(name) if !name.is_empty() => Ok(f(name.to_owned())),
            _ => Err(CondError::MissingName(kind.to_owned())),
        };
        match kind.to_lowercase().as_str() {
            "header" => named(Self::Header),
            "cookie" => named(Self::Cookie),
            "parameter" | "param" => named(Self::Parameter),
            "request-uri" => Ok(Self::RequestUri),
            "request-filename" => Ok(Self::RequestFilename),
            "query-string" => Ok(Self::QueryString),
            "scheme" => Ok(Self::Scheme),
            "method" => Ok(Self::Method),
            "protocol" => Ok(Self::Protocol),
            "server-name" => Ok(Self::ServerName),
            "port" => Ok(Self::Port),
            "remote-addr" => Ok(Self::RemoteAddr),
            "remote-host" => Ok(Self::RemoteHost),
            "remote-user" => Ok(Self::RemoteUser),
            "time" => Ok(Self::Time),
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "dayofmonth" => Ok(Self::DayOfMonth),
            "dayofweek" => Ok(Self::DayOfWeek),
            "hourofday" => Ok(Self::HourOfDay),
            "minute" => Ok(Self::Minute),
            "second" => Ok(Self::Second),
            _ => Err(CondError::UnknownType(kind.to_owned())),
        }
    }

    /// Translate a `%{VARIABLE}` name into the equivalent condition type.
    pub fn from_variable(variable: &str) -> Result<Self, CondError> {
        if let Some(header) = variable.strip_prefix("HTTP:") {
            return Ok(Self::Header(header.to_lowercase()));
        }
        let header = |name: &str| Ok(Self::Header(name.to_owned()));
        match variable {
            "HTTP_USER_AGENT" => header("user-agent"),
            "HTTP_REFERER" => header("referer"),
            "HTTP_COOKIE" => header("cookie"),
            "HTTP_FORWARDED" => header("forwarded"),
            "HTTP_PROXY_CONNECTION" => header("proxy-connection"),
            "HTTP_ACCEPT" => header("accept"),
            "HTTP_HOST" | "SERVER_NAME" => Ok(Self::ServerName),
            "HTTPS" => Ok(Self::Scheme),
            "REMOTE_ADDR" => Ok(Self::RemoteAddr),
            "REMOTE_HOST" => Ok(Self::RemoteHost),
            "REMOTE_USER" | "REMOTE_IDENT" => Ok(Self::RemoteUser),
            "REQUEST_METHOD" => Ok(Self::Method),
            "REQUEST_URI" => Ok(Self::RequestUri),
            "REQUEST_FILENAME" | "SCRIPT_FILENAME" => Ok(Self::RequestFilename),
            "QUERY_STRING" => Ok(Self::QueryString),
            "SERVER_PORT" => Ok(Self::Port),
            "SERVER_PROTOCOL" => Ok(Self::Protocol),
            "TIME" => Ok(Self::Time),
            "TIME_YEAR" => Ok(Self::Year),
            "TIME_MON" => Ok(Self::Month),
            "TIME_DAY" => Ok(Self::DayOfMonth),
            "TIME_WDAY" => Ok(Self::DayOfWeek),
            "TIME_HOUR" => Ok(Self::HourOfDay),
            "TIME_MIN" => Ok(Self::Minute),
            "TIME_SEC" => Ok(Self::Second),
            _ => Err(CondError::UnknownVariable(variable.to_owned())),
        }
    }

    /// Declarative name of the condition type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header(_) => "header",
            Self::Cookie(_) => "cookie",
            Self::Parameter(_) => "parameter",
            Self::RequestUri => "request-uri",
            Self::RequestFilename => "request-filename",
            Self::QueryString => "query-string",
            Self::Scheme => "scheme",
            Self::Method => "method",
            Self::Protocol => "protocol",
            Self::ServerName => "server-name",
            Self::Port => "port",
            Self::RemoteAddr => "remote-addr",
            Self::RemoteHost => "remote-host",
            Self::RemoteUser => "remote-user",
            Self::Time => "time",
            Self::Year => "year",
            Self::Month => "month",
            Self::DayOfMonth => "dayofmonth",
            Self::DayOfWeek => "dayofweek",
            Self::HourOfDay => "hourofday",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    /// Header, cookie or parameter name the type refers to
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Header(name) | Self::Cookie(name) | Self::Parameter(name) => Some(name),
            _ => None,
        }
    }

    /// Fetch the attribute value from the request.
    pub fn value<'a>(&self, view: &'a dyn RequestView) -> Option<Cow<'a, str>> {
        let time = |format: &str| Some(Cow::Owned(view.now().format(format).to_string()));
        match self {
            Self::Header(name) => view.header(name),
            Self::Cookie(name) => view.cookie(name),
            Self::Parameter(name) => view.parameter(name),
            Self::RequestUri => Some(Cow::Borrowed(view.path())),
            Self::RequestFilename => view
                .resolve_path(view.path())
                .map(|path| Cow::Owned(path.to_string_lossy().into_owned())),
            Self::QueryString => view.query_string().map(Cow::Borrowed),
            Self::Scheme => Some(Cow::Borrowed(view.scheme())),
            Self::Method => Some(Cow::Borrowed(view.method())),
            Self::Protocol => Some(Cow::Borrowed(view.protocol())),
            Self::ServerName => Some(Cow::Borrowed(view.server_name())),
            Self::Port => view.server_port().map(|p| Cow::Owned(p.to_string())),
            Self::RemoteAddr => view.remote_addr().map(Cow::Borrowed),
            Self::RemoteHost => view.remote_host().map(Cow::Borrowed),
            Self::RemoteUser => view.remote_user().map(Cow::Borrowed),
            Self::Time => time("%Y%m%d%H%M%S"),
            Self::Year => time("%Y"),
            Self::Month => time("%m"),
            Self::DayOfMonth => time("%d"),
            Self::DayOfWeek => time("%w"),
            Self::HourOfDay => time("%H"),
            Self::Minute => time("%M"),
            Self::Second => time("%S"),
        }
    }

    /// Resolve the attribute as a filesystem path.
    pub(crate) fn path(&self, view: &dyn RequestView) -> Option<PathBuf> {
        match self {
            Self::RequestFilename => view.resolve_path(view.path()),
            _ => view.resolve_path(&self.value(view)?),
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}:{name}", self.as_str()),
            None => f.write_str(self.as_str()),
        }
    }
}

/// Comparison applied between the attribute and the condition value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Matches,
    NotMatches,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    IsFile,
    NotFile,
    IsDir,
    NotDir,
}

impl Operator {
    /// Returns true when the operator matches the value as a regex
    #[inline]
    pub fn uses_pattern(&self) -> bool {
        matches!(self, Self::Matches | Self::NotMatches)
    }

    /// Returns true when the operator inspects the filesystem
    #[inline]
    pub fn is_file_test(&self) -> bool {
        matches!(self, Self::IsFile | Self::NotFile | Self::IsDir | Self::NotDir)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notequal",
            Self::Matches => "matches",
            Self::NotMatches => "notmatches",
            Self::Less => "less",
            Self::Greater => "greater",
            Self::LessOrEqual => "lessorequal",
            Self::GreaterOrEqual => "greaterorequal",
            Self::IsFile => "isfile",
            Self::NotFile => "notfile",
            Self::IsDir => "isdir",
            Self::NotDir => "notdir",
        }
    }

    /// Parse the `-lt` style integer comparison operators.
    pub(crate) fn from_compare(s: &str) -> Option<Self> {
        match s {
            "-eq" => Some(Self::Equal),
            "-ne" => Some(Self::NotEqual),
            "-lt" => Some(Self::Less),
            "-le" => Some(Self::LessOrEqual),
            "-gt" => Some(Self::Greater),
            "-ge" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }

    /// Parse the `<value` style lexical comparison prefixes.
    pub(crate) fn from_prefix(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Equal),
            "<" => Some(Self::Less),
            ">" => Some(Self::Greater),
            "<=" => Some(Self::LessOrEqual),
            ">=" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }

    /// Parse the `-f` style file-test operators.
    pub(crate) fn from_file_test(s: &str, negate: bool) -> Result<Self, CondError> {
        match (s, negate) {
            ("-f" | "-F", false) => Ok(Self::IsFile),
            ("-f" | "-F", true) => Ok(Self::NotFile),
            ("-d", false) => Ok(Self::IsDir),
            ("-d", true) => Ok(Self::NotDir),
            _ => Err(CondError::InvalidFileTest(s.to_owned())),
        }
    }

    /// Evaluate a non-pattern comparison between attribute and value.
    pub(crate) fn compare(&self, first: &str, second: &str, case_sensitive: bool) -> bool {
        let order = order(first, second, case_sensitive);
        match self {
            Self::Equal => order == Ordering::Equal,
            Self::NotEqual => order != Ordering::Equal,
            Self::Less => order == Ordering::Less,
            Self::Greater => order == Ordering::Greater,
            Self::LessOrEqual => order != Ordering::Greater,
            Self::GreaterOrEqual => order != Ordering::Less,
            _ => false,
        }
    }

    /// Evaluate a file test against a resolved path.
    pub(crate) fn test_path(&self, path: &std::path::Path) -> bool {
        match self {
            Self::IsFile => path.is_file(),
            Self::NotFile => !path.is_file(),
            Self::IsDir => path.is_dir(),
            Self::NotDir => !path.is_dir(),
            _ => false,
        }
    }
}

/// Numbers compare numerically, everything else lexically.
fn order(first: &str, second: &str, case_sensitive: bool) -> Ordering {
    if let (Ok(a), Ok(b)) = (first.trim().parse::<i64>(), second.trim().parse::<i64>()) {
        return a.cmp(&b);
    }
    match case_sensitive {
        true => first.cmp(second),
        false => UniCase::new(first).cmp(&UniCase::new(second)),
    }
}

impl FromStr for Operator {
    type Err = CondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "notequal" => Ok(Self::NotEqual),
            "matches" | "regex" => Ok(Self::Matches),
            "notmatches" | "notregex" => Ok(Self::NotMatches),
            "less" => Ok(Self::Less),
            "greater" => Ok(Self::Greater),
            "lessorequal" => Ok(Self::LessOrEqual),
            "greaterorequal" => Ok(Self::GreaterOrEqual),
            "isfile" => Ok(Self::IsFile),
            "notfile" => Ok(Self::NotFile),
            "isdir" => Ok(Self::IsDir),
            "notdir" => Ok(Self::NotDir),
            _ => Err(CondError::UnknownOperator(s.to_owned())),
        }
    }
}
