use super::error::CondError;

pub(crate) fn end_quote(s: &str, index: usize, quote: char) -> Result<usize, CondError> {
    let mut backslashes = 0;
    for (i, c) in s[index..].char_indices() {
        if c == quote && backslashes % 2 == 0 {
            return Ok(index + i);
        }
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        backslashes = 0;
    }
    Err(CondError::UnclosedQuotation(s[index - 1..].to_owned()))
}

/// Split a directive line into whitespace separated tokens.
///
/// Quoted tokens keep their whitespace, a backslash escapes the whitespace
/// character following it and a token starting with `#` ends the line.
pub(crate) fn tokenize(s: &str) -> Result<Vec<String>, CondError> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if !token.is_empty() {
                    tokens.push(std::mem::take(&mut token));
                }
            }
            '#' if token.is_empty() => break,
            '\\' if chars.peek().is_some_and(|(_, n)| n.is_whitespace()) => {
                if let Some((_, escaped)) = chars.next() {
                    token.push(escaped);
                }
            }
            '"' | '\'' if token.is_empty() => {
                let end = end_quote(s, i + 1, c)?;
                tokens.push(s[i + 1..end].to_owned());
                while chars.next_if(|(j, _)| *j <= end).is_some() {}
            }
            c => token.push(c),
        }
    }
    if !token.is_empty() {
        tokens.push(token);
    }
    Ok(tokens)
}

#[inline]
pub(crate) fn matches_start(s: &str, matches: &'static [&'static str]) -> Option<&'static str> {
    matches.iter().find(|p| s.starts_with(**p)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("  %{HTTP_HOST}   ^(.*)from\\.com$ [NC] ").unwrap(),
            vec!["%{HTTP_HOST}", r"^(.*)from\.com$", "[NC]"]
        );
        assert_eq!(
            tokenize(r#"%{HTTP:user-agent} "(Windows CE)" [OR]"#).unwrap(),
            vec!["%{HTTP:user-agent}", "(Windows CE)", "[OR]"]
        );
        assert_eq!(
            tokenize(r"%{HTTP:user-agent} (Windows\ CE) [OR]").unwrap(),
            vec!["%{HTTP:user-agent}", "(Windows CE)", "[OR]"]
        );
        assert_eq!(
            tokenize("^/$ /index.html [L] # trailing comment").unwrap(),
            vec!["^/$", "/index.html", "[L]"]
        );
        assert_eq!(tokenize("^/a#b$ /c").unwrap(), vec!["^/a#b$", "/c"]);
    }

    #[test]
    fn test_unclosed() {
        assert!(matches!(
            tokenize(r#"%{REQUEST_URI} "=/open"#),
            Err(CondError::UnclosedQuotation(_))
        ));
    }
}
