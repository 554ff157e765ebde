use std::borrow::Cow;
use std::fmt;

use crate::Error;

#[derive(Debug, Clone)]
pub(crate) struct Regex {
    backend: fancy_regex::Regex,
}

impl Regex {
    pub(crate) fn new(pattern: &str) -> Result<Self, RegexError> {
        let backend = fancy_regex::Regex::new(pattern).map_err(RegexError::from)?;
        Ok(Self { backend })
    }

    /// All non-overlapping matches, each search resuming at the previous
    /// match end.
    pub(crate) fn find_all(&self, input: &str) -> Result<Vec<Match>, RegexError> {
        let mut out = Vec::new();
        for matched in self.backend.find_iter(input) {
            let matched = matched.map_err(RegexError::from)?;
            out.push(Match::from_backend(matched));
        }
        Ok(out)
    }

    pub(crate) fn as_str(&self) -> &str {
        self.backend.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Match {
    start: usize,
    end: usize,
    text: String,
}

impl Match {
    fn from_backend(matched: fancy_regex::Match<'_>) -> Self {
        Self {
            start: matched.start(),
            end: matched.end(),
            text: matched.as_str().to_string(),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        self.text.as_str()
    }

    pub(crate) fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn end(&self) -> usize {
        self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegexError {
    message: String,
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RegexError {}

impl From<fancy_regex::Error> for RegexError {
    fn from(value: fancy_regex::Error) -> Self {
        Self {
            message: value.to_string(),
        }
    }
}

impl From<RegexError> for Error {
    fn from(value: RegexError) -> Self {
        Error::Pattern(value.message)
    }
}

/// Backslash-escapes every regex metacharacter so the result matches
/// `value` literally.
pub(crate) fn escape(value: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(value.len());
    let mut changed = false;

    for ch in value.chars() {
        if is_regex_meta(ch) {
            out.push('\\');
            changed = true;
        }
        out.push(ch);
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(value)
    }
}

fn is_regex_meta(ch: char) -> bool {
    matches!(
        ch,
        '-' | '/'
            | '\\'
            | '^'
            | '$'
            | '*'
            | '+'
            | '?'
            | '.'
            | '('
            | ')'
            | '|'
            | '['
            | ']'
            | '{'
            | '}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(value: &str) -> Regex {
        Regex::new(&escape(value))
            .unwrap_or_else(|err| panic!("escaped {value:?} failed to build: {err}"))
    }

    fn matches(re: &Regex, input: &str) -> Result<bool, RegexError> {
        Ok(!re.find_all(input)?.is_empty())
    }

    #[test]
    fn escape_borrows_when_nothing_to_escape() {
        assert!(matches!(escape("plain words"), Cow::Borrowed("plain words")));
        assert_eq!(escape("a.b"), "a\\.b");
        assert_eq!(escape("[x]-{y}"), "\\[x\\]\\-\\{y\\}");
        assert_eq!(escape("/^$|\\"), "\\/\\^\\$\\|\\\\");
    }

    #[test]
    fn escaped_pattern_matches_only_literally() -> Result<(), RegexError> {
        let dot = literal("a.b");
        assert!(matches(&dot, "xa.by")?);
        assert!(!matches(&dot, "axb")?);

        let group = literal("(a|b)+");
        assert!(matches(&group, "(a|b)+")?);
        assert!(!matches(&group, "ab")?);

        let class = literal("[a-z]");
        assert!(matches(&class, "[a-z]")?);
        assert!(!matches(&class, "q")?);
        Ok(())
    }

    #[test]
    fn find_all_reports_byte_offsets() -> Result<(), RegexError> {
        let re = Regex::new("(?i)ab")?;
        let found = re.find_all("ab xAB ab")?;
        let spans = found
            .iter()
            .map(|m| (m.start(), m.end(), m.as_str().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(
            spans,
            vec![
                (0, 2, "ab".to_string()),
                (4, 6, "AB".to_string()),
                (7, 9, "ab".to_string())
            ]
        );
        assert_eq!(re.as_str(), "(?i)ab");
        Ok(())
    }

    #[test]
    fn invalid_pattern_maps_to_pattern_error() {
        let err = Regex::new("(").map_err(Error::from);
        assert!(matches!(err, Err(Error::Pattern(_))));
    }
}
