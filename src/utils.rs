use regex::Regex;
use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

pub(crate) type Infallible<'a, T> = (T, &'a str);
pub(crate) type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: regex::Regex = regex::Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex, returning None if it doesn't match
pub(crate) fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  if let Some(m) = re.find(s) {
    if m.start() > 0 {
      return (None, s);
    }
    let (_, rest) = s.split_at(m.end());
    (Some(m.as_str()), rest)
  } else {
    (None, s)
  }
}

/// Try to consume a regex, failing if it doesn't match
pub(crate) fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, preview(s)).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
pub(crate) fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Try to consume a char, failing if it doesn't match
pub(crate) fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", c, preview(s)).into())
  }
}

/// Skips whitespace and `//` line comments
pub(crate) fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"(\s|//[^\n]*)+");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

/// The first line of the remaining input, for error messages
pub(crate) fn preview(s: &str) -> &str {
  if s.is_empty() {
    "end of input"
  } else {
    s.lines().next().unwrap_or(s)
  }
}

#[test]
fn test_skip_whitespace() {
  assert_eq!(skip_whitespace("  // a comment\n\t S -> x"), "S -> x");
  assert_eq!(skip_whitespace("S"), "S");
  assert_eq!(skip_whitespace(""), "");
}

#[test]
fn test_needed_char() {
  assert_eq!(needed_char('(', "(S x)").unwrap(), ('(', "S x)"));
  assert!(needed_char(')', "(S x)").is_err());
}
