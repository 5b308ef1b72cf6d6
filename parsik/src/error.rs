//! Errors reported by grammar construction and parsing.
//!
//! An input that does not match is not an error inside the engine; it only
//! becomes [`Error::Parse`] at the [`Parser`](crate::Parser) boundary. Every
//! other variant means the grammar itself is wrong.

use std::fmt;
use thiserror::Error;

use crate::utils::{escape_string, truncate};

#[derive(Debug, Error)]
pub enum Error {
    #[error("undefined rule `{0}`")]
    UndefinedRule(String),
    #[error("duplicate rule `{0}`")]
    DuplicateRule(String),
    #[error(transparent)]
    Regex(#[from] regex_automata::meta::BuildError),
    #[error(transparent)]
    Parse(ParseError),
    #[error("invalid grammar notation: {0}")]
    Notation(#[source] ParseError),
    #[error("invalid repetition bound `{0}`")]
    InvalidRepeat(String),
}

impl Error {
    /// The parse failure carried by this error, if any.
    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            Error::Parse(err) | Error::Notation(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The rule did not match at the start of the input.
    NoMatch,
    /// The rule matched, but stopped at `end` before the end of input.
    Incomplete { end: usize },
}

/// Something the parser tried at the furthest failure position.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expectation {
    /// Innermost rule being evaluated when the attempt failed.
    pub rule: Option<String>,
    /// Rendering of the matcher that failed.
    pub matcher: String,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "{} in {}", self.matcher, rule),
            None => write!(f, "{}", self.matcher),
        }
    }
}

/// A reported failure of [`Parser::parse`](crate::Parser::parse).
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub rule: String,
    pub input: String,
    /// Furthest byte offset the parser reached.
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
    pub expected: Vec<Expectation>,
    /// Rendered trace table, when tracing was enabled.
    pub trace: Option<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::NoMatch => write!(
                f,
                "failed to parse `{}` at {}:{}",
                self.rule, self.line, self.column
            )?,
            ParseErrorKind::Incomplete { end } => write!(
                f,
                "`{}` matched only up to offset {}, input continues at {}:{}",
                self.rule, end, self.line, self.column
            )?,
        }

        if !self.expected.is_empty() {
            let expected = self
                .expected
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<String>>()
                .join(", ");

            write!(f, ": expected {}", expected)?;
        }

        let rest = &self.input[self.position.min(self.input.len())..];

        if rest.is_empty() {
            write!(f, ", found end of input")
        } else {
            write!(f, ", found \"{}\"", escape_string(&truncate(rest, 20)))
        }
    }
}

impl std::error::Error for ParseError {}
