//! A minimalistic PEG parser that interprets its grammar directly.
//!
//! A [`Grammar`] maps rule names to [`Matcher`]s. A [`Parser`] starts at one
//! of the rules and either returns the [`Value`] built by the matchers, or a
//! [`ParseError`] describing how far it got.
//!
//! ```
//! use parsik::{Grammar, Matcher, Parser, Value};
//!
//! let grammar = Grammar::from_rules([(
//!     "PHONE",
//!     Matcher::sequence([
//!         Matcher::regex(r"\d{3}")?,
//!         Matcher::char('-').silent(),
//!         Matcher::regex(r"\d{4}")?,
//!     ]),
//! )])?;
//!
//! let value = Parser::new(&grammar).parse("PHONE", "123-4567")?;
//!
//! assert_eq!(value, Value::List(vec!["123".into(), "4567".into()]));
//! # Ok::<(), parsik::Error>(())
//! ```

pub mod ast;
pub mod builtin;
pub mod engine;
pub mod error;
pub mod parser;
pub mod trace;
mod utils;
pub mod value;

pub use ast::{Definition, Grammar, Matcher, MatcherKind, Transform};
pub use engine::{evaluate, CustomMatcher, Evaluator, Match};
pub use error::{Error, Expectation, ParseError, ParseErrorKind};
pub use trace::{Event, LogTracer, NoopTracer, Outcome, TableTracer, Tracer};
pub use value::Value;

use utils::line_column;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// Fail unless the rule consumes the whole input.
    pub require_eof: bool,
    /// Record a trace table and attach it to parse errors.
    pub trace: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            require_eof: true,
            trace: false,
        }
    }
}

/// Parses input against the rules of one grammar. Holds no state between
/// calls.
#[derive(Clone, Copy, Debug)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    options: Options,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self::with_options(grammar, Options::default())
    }

    pub fn with_options(grammar: &'g Grammar, options: Options) -> Self {
        Parser { grammar, options }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Parse `input` starting at `rule`, returning the rule's output.
    pub fn parse(&self, rule: &str, input: &str) -> Result<Value, Error> {
        self.run(rule, input, self.options.require_eof, None)
            .map(|m| m.output.unwrap_or_default())
    }

    /// Like [`Parser::parse`], but the match may stop before the end of input.
    pub fn parse_prefix(&self, rule: &str, input: &str) -> Result<Match, Error> {
        self.run(rule, input, false, None)
    }

    /// Parse while sending every evaluation event to `tracer`.
    pub fn parse_with(
        &self,
        rule: &str,
        input: &str,
        tracer: &mut dyn Tracer,
    ) -> Result<Value, Error> {
        self.run(rule, input, self.options.require_eof, Some(tracer))
            .map(|m| m.output.unwrap_or_default())
    }

    fn run(
        &self,
        rule: &str,
        input: &str,
        require_eof: bool,
        tracer: Option<&mut dyn Tracer>,
    ) -> Result<Match, Error> {
        let mut trace = None;

        let (res, furthest, expected) = match tracer {
            Some(tracer) => search(rule, Evaluator::with_tracer(self.grammar, input, tracer))?,
            None if self.options.trace => {
                let mut table = TableTracer::new();
                let found = search(rule, Evaluator::with_tracer(self.grammar, input, &mut table))?;
                trace = Some(table.render());
                found
            }
            None => search(rule, Evaluator::new(self.grammar, input))?,
        };

        self.report(rule, input, res, require_eof, furthest, expected, trace)
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        rule: &str,
        input: &str,
        res: Option<Match>,
        require_eof: bool,
        furthest: usize,
        expected: Vec<Expectation>,
        trace: Option<String>,
    ) -> Result<Match, Error> {
        let (kind, position, expected) = match res {
            Some(m) if !require_eof || m.end == input.len() => {
                log::debug!("`{}` matched {}..{}", rule, m.start, m.end);
                return Ok(m);
            }
            Some(m) if furthest > m.end => {
                (ParseErrorKind::Incomplete { end: m.end }, furthest, expected)
            }
            Some(m) => (
                ParseErrorKind::Incomplete { end: m.end },
                m.end,
                if furthest == m.end { expected } else { Vec::new() },
            ),
            None => (ParseErrorKind::NoMatch, furthest, expected),
        };

        let (line, column) = line_column(input, position);

        log::debug!("`{}` failed at {}:{}", rule, line, column);

        Err(Error::Parse(ParseError {
            rule: rule.to_owned(),
            input: input.to_owned(),
            position,
            line,
            column,
            kind,
            expected,
            trace,
        }))
    }
}

fn search(
    rule: &str,
    mut eval: Evaluator<'_>,
) -> Result<(Option<Match>, usize, Vec<Expectation>), Error> {
    let res = eval.evaluate(&Matcher::rule(rule), 0)?;

    Ok((res, eval.furthest(), eval.expected()))
}
