//! The recursive-descent evaluator.
//!
//! Every matcher is evaluated against `(input, pos)` and yields
//! `Ok(Some(Match))` on success or `Ok(None)` when it does not match. Since
//! positions are plain values, a failed attempt never moves the caller; there
//! is nothing to restore. `Err` is reserved for a broken grammar, such as a
//! reference to a rule that does not exist.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::iter;

use crate::ast::{Grammar, Matcher, MatcherKind};
use crate::error::Expectation;
use crate::trace::{Event, Outcome, Tracer};
use crate::{Error, Value};

/// A successful match of the input from `start` to `end`.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    /// `None` when the matcher produces nothing for its parent, e.g. because
    /// it is silent.
    pub output: Option<Value>,
}

impl Match {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A matcher defined outside this crate. It can be used anywhere a built-in
/// matcher can through [`Matcher::custom`].
pub trait CustomMatcher: fmt::Debug + fmt::Display + Send + Sync {
    fn evaluate(&self, eval: &mut Evaluator<'_>, pos: usize) -> Result<Option<Match>, Error>;
}

/// Evaluate `matcher` at `pos`.
pub fn evaluate(
    matcher: &Matcher,
    grammar: &Grammar,
    input: &str,
    pos: usize,
) -> Result<Option<Match>, Error> {
    Evaluator::new(grammar, input).evaluate(matcher, pos)
}

/// State of one parse: the grammar and input, plus what is needed to guard
/// rule re-entry and to report the furthest failure.
pub struct Evaluator<'a> {
    grammar: &'a Grammar,
    input: &'a str,
    tracer: Option<&'a mut dyn Tracer>,
    /// (definition, position) pairs currently being evaluated
    active: HashSet<(usize, usize)>,
    rules: Vec<usize>,
    furthest: usize,
    expected: BTreeSet<Expectation>,
    lookahead: usize,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(grammar: &'a Grammar, input: &'a str) -> Self {
        Evaluator {
            grammar,
            input,
            tracer: None,
            active: HashSet::new(),
            rules: Vec::new(),
            furthest: 0,
            expected: BTreeSet::new(),
            lookahead: 0,
            depth: 0,
        }
    }

    pub fn with_tracer(grammar: &'a Grammar, input: &'a str, tracer: &'a mut dyn Tracer) -> Self {
        Evaluator {
            tracer: Some(tracer),
            ..Evaluator::new(grammar, input)
        }
    }

    pub fn grammar(&self) -> &'a Grammar {
        self.grammar
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Furthest position at which a primitive failed to match.
    pub fn furthest(&self) -> usize {
        self.furthest
    }

    /// What was tried at [`Evaluator::furthest`].
    pub fn expected(&self) -> Vec<Expectation> {
        self.expected.iter().cloned().collect()
    }

    /// Evaluate `matcher` at `pos`. A position past the end of the input or
    /// inside a character never matches.
    pub fn evaluate(&mut self, matcher: &Matcher, pos: usize) -> Result<Option<Match>, Error> {
        if !self.input.is_char_boundary(pos) {
            return Ok(None);
        }

        self.trace(matcher, pos, pos, None, Outcome::Pending);

        self.depth += 1;
        let res = self.evaluate_kind(matcher, pos);
        self.depth -= 1;

        match res? {
            Some(m) => {
                let m = finish(matcher, m);
                self.trace(matcher, m.start, m.end, m.output.as_ref(), Outcome::Success);
                Ok(Some(m))
            }
            None => {
                if is_primitive(matcher) {
                    self.note_failure(matcher, pos);
                }
                self.trace(matcher, pos, pos, None, Outcome::Failure);
                Ok(None)
            }
        }
    }

    fn evaluate_kind(&mut self, matcher: &Matcher, pos: usize) -> Result<Option<Match>, Error> {
        match &matcher.kind {
            MatcherKind::Char(ch) => Ok(if self.input[pos..].starts_with(*ch) {
                Some(self.matched(pos, pos + ch.len_utf8()))
            } else {
                None
            }),
            MatcherKind::Regex(pattern) => Ok(pattern
                .match_at(self.input, pos)
                .map(|len| self.matched(pos, pos + len))),
            MatcherKind::Eof => Ok(if pos == self.input.len() {
                Some(self.matched(pos, pos))
            } else {
                None
            }),
            MatcherKind::Rule(name) => self.evaluate_rule(name, pos),
            MatcherKind::Optional(inner) => Ok(Some(self.evaluate(inner, pos)?.unwrap_or(
                Match {
                    start: pos,
                    end: pos,
                    output: Some(Value::Empty),
                },
            ))),
            MatcherKind::Any(list) => {
                for matcher in list {
                    if let Some(m) = self.evaluate(matcher, pos)? {
                        return Ok(Some(m));
                    }
                }

                Ok(None)
            }
            MatcherKind::Sequence(list) => {
                let mut outputs = Vec::new();
                let mut end = pos;

                for matcher in list {
                    match self.evaluate(matcher, end)? {
                        Some(m) => {
                            end = m.end;
                            outputs.extend(m.output);
                        }
                        None => return Ok(None),
                    }
                }

                Ok(Some(Match {
                    start: pos,
                    end,
                    output: Some(Value::List(outputs)),
                }))
            }
            MatcherKind::Times { inner, min, max } => self.evaluate_times(inner, *min, *max, pos),
            MatcherKind::Fail(inner) => {
                self.lookahead += 1;
                let res = self.evaluate(inner, pos);
                self.lookahead -= 1;

                Ok(match res? {
                    Some(_) => None,
                    None => Some(Match {
                        start: pos,
                        end: pos,
                        output: None,
                    }),
                })
            }
            MatcherKind::Custom(custom) => custom.evaluate(self, pos),
        }
    }

    fn evaluate_rule(&mut self, name: &str, pos: usize) -> Result<Option<Match>, Error> {
        let grammar = self.grammar;

        let (def_no, matcher) = grammar
            .resolve(name)
            .ok_or_else(|| Error::UndefinedRule(name.to_owned()))?;

        if !self.active.insert((def_no, pos)) {
            log::debug!(
                "rule `{}` re-entered at offset {} without consuming input",
                name,
                pos
            );
            return Ok(None);
        }

        self.rules.push(def_no);
        let res = self.evaluate(matcher, pos);
        self.rules.pop();
        self.active.remove(&(def_no, pos));

        res
    }

    fn evaluate_times(
        &mut self,
        inner: &Matcher,
        min: usize,
        max: Option<usize>,
        pos: usize,
    ) -> Result<Option<Match>, Error> {
        let mut outputs = Vec::new();
        let mut count = 0;
        let mut end = pos;

        while max.map_or(true, |max| count < max) {
            let Some(m) = self.evaluate(inner, end)? else {
                break;
            };

            count += 1;

            if m.end == end {
                // zero width: every further attempt would match the same way
                let missing = min.saturating_sub(count);
                count += missing;
                outputs.extend(iter::repeat(m.output).take(missing + 1).flatten());
                break;
            }

            end = m.end;
            outputs.extend(m.output);
        }

        if count < min || max.map_or(false, |max| count > max) {
            return Ok(None);
        }

        Ok(Some(Match {
            start: pos,
            end,
            output: Some(Value::List(outputs)),
        }))
    }

    fn matched(&self, start: usize, end: usize) -> Match {
        Match {
            start,
            end,
            output: Some(Value::Text(self.input[start..end].to_owned())),
        }
    }

    fn note_failure(&mut self, matcher: &Matcher, pos: usize) {
        if self.lookahead != 0 || pos < self.furthest {
            return;
        }

        if pos > self.furthest {
            self.furthest = pos;
            self.expected.clear();
        }

        let rule = self
            .rules
            .last()
            .map(|def_no| self.grammar.definitions()[*def_no].name.clone());

        self.expected.insert(Expectation {
            rule,
            matcher: Matcher::from(matcher.kind.clone()).to_string(),
        });
    }

    fn trace(
        &mut self,
        matcher: &Matcher,
        start: usize,
        end: usize,
        output: Option<&Value>,
        outcome: Outcome,
    ) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            let input = if outcome == Outcome::Success {
                &self.input[start..end]
            } else {
                &self.input[start..]
            };

            tracer.event(&Event {
                start,
                end,
                input,
                output,
                outcome,
                rule: matcher.rule_name(),
                matcher,
                depth: self.depth,
            });
        }
    }
}

fn is_primitive(matcher: &Matcher) -> bool {
    matches!(
        matcher.kind,
        MatcherKind::Char(_) | MatcherKind::Regex(_) | MatcherKind::Eof | MatcherKind::Custom(_)
    )
}

/// Apply the `silent` and `on_match` modifiers to a successful match.
fn finish(matcher: &Matcher, mut m: Match) -> Match {
    if matcher.silent {
        m.output = None;
    } else if let Some(transform) = &matcher.on_match {
        m.output = Some(transform(m.output.take().unwrap_or_default()));
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn eval(matcher: &Matcher, input: &str, pos: usize) -> Option<Match> {
        evaluate(matcher, &Grammar::new(), input, pos).unwrap()
    }

    fn text(s: &str) -> Option<Value> {
        Some(Value::from(s))
    }

    #[test]
    fn char_advances_by_utf8_length() {
        let m = eval(&Matcher::char('µ'), "aµb", 1).unwrap();

        assert_eq!((m.start, m.end), (1, 3));
        assert_eq!(m.output, text("µ"));
        assert!(eval(&Matcher::char('µ'), "aµb", 0).is_none());
        assert!(eval(&Matcher::char('x'), "", 0).is_none());
    }

    #[test]
    fn regex_is_anchored() {
        let digits = Matcher::regex(r"\d+").unwrap();

        assert_eq!(eval(&digits, "ab12c", 2).unwrap().output, text("12"));
        assert!(eval(&digits, "ab12c", 0).is_none());
        // alternation inside the pattern stays anchored as a whole
        let alt = Matcher::regex("x|b").unwrap();
        assert!(eval(&alt, "ab", 0).is_none());
    }

    #[test]
    fn regex_sees_preceding_text() {
        let word = Matcher::regex(r"\bfoo").unwrap();

        assert!(eval(&word, "xfoo", 1).is_none());
        assert_eq!(eval(&word, "x foo", 2).unwrap().end, 5);

        let start = Matcher::regex("^a").unwrap();

        assert!(eval(&start, "ba", 1).is_none());
        assert_eq!(eval(&start, "ab", 0).unwrap().end, 1);
    }

    #[rstest]
    #[case(5)]
    #[case(2)]
    fn invalid_positions_never_match(#[case] pos: usize) {
        let grammar = Grammar::from_rules([("any", Matcher::custom(crate::builtin::Dot))]).unwrap();

        // byte 2 is inside µ
        for matcher in [
            Matcher::char('a'),
            Matcher::regex("").unwrap(),
            Matcher::eof(),
            Matcher::optional('a'),
            Matcher::rule("any"),
        ] {
            assert!(evaluate(&matcher, &grammar, "aµ", pos).unwrap().is_none());
        }
    }

    #[test]
    fn eof_is_zero_width() {
        let m = eval(&Matcher::eof(), "ab", 2).unwrap();

        assert_eq!((m.start, m.end), (2, 2));
        assert!(eval(&Matcher::eof(), "ab", 1).is_none());
    }

    #[test]
    fn optional_never_fails() {
        let m = eval(&Matcher::optional('x'), "y", 0).unwrap();

        assert!(m.is_empty());
        assert_eq!(m.output, Some(Value::Empty));
        assert_eq!(eval(&Matcher::optional('y'), "y", 0).unwrap().end, 1);
    }

    #[test]
    fn any_is_ordered_choice() {
        let m = Matcher::any([Matcher::char('a'), Matcher::regex("a+").unwrap()]);
        let res = eval(&m, "aaa", 0).unwrap();

        assert_eq!(res.end, 1);
        assert_eq!(res.output, text("a"));
        assert!(eval(&Matcher::any(['x', 'y']), "z", 0).is_none());
    }

    #[test]
    fn sequence_is_atomic() {
        let m = Matcher::sequence(['a', 'b']);

        assert!(eval(&m, "ac", 0).is_none());
        assert_eq!(
            eval(&m, "abc", 0).unwrap().output,
            Some(Value::List(vec![Value::from("a"), Value::from("b")]))
        );

        // a failed sequence inside an alternative leaves the position untouched
        let m = Matcher::any([Matcher::sequence(['a', 'b']), Matcher::sequence(['a', 'c'])]);
        assert_eq!(eval(&m, "ac", 0).unwrap().end, 2);
    }

    #[rstest]
    #[case("aa", true, 2)]
    #[case("aaa", true, 3)]
    #[case("aaaa", true, 3)]
    #[case("a", false, 0)]
    #[case("", false, 0)]
    fn times_bounds(#[case] input: &str, #[case] ok: bool, #[case] end: usize) {
        let res = eval(&Matcher::times('a', 2..=3), input, 0);

        assert_eq!(res.is_some(), ok);
        if let Some(m) = res {
            assert_eq!(m.end, end);
            assert_eq!(m.output.unwrap().into_list().len(), end);
        }
    }

    #[test]
    fn zero_width_repetition_terminates() {
        let m = Matcher::zero_or_more(Matcher::optional('x'));
        let res = eval(&m, "xxy", 0).unwrap();

        assert_eq!(res.end, 2);

        let m = Matcher::times(Matcher::optional('x'), 2..=3);
        let res = eval(&m, "y", 0).unwrap();

        assert_eq!(res.end, 0);
        assert_eq!(
            res.output,
            Some(Value::List(vec![Value::Empty, Value::Empty]))
        );
    }

    #[test]
    fn times_with_empty_range_never_matches() {
        assert!(eval(&Matcher::times('a', 0..0), "aaa", 0).is_none());
        assert!(eval(&Matcher::times('a', 3..=2), "aaa", 0).is_none());
    }

    #[test]
    fn fail_inverts_without_consuming() {
        let m = Matcher::fail('a');

        let res = eval(&m, "b", 0).unwrap();
        assert!(res.is_empty());
        assert_eq!(res.output, None);
        assert!(eval(&m, "a", 0).is_none());
    }

    #[test]
    fn silent_and_on_match() {
        let m = Matcher::sequence([
            Matcher::char('a').silent(),
            Matcher::char('b').on_match(|v| Value::Text(v.flatten_text().to_uppercase())),
        ]);

        assert_eq!(
            eval(&m, "ab", 0).unwrap().output,
            Some(Value::List(vec![Value::from("B")]))
        );

        // silent wins over on_match
        let m = Matcher::char('a').silent().on_match(|_| Value::Int(1));
        assert_eq!(eval(&m, "a", 0).unwrap().output, None);

        // on_match sees Empty when the raw output is absent
        let m = Matcher::fail('z').on_match(|v| Value::Bool(v.is_empty()));
        assert_eq!(eval(&m, "a", 0).unwrap().output, Some(Value::Bool(true)));
    }

    #[test]
    fn undefined_rule_is_an_error() {
        let m = Matcher::any([Matcher::char('a'), Matcher::rule("missing")]);
        let res = evaluate(&m, &Grammar::new(), "b", 0);

        assert!(matches!(res, Err(Error::UndefinedRule(name)) if name == "missing"));
    }

    #[test]
    fn rules_are_resolved_late() {
        let grammar = Grammar::from_rules([
            (
                "list",
                Matcher::sequence([Matcher::rule("item"), Matcher::optional("more")]),
            ),
            (
                "more",
                Matcher::sequence([Matcher::char(',').silent(), Matcher::rule("list")]),
            ),
            ("item", Matcher::regex("[a-z]").unwrap()),
        ])
        .unwrap();

        let res = evaluate(&"list".into(), &grammar, "a,b,c", 0).unwrap().unwrap();

        assert_eq!(res.end, 5);
        assert_eq!(res.output.unwrap().flatten_text(), "abc");
    }

    #[test]
    fn reentry_at_same_position_fails() {
        let grammar = Grammar::from_rules([("A", Matcher::rule("A"))]).unwrap();

        assert!(evaluate(&"A".into(), &grammar, "x", 0).unwrap().is_none());
    }

    #[test]
    fn furthest_failure_is_tracked() {
        let grammar = Grammar::from_rules([(
            "PHONE",
            Matcher::sequence([
                Matcher::regex(r"\d{3}").unwrap(),
                Matcher::char('-').silent(),
                Matcher::regex(r"\d{4}").unwrap(),
            ]),
        )])
        .unwrap();

        let mut eval = Evaluator::new(&grammar, "123-456");

        assert!(eval.evaluate(&"PHONE".into(), 0).unwrap().is_none());
        assert_eq!(eval.furthest(), 4);
        assert_eq!(
            eval.expected(),
            vec![Expectation {
                rule: Some(String::from("PHONE")),
                matcher: String::from(r"re#\d{4}#"),
            }]
        );
    }

    #[test]
    fn lookahead_does_not_move_furthest() {
        let m = Matcher::sequence([Matcher::fail(Matcher::sequence(['a', 'b', 'c'])), 'a'.into()]);
        let grammar = Grammar::new();
        let mut eval = Evaluator::new(&grammar, "abx");

        assert!(eval.evaluate(&m, 0).unwrap().is_some());
        assert_eq!(eval.furthest(), 0);
        assert!(eval.expected().is_empty());
    }
}
