#![cfg_attr(not(test), allow(dead_code, unused_imports))]

mod grammars;

use parsik::{
    evaluate, CustomMatcher, Error, Evaluator, Grammar, Match, Matcher, Outcome, ParseErrorKind,
    Parser, TableTracer, Value,
};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn text(s: &str) -> Value {
    Value::from(s)
}

#[test]
fn phone() {
    let grammar = grammars::phone();
    let p = Parser::new(&grammar);

    assert_eq!(
        p.parse("PHONE", "123-4567").unwrap(),
        Value::List(vec![text("123"), text("4567")])
    );
    assert_eq!(p.parse_prefix("PHONE", "123-4567").unwrap().end, 8);

    let err = p.parse("PHONE", "123-456").unwrap_err();
    let err = err.parse_error().unwrap();

    assert_eq!(err.kind, ParseErrorKind::NoMatch);
    assert!(err.position < "123-456".len());
    assert_eq!(
        err.to_string(),
        "failed to parse `PHONE` at 1:5: expected re#\\d{4}# in PHONE, found \"456\""
    );
}

#[test]
fn cyclic_reference_terminates() {
    let grammar = Grammar::from_rules([
        ("A", Matcher::optional("B")),
        ("B", Matcher::rule("A")),
    ])
    .unwrap();

    assert_eq!(Parser::new(&grammar).parse("A", "").unwrap(), Value::Empty);
}

#[test]
fn self_reference_fails_without_looping() {
    let grammar = Grammar::from_rules([("A", "A")]).unwrap();

    assert!(matches!(
        Parser::new(&grammar).parse("A", "x"),
        Err(Error::Parse(_))
    ));
}

#[test]
fn forward_references_and_recursion() {
    let grammar = grammars::nested_lists();
    let p = Parser::new(&grammar);

    assert_eq!(p.parse("list", "[1,[2,3],[]]").unwrap().flatten_text(), "123");
    assert_eq!(p.parse("list", "[]").unwrap().flatten_text(), "");

    let err = p.parse("list", "[1,[2,3]").unwrap_err();
    assert_eq!(err.parse_error().map(|e| e.position), Some(8));
}

#[test]
fn sequence_failure_is_observed_at_start() {
    let grammar = Grammar::from_rules([(
        "start",
        Matcher::any([
            Matcher::sequence(['a', 'b', 'c']),
            Matcher::sequence(['a', 'b', 'd']),
        ]),
    )])
    .unwrap();

    assert_eq!(
        Parser::new(&grammar).parse("start", "abd").unwrap(),
        Value::List(vec![text("a"), text("b"), text("d")])
    );

    let seq = Matcher::sequence(['a', 'b']);
    assert!(evaluate(&seq, &grammar, "ac", 0).unwrap().is_none());
    assert_eq!(evaluate(&seq, &grammar, "xab", 1).unwrap().unwrap().start, 1);
}

#[test]
fn ordered_choice_takes_first_success() {
    let grammar = Grammar::from_rules([(
        "start",
        Matcher::any([Matcher::regex("ab?").unwrap(), Matcher::regex("abc").unwrap()]),
    )])
    .unwrap();
    let p = Parser::new(&grammar);

    let m = p.parse_prefix("start", "abc").unwrap();
    assert_eq!((m.end, m.output), (2, Some(text("ab"))));

    // the longer alternative is never tried
    assert!(p.parse("start", "abc").is_err());
}

#[test]
fn zero_width_matches() {
    let grammar = Grammar::new();

    for (matcher, pos) in [
        (Matcher::eof(), 2),
        (Matcher::fail('x'), 1),
        (Matcher::optional('x'), 1),
        (Matcher::zero_or_more('x'), 1),
    ] {
        let m = evaluate(&matcher, &grammar, "ab", pos).unwrap().unwrap();

        assert_eq!((m.start, m.end), (pos, pos), "{}", matcher);
    }
}

#[test]
fn silent_child_is_still_required() {
    let grammar = Grammar::from_notation("kv <- re#[a-z]+# ~'=' re#[0-9]+#").unwrap();
    let p = Parser::new(&grammar);

    assert_eq!(p.parse("kv", "x=1").unwrap().to_string(), r#"["x", "1"]"#);
    assert!(p.parse("kv", "x1").is_err());
}

#[test]
fn on_match_builds_values() {
    let mut grammar = Grammar::from_notation(
        r#"
        pair   <- key ~'=' number
        key    <- re#[a-z]+#
        number <- re#-?[0-9]+#
        "#,
    )
    .unwrap();

    grammar
        .on_match("number", |v| {
            v.as_str()
                .and_then(|s| s.parse().ok())
                .map(Value::Int)
                .unwrap_or_default()
        })
        .unwrap()
        .on_match("key", |v| Value::Text(v.flatten_text().to_uppercase()))
        .unwrap();

    assert_eq!(
        Parser::new(&grammar).parse("pair", "answer=-42").unwrap(),
        Value::List(vec![text("ANSWER"), Value::Int(-42)])
    );
}

#[test]
fn on_match_runs_once_per_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let grammar = Grammar::from_rules([(
        "digits",
        Matcher::one_or_more(Matcher::regex("[0-9]").unwrap().on_match(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v
        })),
    )])
    .unwrap();

    Parser::new(&grammar).parse("digits", "1234").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn undefined_rule_is_distinct_from_parse_failure() {
    let grammar = Grammar::from_notation("start <- 'a' / missing").unwrap();
    let p = Parser::new(&grammar);

    assert!(p.parse("start", "a").is_ok());
    assert!(matches!(
        p.parse("start", "b"),
        Err(Error::UndefinedRule(name)) if name == "missing"
    ));
}

#[test]
fn incomplete_parse() {
    let grammar = grammars::phone();
    let err = Parser::new(&grammar).parse("PHONE", "123-4567 ").unwrap_err();

    assert_eq!(
        err.parse_error().map(|e| e.kind.clone()),
        Some(ParseErrorKind::Incomplete { end: 8 })
    );
}

#[test]
fn multibyte_input() {
    let grammar = Grammar::from_notation("word <- ('µ' / .)+ EOF").unwrap();
    let m = Parser::new(&grammar).parse_prefix("word", "aµ€").unwrap();

    assert_eq!(m.end, "aµ€".len());
    assert_eq!(m.output.unwrap().flatten_text(), "aµ€");
}

/// Matches an opening bracket up to its balancing closing bracket.
#[derive(Debug)]
struct Balanced(char, char);

impl fmt::Display for Balanced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "balanced({}{})", self.0, self.1)
    }
}

impl CustomMatcher for Balanced {
    fn evaluate(&self, eval: &mut Evaluator<'_>, pos: usize) -> Result<Option<Match>, Error> {
        let input = eval.input();

        if !input[pos..].starts_with(self.0) {
            return Ok(None);
        }

        let mut depth = 0;

        for (off, ch) in input[pos..].char_indices() {
            if ch == self.0 {
                depth += 1;
            } else if ch == self.1 {
                depth -= 1;

                if depth == 0 {
                    let end = pos + off + ch.len_utf8();

                    return Ok(Some(Match {
                        start: pos,
                        end,
                        output: Some(Value::from(&input[pos..end])),
                    }));
                }
            }
        }

        Ok(None)
    }
}

#[test]
fn custom_matcher_composes() {
    let grammar = Grammar::from_rules([(
        "call",
        Matcher::sequence([
            Matcher::regex("[a-z]+").unwrap(),
            Matcher::custom(Balanced('(', ')')),
            Matcher::eof().silent(),
        ]),
    )])
    .unwrap();
    let p = Parser::new(&grammar);

    assert_eq!(
        p.parse("call", "f(a(b)c)").unwrap(),
        Value::List(vec![text("f"), text("(a(b)c)")])
    );

    let err = p.parse("call", "f(a(b)c").unwrap_err();
    let err = err.parse_error().unwrap();

    assert_eq!(err.position, 1);
    assert_eq!(err.expected[0].matcher, "balanced(())");
    assert_eq!(err.expected[0].rule.as_deref(), Some("call"));
}

#[test]
fn trace_events() {
    let grammar = grammars::phone();
    let mut table = TableTracer::new();

    let _ = Parser::new(&grammar).parse_with("PHONE", "123-45", &mut table);

    let rows = table.rows();

    assert_eq!(rows[0].outcome, Outcome::Pending);
    assert_eq!(rows[0].rule, "PHONE");
    assert_eq!(rows.last().map(|r| r.outcome), Some(Outcome::Failure));
    assert!(rows
        .iter()
        .any(|r| r.outcome == Outcome::Success && r.output == "\"123\""));
}

#[test]
fn grammar_is_shared_between_threads() {
    let grammar = Arc::new(grammars::phone());

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let grammar = grammar.clone();
            std::thread::spawn(move || {
                let input = format!("{0}{0}{0}-{0}{0}{0}{0}", n);
                Parser::new(&grammar)
                    .parse("PHONE", &input)
                    .map(|v| v.flatten_text())
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap().unwrap(), n.to_string().repeat(7));
    }
}

#[test]
fn calculator() {
    let grammar = grammars::calculator();
    let p = Parser::new(&grammar);

    for (input, result) in [
        ("1", 1.0),
        ("1 + 2 * 3", 7.0),
        ("(1 + 2) * 3", 9.0),
        ("10 - 4 - 3", 3.0),
        (" 2 ^ 3 / 4 ", 2.0),
        ("2 ^ 3 ^ 2", 512.0),
        ("7 % 4 * 2", 6.0),
        ("2 + 17 % 5", 4.0),
        ("0.5 * 4", 2.0),
    ] {
        assert_eq!(
            p.parse("calculator", input).unwrap(),
            Value::Float(result),
            "{}",
            input
        );
    }

    assert!(p.parse("calculator", "1 +").is_err());
    assert!(p.parse("calculator", "(1").is_err());
    // numbers have no sign
    assert!(p.parse("calculator", "-2").is_err());
}


#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn success_never_moves_backwards(input in "[ab ]{0,12}", pos in 0usize..12) {
            let grammar = Grammar::from_notation(
                "start <- (word / ~' ')*\nword <- re#[ab]+# / 'b'?",
            ).unwrap();
            let pos = pos.min(input.len());

            if let Some(m) = evaluate(&Matcher::rule("start"), &grammar, &input, pos).unwrap() {
                prop_assert!(m.end >= m.start);
                prop_assert_eq!(m.start, pos);
            }
        }

        #[test]
        fn sequence_is_all_or_nothing(input in "[xy]{0,6}") {
            let grammar = Grammar::new();
            let seq = Matcher::sequence(['x', 'y', 'x']);
            let res = evaluate(&seq, &grammar, &input, 0).unwrap();

            prop_assert_eq!(res.is_some(), input.starts_with("xyx"));
        }

        #[test]
        fn calculator_adds(a in 0i32..1000, b in 0i32..1000) {
            let grammar = grammars::calculator();
            let value = Parser::new(&grammar)
                .parse("calculator", &format!("{} + {}", a, b))
                .unwrap();

            prop_assert_eq!(value, Value::Float(f64::from(a + b)));
        }
    }
}
