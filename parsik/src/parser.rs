//! The grammar notation.
//!
//! ```text
//! // comments run to the end of the line
//! PHONE  <- digits{3} ~'-' digits{4}
//! digits <- re#[0-9]#
//! ```
//!
//! Alternatives are separated by `/`. Items may be prefixed with `~` (silent),
//! `!` (must not match) or `&` (must match, without consuming), and suffixed
//! with `?`, `*`, `+` or `{min}`, `{min,}`, `{min,max}`. Primaries are quoted
//! literals, `re#...#` regular expressions, `.`, parenthesised expressions,
//! the empty sequence `()` and rule names. `EOF`, `WHITESPACE` and `XID_IDENTIFIER` name built-in
//! matchers.
//!
//! The notation is itself described by a [`Grammar`] and parsed by the
//! engine; the `on_match` callbacks of that grammar shape the output into
//! tagged lists that are then turned into matchers.

use std::ops::Bound;

use crate::ast::{Grammar, Matcher};
use crate::builtin::{Dot, Whitespace, XidIdentifier};
use crate::{Error, Parser, Value};

impl Grammar {
    /// Load a grammar written in the notation. Rule references are not
    /// checked; an undefined rule is only reported when it is evaluated.
    pub fn from_notation(src: &str) -> Result<Grammar, Error> {
        parse(src)
    }
}

pub fn parse(src: &str) -> Result<Grammar, Error> {
    let notation = notation()?;

    let definitions = Parser::new(&notation)
        .parse("grammar", src)
        .map_err(|err| match err {
            Error::Parse(err) => Error::Notation(err),
            err => err,
        })?;

    let mut grammar = Grammar::new();

    for def in definitions.into_list() {
        let mut parts = def.into_list().into_iter();

        match (parts.next(), parts.next()) {
            (Some(Value::Text(name)), Some(expr)) => {
                let matcher = collect_expr(expr)?;
                grammar.define(name, matcher)?;
            }
            _ => unreachable!(),
        }
    }

    log::debug!("loaded grammar with {} rules", grammar.len());

    Ok(grammar)
}

fn rule(name: &str) -> Matcher {
    Matcher::rule(name)
}

fn tag(name: &'static str) -> impl Fn(Value) -> Value + Send + Sync + 'static {
    move |value| Value::List(vec![Value::from(name), value])
}

fn first(value: Value) -> Value {
    value.into_list().into_iter().next().unwrap_or_default()
}

/// `[first, [rest...]]` becomes `first` alone, or `[name, first, rest...]`.
fn collapse(name: &'static str) -> impl Fn(Value) -> Value + Send + Sync + 'static {
    move |value| {
        let mut parts = value.into_list().into_iter();
        let first = parts.next().unwrap_or_default();
        let rest = parts.next().map(Value::into_list).unwrap_or_default();

        if rest.is_empty() {
            first
        } else {
            let mut list = vec![Value::from(name), first];
            list.extend(rest);
            Value::List(list)
        }
    }
}

fn prefix(value: Value) -> Value {
    let mut parts = value.into_list().into_iter();
    let op = parts.next().unwrap_or_default();
    let expr = parts.next().unwrap_or_default();

    let name = match op.as_str() {
        Some("~") => "silent",
        Some("!") => "not",
        Some("&") => "and",
        _ => return expr,
    };

    Value::List(vec![Value::from(name), expr])
}

fn suffix(value: Value) -> Value {
    let mut parts = value.into_list().into_iter();
    let expr = parts.next().unwrap_or_default();
    let op = parts.next().unwrap_or_default();

    let (min, max) = match op {
        Value::Text(op) if op == "?" => {
            return Value::List(vec![Value::from("optional"), expr]);
        }
        Value::Text(op) if op == "*" => (Value::from("0"), Value::Empty),
        Value::Text(op) if op == "+" => (Value::from("1"), Value::Empty),
        Value::List(repeat) => {
            let mut repeat = repeat.into_iter().skip(1);
            let min = repeat.next().unwrap_or_default();
            let max = repeat.next().unwrap_or_default();
            (min, max)
        }
        _ => return expr,
    };

    Value::List(vec![Value::from("times"), expr, min, max])
}

/// `[min]`, `[min, [max]]` or `[min, [()]]` for `{min}`, `{min,max}` and `{min,}`.
fn repeat(value: Value) -> Value {
    let mut parts = value.into_list().into_iter();
    let min = parts.next().unwrap_or_default();

    let max = match parts.next() {
        Some(Value::List(max)) => max.into_iter().next().unwrap_or_default(),
        _ => min.clone(),
    };

    Value::List(vec![Value::from("repeat"), min, max])
}

/// The grammar of the notation.
fn notation() -> Result<Grammar, Error> {
    let mut grammar = Grammar::new();

    grammar
        .define(
            "grammar",
            Matcher::sequence([
                rule("ws"),
                Matcher::zero_or_more(
                    Matcher::sequence([rule("definition"), rule("ws")]).on_match(first),
                ),
                Matcher::eof().silent(),
            ])
            .on_match(first),
        )?
        .define("ws", Matcher::regex(r"(?:\s|//[^\n]*)*")?.silent())?
        .define(
            "definition",
            Matcher::sequence([
                rule("identifier"),
                rule("ws"),
                Matcher::regex("<-")?.silent(),
                rule("ws"),
                rule("choice"),
            ]),
        )?
        .define("identifier", Matcher::custom(XidIdentifier))?
        .define(
            "choice",
            Matcher::sequence([
                rule("sequence"),
                Matcher::zero_or_more(
                    Matcher::sequence([
                        rule("ws"),
                        Matcher::char('/').silent(),
                        rule("ws"),
                        rule("sequence"),
                    ])
                    .on_match(first),
                ),
            ])
            .on_match(collapse("any")),
        )?
        .define(
            "sequence",
            Matcher::sequence([
                rule("prefixed"),
                Matcher::zero_or_more(
                    Matcher::sequence([
                        rule("ws"),
                        // the next definition starts here
                        Matcher::fail(Matcher::sequence([
                            rule("identifier"),
                            rule("ws"),
                            Matcher::regex("<-")?,
                        ])),
                        rule("prefixed"),
                    ])
                    .on_match(first),
                ),
            ])
            .on_match(collapse("seq")),
        )?
        .define(
            "prefixed",
            Matcher::sequence([
                Matcher::optional(Matcher::regex("[~!&]")?),
                rule("suffixed"),
            ])
            .on_match(prefix),
        )?
        .define(
            "suffixed",
            Matcher::sequence([
                rule("primary"),
                Matcher::optional(Matcher::any([Matcher::regex(r"[?*+]")?, rule("repeat")])),
            ])
            .on_match(suffix),
        )?
        .define(
            "repeat",
            Matcher::sequence([
                Matcher::char('{').silent(),
                rule("ws"),
                rule("number"),
                rule("ws"),
                Matcher::optional(Matcher::sequence([
                    Matcher::char(',').silent(),
                    rule("ws"),
                    Matcher::optional(rule("number")),
                ])),
                rule("ws"),
                Matcher::char('}').silent(),
            ])
            .on_match(repeat),
        )?
        .define("number", Matcher::regex("[0-9]+")?)?
        .define(
            "primary",
            Matcher::any([
                Matcher::sequence([
                    Matcher::char('(').silent(),
                    rule("ws"),
                    rule("choice"),
                    rule("ws"),
                    Matcher::char(')').silent(),
                ])
                .on_match(first),
                Matcher::sequence([
                    Matcher::char('(').silent(),
                    rule("ws"),
                    Matcher::char(')').silent(),
                ])
                .on_match(tag("empty")),
                Matcher::regex(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#)?.on_match(tag("lit")),
                Matcher::regex(r"re#(?:[^#\\]|\\.)*#")?.on_match(tag("re")),
                Matcher::char('.').on_match(tag("dot")),
                rule("identifier").on_match(tag("ref")),
            ]),
        )?;

    Ok(grammar)
}

fn collect_expr(value: Value) -> Result<Matcher, Error> {
    let mut parts = value.into_list().into_iter();

    let tag = match parts.next() {
        Some(Value::Text(tag)) => tag,
        _ => unreachable!(),
    };

    match tag.as_str() {
        "any" => Ok(Matcher::any(collect_list(parts)?)),
        "seq" => Ok(Matcher::sequence(collect_list(parts)?)),
        "silent" => Ok(collect_expr(next(&mut parts))?.silent()),
        "not" => Ok(Matcher::fail(collect_expr(next(&mut parts))?)),
        "and" => Ok(Matcher::fail(Matcher::fail(collect_expr(next(&mut parts))?))),
        "optional" => Ok(Matcher::optional(collect_expr(next(&mut parts))?)),
        "times" => {
            let inner = collect_expr(next(&mut parts))?;
            let min = number(next(&mut parts))?;
            let max = match next(&mut parts) {
                Value::Empty => Bound::Unbounded,
                max => Bound::Included(number(max)?),
            };

            Ok(Matcher::times(inner, (Bound::Included(min), max)))
        }
        "lit" => {
            let lit = unquote(&text(next(&mut parts)));
            let mut chars = lit.chars();

            match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(Matcher::char(ch)),
                _ => Matcher::regex(&regex::escape(&lit)),
            }
        }
        "re" => Matcher::regex(&unquote_regex(&text(next(&mut parts))[2..])),
        "empty" => Ok(Matcher::sequence(Vec::<Matcher>::new())),
        "dot" => Ok(Matcher::custom(Dot)),
        "ref" => Ok(match text(next(&mut parts)).as_str() {
            "EOF" | "EOI" => Matcher::eof(),
            "WHITESPACE" => Matcher::custom(Whitespace),
            "XID_IDENTIFIER" => Matcher::custom(XidIdentifier),
            name => Matcher::rule(name),
        }),
        _ => unreachable!(),
    }
}

fn next(parts: &mut impl Iterator<Item = Value>) -> Value {
    parts.next().unwrap_or_default()
}

fn collect_list(parts: impl Iterator<Item = Value>) -> Result<Vec<Matcher>, Error> {
    parts.map(collect_expr).collect()
}

fn text(value: Value) -> String {
    match value {
        Value::Text(s) => s,
        _ => unreachable!(),
    }
}

fn number(value: Value) -> Result<usize, Error> {
    let s = text(value);

    s.parse().map_err(|_| Error::InvalidRepeat(s))
}

/// Strip the quotes of a literal and resolve its escapes.
fn unquote(src: &str) -> String {
    debug_assert!(src.len() >= 2);

    let mut res = String::new();

    let mut chars = src[1..src.len() - 1].chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('t') => res.push('\t'),
                Some('n') => res.push('\n'),
                Some('r') => res.push('\r'),
                Some(ch) => res.push(ch),
                None => unreachable!(),
            }
        } else {
            res.push(ch);
        }
    }

    res
}

/// Strip the `#` delimiters of a regex. Only `\#` is unescaped, every other
/// escape belongs to the regex.
fn unquote_regex(src: &str) -> String {
    debug_assert!(src.len() >= 2);

    let mut res = String::new();

    let mut chars = src[1..src.len() - 1].chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('#') => res.push('#'),
                Some(ch) => {
                    res.push('\\');
                    res.push(ch);
                }
                None => unreachable!(),
            }
        } else {
            res.push(ch);
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MatcherKind;

    #[test]
    fn loads_definitions_in_order() {
        let grammar = Grammar::from_notation(
            r#"
            // phone numbers
            PHONE <- re#\d{3}# ~'-' re#\d{4}#
            other <- "ab" / 'c'?
            "#,
        )
        .unwrap();

        let names: Vec<&str> = grammar
            .definitions()
            .iter()
            .map(|def| def.name.as_str())
            .collect();

        assert_eq!(names, vec!["PHONE", "other"]);
        assert_eq!(
            grammar.to_string(),
            "PHONE <- re#\\d{3}# ~'-' re#\\d{4}#\nother <- re#ab# / 'c'?\n"
        );
    }

    #[test]
    fn builtins_and_prefixes() {
        let grammar = Grammar::from_notation(
            "start <- &'a' !XID_IDENTIFIER . WHITESPACE EOF EOI rest\nrest <- ~('x' 'y'){2,} 'z'{1,3} 'w'{2}",
        )
        .unwrap();

        assert_eq!(
            grammar.to_string(),
            "start <- !(!'a') !XID_IDENTIFIER . WHITESPACE EOF EOF rest\n\
             rest  <- ~('x' 'y'){2,} 'z'{1,3} 'w'{2}\n"
        );
    }

    #[test]
    fn undefined_rules_are_accepted() {
        let grammar = Grammar::from_notation("a <- b").unwrap();

        assert!(matches!(
            &grammar.lookup("a").unwrap().kind,
            MatcherKind::Rule(name) if name == "b"
        ));
    }

    #[test]
    fn escapes() {
        let grammar = Grammar::from_notation(r#"a <- '\'' "\t\"" re#a\#b\d#"#).unwrap();

        assert_eq!(grammar.to_string(), "a <- '\\'' re#\t\"# re#a\\#b\\d#\n");
    }

    #[test]
    fn round_trip() {
        let src = "expr <- term (~'+' term)* EOF\nterm <- re#[0-9]+# / ~'(' expr ~')'\n";
        let grammar = Grammar::from_notation(src).unwrap();
        let again = Grammar::from_notation(&grammar.to_string()).unwrap();

        assert_eq!(grammar.to_string(), again.to_string());
    }

    #[test]
    fn rendering_loads_as_an_equivalent_grammar() {
        let none: Vec<Matcher> = Vec::new();

        let grammar = Grammar::from_rules([
            ("one", Matcher::sequence(['a'])),
            ("empty", Matcher::sequence(none.clone())),
            ("never", Matcher::any(none)),
            ("single", Matcher::any([Matcher::sequence(['a', 'b'])])),
            (
                "mixed",
                Matcher::sequence([
                    Matcher::optional(Matcher::sequence(['a'])),
                    Matcher::times(Matcher::char('b').silent(), 0..=2),
                    Matcher::fail(Matcher::fail('c')),
                    Matcher::any([Matcher::rule("one"), Matcher::custom(Dot)]),
                ]),
            ),
            (
                "words",
                Matcher::sequence([
                    Matcher::regex(r"[a-z]+\b").unwrap(),
                    Matcher::custom(Whitespace).silent(),
                    Matcher::custom(XidIdentifier),
                    Matcher::eof(),
                ]),
            ),
        ])
        .unwrap();

        let src = grammar.to_string();
        let again = Grammar::from_notation(&src).unwrap();

        assert_eq!(again.to_string(), src);

        let before = Parser::new(&grammar);
        let after = Parser::new(&again);

        for def in grammar.definitions() {
            for input in ["", "a", "ab", "abc", "bbcx", "abbc", "ca", "foo bar", "foobar"] {
                assert_eq!(
                    before.parse_prefix(&def.name, input).ok(),
                    after.parse_prefix(&def.name, input).ok(),
                    "{} on {:?}",
                    def.name,
                    input
                );
            }
        }
    }

    #[test]
    fn reports_bad_notation() {
        let err = Grammar::from_notation("a <- 'x'\nb <- (").unwrap_err();

        match err {
            Error::Notation(err) => {
                assert_eq!(err.line, 2);
            }
            err => panic!("unexpected error {}", err),
        }

        assert!(matches!(
            Grammar::from_notation("a <- 'x'\na <- 'y'"),
            Err(Error::DuplicateRule(_))
        ));
        assert!(matches!(
            Grammar::from_notation("a <- re#(#"),
            Err(Error::Regex(_))
        ));
        assert!(matches!(
            Grammar::from_notation("a <- 'x'{99999999999999999999999}"),
            Err(Error::InvalidRepeat(_))
        ));
    }
}
