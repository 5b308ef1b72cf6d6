use regex_automata::meta::Regex;
use regex_automata::{Anchored, Input};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use crate::engine::CustomMatcher;
use crate::utils::{escape_char, escape_regex};
use crate::{Error, Value};

/// Callback run on a successful match; its return value replaces the output.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Named rules. Rule references are resolved by name each time they are
/// evaluated, so rules may refer to each other in any order, including
/// cyclically.
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    lookup: BTreeMap<String, usize>,
    definitions: Vec<Definition>,
}

#[derive(Clone, Debug)]
pub struct Definition {
    pub name: String,
    pub matcher: Matcher,
}

impl Grammar {
    pub fn new() -> Self {
        Grammar::default()
    }

    /// Build a grammar from `(name, matcher)` pairs, in declaration order.
    pub fn from_rules<I, N, M>(rules: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (N, M)>,
        N: Into<String>,
        M: Into<Matcher>,
    {
        let mut grammar = Grammar::new();

        for (name, matcher) in rules {
            grammar.define(name, matcher)?;
        }

        Ok(grammar)
    }

    pub fn define(
        &mut self,
        name: impl Into<String>,
        matcher: impl Into<Matcher>,
    ) -> Result<&mut Self, Error> {
        let name = name.into();

        if self.lookup.contains_key(&name) {
            return Err(Error::DuplicateRule(name));
        }

        self.lookup.insert(name.clone(), self.definitions.len());
        self.definitions.push(Definition {
            name,
            matcher: matcher.into(),
        });

        Ok(self)
    }

    /// Attach a transform to an already defined rule.
    pub fn on_match<F>(&mut self, name: &str, transform: F) -> Result<&mut Self, Error>
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let def_no = *self
            .lookup
            .get(name)
            .ok_or_else(|| Error::UndefinedRule(name.to_owned()))?;

        self.definitions[def_no].matcher.on_match = Some(Arc::new(transform));

        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Option<&Matcher> {
        self.resolve(name).map(|(_, matcher)| matcher)
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<(usize, &Matcher)> {
        self.lookup
            .get(name)
            .map(|def_no| (*def_no, &self.definitions[*def_no].matcher))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .definitions
            .iter()
            .map(|def| def.name.chars().count())
            .max()
            .unwrap_or(0);

        for def in &self.definitions {
            writeln!(f, "{:width$} <- {}", def.name, def.matcher, width = width)?;
        }

        Ok(())
    }
}

/// A compiled regular expression that only matches at the current position.
/// Look-around assertions such as `\b` still see the text before it.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, Error> {
        let regex = Regex::new(source)?;

        Ok(Pattern {
            source: source.to_owned(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Length in bytes of the match starting exactly at `pos`.
    pub fn match_at(&self, input: &str, pos: usize) -> Option<usize> {
        if !input.is_char_boundary(pos) {
            return None;
        }

        let search = Input::new(input).range(pos..).anchored(Anchored::Yes);

        self.regex.find(search).map(|m| m.end() - pos)
    }
}

#[derive(Clone, Debug)]
pub enum MatcherKind {
    Char(char),
    Regex(Pattern),
    Eof,
    Rule(String),
    Optional(Box<Matcher>),
    Any(Vec<Matcher>),
    Sequence(Vec<Matcher>),
    Times {
        inner: Box<Matcher>,
        min: usize,
        max: Option<usize>,
    },
    Fail(Box<Matcher>),
    Custom(Arc<dyn CustomMatcher>),
}

/// A grammar expression node together with its output modifiers.
#[derive(Clone)]
pub struct Matcher {
    pub kind: MatcherKind,
    pub silent: bool,
    pub on_match: Option<Transform>,
}

impl From<MatcherKind> for Matcher {
    fn from(kind: MatcherKind) -> Self {
        Matcher {
            kind,
            silent: false,
            on_match: None,
        }
    }
}

impl From<char> for Matcher {
    fn from(ch: char) -> Self {
        Matcher::char(ch)
    }
}

impl From<&str> for Matcher {
    fn from(name: &str) -> Self {
        Matcher::rule(name)
    }
}

impl From<String> for Matcher {
    fn from(name: String) -> Self {
        Matcher::rule(name)
    }
}

impl Matcher {
    pub fn char(ch: char) -> Self {
        MatcherKind::Char(ch).into()
    }

    pub fn regex(pattern: &str) -> Result<Self, Error> {
        Ok(MatcherKind::Regex(Pattern::new(pattern)?).into())
    }

    pub fn eof() -> Self {
        MatcherKind::Eof.into()
    }

    pub fn rule(name: impl Into<String>) -> Self {
        MatcherKind::Rule(name.into()).into()
    }

    pub fn optional(inner: impl Into<Matcher>) -> Self {
        MatcherKind::Optional(Box::new(inner.into())).into()
    }

    pub fn any<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        MatcherKind::Any(items.into_iter().map(Into::into).collect()).into()
    }

    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        MatcherKind::Sequence(items.into_iter().map(Into::into).collect()).into()
    }

    /// Repeat `inner` a number of times within `range`, e.g. `2..=3` or `1..`.
    pub fn times(inner: impl Into<Matcher>, range: impl RangeBounds<usize>) -> Self {
        let min = match range.start_bound() {
            Bound::Included(n) => *n,
            Bound::Excluded(n) => n.saturating_add(1),
            Bound::Unbounded => 0,
        };

        let max = match range.end_bound() {
            Bound::Included(n) => Some(*n),
            // an empty range can never be satisfied
            Bound::Excluded(0) => return Matcher::never(inner, min),
            Bound::Excluded(n) => Some(n - 1),
            Bound::Unbounded => None,
        };

        MatcherKind::Times {
            inner: Box::new(inner.into()),
            min,
            max,
        }
        .into()
    }

    fn never(inner: impl Into<Matcher>, min: usize) -> Self {
        MatcherKind::Times {
            inner: Box::new(inner.into()),
            min: min.max(1),
            max: Some(0),
        }
        .into()
    }

    pub fn zero_or_more(inner: impl Into<Matcher>) -> Self {
        Matcher::times(inner, 0..)
    }

    pub fn one_or_more(inner: impl Into<Matcher>) -> Self {
        Matcher::times(inner, 1..)
    }

    pub fn fail(inner: impl Into<Matcher>) -> Self {
        MatcherKind::Fail(Box::new(inner.into())).into()
    }

    pub fn custom(matcher: impl CustomMatcher + 'static) -> Self {
        MatcherKind::Custom(Arc::new(matcher)).into()
    }

    /// Suppress this node's output in its parent.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn on_match<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.on_match = Some(Arc::new(transform));
        self
    }

    /// Name of the rule this node refers to, if it is a rule reference.
    pub fn rule_name(&self) -> Option<&str> {
        match &self.kind {
            MatcherKind::Rule(name) => Some(name),
            _ => None,
        }
    }

    fn is_atomic(&self) -> bool {
        if self.silent {
            return false;
        }

        match &self.kind {
            MatcherKind::Char(_)
            | MatcherKind::Regex(_)
            | MatcherKind::Eof
            | MatcherKind::Rule(_)
            | MatcherKind::Custom(_) => true,
            MatcherKind::Sequence(list) => list.is_empty(),
            // rendered as its only alternative
            MatcherKind::Any(list) if list.len() == 1 => list[0].is_atomic(),
            _ => false,
        }
    }

    /// Whether the rendering is a list of items that needs grouping when it
    /// is itself an item.
    fn is_compound(&self) -> bool {
        if self.silent {
            return false;
        }

        match &self.kind {
            MatcherKind::Any(list) if list.len() == 1 => list[0].is_compound(),
            MatcherKind::Any(list) | MatcherKind::Sequence(list) => list.len() > 1,
            _ => false,
        }
    }

    /// Operand of a prefix or suffix operator.
    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atomic() {
            write!(f, "{}", self)
        } else {
            write!(f, "({})", self)
        }
    }

    /// Item of a sequence or a list of alternatives.
    fn fmt_item(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compound() {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("kind", &self.kind)
            .field("silent", &self.silent)
            .field("on_match", &self.on_match.is_some())
            .finish()
    }
}

/// Renders the grammar notation understood by [`Grammar::from_notation`].
/// Loading the rendering gives a grammar that matches the same way, as long
/// as the only custom matchers are the built-in ones. `on_match` transforms
/// are not rendered.
impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.silent {
            write!(f, "~")?;

            if matches!(
                &self.kind,
                MatcherKind::Any(_) | MatcherKind::Sequence(_) | MatcherKind::Fail(_)
            ) {
                let bare = Matcher::from(self.kind.clone());
                return write!(f, "({})", bare);
            }
        }

        match &self.kind {
            MatcherKind::Char(ch) => write!(f, "{}", escape_char(*ch)),
            MatcherKind::Regex(pattern) => write!(f, "re#{}#", escape_regex(pattern.source())),
            MatcherKind::Eof => write!(f, "EOF"),
            MatcherKind::Rule(name) => write!(f, "{}", name),
            MatcherKind::Optional(inner) => {
                inner.fmt_operand(f)?;
                write!(f, "?")
            }
            MatcherKind::Sequence(list) if list.is_empty() => write!(f, "()"),
            // the empty sequence always matches, so this never does
            MatcherKind::Any(list) if list.is_empty() => write!(f, "!()"),
            MatcherKind::Any(list) if list.len() == 1 => write!(f, "{}", list[0]),
            // a one element sequence still outputs a list
            MatcherKind::Sequence(list) if list.len() == 1 => {
                list[0].fmt_operand(f)?;
                write!(f, "{{1}}")
            }
            MatcherKind::Any(list) => {
                for (no, matcher) in list.iter().enumerate() {
                    if no != 0 {
                        write!(f, " / ")?;
                    }
                    matcher.fmt_item(f)?;
                }
                Ok(())
            }
            MatcherKind::Sequence(list) => {
                for (no, matcher) in list.iter().enumerate() {
                    if no != 0 {
                        write!(f, " ")?;
                    }
                    matcher.fmt_item(f)?;
                }
                Ok(())
            }
            MatcherKind::Times { inner, min, max } => {
                inner.fmt_operand(f)?;
                match (min, max) {
                    (0, None) => write!(f, "*"),
                    (1, None) => write!(f, "+"),
                    (min, None) => write!(f, "{{{},}}", min),
                    (min, Some(max)) if min == max => write!(f, "{{{}}}", min),
                    (min, Some(max)) => write!(f, "{{{},{}}}", min, max),
                }
            }
            MatcherKind::Fail(inner) => {
                write!(f, "!")?;
                inner.fmt_operand(f)
            }
            MatcherKind::Custom(custom) => write!(f, "{}", custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> Matcher {
        Matcher::sequence([
            Matcher::regex(r"\d{3}").unwrap(),
            Matcher::char('-').silent(),
            Matcher::regex(r"\d{4}").unwrap(),
        ])
    }

    #[test]
    fn renders_notation() {
        assert_eq!(phone().to_string(), r"re#\d{3}# ~'-' re#\d{4}#");

        let m = Matcher::any([
            Matcher::sequence(["a", "b"]),
            Matcher::optional('x'),
            Matcher::fail(Matcher::eof()),
            Matcher::zero_or_more("c"),
            Matcher::times('d', 2..=3),
            Matcher::times('e', 2..),
            Matcher::times('f', 4..5),
            Matcher::sequence(['g', 'h']).silent(),
        ]);

        assert_eq!(
            m.to_string(),
            "(a b) / 'x'? / !EOF / c* / 'd'{2,3} / 'e'{2,} / 'f'{4} / ~('g' 'h')"
        );
    }

    #[test]
    fn renders_short_lists() {
        let none: Vec<Matcher> = Vec::new();

        assert_eq!(Matcher::sequence(none.clone()).to_string(), "()");
        assert_eq!(Matcher::any(none.clone()).to_string(), "!()");
        assert_eq!(Matcher::optional(Matcher::any(none)).to_string(), "(!())?");
        assert_eq!(Matcher::sequence(['a']).to_string(), "'a'{1}");
        assert_eq!(Matcher::sequence(["a"]).silent().to_string(), "~(a{1})");
        assert_eq!(
            Matcher::sequence([Matcher::any([Matcher::sequence(['a', 'b'])]), 'c'.into()])
                .to_string(),
            "('a' 'b') 'c'"
        );
        assert_eq!(Matcher::zero_or_more(Matcher::any(['a'])).to_string(), "'a'*");
    }

    #[test]
    fn times_ranges() {
        fn bounds(m: Matcher) -> (usize, Option<usize>) {
            match m.kind {
                MatcherKind::Times { min, max, .. } => (min, max),
                _ => unreachable!(),
            }
        }

        assert_eq!(bounds(Matcher::times('a', 2..=3)), (2, Some(3)));
        assert_eq!(bounds(Matcher::times('a', ..4)), (0, Some(3)));
        assert_eq!(bounds(Matcher::one_or_more('a')), (1, None));
        assert_eq!(bounds(Matcher::zero_or_more('a')), (0, None));
        assert_eq!(bounds(Matcher::times('a', 0..0)), (1, Some(0)));
    }

    #[test]
    fn duplicate_rules_are_rejected() {
        let mut grammar = Grammar::new();

        grammar.define("A", 'a').unwrap();

        assert!(matches!(
            grammar.define("A", 'b'),
            Err(Error::DuplicateRule(name)) if name == "A"
        ));
        assert_eq!(grammar.len(), 1);
    }

    #[test]
    fn lookup_by_name() {
        let grammar = Grammar::from_rules([("PHONE", phone()), ("START", "PHONE".into())]).unwrap();

        assert!(grammar.lookup("PHONE").is_some());
        assert_eq!(grammar.lookup("START").and_then(Matcher::rule_name), Some("PHONE"));
        assert!(grammar.lookup("MISSING").is_none());
        assert!(grammar.contains("START"));
        assert!(!grammar.contains("MISSING"));
        assert_eq!(
            grammar.to_string(),
            "PHONE <- re#\\d{3}# ~'-' re#\\d{4}#\nSTART <- PHONE\n"
        );
    }

    #[test]
    fn on_match_needs_a_defined_rule() {
        let mut grammar = Grammar::new();

        assert!(matches!(
            grammar.on_match("nope", |v| v),
            Err(Error::UndefinedRule(_))
        ));

        grammar.define("yes", 'y').unwrap();
        grammar.on_match("yes", |v| v).unwrap();

        assert!(grammar.lookup("yes").unwrap().on_match.is_some());
    }

    #[test]
    fn invalid_regex() {
        assert!(matches!(Matcher::regex("("), Err(Error::Regex(_))));
    }
}
