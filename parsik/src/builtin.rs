//! Matchers the notation knows by name: `.`, `WHITESPACE` and
//! `XID_IDENTIFIER`. They are plain [`CustomMatcher`]s.

use std::fmt;
use unicode_xid::UnicodeXID;

use crate::engine::{CustomMatcher, Evaluator, Match};
use crate::{Error, Value};

fn matched(input: &str, start: usize, end: usize) -> Option<Match> {
    Some(Match {
        start,
        end,
        output: Some(Value::Text(input[start..end].to_owned())),
    })
}

/// Any single character.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dot;

impl CustomMatcher for Dot {
    fn evaluate(&self, eval: &mut Evaluator<'_>, pos: usize) -> Result<Option<Match>, Error> {
        let input = eval.input();
        let Some(rest) = input.get(pos..) else {
            return Ok(None);
        };

        Ok(rest
            .chars()
            .next()
            .and_then(|ch| matched(input, pos, pos + ch.len_utf8())))
    }
}

impl fmt::Display for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".")
    }
}

/// A possibly empty run of whitespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct Whitespace;

impl CustomMatcher for Whitespace {
    fn evaluate(&self, eval: &mut Evaluator<'_>, pos: usize) -> Result<Option<Match>, Error> {
        let input = eval.input();
        let Some(rest) = input.get(pos..) else {
            return Ok(None);
        };

        let next_pos = rest
            .char_indices()
            .find(|(_, ch)| !ch.is_whitespace())
            .map_or(input.len(), |(off, _)| pos + off);

        Ok(matched(input, pos, next_pos))
    }
}

impl fmt::Display for Whitespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WHITESPACE")
    }
}

/// A Unicode identifier: an XID start character or `_`, followed by XID
/// continue characters.
#[derive(Clone, Copy, Debug, Default)]
pub struct XidIdentifier;

impl CustomMatcher for XidIdentifier {
    fn evaluate(&self, eval: &mut Evaluator<'_>, pos: usize) -> Result<Option<Match>, Error> {
        let input = eval.input();
        let Some(rest) = input.get(pos..) else {
            return Ok(None);
        };
        let mut chars = rest.char_indices();

        match chars.next() {
            Some((_, ch)) if UnicodeXID::is_xid_start(ch) || ch == '_' => {
                let end = chars
                    .find(|(_, ch)| !UnicodeXID::is_xid_continue(*ch))
                    .map_or(input.len(), |(off, _)| pos + off);

                Ok(matched(input, pos, end))
            }
            _ => Ok(None),
        }
    }
}

impl fmt::Display for XidIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XID_IDENTIFIER")
    }
}
