//! A calculator over floating point numbers, evaluated entirely by the
//! `on_match` transforms of its grammar.

use parsik::{Error, Grammar, Value};

/// The grammar of `calculator.peg`; its `calculator` rule outputs a
/// [`Value::Float`].
pub fn grammar() -> Result<Grammar, Error> {
    let mut grammar = Grammar::from_notation(include_str!("calculator.peg"))?;

    grammar
        .on_match("calculator", first)?
        .on_match("expr", fold)?
        .on_match("term", fold)?
        .on_match("factor", |v| {
            let mut parts = v.into_list().into_iter();
            let base = float(parts.next());

            match parts.next().map(first) {
                Some(Value::Float(exp)) => Value::Float(base.powf(exp)),
                _ => Value::Float(base),
            }
        })?
        .on_match("atom", first)?
        .on_match("num", |v| {
            Value::Float(v.as_str().and_then(|s| s.parse().ok()).unwrap_or(f64::NAN))
        })?;

    Ok(grammar)
}

fn first(v: Value) -> Value {
    v.into_list().into_iter().next().unwrap_or_default()
}

fn float(v: Option<Value>) -> f64 {
    v.and_then(|v| v.as_float()).unwrap_or(f64::NAN)
}

fn fold(v: Value) -> Value {
    let mut parts = v.into_list().into_iter();
    let left = float(parts.next());
    let rest = parts.next().map(Value::into_list).unwrap_or_default();

    Value::Float(rest.into_iter().fold(left, |left, op| {
        let mut op = op.into_list().into_iter();
        let sign = op.next();
        let right = float(op.next());

        match sign.as_ref().and_then(Value::as_str) {
            Some("+") => left + right,
            Some("-") => left - right,
            Some("*") => left * right,
            Some("/") => left / right,
            Some("%") => left % right,
            _ => f64::NAN,
        }
    }))
}
