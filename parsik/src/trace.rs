//! Observing the evaluator.
//!
//! The evaluator reports every attempt twice: once as [`Outcome::Pending`]
//! right before it tries the matcher, and once with the outcome. What to do
//! with these events is up to the [`Tracer`].

use std::fmt;

use crate::ast::Matcher;
use crate::utils::{escape_string, truncate};
use crate::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "?"),
            Outcome::Success => write!(f, "ok"),
            Outcome::Failure => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug)]
pub struct Event<'e> {
    pub start: usize,
    pub end: usize,
    /// The matched text on success, otherwise the input remaining at `start`.
    pub input: &'e str,
    pub output: Option<&'e Value>,
    pub outcome: Outcome,
    /// Set when the matcher is a reference to a rule.
    pub rule: Option<&'e str>,
    pub matcher: &'e Matcher,
    /// Nesting depth of the attempt.
    pub depth: usize,
}

pub trait Tracer {
    fn event(&mut self, event: &Event<'_>);
}

/// Discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn event(&mut self, _: &Event<'_>) {}
}

/// Forwards events to the `log` facade at trace level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn event(&mut self, event: &Event<'_>) {
        log::trace!(
            "{:>width$}{} {}..{} {} \"{}\"",
            "",
            event.outcome,
            event.start,
            event.end,
            event.matcher,
            escape_string(&truncate(event.input, 24)),
            width = event.depth * 2,
        );
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub range: String,
    pub input: String,
    pub output: String,
    pub outcome: Outcome,
    pub rule: String,
    pub matcher: String,
    pub depth: usize,
}

/// Records events and renders them as a table, one row per event.
#[derive(Clone, Debug)]
pub struct TableTracer {
    rows: Vec<Row>,
    width: usize,
}

impl Default for TableTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableTracer {
    pub fn new() -> Self {
        TableTracer {
            rows: Vec::new(),
            width: 20,
        }
    }

    /// Limit the input and output columns to `width` characters.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(4);
        self
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Tracer for TableTracer {
    fn event(&mut self, event: &Event<'_>) {
        let range = if event.outcome == Outcome::Pending {
            format!("{}", event.start)
        } else {
            format!("{}-{}", event.start, event.end)
        };

        let output = match event.output {
            Some(value) => truncate(&value.to_string(), self.width),
            None => String::new(),
        };

        self.rows.push(Row {
            range,
            input: format!(
                "\"{}\"",
                escape_string(&truncate(event.input, self.width))
            ),
            output,
            outcome: event.outcome,
            rule: event.rule.unwrap_or_default().to_owned(),
            matcher: format!("{:width$}{}", "", event.matcher, width = event.depth * 2),
            depth: event.depth,
        });
    }
}

impl fmt::Display for TableTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = |get: fn(&Row) -> usize, title: &str| {
            self.rows
                .iter()
                .map(get)
                .max()
                .unwrap_or(0)
                .max(title.chars().count())
        };

        let range = column(|r| r.range.chars().count(), "pos");
        let input = column(|r| r.input.chars().count(), "input");
        let output = column(|r| r.output.chars().count(), "output");
        let rule = column(|r| r.rule.chars().count(), "rule");

        writeln!(
            f,
            "{:range$} | {:input$} | {:output$} | {:4} | {:rule$} | matcher",
            "pos", "input", "output", "", "rule",
        )?;

        for row in &self.rows {
            writeln!(
                f,
                "{:range$} | {:input$} | {:output$} | {:4} | {:rule$} | {}",
                row.range,
                row.input,
                row.output,
                row.outcome.to_string(),
                row.rule,
                row.matcher,
            )?;
        }

        Ok(())
    }
}
