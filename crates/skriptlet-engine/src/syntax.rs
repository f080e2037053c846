//! Contracts between the engine and the syntax kinds registered with it.
//!
//! A syntax kind is a factory: after one of its patterns matched, the engine hands
//! the factory a [`ParseResult`] and gets back an [`Expression`] or [`Effect`]. A
//! factory returning `Err` rejects the match and the engine keeps looking.

use std::fmt;
use std::sync::Arc;

use crate::class::ClassId;
use crate::value::Value;

/// A resolved expression.
pub trait Expression: fmt::Debug + Send + Sync {
    /// Class every produced value is an instance of.
    fn return_class(&self) -> ClassId;

    /// Whether this expression produces at most one value.
    fn is_single(&self) -> bool {
        true
    }

    /// Whether the values are fixed at parse time.
    fn is_literal(&self) -> bool {
        false
    }

    fn values(&self) -> Vec<Value>;

    /// Source-like rendering, used in logs and tests.
    fn describe(&self) -> String;

    fn single_value(&self) -> Option<Value> {
        self.values().into_iter().next()
    }
}

/// A resolved statement.
pub trait Effect: fmt::Debug + Send + Sync {
    fn describe(&self) -> String;

    fn expressions(&self) -> Vec<&dyn Expression> {
        Vec::new()
    }
}

/// Captures of one `<...>` group match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    pub text: String,
    pub groups: Vec<Option<String>>,
}

impl RegexMatch {
    pub fn from_captures(captures: &regex::Captures<'_>) -> Self {
        Self {
            text: captures
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            groups: captures
                .iter()
                .skip(1)
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    pub fn group(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return Some(&self.text);
        }
        self.groups.get(index - 1).and_then(|g| g.as_deref())
    }
}

/// Everything a successful match produced, in pattern order.
#[derive(Debug)]
pub struct ParseResult {
    /// One entry per placeholder that took part in the match, left to right.
    pub expressions: Vec<Box<dyn Expression>>,
    /// Index of the pattern among those declared by the syntax kind.
    pub matched_pattern: usize,
    pub regex_matches: Vec<RegexMatch>,
    /// XOR of the marks of every choice branch taken.
    pub parse_mark: i32,
    /// The matched text.
    pub source: String,
}

impl ParseResult {
    /// Removes and returns the next sub-expression.
    pub fn take_expression(&mut self) -> anyhow::Result<Box<dyn Expression>> {
        if self.expressions.is_empty() {
            anyhow::bail!("missing sub-expression in '{}'", self.source);
        }
        Ok(self.expressions.remove(0))
    }
}

pub type ExpressionFactory =
    Arc<dyn Fn(ParseResult) -> anyhow::Result<Box<dyn Expression>> + Send + Sync>;

pub type EffectFactory = Arc<dyn Fn(ParseResult) -> anyhow::Result<Box<dyn Effect>> + Send + Sync>;
