//! Turning a piece of script text into an expression of an expected type.

use once_cell::sync::Lazy;
use regex::Regex;
use skriptlet_syntax::text::strip_enclosing_parens;
use skriptlet_syntax::{Acceptance, PatternType};
use tracing::{trace, warn};

use crate::class::ClassId;
use crate::engine::Engine;
use crate::literal::{ConvertedExpression, ExpressionList, SimpleLiteral};
use crate::matcher::{MatchContext, Tail};
use crate::registry::SyntaxDescriptor;
use crate::syntax::{Effect, Expression, ParseResult};
use crate::value::Value;

static LIST_CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s+(and|or|nor)\s+").unwrap());

/// Splits a list literal at its top-level separators. Returns the parts and whether
/// the list is an and-list, or `None` for text that is not a list.
fn split_list(text: &str) -> Option<(Vec<&str>, bool)> {
    let mut parts = Vec::new();
    let mut conjunctions: Vec<String> = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    let mut i = 0;

    while i < text.len() {
        let Some(c) = text[i..].chars().next() else {
            break;
        };
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            ',' if !quoted && depth == 0 => {
                parts.push(&text[start..i]);
                i += 1;
                // `a, b, and c`
                if let Some(m) = LIST_CONJUNCTION.captures(&text[i..]) {
                    conjunctions.push(m[1].to_lowercase());
                    i += m.get(0).map_or(0, |g| g.len());
                }
                start = i;
                continue;
            }
            c if c.is_whitespace() && !quoted && depth == 0 => {
                if let Some(m) = LIST_CONJUNCTION.captures(&text[i..]) {
                    parts.push(&text[start..i]);
                    conjunctions.push(m[1].to_lowercase());
                    i += m.get(0).map_or(0, |g| g.len());
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += c.len_utf8();
    }
    parts.push(&text[start..]);

    let parts: Vec<&str> = parts.into_iter().map(str::trim).collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let or_list = !conjunctions.is_empty() && conjunctions.iter().all(|c| c == "or");
    Some((parts, !or_list))
}

/// Whether an enclosing match is already working on `text`. Scanning the registry
/// again from there could only recurse.
fn is_reentry(text: &str, parent: Option<&MatchContext<'_>>) -> bool {
    std::iter::successors(parent, |ctx| ctx.parent()).any(|ctx| ctx.source().trim() == text)
}

fn unquote(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    (!inner.contains('"')).then_some(inner)
}

impl Engine {
    fn class_of(&self, expected: &PatternType) -> ClassId {
        self.types
            .get(expected.handle)
            .map_or(ClassId::OBJECT, |ty| ty.class())
    }

    fn compatible(&self, from: ClassId, to: ClassId) -> bool {
        self.classes.is_assignable(from, to) || self.converters.converter_exists(from, to)
    }

    /// Wraps `expression` so its values come out as `to`.
    fn adapt(&self, expression: Box<dyn Expression>, to: ClassId) -> Box<dyn Expression> {
        if self.classes.is_assignable(expression.return_class(), to) {
            expression
        } else {
            Box::new(ConvertedExpression::new(expression, to, self.converters.clone()))
        }
    }

    /// Resolves `text` as an expression of type `expected`, without logging.
    pub(crate) fn resolve_inner(
        &self,
        text: &str,
        expected: &PatternType,
        acceptance: Acceptance,
        parent: Option<&MatchContext<'_>>,
    ) -> Option<Box<dyn Expression>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(inner) = strip_enclosing_parens(text) {
            return self.resolve_inner(inner, expected, acceptance, parent);
        }

        let class = self.class_of(expected);

        if acceptance != Acceptance::ExpressionsOnly {
            if let Some(literal) = self.parse_literal(text, class) {
                return Some(literal);
            }
        }

        if !expected.single {
            if let Some((parts, and)) = split_list(text) {
                let items: Option<Vec<Box<dyn Expression>>> = parts
                    .iter()
                    .map(|part| self.resolve_inner(part, expected, acceptance, parent))
                    .collect();
                if let Some(items) = items {
                    return Some(Box::new(ExpressionList::new(items, and, class)));
                }
            }
        }

        if acceptance == Acceptance::LiteralsOnly || is_reentry(text, parent) {
            return None;
        }

        let candidates = self.expressions.candidates(|c| self.compatible(c, class));
        for descriptor in candidates {
            let found =
                self.try_descriptor(descriptor, text, parent, |factory, result| factory(result));
            let Some(expression) = found else {
                continue;
            };
            let expression = self.adapt(expression, class);
            if expected.single && !expression.is_single() {
                trace!(name = descriptor.name(), "rejected: plural result for single slot");
                continue;
            }
            self.expressions.promote(descriptor.id());
            return Some(expression);
        }
        None
    }

    /// Tries every registered type compatible with `class`, in registration order.
    fn parse_literal(&self, text: &str, class: ClassId) -> Option<Box<dyn Expression>> {
        for ty in self.types.iter() {
            if !self.compatible(ty.class(), class) {
                continue;
            }
            let value = if ty.has_literal_parser() {
                ty.parse_literal(text)
            } else if ty.class() == ClassId::STRING {
                unquote(text).map(|s| Value::String(s.to_string()))
            } else {
                None
            };
            let Some(value) = value else {
                continue;
            };
            let Some(value) = self.converters.convert(&value, class) else {
                continue;
            };
            return Some(Box::new(SimpleLiteral::new(value.class(), vec![value], text)));
        }
        None
    }

    /// Matches each pattern of `descriptor` against the whole of `text` and hands
    /// the first full match to `instantiate`.
    fn try_descriptor<F, T>(
        &self,
        descriptor: &SyntaxDescriptor<F>,
        text: &str,
        parent: Option<&MatchContext<'_>>,
        instantiate: impl Fn(&F, ParseResult) -> anyhow::Result<T>,
    ) -> Option<T> {
        for pattern in descriptor.patterns() {
            descriptor.record_attempt();
            let mut ctx = MatchContext::new(text, parent);
            trace!(
                name = descriptor.name(),
                pattern = pattern.index,
                depth = ctx.depth(),
                "trying pattern"
            );
            let Some(end) = self.match_node(&pattern.node, text, 0, &mut ctx, &Tail::END) else {
                continue;
            };
            if !text[end..].trim().is_empty() {
                continue;
            }
            match instantiate(&descriptor.factory, ctx.into_parse_result(pattern.index)) {
                Ok(object) => return Some(object),
                Err(e) => {
                    trace!(name = descriptor.name(), error = %e, "factory rejected match");
                }
            }
        }
        None
    }

    /// Resolves `text` as an expression of type `expected`.
    pub fn resolve(&self, text: &str, expected: &PatternType) -> Option<Box<dyn Expression>> {
        let resolved = self.resolve_inner(text, expected, Acceptance::Both, None);
        if resolved.is_none() && self.config.log_unresolved {
            warn!(text = text.trim(), expected = %expected, "can't understand the expression");
        }
        resolved
    }

    /// Resolves `text` as an expression of the type named `type_name` (either form;
    /// the plural form accepts lists).
    pub fn resolve_expression(&self, text: &str, type_name: &str) -> Option<Box<dyn Expression>> {
        match self.pattern_type(type_name) {
            Some(expected) => self.resolve(text, &expected),
            None => {
                warn!(type_name, "unknown type");
                None
            }
        }
    }

    /// Parses a statement.
    pub fn parse_effect(&self, text: &str) -> Option<Box<dyn Effect>> {
        let text = text.trim();
        let found = (!text.is_empty())
            .then(|| {
                self.effects.candidates(|_| true).into_iter().find_map(|descriptor| {
                    let effect = self
                        .try_descriptor(descriptor, text, None, |factory, result| factory(result))?;
                    self.effects.promote(descriptor.id());
                    Some(effect)
                })
            })
            .flatten();
        if found.is_none() && self.config.log_unresolved {
            warn!(text, "can't understand the effect");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        let (parts, and) = split_list("1, 2 and 3").unwrap();
        assert_eq!(parts, vec!["1", "2", "3"]);
        assert!(and);

        let (parts, and) = split_list("1 or 2").unwrap();
        assert_eq!(parts, vec!["1", "2"]);
        assert!(!and);

        let (parts, and) = split_list("1, 2, or 3").unwrap();
        assert_eq!(parts, vec!["1", "2", "3"]);
        assert!(!and);

        let (_, and) = split_list("1 nor 2").unwrap();
        assert!(and);
    }

    #[test]
    fn test_split_list_respects_quotes_and_parens() {
        assert!(split_list("\"a, b\"").is_none());
        assert!(split_list("(1 and 2)").is_none());
        let (parts, _) = split_list("(1 + 2), \"x and y\"").unwrap();
        assert_eq!(parts, vec!["(1 + 2)", "\"x and y\""]);
    }

    #[test]
    fn test_split_list_rejects_non_lists() {
        assert!(split_list("1").is_none());
        assert!(split_list("1,").is_none());
        assert!(split_list("sand").is_none());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"hi\""), Some("hi"));
        assert_eq!(unquote("\"\""), Some(""));
        assert_eq!(unquote("\"a\" + \"b\""), None);
        assert_eq!(unquote("hi"), None);
    }
}
