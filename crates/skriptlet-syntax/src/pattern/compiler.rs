//! Recursive-descent compiler from pattern text to [`PatternNode`].
//!
//! Grammar:
//!
//! ```text
//! [x]        optional x
//! (a|b|c)    choice; a branch may start with `N¦` to contribute parse mark N
//! <regex>    bounded regular expression
//! %types%    placeholder; `-` nullable, then `*` literals only or `~` expressions only,
//!            then `/`-separated type names
//! \c         the character c, literally
//! ```
//!
//! A `|` at the top level turns the whole pattern into a choice.

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

use super::{Acceptance, ChoiceBranch, PatternNode, PatternType, RegexGroup};
use crate::error::CompileError;
use crate::text::{find_closing, split_vertical_bars};

static MARK_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)¦").unwrap());

static PLACEHOLDER_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-)?([*~])?([\w/]+)$").unwrap());

/// Resolves the type names written inside `%...%`.
pub trait TypeResolver {
    fn pattern_type(&self, name: &str) -> Option<PatternType>;
}

impl<F> TypeResolver for F
where
    F: Fn(&str) -> Option<PatternType>,
{
    fn pattern_type(&self, name: &str) -> Option<PatternType> {
        self(name)
    }
}

/// Compiles `pattern`, resolving placeholder types through `types`.
pub fn compile(pattern: &str, types: &dyn TypeResolver) -> Result<PatternNode, CompileError> {
    Compiler::new(types).compile(pattern)
}

pub struct Compiler<'t> {
    types: &'t dyn TypeResolver,
}

impl<'t> Compiler<'t> {
    pub fn new(types: &'t dyn TypeResolver) -> Self {
        Self { types }
    }

    pub fn compile(&self, pattern: &str) -> Result<PatternNode, CompileError> {
        self.parse_pattern(pattern, 0)
    }

    /// `base` is the offset of `pattern` inside the text handed to [`Compiler::compile`].
    fn parse_pattern(&self, pattern: &str, base: usize) -> Result<PatternNode, CompileError> {
        if pattern.is_empty() {
            return Ok(PatternNode::literal(""));
        }

        let parts = split_vertical_bars(pattern);
        if parts.len() > 1 {
            return self.parse_choice(&parts, base);
        }

        let mut elements = Vec::new();
        let mut text = String::new();
        let mut i = 0;
        while let Some(c) = pattern[i..].chars().next() {
            let at = base + i;
            match c {
                '[' => {
                    let close = find_closing(pattern, i, '[', ']')
                        .ok_or(CompileError::UnmatchedOpening { open: '[', index: at })?;
                    flush(&mut text, &mut elements);
                    let inner = self.parse_optional(&pattern[i + 1..close], at + 1)?;
                    elements.push(PatternNode::optional(inner));
                    i = close + 1;
                }
                '(' => {
                    let close = find_closing(pattern, i, '(', ')')
                        .ok_or(CompileError::UnmatchedOpening { open: '(', index: at })?;
                    flush(&mut text, &mut elements);
                    let inner = &pattern[i + 1..close];
                    elements.push(self.parse_choice(&split_vertical_bars(inner), at + 1)?);
                    i = close + 1;
                }
                '<' => {
                    let close = find_closing(pattern, i, '<', '>')
                        .ok_or(CompileError::UnmatchedOpening { open: '<', index: at })?;
                    flush(&mut text, &mut elements);
                    let source = &pattern[i + 1..close];
                    let group =
                        RegexGroup::new(source).map_err(|e| CompileError::InvalidRegex {
                            regex: source.to_string(),
                            index: at,
                            message: e.to_string(),
                        })?;
                    elements.push(PatternNode::Regex(group));
                    i = close + 1;
                }
                '%' => {
                    let close = pattern[i + 1..]
                        .find('%')
                        .map(|offset| i + 1 + offset)
                        .ok_or(CompileError::UnmatchedPercent { index: at })?;
                    flush(&mut text, &mut elements);
                    elements.push(self.parse_placeholder(&pattern[i + 1..close], at)?);
                    i = close + 1;
                }
                '\\' => {
                    let escaped = pattern[i + 1..]
                        .chars()
                        .next()
                        .ok_or(CompileError::TrailingEscape { index: at })?;
                    text.push(escaped);
                    i += 1 + escaped.len_utf8();
                }
                ']' | ')' | '>' => {
                    return Err(CompileError::UnmatchedClosing { close: c, index: at });
                }
                _ => {
                    text.push(c);
                    i += c.len_utf8();
                }
            }
        }
        flush(&mut text, &mut elements);

        Ok(PatternNode::sequence(elements))
    }

    /// `[N¦x]` is a marked single-branch choice that may be skipped.
    fn parse_optional(&self, inner: &str, base: usize) -> Result<PatternNode, CompileError> {
        if split_vertical_bars(inner).len() == 1 {
            if let Some((mark, rest_at)) = parse_mark(inner, base)? {
                let node = self.parse_pattern(&inner[rest_at..], base + rest_at)?;
                return Ok(PatternNode::Choice(vec![ChoiceBranch::new(node, mark)]));
            }
        }
        self.parse_pattern(inner, base)
    }

    fn parse_choice(
        &self,
        parts: &[(usize, &str)],
        base: usize,
    ) -> Result<PatternNode, CompileError> {
        let mut branches = Vec::with_capacity(parts.len());
        for &(offset, part) in parts {
            let at = base + offset;
            let branch = match parse_mark(part, at)? {
                Some((mark, rest_at)) => {
                    ChoiceBranch::new(self.parse_pattern(&part[rest_at..], at + rest_at)?, mark)
                }
                None => ChoiceBranch::new(self.parse_pattern(part, at)?, 0),
            };
            branches.push(branch);
        }
        Ok(PatternNode::Choice(branches))
    }

    fn parse_placeholder(&self, spec: &str, at: usize) -> Result<PatternNode, CompileError> {
        let invalid = || CompileError::InvalidPlaceholder {
            spec: spec.to_string(),
            index: at,
        };
        let caps = PLACEHOLDER_SPEC.captures(spec).ok_or_else(invalid)?;

        let nullable = caps.get(1).is_some();
        let acceptance = match caps.get(2).map(|m| m.as_str()) {
            Some("~") => Acceptance::ExpressionsOnly,
            Some(_) => Acceptance::LiteralsOnly,
            None => Acceptance::Both,
        };

        let mut types: SmallVec<[PatternType; 2]> = SmallVec::new();
        let names = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        for name in names.split('/') {
            if name.is_empty() {
                return Err(invalid());
            }
            let ty = self
                .types
                .pattern_type(name)
                .ok_or_else(|| CompileError::UnknownType {
                    name: name.to_string(),
                    index: at,
                })?;
            types.push(ty);
        }

        Ok(PatternNode::Placeholder {
            types,
            acceptance,
            nullable,
        })
    }
}

fn flush(text: &mut String, elements: &mut Vec<PatternNode>) {
    if !text.is_empty() {
        elements.push(PatternNode::Literal(std::mem::take(text)));
    }
}

/// Reads a leading `N¦`, returning the mark and the byte offset right after it.
fn parse_mark(branch: &str, at: usize) -> Result<Option<(i32, usize)>, CompileError> {
    let Some(caps) = MARK_PREFIX.captures(branch) else {
        return Ok(None);
    };
    let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
        return Ok(None);
    };
    let mark = digits
        .as_str()
        .parse::<i32>()
        .map_err(|_| CompileError::InvalidMark {
            mark: digits.as_str().to_string(),
            index: at,
        })?;
    Ok(Some((mark, whole.end())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::TypeHandle;

    fn resolver(name: &str) -> Option<PatternType> {
        match name {
            "number" => Some(PatternType::new(TypeHandle(1), name, true)),
            "numbers" => Some(PatternType::new(TypeHandle(1), name, false)),
            "string" => Some(PatternType::new(TypeHandle(2), name, true)),
            _ => None,
        }
    }

    fn compile_ok(pattern: &str) -> PatternNode {
        compile(pattern, &resolver).unwrap()
    }

    #[test]
    fn test_plain_literal() {
        assert_eq!(compile_ok("pattern"), PatternNode::literal("pattern"));
    }

    #[test]
    fn test_empty_pattern() {
        assert_eq!(compile_ok(""), PatternNode::literal(""));
    }

    #[test]
    fn test_optional() {
        assert_eq!(
            compile_ok("[optional]"),
            PatternNode::optional(PatternNode::literal("optional"))
        );
    }

    #[test]
    fn test_single_branch_choice_is_kept() {
        assert_eq!(
            compile_ok("(single)"),
            PatternNode::Choice(vec![ChoiceBranch::new(PatternNode::literal("single"), 0)])
        );
    }

    #[test]
    fn test_marked_choice() {
        assert_eq!(
            compile_ok("(1¦this|2¦that)"),
            PatternNode::Choice(vec![
                ChoiceBranch::new(PatternNode::literal("this"), 1),
                ChoiceBranch::new(PatternNode::literal("that"), 2),
            ])
        );
    }

    #[test]
    fn test_marked_optional() {
        assert_eq!(
            compile_ok("[2¦exclusively]"),
            PatternNode::optional(PatternNode::Choice(vec![ChoiceBranch::new(
                PatternNode::literal("exclusively"),
                2
            )]))
        );
    }

    #[test]
    fn test_top_level_bar_is_choice() {
        assert_eq!(
            compile_ok("a|b c"),
            PatternNode::Choice(vec![
                ChoiceBranch::new(PatternNode::literal("a"), 0),
                ChoiceBranch::new(PatternNode::literal("b c"), 0),
            ])
        );
    }

    #[test]
    fn test_nested_groups() {
        let node = compile_ok("you must (choose|this|or this)");
        let PatternNode::Sequence(children) = node else {
            panic!("Expected sequence");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], PatternNode::literal("you must "));
        match &children[1] {
            PatternNode::Choice(branches) => {
                assert_eq!(branches.len(), 3);
                assert_eq!(branches[2].node, PatternNode::literal("or this"));
            }
            other => panic!("Expected choice, got {other:?}"),
        }
    }

    #[test]
    fn test_placeholder_flags() {
        match compile_ok("%-*number/numbers%") {
            PatternNode::Placeholder {
                types,
                acceptance,
                nullable,
            } => {
                assert!(nullable);
                assert_eq!(acceptance, Acceptance::LiteralsOnly);
                assert_eq!(types.len(), 2);
                assert!(types[0].single);
                assert_eq!(types[1].name, "numbers");
            }
            other => panic!("Expected placeholder, got {other:?}"),
        }

        match compile_ok("%~numbers%") {
            PatternNode::Placeholder {
                types, acceptance, ..
            } => {
                assert_eq!(acceptance, Acceptance::ExpressionsOnly);
                assert!(!types[0].single);
            }
            other => panic!("Expected placeholder, got {other:?}"),
        }
    }

    #[test]
    fn test_regex_group() {
        match compile_ok("<\\d+> items") {
            PatternNode::Sequence(children) => {
                assert!(matches!(&children[0], PatternNode::Regex(g) if g.source() == "\\d+"));
                assert_eq!(children[1], PatternNode::literal(" items"));
            }
            other => panic!("Expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn test_escapes() {
        assert_eq!(compile_ok(r"a \[b\] \%"), PatternNode::literal("a [b] %"));
    }

    #[test]
    fn test_errors() {
        let err = |p: &str| compile(p, &resolver).unwrap_err();
        assert_eq!(err("say [hi"), CompileError::UnmatchedOpening { open: '[', index: 4 });
        assert_eq!(err("(a|b"), CompileError::UnmatchedOpening { open: '(', index: 0 });
        assert_eq!(err("<abc"), CompileError::UnmatchedOpening { open: '<', index: 0 });
        assert_eq!(err("a %number"), CompileError::UnmatchedPercent { index: 2 });
        assert_eq!(err("a)"), CompileError::UnmatchedClosing { close: ')', index: 1 });
        assert_eq!(err("end\\"), CompileError::TrailingEscape { index: 3 });
        assert_eq!(
            err("%colour%"),
            CompileError::UnknownType {
                name: "colour".to_string(),
                index: 0
            }
        );
        assert!(matches!(err("%%"), CompileError::InvalidPlaceholder { .. }));
        assert!(matches!(err("%number//string%"), CompileError::InvalidPlaceholder { .. }));
        assert!(matches!(err("<(>"), CompileError::InvalidRegex { index: 0, .. }));
        assert!(matches!(err("(99999999999¦a)"), CompileError::InvalidMark { index: 1, .. }));
    }

    #[test]
    fn test_error_index_inside_group() {
        let err = compile("x (a|%foo%)", &resolver).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownType {
                name: "foo".to_string(),
                index: 5
            }
        );
    }

    #[test]
    fn test_display_round_trip() {
        for pattern in [
            "random (0¦number|1¦integer) between %number% and %number% [2¦exclusively]",
            "say %number% [!]",
            r"<\d+> \| %-~numbers%",
            "a|b",
        ] {
            let node = compile_ok(pattern);
            let again = compile_ok(&node.to_string());
            assert_eq!(node, again, "round trip of {pattern}");
        }
    }
}
