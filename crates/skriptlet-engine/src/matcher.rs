//! Greedy matcher over [`PatternNode`] trees.
//!
//! Every node either succeeds with a new cursor or fails; there is no retry at a
//! different split point. Placeholders find their own end by looking at what the rest
//! of the pattern expects next (the terminators) and resolving the text up to the
//! first terminator that yields an expression.

use skriptlet_syntax::text::{
    find_closing, find_ignore_case, skip_whitespace, starts_with_ignore_case,
};
use skriptlet_syntax::{Acceptance, PatternNode, PatternType, RegexGroup};
use smallvec::SmallVec;

use crate::engine::Engine;
use crate::syntax::{Expression, ParseResult, RegexMatch};

/// Per-attempt match state.
///
/// Branch contexts collect into their own lists and are merged into the parent only
/// when the branch succeeds.
#[derive(Debug)]
pub struct MatchContext<'a> {
    source: &'a str,
    parent: Option<&'a MatchContext<'a>>,
    expressions: Vec<Box<dyn Expression>>,
    regex_matches: Vec<RegexMatch>,
    parse_mark: i32,
}

/// What a finished branch hands back to its parent.
#[derive(Debug, Default)]
pub struct MatchParts {
    expressions: Vec<Box<dyn Expression>>,
    regex_matches: Vec<RegexMatch>,
    parse_mark: i32,
}

impl<'a> MatchContext<'a> {
    pub fn new(source: &'a str, parent: Option<&'a MatchContext<'a>>) -> Self {
        Self {
            source,
            parent,
            expressions: Vec::new(),
            regex_matches: Vec::new(),
            parse_mark: 0,
        }
    }

    pub fn branch(&self) -> MatchContext<'_> {
        MatchContext::new(self.source, Some(self))
    }

    /// The text this attempt is matching.
    pub fn source(&self) -> &str {
        self.source
    }

    /// The match attempt this one was started from, if any.
    pub fn parent(&self) -> Option<&'a MatchContext<'a>> {
        self.parent
    }

    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent, |c| c.parent).count()
    }

    pub fn expressions(&self) -> &[Box<dyn Expression>] {
        &self.expressions
    }

    pub fn regex_matches(&self) -> &[RegexMatch] {
        &self.regex_matches
    }

    pub fn parse_mark(&self) -> i32 {
        self.parse_mark
    }

    pub fn add_expression(&mut self, expression: Box<dyn Expression>) {
        self.expressions.push(expression);
    }

    pub fn add_regex_match(&mut self, m: RegexMatch) {
        self.regex_matches.push(m);
    }

    pub fn add_mark(&mut self, mark: i32) {
        self.parse_mark ^= mark;
    }

    pub fn into_parts(self) -> MatchParts {
        MatchParts {
            expressions: self.expressions,
            regex_matches: self.regex_matches,
            parse_mark: self.parse_mark,
        }
    }

    pub fn merge(&mut self, parts: MatchParts) {
        self.expressions.extend(parts.expressions);
        self.regex_matches.extend(parts.regex_matches);
        self.add_mark(parts.parse_mark);
    }

    pub fn into_parse_result(self, matched_pattern: usize) -> ParseResult {
        ParseResult {
            source: self.source.to_string(),
            expressions: self.expressions,
            matched_pattern,
            regex_matches: self.regex_matches,
            parse_mark: self.parse_mark,
        }
    }
}

/// Outcome of [`Engine::match_pattern`].
#[derive(Debug)]
pub struct MatchOutcome {
    pub end: usize,
    pub expressions: Vec<Box<dyn Expression>>,
    pub regex_matches: Vec<RegexMatch>,
    pub parse_mark: i32,
}

/// The nodes that follow the one being matched, innermost sequence first.
#[derive(Debug, Clone, Copy)]
pub struct Tail<'p> {
    rest: &'p [PatternNode],
    outer: Option<&'p Tail<'p>>,
}

impl Tail<'static> {
    pub const END: Tail<'static> = Tail {
        rest: &[],
        outer: None,
    };
}

/// Where a placeholder or regex group may end.
#[derive(Debug, Clone, Copy)]
pub enum Terminator<'p> {
    /// A literal word. Where the pattern surrounds it with whitespace, the text must
    /// too (or start/end there).
    Literal {
        word: &'p str,
        spaced_before: bool,
        spaced_after: bool,
    },
    Regex(&'p RegexGroup),
    /// The next whitespace, used when another placeholder follows directly.
    Whitespace,
    EndOfText,
}

fn flatten_into<'p>(node: &'p PatternNode, out: &mut Vec<&'p PatternNode>) {
    match node {
        PatternNode::Sequence(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
        other => out.push(other),
    }
}

/// Returns `true` when a node that must be present stopped the scan.
fn collect_terminators<'p>(
    nodes: &[&'p PatternNode],
    out: &mut SmallVec<[Terminator<'p>; 4]>,
) -> bool {
    for (i, &node) in nodes.iter().enumerate() {
        match node {
            PatternNode::Literal(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    if matches!(nodes.get(i + 1), Some(PatternNode::Placeholder { .. })) {
                        out.push(Terminator::Whitespace);
                        return true;
                    }
                    continue;
                }
                out.push(Terminator::Literal {
                    word: trimmed,
                    spaced_before: text.starts_with(char::is_whitespace),
                    spaced_after: text.ends_with(char::is_whitespace),
                });
                return true;
            }
            PatternNode::Regex(group) => {
                out.push(Terminator::Regex(group));
                return true;
            }
            PatternNode::Placeholder { .. } => {
                out.push(Terminator::Whitespace);
                return true;
            }
            PatternNode::Optional(inner) => {
                let mut sub = Vec::new();
                flatten_into(inner, &mut sub);
                collect_terminators(&sub, out);
            }
            PatternNode::Choice(branches) => {
                let mut open = false;
                for branch in branches {
                    let mut sub = Vec::new();
                    flatten_into(&branch.node, &mut sub);
                    if !collect_terminators(&sub, out) {
                        open = true;
                    }
                }
                if !open {
                    return true;
                }
            }
            PatternNode::Sequence(_) => {
                let mut sub = Vec::new();
                flatten_into(node, &mut sub);
                if collect_terminators(&sub, out) {
                    return true;
                }
            }
        }
    }
    false
}

/// Candidate terminators for whatever sits in front of `tail`, in the order they
/// should be tried. Always ends with [`Terminator::EndOfText`] unless a required
/// node stops the scan first.
pub fn terminators<'p>(tail: &'p Tail<'p>) -> SmallVec<[Terminator<'p>; 4]> {
    let mut nodes = Vec::new();
    let mut frame = Some(tail);
    while let Some(current) = frame {
        for node in current.rest {
            flatten_into(node, &mut nodes);
        }
        frame = current.outer;
    }

    let mut out = SmallVec::new();
    if !collect_terminators(&nodes, &mut out) {
        out.push(Terminator::EndOfText);
    }
    out
}

/// First case-insensitive occurrence of `word` at or after `start` that has
/// whitespace (or the edge of the text) on each side that asks for it.
fn find_literal(
    text: &str,
    start: usize,
    word: &str,
    spaced_before: bool,
    spaced_after: bool,
) -> Option<usize> {
    let mut from = start;
    loop {
        let pos = find_ignore_case(text, from, word)?;
        let end = starts_with_ignore_case(text, pos, word)?;
        let (before, after) = (&text[..pos], &text[end..]);
        let open_before =
            !spaced_before || before.is_empty() || before.ends_with(char::is_whitespace);
        let open_after =
            !spaced_after || after.is_empty() || after.starts_with(char::is_whitespace);
        if open_before && open_after {
            return Some(pos);
        }
        from = pos + text[pos..].chars().next().map_or(1, char::len_utf8);
    }
}

/// Byte position at which `terminator` cuts `text`, searching from `start`.
fn boundary(terminator: &Terminator<'_>, text: &str, start: usize) -> Option<usize> {
    match *terminator {
        Terminator::Literal {
            word,
            spaced_before,
            spaced_after,
        } => find_literal(text, start, word, spaced_before, spaced_after),
        Terminator::Regex(group) => group
            .search()
            .find_iter(&text[start..])
            .find(|m| m.start() > 0)
            .map(|m| start + m.start()),
        Terminator::Whitespace => text[start..]
            .char_indices()
            .find(|(_, c)| c.is_whitespace())
            .map(|(offset, _)| start + offset),
        Terminator::EndOfText => Some(text.len()),
    }
}

impl Engine {
    /// Matches `node` against `text` starting at byte `index`.
    pub fn match_node(
        &self,
        node: &PatternNode,
        text: &str,
        index: usize,
        ctx: &mut MatchContext<'_>,
        tail: &Tail<'_>,
    ) -> Option<usize> {
        match node {
            PatternNode::Literal(literal) => {
                let start = skip_whitespace(text, index);
                let trimmed = literal.trim();
                if trimmed.is_empty() {
                    return Some(start);
                }
                let mut end = starts_with_ignore_case(text, start, trimmed)?;
                let trailing = literal.chars().rev().take_while(|c| c.is_whitespace()).count();
                for c in text[end..].chars().take(trailing) {
                    if !c.is_whitespace() {
                        break;
                    }
                    end += c.len_utf8();
                }
                Some(end)
            }

            PatternNode::Sequence(children) => {
                let mut cursor = index;
                for (i, child) in children.iter().enumerate() {
                    let rest = Tail {
                        rest: &children[i + 1..],
                        outer: Some(tail),
                    };
                    cursor = self.match_node(child, text, cursor, ctx, &rest)?;
                }
                Some(cursor)
            }

            PatternNode::Optional(inner) => {
                let mut branch = ctx.branch();
                let Some(end) = self.match_node(inner, text, index, &mut branch, tail) else {
                    return Some(index);
                };
                let parts = branch.into_parts();
                ctx.merge(parts);
                Some(end)
            }

            PatternNode::Choice(branches) => {
                for choice in branches {
                    let mut branch = ctx.branch();
                    let found = self.match_node(&choice.node, text, index, &mut branch, tail);
                    if let Some(end) = found {
                        let parts = branch.into_parts();
                        ctx.merge(parts);
                        ctx.add_mark(choice.mark);
                        return Some(end);
                    }
                }
                None
            }

            PatternNode::Regex(group) => self.match_regex(group, text, index, ctx, tail),

            PatternNode::Placeholder {
                types, acceptance, ..
            } => self.match_placeholder(types, *acceptance, text, index, ctx, tail),
        }
    }

    fn match_regex(
        &self,
        group: &RegexGroup,
        text: &str,
        index: usize,
        ctx: &mut MatchContext<'_>,
        tail: &Tail<'_>,
    ) -> Option<usize> {
        let start = skip_whitespace(text, index);
        for terminator in terminators(tail) {
            let Some(end) = boundary(&terminator, text, start) else {
                continue;
            };
            let region = text[start..end].trim_end();
            if let Some(captures) = group.whole().captures(region) {
                ctx.add_regex_match(RegexMatch::from_captures(&captures));
                return Some(start + region.len());
            }
        }

        let captures = group.search().captures_at(text, start)?;
        let whole = captures.get(0)?;
        if whole.start() != start {
            return None;
        }
        ctx.add_regex_match(RegexMatch::from_captures(&captures));
        Some(whole.end())
    }

    fn match_placeholder(
        &self,
        types: &[PatternType],
        acceptance: Acceptance,
        text: &str,
        index: usize,
        ctx: &mut MatchContext<'_>,
        tail: &Tail<'_>,
    ) -> Option<usize> {
        let start = skip_whitespace(text, index);
        for terminator in terminators(tail) {
            let Some(end) = boundary(&terminator, text, start) else {
                continue;
            };
            let candidate = &text[start..end];
            if let Some(expression) = self.resolve_placeholder(candidate, types, acceptance, ctx) {
                ctx.add_expression(expression);
                return Some(end);
            }
        }

        if text[start..].starts_with('(') {
            let close = find_closing(text, start, '(', ')')?;
            let inner = &text[start + 1..close];
            let expression = self.resolve_placeholder(inner, types, acceptance, ctx)?;
            ctx.add_expression(expression);
            return Some(close + 1);
        }

        None
    }

    fn resolve_placeholder(
        &self,
        candidate: &str,
        types: &[PatternType],
        acceptance: Acceptance,
        ctx: &MatchContext<'_>,
    ) -> Option<Box<dyn Expression>> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }
        types
            .iter()
            .find_map(|ty| self.resolve_inner(candidate, ty, acceptance, Some(ctx)))
    }

    /// Matches a compiled pattern against `text` from the start. The returned end
    /// index may fall short of the text's length.
    pub fn match_pattern(&self, pattern: &PatternNode, text: &str) -> Option<MatchOutcome> {
        let mut ctx = MatchContext::new(text, None);
        let end = self.match_node(pattern, text, 0, &mut ctx, &Tail::END)?;
        let parts = ctx.into_parts();
        Some(MatchOutcome {
            end,
            expressions: parts.expressions,
            regex_matches: parts.regex_matches,
            parse_mark: parts.parse_mark,
        })
    }
}
