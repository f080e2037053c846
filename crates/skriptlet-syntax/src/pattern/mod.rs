//! Compiled pattern tree.
//!
//! A [`PatternNode`] is produced once per declared pattern by the [`compiler`] and is
//! read-only afterwards; every match attempt walks the same tree.

pub mod compiler;

use regex::Regex;
use smallvec::SmallVec;
use std::fmt;

use crate::text::MARK_SEPARATOR;

/// Opaque reference to a type known to a [`compiler::TypeResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub u32);

/// A type as referenced from a placeholder: the resolved handle, the name exactly as
/// written in the pattern, and whether that name was the singular form.
#[derive(Debug, Clone)]
pub struct PatternType {
    pub handle: TypeHandle,
    pub name: String,
    pub single: bool,
}

impl PatternType {
    pub fn new(handle: TypeHandle, name: impl Into<String>, single: bool) -> Self {
        Self {
            handle,
            name: name.into(),
            single,
        }
    }
}

impl PartialEq for PatternType {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.single == other.single
    }
}

impl Eq for PatternType {}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which kinds of sub-expression a placeholder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acceptance {
    #[default]
    Both,
    ExpressionsOnly,
    LiteralsOnly,
}

/// A `<...>` group. Holds the verbatim source plus two compiled forms: one anchored
/// at both ends for whole-region matches and one unanchored for boundary search.
#[derive(Debug, Clone)]
pub struct RegexGroup {
    source: String,
    whole: Regex,
    search: Regex,
}

impl RegexGroup {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            whole: Regex::new(&format!("^(?:{source})$"))?,
            search: Regex::new(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Anchored at both ends.
    pub fn whole(&self) -> &Regex {
        &self.whole
    }

    /// Unanchored.
    pub fn search(&self) -> &Regex {
        &self.search
    }
}

impl PartialEq for RegexGroup {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RegexGroup {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub node: PatternNode,
    pub mark: i32,
}

impl ChoiceBranch {
    pub fn new(node: PatternNode, mark: i32) -> Self {
        Self { node, mark }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternNode {
    /// Case- and whitespace-insensitive text.
    Literal(String),
    /// Children matched strictly in order. Never empty and never of length one.
    Sequence(Vec<PatternNode>),
    Optional(Box<PatternNode>),
    /// First matching branch wins and XORs its mark into the parse mark.
    Choice(Vec<ChoiceBranch>),
    Regex(RegexGroup),
    /// A `%type%` slot resolved to a nested expression.
    Placeholder {
        types: SmallVec<[PatternType; 2]>,
        acceptance: Acceptance,
        nullable: bool,
    },
}

impl PatternNode {
    pub fn literal(text: impl Into<String>) -> Self {
        PatternNode::Literal(text.into())
    }

    /// Wraps `children` in a sequence, collapsing the single-child case.
    pub fn sequence(mut children: Vec<PatternNode>) -> Self {
        match children.len() {
            0 => PatternNode::Literal(String::new()),
            1 => children.remove(0),
            _ => PatternNode::Sequence(children),
        }
    }

    pub fn optional(inner: PatternNode) -> Self {
        PatternNode::Optional(Box::new(inner))
    }

    /// Number of placeholders anywhere in this tree.
    pub fn placeholder_count(&self) -> usize {
        match self {
            PatternNode::Literal(_) | PatternNode::Regex(_) => 0,
            PatternNode::Placeholder { .. } => 1,
            PatternNode::Optional(inner) => inner.placeholder_count(),
            PatternNode::Sequence(children) => {
                children.iter().map(PatternNode::placeholder_count).sum()
            }
            PatternNode::Choice(branches) => branches
                .iter()
                .map(|b| b.node.placeholder_count())
                .max()
                .unwrap_or(0),
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for c in text.chars() {
        if matches!(c, '[' | ']' | '(' | ')' | '<' | '>' | '%' | '|' | '\\')
            || c == MARK_SEPARATOR
        {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

/// Writes the node back in pattern syntax. Compiling the output yields an equal tree.
impl fmt::Display for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternNode::Literal(text) => write_escaped(f, text),
            PatternNode::Sequence(children) => {
                for child in children {
                    write!(f, "{child}")?;
                }
                Ok(())
            }
            PatternNode::Optional(inner) => write!(f, "[{inner}]"),
            PatternNode::Choice(branches) => {
                write!(f, "(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    if branch.mark != 0 {
                        write!(f, "{}{}", branch.mark, MARK_SEPARATOR)?;
                    }
                    write!(f, "{}", branch.node)?;
                }
                write!(f, ")")
            }
            PatternNode::Regex(group) => write!(f, "<{}>", group.source()),
            PatternNode::Placeholder {
                types,
                acceptance,
                nullable,
            } => {
                write!(f, "%")?;
                if *nullable {
                    write!(f, "-")?;
                }
                match acceptance {
                    Acceptance::Both => {}
                    Acceptance::ExpressionsOnly => write!(f, "~")?,
                    Acceptance::LiteralsOnly => write!(f, "*")?,
                }
                let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
                write!(f, "{}%", names.join("/"))
            }
        }
    }
}
