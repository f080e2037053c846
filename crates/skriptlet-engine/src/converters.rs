//! Converter graph: value conversions between classes, closed under chaining.
//!
//! Lookups run in three passes over the edge list, first hit wins:
//!
//! 1. an edge whose input accepts `from` and whose output fits `to`
//! 2. an edge that fits once one side is narrowed by a runtime instance check
//! 3. an edge that needs instance checks on both sides
//!
//! Results are cached per `(from, to)` pair.

use rustc_hash::FxHashMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::class::{ClassHierarchy, ClassId};
use crate::value::Value;

pub type ConverterFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Restricts which side of a chain an edge may take part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ChainFlags(u8);

impl ChainFlags {
    pub const NONE: ChainFlags = ChainFlags(0);
    /// The edge may not be the first half of a chain.
    pub const NO_LEFT_CHAINING: ChainFlags = ChainFlags(1);
    /// The edge may not be the second half of a chain.
    pub const NO_RIGHT_CHAINING: ChainFlags = ChainFlags(2);
    pub const NO_CHAINING: ChainFlags = ChainFlags(3);

    pub fn contains(self, other: ChainFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ChainFlags {
    type Output = ChainFlags;

    fn bitor(self, rhs: ChainFlags) -> ChainFlags {
        ChainFlags(self.0 | rhs.0)
    }
}

#[derive(Clone)]
pub struct ConverterEdge {
    pub from: ClassId,
    pub to: ClassId,
    pub function: ConverterFn,
    pub flags: ChainFlags,
}

impl ConverterEdge {
    pub fn new<F>(from: ClassId, to: ClassId, function: F, flags: ChainFlags) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            from,
            to,
            function: Arc::new(function),
            flags,
        }
    }

    fn chain(first: &ConverterEdge, second: &ConverterEdge) -> ConverterEdge {
        let (f, g) = (first.function.clone(), second.function.clone());
        ConverterEdge {
            from: first.from,
            to: second.to,
            function: Arc::new(move |value: &Value| f(value).and_then(|mid| g(&mid))),
            flags: first.flags | second.flags,
        }
    }
}

impl fmt::Debug for ConverterEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterEdge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("flags", &self.flags)
            .finish()
    }
}

/// A converter found for a `(from, to)` lookup, with whatever runtime instance
/// checks the edge needs to be usable for that pair.
#[derive(Clone)]
pub enum ResolvedConverter {
    Direct(ConverterFn),
    /// The input must be an instance of `from`.
    CheckInput { from: ClassId, function: ConverterFn },
    /// The output must be an instance of `to`.
    CheckOutput { to: ClassId, function: ConverterFn },
    CheckBoth {
        from: ClassId,
        to: ClassId,
        function: ConverterFn,
    },
}

impl ResolvedConverter {
    pub fn apply(&self, value: &Value, classes: &ClassHierarchy) -> Option<Value> {
        let accepts = |from: ClassId| classes.is_assignable(value.class(), from);
        let fits = |out: &Value, to: ClassId| classes.is_assignable(out.class(), to);
        match self {
            ResolvedConverter::Direct(function) => function(value),
            ResolvedConverter::CheckInput { from, function } => {
                accepts(*from).then(|| function(value)).flatten()
            }
            ResolvedConverter::CheckOutput { to, function } => {
                function(value).filter(|out| fits(out, *to))
            }
            ResolvedConverter::CheckBoth { from, to, function } => accepts(*from)
                .then(|| function(value))
                .flatten()
                .filter(|out| fits(out, *to)),
        }
    }
}

impl fmt::Debug for ResolvedConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedConverter::Direct(_) => write!(f, "Direct"),
            ResolvedConverter::CheckInput { from, .. } => write!(f, "CheckInput({from:?})"),
            ResolvedConverter::CheckOutput { to, .. } => write!(f, "CheckOutput({to:?})"),
            ResolvedConverter::CheckBoth { from, to, .. } => {
                write!(f, "CheckBoth({from:?}, {to:?})")
            }
        }
    }
}

pub struct ConverterGraph {
    classes: Arc<ClassHierarchy>,
    edges: Vec<ConverterEdge>,
    cache: RwLock<FxHashMap<(ClassId, ClassId), Option<ResolvedConverter>>>,
}

impl ConverterGraph {
    pub fn new(classes: Arc<ClassHierarchy>) -> Self {
        Self {
            classes,
            edges: Vec::with_capacity(32),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn classes(&self) -> &Arc<ClassHierarchy> {
        &self.classes
    }

    pub fn edges(&self) -> &[ConverterEdge] {
        &self.edges
    }

    /// Adds an edge. Returns `false` when an edge already covers the same pair, in
    /// which case the new one is dropped. More specific edges are kept in front of
    /// broader ones so they are found first.
    pub fn register(&mut self, edge: ConverterEdge) -> bool {
        if self.exists_slow(edge.from, edge.to) {
            return false;
        }
        let position = self.edges.iter().position(|other| {
            self.classes.is_assignable(edge.from, other.from)
                && self.classes.is_assignable(other.to, edge.to)
        });
        match position {
            Some(i) => self.edges.insert(i, edge),
            None => self.edges.push(edge),
        }
        self.invalidate();
        true
    }

    /// Adds a chained edge `A -> C` for every `A -> B`, `B -> C` pair not already
    /// covered. Newly added edges take part in later pairs, so the result is the
    /// transitive closure. Returns the number of edges added.
    pub fn materialize_chains(&mut self) -> usize {
        let mut added = 0;
        let mut i = 0;
        while i < self.edges.len() {
            let mut j = 0;
            while j < self.edges.len() {
                if let Some(chained) = self.try_chain(i, j) {
                    self.edges.push(chained);
                    added += 1;
                }
                j += 1;
            }
            i += 1;
        }
        if added > 0 {
            self.invalidate();
        }
        debug!(added, total = self.edges.len(), "materialized converter chains");
        added
    }

    fn try_chain(&self, i: usize, j: usize) -> Option<ConverterEdge> {
        let (first, second) = (&self.edges[i], &self.edges[j]);
        let allowed = !first.flags.contains(ChainFlags::NO_LEFT_CHAINING)
            && !second.flags.contains(ChainFlags::NO_RIGHT_CHAINING);
        (allowed
            && self.classes.is_assignable(first.to, second.from)
            && !self.exists_slow(first.from, second.to))
        .then(|| ConverterEdge::chain(first, second))
    }

    fn related(&self, a: ClassId, b: ClassId) -> bool {
        self.classes.is_assignable(a, b) || self.classes.is_assignable(b, a)
    }

    fn exists_slow(&self, from: ClassId, to: ClassId) -> bool {
        self.edges
            .iter()
            .any(|e| self.related(e.from, from) && self.related(e.to, to))
    }

    fn invalidate(&mut self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Finds a converter from `from` to `to`.
    pub fn resolve(&self, from: ClassId, to: ClassId) -> Option<ResolvedConverter> {
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&(from, to)) {
                return hit.clone();
            }
        }
        let resolved = self.resolve_uncached(from, to);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert((from, to), resolved.clone());
        }
        resolved
    }

    fn resolve_uncached(&self, from: ClassId, to: ClassId) -> Option<ResolvedConverter> {
        let classes = &self.classes;

        for edge in &self.edges {
            if classes.is_assignable(from, edge.from) && classes.is_assignable(edge.to, to) {
                return Some(ResolvedConverter::Direct(edge.function.clone()));
            }
        }

        for edge in &self.edges {
            if classes.is_assignable(from, edge.from) && classes.is_assignable(to, edge.to) {
                return Some(ResolvedConverter::CheckOutput {
                    to,
                    function: edge.function.clone(),
                });
            }
            if classes.is_assignable(edge.from, from) && classes.is_assignable(edge.to, to) {
                return Some(ResolvedConverter::CheckInput {
                    from: edge.from,
                    function: edge.function.clone(),
                });
            }
        }

        for edge in &self.edges {
            if classes.is_assignable(edge.from, from) && classes.is_assignable(to, edge.to) {
                return Some(ResolvedConverter::CheckBoth {
                    from: edge.from,
                    to,
                    function: edge.function.clone(),
                });
            }
        }

        None
    }

    /// Converts `value` to class `to`. Values that already are instances of `to` are
    /// returned unchanged.
    pub fn convert(&self, value: &Value, to: ClassId) -> Option<Value> {
        if self.classes.is_assignable(value.class(), to) {
            return Some(value.clone());
        }
        self.resolve(value.class(), to)?.apply(value, &self.classes)
    }

    /// Whether values declared as `from` may be usable as `to`, either directly or
    /// through some converter.
    pub fn converter_exists(&self, from: ClassId, to: ClassId) -> bool {
        self.related(from, to) || self.resolve(from, to).is_some()
    }
}

impl fmt::Debug for ConverterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterGraph")
            .field("edges", &self.edges)
            .finish()
    }
}
