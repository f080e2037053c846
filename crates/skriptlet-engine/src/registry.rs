//! Syntax registry with most-recently-used ordering.
//!
//! Descriptors are grouped into buckets by declared return class. Each bucket keeps
//! an LRU of the descriptors that recently produced a successful resolution; the
//! stored tick comes from a registry-wide counter so that a scan spanning several
//! buckets still visits hits in true recency order.

use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};
use skriptlet_syntax::PatternNode;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::class::ClassId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntaxId(pub(crate) usize);

/// Default priority of a registered syntax kind.
pub const DEFAULT_PRIORITY: i32 = 5;

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// Position among the patterns the syntax kind declared.
    pub index: usize,
    pub node: PatternNode,
}

pub struct SyntaxDescriptor<F> {
    pub(crate) id: SyntaxId,
    pub(crate) name: String,
    pub(crate) return_class: ClassId,
    pub(crate) declared_patterns: usize,
    pub(crate) patterns: Vec<CompiledPattern>,
    pub(crate) factory: F,
    pub(crate) priority: i32,
    attempts: AtomicU64,
}

impl<F> SyntaxDescriptor<F> {
    pub fn new(
        name: impl Into<String>,
        return_class: ClassId,
        declared_patterns: usize,
        patterns: Vec<CompiledPattern>,
        factory: F,
        priority: i32,
    ) -> Self {
        Self {
            id: SyntaxId(0),
            name: name.into(),
            return_class,
            declared_patterns,
            patterns,
            factory,
            priority,
            attempts: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SyntaxId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_class(&self) -> ClassId {
        self.return_class
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Structural match attempts made against this descriptor's patterns.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl<F> fmt::Debug for SyntaxDescriptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("return_class", &self.return_class)
            .field("patterns", &self.patterns.len())
            .field("priority", &self.priority)
            .finish()
    }
}

struct Bucket {
    members: Vec<SyntaxId>,
    recent: Mutex<LruCache<SyntaxId, u64>>,
}

pub struct SyntaxRegistry<F> {
    descriptors: Vec<SyntaxDescriptor<F>>,
    buckets: FxHashMap<ClassId, Bucket>,
    tick: AtomicU64,
}

impl<F> SyntaxRegistry<F> {
    /// Orders `descriptors` by priority (higher first, then more declared patterns
    /// first, then registration order) and groups them by return class.
    /// `mru_capacity == 0` leaves the recency lists unbounded.
    pub fn new(mut descriptors: Vec<SyntaxDescriptor<F>>, mru_capacity: usize) -> Self {
        descriptors.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.declared_patterns.cmp(&a.declared_patterns))
        });

        let mut buckets: FxHashMap<ClassId, Bucket> = FxHashMap::default();
        for (i, descriptor) in descriptors.iter_mut().enumerate() {
            descriptor.id = SyntaxId(i);
            buckets
                .entry(descriptor.return_class)
                .or_insert_with(|| Bucket {
                    members: Vec::new(),
                    recent: Mutex::new(match NonZeroUsize::new(mru_capacity) {
                        Some(cap) => LruCache::new(cap),
                        None => LruCache::unbounded(),
                    }),
                })
                .members
                .push(descriptor.id);
        }

        Self {
            descriptors,
            buckets,
            tick: AtomicU64::new(0),
        }
    }

    pub fn get(&self, id: SyntaxId) -> Option<&SyntaxDescriptor<F>> {
        self.descriptors.get(id.0)
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SyntaxDescriptor<F>> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Candidate descriptors for a resolution, in the order they should be tried:
    /// recent hits first, most recent leading, then everything else in registration
    /// order. Only buckets whose class satisfies `accepts` take part.
    pub fn candidates(&self, accepts: impl Fn(ClassId) -> bool) -> Vec<&SyntaxDescriptor<F>> {
        let buckets: Vec<&Bucket> = self
            .buckets
            .iter()
            .filter(|(class, _)| accepts(**class))
            .map(|(_, bucket)| bucket)
            .collect();

        let mut recent: Vec<(u64, SyntaxId)> = Vec::new();
        for bucket in &buckets {
            if let Ok(cache) = bucket.recent.lock() {
                recent.extend(cache.iter().map(|(id, tick)| (*tick, *id)));
            }
        }
        recent.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut seen: FxHashSet<SyntaxId> = FxHashSet::default();
        let mut ordered: Vec<SyntaxId> = Vec::new();
        for (_, id) in recent {
            if seen.insert(id) {
                ordered.push(id);
            }
        }

        let mut rest: Vec<SyntaxId> = buckets
            .iter()
            .flat_map(|b| b.members.iter().copied())
            .filter(|id| !seen.contains(id))
            .collect();
        rest.sort_unstable();
        ordered.extend(rest);

        ordered.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Moves `id` to the front of its bucket's recency list.
    pub fn promote(&self, id: SyntaxId) {
        let Some(descriptor) = self.get(id) else {
            return;
        };
        let Some(bucket) = self.buckets.get(&descriptor.return_class) else {
            return;
        };
        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut cache) = bucket.recent.lock() {
            cache.put(id, tick);
        }
    }

    /// Total structural attempts made against descriptors named `name`.
    pub fn attempt_count(&self, name: &str) -> u64 {
        self.descriptors
            .iter()
            .filter(|d| d.name == name)
            .map(SyntaxDescriptor::attempts)
            .sum()
    }
}

impl<F> fmt::Debug for SyntaxRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxRegistry")
            .field("descriptors", &self.descriptors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(
        name: &str,
        class: ClassId,
        priority: i32,
        patterns: usize,
    ) -> SyntaxDescriptor<()> {
        SyntaxDescriptor::new(name, class, patterns, Vec::new(), (), priority)
    }

    fn names(registry: &SyntaxRegistry<()>, accepts: impl Fn(ClassId) -> bool) -> Vec<String> {
        registry
            .candidates(accepts)
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    #[test]
    fn test_priority_ordering() {
        let registry = SyntaxRegistry::new(
            vec![
                descriptor("low", ClassId::NUMBER, 1, 1),
                descriptor("few", ClassId::NUMBER, 5, 1),
                descriptor("many", ClassId::NUMBER, 5, 3),
                descriptor("high", ClassId::NUMBER, 9, 1),
                descriptor("few2", ClassId::NUMBER, 5, 1),
            ],
            0,
        );
        assert_eq!(names(&registry, |_| true), vec!["high", "many", "few", "few2", "low"]);
    }

    #[test]
    fn test_promotion_moves_to_front() {
        let registry = SyntaxRegistry::new(
            vec![
                descriptor("a", ClassId::NUMBER, 5, 1),
                descriptor("b", ClassId::NUMBER, 5, 1),
                descriptor("c", ClassId::STRING, 5, 1),
            ],
            0,
        );
        registry.promote(SyntaxId(2));
        registry.promote(SyntaxId(1));
        assert_eq!(names(&registry, |_| true), vec!["b", "c", "a"]);
        assert_eq!(names(&registry, |c| c == ClassId::NUMBER), vec!["b", "a"]);

        registry.promote(SyntaxId(2));
        assert_eq!(names(&registry, |_| true), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_bounded_recency_list_evicts() {
        let registry = SyntaxRegistry::new(
            vec![
                descriptor("a", ClassId::NUMBER, 5, 1),
                descriptor("b", ClassId::NUMBER, 5, 1),
                descriptor("c", ClassId::NUMBER, 5, 1),
            ],
            1,
        );
        registry.promote(SyntaxId(2));
        registry.promote(SyntaxId(1));
        // Only `b` is remembered; `c` falls back to registration order.
        assert_eq!(names(&registry, |_| true), vec!["b", "a", "c"]);
    }
}
