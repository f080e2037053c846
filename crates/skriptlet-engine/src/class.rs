//! Value classes with single inheritance.

use anyhow::{Result, bail};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    pub const OBJECT: ClassId = ClassId(0);
    pub const NUMBER: ClassId = ClassId(1);
    pub const INTEGER: ClassId = ClassId(2);
    pub const DECIMAL: ClassId = ClassId(3);
    pub const STRING: ClassId = ClassId(4);
    pub const BOOLEAN: ClassId = ClassId(5);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct ClassInfo {
    name: String,
    parent: Option<ClassId>,
}

/// Every class except `object` has exactly one parent; `object` is the root.
#[derive(Debug, Clone)]
pub struct ClassHierarchy {
    classes: Vec<ClassInfo>,
    by_name: FxHashMap<String, ClassId>,
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassHierarchy {
    /// Creates a hierarchy holding the built-in classes.
    pub fn new() -> Self {
        let mut hierarchy = Self {
            classes: Vec::with_capacity(16),
            by_name: FxHashMap::default(),
        };
        for (name, parent) in [
            ("object", None),
            ("number", Some(ClassId::OBJECT)),
            ("integer", Some(ClassId::NUMBER)),
            ("decimal", Some(ClassId::NUMBER)),
            ("string", Some(ClassId::OBJECT)),
            ("boolean", Some(ClassId::OBJECT)),
        ] {
            hierarchy.insert(name, parent);
        }
        hierarchy
    }

    fn insert(&mut self, name: &str, parent: Option<ClassId>) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassInfo {
            name: name.to_string(),
            parent,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Registers a new class below `parent`.
    pub fn register(&mut self, name: &str, parent: ClassId) -> Result<ClassId> {
        if self.by_name.contains_key(name) {
            bail!("class '{}' is already registered", name);
        }
        if parent.index() >= self.classes.len() {
            bail!("unknown parent class for '{}'", name);
        }
        Ok(self.insert(name, Some(parent)))
    }

    pub fn by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: ClassId) -> &str {
        self.classes
            .get(id.index())
            .map(|c| c.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn parent(&self, id: ClassId) -> Option<ClassId> {
        self.classes.get(id.index()).and_then(|c| c.parent)
    }

    /// `id` followed by each of its ancestors up to `object`.
    pub fn ancestors(&self, id: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        std::iter::successors(Some(id), move |&c| self.parent(c))
    }

    /// Whether a value of class `from` can be used where `to` is expected.
    pub fn is_assignable(&self, from: ClassId, to: ClassId) -> bool {
        to == ClassId::OBJECT || self.ancestors(from).any(|c| c == to)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
