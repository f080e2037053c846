//! Type registry: textual type names mapped onto value classes.

use anyhow::{Result, bail};
use rustc_hash::FxHashMap;
use skriptlet_syntax::{PatternType, PluralForms, TypeHandle, TypeResolver};
use std::fmt;
use std::sync::Arc;

use crate::class::{ClassHierarchy, ClassId};
use crate::value::Value;

/// Parses literal text into a value of the owning type.
pub type LiteralParser = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Overrides how values of the owning type are displayed.
pub type DisplayFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Declaration of a type before it is registered.
pub struct TypeDef {
    spec: String,
    class: ClassId,
    literal_parser: Option<LiteralParser>,
    display: Option<DisplayFn>,
}

impl TypeDef {
    /// `spec` is a plural form declaration such as `number¦s` or `part¦y¦ies`.
    pub fn new(spec: impl Into<String>, class: ClassId) -> Self {
        Self {
            spec: spec.into(),
            class,
            literal_parser: None,
            display: None,
        }
    }

    pub fn literal_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.literal_parser = Some(Arc::new(parser));
        self
    }

    pub fn display<F>(mut self, display: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.display = Some(Arc::new(display));
        self
    }
}

#[derive(Clone)]
pub struct Type {
    handle: TypeHandle,
    forms: PluralForms,
    class: ClassId,
    literal_parser: Option<LiteralParser>,
    display: Option<DisplayFn>,
}

impl Type {
    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    /// The singular form.
    pub fn name(&self) -> &str {
        &self.forms.singular
    }

    pub fn forms(&self) -> &PluralForms {
        &self.forms
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn parse_literal(&self, text: &str) -> Option<Value> {
        self.literal_parser.as_ref().and_then(|parse| parse(text))
    }

    pub fn has_literal_parser(&self) -> bool {
        self.literal_parser.is_some()
    }

    pub fn display(&self, value: &Value) -> String {
        match &self.display {
            Some(display) => display(value),
            None => value.to_string(),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("handle", &self.handle)
            .field("forms", &self.forms)
            .field("class", &self.class)
            .field("literal_parser", &self.literal_parser.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<Type>,
    by_name: FxHashMap<String, TypeHandle>,
    by_class: FxHashMap<ClassId, TypeHandle>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: TypeDef) -> Result<TypeHandle> {
        let Some(forms) = PluralForms::parse(&def.spec) else {
            bail!("invalid plural form declaration '{}'", def.spec);
        };
        if self.by_name.contains_key(&forms.singular) || self.by_name.contains_key(&forms.plural) {
            bail!("type '{}' is already registered", forms.singular);
        }

        let handle = TypeHandle(self.types.len() as u32);
        self.by_name.insert(forms.singular.clone(), handle);
        self.by_name.insert(forms.plural.clone(), handle);
        self.by_class.entry(def.class).or_insert(handle);
        self.types.push(Type {
            handle,
            forms,
            class: def.class,
            literal_parser: def.literal_parser,
            display: def.display,
        });
        Ok(handle)
    }

    pub fn get(&self, handle: TypeHandle) -> Option<&Type> {
        self.types.get(handle.0 as usize)
    }

    /// Finds a type by either of its forms.
    pub fn by_name(&self, name: &str) -> Option<&Type> {
        self.by_name.get(name).and_then(|&h| self.get(h))
    }

    /// Finds the type for `class`, walking up the class hierarchy when the class
    /// itself has no registered type.
    pub fn by_class(&self, class: ClassId, classes: &ClassHierarchy) -> Option<&Type> {
        classes
            .ancestors(class)
            .find_map(|c| self.by_class.get(&c))
            .and_then(|&h| self.get(h))
    }

    /// Types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeResolver for TypeRegistry {
    fn pattern_type(&self, name: &str) -> Option<PatternType> {
        let ty = self.by_name(name)?;
        Some(PatternType::new(ty.handle, name, ty.forms.singular == name))
    }
}
