//! The engine context: every registry the matcher and resolver consult, built once
//! by [`EngineBuilder`] and read-only afterwards apart from the recency lists.

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use skriptlet_syntax::{CompileError, PatternNode, PatternType, TypeHandle, TypeResolver, compile};
use std::sync::Arc;
use tracing::{debug, error};

use crate::class::{ClassHierarchy, ClassId};
use crate::config::EngineConfig;
use crate::converters::{ChainFlags, ConverterEdge, ConverterGraph};
use crate::registry::{CompiledPattern, DEFAULT_PRIORITY, SyntaxDescriptor, SyntaxRegistry};
use crate::syntax::{Effect, EffectFactory, Expression, ExpressionFactory, ParseResult};
use crate::types::{TypeDef, TypeRegistry};
use crate::value::Value;

struct PendingSyntax<F> {
    name: String,
    return_class: ClassId,
    patterns: Vec<String>,
    factory: F,
    priority: i32,
}

/// Collects classes, types, converters and syntax kinds, then freezes them into an
/// [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    classes: ClassHierarchy,
    types: TypeRegistry,
    converters: Vec<ConverterEdge>,
    expressions: Vec<PendingSyntax<ExpressionFactory>>,
    effects: Vec<PendingSyntax<EffectFactory>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            classes: ClassHierarchy::new(),
            types: TypeRegistry::new(),
            converters: Vec::new(),
            expressions: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn classes(&self) -> &ClassHierarchy {
        &self.classes
    }

    pub fn register_class(&mut self, name: &str, parent: ClassId) -> Result<ClassId> {
        self.classes.register(name, parent)
    }

    pub fn register_type(&mut self, def: TypeDef) -> Result<TypeHandle> {
        self.types.register(def)
    }

    /// Converters are deduplicated and chained when the engine is built.
    pub fn register_converter<F>(
        &mut self,
        from: ClassId,
        to: ClassId,
        function: F,
        flags: ChainFlags,
    ) where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.converters.push(ConverterEdge::new(from, to, function, flags));
    }

    pub fn register_expression<F>(
        &mut self,
        name: &str,
        return_type: &str,
        patterns: &[&str],
        factory: F,
    ) -> Result<()>
    where
        F: Fn(ParseResult) -> Result<Box<dyn Expression>> + Send + Sync + 'static,
    {
        self.register_expression_with_priority(
            name,
            return_type,
            patterns,
            DEFAULT_PRIORITY,
            factory,
        )
    }

    /// Higher priorities are tried first among descriptors that are not in the
    /// recency lists.
    pub fn register_expression_with_priority<F>(
        &mut self,
        name: &str,
        return_type: &str,
        patterns: &[&str],
        priority: i32,
        factory: F,
    ) -> Result<()>
    where
        F: Fn(ParseResult) -> Result<Box<dyn Expression>> + Send + Sync + 'static,
    {
        let return_class = self
            .types
            .by_name(return_type)
            .map(|ty| ty.class())
            .with_context(|| {
                format!("Unknown return type '{return_type}' for expression '{name}'")
            })?;
        if patterns.is_empty() {
            bail!("expression '{name}' declares no patterns");
        }
        self.expressions.push(PendingSyntax {
            name: name.to_string(),
            return_class,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            factory: Arc::new(factory),
            priority,
        });
        Ok(())
    }

    pub fn register_effect<F>(&mut self, name: &str, patterns: &[&str], factory: F) -> Result<()>
    where
        F: Fn(ParseResult) -> Result<Box<dyn Effect>> + Send + Sync + 'static,
    {
        if patterns.is_empty() {
            bail!("effect '{name}' declares no patterns");
        }
        self.effects.push(PendingSyntax {
            name: name.to_string(),
            return_class: ClassId::OBJECT,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            factory: Arc::new(factory),
            priority: DEFAULT_PRIORITY,
        });
        Ok(())
    }

    /// Closes the converter graph and compiles every pattern. Patterns that fail to
    /// compile are logged and dropped; the rest of their syntax kind stays usable.
    pub fn build(self) -> Engine {
        let classes = Arc::new(self.classes);

        let mut graph = ConverterGraph::new(classes.clone());
        for edge in self.converters {
            let (from, to) = (edge.from, edge.to);
            if !graph.register(edge) {
                debug!(
                    from = classes.name(from),
                    to = classes.name(to),
                    "converter already covered, skipped"
                );
            }
        }
        graph.materialize_chains();

        let expressions = compile_all(self.expressions, &self.types);
        let effects = compile_all(self.effects, &self.types);

        Engine {
            expressions: SyntaxRegistry::new(expressions, self.config.mru_capacity),
            effects: SyntaxRegistry::new(effects, self.config.mru_capacity),
            config: self.config,
            classes,
            types: self.types,
            converters: Arc::new(graph),
        }
    }
}

fn compile_all<F>(
    pending: Vec<PendingSyntax<F>>,
    types: &TypeRegistry,
) -> Vec<SyntaxDescriptor<F>> {
    pending
        .into_iter()
        .map(|syntax| {
            let declared = syntax.patterns.len();
            let patterns = syntax
                .patterns
                .iter()
                .enumerate()
                .filter_map(|(index, pattern)| match compile(pattern, types) {
                    Ok(node) => Some(CompiledPattern { index, node }),
                    Err(e) => {
                        error!(syntax = %syntax.name, "invalid pattern\n{}", e.render(pattern));
                        None
                    }
                })
                .collect();
            SyntaxDescriptor::new(
                syntax.name,
                syntax.return_class,
                declared,
                patterns,
                syntax.factory,
                syntax.priority,
            )
        })
        .collect()
}

/// Registries plus configuration. Cheap to share between threads; resolution only
/// mutates the recency lists and attempt counters.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) classes: Arc<ClassHierarchy>,
    pub(crate) types: TypeRegistry,
    pub(crate) converters: Arc<ConverterGraph>,
    pub(crate) expressions: SyntaxRegistry<ExpressionFactory>,
    pub(crate) effects: SyntaxRegistry<EffectFactory>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// An engine with the built-in types, converters and syntax kinds.
    pub fn with_defaults() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let mut builder = EngineBuilder::new().with_config(config);
        crate::defaults::register(&mut builder)?;
        Ok(builder.build())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classes(&self) -> &ClassHierarchy {
        &self.classes
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn converters(&self) -> &ConverterGraph {
        &self.converters
    }

    /// Compiles a pattern against this engine's types.
    pub fn compile(&self, pattern: &str) -> Result<PatternNode, CompileError> {
        compile(pattern, &self.types)
    }

    pub fn pattern_type(&self, name: &str) -> Option<PatternType> {
        self.types.pattern_type(name)
    }

    pub fn convert(&self, value: &Value, to: ClassId) -> Option<Value> {
        self.converters.convert(value, to)
    }

    pub fn converter_exists(&self, from: ClassId, to: ClassId) -> bool {
        self.converters.converter_exists(from, to)
    }

    /// Structural match attempts made so far against the syntax kind `name`,
    /// expressions and effects alike.
    pub fn attempt_count(&self, name: &str) -> u64 {
        self.expressions.attempt_count(name) + self.effects.attempt_count(name)
    }

    /// Renders `value` with its type's display override, if any.
    pub fn display_value(&self, value: &Value) -> String {
        match self.types.by_class(value.class(), &self.classes) {
            Some(ty) => ty.display(value),
            None => value.to_string(),
        }
    }

    /// Resolves independent lines in parallel, each as `type_name`. The result has one
    /// entry per line, in order.
    pub fn resolve_all(
        &self,
        lines: &[&str],
        type_name: &str,
    ) -> Result<Vec<Option<Box<dyn Expression>>>> {
        let Some(expected) = self.pattern_type(type_name) else {
            bail!("Unknown type '{type_name}'");
        };

        let results: Vec<Option<Box<dyn Expression>>> = if self.config.max_parallel_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.max_parallel_threads)
                .build()
                .context("Failed to create thread pool")?;
            pool.install(|| {
                lines
                    .par_iter()
                    .map(|line| self.resolve(line, &expected))
                    .collect()
            })
        } else {
            lines
                .par_iter()
                .map(|line| self.resolve(line, &expected))
                .collect()
        };
        Ok(results)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("types", &self.types.len())
            .field("converters", &self.converters.edges().len())
            .field("expressions", &self.expressions.len())
            .field("effects", &self.effects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::SimpleLiteral;

    fn constant(result: ParseResult) -> Result<Box<dyn Expression>> {
        Ok(Box::new(SimpleLiteral::new(ClassId::INTEGER, vec![Value::Integer(1)], result.source)))
    }

    fn builder() -> EngineBuilder {
        let config = EngineConfig::new().with_log_unresolved(false);
        let mut builder = EngineBuilder::new().with_config(config);
        let number = TypeDef::new("number¦s", ClassId::NUMBER)
            .literal_parser(|s| s.parse().ok().map(Value::Integer));
        builder.register_type(number).unwrap();
        builder
    }

    #[test]
    fn test_invalid_patterns_are_dropped() {
        let mut builder = builder();
        builder
            .register_expression("one", "number", &["one", "[broken", "%nothing%", "uno"], constant)
            .unwrap();
        let engine = builder.build();

        let descriptor = engine.expressions.iter().next().unwrap();
        let indices: Vec<usize> = descriptor.patterns().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 3]);
        assert!(engine.resolve_expression("uno", "number").is_some());
    }

    #[test]
    fn test_unknown_return_type() {
        let mut builder = builder();
        let err = builder
            .register_expression("x", "colour", &["x"], constant)
            .unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_empty_pattern_list() {
        let mut builder = builder();
        assert!(builder.register_expression("x", "number", &[], constant).is_err());
        assert!(builder
            .register_effect("y", &[], |_| bail!("unused"))
            .is_err());
    }

    #[test]
    fn test_resolve_all_unknown_type() {
        let engine = builder().build();
        assert!(engine.resolve_all(&["1"], "colour").is_err());
    }

    #[test]
    fn test_resolve_all_with_pool() -> Result<()> {
        let mut builder = builder();
        builder.config = EngineConfig::new()
            .with_log_unresolved(false)
            .with_max_parallel_threads(2);
        let engine = builder.build();
        let results = engine.resolve_all(&["1", "two", "3"], "number")?;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().and_then(|e| e.single_value()), Some(Value::Integer(3)));
        Ok(())
    }
}
