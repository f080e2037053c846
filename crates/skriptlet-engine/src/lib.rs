mod class;
mod converters;
mod engine;
mod literal;
mod matcher;
mod registry;
mod resolver;
mod syntax;
mod types;
mod value;
pub mod config;
pub mod defaults;

pub use class::{ClassHierarchy, ClassId};
pub use config::EngineConfig;
pub use converters::{ChainFlags, ConverterEdge, ConverterFn, ConverterGraph, ResolvedConverter};
pub use engine::{Engine, EngineBuilder};
pub use literal::{ConvertedExpression, ExpressionList, SimpleLiteral};
pub use matcher::{MatchContext, MatchOutcome, MatchParts, Tail, Terminator, terminators};
pub use registry::{CompiledPattern, DEFAULT_PRIORITY, SyntaxDescriptor, SyntaxId, SyntaxRegistry};
pub use syntax::{Effect, EffectFactory, Expression, ExpressionFactory, ParseResult, RegexMatch};
pub use types::{DisplayFn, LiteralParser, Type, TypeDef, TypeRegistry};
pub use value::{Object, Value};
