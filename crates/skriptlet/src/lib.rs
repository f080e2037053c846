//! Pattern-driven syntax front end for Skript-like scripting languages.
//!
//! ```rust
//! use skriptlet::prelude::*;
//!
//! let engine = Engine::with_defaults()?;
//! let expr = engine.resolve_expression("1 + 2 * 3", "number").unwrap();
//! assert_eq!(expr.values(), vec![Value::Integer(7)]);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub use skriptlet_engine::{
    ChainFlags, ClassHierarchy, ClassId, Effect, Engine, EngineBuilder, EngineConfig, Expression,
    MatchOutcome, ParseResult, RegexMatch, TypeDef, Value, defaults,
};
pub use skriptlet_syntax::{
    Acceptance, CompileError, PatternNode, PatternType, TypeResolver, compile,
};
pub use skriptlet_engine;
pub use skriptlet_syntax;

pub mod prelude {
    pub use crate::{Engine, EngineBuilder, EngineConfig, compile};
    pub use crate::{ChainFlags, ClassId, Effect, Expression, ParseResult, TypeDef, Value};
}
