//! # Skriptlet Syntax
//!
//! The pattern mini-language used to declare the surface syntax of script
//! expressions and statements, and the compiler that turns pattern strings into an
//! immutable [`PatternNode`] tree.
//!
//! ## Overview
//!
//! - **Pattern tree**: [`PatternNode`] literals, sequences, optionals, choices,
//!   regex groups and typed placeholders
//! - **Compiler**: [`compile`] resolves placeholder type names through a
//!   [`TypeResolver`] supplied by the caller
//! - **Errors**: [`CompileError`] with caret diagnostics
//! - **Text helpers**: bracket matching, `|` splitting, plural forms and
//!   case-insensitive search shared with the match engine
//!
//! ## Example
//!
//! ```rust
//! use skriptlet_syntax::{compile, PatternNode, PatternType, TypeHandle};
//!
//! let types = |name: &str| match name {
//!     "number" => Some(PatternType::new(TypeHandle(0), name, true)),
//!     _ => None,
//! };
//!
//! let node = compile("the number %number% squared", &types).expect("valid pattern");
//! assert!(matches!(node, PatternNode::Sequence(_)));
//!
//! let err = compile("say [hello", &types).unwrap_err();
//! println!("{}", err.render("say [hello"));
//! ```

pub mod error;
pub mod pattern;
pub mod text;

pub use error::CompileError;
pub use pattern::compiler::{Compiler, TypeResolver, compile};
pub use pattern::{Acceptance, ChoiceBranch, PatternNode, PatternType, RegexGroup, TypeHandle};
pub use text::PluralForms;
