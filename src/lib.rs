//! Tag Grammar: procedural text from guarded, prioritised rewrite rules.
//!
//! A grammar maps tags to rules. Expanding a tag picks one eligible rule
//! (by priority cascade, hashtags, a stack-machine guard and weighted
//! chance) and renders its template, recursing into nested tags. Hooks
//! around each substitution capture results into the namespace or
//! rewrite the text.

pub mod core;
pub mod schema;

pub use crate::core::engine::{Engine, EngineBuilder, EngineError};
pub use crate::core::expression::{Expression, ExpressionError};
pub use crate::core::grammar::{Grammar, GrammarError};
pub use crate::core::ruleset::RuleSet;
pub use crate::core::watcher::{Capture, Filter, Target, Watcher, Watchers};
pub use crate::schema::content::{Content, ContentItem, DataLookup, TagId, TagRef};
pub use crate::schema::datum::{Datum, Namespace};
pub use crate::schema::rule::Rule;
