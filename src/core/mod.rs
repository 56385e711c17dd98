pub mod engine;
pub mod expression;
pub mod grammar;
pub mod ruleset;
pub mod watcher;
