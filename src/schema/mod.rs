pub mod content;
pub mod datum;
pub mod rule;
