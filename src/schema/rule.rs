/// Weighted, prioritized, optionally guarded rewrite rules.
use rustc_hash::FxHashSet;
use std::fmt;

use crate::core::expression::Expression;
use crate::core::watcher::{Watcher, Watchers};
use crate::schema::content::{Content, TagId};
use std::sync::Arc;

/// A rule answering one tag identity with a fixed content template.
///
/// `min_priority` never exceeds `priority`. A rule that matches raises the
/// cascade floor to its `min_priority`, so a rule whose floor sits below
/// its own tier lets lower tiers keep competing.
#[derive(Debug, Clone)]
pub struct Rule {
    pub tag: TagId,
    priority: i32,
    min_priority: i32,
    frequency: f64,
    pub guard: Option<Expression>,
    pub hashtags: FxHashSet<String>,
    pub output: Content,
    pub watchers: Watchers,
    /// Registration order within a repository, used to break priority ties.
    pub(crate) seq: u64,
}

impl Rule {
    /// A rule with priority 0, frequency 1, no guard and no watchers.
    pub fn new(tag: TagId, output: Content) -> Self {
        Self {
            tag,
            priority: 0,
            min_priority: 0,
            frequency: 1.0,
            guard: None,
            hashtags: FxHashSet::default(),
            output,
            watchers: Watchers::default(),
            seq: 0,
        }
    }

    /// Set the priority. The floor follows it, matching the rule to its
    /// own tier only.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self.min_priority = priority;
        self
    }

    /// Set the floor this rule admits down to, clamped to `priority`.
    pub fn with_min_priority(mut self, min_priority: i32) -> Self {
        self.min_priority = min_priority.min(self.priority);
        self
    }

    /// Set the selection weight. Negative and NaN weights become zero.
    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency.max(0.0);
        self
    }

    pub fn with_guard(mut self, guard: Expression) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_hashtag(mut self, hashtag: impl Into<String>) -> Self {
        self.hashtags.insert(hashtag.into());
        self
    }

    pub fn with_watcher(mut self, watcher: impl Watcher + 'static) -> Self {
        self.watchers.push(Arc::new(watcher));
        self
    }

    pub fn with_watchers(mut self, watchers: Watchers) -> Self {
        self.watchers = watchers;
        self
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn min_priority(&self) -> i32 {
        self.min_priority
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.tag, self.output)
    }
}
