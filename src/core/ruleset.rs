/// Rule repository keyed by tag identity.
use rustc_hash::FxHashMap;

use crate::schema::content::TagId;
use crate::schema::rule::Rule;

/// Rules grouped by the tag they answer.
///
/// Each group is kept sorted by descending priority; rules of equal
/// priority stay in registration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: FxHashMap<TagId, Vec<Rule>>,
    next_seq: u64,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut rule: Rule) {
        rule.seq = self.next_seq;
        self.next_seq += 1;

        let group = self.rules.entry(rule.tag.clone()).or_default();
        // Insert after every rule of equal or higher priority.
        let at = group.partition_point(|r| r.priority() >= rule.priority());
        group.insert(at, rule);
    }

    /// Rules for `tag`, highest priority first. Empty if none are registered.
    pub fn rules_for(&self, tag: &TagId) -> &[Rule] {
        self.rules.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, tag: &TagId) -> bool {
        self.rules.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &TagId> {
        self.rules.keys()
    }

    /// Total number of rules across all tags.
    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Add every rule of `other`. Rules from `other` rank after existing
    /// rules of the same priority.
    pub fn merge(&mut self, other: RuleSet) {
        let mut incoming: Vec<Rule> = other.rules.into_values().flatten().collect();
        incoming.sort_by_key(|r| r.seq);
        for rule in incoming {
            self.add(rule);
        }
    }
}

impl Extend<Rule> for RuleSet {
    fn extend<I: IntoIterator<Item = Rule>>(&mut self, iter: I) {
        for rule in iter {
            self.add(rule);
        }
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        set.extend(iter);
        set
    }
}
