/// Rule selection and recursive expansion.
///
/// Expanding a tag finds its eligible rules (priority cascade, hashtag
/// filter, guard), picks one by weighted random choice, and renders the
/// rule's content depth-first. Hooks wrap each substitution: the rule's
/// and then the reference's "before" hooks run first, the reference's and
/// then the rule's "after" hooks run last.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

use crate::core::expression::ExpressionError;
use crate::core::grammar::{Grammar, GrammarError};
use crate::core::ruleset::RuleSet;
use crate::core::watcher::Target;
use crate::schema::content::{ContentItem, DataLookup, TagId, TagRef};
use crate::schema::datum::Namespace;
use crate::schema::rule::Rule;

/// Nested tag expansions allowed before a run fails.
pub const DEFAULT_MAX_DEPTH: usize = 512;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("guard evaluation failed: {0}")]
    Expression(#[from] ExpressionError),
    #[error("expanding {tag} exceeded the recursion limit of {limit}")]
    RecursionLimitExceeded { tag: String, limit: usize },
    #[error("weighted selection for {tag} chose nothing from a total weight of {total}")]
    SelectionFailed { tag: String, total: f64 },
}

/// The grammar interpreter. Built via `Engine::builder()`.
pub struct Engine {
    rules: RuleSet,
    data: Namespace,
    rng: StdRng,
    seed: u64,
    max_depth: Option<usize>,
}

/// Builder for constructing an `Engine`.
pub struct EngineBuilder {
    grammar_files: Vec<PathBuf>,
    seed: u64,
    max_depth: Option<usize>,
    /// Directly provided rules and data (for use without files).
    grammar: Option<Grammar>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            grammar_files: Vec::new(),
            seed: 0,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            grammar: None,
        }
    }

    /// An engine over `rules` with the default seed and depth limit.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            data: Namespace::new(),
            rng: StdRng::seed_from_u64(0),
            seed: 0,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the random stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// A fresh copy of the data the loaded grammars declared.
    pub fn namespace(&self) -> Namespace {
        self.data.clone()
    }

    /// Expand `root` and return the generated text. `data` is mutated in
    /// place by captures and other hooks.
    pub fn run(&mut self, root: &TagId, data: &mut Namespace) -> Result<String, EngineError> {
        self.expand(&TagRef::new(root.clone()), data)
    }

    pub fn run_named(&mut self, name: &str, data: &mut Namespace) -> Result<String, EngineError> {
        self.run(&TagId::new(name), data)
    }

    /// Expand a tag reference, honouring its hashtags and hooks.
    pub fn expand(&mut self, tag: &TagRef, data: &mut Namespace) -> Result<String, EngineError> {
        let mut expander = Expander {
            rules: &self.rules,
            rng: &mut self.rng,
            max_depth: self.max_depth,
        };
        expander.expand_tag(tag, data, 0)
    }

    /// The rules that may fire for `tag` right now, in priority order.
    pub fn eligible_rules(&self, tag: &TagRef, data: &Namespace) -> Result<Vec<&Rule>, EngineError> {
        Ok(find_candidates(&self.rules, tag, data)?.rules)
    }

    /// Run selection for `tag` without firing anything.
    pub fn choose_rule(
        &mut self,
        tag: &TagRef,
        data: &Namespace,
    ) -> Result<Option<&Rule>, EngineError> {
        let candidates = find_candidates(&self.rules, tag, data)?;
        if candidates.rules.is_empty() {
            return Ok(None);
        }
        candidates.choose(&mut self.rng, tag).map(Some)
    }
}

impl EngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fail a run once tag expansions nest deeper than `depth`.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Let expansion recurse without bound.
    pub fn without_depth_limit(mut self) -> Self {
        self.max_depth = None;
        self
    }

    /// Load a RON grammar file at build time. Files merge in the order
    /// given, after any directly provided grammar.
    pub fn grammar_file(mut self, path: impl AsRef<Path>) -> Self {
        self.grammar_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Provide a grammar directly.
    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = Some(grammar);
        self
    }

    /// Provide rules directly.
    pub fn with_rules(self, rules: RuleSet) -> Self {
        self.with_grammar(Grammar {
            rules,
            data: Namespace::new(),
        })
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let mut grammar = self.grammar.unwrap_or_default();
        for path in &self.grammar_files {
            grammar.merge(Grammar::load_from_ron(path)?);
        }

        Ok(Engine {
            rules: grammar.rules,
            data: grammar.data,
            rng: StdRng::seed_from_u64(self.seed),
            seed: self.seed,
            max_depth: self.max_depth,
        })
    }
}

/// Rules eligible for one tag, with their summed weight.
struct Candidates<'r> {
    rules: Vec<&'r Rule>,
    total: f64,
}

impl<'r> Candidates<'r> {
    /// Draw in `[0, total)` and walk the candidates subtracting weights.
    fn choose(&self, rng: &mut StdRng, tag: &TagRef) -> Result<&'r Rule, EngineError> {
        if self.total <= 0.0 {
            // Every candidate is weightless: the first one fires.
            if let Some(&first) = self.rules.first() {
                return Ok(first);
            }
        }

        let mut remaining = rng.gen::<f64>() * self.total;
        for &rule in &self.rules {
            let weight = rule.frequency();
            if weight > 0.0 && remaining <= weight {
                return Ok(rule);
            }
            remaining -= weight;
        }

        Err(EngineError::SelectionFailed {
            tag: tag.to_string(),
            total: self.total,
        })
    }
}

fn find_candidates<'r>(
    rules: &'r RuleSet,
    tag: &TagRef,
    data: &Namespace,
) -> Result<Candidates<'r>, ExpressionError> {
    let mut candidates = Candidates {
        rules: Vec::new(),
        total: 0.0,
    };
    let mut last_matching_priority = i32::MIN;

    for rule in rules.rules_for(&tag.id) {
        if rule.priority() < last_matching_priority {
            break;
        }

        // A reference without hashtags accepts any rule; otherwise at least
        // one hashtag must be shared.
        if !tag.hashtags.is_empty() && tag.hashtags.is_disjoint(&rule.hashtags) {
            continue;
        }

        if let Some(guard) = &rule.guard {
            if !guard.test(data)? {
                trace!(tag = %tag.id, guard = %guard, "guard rejected rule");
                continue;
            }
        }

        candidates.rules.push(rule);
        candidates.total += rule.frequency();
        last_matching_priority = last_matching_priority.max(rule.min_priority());
    }

    Ok(candidates)
}

struct Expander<'e> {
    rules: &'e RuleSet,
    rng: &'e mut StdRng,
    max_depth: Option<usize>,
}

impl<'e> Expander<'e> {
    fn expand_tag(
        &mut self,
        tag: &TagRef,
        data: &mut Namespace,
        depth: usize,
    ) -> Result<String, EngineError> {
        if let Some(limit) = self.max_depth {
            if depth >= limit {
                return Err(EngineError::RecursionLimitExceeded {
                    tag: tag.to_string(),
                    limit,
                });
            }
        }

        let rules = self.rules;
        let candidates = find_candidates(rules, tag, data)?;
        if candidates.rules.is_empty() {
            debug!(tag = %tag.id, "no rule matched, emitting bracket form");
            return Ok(tag.to_string());
        }

        let rule = candidates.choose(self.rng, tag)?;
        debug!(
            tag = %tag.id,
            candidates = candidates.rules.len(),
            priority = rule.priority(),
            "firing rule"
        );
        self.fire(rule, tag, data, depth)
    }

    fn fire(
        &mut self,
        rule: &Rule,
        tag: &TagRef,
        data: &mut Namespace,
        depth: usize,
    ) -> Result<String, EngineError> {
        let target = Target::Tag(tag);
        rule.watchers.before_substitution(target, data);
        tag.watchers.before_substitution(target, data);

        let mut replacement = String::new();
        for item in rule.output.iter() {
            match item {
                ContentItem::Text(text) => replacement.push_str(text),
                ContentItem::Data(lookup) => replacement.push_str(&expand_data(lookup, data)),
                ContentItem::Tag(inner) => {
                    replacement.push_str(&self.expand_tag(inner, data, depth + 1)?)
                }
            }
        }

        let replacement = tag.watchers.after_substitution(replacement, target, data);
        Ok(rule.watchers.after_substitution(replacement, target, data))
    }
}

/// Data lookups need no rule: hooks run around the namespace value, or
/// around the bracket form when the key is absent.
fn expand_data(lookup: &DataLookup, data: &mut Namespace) -> String {
    let target = Target::Data(lookup);
    lookup.watchers.before_substitution(target, data);
    let text = match data.get(&lookup.key) {
        Some(datum) => datum.to_string(),
        None => lookup.to_string(),
    };
    lookup.watchers.after_substitution(text, target, data)
}
