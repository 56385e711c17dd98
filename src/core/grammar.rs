/// Grammar sources: content template parsing and RON grammar loading.
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::core::expression::{Expression, ExpressionError};
use crate::core::ruleset::RuleSet;
use crate::core::watcher::{Capture, Filter, Watcher, Watchers};
use crate::schema::content::{Content, ContentItem, DataLookup, TagId, TagRef};
use crate::schema::datum::{Datum, Namespace};
use crate::schema::rule::Rule;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("template parse error: {0}")]
    TemplateParse(String),
    #[error("{location}: {source}")]
    Expression {
        location: String,
        #[source]
        source: ExpressionError,
    },
    #[error("invalid rule {0}")]
    InvalidRule(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl Content {
    /// Parse a content template into text, data lookups and tag references.
    ///
    /// Syntax:
    /// - `[name]` / `[context.name]` → tag reference
    /// - `[=key]` → data lookup
    /// - clauses after the reference: `#hashtag`, `as key`, and the filters
    ///   `sentence`, `pluralize[:plural | :singular:plural]`, `ordinal`,
    ///   `ordinalsuffix`, `cardinal`
    /// - `[[` / `]]` → literal brackets
    pub fn parse(input: &str) -> Result<Content, GrammarError> {
        let mut items = Vec::new();
        let mut literal_buf = String::new();
        let mut rest = input;

        while let Some(pos) = rest.find(|c: char| c == '[' || c == ']') {
            literal_buf.push_str(&rest[..pos]);
            let bracket = &rest[pos..pos + 1];
            let after = &rest[pos + 1..];

            // Escaped bracket
            if after.starts_with(bracket) {
                literal_buf.push_str(bracket);
                rest = &after[1..];
                continue;
            }
            if bracket == "]" {
                return Err(GrammarError::TemplateParse(
                    "unmatched closing bracket".to_string(),
                ));
            }

            let end = after.find(']').ok_or_else(|| {
                GrammarError::TemplateParse("unclosed bracket".to_string())
            })?;
            let body = &after[..end];
            if body.contains('[') {
                return Err(GrammarError::TemplateParse(
                    "nested brackets are not allowed".to_string(),
                ));
            }

            if !literal_buf.is_empty() {
                items.push(ContentItem::Text(std::mem::take(&mut literal_buf)));
            }
            items.push(parse_reference(body)?);
            rest = &after[end + 1..];
        }

        literal_buf.push_str(rest);
        if !literal_buf.is_empty() {
            items.push(ContentItem::Text(literal_buf));
        }

        Ok(Content { items })
    }
}

fn parse_reference(body: &str) -> Result<ContentItem, GrammarError> {
    let mut tokens = body.split_whitespace();
    let head = tokens
        .next()
        .ok_or_else(|| GrammarError::TemplateParse("empty brackets".to_string()))?;
    let clauses: Vec<&str> = tokens.collect();

    if let Some(key) = head.strip_prefix('=') {
        if key.is_empty() {
            return Err(GrammarError::TemplateParse(
                "empty data lookup name".to_string(),
            ));
        }
        if let Some(hashtag) = clauses.iter().find(|c| c.starts_with('#')) {
            return Err(GrammarError::TemplateParse(format!(
                "hashtag '{}' is only valid on tag references",
                hashtag
            )));
        }
        let watchers = parse_clauses(&clauses)?;
        return Ok(ContentItem::Data(DataLookup::new(key).with_watchers(watchers)));
    }

    let id = TagId::parse(head).ok_or_else(|| {
        GrammarError::TemplateParse(format!("invalid tag name '{}'", head))
    })?;
    let mut tag = TagRef::new(id);
    let mut remaining = Vec::new();
    for clause in clauses {
        match clause.strip_prefix('#') {
            Some("") => {
                return Err(GrammarError::TemplateParse("empty hashtag".to_string()));
            }
            Some(hashtag) => {
                tag.hashtags.insert(hashtag.to_string());
            }
            None => remaining.push(clause),
        }
    }
    tag.watchers = parse_clauses(&remaining)?;
    Ok(ContentItem::Tag(tag))
}

/// Parse watcher clauses: `as key` captures, anything else must be a filter.
pub fn parse_clauses(clauses: &[&str]) -> Result<Watchers, GrammarError> {
    let mut watchers = Watchers::new();
    let mut iter = clauses.iter();
    while let Some(clause) = iter.next() {
        let watcher: Arc<dyn Watcher> = if *clause == "as" {
            let key = iter.next().ok_or_else(|| {
                GrammarError::TemplateParse("'as' needs a data name".to_string())
            })?;
            Arc::new(Capture::new(*key))
        } else {
            let filter = Filter::parse_clause(clause).ok_or_else(|| {
                GrammarError::TemplateParse(format!("unknown clause '{}'", clause))
            })?;
            Arc::new(filter)
        };
        watchers.push(watcher);
    }
    Ok(watchers)
}

/// A loaded grammar: its rules and the initial namespace data.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub rules: RuleSet,
    pub data: Namespace,
}

// RON deserialization helpers. The file format names rules by tag key and
// carries guards and templates as text, so we go through intermediate structs.

#[derive(Debug, Deserialize)]
#[serde(rename = "Grammar")]
struct RonGrammar {
    rules: HashMap<String, Vec<RonRule>>,
    #[serde(default)]
    data: HashMap<String, Datum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Rule")]
struct RonRule {
    text: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    min_priority: Option<i32>,
    #[serde(default = "default_frequency")]
    frequency: f64,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    filters: Vec<String>,
}

fn default_frequency() -> f64 {
    1.0
}

impl Grammar {
    /// Load a grammar from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Grammar, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        let grammar = Self::parse_source(&contents, &path.display().to_string())?;
        tracing::info!(
            "Loaded {} rules for {} tags from {}",
            grammar.rules.len(),
            grammar.rules.tags().count(),
            path.display()
        );
        Ok(grammar)
    }

    /// Parse a grammar from a RON string.
    pub fn parse_ron(input: &str) -> Result<Grammar, GrammarError> {
        Self::parse_source(input, "<string>")
    }

    fn parse_source(input: &str, source: &str) -> Result<Grammar, GrammarError> {
        let raw: RonGrammar = ron::from_str(input)?;

        // Sorted so registration order, and with it tie-breaking, does not
        // depend on map iteration order.
        let mut keys: Vec<&String> = raw.rules.keys().collect();
        keys.sort();

        let mut rules = RuleSet::new();
        for key in keys {
            let tag = TagId::parse(key)
                .ok_or_else(|| GrammarError::InvalidRule(format!("tag '{}' in {}", key, source)))?;
            for (index, ron_rule) in raw.rules[key].iter().enumerate() {
                let location = format!("{} rule {}#{}", source, key, index);
                rules.add(build_rule(tag.clone(), ron_rule, &location)?);
            }
        }

        let data = raw.data.into_iter().collect();
        Ok(Grammar { rules, data })
    }

    /// Merge another grammar into this one. Rules accumulate; data from
    /// `other` overrides data with the same key.
    pub fn merge(&mut self, other: Grammar) {
        self.rules.merge(other.rules);
        self.data.extend(other.data);
    }
}

fn build_rule(tag: TagId, ron_rule: &RonRule, location: &str) -> Result<Rule, GrammarError> {
    if ron_rule.frequency.is_nan() || ron_rule.frequency < 0.0 {
        return Err(GrammarError::InvalidRule(format!(
            "{}: frequency {} must be non-negative",
            location, ron_rule.frequency
        )));
    }
    if let Some(min) = ron_rule.min_priority {
        if min > ron_rule.priority {
            return Err(GrammarError::InvalidRule(format!(
                "{}: min_priority {} exceeds priority {}",
                location, min, ron_rule.priority
            )));
        }
    }

    let output = Content::parse(&ron_rule.text)?;
    let clauses: Vec<&str> = ron_rule
        .filters
        .iter()
        .flat_map(|f| f.split_whitespace())
        .collect();

    let mut rule = Rule::new(tag, output)
        .with_priority(ron_rule.priority)
        .with_frequency(ron_rule.frequency)
        .with_watchers(parse_clauses(&clauses)?);
    if let Some(min) = ron_rule.min_priority {
        rule = rule.with_min_priority(min);
    }
    if let Some(when) = &ron_rule.when {
        let guard = Expression::parse(when).map_err(|source| GrammarError::Expression {
            location: location.to_string(),
            source,
        })?;
        rule = rule.with_guard(guard);
    }
    for hashtag in &ron_rule.hashtags {
        rule = rule.with_hashtag(hashtag.as_str());
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_only() {
        let c = Content::parse("Hello, world.").unwrap();
        assert_eq!(c.len(), 1);
        assert!(matches!(&c.items[0], ContentItem::Text(t) if t == "Hello, world."));
    }

    #[test]
    fn parse_tag_ref() {
        let c = Content::parse("Start [action_detail] end").unwrap();
        assert_eq!(c.len(), 3);
        assert!(matches!(&c.items[1], ContentItem::Tag(t) if t.id == TagId::new("action_detail")));
    }

    #[test]
    fn parse_context_tag() {
        let c = Content::parse("[place.name]").unwrap();
        assert!(matches!(
            &c.items[0],
            ContentItem::Tag(t) if t.id == TagId::with_context("name", "place")
        ));
    }

    #[test]
    fn parse_data_lookup_with_filters() {
        let c = Content::parse("cat[=value pluralize]").unwrap();
        assert_eq!(c.len(), 2);
        match &c.items[1] {
            ContentItem::Data(lookup) => {
                assert_eq!(lookup.key, "value");
                assert_eq!(lookup.watchers.len(), 1);
            }
            other => panic!("expected data lookup, got {:?}", other),
        }
    }

    #[test]
    fn parse_hashtags_and_capture() {
        let c = Content::parse("Hi [nickname #rude #short as name sentence]!").unwrap();
        match &c.items[1] {
            ContentItem::Tag(tag) => {
                assert!(tag.hashtags.contains("rude"));
                assert!(tag.hashtags.contains("short"));
                assert_eq!(tag.watchers.len(), 2);
            }
            other => panic!("expected tag, got {:?}", other),
        }
    }

    #[test]
    fn parse_escaped_brackets() {
        let c = Content::parse("Use [[brackets]] here.").unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.to_string(), "Use [brackets] here.");
    }

    #[test]
    fn display_round_trips_references() {
        let c = Content::parse("Hi [nickname], [=name] of [place.town].").unwrap();
        assert_eq!(c.to_string(), "Hi [nickname], [=name] of [place.town].");
    }

    #[test]
    fn parse_errors() {
        assert!(Content::parse("Bad [] here").is_err());
        assert!(Content::parse("Bad [outer[inner]] here").is_err());
        assert!(Content::parse("Bad [unclosed here").is_err());
        assert!(Content::parse("Bad ] here").is_err());
        assert!(Content::parse("[=]").is_err());
        assert!(Content::parse("[=value #tag]").is_err());
        assert!(Content::parse("[name shout]").is_err());
        assert!(Content::parse("[name as]").is_err());
        assert!(Content::parse("[name #]").is_err());
        assert!(Content::parse("[.name]").is_err());
    }

    #[test]
    fn parse_ron_grammar() {
        let grammar = Grammar::parse_ron(
            r#"Grammar(
                rules: {
                    "root": [
                        (text: "Hello. [cats]"),
                    ],
                    "cats": [
                        (text: "many cats", priority: 2, min_priority: Some(0),
                         frequency: 3.0, when: Some("value? 1 >"),
                         hashtags: ["plural"], filters: ["sentence"]),
                        (text: "a cat", priority: 1),
                    ],
                    "place.name": [ (text: "Oxford") ],
                },
                data: { "value": Number(2.0) },
            )"#,
        )
        .unwrap();

        assert_eq!(grammar.rules.len(), 4);
        let cats = grammar.rules.rules_for(&TagId::new("cats"));
        assert_eq!(cats[0].output.to_string(), "many cats");
        assert_eq!(cats[0].priority(), 2);
        assert_eq!(cats[0].min_priority(), 0);
        assert_eq!(cats[0].frequency(), 3.0);
        assert_eq!(cats[0].guard.as_ref().unwrap().to_string(), "value? 1 >");
        assert!(cats[0].hashtags.contains("plural"));
        assert_eq!(cats[0].watchers.len(), 1);
        assert_eq!(cats[1].min_priority(), 1);
        assert!(grammar
            .rules
            .contains(&TagId::with_context("name", "place")));
        assert_eq!(grammar.data.get("value"), Some(&Datum::Number(2.0)));
    }

    #[test]
    fn bad_guard_reports_location() {
        let err = Grammar::parse_ron(
            r#"Grammar(rules: { "root": [ (text: "x", when: Some("hp? lots >")) ] })"#,
        )
        .unwrap_err();
        match &err {
            GrammarError::Expression { location, source } => {
                assert_eq!(location, "<string> rule root#0");
                assert_eq!(source, &ExpressionError::Syntax("lots".into()));
            }
            other => panic!("expected expression error, got {:?}", other),
        }
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn invalid_rules_rejected() {
        assert!(matches!(
            Grammar::parse_ron(r#"Grammar(rules: { "root": [ (text: "x", frequency: -1.0) ] })"#),
            Err(GrammarError::InvalidRule(_))
        ));
        assert!(matches!(
            Grammar::parse_ron(
                r#"Grammar(rules: { "root": [ (text: "x", priority: 1, min_priority: Some(3)) ] })"#
            ),
            Err(GrammarError::InvalidRule(_))
        ));
        assert!(matches!(
            Grammar::parse_ron(r#"Grammar(rules: { ".root": [ (text: "x") ] })"#),
            Err(GrammarError::InvalidRule(_))
        ));
    }

    #[test]
    fn load_fixture_from_ron() {
        let path = std::path::PathBuf::from("tests/fixtures/cats.ron");
        let grammar = Grammar::load_from_ron(&path).unwrap();
        assert!(grammar.rules.contains(&TagId::new("root")));
        assert!(grammar.rules.contains(&TagId::new("cats")));
        assert_eq!(grammar.data.get("value"), Some(&Datum::Number(2.0)));
    }

    #[test]
    fn merge_accumulates_rules_and_overrides_data() {
        let mut base = Grammar::parse_ron(
            r#"Grammar(rules: { "root": [ (text: "a") ] }, data: { "x": Number(1.0) })"#,
        )
        .unwrap();
        let other = Grammar::parse_ron(
            r#"Grammar(rules: { "root": [ (text: "b") ] }, data: { "x": Number(2.0) })"#,
        )
        .unwrap();
        base.merge(other);
        assert_eq!(base.rules.rules_for(&TagId::new("root")).len(), 2);
        assert_eq!(base.data.get("x"), Some(&Datum::Number(2.0)));
    }
}
