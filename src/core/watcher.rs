/// Substitution hooks: capture, sentence casing, and numeric filters.
///
/// A hook sees a substitution twice: before the referenced content is
/// generated and after, when it may rewrite the generated text. A
/// [`Watchers`] list runs the "before" pass first-registered first and the
/// "after" pass last-registered first, so hooks nest like scopes.
use std::fmt;
use std::sync::Arc;

use crate::schema::content::{DataLookup, TagRef};
use crate::schema::datum::Namespace;

/// The reference being substituted.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Tag(&'a TagRef),
    Data(&'a DataLookup),
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Tag(tag) => tag.fmt(f),
            Target::Data(lookup) => lookup.fmt(f),
        }
    }
}

pub trait Watcher: fmt::Debug + Send + Sync {
    fn before_substitution(&self, _target: Target<'_>, _data: &mut Namespace) {}

    fn after_substitution(
        &self,
        replacement: String,
        _target: Target<'_>,
        _data: &mut Namespace,
    ) -> String {
        replacement
    }
}

/// An ordered list of hooks attached to a tag reference, data lookup or rule.
#[derive(Debug, Clone, Default)]
pub struct Watchers(Vec<Arc<dyn Watcher>>);

impl Watchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, watcher: Arc<dyn Watcher>) {
        self.0.push(watcher);
    }

    pub fn with(mut self, watcher: impl Watcher + 'static) -> Self {
        self.0.push(Arc::new(watcher));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn before_substitution(&self, target: Target<'_>, data: &mut Namespace) {
        for watcher in &self.0 {
            watcher.before_substitution(target, data);
        }
    }

    pub fn after_substitution(
        &self,
        mut replacement: String,
        target: Target<'_>,
        data: &mut Namespace,
    ) -> String {
        for watcher in self.0.iter().rev() {
            replacement = watcher.after_substitution(replacement, target, data);
        }
        replacement
    }
}

impl FromIterator<Arc<dyn Watcher>> for Watchers {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Watcher>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stores the finished replacement under a namespace key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub key: String,
}

impl Capture {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Watcher for Capture {
    fn after_substitution(
        &self,
        replacement: String,
        _target: Target<'_>,
        data: &mut Namespace,
    ) -> String {
        data.set(self.key.as_str(), replacement.as_str());
        replacement
    }
}

const CARDINALS: [&str; 10] = [
    "0", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

const ORDINALS: [&str; 10] = [
    "0th", "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
];

/// Text transforms applied after substitution.
///
/// The numeric variants only act on text that parses as a finite number;
/// anything else passes through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Capitalize and terminate with a period.
    Sentence,
    /// Emit `singular` for exactly 1, `plural` otherwise.
    Pluralise { singular: String, plural: String },
    /// `1st`, `2nd`, `11th`, `101st`.
    OrdinalSuffix,
    /// `first` to `ninth`, suffixed digits beyond.
    Ordinal,
    /// `one` to `nine`, digits beyond.
    Cardinal,
}

impl Filter {
    pub fn pluralise() -> Self {
        Filter::Pluralise {
            singular: String::new(),
            plural: "s".to_string(),
        }
    }

    /// Parse a filter clause such as `sentence` or `pluralize:y:ies`.
    pub fn parse_clause(clause: &str) -> Option<Filter> {
        let mut parts = clause.split(':');
        let name = parts.next()?;
        let args: Vec<&str> = parts.collect();
        match (name, args.as_slice()) {
            ("sentence", []) => Some(Filter::Sentence),
            ("ordinal", []) => Some(Filter::Ordinal),
            ("ordinalsuffix", []) => Some(Filter::OrdinalSuffix),
            ("cardinal", []) => Some(Filter::Cardinal),
            ("pluralize" | "pluralise", []) => Some(Filter::pluralise()),
            ("pluralize" | "pluralise", [plural]) => Some(Filter::Pluralise {
                singular: String::new(),
                plural: plural.to_string(),
            }),
            ("pluralize" | "pluralise", [singular, plural]) => Some(Filter::Pluralise {
                singular: singular.to_string(),
                plural: plural.to_string(),
            }),
            _ => None,
        }
    }

    /// Apply the filter to a finished replacement.
    pub fn apply(&self, text: &str) -> String {
        match self {
            Filter::Sentence => sentence(text),
            Filter::Pluralise { singular, plural } => numeric(text, |n| {
                if n == 1.0 {
                    singular.clone()
                } else {
                    plural.clone()
                }
            }),
            Filter::OrdinalSuffix => numeric(text, ordinal_suffix),
            Filter::Ordinal => numeric(text, |n| {
                spelled(n, &ORDINALS).map_or_else(|| ordinal_suffix(n), str::to_string)
            }),
            Filter::Cardinal => numeric(text, |n| {
                spelled(n, &CARDINALS).map_or_else(|| n.to_string(), str::to_string)
            }),
        }
    }
}

impl Watcher for Filter {
    fn after_substitution(
        &self,
        replacement: String,
        _target: Target<'_>,
        _data: &mut Namespace,
    ) -> String {
        self.apply(&replacement)
    }
}

fn numeric(text: &str, generate: impl Fn(f64) -> String) -> String {
    match text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => generate(n),
        _ => text.to_string(),
    }
}

fn spelled(n: f64, words: &[&'static str; 10]) -> Option<&'static str> {
    if n.fract() == 0.0 && (0.0..10.0).contains(&n) {
        Some(words[n as usize])
    } else {
        None
    }
}

/// Suffix non-negative integers; other numbers print plainly.
pub fn ordinal_suffix(n: f64) -> String {
    let digits = n.to_string();
    if n.fract() != 0.0 || n < 0.0 {
        return digits;
    }
    let mut tail = digits.chars().rev();
    let last = tail.next();
    let tens = tail.next();
    let suffix = match (tens, last) {
        (Some('1'), _) => "th",
        (_, Some('1')) => "st",
        (_, Some('2')) => "nd",
        (_, Some('3')) => "rd",
        _ => "th",
    };
    format!("{}{}", digits, suffix)
}

fn sentence(text: &str) -> String {
    let mut chars = text.chars();
    let Some(last) = chars.next_back() else {
        return String::new();
    };

    let (body, terminator) = match last {
        '.' | '!' | '?' => (text, ""),
        ';' | ':' | ',' | '-' => (chars.as_str(), "."),
        _ => (text, "."),
    };

    let mut out = String::with_capacity(body.len() + 1);
    let mut body_chars = body.chars();
    if let Some(first) = body_chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(body_chars.as_str());
    }
    out.push_str(terminator);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Recorder {
        label: &'static str,
    }

    impl Watcher for Recorder {
        fn before_substitution(&self, _target: Target<'_>, data: &mut Namespace) {
            let log = data.get("log").map(|d| d.to_string()).unwrap_or_default();
            data.set("log", format!("{}before:{} ", log, self.label));
        }

        fn after_substitution(
            &self,
            replacement: String,
            _target: Target<'_>,
            _data: &mut Namespace,
        ) -> String {
            format!("{}({})", self.label, replacement)
        }
    }

    #[test]
    fn before_forward_after_reverse() {
        let watchers = Watchers::new()
            .with(Recorder { label: "a" })
            .with(Recorder { label: "b" });
        let tag = TagRef::named("x");
        let mut data = Namespace::new();

        watchers.before_substitution(Target::Tag(&tag), &mut data);
        assert_eq!(data.get("log").unwrap().to_string(), "before:a before:b ");

        let out = watchers.after_substitution("text".into(), Target::Tag(&tag), &mut data);
        assert_eq!(out, "a(b(text))");
    }

    #[test]
    fn capture_stores_text() {
        let lookup = DataLookup::new("x");
        let mut data = Namespace::new();
        let out =
            Capture::new("name").after_substitution("mate".into(), Target::Data(&lookup), &mut data);
        assert_eq!(out, "mate");
        assert_eq!(data.get("name").and_then(|d| d.as_text()), Some("mate"));
    }

    #[test]
    fn sentence_filter() {
        let f = Filter::Sentence;
        assert_eq!(f.apply("hello world"), "Hello world.");
        assert_eq!(f.apply("hello world!"), "Hello world!");
        assert_eq!(f.apply("is it?"), "Is it?");
        assert_eq!(f.apply("done."), "Done.");
        assert_eq!(f.apply("and then,"), "And then.");
        assert_eq!(f.apply("wait -"), "Wait .");
        assert_eq!(f.apply("list:"), "List.");
        assert_eq!(f.apply(""), "");
        assert_eq!(f.apply(";"), ".");
        assert_eq!(f.apply("élan"), "Élan.");
    }

    #[test]
    fn pluralise_non_numeric_passthrough() {
        assert_eq!(Filter::pluralise().apply("cat"), "cat");
        assert_eq!(Filter::pluralise().apply("nan"), "nan");
        assert_eq!(Filter::pluralise().apply("infinity"), "infinity");
    }

    #[test]
    fn pluralise_numbers() {
        let f = Filter::pluralise();
        assert_eq!(f.apply("1"), "");
        assert_eq!(f.apply("2"), "s");
        assert_eq!(f.apply("0"), "s");
        assert_eq!(f.apply("1.5"), "s");

        let f = Filter::parse_clause("pluralize:y:ies").unwrap();
        assert_eq!(f.apply("1"), "y");
        assert_eq!(f.apply("3"), "ies");
    }

    #[test]
    fn ordinal_suffix_filter() {
        let f = Filter::OrdinalSuffix;
        assert_eq!(f.apply("1"), "1st");
        assert_eq!(f.apply("2"), "2nd");
        assert_eq!(f.apply("3"), "3rd");
        assert_eq!(f.apply("4"), "4th");
        assert_eq!(f.apply("0"), "0th");
        assert_eq!(f.apply("11"), "11th");
        assert_eq!(f.apply("12"), "12th");
        assert_eq!(f.apply("13"), "13th");
        assert_eq!(f.apply("111"), "111th");
        assert_eq!(f.apply("21"), "21st");
        assert_eq!(f.apply("101"), "101st");
        assert_eq!(f.apply("-1"), "-1");
        assert_eq!(f.apply("2.5"), "2.5");
    }

    #[test]
    fn ordinal_filter() {
        let f = Filter::Ordinal;
        assert_eq!(f.apply("0"), "0th");
        assert_eq!(f.apply("3"), "third");
        assert_eq!(f.apply("3.0"), "third");
        assert_eq!(f.apply("5"), "fifth");
        assert_eq!(f.apply("9"), "ninth");
        assert_eq!(f.apply("10"), "10th");
        assert_eq!(f.apply("10001"), "10001st");
        assert_eq!(f.apply("-1"), "-1");
        assert_eq!(f.apply("0.5"), "0.5");
    }

    #[test]
    fn cardinal_filter() {
        let f = Filter::Cardinal;
        assert_eq!(f.apply("0"), "0");
        assert_eq!(f.apply("5"), "five");
        assert_eq!(f.apply("3.0"), "three");
        assert_eq!(f.apply("9"), "nine");
        assert_eq!(f.apply("10"), "10");
        assert_eq!(f.apply("10001"), "10001");
        assert_eq!(f.apply("-1"), "-1");
        assert_eq!(f.apply("0.5"), "0.5");
    }

    #[test]
    fn parse_clauses() {
        assert_eq!(Filter::parse_clause("sentence"), Some(Filter::Sentence));
        assert_eq!(Filter::parse_clause("pluralise"), Some(Filter::pluralise()));
        assert_eq!(
            Filter::parse_clause("pluralize:es"),
            Some(Filter::Pluralise {
                singular: String::new(),
                plural: "es".into()
            })
        );
        assert_eq!(Filter::parse_clause("sentence:x"), None);
        assert_eq!(Filter::parse_clause("shout"), None);
    }
}
