/// Tag identities, references, and the content templates rules emit.
use rustc_hash::FxHashSet;
use std::fmt;

use crate::core::watcher::Watchers;

/// Identity of a tag: its name plus an optional context.
///
/// Two tags are the same identity iff both fields match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId {
    pub name: String,
    pub context: Option<String>,
}

impl TagId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: None,
        }
    }

    pub fn with_context(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: Some(context.into()),
        }
    }

    /// Parse `name` or `context.name`, splitting on the first `.`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once('.') {
            Some((context, name)) if !context.is_empty() && !name.is_empty() => {
                Some(Self::with_context(name, context))
            }
            Some(_) => None,
            None if !s.is_empty() => Some(Self::new(s)),
            None => None,
        }
    }
}

impl fmt::Display for TagId {
    /// Bracket notation: `[name]` or `[context.name]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "[{}.{}]", context, self.name),
            None => write!(f, "[{}]", self.name),
        }
    }
}

/// A recursive reference to a tag, resolved against the rule repository.
#[derive(Debug, Clone)]
pub struct TagRef {
    pub id: TagId,
    pub hashtags: FxHashSet<String>,
    pub watchers: Watchers,
}

impl TagRef {
    pub fn new(id: TagId) -> Self {
        Self {
            id,
            hashtags: FxHashSet::default(),
            watchers: Watchers::default(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TagId::new(name))
    }

    pub fn with_hashtag(mut self, hashtag: impl Into<String>) -> Self {
        self.hashtags.insert(hashtag.into());
        self
    }

    pub fn with_watchers(mut self, watchers: Watchers) -> Self {
        self.watchers = watchers;
        self
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// A non-recursive reference replaced by a namespace value.
#[derive(Debug, Clone)]
pub struct DataLookup {
    pub key: String,
    pub watchers: Watchers,
}

impl DataLookup {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            watchers: Watchers::default(),
        }
    }

    pub fn with_watchers(mut self, watchers: Watchers) -> Self {
        self.watchers = watchers;
        self
    }
}

impl fmt::Display for DataLookup {
    /// Bracket notation: `[=key]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[={}]", self.key)
    }
}

/// One item of a content template.
#[derive(Debug, Clone)]
pub enum ContentItem {
    /// Literal text, emitted as-is.
    Text(String),
    /// `[=key]`, replaced by the namespace value.
    Data(DataLookup),
    /// `[name]`, expanded recursively.
    Tag(TagRef),
}

impl fmt::Display for ContentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentItem::Text(text) => f.write_str(text),
            ContentItem::Data(lookup) => lookup.fmt(f),
            ContentItem::Tag(tag) => tag.fmt(f),
        }
    }
}

/// An ordered sequence of content items.
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub items: Vec<ContentItem>,
}

impl Content {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            items: vec![ContentItem::Text(text.into())],
        }
    }

    pub fn push(&mut self, item: ContentItem) {
        self.items.push(item);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            item.fmt(f)?;
        }
        Ok(())
    }
}

impl From<Vec<ContentItem>> for Content {
    fn from(items: Vec<ContentItem>) -> Self {
        Self { items }
    }
}
