/// Typed values and the mutable namespace threaded through a run.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value stored in a namespace or produced by an expression.
///
/// Equality is structural and type-sensitive: `Number(1.0)` never equals
/// `Text("1")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Number(f64),
    Text(String),
    Boolean(bool),
    Namespace(Namespace),
}

impl Datum {
    /// Truthiness: zero, empty text and empty namespaces are false.
    pub fn to_bool(&self) -> bool {
        match self {
            Datum::Number(n) => *n != 0.0,
            Datum::Text(t) => !t.is_empty(),
            Datum::Boolean(b) => *b,
            Datum::Namespace(ns) => !ns.is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Datum::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Number(n) => write!(f, "{}", n),
            Datum::Text(t) => f.write_str(t),
            Datum::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Datum::Namespace(ns) => write!(f, "{}", ns),
        }
    }
}

impl From<f64> for Datum {
    fn from(n: f64) -> Self {
        Datum::Number(n)
    }
}

impl From<i32> for Datum {
    fn from(n: i32) -> Self {
        Datum::Number(n as f64)
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Boolean(b)
    }
}

impl From<&str> for Datum {
    fn from(t: &str) -> Self {
        Datum::Text(t.to_string())
    }
}

impl From<String> for Datum {
    fn from(t: String) -> Self {
        Datum::Text(t)
    }
}

impl From<Namespace> for Datum {
    fn from(ns: Namespace) -> Self {
        Datum::Namespace(ns)
    }
}

/// Key/value store consulted by guards, data lookups and hooks.
///
/// One namespace is owned by each run and mutated in place; the caller
/// can inspect it once the run returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace {
    data: FxHashMap<String, Datum>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Datum> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Datum>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Datum> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every entry of `other` into this namespace, overwriting
    /// existing keys.
    pub fn extend(&mut self, other: Namespace) {
        self.data.extend(other.data);
    }
}

impl<K: Into<String>, V: Into<Datum>> FromIterator<(K, V)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ns = Namespace::new();
        for (k, v) in iter {
            ns.set(k, v);
        }
        ns
    }
}

impl fmt::Display for Namespace {
    /// One `key: value` line per entry, sorted by key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.data.keys().collect();
        keys.sort();
        for key in keys {
            writeln!(f, "{}: {}", key, self.data[key])?;
        }
        Ok(())
    }
}
