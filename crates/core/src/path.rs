//! Field paths and record resolution.
//!
//! A [`Path`] is an ordered list of keys. Configuration may spell it as a JSON
//! array (`["category", "label"]`) or as a dotted string with optional array
//! indices (`"photos[0].name"`); both produce the same segments.

#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segs: SmallVec<[String; 4]>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path {path:?}: {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: &'static str,
}

impl Path {
    pub fn new<I, S>(segs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segs: segs.into_iter().map(Into::into).collect() }
    }

    /// Parse a dotted path such as `track.photos[0].name`.
    /// The empty string parses to the empty path.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let err = |reason| PathError { path: raw.to_string(), reason };
        let s = raw.strip_prefix('.').unwrap_or(raw);
        let mut segs: SmallVec<[String; 4]> = SmallVec::new();
        if s.is_empty() {
            return Ok(Self { segs });
        }
        for part in s.split('.') {
            if part.is_empty() { return Err(err("empty segment")); }
            let (key, mut rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if key.contains(']') { return Err(err("unbalanced ']'")); }
            if !key.is_empty() { segs.push(key.to_string()); } else if rest.is_empty() { return Err(err("empty segment")); }
            // trailing indices: [0][1]...
            while !rest.is_empty() {
                let body = rest.strip_prefix('[').ok_or_else(|| err("expected '['"))?;
                let close = body.find(']').ok_or_else(|| err("missing ']'"))?;
                let idx = &body[..close];
                if idx.is_empty() || !idx.chars().all(|c| c.is_ascii_digit()) {
                    return Err(err("array index must be digits"));
                }
                segs.push(idx.to_string());
                rest = &body[close + 1..];
            }
        }
        Ok(Self { segs })
    }

    pub fn segments(&self) -> &[String] { &self.segs }
    pub fn len(&self) -> usize { self.segs.len() }
    pub fn is_empty(&self) -> bool { self.segs.is_empty() }

    /// Append `other` after `self`.
    pub fn join(&self, other: &Path) -> Path {
        let mut segs = self.segs.clone();
        segs.extend(other.segs.iter().cloned());
        Path { segs }
    }
}

impl FromStr for Path {
    type Err = PathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Path::parse(s) }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(v: [&str; N]) -> Self { Path::new(v) }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segs.join("."))
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.segs.iter())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Segments(Vec<String>),
            Dotted(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Segments(v) => Ok(Path::new(v)),
            Repr::Dotted(s) => Path::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Anything the engine can read fields from. Domain records are never accessed
/// any other way.
pub trait Record: Send + Sync {
    /// Value at `path`, or `None` when a segment is missing or the value is null.
    fn lookup(&self, path: &Path) -> Option<&Value>;
}

impl Record for Value {
    fn lookup(&self, path: &Path) -> Option<&Value> { walk(self, path.segments()) }
}

impl Record for Map<String, Value> {
    fn lookup(&self, path: &Path) -> Option<&Value> {
        // a bare map has no whole-record value, so the empty path misses
        let (first, rest) = path.segments().split_first()?;
        walk(self.get(first)?, rest)
    }
}

fn walk<'a>(mut cur: &'a Value, segs: &[String]) -> Option<&'a Value> {
    for seg in segs {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if cur.is_null() { None } else { Some(cur) }
}

/// Resolve an optional path against a record. No path configured means no value.
pub fn resolve<'a, R: Record + ?Sized>(record: &'a R, path: Option<&Path>) -> Option<&'a Value> {
    record.lookup(path?)
}
