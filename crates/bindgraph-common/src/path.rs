//! Property paths inside one entity (`a.b[0].c`, `columns[*].label`).

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    /// `[*]`: the rule applies to every element of the array at this point.
    Wildcard,
}

/// Errors produced while parsing a textual path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathError {
    Empty,
    EmptySegment { pos: usize },
    UnexpectedChar { pos: usize, ch: char },
    UnterminatedBracket { pos: usize },
    InvalidIndex { pos: usize, text: String },
    /// Wildcard paths describe a family of locations and cannot be written to.
    WildcardWrite,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "path is empty"),
            PathError::EmptySegment { pos } => write!(f, "empty path segment at {pos}"),
            PathError::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected character '{ch}' at {pos}")
            }
            PathError::UnterminatedBracket { pos } => {
                write!(f, "bracket opened at {pos} is never closed")
            }
            PathError::InvalidIndex { pos, text } => {
                write!(f, "invalid array index '{text}' at {pos}")
            }
            PathError::WildcardWrite => write!(f, "cannot write through a [*] segment"),
        }
    }
}

impl Error for PathError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PropertyPath {
    segments: SmallVec<[PathSegment; 4]>,
}

impl PropertyPath {
    /// The empty path, addressing the entity's whole value tree.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(key: impl Into<String>) -> Self {
        let mut path = Self::root();
        path.segments.push(PathSegment::Key(key.into()));
        path
    }

    pub fn from_segments<I: IntoIterator<Item = PathSegment>>(segments: I) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, PathError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PathError::Empty);
        }

        let bytes = text.as_bytes();
        let mut segments: SmallVec<[PathSegment; 4]> = SmallVec::new();
        let mut expect_key = true;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    if expect_key || i + 1 == bytes.len() {
                        return Err(PathError::EmptySegment { pos: i });
                    }
                    expect_key = true;
                    i += 1;
                }
                b'[' => {
                    if expect_key && !segments.is_empty() {
                        return Err(PathError::EmptySegment { pos: i });
                    }
                    let (segment, next) = Self::parse_bracket(text, i)?;
                    segments.push(segment);
                    expect_key = false;
                    i = next;
                }
                b']' => return Err(PathError::UnexpectedChar { pos: i, ch: ']' }),
                _ => {
                    if !expect_key {
                        let ch = text[i..].chars().next().unwrap_or('?');
                        return Err(PathError::UnexpectedChar { pos: i, ch });
                    }
                    let start = i;
                    while i < bytes.len() && !matches!(bytes[i], b'.' | b'[' | b']') {
                        i += 1;
                    }
                    segments.push(PathSegment::Key(text[start..i].to_string()));
                    expect_key = false;
                }
            }
        }

        Ok(Self { segments })
    }

    /// Parse `[...]` starting at `open`; returns the segment and the index after `]`.
    fn parse_bracket(text: &str, open: usize) -> Result<(PathSegment, usize), PathError> {
        let bytes = text.as_bytes();
        let mut i = open + 1;

        if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
            let quote = bytes[i];
            i += 1;
            let mut key = String::new();
            let mut chars = text[i..].char_indices();
            let mut closed_at = None;
            while let Some((off, ch)) = chars.next() {
                if ch == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        key.push(escaped);
                    }
                    continue;
                }
                if ch as u32 == quote as u32 {
                    closed_at = Some(i + off + 1);
                    break;
                }
                key.push(ch);
            }
            let after = closed_at.ok_or(PathError::UnterminatedBracket { pos: open })?;
            if after >= bytes.len() || bytes[after] != b']' {
                return Err(PathError::UnterminatedBracket { pos: open });
            }
            return Ok((PathSegment::Key(key), after + 1));
        }

        let close = text[i..]
            .find(']')
            .map(|off| i + off)
            .ok_or(PathError::UnterminatedBracket { pos: open })?;
        let inner = text[i..close].trim();
        i = close + 1;
        if inner == "*" {
            return Ok((PathSegment::Wildcard, i));
        }
        inner
            .parse::<usize>()
            .map(|idx| (PathSegment::Index(idx), i))
            .map_err(|_| PathError::InvalidIndex {
                pos: open,
                text: inner.to_string(),
            })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, PathSegment::Wildcard))
    }

    pub fn child_key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Key(key.into()));
        next
    }

    pub fn child_index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(index));
        next
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub fn join(&self, other: &PropertyPath) -> Self {
        let mut next = self.clone();
        next.segments.extend(other.segments.iter().cloned());
        next
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self::from_segments(
            self.segments[..self.segments.len() - 1].iter().cloned(),
        ))
    }

    pub fn starts_with(&self, prefix: &PropertyPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Every non-empty prefix, shortest first: `a.b.c` yields `a`, `a.b`, `a.b.c`.
    pub fn prefixes(&self) -> impl Iterator<Item = PropertyPath> + '_ {
        (1..=self.segments.len())
            .map(move |n| Self::from_segments(self.segments[..n].iter().cloned()))
    }

    /// True when `self` is a concrete instance of `pattern` (`[*]` matches any index).
    pub fn matches(&self, pattern: &PropertyPath) -> bool {
        self.segments.len() == pattern.segments.len()
            && self
                .segments
                .iter()
                .zip(pattern.segments.iter())
                .all(|(seg, pat)| match (seg, pat) {
                    (PathSegment::Index(_), PathSegment::Wildcard) => true,
                    (a, b) => a == b,
                })
    }

    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
                (PathSegment::Key(k), Value::Array(items)) => items.get(k.parse::<usize>().ok()?)?,
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
                (PathSegment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, creating intermediate containers as needed.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), PathError> {
        if self.has_wildcard() {
            return Err(PathError::WildcardWrite);
        }
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(k) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    match current {
                        Value::Object(map) => map.entry(k.clone()).or_insert(Value::Null),
                        _ => unreachable!("container was just normalised to an object"),
                    }
                }
                PathSegment::Index(i) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    match current {
                        Value::Array(items) => {
                            if items.len() <= *i {
                                items.resize(*i + 1, Value::Null);
                            }
                            &mut items[*i]
                        }
                        _ => unreachable!("container was just normalised to an array"),
                    }
                }
                PathSegment::Wildcard => return Err(PathError::WildcardWrite),
            };
        }
        *current = value;
        Ok(())
    }

    /// Remove the value at this path; array elements are removed (later ones shift down).
    pub fn remove(&self, root: &mut Value) -> Option<Value> {
        let (last, parent) = self.segments.split_last()?;
        let parent = Self::from_segments(parent.iter().cloned());
        let container = parent.get_mut(root)?;
        match (last, container) {
            (PathSegment::Key(k), Value::Object(map)) => map.remove(k),
            (PathSegment::Index(i), Value::Array(items)) if *i < items.len() => {
                Some(items.remove(*i))
            }
            _ => None,
        }
    }

    pub fn get_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(k), Value::Object(map)) => map.get_mut(k)?,
                (PathSegment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Expand `[*]` segments against `root`, yielding concrete paths.
    ///
    /// A path without wildcards expands to itself even when nothing is stored there;
    /// a wildcard over a missing or non-array value expands to nothing.
    pub fn expand(&self, root: &Value) -> Vec<PropertyPath> {
        let mut out = Vec::new();
        self.expand_into(0, Self::root(), Some(root), &mut out);
        out
    }

    fn expand_into(
        &self,
        at: usize,
        prefix: PropertyPath,
        current: Option<&Value>,
        out: &mut Vec<PropertyPath>,
    ) {
        let Some(segment) = self.segments.get(at) else {
            out.push(prefix);
            return;
        };
        match segment {
            PathSegment::Wildcard => {
                if let Some(Value::Array(items)) = current {
                    for (i, item) in items.iter().enumerate() {
                        self.expand_into(at + 1, prefix.child_index(i), Some(item), out);
                    }
                }
            }
            concrete => {
                let next = current.and_then(|v| Self::from_segments([concrete.clone()]).get(v));
                let mut prefix = prefix;
                prefix.push(concrete.clone());
                self.expand_into(at + 1, prefix, next, out);
            }
        }
    }

    fn needs_quoting(key: &str) -> bool {
        key.is_empty() || key.contains(['.', '[', ']', '"', '\''])
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if Self::needs_quoting(k) => {
                    write!(f, "[\"{}\"]", k.replace('\\', "\\\\").replace('"', "\\\""))?
                }
                PathSegment::Key(k) => {
                    if idx > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                PathSegment::Index(i) => write!(f, "[{i}]")?,
                PathSegment::Wildcard => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for PropertyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PropertyPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PropertyPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.trim().is_empty() {
            return Ok(Self::root());
        }
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> PropertyPath {
        PropertyPath::parse(s).unwrap()
    }

    #[test]
    fn parse_and_display_roundtrip_canonical_forms() {
        for text in ["a", "a.b[0].c", "columns[*].label", "[2].x", "a[\"b.c\"]"] {
            assert_eq!(p(text).to_string(), text);
        }
        assert_eq!(p("a['k']").to_string(), "a.k");
        assert_eq!(p(" rows[ 3 ] ").to_string(), "rows[3]");
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        assert_eq!(PropertyPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            PropertyPath::parse("a..b"),
            Err(PathError::EmptySegment { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("a[1"),
            Err(PathError::UnterminatedBracket { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("a[x]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(matches!(
            PropertyPath::parse("a[0]b"),
            Err(PathError::UnexpectedChar { ch: 'b', .. })
        ));
    }

    #[test]
    fn prefixes_are_shortest_first() {
        let got: Vec<String> = p("data.items[0].name").prefixes().map(|x| x.to_string()).collect();
        assert_eq!(got, vec!["data", "data.items", "data.items[0]", "data.items[0].name"]);
    }

    #[test]
    fn wildcard_matching_and_expansion() {
        let tree = json!({"columns": [{"label": "a"}, {"label": "b"}], "other": 1});
        let pattern = p("columns[*].label");
        let expanded: Vec<String> = pattern.expand(&tree).iter().map(|x| x.to_string()).collect();
        assert_eq!(expanded, vec!["columns[0].label", "columns[1].label"]);
        assert!(p("columns[1].label").matches(&pattern));
        assert!(!p("columns.label").matches(&pattern));
        assert!(p("other[*]").expand(&tree).is_empty());
        assert_eq!(p("missing.x").expand(&tree), vec![p("missing.x")]);
    }

    #[test]
    fn get_set_remove() {
        let mut tree = json!({});
        p("a.b[2].c").set(&mut tree, json!(5)).unwrap();
        assert_eq!(tree, json!({"a": {"b": [null, null, {"c": 5}]}}));
        assert_eq!(p("a.b[2].c").get(&tree), Some(&json!(5)));
        assert_eq!(p("a.b[2]").remove(&mut tree), Some(json!({"c": 5})));
        assert_eq!(p("a.b").get(&tree), Some(&json!([null, null])));
        assert_eq!(p("x[*]").set(&mut tree, json!(1)), Err(PathError::WildcardWrite));
    }
}
