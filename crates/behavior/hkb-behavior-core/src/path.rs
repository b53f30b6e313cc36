//! Field paths into records.
//!
//! Grammar:
//!   segment ('/' segment)*
//!   segment := field | field ':' index | field ':' '*'
//! Examples:
//!   "name"                      -> the `name` field
//!   "bindings:0/memberPath"     -> `memberPath` of the first element of `bindings`
//!   "generators:*/name"         -> every element of `generators` (used by queries)
//!
//! Segments that land on a pointer continue in the pointed-to record when the
//! path is resolved through a container; `Record` on its own stops there.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{BehaviorError, Result};

/// Array selector following a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    At(usize),
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub field: String,
    pub index: Option<Index>,
}

impl Segment {
    pub fn field(name: impl Into<String>) -> Self {
        Segment {
            field: name.into(),
            index: None,
        }
    }

    pub fn at(name: impl Into<String>, index: usize) -> Self {
        Segment {
            field: name.into(),
            index: Some(Index::At(index)),
        }
    }

    fn parse(raw: &str, full: &str) -> Result<Self> {
        let invalid = |reason: &str| BehaviorError::InvalidPath {
            path: full.to_string(),
            reason: reason.to_string(),
        };
        let (field, index) = match raw.split_once(':') {
            None => (raw, None),
            Some((field, "*")) => (field, Some(Index::Any)),
            Some((field, idx)) => {
                let n = idx
                    .parse::<usize>()
                    .map_err(|_| invalid("array index must be a number or '*'"))?;
                (field, Some(Index::At(n)))
            }
        };
        if field.is_empty() {
            return Err(invalid("empty field segment"));
        }
        Ok(Segment {
            field: field.to_string(),
            index,
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.field)?;
        match self.index {
            Some(Index::At(n)) => write!(f, ":{n}"),
            Some(Index::Any) => f.write_str(":*"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(BehaviorError::InvalidPath {
                path: String::new(),
                reason: "empty path".to_string(),
            });
        }
        let segments = s
            .split('/')
            .map(|seg| Segment::parse(seg, s))
            .collect::<Result<Vec<_>>>()?;
        Ok(FieldPath { segments })
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        FieldPath { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when no segment uses the `*` selector.
    pub fn is_concrete(&self) -> bool {
        self.segments.iter().all(|s| s.index != Some(Index::Any))
    }

    /// Path extended by one more segment.
    pub fn join(&self, segment: Segment) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        FieldPath { segments }
    }

    /// Split off the last segment. `None` for an empty path.
    pub fn split_last(&self) -> Option<(FieldPath, &Segment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((FieldPath::from_segments(rest.to_vec()), last))
    }

    /// First segment and the remaining path.
    pub fn split_first(&self) -> Option<(&Segment, FieldPath)> {
        let (first, rest) = self.segments.split_first()?;
        Some((first, FieldPath::from_segments(rest.to_vec())))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = BehaviorError;
    fn from_str(s: &str) -> Result<Self> {
        FieldPath::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> std::result::Result<FieldPath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FieldPath::parse(&s).map_err(de::Error::custom)
    }
}

/// Anything a path-taking API accepts: parsed paths or path strings.
pub trait IntoFieldPath {
    fn into_field_path(self) -> Result<FieldPath>;
}

impl IntoFieldPath for FieldPath {
    fn into_field_path(self) -> Result<FieldPath> {
        Ok(self)
    }
}

impl IntoFieldPath for &FieldPath {
    fn into_field_path(self) -> Result<FieldPath> {
        Ok(self.clone())
    }
}

impl IntoFieldPath for &str {
    fn into_field_path(self) -> Result<FieldPath> {
        FieldPath::parse(self)
    }
}

impl IntoFieldPath for &String {
    fn into_field_path(self) -> Result<FieldPath> {
        FieldPath::parse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_and_indexed() {
        let p = FieldPath::parse("bindings:2/memberPath").unwrap();
        assert_eq!(
            p.segments(),
            &[Segment::at("bindings", 2), Segment::field("memberPath")]
        );
        assert!(p.is_concrete());
        assert_eq!(p.to_string(), "bindings:2/memberPath");
    }

    #[test]
    fn parse_wildcard() {
        let p: FieldPath = "generators:*/name".parse().unwrap();
        assert_eq!(p.segments()[0].index, Some(Index::Any));
        assert!(!p.is_concrete());
        assert_eq!(p.to_string(), "generators:*/name");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a//b").is_err());
        assert!(FieldPath::parse("a:x").is_err());
        assert!(FieldPath::parse(":3").is_err());
    }

    #[test]
    fn serde_as_string() {
        let p = FieldPath::parse("a:1/b").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"a:1/b\"");
        let back: FieldPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
