//! Boolean query language for locating records.
//!
//! Queries combine field tests (`name=*Jump*`, `generators:*/name="Array Generator"`)
//! and bare value tests (`~selectr`) with case-insensitive `AND`, `OR` and `NOT`.
//! A query is parsed once and can then be evaluated against any number of records.

mod eval;
mod lexer;
mod parser;
mod pattern;

use std::fmt;
use std::str::FromStr;

pub(crate) use eval::resolve_across;
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::Condition;
pub use pattern::{partial_ratio, Pattern};

use crate::behavior::Behavior;
use crate::error::QueryParseError;
use crate::record::Record;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    /// `None` for a blank query, which matches every record.
    root: Option<Condition>,
}

impl Query {
    pub fn parse(src: &str) -> Result<Self, QueryParseError> {
        let tokens = tokenize(src)?;
        let root = parser::parse(&tokens, src.len())?;
        Ok(Query {
            source: src.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.root.as_ref()
    }

    pub fn matches_everything(&self) -> bool {
        self.root.is_none()
    }

    /// Evaluate against one record. Pointers in field paths are followed through `behavior`.
    pub fn matches(&self, behavior: &Behavior, record: &Record) -> bool {
        match &self.root {
            None => true,
            Some(cond) => eval::evaluate(cond, behavior, record, behavior.config().fuzzy_threshold),
        }
    }

    /// Lazily keep the records of `candidates` that match, preserving their order.
    pub fn filter<'a, I>(&'a self, behavior: &'a Behavior, candidates: I) -> impl Iterator<Item = &'a Record> + 'a
    where
        I: IntoIterator<Item = &'a Record>,
        I::IntoIter: 'a,
    {
        candidates
            .into_iter()
            .filter(move |record| self.matches(behavior, record))
    }
}

impl FromStr for Query {
    type Err = QueryParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Query::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::{TypeInfo, TypeRegistry};
    use crate::value::{Pointer, Value};

    fn behavior() -> Behavior {
        let mut reg = TypeRegistry::new();
        reg.insert(TypeInfo::new("type1", "int").with_format(8196));
        reg.insert(TypeInfo::new("type2", "hkStringPtr").with_format(3));
        reg.insert(TypeInfo::new("type3", "T*").with_format(6));
        reg.insert(TypeInfo::new("type4", "hkArray").with_format(8).with_subtype("type3"));
        reg.insert(
            TypeInfo::new("type10", "hkbManualSelectorGenerator")
                .with_format(7)
                .with_field("name", "type2")
                .with_field("selectedGeneratorIndex", "type1")
                .with_field("generators", "type4"),
        );
        let mut beh = Behavior::new(reg.clone(), Config::default());
        let mut add = |id: &str, name: &str, index: i64, gens: &[&str]| {
            let mut rec = Record::new(
                &reg,
                "type10",
                [("name", Value::from(name)), ("selectedGeneratorIndex", Value::Int(index))],
                Some(id.to_string()),
            )
            .unwrap();
            for g in gens {
                rec.insert_item("generators", None, Pointer::to(*g)).unwrap();
            }
            beh.add(rec).unwrap();
        };
        add("object1", "DiveJump Selector", 0, &["object2", "object3", "object0"]);
        add("object2", "Array Generator", 3, &[]);
        add("object3", "Test Generator", 5, &[]);
        beh
    }

    fn ids(beh: &Behavior, q: &str) -> Vec<String> {
        beh.query(q)
            .unwrap()
            .filter_map(|r| r.id().map(str::to_string))
            .collect()
    }

    #[test]
    fn field_patterns() {
        let beh = behavior();
        assert_eq!(ids(&beh, r#"name="DiveJump Selector""#), vec!["object1"]);
        assert_eq!(ids(&beh, "name=*Jump*"), vec!["object1"]);
        assert!(ids(&beh, "name=*Punch*").is_empty());
        assert_eq!(
            ids(&beh, "selectedGeneratorIndex=[0 TO 3]"),
            vec!["object1", "object2"]
        );
        assert_eq!(ids(&beh, "generators=*"), vec!["object1"]);
    }

    #[test]
    fn boolean_combinations() {
        let beh = behavior();
        assert_eq!(
            ids(&beh, "NOT name='Test Generator' OR selectedGeneratorIndex=5"),
            vec!["object1", "object2", "object3"]
        );
        assert_eq!(ids(&beh, "NOT selectedGeneratorIndex=5"), vec!["object1", "object2"]);
        assert_eq!(ids(&beh, "generators=* AND name=*Selector*"), vec!["object1"]);
    }

    #[test]
    fn wildcard_paths_follow_pointers() {
        let beh = behavior();
        assert_eq!(ids(&beh, r#"generators:*/name="Array Generator""#), vec!["object1"]);
        assert_eq!(ids(&beh, "generators:1/selectedGeneratorIndex=5"), vec!["object1"]);
        assert!(ids(&beh, "generators:2/name=*").is_empty());
    }

    #[test]
    fn pseudo_fields_and_bare_values() {
        let beh = behavior();
        assert_eq!(ids(&beh, "id=object3"), vec!["object3"]);
        assert_eq!(
            ids(&beh, "type_name=hkbManualSelectorGenerator").len(),
            3
        );
        assert_eq!(ids(&beh, "~selectr"), vec!["object1"]);
        assert_eq!(ids(&beh, "").len(), 3);
    }

    #[test]
    fn malformed_query_fails_whole_call() {
        let beh = behavior();
        assert!(beh.query("name=foo bar").is_err());
        let filtered: Vec<_> = beh
            .query_filtered("name=*Generator", |r| r.id() != Some("object2"))
            .unwrap()
            .collect();
        assert_eq!(filtered.len(), 1);
    }
}
