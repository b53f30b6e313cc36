//! Condition evaluation against records.

use std::borrow::Cow;

use super::parser::Condition;
use crate::behavior::Behavior;
use crate::path::{FieldPath, Index, Segment};
use crate::record::Record;
use crate::value::Value;

/// Values addressed by `segments`, continuing through pointers into the
/// objects they target. Null and dangling pointers end the walk.
pub(crate) fn resolve_across<'a>(
    behavior: &'a Behavior,
    record: &'a Record,
    segments: &[Segment],
) -> Vec<&'a Value> {
    let mut out = Vec::new();
    walk(behavior, record, segments, &mut out);
    out
}

fn walk<'a>(behavior: &'a Behavior, record: &'a Record, segments: &[Segment], out: &mut Vec<&'a Value>) {
    let Some((seg, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = record.field(&seg.field) else {
        return;
    };
    let selected: Vec<&'a Value> = match (seg.index, value) {
        (None, v) => vec![v],
        (Some(Index::At(i)), Value::Array(a)) => a.items.get(i).into_iter().collect(),
        (Some(Index::Any), Value::Array(a)) => a.items.iter().collect(),
        _ => Vec::new(),
    };
    for v in selected {
        if rest.is_empty() {
            out.push(v);
            continue;
        }
        match v {
            Value::Record(nested) => walk(behavior, nested, rest, out),
            Value::Pointer(p) => {
                if let Some(target) = p.resolve(behavior) {
                    walk(behavior, target, rest, out);
                }
            }
            _ => {}
        }
    }
}

/// Texts a field condition tests. Arrays contribute each element.
fn candidates<'a>(behavior: &'a Behavior, record: &'a Record, path: &FieldPath) -> Vec<Cow<'a, str>> {
    let values = resolve_across(behavior, record, path.segments());
    if values.is_empty() {
        return pseudo_field(behavior, record, path).into_iter().collect();
    }
    let mut texts = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Array(array) => texts.extend(array.items.iter().map(Value::text)),
            other => texts.push(other.text()),
        }
    }
    texts
}

/// `id`, `object_id`, `type_id` and `type_name` for records without such a field.
fn pseudo_field<'a>(behavior: &'a Behavior, record: &'a Record, path: &FieldPath) -> Option<Cow<'a, str>> {
    let [seg] = path.segments() else {
        return None;
    };
    if seg.index.is_some() || record.has_field(&seg.field) {
        return None;
    }
    match seg.field.as_str() {
        "id" | "object_id" => record.id().map(Cow::Borrowed),
        "type_id" => Some(Cow::Borrowed(record.type_id.as_str())),
        "type_name" => behavior.registry().name(&record.type_id).map(Cow::Borrowed),
        _ => None,
    }
}

pub(crate) fn evaluate(condition: &Condition, behavior: &Behavior, record: &Record, threshold: u8) -> bool {
    match condition {
        Condition::Field { path, pattern } => candidates(behavior, record, path)
            .iter()
            .any(|text| pattern.matches(text, threshold)),
        Condition::Value(pattern) => pattern.matches(&record.text(), threshold),
        Condition::And(terms) => terms.iter().all(|t| evaluate(t, behavior, record, threshold)),
        Condition::Or(terms) => terms.iter().any(|t| evaluate(t, behavior, record, threshold)),
        Condition::Not(inner) => !evaluate(inner, behavior, record, threshold),
    }
}
