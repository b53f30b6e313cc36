//! Health checks over a loaded behavior.
//!
//! Validation only reports: every finding becomes a [`Diagnostic`] (and a log
//! record) and nothing is changed. Dangling pointers, orphans and cycles are
//! legal states of the model, so none of them ever turn into errors.

use std::fmt;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;
use crate::path::{FieldPath, Segment};
use crate::record::Record;
use crate::tables::{self, Table};
use crate::value::{Array, Value};

pub const ROOT_TYPE: &str = "hkRootLevelContainer";

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub object_id: Option<String>,
    pub path: Option<FieldPath>,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, object_id: Option<&str>, path: Option<FieldPath>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            object_id: object_id.map(str::to_string),
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.object_id, &self.path) {
            (Some(id), Some(path)) => write!(f, "{id}/{path}: {}", self.message),
            (Some(id), None) => write!(f, "{id}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Attributes holding indices into the named tables, per object type name.
const TABLE_INDEX_ATTRIBUTES: &[(&str, Table, &str)] = &[
    ("hkbManualSelectorGenerator", Table::Events, "endOfClipEventId"),
    ("hkbStateMachine", Table::Events, "eventToSendWhenStateOrTransitionChanges/id"),
    ("hkbStateMachine::TransitionInfoArray", Table::Events, "transitions:*/eventId"),
    ("hkbVariableBindingSet", Table::Variables, "bindings:*/variableIndex"),
    ("hkbClipGenerator", Table::Animations, "animationInternalId"),
];

/// Run every check. `root` defaults to the first `hkRootLevelContainer`.
pub fn validate(behavior: &Behavior, root: Option<&str>) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    check_pointers(behavior, &mut out);
    check_duplicate_names(behavior, &mut out);
    check_graph(behavior, root, &mut out);
    check_state_machines(behavior, &mut out);
    check_table_indices(behavior, &mut out);

    for diag in &out {
        let target = behavior.log_target();
        match diag.severity {
            Severity::Critical => log::error!(target: target, "CRITICAL: {diag}"),
            Severity::Error => log::error!(target: target, "{diag}"),
            Severity::Warning => log::warn!(target: target, "{diag}"),
        }
    }
    out
}

/// Every array inside a record, nested records included, with its path.
fn arrays<'a>(record: &'a Record, prefix: &FieldPath, out: &mut Vec<(FieldPath, &'a Array)>) {
    for (name, value) in record.fields() {
        match value {
            Value::Array(array) => {
                out.push((prefix.join(Segment::field(name)), array));
                for (i, item) in array.iter().enumerate() {
                    if let Value::Record(nested) = item {
                        arrays(nested, &prefix.join(Segment::at(name, i)), out);
                    }
                }
            }
            Value::Record(nested) => arrays(nested, &prefix.join(Segment::field(name)), out),
            _ => {}
        }
    }
}

fn check_pointers(behavior: &Behavior, out: &mut Vec<Diagnostic>) {
    for record in behavior.objects() {
        let id = record.id();
        for (path, pointer) in record.pointers() {
            if let Some(target) = pointer.target() {
                if !behavior.contains(target) {
                    out.push(Diagnostic::new(
                        Severity::Error,
                        id,
                        Some(path),
                        format!("pointer to non-existing object {target}"),
                    ));
                }
            }
        }

        let mut found = Vec::new();
        arrays(record, &FieldPath::default(), &mut found);
        for (path, array) in found {
            if let Some(index) = array.first_non_terminal_null() {
                out.push(Diagnostic::new(
                    Severity::Error,
                    id,
                    Some(path),
                    format!("pointer array has a null pointer before item {index}"),
                ));
            }
        }
    }
}

fn check_duplicate_names(behavior: &Behavior, out: &mut Vec<Diagnostic>) {
    for (name, ids) in behavior.duplicate_names() {
        out.push(Diagnostic::new(
            Severity::Warning,
            ids.first().map(String::as_str),
            None,
            format!("name '{name}' is shared by {}", ids.join(", ")),
        ));
    }
}

fn check_graph(behavior: &Behavior, root: Option<&str>, out: &mut Vec<Diagnostic>) {
    let root = match root {
        Some(id) => id,
        None => match behavior.find_first_by_type_name(ROOT_TYPE).and_then(Record::id) {
            Some(id) => id,
            None => {
                out.push(Diagnostic::new(
                    Severity::Warning,
                    None,
                    None,
                    format!("no {ROOT_TYPE}; skipping graph checks"),
                ));
                return;
            }
        },
    };
    let graph = match behavior.build_reference_graph(root) {
        Ok(graph) => graph,
        Err(err) => {
            out.push(Diagnostic::new(Severity::Critical, Some(root), None, err.to_string()));
            return;
        }
    };
    for orphan in graph.orphans(behavior.ids()) {
        out.push(Diagnostic::new(
            Severity::Warning,
            Some(orphan),
            None,
            format!("object is not reachable from {root}"),
        ));
    }
    for cycle in graph.cycles() {
        out.push(Diagnostic::new(
            Severity::Warning,
            cycle.first().copied(),
            None,
            format!("reference cycle: {}", cycle.join(" -> ")),
        ));
    }
}

fn pointer_target<'a>(behavior: &'a Behavior, value: Option<&Value>) -> Option<&'a Record> {
    value?.as_pointer()?.resolve(behavior)
}

fn check_state_machines(behavior: &Behavior, out: &mut Vec<Diagnostic>) {
    let Some(sm_type) = behavior.registry().find_first_type_by_name("hkbStateMachine") else {
        return;
    };
    for sm in behavior.find_objects_by_type(sm_type, true) {
        let states: HashSet<i64> = sm
            .field("states")
            .and_then(Value::as_array)
            .into_iter()
            .flat_map(Array::iter)
            .filter_map(|p| pointer_target(behavior, Some(p)))
            .filter_map(|state| state.field("stateId").and_then(Value::as_int))
            .collect();
        let Some(transitions) = pointer_target(behavior, sm.field("wildcardTransitions")) else {
            continue;
        };
        let Some(items) = transitions.field("transitions").and_then(Value::as_array) else {
            continue;
        };
        let sm_name = sm.name().unwrap_or_default();
        for (idx, transition) in items.iter().enumerate() {
            let Some(to_state) = transition
                .as_record()
                .and_then(|t| t.field("toStateId"))
                .and_then(Value::as_int)
            else {
                continue;
            };
            if !states.contains(&to_state) {
                out.push(Diagnostic::new(
                    Severity::Error,
                    transitions.id(),
                    Some(FieldPath::from_segments(vec![
                        Segment::at("transitions", idx),
                        Segment::field("toStateId"),
                    ])),
                    format!("{sm_name}: wildcard transition {idx} has invalid toStateId {to_state}"),
                ));
            }
        }
    }
}

fn check_table_indices(behavior: &Behavior, out: &mut Vec<Diagnostic>) {
    let lens: Vec<(Table, usize)> = [Table::Events, Table::Variables, Table::Animations]
        .into_iter()
        .filter_map(|t| tables::table(behavior, t).ok().map(|a| (t, a.len())))
        .collect();
    if lens.is_empty() {
        return;
    }
    for record in behavior.objects() {
        let Some(type_name) = behavior.registry().name(&record.type_id) else {
            continue;
        };
        for (_, table, path) in TABLE_INDEX_ATTRIBUTES.iter().filter(|(t, _, _)| *t == type_name) {
            let Some(&(_, len)) = lens.iter().find(|(t, _)| t == table) else {
                continue;
            };
            let Ok(path) = FieldPath::parse(path) else {
                continue;
            };
            for index in record.resolve(&path).into_iter().filter_map(Value::as_int) {
                if index >= 0 && index as usize >= len {
                    out.push(Diagnostic::new(
                        Severity::Warning,
                        record.id(),
                        Some(path.clone()),
                        format!("references missing {table:?} entry {index}"),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::{TypeInfo, TypeRegistry};
    use crate::value::Pointer;

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.insert(TypeInfo::new("type1", "int").with_format(8196));
        reg.insert(TypeInfo::new("type2", "hkStringPtr").with_format(3));
        reg.insert(TypeInfo::new("type3", "T*").with_format(6));
        reg.insert(TypeInfo::new("type4", "hkArray").with_format(8).with_subtype("type3"));
        reg.insert(
            TypeInfo::new("type5", ROOT_TYPE)
                .with_format(7)
                .with_field("children", "type4"),
        );
        reg.insert(
            TypeInfo::new("type6", "hkbManualSelectorGenerator")
                .with_format(7)
                .with_field("name", "type2")
                .with_field("generators", "type4"),
        );
        reg
    }

    fn behavior(objects: &[(&str, &str, &str, &str)]) -> Behavior {
        let reg = registry();
        let mut beh = Behavior::new(reg.clone(), Config::default());
        for (id, ty, name, children) in objects {
            let field = if *ty == "type5" { "children" } else { "generators" };
            let mut rec = Record::new(&reg, ty, Vec::<(&str, Value)>::new(), Some(id.to_string())).unwrap();
            if *ty == "type6" {
                rec.set("name", *name).unwrap();
            }
            for child in children.split_whitespace() {
                rec.insert_item(field, None, Pointer::to(child)).unwrap();
            }
            beh.add(rec).unwrap();
        }
        beh
    }

    fn messages(diags: &[Diagnostic], severity: Severity) -> Vec<String> {
        diags
            .iter()
            .filter(|d| d.severity == severity)
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn healthy_behavior_has_no_findings() {
        let beh = behavior(&[
            ("object1", "type5", "", "object2"),
            ("object2", "type6", "A", "object3 object0 object0"),
            ("object3", "type6", "B", ""),
        ]);
        assert!(validate(&beh, None).is_empty());
    }

    #[test]
    fn reports_structural_problems() {
        let beh = behavior(&[
            ("object1", "type5", "", "object2"),
            ("object2", "type6", "A", "object3 object0 object3"),
            ("object3", "type6", "A", "object2 object9"),
            ("object4", "type6", "C", ""),
        ]);
        let diags = validate(&beh, None);
        assert_eq!(
            messages(&diags, Severity::Error),
            vec![
                "object2/generators: pointer array has a null pointer before item 2",
                "object3/generators:1: pointer to non-existing object object9",
            ]
        );
        let warnings = messages(&diags, Severity::Warning);
        assert!(warnings.contains(&"object2: name 'A' is shared by object2, object3".to_string()));
        assert!(warnings.contains(&"object4: object is not reachable from object1".to_string()));
        assert!(warnings.iter().any(|w| w.contains("reference cycle")));
    }

    #[test]
    fn missing_root_is_reported_not_fatal() {
        let beh = behavior(&[("object2", "type6", "A", "")]);
        let diags = validate(&beh, None);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);

        let diags = validate(&beh, Some("object7"));
        assert_eq!(diags[0].severity, Severity::Critical);
    }
}
