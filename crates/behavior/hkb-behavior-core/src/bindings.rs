//! Variable bindings: attributes of an object driven by behavior variables.
//!
//! An object's `variableBindingSet` points at a separate binding set object
//! whose `bindings` array maps member paths to variable indices.

use indexmap::IndexMap;

use crate::behavior::Behavior;
use crate::error::LookupKind;
use crate::ops;
use crate::path::{FieldPath, Segment};
use crate::record::Record;
use crate::undo::UndoManager;
use crate::value::{Pointer, Value};
use crate::{BehaviorError, Result};

pub const BINDING_SET_FIELD: &str = "variableBindingSet";

/// Binding type of variable bindings; other types are not editable.
const BINDING_TYPE_VARIABLE: i64 = 0;

/// The binding set the referenced object points at, if any.
pub fn variable_binding_set<'a>(behavior: &'a Behavior, reference: &str) -> Result<Option<&'a Record>> {
    let record = ops::get_record(behavior, reference)?;
    Ok(record
        .field(BINDING_SET_FIELD)
        .and_then(Value::as_pointer)
        .and_then(|p| p.resolve(behavior)))
}

fn binding_member_path(binding: &Value) -> Option<&str> {
    binding.as_record()?.field("memberPath")?.as_str()
}

/// Bound member paths of an object and the variable index each is bound to.
pub fn bound_attributes(behavior: &Behavior, reference: &str) -> Result<IndexMap<String, i64>> {
    let mut out = IndexMap::new();
    let Some(set) = variable_binding_set(behavior, reference)? else {
        return Ok(out);
    };
    for binding in set.array("bindings")?.iter().filter_map(Value::as_record) {
        let path = binding.field("memberPath").and_then(Value::as_str).unwrap_or_default();
        let index = binding.field("variableIndex").and_then(Value::as_int).unwrap_or(-1);
        let kind = binding
            .field("bindingType")
            .and_then(Value::as_int)
            .unwrap_or(BINDING_TYPE_VARIABLE);
        if kind != BINDING_TYPE_VARIABLE {
            log::warn!(
                target: behavior.log_target(),
                "unknown binding type {kind} ({path}:{index})"
            );
            continue;
        }
        out.insert(path.to_string(), index);
    }
    Ok(out)
}

fn binding_path(index: usize, field: &str) -> FieldPath {
    FieldPath::from_segments(vec![Segment::at("bindings", index), Segment::field(field)])
}

/// Bind `member_path` of the referenced object to a variable. Creates the
/// binding set when the object has none; an existing binding of the same
/// path is updated in place.
pub fn bind_variable(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    reference: &str,
    member_path: &str,
    variable_index: i64,
) -> Result<()> {
    let owner = ops::get_record(behavior, reference)?;
    let owner_id = owner
        .id()
        .map(str::to_string)
        .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, reference))?;
    let existing = variable_binding_set(behavior, &owner_id)?.and_then(|s| s.id().map(str::to_string));
    let set_type = match existing {
        Some(_) => None,
        None => {
            let registry = behavior.registry();
            let pointer_type = registry
                .field_type(&owner.type_id, BINDING_SET_FIELD)
                .ok_or_else(|| BehaviorError::unknown_field(BINDING_SET_FIELD))?;
            let set_type = registry
                .subtype(pointer_type)
                .ok_or_else(|| BehaviorError::lookup(LookupKind::Type, pointer_type))?;
            Some(set_type.to_string())
        }
    };

    ops::atomically(behavior, undo, |behavior, undo| {
        let set_id = match (existing, set_type) {
            (Some(id), _) => id,
            (None, Some(set_type)) => {
                let id = ops::create_typed(behavior, undo, &set_type, None, Vec::<(&str, Value)>::new())?;
                ops::set(behavior, undo, &owner_id, [(BINDING_SET_FIELD, Pointer::to(id.as_str()))])?;
                id
            }
            (None, None) => return Err(BehaviorError::lookup(LookupKind::Object, BINDING_SET_FIELD)),
        };

        let bindings = behavior.require(&set_id)?.array("bindings")?;
        let slot = bindings.iter().position(|b| binding_member_path(b) == Some(member_path));
        match slot {
            Some(index) => {
                ops::set(
                    behavior,
                    undo,
                    &set_id,
                    [(binding_path(index, "variableIndex"), variable_index)],
                )?;
            }
            None => {
                let element_type = bindings.element_type_id.clone();
                let binding = Record::new(
                    behavior.registry(),
                    &element_type,
                    vec![
                        ("memberPath", Value::from(member_path)),
                        ("variableIndex", Value::Int(variable_index)),
                        ("bitIndex", Value::Int(-1)),
                        ("bindingType", Value::Int(BINDING_TYPE_VARIABLE)),
                    ],
                    None,
                )?;
                ops::array_add(behavior, undo, &set_id, "bindings", binding)?;
            }
        }
        Ok(())
    })
}

/// Remove every binding of `member_path` from the referenced object's binding
/// set. Returns how many were removed.
pub fn clear_variable_binding(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    reference: &str,
    member_path: &str,
) -> Result<usize> {
    let Some(set) = variable_binding_set(behavior, reference)? else {
        return Ok(0);
    };
    let set_id = set
        .id()
        .map(str::to_string)
        .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, reference))?;
    let slots: Vec<usize> = set
        .array("bindings")?
        .iter()
        .enumerate()
        .filter(|(_, b)| binding_member_path(b) == Some(member_path))
        .map(|(i, _)| i)
        .collect();

    ops::atomically(behavior, undo, |behavior, undo| {
        for &index in slots.iter().rev() {
            ops::array_pop(behavior, undo, &set_id, "bindings", Some(index))?;
        }
        Ok(slots.len())
    })
}
