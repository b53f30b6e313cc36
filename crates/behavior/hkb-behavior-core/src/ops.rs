//! Editing surface for hosts and scripts.
//!
//! Every mutating function here takes the behavior and its undo history
//! explicitly, applies the change through the container and records the
//! matching [`Edit`]. Multi-step functions are atomic: when a later step fails
//! the earlier ones are rolled back before the error is returned.
//!
//! Records are referenced by object id or, failing that, by a query string
//! whose first match is used.

use crate::behavior::Behavior;
use crate::error::LookupKind;
use crate::path::{FieldPath, IntoFieldPath};
use crate::record::Record;
use crate::undo::{Edit, UndoManager};
use crate::value::Value;
use crate::{BehaviorError, Result};

// --- Lookup ---

/// First record matching `query`.
pub fn find<'a>(behavior: &'a Behavior, query: &str) -> Result<Option<&'a Record>> {
    Ok(behavior.query(query)?.next())
}

pub fn find_all<'a>(behavior: &'a Behavior, query: &str) -> Result<Vec<&'a Record>> {
    Ok(behavior.query(query)?.collect())
}

/// Record named by an object id, or else the first match of `reference` as a query.
pub fn get_record<'a>(behavior: &'a Behavior, reference: &str) -> Result<&'a Record> {
    if let Some(record) = behavior.get(reference) {
        return Ok(record);
    }
    find(behavior, reference)?.ok_or_else(|| BehaviorError::lookup(LookupKind::Object, reference))
}

fn resolve_id(behavior: &Behavior, reference: &str) -> Result<String> {
    let record = get_record(behavior, reference)?;
    record
        .id()
        .map(str::to_string)
        .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, reference))
}

/// Value at `path` of the referenced record.
pub fn get(behavior: &Behavior, reference: &str, path: impl IntoFieldPath) -> Result<Value> {
    get_record(behavior, reference)?.get(path).cloned()
}

// --- Transactions ---

/// Run `f` as one undo frame. If it fails, whatever it recorded is reverted
/// and never reaches the history, however short the history is. Inside an
/// already open transaction `f` simply joins it and cleaning up is left to
/// whoever opened it.
pub fn atomically<T>(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    f: impl FnOnce(&mut Behavior, &mut UndoManager) -> Result<T>,
) -> Result<T> {
    if undo.in_transaction() {
        return f(behavior, undo);
    }
    undo.begin();
    match f(behavior, undo) {
        Ok(value) => {
            undo.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = undo.abort(behavior) {
                log::warn!(target: behavior.log_target(), "failed edit left partly applied: {abort_err}");
            }
            Err(err)
        }
    }
}

// --- Objects ---

fn add_recorded(behavior: &mut Behavior, undo: &mut UndoManager, record: Record) -> Result<String> {
    let id = behavior.add(record)?;
    let position = behavior.position(&id).unwrap_or_default();
    let snapshot = behavior.require(&id)?.clone();
    undo.record(Edit::CreateObject {
        id: id.clone(),
        snapshot,
        position,
    });
    Ok(id)
}

/// Create an object of the type named `type_name` and add it to the behavior.
/// `object_id: None` allocates a fresh id. Returns the object's id rather
/// than the record, which would keep `behavior` borrowed; pass the id to
/// [`get_record`] to read it back.
pub fn create<I, P, V>(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    type_name: &str,
    object_id: Option<&str>,
    fields: I,
) -> Result<String>
where
    I: IntoIterator<Item = (P, V)>,
    P: IntoFieldPath,
    V: Into<Value>,
{
    let type_id = behavior
        .registry()
        .find_first_type_by_name(type_name)
        .ok_or_else(|| BehaviorError::lookup(LookupKind::Type, type_name))?
        .to_string();
    create_typed(behavior, undo, &type_id, object_id, fields)
}

pub(crate) fn create_typed<I, P, V>(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    type_id: &str,
    object_id: Option<&str>,
    fields: I,
) -> Result<String>
where
    I: IntoIterator<Item = (P, V)>,
    P: IntoFieldPath,
    V: Into<Value>,
{
    let id = match object_id {
        Some(id) => id.to_string(),
        None => behavior.new_id()?,
    };
    let record = Record::new(behavior.registry(), type_id, fields, Some(id))?;
    add_recorded(behavior, undo, record)
}

/// Record of the type named `type_name` that is not added to the behavior,
/// e.g. for storing in an array of records.
pub fn new_detached_record<I, P, V>(behavior: &Behavior, type_name: &str, fields: I) -> Result<Record>
where
    I: IntoIterator<Item = (P, V)>,
    P: IntoFieldPath,
    V: Into<Value>,
{
    let registry = behavior.registry();
    let type_id = registry
        .find_first_type_by_name(type_name)
        .ok_or_else(|| BehaviorError::lookup(LookupKind::Type, type_name))?;
    Record::new(registry, type_id, fields, None)
}

/// Add a copy of the referenced object under `object_id` (fresh when `None`),
/// with `overrides` applied. Returns the copy's id.
pub fn copy<I, P, V>(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    source: &str,
    object_id: Option<&str>,
    overrides: I,
) -> Result<String>
where
    I: IntoIterator<Item = (P, V)>,
    P: IntoFieldPath,
    V: Into<Value>,
{
    let mut record = get_record(behavior, source)?.clone();
    for (path, value) in overrides {
        record.set(path, value)?;
    }
    record.object_id = Some(match object_id {
        Some(id) => id.to_string(),
        None => behavior.new_id()?,
    });
    add_recorded(behavior, undo, record)
}

/// Remove the referenced object. Pointers to it are left as they are.
/// Returns the removed record.
pub fn delete(behavior: &mut Behavior, undo: &mut UndoManager, reference: &str) -> Result<Record> {
    let id = resolve_id(behavior, reference)?;
    let (position, record) = behavior.remove(&id)?;
    undo.record(Edit::DeleteObject {
        id,
        snapshot: record.clone(),
        position,
    });
    Ok(record)
}

// --- Values ---

/// Set one or more fields of the referenced object as one undo frame.
pub fn set<I, P, V>(behavior: &mut Behavior, undo: &mut UndoManager, reference: &str, assignments: I) -> Result<()>
where
    I: IntoIterator<Item = (P, V)>,
    P: IntoFieldPath,
    V: Into<Value>,
{
    let id = resolve_id(behavior, reference)?;
    atomically(behavior, undo, |behavior, undo| {
        for (path, value) in assignments {
            let path = path.into_field_path()?;
            set_one(behavior, undo, &id, &path, value.into())?;
        }
        Ok(())
    })
}

fn set_one(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    id: &str,
    path: &FieldPath,
    value: Value,
) -> Result<()> {
    let old = behavior.set_value(id, path, value)?;
    let new = behavior.require(id)?.get(path)?.clone();
    if old != new {
        undo.record(Edit::UpdateValue {
            object_id: id.to_string(),
            path: path.clone(),
            old,
            new,
        });
    }
    Ok(())
}

/// Append `item` to the array at `path`. Returns the item's index.
pub fn array_add(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    reference: &str,
    path: impl IntoFieldPath,
    item: impl Into<Value>,
) -> Result<usize> {
    let id = resolve_id(behavior, reference)?;
    let path = path.into_field_path()?;
    let index = behavior.insert_array_item(&id, &path, None, item)?;
    let stored = behavior
        .require(&id)?
        .array(&path)?
        .get(index)
        .cloned()
        .ok_or_else(|| BehaviorError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len: index,
        })?;
    undo.record(Edit::UpdateArrayItem {
        object_id: id,
        path,
        index,
        old: None,
        new: Some(stored),
    });
    Ok(index)
}

/// Remove the item at `index` (the last one when `None`) from the array at
/// `path` and return it.
pub fn array_pop(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    reference: &str,
    path: impl IntoFieldPath,
    index: Option<usize>,
) -> Result<Value> {
    let id = resolve_id(behavior, reference)?;
    let path = path.into_field_path()?;
    let (index, old) = behavior.remove_array_item(&id, &path, index)?;
    undo.record(Edit::UpdateArrayItem {
        object_id: id,
        path,
        index,
        old: Some(old.clone()),
        new: None,
    });
    Ok(old)
}
