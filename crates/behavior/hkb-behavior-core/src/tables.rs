//! Named tables of a behavior graph: events, variables and animations.
//!
//! Names live in the `hkbBehaviorGraphStringData` object; events and
//! variables have parallel info (and bounds) arrays in `hkbBehaviorGraphData`.
//! Objects refer to table entries by index.

use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;
use crate::error::LookupKind;
use crate::ops;
use crate::record::Record;
use crate::undo::UndoManager;
use crate::value::{Array, Pointer, Value};
use crate::{BehaviorError, Result};

pub const STRING_DATA_TYPE: &str = "hkbBehaviorGraphStringData";
pub const GRAPH_DATA_TYPE: &str = "hkbBehaviorGraphData";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Events,
    Variables,
    Animations,
}

impl Table {
    fn names_field(self) -> &'static str {
        match self {
            Table::Events => "eventNames",
            Table::Variables => "variableNames",
            Table::Animations => "animationNames",
        }
    }

    fn lookup_kind(self) -> LookupKind {
        match self {
            Table::Events => LookupKind::Event,
            Table::Variables => LookupKind::Variable,
            Table::Animations => LookupKind::Animation,
        }
    }
}

/// Value type of a behavior variable, as stored in its variable info.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Bool = 0,
    Int8 = 1,
    Int16 = 2,
    #[default]
    Int32 = 3,
    Real = 4,
    Pointer = 5,
    String = 6,
    Vector4 = 7,
    Quaternion = 8,
}

impl VariableType {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => VariableType::Bool,
            1 => VariableType::Int8,
            2 => VariableType::Int16,
            3 => VariableType::Int32,
            4 => VariableType::Real,
            5 => VariableType::Pointer,
            6 => VariableType::String,
            7 => VariableType::Vector4,
            8 => VariableType::Quaternion,
            _ => return None,
        })
    }
}

fn owner<'a>(behavior: &'a Behavior, type_name: &str) -> Result<&'a Record> {
    behavior
        .find_first_by_type_name(type_name)
        .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, type_name))
}

fn owner_id(behavior: &Behavior, type_name: &str) -> Result<String> {
    owner(behavior, type_name)?
        .id()
        .map(str::to_string)
        .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, type_name))
}

/// The names array of `table`.
pub fn table(behavior: &Behavior, table: Table) -> Result<&Array> {
    owner(behavior, STRING_DATA_TYPE)?.array(table.names_field())
}

/// Names of `table`, in index order.
pub fn names(behavior: &Behavior, which: Table) -> Result<Vec<&str>> {
    Ok(table(behavior, which)?
        .iter()
        .map(|v| v.as_str().unwrap_or_default())
        .collect())
}

/// Name at `index`, `None` when out of range.
pub fn name(behavior: &Behavior, which: Table, index: usize) -> Option<&str> {
    table(behavior, which).ok()?.get(index)?.as_str()
}

/// Index of the entry called `name`.
pub fn find(behavior: &Behavior, which: Table, name: &str) -> Result<usize> {
    let entries = names(behavior, which)?;
    let found = match which {
        Table::Animations => entries
            .iter()
            .position(|e| *e == name || animation_short_name(e) == name),
        _ => entries.iter().position(|e| *e == name),
    };
    found.ok_or_else(|| BehaviorError::lookup(which.lookup_kind(), name))
}

pub fn find_event(behavior: &Behavior, name: &str) -> Result<usize> {
    find(behavior, Table::Events, name)
}

pub fn find_variable(behavior: &Behavior, name: &str) -> Result<usize> {
    find(behavior, Table::Variables, name)
}

/// Index of an animation, by its full path or by its file stem (`a000_003000`).
pub fn find_animation(behavior: &Behavior, name: &str) -> Result<usize> {
    find(behavior, Table::Animations, name)
}

/// File stem of an animation path.
pub fn animation_short_name(full: &str) -> &str {
    let file = full.rsplit(['\\', '/']).next().unwrap_or(full);
    file.strip_suffix(".hkx").unwrap_or(file)
}

/// Full animation path for a short name like `a000_003000`. The character id
/// defaults to the prefix of the behavior graph's name (`c0000.hkb` -> `c0000`).
pub fn full_animation_name(behavior: &Behavior, short_name: &str, character: Option<&str>) -> Result<String> {
    let character = match character {
        Some(c) => c.to_string(),
        None => owner(behavior, "hkbBehaviorGraph")?
            .name()
            .and_then(|n| n.split('.').next())
            .unwrap_or_default()
            .to_string(),
    };
    let group = short_name.split('_').next().unwrap_or(short_name);
    Ok(format!(
        "..\\..\\..\\..\\..\\Model\\chr\\{character}\\hkx\\{group}\\{short_name}.hkx"
    ))
}

fn append_info(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    data_id: &str,
    field: &str,
    overrides: Vec<(&str, Value)>,
) -> Result<()> {
    let element_type = behavior.require(data_id)?.array(field)?.element_type_id.clone();
    let info = Record::new(behavior.registry(), &element_type, overrides, None)?;
    ops::array_add(behavior, undo, data_id, field, info)?;
    Ok(())
}

/// Add an event and its (defaulted) event info. Returns the new index.
pub fn create_event(behavior: &mut Behavior, undo: &mut UndoManager, name: &str) -> Result<usize> {
    let strings = owner_id(behavior, STRING_DATA_TYPE)?;
    let data = owner_id(behavior, GRAPH_DATA_TYPE)?;
    ops::atomically(behavior, undo, |behavior, undo| {
        let index = ops::array_add(behavior, undo, &strings, Table::Events.names_field(), name)?;
        append_info(behavior, undo, &data, "eventInfos", Vec::new())?;
        log::debug!(target: behavior.log_target(), "created event {index} '{name}'");
        Ok(index)
    })
}

/// Add a variable with its info and bounds. Returns the new index.
pub fn create_variable(
    behavior: &mut Behavior,
    undo: &mut UndoManager,
    name: &str,
    var_type: VariableType,
    min: i64,
    max: i64,
) -> Result<usize> {
    let strings = owner_id(behavior, STRING_DATA_TYPE)?;
    let data = owner_id(behavior, GRAPH_DATA_TYPE)?;
    ops::atomically(behavior, undo, |behavior, undo| {
        let index = ops::array_add(behavior, undo, &strings, Table::Variables.names_field(), name)?;
        append_info(
            behavior,
            undo,
            &data,
            "variableInfos",
            vec![("type", Value::Int(var_type.code()))],
        )?;
        append_info(
            behavior,
            undo,
            &data,
            "variableBounds",
            vec![("min/value", Value::Int(min)), ("max/value", Value::Int(max))],
        )?;
        log::debug!(target: behavior.log_target(), "created variable {index} '{name}'");
        Ok(index)
    })
}

/// Add an animation name as given (see [`full_animation_name`]). Returns the new index.
pub fn create_animation(behavior: &mut Behavior, undo: &mut UndoManager, name: &str) -> Result<usize> {
    let strings = owner_id(behavior, STRING_DATA_TYPE)?;
    ops::atomically(behavior, undo, |behavior, undo| {
        ops::array_add(behavior, undo, &strings, Table::Animations.names_field(), name)
    })
}

/// One higher than the highest `stateId` among the states of a state machine.
pub fn next_state_id(behavior: &Behavior, state_machine: &str) -> Result<i64> {
    let sm = ops::get_record(behavior, state_machine)?;
    let highest = sm
        .array("states")?
        .iter()
        .filter_map(Value::as_pointer)
        .filter_map(|p: &Pointer| p.resolve(behavior))
        .filter_map(|state| state.field("stateId").and_then(Value::as_int))
        .fold(0, i64::max);
    Ok(highest + 1)
}
