//! Undo/redo history.
//!
//! The history is a session object owned by whoever owns the behavior; every
//! mutating collaborator call takes it explicitly and records the edits it
//! made. Edits recorded while a transaction is open are grouped into one
//! frame, so a single `undo` reverts them all.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;
use crate::config::Config;
use crate::path::{FieldPath, Index, Segment};
use crate::record::Record;
use crate::value::Value;
use crate::{BehaviorError, Result};

/// One invertible change to a behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Edit {
    /// An object was added. The snapshot is its state right after creation.
    CreateObject {
        id: String,
        snapshot: Record,
        position: usize,
    },
    DeleteObject {
        id: String,
        snapshot: Record,
        position: usize,
    },
    UpdateValue {
        object_id: String,
        path: FieldPath,
        old: Value,
        new: Value,
    },
    /// `old: None` is an insertion, `new: None` a removal.
    UpdateArrayItem {
        object_id: String,
        path: FieldPath,
        index: usize,
        old: Option<Value>,
        new: Option<Value>,
    },
}

fn item_path(path: &FieldPath, index: usize) -> Result<FieldPath> {
    let (parent, last) = path.split_last().ok_or_else(|| BehaviorError::InvalidPath {
        path: String::new(),
        reason: "empty path".to_string(),
    })?;
    Ok(parent.join(Segment {
        field: last.field.clone(),
        index: Some(Index::At(index)),
    }))
}

impl Edit {
    /// Apply the change (again).
    pub fn apply(&self, behavior: &mut Behavior) -> Result<()> {
        match self {
            Edit::CreateObject {
                snapshot, position, ..
            } => behavior.insert_at(snapshot.clone(), Some(*position)).map(drop),
            Edit::DeleteObject { id, .. } => behavior.remove(id).map(drop),
            Edit::UpdateValue {
                object_id, path, new, ..
            } => behavior.set_value(object_id, path, new.clone()).map(drop),
            Edit::UpdateArrayItem {
                object_id,
                path,
                index,
                old,
                new,
            } => array_change(behavior, object_id, path, *index, old.as_ref(), new.as_ref()),
        }
    }

    /// Undo the change.
    pub fn revert(&self, behavior: &mut Behavior) -> Result<()> {
        match self {
            Edit::CreateObject { id, .. } => behavior.remove(id).map(drop),
            Edit::DeleteObject {
                snapshot, position, ..
            } => behavior.insert_at(snapshot.clone(), Some(*position)).map(drop),
            Edit::UpdateValue {
                object_id, path, old, ..
            } => behavior.set_value(object_id, path, old.clone()).map(drop),
            Edit::UpdateArrayItem {
                object_id,
                path,
                index,
                old,
                new,
            } => array_change(behavior, object_id, path, *index, new.as_ref(), old.as_ref()),
        }
    }
}

/// Turn array item `from` into `to` at `index`.
fn array_change(
    behavior: &mut Behavior,
    object_id: &str,
    path: &FieldPath,
    index: usize,
    from: Option<&Value>,
    to: Option<&Value>,
) -> Result<()> {
    match (from, to) {
        (None, Some(value)) => behavior
            .insert_array_item(object_id, path, Some(index), value.clone())
            .map(drop),
        (Some(_), None) => behavior
            .remove_array_item(object_id, path, Some(index))
            .map(drop),
        (Some(_), Some(value)) => behavior
            .set_value(object_id, &item_path(path, index)?, value.clone())
            .map(drop),
        (None, None) => Ok(()),
    }
}

#[derive(Debug, Clone)]
struct Frame {
    serial: u64,
    edits: Vec<Edit>,
}

/// Opaque marker for the top of the undo stack, see [`UndoManager::top`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(Option<u64>);

#[derive(Debug)]
pub struct UndoManager {
    undo: VecDeque<Frame>,
    redo: Vec<Frame>,
    max_depth: usize,
    pending: Vec<Edit>,
    /// Number of open transaction scopes.
    depth: usize,
    next_serial: u64,
}

impl Default for UndoManager {
    fn default() -> Self {
        UndoManager::new(Config::default().undo_depth)
    }
}

impl UndoManager {
    pub fn new(max_depth: usize) -> Self {
        UndoManager {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_depth,
            pending: Vec::new(),
            depth: 0,
            next_serial: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        UndoManager::new(config.undo_depth)
    }

    /// Record an edit. Outside a transaction it becomes its own frame.
    pub fn record(&mut self, edit: Edit) {
        self.pending.push(edit);
        if self.depth == 0 {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let edits = std::mem::take(&mut self.pending);
        let serial = self.next_serial;
        self.next_serial += 1;
        self.redo.clear();
        self.undo.push_back(Frame { serial, edits });
        while self.undo.len() > self.max_depth {
            self.undo.pop_front();
        }
    }

    /// Open a transaction that closes when the guard is dropped. Nested scopes
    /// join the outermost one.
    pub fn combine(&mut self) -> Transaction<'_> {
        self.begin();
        Transaction { manager: self }
    }

    /// Open a transaction without a guard. Every `begin` needs a matching [`UndoManager::commit`].
    pub fn begin(&mut self) {
        self.depth += 1;
    }

    /// Close the innermost open transaction. Closing the outermost one pushes
    /// everything recorded since it opened as one frame.
    pub fn commit(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(BehaviorError::Undo("no open transaction".to_string()));
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.flush();
        }
        Ok(())
    }

    /// Close the outermost open transaction by reverting everything recorded
    /// since it opened. Nothing is pushed and the redo tail is kept.
    pub fn abort(&mut self, behavior: &mut Behavior) -> Result<()> {
        if self.depth != 1 {
            return Err(BehaviorError::Undo(
                "abort needs exactly one open transaction".to_string(),
            ));
        }
        self.depth = 0;
        let edits = std::mem::take(&mut self.pending);
        log::debug!(
            target: behavior.log_target(),
            "abort: reverting {} edit(s)",
            edits.len()
        );
        let mut first_err = None;
        for edit in edits.iter().rev() {
            if let Err(err) = edit.revert(behavior) {
                log::warn!(target: behavior.log_target(), "abort: could not revert edit: {err}");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(BehaviorError::Undo(format!("abort failed: {err}"))),
            None => Ok(()),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Marker for the current top frame. Comparing markers taken before and
    /// after an operation tells whether it pushed anything.
    pub fn top(&self) -> Marker {
        Marker(self.undo.back().map(|f| f.serial))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of frames that can be undone.
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.pending.clear();
    }

    fn ensure_closed(&self) -> Result<()> {
        if self.depth > 0 {
            return Err(BehaviorError::Undo(
                "cannot undo or redo while a transaction is open".to_string(),
            ));
        }
        Ok(())
    }

    /// Revert the most recent frame. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, behavior: &mut Behavior) -> Result<bool> {
        self.ensure_closed()?;
        let Some(frame) = self.undo.pop_back() else {
            return Ok(false);
        };
        log::debug!(
            target: behavior.log_target(),
            "undo: reverting {} edit(s)",
            frame.edits.len()
        );
        for (done, edit) in frame.edits.iter().rev().enumerate() {
            if let Err(err) = edit.revert(behavior) {
                // Put the frame back as it was before failing.
                for edit in frame.edits.iter().rev().take(done).rev() {
                    if let Err(restore_err) = edit.apply(behavior) {
                        log::warn!(
                            target: behavior.log_target(),
                            "undo: could not restore edit after failure: {restore_err}"
                        );
                    }
                }
                self.undo.push_back(frame);
                return Err(BehaviorError::Undo(format!("undo failed: {err}")));
            }
        }
        self.redo.push(frame);
        Ok(true)
    }

    /// Re-apply the most recently undone frame. `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, behavior: &mut Behavior) -> Result<bool> {
        self.ensure_closed()?;
        let Some(frame) = self.redo.pop() else {
            return Ok(false);
        };
        log::debug!(
            target: behavior.log_target(),
            "redo: applying {} edit(s)",
            frame.edits.len()
        );
        for (done, edit) in frame.edits.iter().enumerate() {
            if let Err(err) = edit.apply(behavior) {
                for edit in frame.edits[..done].iter().rev() {
                    if let Err(restore_err) = edit.revert(behavior) {
                        log::warn!(
                            target: behavior.log_target(),
                            "redo: could not restore edit after failure: {restore_err}"
                        );
                    }
                }
                self.redo.push(frame);
                return Err(BehaviorError::Undo(format!("redo failed: {err}")));
            }
        }
        self.undo.push_back(frame);
        Ok(true)
    }

    /// Undo every frame pushed since `marker` was taken and forget them, so
    /// they cannot be redone. Used to discard the partial edits of a failed
    /// multi-step operation.
    pub fn rollback(&mut self, behavior: &mut Behavior, marker: Marker) -> Result<()> {
        self.ensure_closed()?;
        let known = self.undo.iter().any(|f| Some(f.serial) == marker.0);
        if marker.0.is_some() && !known {
            return Err(BehaviorError::Undo(
                "rollback marker is no longer in the history".to_string(),
            ));
        }
        while self.top() != marker {
            if !self.undo(behavior)? {
                break;
            }
            self.redo.pop();
        }
        Ok(())
    }
}

/// Open transaction scope. Dereferences to the manager so calls can record into it.
#[derive(Debug)]
pub struct Transaction<'m> {
    manager: &'m mut UndoManager,
}

impl Deref for Transaction<'_> {
    type Target = UndoManager;
    fn deref(&self) -> &UndoManager {
        self.manager
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut UndoManager {
        self.manager
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let _ = self.manager.commit();
    }
}
