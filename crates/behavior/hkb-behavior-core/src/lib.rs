//! hkb-behavior-core
//!
//! Schema-aware, queryable and undoable in-memory model of Havok behavior
//! tagfiles. A [`Behavior`] owns every object of a loaded document, indexed by
//! id, type and name. Objects are [`Record`]s of typed [`Value`]s whose layout
//! comes from the document's [`TypeRegistry`]. Pointers between objects are
//! weak ids that the [`graph`] module turns into a reference graph on demand.
//!
//! Mutations are recorded in an explicit [`UndoManager`] by the functions of
//! [`ops`], [`tables`] and [`bindings`]; [`validate`] reports on the health of
//! a behavior without changing it.

pub mod behavior;
pub mod bindings;
pub mod coercion;
pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod ops;
pub mod path;
pub mod query;
pub mod record;
pub mod registry;
pub mod tables;
pub mod undo;
pub mod validate;
pub mod value;
pub mod xml;

// Re-exports for hosts and scripts
pub use behavior::Behavior;
pub use config::Config;
pub use error::{BehaviorError, LookupKind, QueryParseError, Result};
pub use graph::{DanglingRef, ReferenceGraph};
pub use path::{FieldPath, Index, IntoFieldPath, Segment};
pub use query::{Condition, Pattern, Query};
pub use record::Record;
pub use registry::{TypeField, TypeId, TypeInfo, TypeRegistry};
pub use tables::{Table, VariableType};
pub use undo::{Edit, Marker, Transaction, UndoManager};
pub use validate::{validate, Diagnostic, Severity};
pub use value::{Array, Pointer, Real, Value, ValueKind, NULL_POINTER_ID};
