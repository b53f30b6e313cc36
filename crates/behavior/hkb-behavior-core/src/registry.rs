//! Type registry built from the `<type>` declarations of a tagfile.
//!
//! Every field of every record is typed by a `typeid`. The registry resolves
//! those ids to names, value kinds (through the `format` bit field) and the
//! full, inherited field list of record types. It is built once when a
//! document is loaded and never mutated afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::ValueKind;
use crate::xml::Element;
use crate::Result;

pub type TypeId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeField {
    pub name: String,
    pub type_id: TypeId,
}

/// One `<type>` declaration. Only the declared (not inherited) fields are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: String,
    pub parent: Option<TypeId>,
    /// Element type of arrays, target type of pointers.
    pub subtype: Option<TypeId>,
    pub format: Option<u32>,
    pub fields: Vec<TypeField>,
}

impl TypeInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        TypeInfo {
            id: id.into(),
            name: name.into(),
            parent: None,
            subtype: None,
            format: None,
            fields: Vec::new(),
        }
    }

    pub fn with_format(mut self, format: u32) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, type_id: impl Into<String>) -> Self {
        self.fields.push(TypeField {
            name: name.into(),
            type_id: type_id.into(),
        });
        self
    }

    fn from_element(el: &Element) -> Result<Self> {
        let id = el.require_attr("id")?.to_string();
        let name = el
            .child("name")
            .and_then(|n| n.attr("value"))
            .unwrap_or_default()
            .to_string();
        let parent = el.child("parent").and_then(|p| p.attr("id")).map(str::to_string);
        let subtype = el.child("subtype").and_then(|s| s.attr("id")).map(str::to_string);
        let format = match el.child("format").and_then(|f| f.attr("value")) {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                crate::BehaviorError::Xml(format!("type {id}: bad format '{raw}': {e}"))
            })?),
            None => None,
        };
        let mut fields = Vec::new();
        if let Some(list) = el.child("fields") {
            for f in list.children_named("field") {
                fields.push(TypeField {
                    name: f.require_attr("name")?.to_string(),
                    type_id: f.require_attr("typeid")?.to_string(),
                });
            }
        }
        Ok(TypeInfo {
            id,
            name,
            parent,
            subtype,
            format,
            fields,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<TypeId, TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from `<type>` elements.
    pub fn from_elements<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Result<Self> {
        let mut registry = TypeRegistry::new();
        for el in elements {
            registry.insert(TypeInfo::from_element(el)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, info: TypeInfo) {
        self.types.insert(info.id.clone(), info);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    pub fn get(&self, type_id: &str) -> Option<&TypeInfo> {
        self.types.get(type_id)
    }

    pub fn name(&self, type_id: &str) -> Option<&str> {
        self.get(type_id).map(|t| t.name.as_str())
    }

    pub fn parent(&self, type_id: &str) -> Option<&str> {
        self.get(type_id).and_then(|t| t.parent.as_deref())
    }

    pub fn subtype(&self, type_id: &str) -> Option<&str> {
        self.get(type_id).and_then(|t| t.subtype.as_deref())
    }

    /// The type itself followed by its ancestors. Stops on unknown ids and
    /// on malformed (cyclic) parent chains.
    fn lineage<'a>(&'a self, type_id: &str) -> impl Iterator<Item = &'a TypeInfo> + 'a {
        let limit = self.types.len();
        let mut next = self.get(type_id);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.as_deref().and_then(|p| self.get(p));
            Some(current)
        })
        .take(limit)
    }

    /// Format value, inherited from the closest ancestor declaring one.
    pub fn format(&self, type_id: &str) -> Option<u32> {
        self.lineage(type_id).find_map(|t| t.format)
    }

    pub fn kind(&self, type_id: &str) -> Option<ValueKind> {
        self.format(type_id).and_then(ValueKind::from_format)
    }

    /// First type declared with the given name. A miss is normal for assets
    /// that do not use a type; callers decide on a fallback.
    pub fn find_first_type_by_name(&self, name: &str) -> Option<&str> {
        self.types
            .values()
            .find(|t| t.name == name)
            .map(|t| t.id.as_str())
    }

    /// True when `type_id` is `ancestor` or derives from it.
    pub fn is_derived(&self, type_id: &str, ancestor: &str) -> bool {
        self.lineage(type_id).any(|t| t.id == ancestor)
    }

    /// Every registered type that is `type_id` or derives from it, in declaration order.
    pub fn compatible_types(&self, type_id: &str) -> Vec<&str> {
        self.types
            .keys()
            .filter(|id| self.is_derived(id, type_id))
            .map(|id| id.as_str())
            .collect()
    }

    /// Full field list of a record type, base type fields first.
    pub fn fields(&self, type_id: &str) -> Vec<&TypeField> {
        let chain: Vec<&TypeInfo> = self.lineage(type_id).collect();
        chain
            .iter()
            .rev()
            .flat_map(|t| t.fields.iter())
            .collect()
    }

    pub fn field_type(&self, type_id: &str, field: &str) -> Option<&str> {
        self.lineage(type_id)
            .flat_map(|t| t.fields.iter())
            .find(|f| f.name == field)
            .map(|f| f.type_id.as_str())
    }
}
