//! Records: typed field maps, either top-level objects or nested values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::coercion::{coerce_item, coerce_like};
use crate::error::LookupKind;
use crate::path::{FieldPath, Index, IntoFieldPath, Segment};
use crate::registry::{TypeId, TypeRegistry};
use crate::value::{Array, Pointer, Real, Value, ValueKind};
use crate::xml::Element;
use crate::{BehaviorError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Set for top-level objects, `None` for nested records.
    pub object_id: Option<String>,
    pub type_id: TypeId,
    fields: IndexMap<String, Value>,
}

/// Schema default for a value of the given type.
pub fn default_value(registry: &TypeRegistry, type_id: &str) -> Result<Value> {
    let miss = |id: &str| BehaviorError::lookup(LookupKind::Type, id);
    let kind = registry.kind(type_id).ok_or_else(|| miss(type_id))?;
    match kind {
        ValueKind::Array => {
            let element_type = registry.subtype(type_id).ok_or_else(|| miss(type_id))?;
            let element_kind = registry.kind(element_type).ok_or_else(|| miss(element_type))?;
            Ok(Value::Array(Array::new(element_type, element_kind)))
        }
        ValueKind::Record => Ok(Value::Record(Record::defaulted(registry, type_id)?)),
        scalar => Value::default_for(scalar).ok_or_else(|| miss(type_id)),
    }
}

impl Record {
    /// Record with every schema field set to its default.
    fn defaulted(registry: &TypeRegistry, type_id: &str) -> Result<Record> {
        if registry.get(type_id).is_none() {
            return Err(BehaviorError::lookup(LookupKind::Type, type_id));
        }
        let mut fields = IndexMap::new();
        for field in registry.fields(type_id) {
            fields.insert(field.name.clone(), default_value(registry, &field.type_id)?);
        }
        Ok(Record {
            object_id: None,
            type_id: type_id.to_string(),
            fields,
        })
    }

    /// Create a record of `type_id` with defaulted fields, then apply `overrides`.
    /// Overrides may use nested paths; unknown fields fail the whole construction.
    pub fn new<I, P, V>(
        registry: &TypeRegistry,
        type_id: &str,
        overrides: I,
        object_id: Option<String>,
    ) -> Result<Record>
    where
        I: IntoIterator<Item = (P, V)>,
        P: IntoFieldPath,
        V: Into<Value>,
    {
        let mut record = Record::defaulted(registry, type_id)?;
        record.object_id = object_id;
        for (path, value) in overrides {
            record.set(path, value)?;
        }
        Ok(record)
    }

    /// Assemble a record from already-typed fields, in the given order.
    pub fn from_fields(
        type_id: impl Into<String>,
        fields: impl IntoIterator<Item = (String, Value)>,
    ) -> Record {
        Record {
            object_id: None,
            type_id: type_id.into(),
            fields: fields.into_iter().collect(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Value of the `name` field, if the record has a string one.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Value at a concrete path. Wildcards are rejected; use [`Record::resolve`].
    pub fn get(&self, path: impl IntoFieldPath) -> Result<&Value> {
        let path = path.into_field_path()?;
        let full = path.to_string();
        let mut record = self;
        let segments = path.segments();
        for (i, seg) in segments.iter().enumerate() {
            let value = record.step(seg, &full)?;
            if i + 1 == segments.len() {
                return Ok(value);
            }
            record = descend(value, &full)?;
        }
        Err(empty_path())
    }

    pub fn get_mut(&mut self, path: impl IntoFieldPath) -> Result<&mut Value> {
        let path = path.into_field_path()?;
        let full = path.to_string();
        let (last, parents) = path.segments().split_last().ok_or_else(empty_path)?;
        let mut record = self;
        for seg in parents {
            let value = record.step_mut(seg, &full)?;
            record = match value {
                Value::Record(r) => r,
                _ => return Err(not_a_record(&full)),
            };
        }
        record.step_mut(last, &full)
    }

    /// Replace the value at `path`, coercing it to the field's kind first.
    /// Returns the previous value. On error the record is unchanged, and a
    /// value equal to the current one leaves it untouched, loaded real text included.
    pub fn set(&mut self, path: impl IntoFieldPath, value: impl Into<Value>) -> Result<Value> {
        let path = path.into_field_path()?;
        let full = path.to_string();
        let slot = self.get_mut(&path)?;
        let value = coerce_like(slot, value.into(), &full)?;
        if *slot == value {
            return Ok(slot.clone());
        }
        Ok(std::mem::replace(slot, value))
    }

    /// Array at `path`.
    pub fn array(&self, path: impl IntoFieldPath) -> Result<&Array> {
        let path = path.into_field_path()?;
        match self.get(&path)? {
            Value::Array(a) => Ok(a),
            other => Err(BehaviorError::TypeMismatch {
                path: path.to_string(),
                expected: ValueKind::Array,
                found: format!("{:?}", other.kind()).to_lowercase(),
            }),
        }
    }

    fn array_mut(&mut self, path: &FieldPath) -> Result<&mut Array> {
        let full = path.to_string();
        match self.get_mut(path)? {
            Value::Array(a) => Ok(a),
            other => Err(BehaviorError::TypeMismatch {
                path: full,
                expected: ValueKind::Array,
                found: format!("{:?}", other.kind()).to_lowercase(),
            }),
        }
    }

    /// Insert into the array at `path`; `None` appends. Returns the index used.
    pub fn insert_item(
        &mut self,
        path: impl IntoFieldPath,
        index: Option<usize>,
        value: impl Into<Value>,
    ) -> Result<usize> {
        let path = path.into_field_path()?;
        let full = path.to_string();
        let array = self.array_mut(&path)?;
        let index = index.unwrap_or(array.items.len());
        if index > array.items.len() {
            return Err(BehaviorError::IndexOutOfRange {
                path: full,
                index,
                len: array.items.len(),
            });
        }
        let value = coerce_item(array, value.into(), &full)?;
        array.items.insert(index, value);
        Ok(index)
    }

    /// Remove from the array at `path`; `None` pops the last item.
    pub fn remove_item(&mut self, path: impl IntoFieldPath, index: Option<usize>) -> Result<(usize, Value)> {
        let path = path.into_field_path()?;
        let full = path.to_string();
        let array = self.array_mut(&path)?;
        let len = array.items.len();
        let index = match index {
            Some(i) => i,
            None => len.checked_sub(1).ok_or(BehaviorError::IndexOutOfRange {
                path: full.clone(),
                index: 0,
                len,
            })?,
        };
        if index >= len {
            return Err(BehaviorError::IndexOutOfRange {
                path: full,
                index,
                len,
            });
        }
        Ok((index, array.items.remove(index)))
    }

    /// Every value a (possibly wildcard) path addresses inside this record.
    /// Pointers are not followed. Missing fields and indices yield nothing.
    pub fn resolve(&self, path: &FieldPath) -> Vec<&Value> {
        let mut out = Vec::new();
        resolve_into(self, path.segments(), &mut out);
        out
    }

    /// Visit every scalar and pointer leaf with its concrete path.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&FieldPath, &'a Value)) {
        walk_record(self, &FieldPath::default(), visit);
    }

    /// Every set or unset pointer in the record, with its concrete path.
    pub fn pointers(&self) -> Vec<(FieldPath, &Pointer)> {
        let mut out = Vec::new();
        self.walk(&mut |path, value| {
            if let Value::Pointer(p) = value {
                out.push((path.clone(), p));
            }
        });
        out
    }

    /// Text of all leaves, space separated, in field order.
    pub fn text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        self.walk(&mut |_, value| parts.push(value.text().into_owned()));
        parts.join(" ")
    }

    fn step(&self, seg: &Segment, full: &str) -> Result<&Value> {
        let value = self
            .fields
            .get(&seg.field)
            .ok_or_else(|| BehaviorError::unknown_field(full))?;
        match seg.index {
            None => Ok(value),
            Some(Index::At(i)) => {
                let array = as_array(value, full)?;
                array.items.get(i).ok_or(BehaviorError::IndexOutOfRange {
                    path: full.to_string(),
                    index: i,
                    len: array.items.len(),
                })
            }
            Some(Index::Any) => Err(wildcard_not_allowed(full)),
        }
    }

    fn step_mut(&mut self, seg: &Segment, full: &str) -> Result<&mut Value> {
        let value = self
            .fields
            .get_mut(&seg.field)
            .ok_or_else(|| BehaviorError::unknown_field(full))?;
        match seg.index {
            None => Ok(value),
            Some(Index::At(i)) => match value {
                Value::Array(array) => {
                    let len = array.items.len();
                    array.items.get_mut(i).ok_or(BehaviorError::IndexOutOfRange {
                        path: full.to_string(),
                        index: i,
                        len,
                    })
                }
                _ => Err(not_an_array(full)),
            },
            Some(Index::Any) => Err(wildcard_not_allowed(full)),
        }
    }

    // --- Backing document ---

    /// Read a `<record>` element. `type_id` types the record; field types come
    /// from the registry, value kinds from the element tags.
    pub(crate) fn from_element(el: &Element, type_id: &str, registry: &TypeRegistry) -> Result<Record> {
        if el.name != "record" {
            return Err(BehaviorError::Xml(format!("expected <record>, found <{}>", el.name)));
        }
        let mut fields = IndexMap::with_capacity(el.children.len());
        for field in &el.children {
            if field.name != "field" {
                return Err(BehaviorError::Xml(format!(
                    "unexpected <{}> in record of type {type_id}",
                    field.name
                )));
            }
            let name = field.require_attr("name")?;
            let value_el = match field.children.as_slice() {
                [single] => single,
                _ => {
                    return Err(BehaviorError::Xml(format!(
                        "field '{name}' must hold exactly one value"
                    )))
                }
            };
            let field_type = registry.field_type(type_id, name);
            fields.insert(name.to_string(), value_from_element(value_el, field_type, registry)?);
        }
        Ok(Record {
            object_id: None,
            type_id: type_id.to_string(),
            fields,
        })
    }

    pub(crate) fn to_element(&self, decimal_comma: bool) -> Element {
        let mut el = Element::new("record");
        for (name, value) in &self.fields {
            el.children.push(
                Element::new("field")
                    .with_attr("name", name.as_str())
                    .with_child(value_to_element(value, decimal_comma)),
            );
        }
        el
    }
}

fn empty_path() -> BehaviorError {
    BehaviorError::InvalidPath {
        path: String::new(),
        reason: "empty path".to_string(),
    }
}

fn wildcard_not_allowed(full: &str) -> BehaviorError {
    BehaviorError::InvalidPath {
        path: full.to_string(),
        reason: "wildcard index needs a resolving lookup".to_string(),
    }
}

fn not_a_record(full: &str) -> BehaviorError {
    BehaviorError::InvalidPath {
        path: full.to_string(),
        reason: "intermediate segment is not a nested record".to_string(),
    }
}

fn not_an_array(full: &str) -> BehaviorError {
    BehaviorError::InvalidPath {
        path: full.to_string(),
        reason: "indexed segment is not an array".to_string(),
    }
}

fn as_array<'a>(value: &'a Value, full: &str) -> Result<&'a Array> {
    value.as_array().ok_or_else(|| not_an_array(full))
}

fn descend<'a>(value: &'a Value, full: &str) -> Result<&'a Record> {
    value.as_record().ok_or_else(|| not_a_record(full))
}

fn resolve_into<'a>(record: &'a Record, segments: &[Segment], out: &mut Vec<&'a Value>) {
    let Some((seg, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = record.fields.get(&seg.field) else {
        return;
    };
    let selected: Vec<&Value> = match (seg.index, value) {
        (None, v) => vec![v],
        (Some(Index::At(i)), Value::Array(a)) => a.items.get(i).into_iter().collect(),
        (Some(Index::Any), Value::Array(a)) => a.items.iter().collect(),
        _ => Vec::new(),
    };
    for v in selected {
        if rest.is_empty() {
            out.push(v);
        } else if let Value::Record(nested) = v {
            resolve_into(nested, rest, out);
        }
    }
}

fn walk_record<'a>(record: &'a Record, prefix: &FieldPath, visit: &mut dyn FnMut(&FieldPath, &'a Value)) {
    for (name, value) in &record.fields {
        walk_value(value, prefix, name, None, visit);
    }
}

fn walk_value<'a>(
    value: &'a Value,
    prefix: &FieldPath,
    name: &str,
    index: Option<usize>,
    visit: &mut dyn FnMut(&FieldPath, &'a Value),
) {
    let here = prefix.join(Segment {
        field: name.to_string(),
        index: index.map(Index::At),
    });
    match value {
        Value::Array(array) => {
            for (i, item) in array.items.iter().enumerate() {
                walk_value(item, prefix, name, Some(i), visit);
            }
        }
        Value::Record(nested) => walk_record(nested, &here, visit),
        leaf => visit(&here, leaf),
    }
}

fn value_from_element(el: &Element, type_id: Option<&str>, registry: &TypeRegistry) -> Result<Value> {
    let bad = |what: &str, raw: &str| BehaviorError::Xml(format!("<{}> has invalid {what} '{raw}'", el.name));
    match el.name.as_str() {
        "string" => Ok(Value::String(el.require_attr("value")?.to_string())),
        "integer" => {
            let raw = el.require_attr("value")?;
            raw.trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| bad("integer", raw))
        }
        "real" => {
            let dec = el.require_attr("dec")?;
            Real::from_encoded(dec, el.attr("hex"))
                .map(Value::Float)
                .ok_or_else(|| bad("decimal", dec))
        }
        "bool" => {
            let raw = el.require_attr("value")?;
            match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(bad("bool", raw)),
            }
        }
        "pointer" => Ok(Value::Pointer(Pointer::to(el.require_attr("id")?))),
        "array" => {
            let element_type = el.require_attr("elementtypeid")?;
            let element_kind = registry
                .kind(element_type)
                .or_else(|| el.children.first().and_then(|c| ValueKind::from_tag(&c.name)))
                .ok_or_else(|| BehaviorError::lookup(LookupKind::Type, element_type))?;
            let items = el
                .children
                .iter()
                .map(|c| value_from_element(c, Some(element_type), registry))
                .collect::<Result<Vec<_>>>()?;
            if let Some(count) = el.attr("count") {
                if count.trim().parse::<usize>().ok() != Some(items.len()) {
                    return Err(bad("count", count));
                }
            }
            Ok(Value::Array(Array {
                element_type_id: element_type.to_string(),
                element_kind,
                items,
            }))
        }
        "record" => Ok(Value::Record(Record::from_element(
            el,
            type_id.unwrap_or_default(),
            registry,
        )?)),
        other => Err(BehaviorError::Xml(format!("unsupported value element <{other}>"))),
    }
}

fn value_to_element(value: &Value, decimal_comma: bool) -> Element {
    match value {
        Value::Bool(b) => Element::new("bool").with_attr("value", if *b { "true" } else { "false" }),
        Value::Int(i) => Element::new("integer").with_attr("value", i.to_string()),
        Value::Float(r) => {
            let text = r.encode(decimal_comma);
            let el = Element::new("real").with_attr("dec", text.dec);
            match text.hex {
                Some(hex) => el.with_attr("hex", hex),
                None => el,
            }
        }
        Value::String(s) => Element::new("string").with_attr("value", s.as_str()),
        Value::Pointer(p) => Element::new("pointer").with_attr("id", p.raw_id()),
        Value::Array(a) => {
            let mut el = Element::new("array")
                .with_attr("count", a.items.len().to_string())
                .with_attr("elementtypeid", a.element_type_id.as_str());
            el.children = a.items.iter().map(|v| value_to_element(v, decimal_comma)).collect();
            el
        }
        Value::Record(r) => r.to_element(decimal_comma),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeInfo;

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.insert(TypeInfo::new("type1", "int").with_format(8196));
        reg.insert(TypeInfo::new("type2", "hkStringPtr").with_format(3));
        reg.insert(TypeInfo::new("type3", "hkReal").with_format(1525253));
        reg.insert(TypeInfo::new("type4", "T*").with_format(6).with_subtype("type10"));
        reg.insert(
            TypeInfo::new("type5", "hkArray")
                .with_format(8)
                .with_subtype("type4"),
        );
        reg.insert(
            TypeInfo::new("type6", "hkbBlendCurve")
                .with_format(7)
                .with_field("weight", "type3"),
        );
        reg.insert(
            TypeInfo::new("type10", "hkbManualSelectorGenerator")
                .with_format(7)
                .with_field("name", "type2")
                .with_field("selectedGeneratorIndex", "type1")
                .with_field("generators", "type5")
                .with_field("curve", "type6"),
        );
        reg
    }

    #[test]
    fn setting_an_equal_real_keeps_its_loaded_text() {
        let reg = registry();
        let loaded = Real::from_encoded("1,500000", Some("#3ff8000000000000")).unwrap();
        let mut rec = Record::new(&reg, "type6", [("weight", Value::Float(loaded))], None).unwrap();

        let old = rec.set("weight", 1.5).unwrap();
        assert_eq!(old, Value::Float(Real::new(1.5)));
        let Value::Float(kept) = rec.get("weight").unwrap() else {
            panic!("weight should stay a real");
        };
        assert_eq!(kept.loaded_text().map(|t| t.dec.as_str()), Some("1,500000"));

        rec.set("weight", 0.0).unwrap();
        let old = rec.set("weight", -0.0).unwrap();
        assert_eq!(old, Value::Float(Real::new(0.0)));
        assert_ne!(rec.get("weight").unwrap(), &Value::Float(Real::new(0.0)));
    }

    #[test]
    fn new_fills_schema_defaults_and_applies_overrides() {
        let reg = registry();
        let rec = Record::new(
            &reg,
            "type10",
            [("name", Value::from("DiveJump Selector"))],
            Some("object5".to_string()),
        )
        .unwrap();
        assert_eq!(rec.id(), Some("object5"));
        assert_eq!(rec.name(), Some("DiveJump Selector"));
        assert_eq!(rec.get("selectedGeneratorIndex").unwrap(), &Value::Int(0));
        assert_eq!(rec.get("curve/weight").unwrap(), &Value::from(0.0));
        let gens = rec.array("generators").unwrap();
        assert!(gens.is_empty());
        assert_eq!(gens.element_type_id, "type4");
        assert_eq!(gens.element_kind, ValueKind::Pointer);
    }

    #[test]
    fn new_rejects_unknown_override() {
        let reg = registry();
        let err = Record::new(&reg, "type10", [("bogus", Value::Int(1))], None).unwrap_err();
        assert!(matches!(err, BehaviorError::UnknownField { .. }));
        assert!(Record::new(&reg, "type99", Vec::<(&str, Value)>::new(), None)
            .unwrap_err()
            .is_recoverable());
    }

    #[test]
    fn set_coerces_and_keeps_field_on_mismatch() {
        let reg = registry();
        let mut rec = Record::new(&reg, "type10", Vec::<(&str, Value)>::new(), None).unwrap();
        rec.set("selectedGeneratorIndex", "42").unwrap();
        assert_eq!(rec.get("selectedGeneratorIndex").unwrap(), &Value::Int(42));
        let err = rec.set("selectedGeneratorIndex", "abc").unwrap_err();
        assert!(matches!(err, BehaviorError::TypeMismatch { .. }));
        assert_eq!(rec.get("selectedGeneratorIndex").unwrap(), &Value::Int(42));
    }

    #[test]
    fn array_items_insert_remove_and_resolve() {
        let reg = registry();
        let mut rec = Record::new(&reg, "type10", Vec::<(&str, Value)>::new(), None).unwrap();
        rec.insert_item("generators", None, "object7").unwrap();
        rec.insert_item("generators", Some(0), Pointer::to("object6")).unwrap();
        assert_eq!(rec.get("generators:1").unwrap(), &Value::Pointer(Pointer::to("object7")));
        assert!(rec.insert_item("generators", Some(5), "object8").is_err());
        assert!(rec.insert_item("generators", None, 3).is_err());

        let all = rec.resolve(&FieldPath::parse("generators:*").unwrap());
        assert_eq!(all.len(), 2);
        assert!(rec.get("generators:*").is_err());

        let (idx, popped) = rec.remove_item("generators", None).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(popped, Value::Pointer(Pointer::to("object7")));
        assert!(matches!(
            rec.remove_item("generators", Some(3)),
            Err(BehaviorError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn walk_reports_concrete_leaf_paths() {
        let reg = registry();
        let mut rec = Record::new(&reg, "type10", [("name", Value::from("A"))], None).unwrap();
        rec.insert_item("generators", None, "object3").unwrap();
        let mut paths = Vec::new();
        rec.walk(&mut |path, _| paths.push(path.to_string()));
        assert_eq!(
            paths,
            vec!["name", "selectedGeneratorIndex", "generators:0", "curve/weight"]
        );
        assert_eq!(rec.text(), "A 0 object3 0.0");
        assert_eq!(rec.pointers().len(), 1);
    }

    #[test]
    fn element_round_trip_keeps_real_text() {
        let reg = registry();
        let el = Element::new("record")
            .with_child(
                Element::new("field")
                    .with_attr("name", "weight")
                    .with_child(
                        Element::new("real")
                            .with_attr("dec", "0,500000")
                            .with_attr("hex", "#3fe0000000000000"),
                    ),
            );
        let rec = Record::from_element(&el, "type6", &reg).unwrap();
        assert_eq!(rec.get("weight").unwrap().as_float(), Some(0.5));
        assert_eq!(rec.to_element(true), el);
    }
}
